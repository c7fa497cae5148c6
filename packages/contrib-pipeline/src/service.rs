//! Control surface
//!
//! [`PipelineService`] owns the run state, the referential, the retry slot
//! and the configuration. Starting a run returns immediately; the attempt
//! runs on its own task and settles through the escalation handler.

use crate::config::{ConfigHandle, ConfigPatch};
use crate::error::{PipelineError, Result, StageFailure};
use crate::fetch::{DependentFetcher, GithubClient, PrimaryFetcher};
use crate::orchestrator::PipelineOrchestrator;
use crate::output::{ResultLog, Results};
use crate::pipeline::AttemptOutcome;
use crate::referential::DedupReferential;
use crate::retry::{PendingRetry, RetrySlot};
use crate::state::{RunState, RunStateMachine, StartStage};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// Handle on an accepted start request
#[derive(Debug)]
pub struct Accepted {
    pub attempt_id: Uuid,
    pub start_stage: StartStage,
    completion: JoinHandle<AttemptOutcome>,
}

impl Accepted {
    /// Wait for the attempt to settle. The run state is already updated
    /// when this returns.
    pub async fn wait(self) -> AttemptOutcome {
        let entry = self.start_stage.entry_stage();
        self.completion
            .await
            .unwrap_or_else(|e| Err(StageFailure::new(entry, e)))
    }
}

pub(crate) struct ServiceInner {
    pub(crate) state: Mutex<RunStateMachine>,
    pub(crate) state_tx: watch::Sender<RunState>,
    pub(crate) retry: RetrySlot,
    pub(crate) config: ConfigHandle,
    pub(crate) orchestrator: PipelineOrchestrator,
}

impl ServiceInner {
    pub(crate) fn referential(&self) -> &Mutex<DedupReferential> {
        self.orchestrator.referential()
    }

    /// Broadcast the current state. Called with every transition, under the
    /// state guard so subscribers see transitions in order.
    pub(crate) fn publish(&self, state: &RunStateMachine) {
        self.state_tx.send_replace(state.current().clone());
    }

    /// Single-flight start shared by manual requests and retries.
    pub(crate) fn start_attempt(self: &Arc<Self>, start_stage: StartStage) -> Result<Accepted> {
        let runtime = Handle::try_current().map_err(|e| PipelineError::Other(e.into()))?;

        // retry slot and referential are only touched under the state guard
        {
            let mut state = self.state.lock();
            state.request_start(start_stage.entry_stage())?;
            self.retry.cancel();
            self.referential().lock().reset();
            self.publish(&state);
        }

        let attempt_id = Uuid::new_v4();
        let config = self.config.snapshot();
        info!(
            "Attempt {} accepted from {} (user {})",
            attempt_id, start_stage, config.github.user_name
        );

        let inner = Arc::clone(self);
        let completion = runtime.spawn(async move {
            let outcome = inner.orchestrator.run(attempt_id, start_stage, &config).await;
            match &outcome {
                Ok(_) => inner.on_success(),
                Err(failure) => inner.on_failure(failure),
            }
            outcome
        });

        Ok(Accepted {
            attempt_id,
            start_stage,
            completion,
        })
    }
}

/// Pipeline service (main entry point)
#[derive(Clone)]
pub struct PipelineService {
    inner: Arc<ServiceInner>,
}

impl PipelineService {
    pub fn new(
        config: ConfigHandle,
        primary: Arc<dyn PrimaryFetcher>,
        dependent: Arc<dyn DependentFetcher>,
    ) -> Self {
        let referential = Arc::new(Mutex::new(DedupReferential::new()));
        let (state_tx, _) = watch::channel(RunState::Free);

        Self {
            inner: Arc::new(ServiceInner {
                state: Mutex::new(RunStateMachine::new()),
                state_tx,
                retry: RetrySlot::new(),
                config,
                orchestrator: PipelineOrchestrator::new(primary, dependent, referential),
            }),
        }
    }

    /// Service backed by the GitHub API for both fetchers
    pub fn github(config: ConfigHandle) -> Result<Self> {
        let client = Arc::new(GithubClient::new(config.clone())?);
        Ok(Self::new(config, client.clone(), client))
    }

    /// Start an attempt; rejected with `AlreadyRunning` while one is in progress.
    ///
    /// Cancels any pending retry. Must be called from within a tokio runtime.
    pub fn start_run(&self, start_stage: StartStage) -> Result<Accepted> {
        self.inner.start_attempt(start_stage)
    }

    pub fn run_state(&self) -> RunState {
        self.inner.state.lock().current().clone()
    }

    /// Notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state_tx.subscribe()
    }

    /// Everything durably written to the output so far
    pub async fn results(&self) -> Result<Results> {
        let path = self.inner.config.snapshot().storage.output_path();
        ResultLog::new(path).read().await
    }

    /// Takes effect from the next attempt or retry.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<()> {
        self.inner.config.apply(patch)?;
        Ok(())
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.inner.config
    }

    pub fn pending_retry(&self) -> Option<PendingRetry> {
        self.inner.retry.pending()
    }

    /// Start the pending retry now. The new attempt is in progress when this returns.
    pub fn fire_retry(&self) -> Option<PendingRetry> {
        self.inner.retry.fire()
    }
}
