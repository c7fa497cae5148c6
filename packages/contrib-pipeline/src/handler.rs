//! Escalation handler: settles an attempt and schedules the retry

use crate::error::StageFailure;
use crate::service::ServiceInner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

impl ServiceInner {
    pub(crate) fn on_success(&self) {
        let mut state = self.state.lock();
        if let Err(e) = state.record_success() {
            error!("Ignoring success settlement: {}", e);
            return;
        }
        self.referential().lock().reset();
        self.retry.cancel();
        self.publish(&state);
        drop(state);
        info!("Pipeline run succeeded");
    }

    /// Record the failure and arm a retry from the stage it calls for.
    ///
    /// The state guard is held until the retry is armed, so a start request
    /// either sees IN_PROGRESS or a fully settled failure.
    pub(crate) fn on_failure(self: &Arc<Self>, failure: &StageFailure) {
        let mut state = self.state.lock();
        if let Err(e) = state.record_failure(failure.stage, failure.cause.clone()) {
            error!("Ignoring failure settlement ({}): {}", failure, e);
            return;
        }
        self.referential().lock().reset();

        // read fresh so a runtime config change applies to the next retry
        let delay = Duration::from_secs(self.config.retry_interval_secs());
        let restart = failure.stage.retry_from();
        let weak = Arc::downgrade(self);
        self.retry.arm(delay, restart, move |start_stage| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = inner.start_attempt(start_stage) {
                warn!("Retry from {} not started: {}", start_stage, e);
            }
        });

        self.publish(&state);
        drop(state);
        warn!(
            "{}; retrying from {} in {}s",
            failure,
            restart,
            delay.as_secs()
        );
    }
}
