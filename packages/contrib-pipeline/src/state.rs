use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageId {
    Produce,
    Checkpoint,
    Enrich,
    Aggregate,
    Sink,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Produce => "PRODUCE",
            StageId::Checkpoint => "CHECKPOINT",
            StageId::Enrich => "ENRICH",
            StageId::Aggregate => "AGGREGATE",
            StageId::Sink => "SINK",
        }
    }

    /// Position of the stage in the full chain (1-based)
    pub fn number(&self) -> u8 {
        match self {
            StageId::Produce => 1,
            StageId::Checkpoint => 2,
            StageId::Enrich => 3,
            StageId::Aggregate => 4,
            StageId::Sink => 5,
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "PRODUCE" => Ok(StageId::Produce),
            "CHECKPOINT" => Ok(StageId::Checkpoint),
            "ENRICH" => Ok(StageId::Enrich),
            "AGGREGATE" => Ok(StageId::Aggregate),
            "SINK" => Ok(StageId::Sink),
            _ => Err(PipelineError::serialization(format!(
                "Invalid stage ID: {}",
                s
            ))),
        }
    }

    /// Where a retry should restart after this stage failed.
    ///
    /// Anything before the journal is complete has to refetch the primary
    /// collection; everything after can replay the journal.
    pub fn retry_from(&self) -> StartStage {
        match self {
            StageId::Produce | StageId::Checkpoint => StartStage::First,
            StageId::Enrich | StageId::Aggregate | StageId::Sink => StartStage::Resume,
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry point of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartStage {
    /// Fetch the primary collection and rebuild the journal
    First,
    /// Replay the journal, skipping the primary fetch
    Resume,
}

impl StartStage {
    /// The first stage that does real work for this entry point
    pub fn entry_stage(&self) -> StageId {
        match self {
            StartStage::First => StageId::Produce,
            StartStage::Resume => StageId::Enrich,
        }
    }
}

impl std::fmt::Display for StartStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartStage::First => write!(f, "FIRST"),
            StartStage::Resume => write!(f, "RESUME"),
        }
    }
}

/// Pipeline run state, serialized as a tagged union on `status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Free,
    #[serde(rename_all = "camelCase")]
    InProgress {
        started_at: DateTime<Utc>,
        current_stage: StageId,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        stage: StageId,
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl RunState {
    pub fn state_name(&self) -> &'static str {
        match self {
            RunState::Free => "FREE",
            RunState::InProgress { .. } => "IN_PROGRESS",
            RunState::Success { .. } => "SUCCESS",
            RunState::Failure { .. } => "FAILURE",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, RunState::InProgress { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Success { .. } | RunState::Failure { .. })
    }
}

/// Run state machine for transitions
#[derive(Debug, Default)]
pub struct RunStateMachine {
    state: RunState,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &RunState {
        &self.state
    }

    /// Transition: FREE | SUCCESS | FAILURE → IN_PROGRESS
    pub fn request_start(&mut self, current_stage: StageId) -> Result<()> {
        if self.state.is_in_progress() {
            return Err(PipelineError::AlreadyRunning);
        }

        self.state = RunState::InProgress {
            started_at: Utc::now(),
            current_stage,
        };
        Ok(())
    }

    /// Transition: IN_PROGRESS → SUCCESS
    pub fn record_success(&mut self) -> Result<()> {
        match &self.state {
            RunState::InProgress { started_at, .. } => {
                self.state = RunState::Success {
                    started_at: *started_at,
                    ended_at: Utc::now(),
                };
                Ok(())
            }
            _ => Err(PipelineError::InvalidStateTransition {
                from: self.state.state_name().to_string(),
                to: "SUCCESS".to_string(),
            }),
        }
    }

    /// Transition: IN_PROGRESS → FAILURE
    pub fn record_failure(&mut self, stage: StageId, error: String) -> Result<()> {
        match &self.state {
            RunState::InProgress { .. } => {
                self.state = RunState::Failure {
                    stage,
                    failed_at: Utc::now(),
                    error,
                };
                Ok(())
            }
            _ => Err(PipelineError::InvalidStateTransition {
                from: self.state.state_name().to_string(),
                to: "FAILURE".to_string(),
            }),
        }
    }
}
