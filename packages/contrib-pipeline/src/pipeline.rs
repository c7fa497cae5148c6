use crate::checkpoint::CheckpointJournal;
use crate::config::PipelineConfig;
use crate::error::StageFailure;
use crate::fetch::{DependentFetcher, PrimaryFetcher};
use crate::output::ResultLog;
use crate::referential::DedupReferential;
use crate::state::{StageId, StartStage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Everything one attempt needs, built fresh at the start of the attempt
#[derive(Clone)]
pub struct StageContext {
    pub attempt_id: Uuid,
    pub start_stage: StartStage,
    pub primary: Arc<dyn PrimaryFetcher>,
    pub dependent: Arc<dyn DependentFetcher>,
    pub referential: Arc<Mutex<DedupReferential>>,
    pub journal: CheckpointJournal,
    pub output: ResultLog,
    /// Capacity of every stage-to-stage channel
    pub buffer_capacity: usize,
    pub truncate_journal: bool,
}

impl StageContext {
    pub fn new(
        attempt_id: Uuid,
        start_stage: StartStage,
        config: &PipelineConfig,
        primary: Arc<dyn PrimaryFetcher>,
        dependent: Arc<dyn DependentFetcher>,
        referential: Arc<Mutex<DedupReferential>>,
    ) -> Self {
        Self {
            attempt_id,
            start_stage,
            primary,
            dependent,
            referential,
            journal: CheckpointJournal::new(config.storage.journal_path()),
            output: ResultLog::new(config.storage.output_path()),
            buffer_capacity: config.buffer_capacity.max(1),
            truncate_journal: config.storage.truncate_journal_on_first_run,
        }
    }
}

/// Per-stage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub processed: usize,
    pub skipped: usize,
}

/// Outcome of a single stage future
pub type StageResult = std::result::Result<StageMetrics, StageFailure>;

/// Summary of a successful attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptReport {
    pub attempt_id: Uuid,
    pub start_stage: StartStage,
    pub stages: Vec<(StageId, StageMetrics)>,
    pub records_written: usize,
    pub duration_ms: u64,
}

impl AttemptReport {
    pub fn metrics(&self, stage: StageId) -> Option<&StageMetrics> {
        self.stages
            .iter()
            .find(|(id, _)| *id == stage)
            .map(|(_, metrics)| metrics)
    }
}

/// Outcome of a whole attempt
pub type AttemptOutcome = std::result::Result<AttemptReport, StageFailure>;
