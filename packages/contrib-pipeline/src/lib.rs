/*
 * contrib-pipeline - Contributor Counting Pipeline
 *
 * Streams the repositories of a GitHub user through a staged pipeline and
 * appends, per repository, the number of contributors not already counted
 * for an earlier repository of the same run.
 *
 * Architecture:
 * - Run State Machine (single-flight)
 * - Bounded stage chain (produce → normalize → checkpoint → enrich → aggregate → sink)
 * - Checkpoint journal for RESUME attempts
 * - One-shot retry timer on failure
 */

// Public modules
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fetch;
mod handler;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod referential;
pub mod retry;
pub mod service;
pub mod stages;
pub mod state;

#[cfg(test)]
mod testing;

// Re-exports
pub use checkpoint::CheckpointJournal;
pub use config::{ConfigHandle, ConfigPatch, PipelineConfig};
pub use error::{FetchError, PipelineError, Result, StageFailure};
pub use fetch::{DependentFetcher, GithubClient, ItemEmitter, PrimaryFetcher};
pub use model::{format_date, EnrichedItem, Item, Member, NormalizedItem, ResultRecord};
pub use orchestrator::PipelineOrchestrator;
pub use output::{ResultLog, Results, NO_RESULTS_MESSAGE};
pub use pipeline::{AttemptOutcome, AttemptReport, StageContext, StageMetrics};
pub use referential::DedupReferential;
pub use retry::{PendingRetry, RetrySlot};
pub use service::{Accepted, PipelineService};
pub use state::{RunState, RunStateMachine, StageId, StartStage};
