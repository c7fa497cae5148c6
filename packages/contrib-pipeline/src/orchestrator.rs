use crate::config::PipelineConfig;
use crate::error::StageFailure;
use crate::fetch::{DependentFetcher, PrimaryFetcher};
use crate::pipeline::{AttemptOutcome, AttemptReport, StageContext, StageMetrics, StageResult};
use crate::referential::DedupReferential;
use crate::stages;
use crate::state::{StageId, StartStage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Wires the stage chain for one attempt and runs it to completion
pub struct PipelineOrchestrator {
    primary: Arc<dyn PrimaryFetcher>,
    dependent: Arc<dyn DependentFetcher>,
    referential: Arc<Mutex<DedupReferential>>,
}

impl PipelineOrchestrator {
    pub fn new(
        primary: Arc<dyn PrimaryFetcher>,
        dependent: Arc<dyn DependentFetcher>,
        referential: Arc<Mutex<DedupReferential>>,
    ) -> Self {
        Self {
            primary,
            dependent,
            referential,
        }
    }

    pub fn referential(&self) -> &Arc<Mutex<DedupReferential>> {
        &self.referential
    }

    /// Run one attempt (main entry point)
    ///
    /// Every stage of the chain is polled on the calling task. The attempt
    /// settles once all of them have returned; its outcome is the first
    /// failure in chain order, if any.
    pub async fn run(
        &self,
        attempt_id: Uuid,
        start_stage: StartStage,
        config: &PipelineConfig,
    ) -> AttemptOutcome {
        let ctx = StageContext::new(
            attempt_id,
            start_stage,
            config,
            self.primary.clone(),
            self.dependent.clone(),
            self.referential.clone(),
        );
        let start_time = Instant::now();

        info!(
            "Attempt {} starting from {} (buffer capacity {})",
            attempt_id, start_stage, ctx.buffer_capacity
        );

        let results = match start_stage {
            StartStage::First => Self::run_first(&ctx).await,
            StartStage::Resume => Self::run_resume(&ctx).await,
        };

        let outcome = settle(results).map(|stages| {
            let records_written = stages
                .iter()
                .find(|(id, _)| *id == StageId::Sink)
                .map(|(_, metrics)| metrics.processed)
                .unwrap_or_default();
            AttemptReport {
                attempt_id,
                start_stage,
                stages,
                records_written,
                duration_ms: start_time.elapsed().as_millis() as u64,
            }
        });

        match &outcome {
            Ok(report) => info!(
                "Attempt {} completed - {} records written in {}ms",
                attempt_id, report.records_written, report.duration_ms
            ),
            Err(failure) => error!("Attempt {} failed: {}", attempt_id, failure),
        }
        outcome
    }

    /// produce → normalize → journal → enrich → aggregate → sink
    async fn run_first(ctx: &StageContext) -> Vec<(StageId, StageResult)> {
        let cap = ctx.buffer_capacity;
        let (item_tx, item_rx) = mpsc::channel(cap);
        let (norm_tx, norm_rx) = mpsc::channel(cap);
        let (journaled_tx, journaled_rx) = mpsc::channel(cap);
        let (enriched_tx, enriched_rx) = mpsc::channel(cap);
        let (record_tx, record_rx) = mpsc::channel(cap);

        let (produced, normalized, journaled, enriched, aggregated, sunk) = tokio::join!(
            stages::produce(ctx.primary.as_ref(), item_tx),
            stages::normalize(item_rx, norm_tx),
            stages::write_checkpoint(&ctx.journal, ctx.truncate_journal, norm_rx, journaled_tx),
            stages::enrich(ctx.dependent.as_ref(), journaled_rx, enriched_tx),
            stages::aggregate(&ctx.referential, enriched_rx, record_tx),
            stages::sink(&ctx.output, record_rx),
        );

        // normalize never fails; its counters fold into the checkpoint stage
        let checkpoint = normalized.and(journaled);

        vec![
            (StageId::Produce, produced),
            (StageId::Checkpoint, checkpoint),
            (StageId::Enrich, enriched),
            (StageId::Aggregate, aggregated),
            (StageId::Sink, sunk),
        ]
    }

    /// journal replay → enrich → aggregate → sink
    async fn run_resume(ctx: &StageContext) -> Vec<(StageId, StageResult)> {
        let cap = ctx.buffer_capacity;
        let (replayed_tx, replayed_rx) = mpsc::channel(cap);
        let (enriched_tx, enriched_rx) = mpsc::channel(cap);
        let (record_tx, record_rx) = mpsc::channel(cap);

        let (replayed, enriched, aggregated, sunk) = tokio::join!(
            stages::read_checkpoint(&ctx.journal, replayed_tx),
            stages::enrich(ctx.dependent.as_ref(), replayed_rx, enriched_tx),
            stages::aggregate(&ctx.referential, enriched_rx, record_tx),
            stages::sink(&ctx.output, record_rx),
        );

        vec![
            (StageId::Checkpoint, replayed),
            (StageId::Enrich, enriched),
            (StageId::Aggregate, aggregated),
            (StageId::Sink, sunk),
        ]
    }
}

/// First failure in chain order wins; otherwise collect the metrics.
fn settle(
    results: Vec<(StageId, StageResult)>,
) -> std::result::Result<Vec<(StageId, StageMetrics)>, StageFailure> {
    results
        .into_iter()
        .map(|(id, result)| result.map(|metrics| (id, metrics)))
        .collect()
}
