use crate::error::StageFailure;
use crate::model::ResultRecord;
use crate::output::ResultLog;
use crate::pipeline::{StageMetrics, StageResult};
use crate::state::StageId;
use tokio::sync::mpsc::Receiver;
use tracing::{error, info};

fn sink_failure<E: std::fmt::Display>(output: &ResultLog, e: E) -> StageFailure {
    error!("Sink: writing {} failed: {}", output.path().display(), e);
    StageFailure::new(StageId::Sink, e)
}

/// Stage 5: append each record to the output file, one durable write per record.
pub async fn sink(output: &ResultLog, mut rx: Receiver<ResultRecord>) -> StageResult {
    let mut appender = output
        .open_appender()
        .await
        .map_err(|e| sink_failure(output, e))?;

    while let Some(record) = rx.recv().await {
        appender
            .append(&record)
            .await
            .map_err(|e| sink_failure(output, e))?;
    }

    info!(
        "Sink: {} records appended to {}",
        appender.written(),
        output.path().display()
    );
    Ok(StageMetrics {
        processed: appender.written(),
        skipped: 0,
    })
}
