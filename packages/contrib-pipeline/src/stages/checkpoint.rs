use crate::checkpoint::CheckpointJournal;
use crate::error::StageFailure;
use crate::model::NormalizedItem;
use crate::pipeline::{StageMetrics, StageResult};
use crate::state::StageId;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{error, info, warn};

fn checkpoint_failure<E: std::fmt::Display>(journal: &CheckpointJournal, e: E) -> StageFailure {
    error!(
        "Checkpoint: journal {} unusable: {}",
        journal.path().display(),
        e
    );
    StageFailure::new(StageId::Checkpoint, e)
}

/// Stage 2b: journal every item, then forward it.
///
/// The record is on disk before the next stage sees it, so a crash between
/// the two never loses an item (it may be processed twice on resume).
/// Once the rest of the chain has stopped, items are still journaled until
/// end of input so a RESUME attempt sees the whole collection.
pub async fn write_checkpoint(
    journal: &CheckpointJournal,
    truncate: bool,
    mut rx: Receiver<NormalizedItem>,
    tx: Sender<NormalizedItem>,
) -> StageResult {
    if truncate {
        journal
            .truncate()
            .await
            .map_err(|e| checkpoint_failure(journal, e))?;
    }
    let mut writer = journal
        .open_writer()
        .await
        .map_err(|e| checkpoint_failure(journal, e))?;

    let mut downstream = Some(tx);
    let mut unforwarded = 0;
    while let Some(item) = rx.recv().await {
        writer
            .append(&item)
            .await
            .map_err(|e| checkpoint_failure(journal, e))?;

        let forwarded = match &downstream {
            Some(tx) => tx.send(item).await.is_ok(),
            None => false,
        };
        if !forwarded {
            if downstream.take().is_some() {
                warn!("Checkpoint: downstream stopped, journaling the remaining items only");
            }
            unforwarded += 1;
        }
    }

    info!(
        "Checkpoint: {} items journaled to {} ({} not forwarded)",
        writer.written(),
        journal.path().display(),
        unforwarded
    );
    Ok(StageMetrics {
        processed: writer.written(),
        skipped: unforwarded,
    })
}

/// Resume source: replay the journal line by line.
pub async fn read_checkpoint(
    journal: &CheckpointJournal,
    tx: Sender<NormalizedItem>,
) -> StageResult {
    info!("Checkpoint: replaying {}", journal.path().display());

    if !journal.exists().await {
        return Err(checkpoint_failure(journal, "no checkpoint journal to resume from"));
    }
    let mut reader = journal
        .open_reader()
        .await
        .map_err(|e| checkpoint_failure(journal, e))?;

    let mut processed = 0;
    while let Some(item) = reader
        .next_record()
        .await
        .map_err(|e| checkpoint_failure(journal, e))?
    {
        if tx.send(item).await.is_err() {
            break;
        }
        processed += 1;
    }

    info!(
        "Checkpoint: replayed {} items ({} malformed lines skipped)",
        processed,
        reader.skipped()
    );
    Ok(StageMetrics {
        processed,
        skipped: reader.skipped(),
    })
}
