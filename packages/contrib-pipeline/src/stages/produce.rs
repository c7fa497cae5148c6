use crate::error::StageFailure;
use crate::fetch::{ItemEmitter, PrimaryFetcher};
use crate::model::{Item, NormalizedItem};
use crate::pipeline::{StageMetrics, StageResult};
use crate::state::StageId;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{error, info};

/// Stage 1: run the primary fetcher, pushing items downstream.
pub async fn produce(fetcher: &dyn PrimaryFetcher, tx: Sender<Item>) -> StageResult {
    info!("Produce: fetching primary collection");

    let emitter = ItemEmitter::new(tx);
    let result = fetcher.fetch_items(&emitter).await;
    let metrics = StageMetrics {
        processed: emitter.pushed(),
        skipped: 0,
    };

    match result {
        Ok(()) => {
            info!("Produce: {} items emitted", metrics.processed);
            Ok(metrics)
        }
        // the rest of the chain already stopped; its failure is the one that counts
        Err(_) if emitter.is_closed() => Ok(metrics),
        Err(e) => {
            error!("Produce: primary fetch failed: {}", e);
            Err(StageFailure::new(StageId::Produce, e))
        }
    }
}

/// Stage 2a: `Item` → `NormalizedItem`, one to one.
pub async fn normalize(mut rx: Receiver<Item>, tx: Sender<NormalizedItem>) -> StageResult {
    let mut processed = 0;
    while let Some(item) = rx.recv().await {
        if tx.send(NormalizedItem::from(item)).await.is_err() {
            break;
        }
        processed += 1;
    }

    Ok(StageMetrics {
        processed,
        skipped: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingPrimary, StaticItems};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_produce_forwards_all_items_in_order() {
        let fetcher = StaticItems::new(vec![
            Item::new("404", "2011-01-26T19:01:12Z"),
            Item::new("404-proxy", "2011-01-26T19:01:12Z"),
            Item::new("proxy", "2011-01-26T19:01:12Z"),
        ]);
        let (tx, mut rx) = mpsc::channel::<Item>(1);

        let collect = async {
            let mut names = Vec::new();
            while let Some(item) = rx.recv().await {
                names.push(item.name);
            }
            names
        };
        let (result, names) = tokio::join!(produce(&fetcher, tx), collect);

        assert_eq!(result.unwrap().processed, 3);
        assert_eq!(names, vec!["404", "404-proxy", "proxy"]);
    }

    #[tokio::test]
    async fn test_produce_failure_is_tagged() {
        let fetcher = FailingPrimary::after(vec![Item::new("404", "")], "API rate limit exceeded.");
        let (tx, mut rx) = mpsc::channel(4);

        let failure = produce(&fetcher, tx).await.unwrap_err();

        assert_eq!(failure.stage, StageId::Produce);
        assert!(failure.cause.contains("API rate limit exceeded."));
        assert_eq!(rx.recv().await.unwrap().name, "404");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_produce_stops_quietly_when_downstream_is_gone() {
        let fetcher = StaticItems::new(vec![Item::new("a", ""), Item::new("b", "")]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let metrics = produce(&fetcher, tx).await.unwrap();
        assert_eq!(metrics.processed, 0);
    }

    #[tokio::test]
    async fn test_normalize_maps_dates() {
        let (in_tx, in_rx) = mpsc::channel(2);
        let (out_tx, mut out_rx) = mpsc::channel(2);

        in_tx
            .send(Item::new("404", "2011-01-26T19:01:12Z"))
            .await
            .unwrap();
        in_tx.send(Item::new("odd", "not-a-date")).await.unwrap();
        drop(in_tx);

        let metrics = normalize(in_rx, out_tx).await.unwrap();
        assert_eq!(metrics.processed, 2);
        assert_eq!(
            out_rx.recv().await.unwrap(),
            NormalizedItem::new("404", "2011-01-26")
        );
        assert_eq!(
            out_rx.recv().await.unwrap(),
            NormalizedItem::new("odd", "not-a-date")
        );
    }
}
