use crate::error::StageFailure;
use crate::fetch::DependentFetcher;
use crate::model::{EnrichedItem, NormalizedItem, ResultRecord};
use crate::pipeline::{StageMetrics, StageResult};
use crate::referential::DedupReferential;
use crate::state::StageId;
use parking_lot::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{error, info};

/// Stage 3: one dependent fetch per item, never more than one in flight.
///
/// On failure the stage returns at once, dropping its receiver so upstream
/// stops too.
pub async fn enrich(
    fetcher: &dyn DependentFetcher,
    mut rx: Receiver<NormalizedItem>,
    tx: Sender<EnrichedItem>,
) -> StageResult {
    let mut processed = 0;

    while let Some(item) = rx.recv().await {
        let members = match fetcher.fetch_members(&item).await {
            Ok(members) => members,
            Err(e) => {
                error!("Enrich: fetching members of {} failed: {}", item.name, e);
                return Err(StageFailure::new(StageId::Enrich, e));
            }
        };

        if tx.send(EnrichedItem { item, members }).await.is_err() {
            break;
        }
        processed += 1;
    }

    Ok(StageMetrics {
        processed,
        skipped: 0,
    })
}

/// Turn one enriched item into its result record, updating the referential.
pub fn aggregate_one(referential: &Mutex<DedupReferential>, enriched: EnrichedItem) -> ResultRecord {
    let total = enriched.members.len();
    let new_member_count = referential.lock().count_new(&enriched.members);

    info!(
        "{} has {} new contributors out of {} total",
        enriched.item.name, new_member_count, total
    );

    ResultRecord {
        name: enriched.item.name,
        created_at: enriched.item.created_at,
        new_member_count,
    }
}

/// Stage 4: `EnrichedItem` → `ResultRecord`
pub async fn aggregate(
    referential: &Mutex<DedupReferential>,
    mut rx: Receiver<EnrichedItem>,
    tx: Sender<ResultRecord>,
) -> StageResult {
    let mut processed = 0;
    while let Some(enriched) = rx.recv().await {
        let record = aggregate_one(referential, enriched);
        if tx.send(record).await.is_err() {
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
    use crate::model::Member;
    use crate::testing::{FailingDependent, StaticMembers};
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    fn enriched(name: &str, logins: &[&str]) -> EnrichedItem {
        EnrichedItem {
            item: NormalizedItem::new(name, "2011-01-26"),
            members: logins.iter().map(|l| Member::new(*l)).collect(),
        }
    }

    #[test]
    fn test_aggregate_one_counts_new_members() {
        let referential = Mutex::new(DedupReferential::new());

        let first = aggregate_one(&referential, enriched("404", &["earth"]));
        assert_eq!(first.to_csv_line(), "404;2011-01-26;1\n");

        let second = aggregate_one(&referential, enriched("proxy", &["earth", "fire"]));
        assert_eq!(second.new_member_count, 1);
    }

    #[test]
    fn test_fresh_referential_counts_again() {
        let referential = Mutex::new(DedupReferential::new());
        aggregate_one(&referential, enriched("404", &["earth"]));

        referential.lock().reset();
        let again = aggregate_one(&referential, enriched("404", &["earth"]));
        assert_eq!(again.new_member_count, 1);
    }

    #[tokio::test]
    async fn test_enrich_attaches_members() {
        let fetcher = StaticMembers::new(&["earth", "fire"]);
        let (in_tx, in_rx) = mpsc::channel(2);
        let (out_tx, mut out_rx) = mpsc::channel(2);
        in_tx
            .send(NormalizedItem::new("404", "2011-01-26"))
            .await
            .unwrap();
        drop(in_tx);

        let metrics = enrich(&fetcher, in_rx, out_tx).await.unwrap();

        assert_eq!(metrics.processed, 1);
        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.item.name, "404");
        assert_eq!(out.members.len(), 2);
    }

    #[tokio::test]
    async fn test_enrich_failure_stops_input() {
        let fetcher = FailingDependent::on("b", "API rate limit exceeded.");
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(4);

        let feed = async {
            let mut sent = 0;
            for name in ["a", "b", "c", "d"] {
                if in_tx
                    .send(NormalizedItem::new(name, "2011-01-26"))
                    .await
                    .is_err()
                {
                    break;
                }
                sent += 1;
            }
            sent
        };
        let (result, sent) = tokio::join!(enrich(&fetcher, in_rx, out_tx), feed);

        let failure = result.unwrap_err();
        assert_eq!(failure.stage, StageId::Enrich);
        assert!(sent < 4);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(out_rx.recv().await.unwrap().item.name, "a");
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_preserves_order() {
        let referential = Mutex::new(DedupReferential::new());
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel::<ResultRecord>(1);

        let feed = async {
            for e in [
                enriched("a", &["x"]),
                enriched("b", &["x", "y"]),
                enriched("c", &[]),
            ] {
                in_tx.send(e).await.unwrap();
            }
            drop(in_tx);
        };
        let collect = async {
            let mut lines = Vec::new();
            while let Some(record) = out_rx.recv().await {
                lines.push(record.to_csv_line());
            }
            lines
        };
        let (_, result, lines) = tokio::join!(feed, aggregate(&referential, in_rx, out_tx), collect);

        assert_eq!(result.unwrap().processed, 3);
        assert_eq!(
            lines,
            vec!["a;2011-01-26;1\n", "b;2011-01-26;1\n", "c;2011-01-26;0\n"]
        );
    }
}
