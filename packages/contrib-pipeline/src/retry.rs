//! One-shot retry timer
//!
//! At most one retry is pending at a time. Arming a new one replaces the old
//! one; cancelling or firing consumes it. The callback runs at most once,
//! either from the timer task or synchronously from [`RetrySlot::fire`].

use crate::state::StartStage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type RetryCallback = Box<dyn FnOnce(StartStage) + Send + 'static>;

/// Externally visible view of the pending retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRetry {
    pub id: u64,
    pub start_stage: StartStage,
    pub due_at: DateTime<Utc>,
}

struct RetryTimer {
    pending: PendingRetry,
    token: CancellationToken,
    on_fire: RetryCallback,
}

#[derive(Clone, Default)]
pub struct RetrySlot {
    timer: Arc<Mutex<Option<RetryTimer>>>,
    next_id: Arc<AtomicU64>,
}

impl RetrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire(start_stage)` after `delay`, replacing any pending retry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, start_stage: StartStage, on_fire: F) -> PendingRetry
    where
        F: FnOnce(StartStage) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let pending = PendingRetry {
            id,
            start_stage,
            due_at,
        };
        let token = CancellationToken::new();

        let replaced = self.timer.lock().replace(RetryTimer {
            pending: pending.clone(),
            token: token.clone(),
            on_fire: Box::new(on_fire),
        });
        if let Some(old) = replaced {
            debug!("Retry #{} replaced by #{}", old.pending.id, id);
            old.token.cancel();
        }

        info!(
            "Retry #{} from {} scheduled in {}s",
            id,
            start_stage,
            delay.as_secs()
        );

        let slot = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(timer) = slot.take_if(id) {
                        info!("Retry #{} due, restarting from {}", id, timer.pending.start_stage);
                        (timer.on_fire)(timer.pending.start_stage);
                    }
                }
            }
        });

        pending
    }

    /// Drop the pending retry, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.timer.lock().take() {
            Some(timer) => {
                timer.token.cancel();
                info!("Retry #{} cancelled", timer.pending.id);
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> Option<PendingRetry> {
        self.timer.lock().as_ref().map(|timer| timer.pending.clone())
    }

    /// Run the pending retry now instead of waiting for its timer.
    pub fn fire(&self) -> Option<PendingRetry> {
        let timer = self.timer.lock().take()?;
        timer.token.cancel();
        info!("Retry #{} fired early", timer.pending.id);
        (timer.on_fire)(timer.pending.start_stage);
        Some(timer.pending)
    }

    fn take_if(&self, id: u64) -> Option<RetryTimer> {
        let mut guard = self.timer.lock();
        match guard.as_ref() {
            Some(timer) if timer.pending.id == id => guard.take(),
            _ => None,
        }
    }
}
