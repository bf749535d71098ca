//! Periodic draft re-evaluation.
//!
//! Drafts are normally promoted on the push path
//! ([`OfferLifecycle::on_certificate_uploaded`]). When certificate events
//! cannot be delivered, this task sweeps every draft on a fixed interval.
//! The sweep is idempotent, so running it alongside the push path is safe.
//!
//! The task stops when its [`PromotionTask`] is dropped or stopped.

use std::sync::Arc;

use coopmarket_types::MarketConfig;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::OfferLifecycle;

/// Handle to a running fallback sweep. Aborts the task on drop.
#[derive(Debug)]
pub struct PromotionTask {
    handle: JoinHandle<()>,
}

impl PromotionTask {
    /// Stop the sweep and wait for the task to wind down.
    pub async fn stop(mut self) {
        self.handle.abort();
        // Cancellation is the expected outcome here.
        let _ = (&mut self.handle).await;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PromotionTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start sweeping drafts every `config.promotion_interval_secs` on the
/// current tokio runtime. The first sweep runs immediately.
///
/// Overdue ticks are skipped rather than bursted, so a slow sweep never
/// queues more than one follow-up. Sweep errors are logged and the next
/// tick retries.
///
/// # Panics
/// Panics if called outside a tokio runtime.
#[must_use]
pub fn spawn_promotion_fallback(
    lifecycle: Arc<OfferLifecycle>,
    config: &MarketConfig,
) -> PromotionTask {
    let every = config.promotion_interval();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = every.as_millis(), "Draft promotion fallback started");
        loop {
            ticker.tick().await;
            match lifecycle.promote_all_drafts() {
                Ok(promoted) if !promoted.is_empty() => {
                    tracing::info!(count = promoted.len(), "Fallback sweep promoted drafts");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "Fallback draft sweep failed"),
            }
        }
    });
    PromotionTask { handle }
}
