//! Drain scheduler
//!
//! Periodically walks every user with pending items and tries to
//! drain the single oldest item for each. A cycle never removes an
//! item before its publish has succeeded, so any failure leaves the
//! queue exactly as it was for the next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ObservationError, Result};
use crate::outbox::Outbox;
use crate::remote::{Publisher, RateGate};
use crate::settings::SettingsStore;

/// Delivers human-facing progress messages back to a user. Delivery
/// is best effort; a lost notification must not affect the queue.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, text: &str);
}

/// A notifier that drops everything. Used when no chat channel is
/// attached, e.g. in a one-shot drain from the command line.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _user_id: i64, _text: &str) {}
}

pub struct DrainScheduler {
    outbox: Outbox,
    settings: SettingsStore,
    gate: Arc<dyn RateGate>,
    publisher: Arc<dyn Publisher>,
    notifier: Arc<dyn Notifier>,
}

impl DrainScheduler {
    pub fn new(
        outbox: Outbox,
        settings: SettingsStore,
        gate: Arc<dyn RateGate>,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            outbox,
            settings,
            gate,
            publisher,
            notifier,
        }
    }

    /// One pass over all users with pending items. Each user drains
    /// at most one item per cycle. Per-user failures are logged and
    /// skipped; they never abort the cycle for other users.
    pub async fn run_cycle(&self) -> Result<()> {
        let users = self.outbox.users_with_pending().await?;
        debug!(users = users.len(), "starting drain cycle");

        for user_id in users {
            if let Err(e) = self.drain_one(user_id).await {
                warn!(user_id, error = %e, "drain failed for user");
            }
        }

        Ok(())
    }

    async fn drain_one(&self, user_id: i64) -> Result<()> {
        let Some(creds) = self.settings.credentials(user_id).await? else {
            debug!(user_id, "skipping user without credentials");
            return Ok(());
        };

        match self.gate.is_eligible(&creds).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(user_id, "user not yet eligible, leaving queue untouched");
                return Ok(());
            }
            Err(ObservationError::NoOriginalPost) => {
                warn!(user_id, "account has no original posts, cannot gate");
                return Err(ObservationError::NoOriginalPost.into());
            }
            Err(e) => {
                warn!(user_id, error = %e, "could not observe remote account");
                return Err(e.into());
            }
        }

        let Some(item) = self.outbox.peek_oldest(user_id).await? else {
            return Ok(());
        };

        match self.publisher.publish(&creds, &item.body).await {
            Ok(reference) => {
                // Delete only after the publish is confirmed. A crash
                // here re-sends the item next cycle rather than losing it.
                self.outbox.remove_confirmed(user_id, item.key).await?;
                info!(user_id, key = item.key, "published queued item");
                self.notifier
                    .notify(user_id, &format!("Post sent: {}", reference))
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!(user_id, key = item.key, error = %e, "publish failed, item stays queued");
                Err(e.into())
            }
        }
    }

    /// Run cycles at a fixed rate until the shutdown flag is set.
    /// Each fire is scheduled one interval after the previous fire,
    /// so a slow cycle shortens the following wait instead of
    /// pushing every later fire back. The wait is sliced so shutdown
    /// is noticed within about a second.
    pub async fn run(&self, poll_interval: Duration, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!(interval = ?poll_interval, "drain scheduler started");

        let mut next_fire = tokio::time::Instant::now();
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "drain cycle failed");
            }

            next_fire = next_fire_after(next_fire, poll_interval, tokio::time::Instant::now());

            while !shutdown.load(Ordering::Relaxed) {
                let now = tokio::time::Instant::now();
                if now >= next_fire {
                    break;
                }
                let slice = (next_fire - now).min(Duration::from_secs(1));
                tokio::time::sleep(slice).await;
            }
        }

        info!("drain scheduler stopped");
        Ok(())
    }
}

/// Next fire time, anchored to the previous fire rather than to the
/// end of the cycle, so cycle duration does not push later fires
/// back. A cycle that overran the whole interval clamps to now;
/// missed fires are skipped, not burst through.
fn next_fire_after(
    previous_fire: tokio::time::Instant,
    interval: Duration,
    now: tokio::time::Instant,
) -> tokio::time::Instant {
    let scheduled = previous_fire + interval;
    if scheduled < now {
        now
    } else {
        scheduled
    }
}
