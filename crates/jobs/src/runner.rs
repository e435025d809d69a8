//! Long-running schedulers that drive the sweeps until shutdown.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use domain::{EngineContext, ReservationEngine};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::SweepConfig;
use crate::sweeps::{self, local_midnight};

/// Cancels late reservations every `auto_cancel_interval`.
pub struct AutoCancelScheduler {
    engine: ReservationEngine,
    config: SweepConfig,
    shutdown: CancellationToken,
}

impl AutoCancelScheduler {
    pub fn new(ctx: EngineContext, config: SweepConfig, shutdown: CancellationToken) -> Self {
        Self {
            engine: ReservationEngine::new(ctx),
            config,
            shutdown,
        }
    }

    /// Sweeps once at startup, then on every tick until cancelled.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.auto_cancel_interval.as_secs(),
            "late reservation sweeper started"
        );

        loop {
            if let Err(e) = sweeps::auto_cancel_late_reservations(&self.engine, &self.config).await
            {
                tracing::error!(error = %e, "late reservation sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.auto_cancel_interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("late reservation sweeper received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Bans repeat offenders once a day at local midnight.
pub struct BanScheduler {
    ctx: EngineContext,
    config: SweepConfig,
    shutdown: CancellationToken,
}

impl BanScheduler {
    pub fn new(ctx: EngineContext, config: SweepConfig, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            config,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!("repeat offender sweeper started");

        loop {
            let wait = duration_until_midnight(self.ctx.now(), self.config.timezone);
            tracing::info!(
                wait_minutes = wait.as_secs() / 60,
                "next repeat offender sweep scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = sweeps::ban_repeat_offenders(&self.ctx, &self.config).await {
                        tracing::error!(error = %e, "repeat offender sweep failed");
                    }
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("repeat offender sweeper received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Starts both schedulers on the current runtime.
pub fn spawn_all(
    ctx: EngineContext,
    config: SweepConfig,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(AutoCancelScheduler::new(ctx.clone(), config, shutdown.clone()).run()),
        tokio::spawn(BanScheduler::new(ctx, config, shutdown).run()),
    ]
}

/// Time left until the next midnight in `tz`, never less than a minute.
pub fn duration_until_midnight(now: DateTime<Utc>, tz: FixedOffset) -> StdDuration {
    let tomorrow = now.with_timezone(&tz).date_naive() + Duration::days(1);
    let remaining = local_midnight(tomorrow, tz).signed_duration_since(now);
    if remaining.num_seconds() <= 0 {
        StdDuration::from_secs(60)
    } else {
        remaining.to_std().unwrap_or(StdDuration::from_secs(60))
    }
}
