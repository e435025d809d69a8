//! One-shot sweeps. The schedulers in [`crate::runner`] call these on a timer;
//! tests and admin tooling can call them directly.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use common::UserRole;
use domain::{EngineContext, ReservationEngine};

use crate::{Result, SweepConfig};

/// What a single sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates the sweep looked at.
    pub examined: usize,
    /// Candidates that were changed.
    pub affected: usize,
    /// Candidates that errored and were left alone.
    pub failed: usize,
}

/// Cancels confirmed reservations that are more than `config.grace` past
/// their start without a check-in, freeing the table for walk-ins.
///
/// A failure on one reservation is logged and the sweep moves on.
#[tracing::instrument(skip_all)]
pub async fn auto_cancel_late_reservations(
    engine: &ReservationEngine,
    config: &SweepConfig,
) -> Result<SweepReport> {
    let late = engine.late_reservations(config.grace).await?;
    let mut report = SweepReport {
        examined: late.len(),
        ..SweepReport::default()
    };

    for reservation in late {
        match engine.expire_if_late(reservation.id, config.grace).await {
            Ok(true) => report.affected += 1,
            Ok(false) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    reservation_id = %reservation.id,
                    error = %e,
                    "failed to auto-cancel reservation"
                );
            }
        }
    }

    record("auto_cancel", &report);
    if report.affected > 0 {
        tracing::info!(cancelled = report.affected, "late reservations cancelled");
    }
    Ok(report)
}

/// Bans customers with at least `config.ban_threshold` cancelled or no-show
/// reservations created in the current calendar month.
///
/// Staff accounts and already banned customers are skipped.
#[tracing::instrument(skip_all)]
pub async fn ban_repeat_offenders(
    ctx: &EngineContext,
    config: &SweepConfig,
) -> Result<SweepReport> {
    let now = ctx.now();
    let (from, to) = month_window(now, config.timezone);

    let offenders: Vec<_> = {
        let mut uow = ctx.store.begin().await?;
        uow.offense_counts(from, to)
            .await?
            .into_iter()
            .filter(|c| c.count >= config.ban_threshold)
            .collect()
    };

    let mut report = SweepReport {
        examined: offenders.len(),
        ..SweepReport::default()
    };

    for offender in offenders {
        match ban_user(ctx, offender.user_id, now).await {
            Ok(true) => {
                report.affected += 1;
                tracing::info!(
                    user_id = %offender.user_id,
                    offenses = offender.count,
                    "customer banned for repeated cancellations"
                );
            }
            Ok(false) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(user_id = %offender.user_id, error = %e, "failed to ban user");
            }
        }
    }

    record("ban", &report);
    Ok(report)
}

async fn ban_user(ctx: &EngineContext, user_id: common::UserId, now: DateTime<Utc>) -> Result<bool> {
    let mut uow = ctx.store.begin().await?;
    let Some(mut user) = uow.get_user(user_id).await? else {
        return Ok(false);
    };
    if user.role != UserRole::Customer || user.is_banned() {
        return Ok(false);
    }
    user.deactivated_at = Some(now);
    uow.update_user(&user).await?;
    uow.commit().await?;
    Ok(true)
}

/// Start of the month containing `now` and start of the next, in `tz`.
pub fn month_window(now: DateTime<Utc>, tz: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = now.with_timezone(&tz);
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(local.date_naive());
    let next = if local.month() == 12 {
        NaiveDate::from_ymd_opt(local.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(local.year(), local.month() + 1, 1)
    }
    .unwrap_or(first);

    (local_midnight(first, tz), local_midnight(next, tz))
}

pub(crate) fn local_midnight(date: NaiveDate, tz: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    // Fixed offsets have no gaps, so the mapping is always single.
    tz.from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn record(sweep: &'static str, report: &SweepReport) {
    metrics::counter!("sweep_runs_total", "sweep" => sweep).increment(1);
    metrics::counter!("sweep_items_affected_total", "sweep" => sweep)
        .increment(report.affected as u64);
    if report.failed > 0 {
        metrics::counter!("sweep_items_failed_total", "sweep" => sweep)
            .increment(report.failed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gmt7() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn month_window_uses_local_calendar() {
        // 2024-03-31 20:00 UTC is already April 1st in GMT+7.
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 20, 0, 0).unwrap();
        let (from, to) = month_window(now, gmt7());
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 31, 17, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 4, 30, 17, 0, 0).unwrap());
    }

    #[test]
    fn month_window_rolls_over_the_year() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();
        let (from, to) = month_window(now, gmt7());
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 11, 30, 17, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 12, 31, 17, 0, 0).unwrap());
    }
}
