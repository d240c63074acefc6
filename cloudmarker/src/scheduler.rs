//! Wall-clock scheduler.
//!
//! An external collaborator relative to the audit engine: it only
//! knows how to compute "when next" for a daily `"HH:MM"` local-time
//! trigger and call back into
//! [`cloudmarker_engine::supervisor::JobSupervisor::run_once`] at that
//! time, repeatedly. `-n/--now` bypasses this entirely in `main.rs`.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use std::time::Duration as StdDuration;

/// `std::time::Duration` until the next local-time occurrence of
/// `"HH:MM"`, relative to `now`. Today if the target is still ahead,
/// tomorrow otherwise.
pub fn duration_until_next(schedule: &str, now: DateTime<Local>) -> anyhow::Result<StdDuration> {
    let target_time = NaiveTime::parse_from_str(schedule, "%H:%M")
        .with_context(|| format!("invalid schedule '{schedule}', expected \"HH:MM\""))?;

    let mut next = Local
        .from_local_datetime(&now.date_naive().and_time(target_time))
        .single()
        .ok_or_else(|| anyhow!("ambiguous local time for schedule '{schedule}'"))?;
    if next <= now {
        next += Duration::days(1);
    }

    (next - now)
        .to_std()
        .context("computed a negative wait for the next scheduled run")
}
