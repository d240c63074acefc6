//! Notification channel.
//!
//! The engine only needs something it can call at the start and end of
//! an audit or a run; what actually happens with that call (SMTP, a
//! webhook, nothing) is a concrete collaborator's problem, same as
//! store/alert plugins. [`NullNotifier`] is the default when no `email`
//! config is supplied; the binary crate provides an SMTP-backed
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Bracketing notification hooks called by [`crate::runner::AuditRunner`]
/// (per audit) and the job supervisor (per run).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `subject` is an audit key, or `"all audits"` for a run-level
    /// bracket.
    async fn start(&self, subject: &str, at: DateTime<Utc>);

    /// `duration` is pre-formatted as `HH h MM m SS s`.
    async fn end(&self, subject: &str, started: DateTime<Utc>, ended: DateTime<Utc>, duration: &str);
}

/// No-op notifier used when no notification channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn start(&self, _subject: &str, _at: DateTime<Utc>) {}
    async fn end(&self, _subject: &str, _started: DateTime<Utc>, _ended: DateTime<Utc>, _duration: &str) {}
}

/// Format a duration as `HH h MM m SS s`.
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02} h {minutes:02} m {seconds:02} s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_duration(chrono::Duration::seconds(0)), "00 h 00 m 00 s");
        assert_eq!(format_duration(chrono::Duration::seconds(59)), "00 h 00 m 59 s");
        assert_eq!(format_duration(chrono::Duration::seconds(3661)), "01 h 01 m 01 s");
        assert_eq!(format_duration(chrono::Duration::seconds(3600 * 5 + 61)), "05 h 01 m 01 s");
    }
}
