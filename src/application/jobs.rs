//! Cron-triggered notification sweep.

use std::{str::FromStr, sync::Arc};

use apalis::prelude::*;
use apalis_cron::Schedule;

use crate::application::notifications::{NotificationService, SweepOutcome};

/// Marker job emitted by the cron stream.
#[derive(Default, Debug, Clone)]
pub struct NotifySweepJob;

impl From<chrono::DateTime<chrono::Utc>> for NotifySweepJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct NotifySweepContext {
    pub notifications: Arc<NotificationService>,
}

/// Run one sweep. Failures are logged and retried on the next tick.
pub async fn process_notify_sweep_job(
    _job: NotifySweepJob,
    ctx: Data<NotifySweepContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.notifications.sweep().await {
        Ok(SweepOutcome::Notified { pending }) => {
            tracing::info!(pending, "Sent pending submission notification");
        }
        Ok(SweepOutcome::Idle) => {}
        Err(err) => {
            tracing::warn!(error = %err, "Notification sweep failed");
        }
    }
    Ok(())
}

/// Parse a six-field cron expression (seconds first).
pub fn notify_sweep_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_schedule_parses() {
        let schedule = notify_sweep_schedule("0 0 9 * * *").expect("schedule");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }

    #[test]
    fn garbage_schedule_is_rejected() {
        assert!(notify_sweep_schedule("every day").is_err());
    }
}
