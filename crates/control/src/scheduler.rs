use chrono::{DateTime, NaiveTime, Utc};
use power_models::{MonitorError, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::monitor::Monitor;

/// Next occurrence of `at` (UTC) strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Triggers monitoring cycles on a fixed interval and once a day.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, config: SchedulerConfig) -> Self {
        Self { monitor, config }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Scheduler disabled");
            return;
        }
        let daily_at = match self.config.daily_time() {
            Ok(at) => at,
            Err(e) => {
                error!(error = %e, "Scheduler not started");
                return;
            }
        };

        if self.config.run_on_startup {
            self.trigger("startup").await;
        }

        let period = Duration::from_secs(self.config.interval_hours.max(1) * 3600);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_hours = self.config.interval_hours,
            daily_at = %self.config.daily_at,
            "Scheduler started"
        );

        loop {
            let now = Utc::now();
            let until_daily = (next_daily_run(now, daily_at) - now)
                .to_std()
                .unwrap_or_default();

            tokio::select! {
                _ = ticker.tick() => self.trigger("interval").await,
                _ = tokio::time::sleep(until_daily) => self.trigger("daily").await,
                _ = shutdown.changed() => break,
            }
        }
        info!("Scheduler stopped");
    }

    async fn trigger(&self, trigger: &str) {
        match self.monitor.run_cycle(trigger).await {
            Ok(_) | Err(MonitorError::SyncInProgress) => {}
            Err(e) => error!(trigger = %trigger, error = %e, "Scheduled cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daily_run_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 6, 15, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn daily_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2027, 1, 1, 8, 0, 0).unwrap()
        );
    }
}
