//! Background task that writes yesterday's reflections once a day.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tokio::time::interval;
use tracing::{debug, error, info};

use super::reflection::ReflectionService;

pub const DEFAULT_RUN_HOUR_UTC: u32 = 5;

pub struct ReflectionScheduler {
    reflections: ReflectionService,
    run_hour_utc: u32,
    poll_interval: Duration,
    last_run: Option<NaiveDate>,
}

impl ReflectionScheduler {
    pub fn spawn(reflections: ReflectionService, run_hour_utc: u32) -> tokio::task::JoinHandle<()> {
        let scheduler = Self {
            reflections,
            run_hour_utc: run_hour_utc.min(23),
            poll_interval: Duration::from_secs(60),
            last_run: None,
        };
        tokio::spawn(async move {
            scheduler.start().await;
        })
    }

    async fn start(mut self) {
        info!(
            run_hour_utc = self.run_hour_utc,
            "Starting reflection scheduler with interval {:?}", self.poll_interval
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            let now = Utc::now();
            let Some(date) = due_date(now, self.run_hour_utc, self.last_run) else {
                continue;
            };

            debug!(date = %date, "Reflection run due");
            match self.reflections.run_daily(date).await {
                Ok(_) => self.last_run = Some(now.date_naive()),
                Err(e) => error!("Error running daily reflections: {}", e),
            }
        }
    }
}

/// The day to reflect on if a run is due at `now`: yesterday, once the run
/// hour has passed and no run happened today.
pub fn due_date(now: DateTime<Utc>, run_hour_utc: u32, last_run: Option<NaiveDate>) -> Option<NaiveDate> {
    let today = now.date_naive();
    if now.hour() < run_hour_utc || last_run == Some(today) {
        return None;
    }
    today.pred_opt()
}
