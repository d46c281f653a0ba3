//! Calendar triggers: the weekly generation and the daily "today" message.
//!
//! Times are wall-clock times in the configured fixed UTC offset.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::format;
use crate::store::Store;

/// Announcements kept for `GET /announcements`.
const RECENT_ANNOUNCEMENTS: usize = 50;

/// Where timed jobs publish their messages.
pub trait Notifier: Send + Sync {
    fn announce(&self, text: &str);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Logs announcements and keeps the most recent ones in memory.
#[derive(Debug, Default)]
pub struct Announcements {
    recent: Mutex<VecDeque<Announcement>>,
}

impl Announcements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent announcements, oldest first.
    pub fn recent(&self) -> Vec<Announcement> {
        self.recent.lock().iter().cloned().collect()
    }
}

impl Notifier for Announcements {
    fn announce(&self, text: &str) {
        info!(text, "Announcement");
        let mut recent = self.recent.lock();
        recent.push_back(Announcement {
            at: Utc::now(),
            text: text.to_string(),
        });
        while recent.len() > RECENT_ANNOUNCEMENTS {
            recent.pop_front();
        }
    }
}

/// First instant strictly after `now` at local time `at`.
pub fn next_daily_run(now: DateTime<Utc>, offset: FixedOffset, at: NaiveTime) -> DateTime<Utc> {
    let local = now.with_timezone(&offset).naive_local();
    let mut candidate = local.date().and_time(at);
    if candidate <= local {
        candidate += Duration::days(1);
    }
    to_utc(candidate, offset)
}

/// First instant strictly after `now` on local `weekday` at `at`.
///
/// ```
/// use chrono::{FixedOffset, NaiveTime, TimeZone, Utc, Weekday};
/// use weekly_rota::jobs::next_weekly_run;
///
/// // Wednesday noon UTC, generation on Sundays at 20:00 UTC+1.
/// let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
/// let offset = FixedOffset::east_opt(3600).unwrap();
/// let at = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
///
/// let next = next_weekly_run(now, offset, Weekday::Sun, at);
/// assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 8, 19, 0, 0).unwrap());
/// ```
pub fn next_weekly_run(
    now: DateTime<Utc>,
    offset: FixedOffset,
    weekday: Weekday,
    at: NaiveTime,
) -> DateTime<Utc> {
    let local = now.with_timezone(&offset).naive_local();
    let days_ahead = (weekday.num_days_from_monday() + 7
        - local.weekday().num_days_from_monday())
        % 7;
    let mut candidate = (local.date() + Duration::days(days_ahead as i64)).and_time(at);
    if candidate <= local {
        candidate += Duration::days(7);
    }
    to_utc(candidate, offset)
}

fn to_utc(local: chrono::NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// Generates and announces a new week.
pub fn weekly_generation(store: &Store, config: &AppConfig, notifier: &dyn Notifier) {
    info!("Running automatic weekly generation");
    match store.regenerate(&config.solver) {
        Ok((record, _)) => notifier.announce(&format!(
            "*Weekly rota (automatic):*\n\n{}",
            format::format_week(&record)
        )),
        Err(e) => {
            error!(error = %e, "Automatic weekly generation failed");
            notifier.announce(&format!("Automatic weekly generation failed: {e}"));
        }
    }
}

/// Announces who works today. Silent until a week has been generated.
pub fn daily_announcement(
    store: &Store,
    offset: FixedOffset,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) {
    let Some(record) = store.latest() else {
        return;
    };
    let day = format::today(now, offset);
    notifier.announce(&format::format_day(&record, day));
}

/// Starts both trigger loops on the current tokio runtime.
pub fn spawn(
    store: Arc<Store>,
    config: Arc<AppConfig>,
    notifier: Arc<dyn Notifier>,
) -> Vec<JoinHandle<()>> {
    let offset = match config.offset() {
        Ok(offset) => offset,
        Err(e) => {
            warn!(error = %e, "Timed jobs disabled");
            return Vec::new();
        }
    };

    let weekly = {
        let (store, config, notifier) = (store.clone(), config.clone(), notifier.clone());
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_weekly_run(now, offset, config.weekly_day, config.weekly_time);
                info!(next = %next, "Next weekly generation scheduled");
                sleep_until(now, next).await;

                let (store, config, notifier) = (store.clone(), config.clone(), notifier.clone());
                let run = tokio::task::spawn_blocking(move || {
                    weekly_generation(&store, &config, notifier.as_ref())
                });
                if let Err(e) = run.await {
                    error!(error = %e, "Weekly generation task panicked");
                }
            }
        })
    };

    let daily = tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_daily_run(now, offset, config.daily_time);
            sleep_until(now, next).await;
            daily_announcement(&store, offset, notifier.as_ref(), Utc::now());
        }
    });

    vec![weekly, daily]
}

async fn sleep_until(now: DateTime<Utc>, next: DateTime<Utc>) {
    let wait = (next - now).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}
