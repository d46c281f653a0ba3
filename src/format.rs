//! Markdown text for chat replies and announcements.

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt::Write;

use crate::domain::Day;
use crate::dto::{DayMap, HistoryRecord, StateDto};

const NOBODY: &str = "—";

/// Rota day of `now` in the local offset.
pub fn today(now: DateTime<Utc>, offset: FixedOffset) -> Day {
    use chrono::Datelike;
    Day::from_weekday(now.with_timezone(&offset).weekday())
}

/// One line per day: `*Monday*: Giova, Stefi`.
pub fn format_week(record: &HistoryRecord) -> String {
    let mut text = String::new();
    for day in Day::all() {
        let _ = writeln!(text, "*{}*: {}", day, names(record.workers_on(day)));
    }
    text
}

/// Latest week with its generation timestamp.
pub fn format_week_with_header(record: &HistoryRecord) -> String {
    format!(
        "*Week generated on* {}\n\n{}",
        record.generated_at.format("%Y-%m-%d %H:%M UTC"),
        format_week(record)
    )
}

/// Who is on shift on `day`.
pub fn format_day(record: &HistoryRecord, day: Day) -> String {
    format!("*Shift for today ({}):* {}", day, names(record.workers_on(day)))
}

/// Absences, preferences and stored weeks.
pub fn format_state(state: &StateDto) -> String {
    format!(
        "Current state:\n\nAbsences: {}\n\nPreferences: {}\n\nStored weeks: {}\n",
        day_map(&state.absences),
        day_map(&state.preferences),
        state.weeks_stored
    )
}

fn names(workers: &[String]) -> String {
    if workers.is_empty() {
        NOBODY.to_string()
    } else {
        workers.join(", ")
    }
}

fn day_map(map: &DayMap) -> String {
    if map.is_empty() {
        return "none".to_string();
    }
    map.iter()
        .map(|(name, days)| {
            let days: Vec<&str> = days.iter().map(|d| d.name()).collect();
            format!("{} ({})", name, days.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
