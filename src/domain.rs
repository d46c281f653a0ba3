//! Domain model for the weekly rota.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of days in a rota week.
pub const DAYS_PER_WEEK: usize = 7;

/// Workers staffed on every day.
pub const WORKERS_PER_DAY: usize = 2;

/// Shifts every worker takes per week.
pub const SHIFTS_PER_WORKER: usize = 2;

/// Minimum index distance between a worker's two shifts (two full rest days).
pub const MIN_SHIFT_GAP: u8 = 3;

/// Size of the closed roster the week is built for.
pub const ROSTER_SIZE: usize = DAYS_PER_WEEK * WORKERS_PER_DAY / SHIFTS_PER_WORKER;

/// A day of the rota week, 0 = Monday through 6 = Sunday.
///
/// Days are linearly ordered; Sunday and the following Monday are not adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Day(u8);

const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

impl Day {
    /// Returns the day with the given index, if it lies in `0..7`.
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < DAYS_PER_WEEK).then_some(Day(index))
    }

    /// All days of the week in order.
    pub fn all() -> impl Iterator<Item = Day> {
        (0..DAYS_PER_WEEK as u8).map(Day)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// English display name.
    pub fn name(self) -> &'static str {
        DAY_NAMES[self.index()]
    }

    /// Maps a chrono weekday onto the rota week.
    pub fn from_weekday(weekday: chrono::Weekday) -> Self {
        Day(weekday.num_days_from_monday() as u8)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Day> for u8 {
    fn from(day: Day) -> u8 {
        day.0
    }
}

impl TryFrom<u8> for Day {
    type Error = ParseDayError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Day::new(index).ok_or_else(|| ParseDayError(index.to_string()))
    }
}

/// A day name or index that does not denote a rota day.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown day: {0:?}")]
pub struct ParseDayError(pub String);

impl FromStr for Day {
    type Err = ParseDayError;

    /// Parses English or Italian weekday names, their three-letter
    /// abbreviations, or a bare index.
    ///
    /// ```
    /// use weekly_rota::domain::Day;
    ///
    /// assert_eq!("martedì".parse::<Day>().unwrap().index(), 1);
    /// assert_eq!("Thu".parse::<Day>().unwrap().index(), 3);
    /// assert_eq!("6".parse::<Day>().unwrap().name(), "Sunday");
    /// assert!("someday".parse::<Day>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('ì', "i");
        let index = match normalized.as_str() {
            "mon" | "monday" | "lun" | "lunedi" => 0,
            "tue" | "tuesday" | "mar" | "martedi" => 1,
            "wed" | "wednesday" | "mer" | "mercoledi" => 2,
            "thu" | "thursday" | "gio" | "giovedi" => 3,
            "fri" | "friday" | "ven" | "venerdi" => 4,
            "sat" | "saturday" | "sab" | "sabato" => 5,
            "sun" | "sunday" | "dom" | "domenica" => 6,
            other => other
                .parse::<u8>()
                .ok()
                .filter(|i| (*i as usize) < DAYS_PER_WEEK)
                .ok_or_else(|| ParseDayError(s.trim().to_string()))?,
        };
        Ok(Day(index))
    }
}

/// A set of days, ordered by index.
pub type DaySet = BTreeSet<Day>;

/// The two shift-days one worker takes in a week, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayPair {
    first: Day,
    second: Day,
}

impl DayPair {
    /// Builds a pair when the two days are far enough apart.
    ///
    /// Order of the arguments does not matter.
    pub fn new(a: Day, b: Day) -> Option<Self> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        (second.0 - first.0 >= MIN_SHIFT_GAP).then_some(DayPair { first, second })
    }

    pub fn first(self) -> Day {
        self.first
    }

    pub fn second(self) -> Day {
        self.second
    }

    pub fn days(self) -> [Day; 2] {
        [self.first, self.second]
    }

    /// Number of the pair's days that appear in `days`.
    pub fn overlap(self, days: &DaySet) -> usize {
        self.days().iter().filter(|d| days.contains(d)).count()
    }
}

/// A rota member.
///
/// Workers are identified by their position in the roster; the roster is
/// fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    /// Index of this worker in the roster.
    pub index: usize,
    pub name: String,
    /// Days the worker must not be scheduled.
    pub absent_days: DaySet,
    /// Days the worker would like to work. Soft.
    pub preferred_days: DaySet,
}

impl Worker {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            absent_days: DaySet::new(),
            preferred_days: DaySet::new(),
        }
    }

    pub fn with_absences(mut self, days: impl IntoIterator<Item = Day>) -> Self {
        self.absent_days.extend(days);
        self
    }

    pub fn with_preferences(mut self, days: impl IntoIterator<Item = Day>) -> Self {
        self.preferred_days.extend(days);
        self
    }
}

/// Unordered pair of two workers sharing a day, by roster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(usize, usize);

impl PairKey {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }
}

/// A complete week: exactly two workers (roster indices) on every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [[usize; WORKERS_PER_DAY]; DAYS_PER_WEEK],
}

impl WeeklySchedule {
    /// Builds a schedule from per-worker day pairs, indexed by roster position.
    ///
    /// Returns `None` unless every day ends up with exactly two workers.
    pub fn from_pairs(pairs: &[DayPair]) -> Option<Self> {
        let mut slots: [Vec<usize>; DAYS_PER_WEEK] = Default::default();
        for (worker, pair) in pairs.iter().enumerate() {
            for day in pair.days() {
                slots[day.index()].push(worker);
            }
        }

        let mut days = [[0; WORKERS_PER_DAY]; DAYS_PER_WEEK];
        for (day, workers) in slots.iter().enumerate() {
            days[day] = workers.as_slice().try_into().ok()?;
        }
        Some(Self { days })
    }

    /// Builds a schedule directly from its per-day assignment.
    #[cfg(test)]
    pub(crate) fn from_days(days: [[usize; WORKERS_PER_DAY]; DAYS_PER_WEEK]) -> Self {
        Self { days }
    }

    /// Workers on the given day.
    pub fn workers_on(&self, day: Day) -> [usize; WORKERS_PER_DAY] {
        self.days[day.index()]
    }

    /// Days worked by `worker`, in order.
    pub fn days_of(&self, worker: usize) -> Vec<Day> {
        Day::all()
            .filter(|d| self.days[d.index()].contains(&worker))
            .collect()
    }

    /// The pair of workers sharing each day, Monday first.
    pub fn pair_keys(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.days.iter().map(|[a, b]| PairKey::new(*a, *b))
    }

    /// Days whose pairing also appears in `prior`.
    pub fn repeats(&self, prior: &std::collections::HashSet<PairKey>) -> usize {
        self.pair_keys().filter(|k| prior.contains(k)).count()
    }

    pub fn days(&self) -> &[[usize; WORKERS_PER_DAY]; DAYS_PER_WEEK] {
        &self.days
    }
}
