//! Serializable records for persistence and the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{Day, DaySet, PairKey, WeeklySchedule, Worker};
use crate::solver::{Accepted, AcceptanceTier};

/// A generated week as stored in the history file, by worker name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// One entry per day, Monday first, each holding the names on shift.
    pub schedule: Vec<Vec<String>>,
}

impl HistoryRecord {
    pub fn new(schedule: &WeeklySchedule, workers: &[Worker], generated_at: DateTime<Utc>) -> Self {
        let schedule = schedule
            .days()
            .iter()
            .map(|day| day.iter().map(|&w| workers[w].name.clone()).collect())
            .collect();

        Self {
            id: Uuid::new_v4(),
            generated_at,
            schedule,
        }
    }

    /// Names on shift on `day`; empty if the record has no entry for it.
    pub fn workers_on(&self, day: Day) -> &[String] {
        self.schedule
            .get(day.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Pairings of this week, resolved against the current roster.
    ///
    /// Names no longer on the roster are skipped.
    pub fn pair_keys(&self, workers: &[Worker]) -> HashSet<PairKey> {
        let name_to_idx: HashMap<&str, usize> = workers
            .iter()
            .map(|w| (w.name.as_str(), w.index))
            .collect();

        let mut keys = HashSet::new();
        for names in &self.schedule {
            let indices: Vec<usize> = names
                .iter()
                .filter_map(|n| name_to_idx.get(n.as_str()).copied())
                .collect();
            for (i, &a) in indices.iter().enumerate() {
                for &b in &indices[i + 1..] {
                    keys.insert(PairKey::new(a, b));
                }
            }
        }
        keys
    }
}

/// History file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

/// Per-worker day lists, keyed by worker name.
pub type DayMap = BTreeMap<String, DaySet>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAssignmentDto {
    pub day: Day,
    pub name: &'static str,
    pub workers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekDto {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub days: Vec<DayAssignmentDto>,
}

impl From<&HistoryRecord> for WeekDto {
    fn from(record: &HistoryRecord) -> Self {
        let days = Day::all()
            .map(|day| DayAssignmentDto {
                day,
                name: day.name(),
                workers: record.workers_on(day).to_vec(),
            })
            .collect();

        Self {
            id: record.id,
            generated_at: record.generated_at,
            days,
        }
    }
}

/// Response for a successful regeneration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWeekDto {
    pub week: WeekDto,
    pub attempts: u32,
    pub repeats: usize,
    pub tier: AcceptanceTier,
}

impl GeneratedWeekDto {
    pub fn new(record: &HistoryRecord, accepted: &Accepted) -> Self {
        Self {
            week: WeekDto::from(record),
            attempts: accepted.attempts,
            repeats: accepted.repeats,
            tier: accepted.tier,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDto {
    pub absences: DayMap,
    pub preferences: DayMap,
    pub weeks_stored: usize,
}
