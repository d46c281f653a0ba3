//! JSON-backed rota state: absences, preferences and generated weeks.
//!
//! All state sits behind a single lock. Regeneration holds it from reading
//! last week's pairings until the new week is on disk, so two generations
//! can never interleave.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Day, Worker};
use crate::dto::{DayMap, HistoryFile, HistoryRecord, StateDto};
use crate::solver::{generate, Accepted, GenerationError, SolverConfig};

const HISTORY_FILE: &str = "history.json";
const ABSENCES_FILE: &str = "absences.json";
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt state file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown worker: {0}")]
    UnknownWorker(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Which per-worker day list an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayList {
    Absences,
    Preferences,
}

/// Outcome of editing a day list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Change {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
}

struct State {
    absences: DayMap,
    preferences: DayMap,
    history: HistoryFile,
    rng: StdRng,
}

impl State {
    fn days_mut(&mut self, list: DayList) -> &mut DayMap {
        match list {
            DayList::Absences => &mut self.absences,
            DayList::Preferences => &mut self.preferences,
        }
    }
}

pub struct Store {
    dir: PathBuf,
    roster: Vec<String>,
    state: Mutex<State>,
}

impl Store {
    /// Opens the store in `dir`. Missing files load as empty state.
    ///
    /// `seed` fixes the generator's random source; entropy otherwise.
    pub fn open(
        dir: impl Into<PathBuf>,
        roster: Vec<String>,
        seed: Option<u64>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        let absences: DayMap = read_json(&dir.join(ABSENCES_FILE))?.unwrap_or_default();
        let preferences: DayMap = read_json(&dir.join(PREFERENCES_FILE))?.unwrap_or_default();
        let history: HistoryFile = read_json(&dir.join(HISTORY_FILE))?.unwrap_or_default();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            dir = %dir.display(),
            weeks = history.history.len(),
            "Opened rota store"
        );

        Ok(Self {
            dir,
            roster,
            state: Mutex::new(State {
                absences,
                preferences,
                history,
                rng,
            }),
        })
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Resolves a user-typed name to its roster spelling, ignoring case.
    pub fn resolve_worker(&self, raw: &str) -> Result<&str, StoreError> {
        let wanted = raw.trim().to_lowercase();
        self.roster
            .iter()
            .find(|name| name.to_lowercase() == wanted)
            .map(String::as_str)
            .ok_or_else(|| StoreError::UnknownWorker(raw.trim().to_string()))
    }

    /// Adds `day` to a worker's absences or preferences.
    pub fn add_day(&self, list: DayList, worker: &str, day: Day) -> Result<Change, StoreError> {
        let name = self.resolve_worker(worker)?.to_string();
        let mut state = self.state.lock();
        if !state.days_mut(list).entry(name.clone()).or_default().insert(day) {
            return Ok(Change::AlreadyPresent);
        }
        if let Err(e) = self.save_days(&state, list) {
            take_day(state.days_mut(list), &name, day);
            return Err(e);
        }
        info!(worker = %name, day = %day, list = ?list, "Day added");
        Ok(Change::Added)
    }

    /// Removes `day` from a worker's absences or preferences.
    pub fn remove_day(&self, list: DayList, worker: &str, day: Day) -> Result<Change, StoreError> {
        let name = self.resolve_worker(worker)?.to_string();
        let mut state = self.state.lock();
        if !take_day(state.days_mut(list), &name, day) {
            return Ok(Change::NotPresent);
        }
        if let Err(e) = self.save_days(&state, list) {
            state.days_mut(list).entry(name).or_default().insert(day);
            return Err(e);
        }
        info!(worker = %name, day = %day, list = ?list, "Day removed");
        Ok(Change::Removed)
    }

    /// Roster workers carrying their current absences and preferences.
    #[cfg(test)]
    fn workers(&self) -> Vec<Worker> {
        let state = self.state.lock();
        self.workers_from(&state)
    }

    fn workers_from(&self, state: &State) -> Vec<Worker> {
        self.roster
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut worker = Worker::new(i, name.clone());
                if let Some(days) = state.absences.get(name) {
                    worker.absent_days = days.clone();
                }
                if let Some(days) = state.preferences.get(name) {
                    worker.preferred_days = days.clone();
                }
                worker
            })
            .collect()
    }

    /// Most recently generated week.
    pub fn latest(&self) -> Option<HistoryRecord> {
        self.state.lock().history.history.last().cloned()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.state.lock().history.history.clone()
    }

    pub fn state(&self) -> StateDto {
        let state = self.state.lock();
        StateDto {
            absences: state.absences.clone(),
            preferences: state.preferences.clone(),
            weeks_stored: state.history.history.len(),
        }
    }

    /// Generates a new week against the latest one and appends it to history.
    ///
    /// Nothing is recorded when generation or saving fails.
    pub fn regenerate(
        &self,
        config: &SolverConfig,
    ) -> Result<(HistoryRecord, Accepted), StoreError> {
        let mut state = self.state.lock();
        let workers = self.workers_from(&state);
        let prior = state
            .history
            .history
            .last()
            .map(|record| record.pair_keys(&workers))
            .unwrap_or_default();
        debug!(prior_pairs = prior.len(), "Regenerating week");

        let accepted = generate(&workers, &prior, config, &mut state.rng)?;
        let record = HistoryRecord::new(&accepted.schedule, &workers, Utc::now());

        state.history.history.push(record.clone());
        if let Err(e) = write_json(&self.dir, HISTORY_FILE, &state.history) {
            state.history.history.pop();
            return Err(e);
        }
        info!(
            id = %record.id,
            attempts = accepted.attempts,
            repeats = accepted.repeats,
            "Week stored"
        );
        Ok((record, accepted))
    }

    fn save_days(&self, state: &State, list: DayList) -> Result<(), StoreError> {
        match list {
            DayList::Absences => write_json(&self.dir, ABSENCES_FILE, &state.absences),
            DayList::Preferences => write_json(&self.dir, PREFERENCES_FILE, &state.preferences),
        }
    }
}

/// Removes `day` from a worker's entry, dropping the entry once it is empty.
fn take_day(map: &mut DayMap, name: &str, day: Day) -> bool {
    let removed = map.get_mut(name).is_some_and(|set| set.remove(&day));
    if map.get(name).is_some_and(|set| set.is_empty()) {
        map.remove(name);
    }
    removed
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes through a temporary file so a crash never leaves half a file.
fn write_json<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<(), StoreError> {
    let path = dir.join(file);
    let io_err = |source| StoreError::Io {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;
    let text = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    let tmp = dir.join(format!("{file}.tmp"));
    std::fs::write(&tmp, text).map_err(io_err)?;
    std::fs::rename(&tmp, &path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::DEFAULT_ROSTER;
    use crate::domain::DaySet;
    use crate::solver::AcceptanceTier;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rota-store-{}", uuid::Uuid::new_v4()))
    }

    fn open(dir: &Path) -> Store {
        let roster = DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect();
        Store::open(dir, roster, Some(17)).unwrap()
    }

    fn day(i: u8) -> Day {
        Day::new(i).unwrap()
    }

    #[test]
    fn test_empty_dir_opens_empty() {
        let dir = temp_dir();
        let store = open(&dir);

        assert!(store.latest().is_none());
        assert_eq!(store.state().weeks_stored, 0);
        assert!(!dir.exists());
    }

    #[test]
    fn test_resolve_worker_ignores_case() {
        let store = open(&temp_dir());

        assert_eq!(store.resolve_worker(" fede ").unwrap(), "Fede");
        assert!(matches!(
            store.resolve_worker("Nobody"),
            Err(StoreError::UnknownWorker(name)) if name == "Nobody"
        ));
    }

    #[test]
    fn test_absences_persist() {
        let dir = temp_dir();
        let store = open(&dir);

        assert_eq!(store.add_day(DayList::Absences, "fede", day(1)).unwrap(), Change::Added);
        assert_eq!(
            store.add_day(DayList::Absences, "Fede", day(1)).unwrap(),
            Change::AlreadyPresent
        );
        store.add_day(DayList::Preferences, "Marti", day(3)).unwrap();

        let reopened = open(&dir);
        let workers = reopened.workers();
        assert_eq!(workers[2].absent_days, DaySet::from([day(1)]));
        assert_eq!(workers[6].preferred_days, DaySet::from([day(3)]));

        let json = std::fs::read_to_string(dir.join(ABSENCES_FILE)).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(raw["Fede"], serde_json::json!([1]));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_remove_day() {
        let dir = temp_dir();
        let store = open(&dir);
        store.add_day(DayList::Absences, "Ros", day(5)).unwrap();

        assert_eq!(store.remove_day(DayList::Absences, "ros", day(5)).unwrap(), Change::Removed);
        assert_eq!(
            store.remove_day(DayList::Absences, "Ros", day(5)).unwrap(),
            Change::NotPresent
        );
        assert!(store.state().absences.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_regenerate_appends_history() {
        let dir = temp_dir();
        let store = open(&dir);

        let (first, accepted) = store.regenerate(&SolverConfig::default()).unwrap();
        assert_eq!(accepted.tier, AcceptanceTier::Optimal);
        let (second, accepted) = store.regenerate(&SolverConfig::default()).unwrap();
        assert_eq!(accepted.repeats, 0);

        // The second week avoids every pairing of the first.
        let workers = store.workers();
        assert!(first.pair_keys(&workers).is_disjoint(&second.pair_keys(&workers)));

        let reopened = open(&dir);
        let history = reopened.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].id, second.id);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_generation_leaves_history_untouched() {
        let dir = temp_dir();
        let store = open(&dir);
        store.regenerate(&SolverConfig::default()).unwrap();
        for i in 1..7 {
            store.add_day(DayList::Absences, "Giova", day(i)).unwrap();
        }

        let err = store.regenerate(&SolverConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            StoreError::Generation(GenerationError::NoFeasibleAssignment { ref blocked })
                if blocked == &vec!["Giova".to_string()]
        ));
        assert_eq!(store.history().len(), 1);
        assert_eq!(open(&dir).history().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_save_rolls_back_edit() {
        let dir = temp_dir();
        let store = open(&dir);
        // A plain file where the data directory should be makes every write fail.
        std::fs::write(&dir, "not a directory").unwrap();

        let first = store.add_day(DayList::Absences, "Fede", day(1));
        assert!(matches!(first, Err(StoreError::Io { .. })));
        assert!(matches!(
            store.add_day(DayList::Absences, "Fede", day(1)),
            Err(StoreError::Io { .. })
        ));
        assert!(store.state().absences.is_empty());
        assert!(store.workers()[2].absent_days.is_empty());
        std::fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn test_failed_save_restores_removed_day() {
        let dir = temp_dir();
        let store = open(&dir);
        store.add_day(DayList::Preferences, "Marti", day(3)).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "not a directory").unwrap();

        let result = store.remove_day(DayList::Preferences, "Marti", day(3));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.state().preferences["Marti"], DaySet::from([day(3)]));
        std::fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(HISTORY_FILE), "[oops").unwrap();

        let roster = DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect();
        let result = Store::open(&dir, roster, None);

        assert!(matches!(result, Err(StoreError::Json { .. })));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
