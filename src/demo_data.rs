//! Demo rosters for the weekly rota.

use crate::domain::{Day, Worker};

/// Names of the default seven-person roster.
pub const DEFAULT_ROSTER: [&str; 7] = [
    "Giova",
    "Stefi",
    "Fede",
    "Daniela",
    "Anastasia",
    "Ros",
    "Marti",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    /// Nobody is absent, nobody has preferences.
    Open,
    /// A few absences and preferences spread over the week.
    Constrained,
    /// Absences force the first two workers to share Monday every week.
    Pinned,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(DemoData::Open),
            "CONSTRAINED" => Ok(DemoData::Constrained),
            "PINNED" => Ok(DemoData::Pinned),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Open => "OPEN",
            DemoData::Constrained => "CONSTRAINED",
            DemoData::Pinned => "PINNED",
        }
    }
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["OPEN", "CONSTRAINED", "PINNED"]
}

/// The default roster without absences or preferences.
pub fn roster() -> Vec<Worker> {
    DEFAULT_ROSTER
        .iter()
        .enumerate()
        .map(|(i, name)| Worker::new(i, *name))
        .collect()
}

/// Generates the workers of a demo data set.
pub fn generate(demo: DemoData) -> Vec<Worker> {
    let mut workers = roster();

    match demo {
        DemoData::Open => {}
        DemoData::Constrained => {
            workers[0].absent_days.extend(days(&[1, 2]));
            workers[2].absent_days.extend(days(&[6]));
            workers[3].preferred_days.extend(days(&[0, 4]));
            workers[5].absent_days.extend(days(&[3]));
            workers[5].preferred_days.extend(days(&[1]));
            workers[6].preferred_days.extend(days(&[2, 5]));
        }
        DemoData::Pinned => {
            workers[0].absent_days.extend(days(&[1, 2, 4, 5, 6]));
            workers[1].absent_days.extend(days(&[1, 2, 3]));
        }
    }

    workers
}

fn days(indices: &[u8]) -> impl Iterator<Item = Day> + '_ {
    indices.iter().filter_map(|&i| Day::new(i))
}
