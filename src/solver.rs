//! Randomized constructive search for a weekly rota.
//!
//! Every attempt builds a full week greedily: workers are taken most
//! constrained first (random tie-break), each grabs the first of its shuffled,
//! preference-ranked candidate pairs whose days still have room. A dead end
//! abandons the attempt; the next one starts over with fresh randomness.
//!
//! Accepted weeks either repeat none of last week's pairings, or, once
//! `fallback_after` attempts have been spent, at most `max_fallback_repeats`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::candidates::{candidate_pairs, rank_by_preference, shuffle_within_ranks};
use crate::domain::{
    DayPair, DaySet, PairKey, WeeklySchedule, Worker, DAYS_PER_WEEK, WORKERS_PER_DAY,
};

/// Default attempt budget per generation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5000;

/// Attempts after which a week with a repeated pairing may be accepted.
pub const DEFAULT_FALLBACK_AFTER: u32 = 2000;

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverConfig {
    /// Stop after this many attempts.
    pub max_attempts: u32,
    /// Fallback acceptance only applies once the attempt counter exceeds this.
    pub fallback_after: u32,
    /// Repeated pairings tolerated by fallback acceptance.
    pub max_fallback_repeats: usize,
    /// Rank candidates by preferred days before shuffling.
    pub honour_preferences: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fallback_after: DEFAULT_FALLBACK_AFTER,
            max_fallback_repeats: 1,
            honour_preferences: true,
        }
    }
}

impl SolverConfig {
    /// Same config with a different attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Which acceptance rule admitted the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcceptanceTier {
    /// No pairing from last week recurs.
    Optimal,
    /// Accepted late in the budget with a bounded number of repeats.
    Fallback,
}

/// A week accepted by the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub schedule: WeeklySchedule,
    /// Attempts used, including the accepted one.
    pub attempts: u32,
    /// Days whose pairing also appeared last week.
    pub repeats: usize,
    pub tier: AcceptanceTier,
}

/// Terminal failures of [`generate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Absences leave these workers without any legal day pair.
    #[error("no feasible assignment: no legal day pair for {}", .blocked.join(", "))]
    NoFeasibleAssignment { blocked: Vec<String> },
    /// The attempt budget ran out before an acceptable week was found.
    #[error("generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },
}

/// Generates a week for `workers`, avoiding the pairings in `prior`.
///
/// `workers` must be the roster in index order. Inputs are read only; the
/// caller owns persisting the result.
///
/// # Examples
///
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use std::collections::HashSet;
/// use weekly_rota::demo_data::roster;
/// use weekly_rota::solver::{generate, AcceptanceTier, SolverConfig};
///
/// let workers = roster();
/// let mut rng = StdRng::seed_from_u64(42);
/// let accepted = generate(&workers, &HashSet::new(), &SolverConfig::default(), &mut rng).unwrap();
///
/// assert_eq!(accepted.tier, AcceptanceTier::Optimal);
/// assert_eq!(accepted.schedule.days_of(0).len(), 2);
/// ```
pub fn generate<R: Rng + ?Sized>(
    workers: &[Worker],
    prior: &HashSet<PairKey>,
    config: &SolverConfig,
    rng: &mut R,
) -> Result<Accepted, GenerationError> {
    debug_assert!(
        workers.iter().enumerate().all(|(i, w)| w.index == i),
        "workers must be in roster index order"
    );
    let candidates: Vec<Vec<DayPair>> = workers
        .iter()
        .map(|w| candidate_pairs(&w.absent_days))
        .collect();

    let blocked: Vec<String> = workers
        .iter()
        .zip(&candidates)
        .filter(|(_, pairs)| pairs.is_empty())
        .map(|(w, _)| w.name.clone())
        .collect();
    if !blocked.is_empty() {
        warn!(blocked = ?blocked, "Absences leave workers without a legal day pair");
        return Err(GenerationError::NoFeasibleAssignment { blocked });
    }

    let mut order: Vec<usize> = (0..workers.len()).collect();

    for attempt in 1..=config.max_attempts {
        // Most constrained first; the shuffle breaks ties differently every attempt.
        order.shuffle(rng);
        order.sort_by_key(|&w| candidates[w].len());

        let Some(schedule) = construct(workers, &candidates, &order, config, rng) else {
            continue;
        };

        let repeats = schedule.repeats(prior);
        let tier = if repeats == 0 {
            AcceptanceTier::Optimal
        } else if attempt > config.fallback_after && repeats <= config.max_fallback_repeats {
            AcceptanceTier::Fallback
        } else {
            debug!(attempt, repeats, "Rejected week with repeated pairings");
            continue;
        };

        info!(attempts = attempt, repeats, tier = ?tier, "Week generated");
        return Ok(Accepted {
            schedule,
            attempts: attempt,
            repeats,
            tier,
        });
    }

    warn!(attempts = config.max_attempts, "Week generation exhausted");
    Err(GenerationError::GenerationExhausted {
        attempts: config.max_attempts,
    })
}

/// One greedy pass over `order`. Returns `None` on any dead end.
fn construct<R: Rng + ?Sized>(
    workers: &[Worker],
    candidates: &[Vec<DayPair>],
    order: &[usize],
    config: &SolverConfig,
    rng: &mut R,
) -> Option<WeeklySchedule> {
    let no_preferences = DaySet::new();
    let mut capacity = [WORKERS_PER_DAY; DAYS_PER_WEEK];
    let mut chosen: Vec<Option<DayPair>> = vec![None; workers.len()];

    for &w in order {
        let preferred = if config.honour_preferences {
            &workers[w].preferred_days
        } else {
            &no_preferences
        };
        let mut ranked = rank_by_preference(&candidates[w], preferred);
        shuffle_within_ranks(&mut ranked, rng);

        let pair = ranked
            .iter()
            .map(|r| r.pair)
            .find(|p| p.days().iter().all(|d| capacity[d.index()] > 0))?;

        for day in pair.days() {
            capacity[day.index()] -= 1;
        }
        chosen[w] = Some(pair);
    }

    if capacity.iter().any(|&c| c != 0) {
        return None;
    }

    let pairs: Vec<DayPair> = chosen.into_iter().collect::<Option<_>>()?;
    WeeklySchedule::from_pairs(&pairs)
}
