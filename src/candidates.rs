//! Candidate day pairs for a single worker.
//!
//! Enumeration only looks at the worker's own absences. Day capacity is a
//! cross-worker constraint and is left to the search in [`crate::solver`].

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{Day, DayPair, DaySet};

/// Enumerates every legal shift pair avoiding `absent` days, in day order.
///
/// An empty result means the worker cannot be scheduled this week.
///
/// ```
/// use weekly_rota::candidates::candidate_pairs;
/// use weekly_rota::domain::{Day, DaySet};
///
/// assert_eq!(candidate_pairs(&DaySet::new()).len(), 10);
///
/// let all_but_monday: DaySet = Day::all().skip(1).collect();
/// assert!(candidate_pairs(&all_but_monday).is_empty());
/// ```
pub fn candidate_pairs(absent: &DaySet) -> Vec<DayPair> {
    let available: Vec<Day> = Day::all().filter(|d| !absent.contains(d)).collect();

    let mut pairs = Vec::new();
    for (i, &first) in available.iter().enumerate() {
        for &second in &available[i + 1..] {
            if let Some(pair) = DayPair::new(first, second) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// A candidate together with its preference score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedPair {
    /// Number of preferred days the pair contains.
    pub score: usize,
    pub pair: DayPair,
}

/// Orders candidates by descending preference score.
///
/// The sort is stable, so pairs with equal scores keep their input order.
/// An empty preference set scores every pair 0.
pub fn rank_by_preference(candidates: &[DayPair], preferred: &DaySet) -> Vec<RankedPair> {
    let mut ranked: Vec<RankedPair> = candidates
        .iter()
        .map(|&pair| RankedPair {
            score: pair.overlap(preferred),
            pair,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Shuffles each run of equal-score candidates in place, keeping the runs in
/// rank order.
pub fn shuffle_within_ranks<R: Rng + ?Sized>(ranked: &mut [RankedPair], rng: &mut R) {
    for group in ranked.chunk_by_mut(|a, b| a.score == b.score) {
        group.shuffle(rng);
    }
}
