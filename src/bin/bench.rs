//! Benchmark for chained weekly generation.
//!
//! Run with: cargo run --release --bin bench [OPEN|CONSTRAINED|PINNED] [weeks]

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::Instant;
use weekly_rota::demo_data::{self, DemoData};
use weekly_rota::solver::{generate, AcceptanceTier, SolverConfig};

fn main() {
    let mut args = std::env::args().skip(1);
    let demo = args
        .next()
        .and_then(|s| s.parse::<DemoData>().ok())
        .unwrap_or(DemoData::Constrained);
    let weeks: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(1000);

    let workers = demo_data::generate(demo);
    let config = SolverConfig::default();
    let mut rng = StdRng::seed_from_u64(42);

    println!("Benchmark: Chained Weekly Generation");
    println!("  Demo data: {} (available: {})", demo.as_str(), demo_data::list_demo_data().join(", "));
    println!("  Workers: {}", workers.len());
    println!("  Weeks: {}", weeks);
    println!();

    // Each week is generated against the pairings of the previous one.
    let bench_start = Instant::now();
    let mut prior = HashSet::new();
    let (mut attempts, mut max_attempts) = (0u64, 0u32);
    let (mut optimal, mut fallback, mut failed) = (0usize, 0usize, 0usize);

    for _ in 0..weeks {
        match generate(&workers, &prior, &config, &mut rng) {
            Ok(accepted) => {
                attempts += accepted.attempts as u64;
                max_attempts = max_attempts.max(accepted.attempts);
                match accepted.tier {
                    AcceptanceTier::Optimal => optimal += 1,
                    AcceptanceTier::Fallback => fallback += 1,
                }
                prior = accepted.schedule.pair_keys().collect();
            }
            Err(e) => {
                println!("  Generation failed: {}", e);
                failed += 1;
            }
        }
    }

    let elapsed = bench_start.elapsed();
    let generated = optimal + fallback;

    println!("Results:");
    println!("  Optimal: {}", optimal);
    println!("  Fallback: {}", fallback);
    println!("  Failed: {}", failed);
    if generated > 0 {
        println!("  Mean attempts: {:.1}", attempts as f64 / generated as f64);
    }
    println!("  Max attempts: {}", max_attempts);
    println!("  Time: {:.2?}", elapsed);
    println!("  Generations/sec: {:.0}", weeks as f64 / elapsed.as_secs_f64());
}
