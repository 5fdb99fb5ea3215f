//! Threshold evolution — a small genetic search over the momentum threshold.
//!
//! Each gene is one threshold. A gene's fitness is the return on capital of
//! the trades a fresh ledger closes while replaying the same ticks with that
//! threshold. Positions still open at the end are not counted.
//!
//! Per generation: evaluate every gene (in parallel), keep the top half, refill
//! with mutated copies of random survivors. Evaluation is pure and the RNG is
//! only touched on the calling thread, so results do not depend on thread count.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use perpsim_core::domain::MarketSnapshot;
use perpsim_core::ledger::Ledger;
use perpsim_core::signals::MomentumSelector;

use crate::config::{invalid, ConfigError, SimConfig};
use crate::metrics::return_on_capital;
use crate::session::run_tick;

#[derive(Debug, Error)]
pub enum EvolveError {
    #[error("no snapshots to evaluate against")]
    NoSnapshots,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Ticks replayed per fitness evaluation.
    pub ticks_per_eval: usize,
    /// Initial thresholds are drawn uniformly from this range.
    pub initial_min: f64,
    pub initial_max: f64,
    /// Mutation adds a uniform draw from `[-mutation_step, mutation_step]`.
    pub mutation_step: f64,
    /// Mutated thresholds are clamped into `[floor, ceiling]`.
    pub floor: f64,
    pub ceiling: f64,
    pub seed: u64,
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 5,
            ticks_per_eval: 50,
            initial_min: 5.0,
            initial_max: 15.0,
            mutation_step: 1.0,
            floor: 1.0,
            ceiling: 25.0,
            seed: 42,
        }
    }
}

impl EvolveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(invalid("evolve.population_size", "must be at least 2"));
        }
        for (field, value) in [
            ("evolve.initial_min", self.initial_min),
            ("evolve.initial_max", self.initial_max),
            ("evolve.floor", self.floor),
            ("evolve.ceiling", self.ceiling),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        if !(self.floor > 0.0 && self.floor <= self.ceiling) {
            return Err(invalid("evolve.floor", "must be positive and not above ceiling"));
        }
        if !(self.initial_min > 0.0 && self.initial_min <= self.initial_max) {
            return Err(invalid("evolve.initial_min", "must be positive and not above initial_max"));
        }
        // wider steps only ever clamp, and an unbounded range overflows the sampler
        if !(self.mutation_step >= 0.0 && self.mutation_step <= self.ceiling - self.floor) {
            return Err(invalid("evolve.mutation_step", "must be between 0 and ceiling - floor"));
        }
        Ok(())
    }
}

/// One evaluated gene. Serialized names are the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneResult {
    #[serde(rename = "Generation")]
    pub generation: usize,
    #[serde(rename = "Gene#")]
    pub gene: usize,
    #[serde(rename = "Momentum_Threshold")]
    pub threshold: f64,
    #[serde(rename = "ROE_Fitness")]
    pub fitness: f64,
}

/// Fitness spread of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    #[serde(rename = "Generation")]
    pub generation: usize,
    #[serde(rename = "Mean_Fitness")]
    pub mean_fitness: f64,
    #[serde(rename = "Max_Fitness")]
    pub max_fitness: f64,
    /// Threshold of the generation's fittest gene.
    #[serde(rename = "Best_Threshold")]
    pub best_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct EvolutionResult {
    /// Every evaluation, by generation then gene.
    pub rows: Vec<GeneResult>,
    /// One entry per generation, in order.
    pub generations: Vec<GenerationStats>,
    /// Fittest gene seen; earliest wins ties.
    pub best: GeneResult,
}

/// Cycle `snapshots` out to `count` ticks, stamped `interval` apart from the
/// first snapshot's time so cooldowns see a steady clock.
pub fn stamped_ticks(snapshots: &[MarketSnapshot], count: usize, interval: Duration) -> Vec<MarketSnapshot> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };
    let start = first.taken_at;
    snapshots
        .iter()
        .cycle()
        .take(count)
        .zip(0i32..)
        .map(|(snap, i)| MarketSnapshot {
            taken_at: start + interval * i,
            tickers: snap.tickers.clone(),
        })
        .collect()
}

/// Return on capital of the trades closed while replaying `ticks` at `threshold`.
pub fn evaluate_threshold(threshold: f64, sim: &SimConfig, ticks: &[MarketSnapshot]) -> f64 {
    let mut ledger = Ledger::new(sim.starting_capital, sim.risk.clone());
    let selector = MomentumSelector::new(sim.signals.clone()).with_threshold(threshold);
    for snapshot in ticks {
        run_tick(&mut ledger, &selector, snapshot, sim.session.signal_limit);
    }
    return_on_capital(ledger.trade_history())
}

pub fn evolve(sim: &SimConfig, snapshots: &[MarketSnapshot]) -> Result<EvolutionResult, EvolveError> {
    let config = &sim.evolve;
    config.validate()?;
    if snapshots.is_empty() {
        return Err(EvolveError::NoSnapshots);
    }

    let interval = Duration::milliseconds(sim.session.tick_interval_ms as i64);
    let ticks = stamped_ticks(snapshots, config.ticks_per_eval, interval);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut population: Vec<f64> = (0..config.population_size)
        .map(|_| rng.gen_range(config.initial_min..=config.initial_max))
        .collect();
    let mut rows = Vec::with_capacity(config.population_size * config.generations);
    let mut generations = Vec::with_capacity(config.generations);

    for generation in 1..=config.generations {
        let fitness: Vec<f64> = population
            .par_iter()
            .map(|&threshold| evaluate_threshold(threshold, sim, &ticks))
            .collect();

        rows.extend(
            population
                .iter()
                .zip(&fitness)
                .enumerate()
                .map(|(i, (&threshold, &fitness))| GeneResult {
                    generation,
                    gene: i + 1,
                    threshold,
                    fitness,
                }),
        );

        let mean_fitness = fitness.iter().sum::<f64>() / fitness.len() as f64;
        let mut ranked: Vec<(f64, f64)> = population.iter().copied().zip(fitness).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (best_threshold, max_fitness) = ranked[0];
        info!(
            generation,
            best_threshold,
            max_fitness,
            mean_fitness,
            "generation evaluated"
        );
        generations.push(GenerationStats {
            generation,
            mean_fitness,
            max_fitness,
            best_threshold,
        });

        let keep = (config.population_size / 2).max(1);
        let survivors: Vec<f64> = ranked.iter().take(keep).map(|&(t, _)| t).collect();
        population = survivors.clone();
        while population.len() < config.population_size {
            let parent = survivors[rng.gen_range(0..survivors.len())];
            let delta = rng.gen_range(-config.mutation_step..=config.mutation_step);
            population.push((parent + delta).clamp(config.floor, config.ceiling));
        }
    }

    let best = rows
        .iter()
        .fold(None::<&GeneResult>, |best, row| match best {
            Some(b) if b.fitness >= row.fitness => Some(b),
            _ => Some(row),
        })
        .cloned()
        .unwrap_or(GeneResult {
            generation: 0,
            gene: 0,
            threshold: sim.signals.momentum_threshold,
            fitness: 0.0,
        });

    Ok(EvolutionResult {
        rows,
        generations,
        best,
    })
}

/// Evolution rows as CSV: `Generation,Gene#,Momentum_Threshold,ROE_Fitness`.
pub fn export_evolution_csv(rows: &[GeneResult]) -> anyhow::Result<String> {
    serialize_csv(rows)
}

/// Per-generation series as CSV: `Generation,Mean_Fitness,Max_Fitness,Best_Threshold`.
pub fn export_generation_csv(generations: &[GenerationStats]) -> anyhow::Result<String> {
    serialize_csv(generations)
}

fn serialize_csv<T: Serialize>(records: &[T]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV writer: {e}"))?;
    Ok(String::from_utf8(data)?)
}
