//! Spawn cadence and enemy-kind selection
//!
//! The spawner is polled by the periodic spawn-tick timer. It keeps a schedule
//! baseline (time of the last spawn) and a current delay derived from the
//! phase table and burst state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::clock::BurstState;
use super::enemy::{EnemyCensus, EnemyKind};
use crate::tuning::{EnemyWeights, PhaseSettings, SpawnerTuning};

/// Hook that adjusts phase weights for the current burst state and stage
pub trait SpawnModifier: std::fmt::Debug {
    fn adjust_weights(&self, base: EnemyWeights, burst: BurstState, stage: u32) -> EnemyWeights;
}

/// Default modifier: bursts favour runners, later stages add tank weight
#[derive(Debug, Clone)]
pub struct StageRampModifier {
    pub burst_runner_weight_multiplier: f32,
    pub tank_weight_per_stage: f32,
}

impl StageRampModifier {
    pub fn from_tuning(tuning: &SpawnerTuning) -> Self {
        Self {
            burst_runner_weight_multiplier: tuning.burst_runner_weight_multiplier,
            tank_weight_per_stage: tuning.tank_weight_per_stage,
        }
    }
}

impl SpawnModifier for StageRampModifier {
    fn adjust_weights(&self, base: EnemyWeights, burst: BurstState, stage: u32) -> EnemyWeights {
        let mut weights = base;
        if burst == BurstState::Burst {
            weights.runner *= self.burst_runner_weight_multiplier;
        }
        // Only ramp kinds the phase allows at all
        if weights.tank > 0.0 {
            weights.tank += self.tank_weight_per_stage * stage.saturating_sub(1) as f32;
        }
        weights
    }
}

/// A decision to spawn one enemy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub kind: EnemyKind,
    /// A tank was drawn but the tank cap forced a runner
    pub forced_runner: bool,
}

#[derive(Debug)]
pub struct Spawner {
    tuning: SpawnerTuning,
    modifier: Box<dyn SpawnModifier>,
    /// Time of the last spawn (or of the last restart)
    baseline_ms: u64,
    next_spawn_at_ms: u64,
    current_delay_ms: u64,
}

impl Spawner {
    pub fn new(tuning: SpawnerTuning) -> Self {
        let modifier = Box::new(StageRampModifier::from_tuning(&tuning));
        Self::with_modifier(tuning, modifier)
    }

    pub fn with_modifier(tuning: SpawnerTuning, modifier: Box<dyn SpawnModifier>) -> Self {
        Self {
            tuning,
            modifier,
            baseline_ms: 0,
            next_spawn_at_ms: 0,
            current_delay_ms: 0,
        }
    }

    pub fn next_spawn_at_ms(&self) -> u64 {
        self.next_spawn_at_ms
    }

    pub fn current_delay_ms(&self) -> u64 {
        self.current_delay_ms
    }

    /// Delay until the next spawn for a phase and burst state
    pub fn spawn_delay_ms(&self, phase: &PhaseSettings, burst: BurstState) -> u64 {
        let multiplier = match burst {
            BurstState::Idle => 1.0,
            BurstState::Burst => self.tuning.burst_delay_multiplier,
            BurstState::Recovery => self.tuning.recovery_delay_multiplier,
        };
        let scaled = (phase.spawn_delay_ms as f32 * multiplier).round() as u64;
        scaled.max(self.tuning.min_spawn_delay_ms)
    }

    /// Restart the schedule from `now` (match start, stage resume)
    pub fn restart(&mut self, now_ms: u64, phase: &PhaseSettings, burst: BurstState) {
        self.baseline_ms = now_ms;
        self.current_delay_ms = self.spawn_delay_ms(phase, burst);
        self.next_spawn_at_ms = now_ms + self.current_delay_ms;
    }

    /// Recompute the timer after a phase or burst change.
    /// A spawn that is already due stays due.
    pub fn reschedule(&mut self, now_ms: u64, phase: &PhaseSettings, burst: BurstState) {
        self.current_delay_ms = self.spawn_delay_ms(phase, burst);
        if self.next_spawn_at_ms <= now_ms {
            return;
        }
        self.next_spawn_at_ms = self.baseline_ms + self.current_delay_ms;
    }

    /// Decide whether to spawn at `now`
    pub fn poll<C, R>(
        &mut self,
        now_ms: u64,
        phase: &PhaseSettings,
        burst: BurstState,
        stage: u32,
        census: &C,
        rng: &mut R,
    ) -> Option<SpawnRequest>
    where
        C: EnemyCensus + ?Sized,
        R: Rng + ?Sized,
    {
        if now_ms < self.next_spawn_at_ms {
            return None;
        }

        if census.alive_count() >= phase.max_alive as usize {
            log::trace!("Spawn deferred: {} alive (cap {})", census.alive_count(), phase.max_alive);
            self.next_spawn_at_ms = now_ms + self.tuning.cap_retry_delay_ms;
            return None;
        }

        let weights = self.modifier.adjust_weights(phase.weights, burst, stage);
        let drawn = draw_kind(&weights, rng);
        let forced_runner = drawn == EnemyKind::Tank && census.tank_count() >= phase.tank_cap as usize;
        let kind = if forced_runner { EnemyKind::Runner } else { drawn };

        self.baseline_ms = now_ms;
        self.current_delay_ms = self.spawn_delay_ms(phase, burst);
        self.next_spawn_at_ms = now_ms + self.current_delay_ms;

        Some(SpawnRequest { kind, forced_runner })
    }
}

/// Draw an enemy kind proportionally to its weight
fn draw_kind<R: Rng + ?Sized>(weights: &EnemyWeights, rng: &mut R) -> EnemyKind {
    let total = weights.total();
    if total <= 0.0 {
        return EnemyKind::Runner;
    }
    let mut roll = rng.random_range(0.0..total);
    for kind in EnemyKind::ALL {
        let weight = weights.get(kind).max(0.0);
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    EnemyKind::Runner
}
