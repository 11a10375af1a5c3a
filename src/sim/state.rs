//! Game state and core simulation types
//!
//! [`GameState`] owns every system instance. Systems never hold references
//! into each other; the tick in `tick.rs` moves ids and values between them.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::buff::BuffSystem;
use super::clock::StageClock;
use super::enemy::EnemyRegistry;
use super::events::GameEvent;
use super::loot::LootSystem;
use super::perk::PerkSystem;
use super::projectile::ProjectileRegistry;
use super::spawner::{SpawnModifier, Spawner};
use super::stats::{MatchSnapshot, MatchStats, ResultAggregator, StageSnapshot};
use super::timers::Scheduler;
use super::weapon::WeaponState;
use crate::error::ConfigError;
use crate::tuning::{PhaseSettings, PlayerTuning, Tuning};

/// Match-level flags gating every other system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    pub started: bool,
    pub game_over: bool,
    /// Between stages, waiting for a perk choice
    pub stage_clear: bool,
}

impl MatchState {
    /// Gameplay systems (spawning, combat, firing) are live
    pub fn is_running(&self) -> bool {
        self.started && !self.game_over && !self.stage_clear
    }
}

/// Player health and perk-driven stat modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
    pub invulnerable_until_ms: u64,
    pub base_damage: i32,
    /// Extra enemies each projectile may pass through
    pub pierce: u32,
    pub knockback_multiplier: f32,
    pub magnet_multiplier: f32,
    pub bullet_size_multiplier: f32,
    pub heal_on_clear: bool,
    pub pickup_radius: f32,
    base_pickup_radius: f32,
}

impl PlayerState {
    pub fn new(tuning: &PlayerTuning) -> Self {
        Self {
            health: tuning.max_health,
            max_health: tuning.max_health,
            alive: true,
            invulnerable_until_ms: 0,
            base_damage: tuning.base_damage,
            pierce: 0,
            knockback_multiplier: 1.0,
            magnet_multiplier: 1.0,
            bullet_size_multiplier: 1.0,
            heal_on_clear: false,
            pickup_radius: tuning.base_pickup_radius,
            base_pickup_radius: tuning.base_pickup_radius,
        }
    }

    pub fn is_invulnerable(&self, now_ms: u64) -> bool {
        now_ms < self.invulnerable_until_ms
    }

    /// Hits a projectile survives before retiring
    pub fn projectile_pierce(&self) -> u32 {
        1 + self.pierce
    }

    /// Derive pickup radius from the magnet multiplier
    pub fn recompute_pickup_radius(&mut self) -> f32 {
        self.pickup_radius = self.base_pickup_radius * self.magnet_multiplier;
        self.pickup_radius
    }

    /// Restore full health; false if already full
    pub fn heal_full(&mut self) -> bool {
        if self.health >= self.max_health {
            return false;
        }
        self.health = self.max_health;
        true
    }
}

/// Complete simulation state for one run
#[derive(Debug)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub(crate) rng: Pcg32,
    pub(crate) tuning: Tuning,
    pub(crate) match_state: MatchState,
    pub(crate) player: PlayerState,
    pub(crate) clock: StageClock,
    pub(crate) spawner: Spawner,
    pub(crate) enemies: EnemyRegistry,
    pub(crate) projectiles: ProjectileRegistry,
    pub(crate) weapon: WeaponState,
    pub(crate) buffs: BuffSystem,
    pub(crate) perks: PerkSystem,
    pub(crate) loot: LootSystem,
    pub(crate) timers: Scheduler,
    pub(crate) stats: MatchStats,
    pub(crate) results: ResultAggregator,
    /// Events not yet drained by the caller
    pub(crate) events: Vec<GameEvent>,
    /// Prefix of `events` already fed to stats and results
    pub(crate) recorded_events: usize,
    /// Side effect of the Double buff: extra projectiles, no ammo use
    pub(crate) double_shot: bool,
    /// Side effect of the Rapid buff
    pub(crate) fire_rate_factor: f32,
    /// Overlapping kill hit-stops still pending resume
    pub(crate) hit_stop_depth: u32,
    pub(crate) perk_choice_unlocked: bool,
    pub(crate) now_ms: u64,
}

impl GameState {
    /// Create a game with validated tuning. The match starts with `start_match`.
    pub fn new(tuning: Tuning, seed: u64) -> Result<Self, ConfigError> {
        tuning.validate()?;
        let spawner = Spawner::new(tuning.spawner.clone());
        Ok(Self::assemble(tuning, seed, spawner))
    }

    /// Like `new`, with a custom spawn weight hook
    pub fn with_spawn_modifier(
        tuning: Tuning,
        seed: u64,
        modifier: Box<dyn SpawnModifier>,
    ) -> Result<Self, ConfigError> {
        tuning.validate()?;
        let spawner = Spawner::with_modifier(tuning.spawner.clone(), modifier);
        Ok(Self::assemble(tuning, seed, spawner))
    }

    fn assemble(tuning: Tuning, seed: u64, spawner: Spawner) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let starting = tuning.weapons.starting_weapon;
        Self {
            seed,
            clock: StageClock::new(tuning.clock.clone(), 0, &mut rng),
            rng,
            match_state: MatchState::default(),
            player: PlayerState::new(&tuning.player),
            spawner,
            enemies: EnemyRegistry::new(),
            projectiles: ProjectileRegistry::new(),
            weapon: WeaponState::new(starting, tuning.weapons.def(starting)),
            buffs: BuffSystem::new(tuning.buffs.clone()),
            perks: PerkSystem::new(),
            loot: LootSystem::new(tuning.loot.clone()),
            timers: Scheduler::new(),
            stats: MatchStats::default(),
            results: ResultAggregator::new(0),
            events: Vec::new(),
            recorded_events: 0,
            double_shot: false,
            fire_rate_factor: 1.0,
            hit_stop_depth: 0,
            perk_choice_unlocked: false,
            now_ms: 0,
            tuning,
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn match_state(&self) -> MatchState {
        self.match_state
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn clock(&self) -> &StageClock {
        &self.clock
    }

    pub fn stage(&self) -> u32 {
        self.clock.stage()
    }

    /// Settings of the phase the current stage belongs to
    pub fn current_phase(&self) -> &PhaseSettings {
        self.tuning.phase_for_stage(self.clock.stage())
    }

    pub fn enemies(&self) -> &EnemyRegistry {
        &self.enemies
    }

    pub fn projectiles(&self) -> &ProjectileRegistry {
        &self.projectiles
    }

    pub fn weapon(&self) -> &WeaponState {
        &self.weapon
    }

    pub fn buffs(&self) -> &BuffSystem {
        &self.buffs
    }

    pub fn perks(&self) -> &PerkSystem {
        &self.perks
    }

    pub fn loot(&self) -> &LootSystem {
        &self.loot
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    pub fn is_hit_stopped(&self) -> bool {
        self.hit_stop_depth > 0
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Frozen stage result, or live values if the stage has not ended
    pub fn stage_summary(&self, stage: u32) -> StageSnapshot {
        self.results.stage_summary(stage, &self.stats, self.now_ms)
    }

    /// Frozen match result, or live values while the run continues
    pub fn match_summary(&self) -> MatchSnapshot {
        self.results.match_summary(self.clock.stage(), &self.stats, self.now_ms)
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.recorded_events = 0;
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Feed newly emitted events to the stats accumulator and result snapshots
    pub(crate) fn record_events(&mut self, now_ms: u64) {
        while self.recorded_events < self.events.len() {
            let event = &self.events[self.recorded_events];
            self.stats.record(event);
            match *event {
                GameEvent::StageEnded { stage, survived } => {
                    self.results.capture_stage(stage, survived, &self.stats, now_ms);
                }
                GameEvent::MatchEnded { stage, .. } => {
                    self.results.capture_match(stage, &self.stats, now_ms);
                }
                _ => {}
            }
            self.recorded_events += 1;
        }
    }
}
