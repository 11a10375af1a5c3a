//! Data-driven game balance
//!
//! Every table here is read-only once a match starts. The game receives a
//! [`Tuning`] at construction and hands sub-tables to each system; nothing
//! looks balance values up through globals.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::buff::BuffKind;
use crate::sim::enemy::EnemyKind;
use crate::sim::perk::{AfterApply, CountStat, MultiplierStat, PerkEffect, PerkId, PlayerFlag};
use crate::sim::weapon::WeaponKind;

/// Burst/recovery timing ranges (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockTuning {
    pub burst_interval_min_sec: f32,
    pub burst_interval_max_sec: f32,
    pub burst_duration_min_sec: f32,
    pub burst_duration_max_sec: f32,
    pub recovery_min_sec: f32,
    pub recovery_max_sec: f32,
}

impl Default for ClockTuning {
    fn default() -> Self {
        Self {
            burst_interval_min_sec: 18.0,
            burst_interval_max_sec: 30.0,
            burst_duration_min_sec: 6.0,
            burst_duration_max_sec: 10.0,
            recovery_min_sec: 4.0,
            recovery_max_sec: 7.0,
        }
    }
}

/// Relative spawn weight per enemy kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyWeights {
    pub runner: f32,
    pub tank: f32,
}

impl EnemyWeights {
    pub fn get(&self, kind: EnemyKind) -> f32 {
        match kind {
            EnemyKind::Runner => self.runner,
            EnemyKind::Tank => self.tank,
        }
    }

    pub fn total(&self) -> f32 {
        self.runner.max(0.0) + self.tank.max(0.0)
    }
}

/// Difficulty settings for one phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSettings {
    /// Phase number; stage N uses the highest phase <= N
    pub phase: u32,
    pub duration_sec: f32,
    pub max_alive: u32,
    pub spawn_delay_ms: u64,
    pub weights: EnemyWeights,
    pub tank_cap: u32,
}

/// Spawn cadence knobs shared by every phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerTuning {
    /// Period of the spawn-tick timer
    pub spawn_tick_ms: u64,
    pub min_spawn_delay_ms: u64,
    /// Retry delay when the alive cap is reached
    pub cap_retry_delay_ms: u64,
    pub burst_delay_multiplier: f32,
    pub recovery_delay_multiplier: f32,
    pub burst_enemy_speed_multiplier: f32,
    pub burst_runner_weight_multiplier: f32,
    /// Extra tank weight added per stage beyond the first
    pub tank_weight_per_stage: f32,
}

impl Default for SpawnerTuning {
    fn default() -> Self {
        Self {
            spawn_tick_ms: 100,
            min_spawn_delay_ms: 250,
            cap_retry_delay_ms: 300,
            burst_delay_multiplier: 0.5,
            recovery_delay_multiplier: 1.25,
            burst_enemy_speed_multiplier: 1.35,
            burst_runner_weight_multiplier: 1.5,
            tank_weight_per_stage: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyTuning {
    pub runner_health: i32,
    pub tank_health: i32,
    /// Knockback multiplier when a tank touches the player
    pub tank_knockback_multiplier: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            runner_health: 2,
            tank_health: 6,
            tank_knockback_multiplier: 1.6,
        }
    }
}

impl EnemyTuning {
    pub fn health(&self, kind: EnemyKind) -> i32 {
        match kind {
            EnemyKind::Runner => self.runner_health,
            EnemyKind::Tank => self.tank_health,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTuning {
    pub max_health: i32,
    pub contact_damage: i32,
    pub invulnerability_ms: u64,
    pub knockback_force: f32,
    pub base_damage: i32,
    pub base_pickup_radius: f32,
    /// Hit-stop length after a kill
    pub hit_stop_ms: u64,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_health: 100,
            contact_damage: 10,
            invulnerability_ms: 800,
            knockback_force: 320.0,
            base_damage: 1,
            base_pickup_radius: 60.0,
            hit_stop_ms: 50,
        }
    }
}

/// Static definition of one weapon kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponDef {
    pub fire_rate_ms: u64,
    pub magazine_size: u32,
    pub reload_time_ms: u64,
    pub projectile_speed: f32,
    pub projectile_lifetime_ms: u64,
    pub projectile_radius: f32,
    /// Angular offsets (radians) of each projectile per shot
    pub spread_angles: Vec<f32>,
    /// First stage at which this weapon can drop
    pub min_stage: u32,
    pub drop_weight: f32,
}

/// All weapon definitions plus buff interactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponTuning {
    pub basic: WeaponDef,
    pub shotgun: WeaponDef,
    pub smg: WeaponDef,
    pub starting_weapon: WeaponKind,
    /// Fire interval multiplier while Rapid is active
    pub rapid_fire_factor: f32,
    /// Delay before the shotgun's Double repeat shot
    pub double_repeat_delay_ms: u64,
    /// Angular offset of the extra Double projectile (non-shotgun)
    pub double_extra_angle: f32,
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            basic: WeaponDef {
                fire_rate_ms: 350,
                magazine_size: 12,
                reload_time_ms: 1200,
                projectile_speed: 600.0,
                projectile_lifetime_ms: 1500,
                projectile_radius: 4.0,
                spread_angles: vec![0.0],
                min_stage: 1,
                drop_weight: 1.0,
            },
            shotgun: WeaponDef {
                fire_rate_ms: 750,
                magazine_size: 6,
                reload_time_ms: 1800,
                projectile_speed: 520.0,
                projectile_lifetime_ms: 600,
                projectile_radius: 4.0,
                spread_angles: vec![-0.24, -0.12, 0.0, 0.12, 0.24],
                min_stage: 2,
                drop_weight: 1.0,
            },
            smg: WeaponDef {
                fire_rate_ms: 110,
                magazine_size: 30,
                reload_time_ms: 1500,
                projectile_speed: 700.0,
                projectile_lifetime_ms: 1000,
                projectile_radius: 3.0,
                spread_angles: vec![0.0],
                min_stage: 3,
                drop_weight: 1.2,
            },
            starting_weapon: WeaponKind::Basic,
            rapid_fire_factor: 0.5,
            double_repeat_delay_ms: 120,
            double_extra_angle: 0.12,
        }
    }
}

impl WeaponTuning {
    pub fn def(&self, kind: WeaponKind) -> &WeaponDef {
        match kind {
            WeaponKind::Basic => &self.basic,
            WeaponKind::Shotgun => &self.shotgun,
            WeaponKind::Smg => &self.smg,
        }
    }
}

/// Buff durations (ms)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuffTuning {
    pub rapid_ms: u64,
    pub double_ms: u64,
    pub freeze_ms: u64,
    /// Cap on remaining time from "now" when extending rapid/freeze
    pub max_total_ms: u64,
}

impl Default for BuffTuning {
    fn default() -> Self {
        Self {
            rapid_ms: 6000,
            double_ms: 8000,
            freeze_ms: 4000,
            max_total_ms: 15000,
        }
    }
}

impl BuffTuning {
    pub fn duration(&self, kind: BuffKind) -> u64 {
        match kind {
            BuffKind::Rapid => self.rapid_ms,
            BuffKind::Double => self.double_ms,
            BuffKind::Freeze => self.freeze_ms,
        }
    }
}

/// Effect descriptor for one perk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerkDef {
    pub effect: PerkEffect,
    pub max_level: u32,
}

/// The perk menu; one descriptor per perk id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerkTuning {
    pub pierce: PerkDef,
    pub knockback: PerkDef,
    pub magnet: PerkDef,
    pub bullet_size: PerkDef,
    pub heal_on_clear: PerkDef,
    /// Number of perks offered at stage clear
    pub offer_count: usize,
    /// Choices made sooner than this after the offer are ignored
    pub choice_debounce_ms: u64,
}

impl Default for PerkTuning {
    fn default() -> Self {
        Self {
            pierce: PerkDef {
                effect: PerkEffect::Additive {
                    stat: CountStat::Pierce,
                    amount: 1,
                },
                max_level: 3,
            },
            knockback: PerkDef {
                effect: PerkEffect::Multiplicative {
                    stat: MultiplierStat::Knockback,
                    factor: 0.8,
                    after_apply: None,
                },
                max_level: 3,
            },
            magnet: PerkDef {
                effect: PerkEffect::Multiplicative {
                    stat: MultiplierStat::Magnet,
                    factor: 1.3,
                    after_apply: Some(AfterApply::RecomputePickupRadius),
                },
                max_level: 3,
            },
            bullet_size: PerkDef {
                effect: PerkEffect::Multiplicative {
                    stat: MultiplierStat::BulletSize,
                    factor: 1.25,
                    after_apply: None,
                },
                max_level: 3,
            },
            heal_on_clear: PerkDef {
                effect: PerkEffect::Enable {
                    flag: PlayerFlag::HealOnClear,
                },
                max_level: 1,
            },
            offer_count: 3,
            choice_debounce_ms: 400,
        }
    }
}

impl PerkTuning {
    pub fn def(&self, id: PerkId) -> &PerkDef {
        match id {
            PerkId::Pierce => &self.pierce,
            PerkId::Knockback => &self.knockback,
            PerkId::Magnet => &self.magnet,
            PerkId::BulletSize => &self.bullet_size,
            PerkId::HealOnClear => &self.heal_on_clear,
        }
    }
}

/// Relative drop weight per buff kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuffWeights {
    pub freeze: f32,
    pub rapid: f32,
    pub double: f32,
}

impl BuffWeights {
    pub fn get(&self, kind: BuffKind) -> f32 {
        match kind {
            BuffKind::Freeze => self.freeze,
            BuffKind::Rapid => self.rapid,
            BuffKind::Double => self.double,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootTuning {
    pub buff_drop_chance: f64,
    pub buff_cooldown_ms: u64,
    pub max_active_buff_loot: usize,
    pub buff_weights: BuffWeights,
    pub buff_ttl_min_ms: u64,
    pub buff_ttl_max_ms: u64,
    pub weapon_drop_chance: f64,
    pub weapon_cooldown_ms: u64,
    pub weapon_ttl_ms: u64,
}

impl Default for LootTuning {
    fn default() -> Self {
        Self {
            buff_drop_chance: 0.12,
            buff_cooldown_ms: 4000,
            max_active_buff_loot: 2,
            buff_weights: BuffWeights {
                freeze: 1.0,
                rapid: 1.5,
                double: 1.2,
            },
            buff_ttl_min_ms: 6000,
            buff_ttl_max_ms: 9000,
            weapon_drop_chance: 0.05,
            weapon_cooldown_ms: 20000,
            weapon_ttl_ms: 10000,
        }
    }
}

/// Complete balance configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    pub clock: ClockTuning,
    pub phases: Vec<PhaseSettings>,
    pub spawner: SpawnerTuning,
    pub enemies: EnemyTuning,
    pub player: PlayerTuning,
    pub weapons: WeaponTuning,
    pub buffs: BuffTuning,
    pub perks: PerkTuning,
    pub loot: LootTuning,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            clock: ClockTuning::default(),
            phases: default_phases(),
            spawner: SpawnerTuning::default(),
            enemies: EnemyTuning::default(),
            player: PlayerTuning::default(),
            weapons: WeaponTuning::default(),
            buffs: BuffTuning::default(),
            perks: PerkTuning::default(),
            loot: LootTuning::default(),
        }
    }
}

fn default_phases() -> Vec<PhaseSettings> {
    let phase = |phase, duration_sec, max_alive, spawn_delay_ms, runner, tank, tank_cap| {
        PhaseSettings {
            phase,
            duration_sec,
            max_alive,
            spawn_delay_ms,
            weights: EnemyWeights { runner, tank },
            tank_cap,
        }
    };
    vec![
        phase(1, 45.0, 12, 1200, 1.0, 0.0, 0),
        phase(2, 50.0, 18, 1000, 0.85, 0.15, 2),
        phase(3, 55.0, 24, 850, 0.75, 0.25, 4),
        phase(4, 60.0, 30, 700, 0.7, 0.3, 6),
    ]
}

impl Tuning {
    /// Parse and validate a JSON tuning document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Phase settings for a stage (highest phase number <= stage)
    pub fn phase_for_stage(&self, stage: u32) -> &PhaseSettings {
        let mut best = &self.phases[0];
        for phase in &self.phases {
            let better = phase.phase <= stage && (best.phase > stage || phase.phase > best.phase);
            if better {
                best = phase;
            }
        }
        best
    }

    /// Check every table for broken entries. Called by `GameState::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phases.is_empty() {
            return Err(ConfigError::NoPhases);
        }
        if !self.phases.iter().any(|p| p.phase == 1) {
            return Err(ConfigError::MissingFirstPhase);
        }
        let mut seen: Vec<u32> = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            if seen.contains(&phase.phase) {
                return Err(ConfigError::DuplicatePhase(phase.phase));
            }
            seen.push(phase.phase);
            if phase.duration_sec <= 0.0 {
                return Err(invalid("phases.duration_sec", "must be positive"));
            }
            if phase.weights.runner < 0.0 || phase.weights.tank < 0.0 {
                return Err(invalid("phases.weights", "must not be negative"));
            }
            if phase.weights.total() <= 0.0 {
                return Err(invalid("phases.weights", "must not all be zero"));
            }
        }

        let c = &self.clock;
        check_range("clock.burst_interval", c.burst_interval_min_sec, c.burst_interval_max_sec)?;
        check_range("clock.burst_duration", c.burst_duration_min_sec, c.burst_duration_max_sec)?;
        check_range("clock.recovery", c.recovery_min_sec, c.recovery_max_sec)?;

        if self.spawner.spawn_tick_ms == 0 {
            return Err(invalid("spawner.spawn_tick_ms", "must be positive"));
        }

        for kind in WeaponKind::ALL {
            let def = self.weapons.def(kind);
            if def.magazine_size == 0 {
                return Err(invalid("weapons.magazine_size", "must be at least 1"));
            }
            if def.spread_angles.is_empty() {
                return Err(invalid("weapons.spread_angles", "must list at least one angle"));
            }
            if def.drop_weight < 0.0 {
                return Err(invalid("weapons.drop_weight", "must not be negative"));
            }
        }
        if self.weapons.rapid_fire_factor <= 0.0 {
            return Err(invalid("weapons.rapid_fire_factor", "must be positive"));
        }

        for id in PerkId::ALL {
            let def = self.perks.def(id);
            if def.max_level == 0 {
                return Err(invalid("perks.max_level", "must be at least 1"));
            }
            if let PerkEffect::Multiplicative { factor, .. } = def.effect {
                if factor <= 0.0 {
                    return Err(invalid("perks.factor", "must be positive"));
                }
            }
        }
        if self.perks.offer_count == 0 || self.perks.offer_count > PerkId::ALL.len() {
            return Err(invalid("perks.offer_count", "must be between 1 and the menu size"));
        }

        let l = &self.loot;
        if !(0.0..=1.0).contains(&l.buff_drop_chance) || !(0.0..=1.0).contains(&l.weapon_drop_chance) {
            return Err(invalid("loot.drop_chance", "must be within [0, 1]"));
        }
        check_range("loot.buff_ttl", l.buff_ttl_min_ms as f32, l.buff_ttl_max_ms as f32)?;
        let w = &l.buff_weights;
        if w.freeze < 0.0 || w.rapid < 0.0 || w.double < 0.0 {
            return Err(invalid("loot.buff_weights", "must not be negative"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue { field, reason }
}

fn check_range(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min > max || min < 0.0 {
        return Err(ConfigError::InvalidRange {
            field,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}
