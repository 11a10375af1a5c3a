//! Events emitted by the simulation and contacts reported to it
//!
//! Events are the only output channel of a tick. The stats accumulator and
//! result aggregator consume them, and the presentation/physics layers drain
//! them to spawn projectiles, play effects and apply impulses.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::buff::BuffKind;
use super::enemy::EnemyKind;
use super::loot::LootKind;
use super::perk::PerkId;
use super::weapon::WeaponKind;

/// Overlap reported by the physics layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Contact {
    /// A projectile overlaps an enemy
    BulletEnemy {
        projectile_id: u32,
        enemy_id: u32,
        enemy_pos: Vec2,
    },
    /// The player overlaps an enemy
    PlayerEnemy {
        enemy_id: u32,
        enemy_pos: Vec2,
        player_pos: Vec2,
    },
    /// The player overlaps a loot pickup
    PlayerLoot { loot_id: u32 },
}

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    MatchStarted { seed: u64 },
    MatchEnded { stage: u32, score: u64 },

    StageStarted { stage: u32 },
    StageEnded { stage: u32, survived: bool },
    BurstStarted { stage_elapsed_sec: f32, duration_sec: f32 },
    BurstEnded,

    EnemySpawned {
        enemy_id: u32,
        kind: EnemyKind,
        speed_multiplier: f32,
        frozen: bool,
    },
    EnemySpeedChanged { multiplier: f32 },
    EnemiesFrozen { frozen: bool, count: usize },

    ProjectileSpawned {
        projectile_id: u32,
        weapon: WeaponKind,
        angle: f32,
        speed: f32,
        radius: f32,
        lifetime_ms: u64,
    },
    ProjectileRetired { projectile_id: u32 },

    /// Non-lethal or lethal damage from a projectile
    EnemyHit {
        enemy_id: u32,
        projectile_id: u32,
        damage: i32,
        lethal: bool,
    },
    EnemyKilled { enemy_id: u32, kind: EnemyKind, at: Vec2 },
    HitStopStarted,
    HitStopEnded,

    PlayerDamaged { amount: i32, health: i32 },
    PlayerKnockback { impulse: Vec2 },
    PlayerHealed { health: i32 },
    PlayerDied,

    ReloadStarted { weapon: WeaponKind },
    ReloadFinished { weapon: WeaponKind },
    WeaponChanged { weapon: WeaponKind },

    BuffStarted { kind: BuffKind, end_at_ms: u64 },
    BuffExtended { kind: BuffKind, end_at_ms: u64 },
    BuffExpired { kind: BuffKind },

    LootSpawned {
        loot_id: u32,
        kind: LootKind,
        at: Vec2,
        expire_ms: u64,
    },
    LootPickedUp { loot_id: u32, kind: LootKind },
    LootExpired { loot_id: u32 },

    PerksOffered { choices: Vec<PerkId> },
    PerkApplied { perk: PerkId, level: u32 },
    PickupRadiusChanged { radius: f32 },
}
