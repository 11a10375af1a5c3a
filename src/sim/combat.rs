//! Contact resolution
//!
//! Pure functions over the registries and player state. They decide what a
//! contact does; the game turns the outcome into events, timers and drops.

use glam::Vec2;

use super::enemy::{EnemyKind, EnemyRegistry};
use super::projectile::ProjectileRegistry;
use super::state::PlayerState;
use crate::tuning::{EnemyTuning, PlayerTuning};

/// Outcome of a projectile overlapping an enemy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BulletOutcome {
    /// Inactive bullet, inactive/dying enemy, or a repeat of an earlier hit
    Rejected,
    Hit {
        damage: i32,
        /// Set when this hit killed the enemy
        killed: Option<EnemyKind>,
        /// The projectile ran out of pierce and was removed
        retired: bool,
    },
}

/// Resolve a projectile hitting an enemy.
///
/// The per-projectile hit guard is checked and recorded before any damage so
/// duplicate overlap reports within a tick are absorbed.
pub fn resolve_bullet_hit(
    projectiles: &mut ProjectileRegistry,
    enemies: &mut EnemyRegistry,
    projectile_id: u32,
    enemy_id: u32,
    damage: i32,
) -> BulletOutcome {
    let Some(projectile) = projectiles.get_mut(projectile_id) else {
        return BulletOutcome::Rejected;
    };
    let Some(enemy) = enemies.get_mut(enemy_id) else {
        return BulletOutcome::Rejected;
    };
    if !enemy.is_active() {
        return BulletOutcome::Rejected;
    }
    if !projectile.record_hit(enemy_id) {
        log::trace!("Duplicate hit of enemy {} by projectile {}", enemy_id, projectile_id);
        return BulletOutcome::Rejected;
    }

    enemy.health -= damage;
    let killed = if enemy.health <= 0 {
        enemy.alive = false;
        enemy.dying = true;
        Some(enemy.kind)
    } else {
        None
    };

    projectile.pierce_remaining = projectile.pierce_remaining.saturating_sub(1);
    let retired = projectile.pierce_remaining == 0;
    if retired {
        projectiles.retire(projectile_id);
    }

    BulletOutcome::Hit {
        damage,
        killed,
        retired,
    }
}

/// Damage applied to the player by an enemy touch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerHit {
    pub damage: i32,
    pub impulse: Vec2,
    pub died: bool,
}

/// Resolve an enemy touching the player. `None` when the player is dead,
/// invulnerable, or the enemy is no longer active.
#[allow(clippy::too_many_arguments)]
pub fn resolve_player_contact(
    player: &mut PlayerState,
    enemies: &EnemyRegistry,
    enemy_id: u32,
    enemy_pos: Vec2,
    player_pos: Vec2,
    now_ms: u64,
    player_tuning: &PlayerTuning,
    enemy_tuning: &EnemyTuning,
) -> Option<PlayerHit> {
    if !player.alive || player.is_invulnerable(now_ms) {
        return None;
    }
    let enemy = enemies.get(enemy_id).filter(|e| e.is_active())?;

    let damage = player_tuning.contact_damage;
    player.health = (player.health - damage).max(0);
    player.invulnerable_until_ms = now_ms + player_tuning.invulnerability_ms;

    let away = (player_pos - enemy_pos).normalize_or_zero();
    let away = if away == Vec2::ZERO { Vec2::X } else { away };
    let kind_multiplier = match enemy.kind {
        EnemyKind::Runner => 1.0,
        EnemyKind::Tank => enemy_tuning.tank_knockback_multiplier,
    };
    let impulse = away * player_tuning.knockback_force * kind_multiplier * player.knockback_multiplier;

    let died = player.health == 0;
    if died {
        player.alive = false;
    }
    Some(PlayerHit { damage, impulse, died })
}
