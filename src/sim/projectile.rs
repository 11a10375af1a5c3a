//! Live projectiles
//!
//! Each projectile remembers the enemy ids it has damaged so duplicate
//! overlap reports can never apply damage twice.

use std::collections::{BTreeMap, HashSet};

use super::timers::TimerHandle;
use super::weapon::WeaponKind;

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub weapon: WeaponKind,
    pub speed: f32,
    pub lifetime_ms: u64,
    pub radius: f32,
    /// Hits left before retirement
    pub pierce_remaining: u32,
    hit_enemy_ids: HashSet<u32>,
    /// Lifetime timer, revoked on early retirement
    expire_timer: Option<TimerHandle>,
}

impl Projectile {
    pub fn has_hit(&self, enemy_id: u32) -> bool {
        self.hit_enemy_ids.contains(&enemy_id)
    }

    /// Record a hit; false if this enemy was already hit
    pub fn record_hit(&mut self, enemy_id: u32) -> bool {
        self.hit_enemy_ids.insert(enemy_id)
    }

    pub fn hit_count(&self) -> usize {
        self.hit_enemy_ids.len()
    }

    pub fn expire_timer(&self) -> Option<TimerHandle> {
        self.expire_timer
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectileRegistry {
    projectiles: BTreeMap<u32, Projectile>,
    next_id: u32,
}

impl ProjectileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, weapon: WeaponKind, speed: f32, lifetime_ms: u64, radius: f32, pierce: u32) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.projectiles.insert(
            id,
            Projectile {
                id,
                weapon,
                speed,
                lifetime_ms,
                radius,
                pierce_remaining: pierce.max(1),
                hit_enemy_ids: HashSet::new(),
                expire_timer: None,
            },
        );
        id
    }

    pub fn attach_timer(&mut self, id: u32, handle: TimerHandle) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.expire_timer = Some(handle);
        }
    }

    pub fn get(&self, id: u32) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    /// Remove a projectile; `None` if it was already retired
    pub fn retire(&mut self, id: u32) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_guard_is_idempotent() {
        let mut registry = ProjectileRegistry::new();
        let id = registry.spawn(WeaponKind::Basic, 600.0, 1000, 4.0, 2);
        let projectile = registry.get_mut(id).unwrap();
        assert!(projectile.record_hit(5));
        assert!(!projectile.record_hit(5));
        assert!(projectile.has_hit(5));
        assert_eq!(projectile.hit_count(), 1);
    }

    #[test]
    fn test_retire_once() {
        let mut registry = ProjectileRegistry::new();
        let id = registry.spawn(WeaponKind::Smg, 700.0, 1000, 3.0, 1);
        assert!(registry.retire(id).is_some());
        assert!(registry.retire(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pierce_is_at_least_one() {
        let mut registry = ProjectileRegistry::new();
        let id = registry.spawn(WeaponKind::Basic, 600.0, 1000, 4.0, 0);
        assert_eq!(registry.get(id).map(|p| p.pierce_remaining), Some(1));
    }
}
