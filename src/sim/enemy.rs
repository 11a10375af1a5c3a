//! Enemy registry
//!
//! Enemies are owned here and addressed by stable id. Other systems only see
//! them through the [`EnemyCensus`] counts or by id lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    Runner,
    Tank,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 2] = [EnemyKind::Runner, EnemyKind::Tank];
}

/// One enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyRecord {
    pub id: u32,
    pub kind: EnemyKind,
    pub health: i32,
    /// Counts toward alive totals; cleared on lethal damage
    pub alive: bool,
    /// Playing its death animation; immune to further damage
    pub dying: bool,
    pub frozen: bool,
    pub speed_multiplier: f32,
}

impl EnemyRecord {
    /// Can take damage and be frozen
    pub fn is_active(&self) -> bool {
        self.alive && !self.dying
    }
}

/// Read-only view of the enemy population
pub trait EnemyCensus {
    fn alive_count(&self) -> usize;
    fn tank_count(&self) -> usize;
    /// Visit every alive enemy in id order
    fn for_each_alive(&self, f: &mut dyn FnMut(&EnemyRecord));
}

#[derive(Debug, Clone, Default)]
pub struct EnemyRegistry {
    enemies: BTreeMap<u32, EnemyRecord>,
    /// Never reset, so ids stay unique across matches
    next_id: u32,
}

impl EnemyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new enemy and return its id
    pub fn spawn(&mut self, kind: EnemyKind, health: i32, speed_multiplier: f32, frozen: bool) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.enemies.insert(
            id,
            EnemyRecord {
                id,
                kind,
                health,
                alive: true,
                dying: false,
                frozen,
                speed_multiplier,
            },
        );
        id
    }

    pub fn get(&self, id: u32) -> Option<&EnemyRecord> {
        self.enemies.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut EnemyRecord> {
        self.enemies.get_mut(&id)
    }

    /// Remove an enemy entirely (death animation finished or left the arena)
    pub fn despawn(&mut self, id: u32) -> bool {
        self.enemies.remove(&id).is_some()
    }

    pub fn count_by_kind(&self, kind: EnemyKind) -> usize {
        self.enemies.values().filter(|e| e.alive && e.kind == kind).count()
    }

    /// Freeze or unfreeze every active enemy; returns how many changed
    pub fn set_frozen_all(&mut self, frozen: bool) -> usize {
        let mut changed = 0;
        for enemy in self.enemies.values_mut().filter(|e| e.is_active()) {
            if enemy.frozen != frozen {
                enemy.frozen = frozen;
                changed += 1;
            }
        }
        changed
    }

    /// Apply one speed multiplier to every alive enemy
    pub fn set_speed_multiplier_all(&mut self, multiplier: f32) {
        for enemy in self.enemies.values_mut().filter(|e| e.alive) {
            enemy.speed_multiplier = multiplier;
        }
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    pub fn clear(&mut self) {
        self.enemies.clear();
    }
}

impl EnemyCensus for EnemyRegistry {
    fn alive_count(&self) -> usize {
        self.enemies.values().filter(|e| e.alive).count()
    }

    fn tank_count(&self) -> usize {
        self.count_by_kind(EnemyKind::Tank)
    }

    fn for_each_alive(&self, f: &mut dyn FnMut(&EnemyRecord)) {
        self.enemies.values().filter(|e| e.alive).for_each(|e| f(e));
    }
}
