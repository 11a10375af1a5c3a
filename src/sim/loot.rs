//! Buff and weapon pickups dropped by kills
//!
//! Drops are gated by chance, cooldown and concurrency caps; every rejection
//! is a silent no-op. Pickups resolve at most once per loot id.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::buff::{ActiveBuffs, BuffKind};
use super::weapon::WeaponKind;
use crate::tuning::{BuffWeights, LootTuning, WeaponTuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LootKind {
    Buff(BuffKind),
    Weapon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootInstance {
    pub id: u32,
    pub kind: LootKind,
    pub at: Vec2,
    pub spawn_ms: u64,
    pub expire_ms: u64,
    pub picked_up: bool,
}

impl LootInstance {
    pub fn is_available(&self, now_ms: u64) -> bool {
        !self.picked_up && now_ms < self.expire_ms
    }
}

/// What the player gets from a pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootReward {
    Buff(BuffKind),
    Weapon(WeaponKind),
    /// Weapon crate with no eligible weapon to roll
    Nothing,
}

#[derive(Debug, Clone)]
pub struct LootSystem {
    tuning: LootTuning,
    instances: BTreeMap<u32, LootInstance>,
    next_id: u32,
    last_buff_drop_ms: Option<u64>,
    last_weapon_drop_ms: Option<u64>,
}

impl LootSystem {
    pub fn new(tuning: LootTuning) -> Self {
        Self {
            tuning,
            instances: BTreeMap::new(),
            next_id: 0,
            last_buff_drop_ms: None,
            last_weapon_drop_ms: None,
        }
    }

    pub fn get(&self, id: u32) -> Option<&LootInstance> {
        self.instances.get(&id)
    }

    /// Live buff pickups on the ground
    pub fn active_buff_loot_count(&self, now_ms: u64) -> usize {
        self.instances
            .values()
            .filter(|l| matches!(l.kind, LootKind::Buff(_)) && l.is_available(now_ms))
            .count()
    }

    pub fn has_active_weapon_loot(&self, now_ms: u64) -> bool {
        self.instances
            .values()
            .any(|l| l.kind == LootKind::Weapon && l.is_available(now_ms))
    }

    fn on_cooldown(last: Option<u64>, cooldown_ms: u64, now_ms: u64) -> bool {
        last.is_some_and(|t| now_ms < t + cooldown_ms)
    }

    fn insert(&mut self, kind: LootKind, at: Vec2, now_ms: u64, ttl_ms: u64) -> LootInstance {
        self.next_id += 1;
        let instance = LootInstance {
            id: self.next_id,
            kind,
            at,
            spawn_ms: now_ms,
            expire_ms: now_ms + ttl_ms,
            picked_up: false,
        };
        self.instances.insert(instance.id, instance.clone());
        instance
    }

    /// Roll for a buff drop after a kill at `at`
    pub fn roll_buff_drop<B, R>(&mut self, now_ms: u64, at: Vec2, buffs: &B, rng: &mut R) -> Option<LootInstance>
    where
        B: ActiveBuffs + ?Sized,
        R: Rng + ?Sized,
    {
        if !rng.random_bool(self.tuning.buff_drop_chance) {
            return None;
        }
        if Self::on_cooldown(self.last_buff_drop_ms, self.tuning.buff_cooldown_ms, now_ms) {
            log::trace!("Buff drop rejected: cooldown");
            return None;
        }
        if self.active_buff_loot_count(now_ms) >= self.tuning.max_active_buff_loot {
            log::trace!("Buff drop rejected: {} already on the ground", self.tuning.max_active_buff_loot);
            return None;
        }
        let kind = pick_buff(&self.tuning.buff_weights, rng)?;
        if buffs.is_active(kind) {
            log::trace!("Buff drop rejected: {} already active", kind.name());
            return None;
        }

        let ttl_ms = rng.random_range(self.tuning.buff_ttl_min_ms..=self.tuning.buff_ttl_max_ms);
        self.last_buff_drop_ms = Some(now_ms);
        let instance = self.insert(LootKind::Buff(kind), at, now_ms, ttl_ms);
        log::debug!("Dropped {} buff loot #{} (ttl {}ms)", kind.name(), instance.id, ttl_ms);
        Some(instance)
    }

    /// Roll for a weapon crate after a kill at `at`
    pub fn roll_weapon_drop<R: Rng + ?Sized>(&mut self, now_ms: u64, at: Vec2, rng: &mut R) -> Option<LootInstance> {
        if Self::on_cooldown(self.last_weapon_drop_ms, self.tuning.weapon_cooldown_ms, now_ms) {
            return None;
        }
        if self.has_active_weapon_loot(now_ms) {
            return None;
        }
        if !rng.random_bool(self.tuning.weapon_drop_chance) {
            return None;
        }
        self.last_weapon_drop_ms = Some(now_ms);
        let instance = self.insert(LootKind::Weapon, at, now_ms, self.tuning.weapon_ttl_ms);
        log::debug!("Dropped weapon crate #{}", instance.id);
        Some(instance)
    }

    /// Resolve a pickup. `None` for unknown, expired or already-picked loot.
    pub fn pickup<R: Rng + ?Sized>(
        &mut self,
        id: u32,
        now_ms: u64,
        stage: u32,
        current_weapon: WeaponKind,
        weapons: &WeaponTuning,
        rng: &mut R,
    ) -> Option<(LootKind, LootReward)> {
        let instance = self.instances.get_mut(&id)?;
        if !instance.is_available(now_ms) {
            return None;
        }
        instance.picked_up = true;
        let kind = instance.kind;

        let reward = match kind {
            LootKind::Buff(buff) => LootReward::Buff(buff),
            LootKind::Weapon => {
                self.last_weapon_drop_ms = Some(now_ms);
                match roll_weapon(stage, current_weapon, weapons, rng) {
                    Some(weapon) => LootReward::Weapon(weapon),
                    None => LootReward::Nothing,
                }
            }
        };
        Some((kind, reward))
    }

    /// Sweep picked and expired loot. Returns ids that expired unpicked.
    pub fn update(&mut self, now_ms: u64) -> Vec<u32> {
        let mut expired = Vec::new();
        self.instances.retain(|&id, loot| {
            if loot.picked_up {
                false
            } else if now_ms >= loot.expire_ms {
                expired.push(id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn instances(&self) -> impl Iterator<Item = &LootInstance> {
        self.instances.values()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.last_buff_drop_ms = None;
        self.last_weapon_drop_ms = None;
    }
}

fn pick_buff<R: Rng + ?Sized>(weights: &BuffWeights, rng: &mut R) -> Option<BuffKind> {
    let options: Vec<(BuffKind, f32)> = [BuffKind::Freeze, BuffKind::Rapid, BuffKind::Double]
        .into_iter()
        .map(|kind| (kind, weights.get(kind)))
        .collect();
    pick_weighted(&options, rng)
}

/// Roll a concrete weapon: stage-gated and never the weapon already held
pub fn roll_weapon<R: Rng + ?Sized>(
    stage: u32,
    current: WeaponKind,
    weapons: &WeaponTuning,
    rng: &mut R,
) -> Option<WeaponKind> {
    let options: Vec<(WeaponKind, f32)> = WeaponKind::ALL
        .into_iter()
        .filter(|&kind| kind != current && weapons.def(kind).min_stage <= stage)
        .map(|kind| (kind, weapons.def(kind).drop_weight))
        .collect();
    pick_weighted(&options, rng)
}

fn pick_weighted<T: Copy, R: Rng + ?Sized>(options: &[(T, f32)], rng: &mut R) -> Option<T> {
    let total: f32 = options.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.random_range(0.0..total);
    for &(item, weight) in options {
        let weight = weight.max(0.0);
        if roll < weight {
            return Some(item);
        }
        roll -= weight;
    }
    options.iter().rev().find(|(_, w)| *w > 0.0).map(|&(item, _)| item)
}
