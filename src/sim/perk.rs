//! Permanent per-run perks
//!
//! Perks come from a fixed menu. Each perk's behaviour is a data-driven
//! [`PerkEffect`] descriptor from the tuning table, dispatched by exhaustive
//! match so a new effect kind must be handled everywhere it applies.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::state::PlayerState;
use crate::tuning::PerkTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PerkId {
    Pierce,
    Knockback,
    Magnet,
    BulletSize,
    HealOnClear,
}

impl PerkId {
    pub const ALL: [PerkId; 5] = [
        PerkId::Pierce,
        PerkId::Knockback,
        PerkId::Magnet,
        PerkId::BulletSize,
        PerkId::HealOnClear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PerkId::Pierce => "pierce",
            PerkId::Knockback => "knockback",
            PerkId::Magnet => "magnet",
            PerkId::BulletSize => "bullet_size",
            PerkId::HealOnClear => "heal_on_clear",
        }
    }
}

/// Integer player stats raised additively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountStat {
    Pierce,
}

/// Player multipliers scaled per level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiplierStat {
    Knockback,
    Magnet,
    BulletSize,
}

/// One-shot player flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerFlag {
    HealOnClear,
}

/// Follow-up work after a multiplicative perk lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfterApply {
    RecomputePickupRadius,
}

/// What a perk does when taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PerkEffect {
    Additive { stat: CountStat, amount: u32 },
    Multiplicative {
        stat: MultiplierStat,
        factor: f32,
        after_apply: Option<AfterApply>,
    },
    Enable { flag: PlayerFlag },
}

/// A perk that was applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedPerk {
    pub perk: PerkId,
    pub level: u32,
    pub after_apply: Option<AfterApply>,
}

#[derive(Debug, Clone, Default)]
pub struct PerkSystem {
    levels: BTreeMap<PerkId, u32>,
    offer: Vec<PerkId>,
}

impl PerkSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level (0 = not taken)
    pub fn level(&self, id: PerkId) -> u32 {
        self.levels.get(&id).copied().unwrap_or(0)
    }

    pub fn offer(&self) -> &[PerkId] {
        &self.offer
    }

    /// Roll a random subset of perks not yet at max level
    pub fn roll_offer<R: Rng + ?Sized>(&mut self, tuning: &PerkTuning, rng: &mut R) -> Vec<PerkId> {
        let mut candidates: Vec<PerkId> = PerkId::ALL
            .into_iter()
            .filter(|&id| self.level(id) < tuning.def(id).max_level)
            .collect();
        candidates.shuffle(rng);
        candidates.truncate(tuning.offer_count);
        self.offer = candidates.clone();
        candidates
    }

    /// Take a perk from the current offer. Perks outside the offer are ignored.
    pub fn choose(&mut self, id: PerkId, player: &mut PlayerState, tuning: &PerkTuning) -> Option<AppliedPerk> {
        if !self.offer.contains(&id) {
            log::debug!("Perk {} is not on offer", id.name());
            return None;
        }
        let applied = self.apply(id, player, tuning)?;
        self.offer.clear();
        Some(applied)
    }

    /// Apply one level of a perk through its effect descriptor
    pub fn apply(&mut self, id: PerkId, player: &mut PlayerState, tuning: &PerkTuning) -> Option<AppliedPerk> {
        let def = tuning.def(id);
        let level = self.level(id);
        if level >= def.max_level {
            log::debug!("Perk {} already at max level {}", id.name(), def.max_level);
            return None;
        }

        let after_apply = match def.effect {
            PerkEffect::Additive { stat, amount } => {
                match stat {
                    CountStat::Pierce => player.pierce += amount,
                }
                None
            }
            PerkEffect::Multiplicative {
                stat,
                factor,
                after_apply,
            } => {
                let target = match stat {
                    MultiplierStat::Knockback => &mut player.knockback_multiplier,
                    MultiplierStat::Magnet => &mut player.magnet_multiplier,
                    MultiplierStat::BulletSize => &mut player.bullet_size_multiplier,
                };
                *target *= factor;
                after_apply
            }
            PerkEffect::Enable { flag } => {
                let enabled = match flag {
                    PlayerFlag::HealOnClear => &mut player.heal_on_clear,
                };
                if *enabled {
                    return None;
                }
                *enabled = true;
                None
            }
        };

        let level = level + 1;
        self.levels.insert(id, level);
        log::info!("Perk {} now level {}", id.name(), level);
        Some(AppliedPerk {
            perk: id,
            level,
            after_apply,
        })
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.offer.clear();
    }
}
