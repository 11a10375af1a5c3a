//! Timed player-wide buffs
//!
//! At most one instance per kind. Double refreshes to its base duration on
//! reacquire; Rapid and Freeze extend, capped at `max_total_ms` from now.
//! Side effects are not applied here: `start` and `update` report what changed
//! and the game dispatches the effects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tuning::BuffTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuffKind {
    Rapid,
    Double,
    Freeze,
}

impl BuffKind {
    pub const ALL: [BuffKind; 3] = [BuffKind::Rapid, BuffKind::Double, BuffKind::Freeze];

    pub fn name(&self) -> &'static str {
        match self {
            BuffKind::Rapid => "rapid",
            BuffKind::Double => "double",
            BuffKind::Freeze => "freeze",
        }
    }
}

/// Outcome of acquiring a buff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffChange {
    /// Newly active; side effects must be applied
    Started { kind: BuffKind, end_at_ms: u64 },
    /// Already active; end time moved
    Extended { kind: BuffKind, end_at_ms: u64 },
}

/// Read-only buff query used by the loot system
pub trait ActiveBuffs {
    fn is_active(&self, kind: BuffKind) -> bool;
}

#[derive(Debug, Clone)]
pub struct BuffSystem {
    tuning: BuffTuning,
    active: BTreeMap<BuffKind, u64>,
}

impl BuffSystem {
    pub fn new(tuning: BuffTuning) -> Self {
        Self {
            tuning,
            active: BTreeMap::new(),
        }
    }

    /// Acquire a buff at `now`
    pub fn start(&mut self, kind: BuffKind, now_ms: u64) -> BuffChange {
        let duration = self.tuning.duration(kind);
        match self.active.get(&kind).copied() {
            Some(end) => {
                let end_at_ms = match kind {
                    BuffKind::Double => now_ms + duration,
                    BuffKind::Rapid | BuffKind::Freeze => {
                        let cap = now_ms + self.tuning.max_total_ms;
                        (end.max(now_ms) + duration).min(cap)
                    }
                };
                self.active.insert(kind, end_at_ms);
                log::debug!("Buff {} extended to {}ms", kind.name(), end_at_ms);
                BuffChange::Extended { kind, end_at_ms }
            }
            None => {
                let end_at_ms = now_ms + duration.min(self.tuning.max_total_ms);
                self.active.insert(kind, end_at_ms);
                log::debug!("Buff {} started until {}ms", kind.name(), end_at_ms);
                BuffChange::Started { kind, end_at_ms }
            }
        }
    }

    /// Remove every buff whose end time has passed; returns the expired kinds
    pub fn update(&mut self, now_ms: u64) -> Vec<BuffKind> {
        let expired: Vec<BuffKind> = self
            .active
            .iter()
            .filter(|&(_, &end)| end <= now_ms)
            .map(|(&kind, _)| kind)
            .collect();
        for kind in &expired {
            self.active.remove(kind);
        }
        expired
    }

    pub fn end_at_ms(&self, kind: BuffKind) -> Option<u64> {
        self.active.get(&kind).copied()
    }

    pub fn remaining_ms(&self, kind: BuffKind, now_ms: u64) -> u64 {
        self.end_at_ms(kind).map_or(0, |end| end.saturating_sub(now_ms))
    }

    /// Active kinds with their end times, in kind order
    pub fn active(&self) -> impl Iterator<Item = (BuffKind, u64)> + '_ {
        self.active.iter().map(|(&kind, &end)| (kind, end))
    }

    /// Drop every buff without reporting expiry (match reset)
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

impl ActiveBuffs for BuffSystem {
    fn is_active(&self, kind: BuffKind) -> bool {
        self.active.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tuning() -> BuffTuning {
        BuffTuning {
            rapid_ms: 6000,
            double_ms: 8000,
            freeze_ms: 4000,
            max_total_ms: 15000,
        }
    }

    #[test]
    fn test_double_refreshes_without_stacking() {
        let mut buffs = BuffSystem::new(tuning());
        assert_eq!(
            buffs.start(BuffKind::Double, 0),
            BuffChange::Started {
                kind: BuffKind::Double,
                end_at_ms: 8000
            }
        );
        let change = buffs.start(BuffKind::Double, 3000);
        assert_eq!(
            change,
            BuffChange::Extended {
                kind: BuffKind::Double,
                end_at_ms: 11000
            }
        );
        assert_eq!(buffs.remaining_ms(BuffKind::Double, 3000), 8000);
    }

    #[test]
    fn test_rapid_extends_up_to_cap() {
        let mut buffs = BuffSystem::new(tuning());
        buffs.start(BuffKind::Rapid, 0);
        buffs.start(BuffKind::Rapid, 1000);
        assert_eq!(buffs.end_at_ms(BuffKind::Rapid), Some(12000));
        buffs.start(BuffKind::Rapid, 2000);
        // 18000 would exceed 2000 + 15000
        assert_eq!(buffs.end_at_ms(BuffKind::Rapid), Some(17000));
    }

    #[test]
    fn test_expiry_reports_each_kind_once() {
        let mut buffs = BuffSystem::new(tuning());
        buffs.start(BuffKind::Freeze, 0);
        buffs.start(BuffKind::Rapid, 0);
        assert!(buffs.update(3999).is_empty());
        assert_eq!(buffs.update(4000), vec![BuffKind::Freeze]);
        assert!(!buffs.is_active(BuffKind::Freeze));
        assert!(buffs.is_active(BuffKind::Rapid));
        assert!(buffs.update(4000).is_empty());
        assert_eq!(buffs.update(6000), vec![BuffKind::Rapid]);
    }

    proptest! {
        #[test]
        fn prop_reacquire_respects_cap(
            pickups in prop::collection::vec((0u64..5000, 0usize..3), 1..60),
        ) {
            let mut buffs = BuffSystem::new(tuning());
            let mut now = 0;
            for (dt, which) in pickups {
                now += dt;
                buffs.update(now);
                let kind = BuffKind::ALL[which];
                let was_active = buffs.is_active(kind);
                buffs.start(kind, now);
                let remaining = buffs.remaining_ms(kind, now);
                prop_assert!(remaining <= 15000);
                if kind == BuffKind::Double {
                    prop_assert_eq!(remaining, 8000);
                } else if !was_active {
                    prop_assert_eq!(remaining, tuning().duration(kind));
                }
            }
        }
    }
}
