//! Per-weapon ammo, reload and fire-rate state machine

use serde::{Deserialize, Serialize};

use crate::normalize_angle;
use crate::tuning::WeaponDef;

/// Weapon kinds the player can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponKind {
    Basic,
    Shotgun,
    Smg,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 3] = [WeaponKind::Basic, WeaponKind::Shotgun, WeaponKind::Smg];

    pub fn name(&self) -> &'static str {
        match self {
            WeaponKind::Basic => "basic",
            WeaponKind::Shotgun => "shotgun",
            WeaponKind::Smg => "smg",
        }
    }

    /// Shotguns repeat their whole spread for the Double buff instead of
    /// adding one extra projectile
    pub fn repeats_for_double(&self) -> bool {
        matches!(self, WeaponKind::Shotgun)
    }
}

/// Buff-derived modifiers for one trigger pull
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireModifiers {
    /// Fire interval multiplier (1.0 = normal, < 1.0 = faster)
    pub fire_rate_factor: f32,
    /// Shots do not consume ammo and may fire while reloading
    pub ammo_bypass: bool,
    /// Double buff active
    pub double_shot: bool,
    /// Angular offset of the extra projectile for non-shotgun weapons
    pub double_extra_angle: f32,
}

impl Default for FireModifiers {
    fn default() -> Self {
        Self {
            fire_rate_factor: 1.0,
            ammo_bypass: false,
            double_shot: false,
            double_extra_angle: 0.0,
        }
    }
}

/// Result of a successful trigger pull
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    /// One angle per projectile of the normal pattern
    pub angles: Vec<f32>,
    /// Extra Double projectile for non-shotgun weapons
    pub bonus_angle: Option<f32>,
    /// Shotgun should schedule a delayed repeat of this shot
    pub schedule_repeat: bool,
    /// The magazine ran dry and a reload began
    pub reload_started: bool,
}

impl Shot {
    pub fn projectile_count(&self) -> usize {
        self.angles.len() + usize::from(self.bonus_angle.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponState {
    pub kind: WeaponKind,
    ammo_in_mag: u32,
    magazine_size: u32,
    fire_rate_ms: u64,
    reload_time_ms: u64,
    reloading: bool,
    reload_start_ms: u64,
    last_shot_ms: Option<u64>,
    spread_angles: Vec<f32>,
}

impl WeaponState {
    /// A freshly equipped weapon with a full magazine
    pub fn new(kind: WeaponKind, def: &WeaponDef) -> Self {
        Self {
            kind,
            ammo_in_mag: def.magazine_size,
            magazine_size: def.magazine_size,
            fire_rate_ms: def.fire_rate_ms,
            reload_time_ms: def.reload_time_ms,
            reloading: false,
            reload_start_ms: 0,
            last_shot_ms: None,
            spread_angles: def.spread_angles.clone(),
        }
    }

    pub fn ammo_in_mag(&self) -> u32 {
        self.ammo_in_mag
    }

    pub fn magazine_size(&self) -> u32 {
        self.magazine_size
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    pub fn last_shot_ms(&self) -> Option<u64> {
        self.last_shot_ms
    }

    /// Milliseconds until the reload completes (0 when not reloading)
    pub fn reload_remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.reloading {
            return 0;
        }
        (self.reload_start_ms + self.reload_time_ms).saturating_sub(now_ms)
    }

    fn start_reload(&mut self, now_ms: u64) {
        self.reloading = true;
        self.reload_start_ms = now_ms;
    }

    /// Finish a reload whose time has elapsed. Returns true when it completed.
    pub fn update_reload(&mut self, now_ms: u64) -> bool {
        if self.reloading && now_ms >= self.reload_start_ms + self.reload_time_ms {
            self.reloading = false;
            self.ammo_in_mag = self.magazine_size;
            return true;
        }
        false
    }

    /// Effective interval between shots
    pub fn fire_interval_ms(&self, fire_rate_factor: f32) -> u64 {
        (self.fire_rate_ms as f32 * fire_rate_factor).round() as u64
    }

    /// Pull the trigger at `now`. `None` when the fire-rate window has not
    /// elapsed or the weapon is reloading without ammo bypass.
    pub fn try_fire(&mut self, now_ms: u64, aim_angle: f32, mods: FireModifiers) -> Option<Shot> {
        self.update_reload(now_ms);

        if let Some(last) = self.last_shot_ms {
            if now_ms < last + self.fire_interval_ms(mods.fire_rate_factor) {
                return None;
            }
        }
        if self.reloading && !mods.ammo_bypass {
            log::trace!("{} trigger ignored while reloading", self.kind.name());
            return None;
        }

        let angles = self.pattern(aim_angle);
        let repeats = self.kind.repeats_for_double();
        let bonus_angle = (mods.double_shot && !repeats).then(|| normalize_angle(aim_angle + mods.double_extra_angle));

        let mut reload_started = false;
        if !mods.ammo_bypass {
            self.ammo_in_mag = self.ammo_in_mag.saturating_sub(1);
            if self.ammo_in_mag == 0 {
                self.start_reload(now_ms);
                reload_started = true;
            }
        }
        self.last_shot_ms = Some(now_ms);

        Some(Shot {
            angles,
            bonus_angle,
            schedule_repeat: mods.double_shot && repeats,
            reload_started,
        })
    }

    /// Projectile angles of one shot aimed at `aim_angle`
    pub fn pattern(&self, aim_angle: f32) -> Vec<f32> {
        self.spread_angles
            .iter()
            .map(|offset| normalize_angle(aim_angle + offset))
            .collect()
    }
}
