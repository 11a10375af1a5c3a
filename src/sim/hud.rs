//! Read-only HUD projection for the presentation layer

use serde::{Deserialize, Serialize};

use super::buff::BuffKind;
use super::clock::BurstState;
use super::perk::PerkId;
use super::state::GameState;
use super::weapon::WeaponKind;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuffView {
    pub kind: BuffKind,
    pub remaining_ms: u64,
}

/// Everything the HUD draws in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudView {
    pub health: i32,
    pub max_health: i32,
    pub weapon: WeaponKind,
    pub ammo_in_mag: u32,
    pub magazine_size: u32,
    pub reloading: bool,
    pub reload_remaining_ms: u64,
    pub buffs: Vec<BuffView>,
    pub score: u64,
    pub stage: u32,
    pub stage_time_remaining_sec: f32,
    pub burst: BurstState,
    pub hit_stopped: bool,
    pub stage_clear: bool,
    pub game_over: bool,
    /// Perks on offer while the stage-clear screen is up
    pub perk_offer: Vec<PerkId>,
}

impl GameState {
    /// Snapshot of HUD values as of the last tick
    pub fn hud(&self) -> HudView {
        let now_ms = self.now_ms;
        HudView {
            health: self.player.health,
            max_health: self.player.max_health,
            weapon: self.weapon.kind,
            ammo_in_mag: self.weapon.ammo_in_mag(),
            magazine_size: self.weapon.magazine_size(),
            reloading: self.weapon.is_reloading(),
            reload_remaining_ms: self.weapon.reload_remaining_ms(now_ms),
            buffs: self
                .buffs
                .active()
                .map(|(kind, end_at_ms)| BuffView {
                    kind,
                    remaining_ms: end_at_ms.saturating_sub(now_ms),
                })
                .collect(),
            score: self.stats.score,
            stage: self.clock.stage(),
            stage_time_remaining_sec: self.clock.time_remaining_sec(self.current_phase().duration_sec),
            burst: self.clock.burst_state(),
            hit_stopped: self.is_hit_stopped(),
            stage_clear: self.match_state.stage_clear,
            game_over: self.match_state.game_over,
            perk_offer: self.perks.offer().to_vec(),
        }
    }
}
