//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time only from the caller's `now_ms`
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, physics or platform dependencies

pub mod buff;
pub mod clock;
pub mod combat;
pub mod enemy;
pub mod events;
pub mod hud;
pub mod loot;
pub mod perk;
pub mod projectile;
pub mod spawner;
pub mod state;
pub mod stats;
pub mod tick;
pub mod timers;
pub mod weapon;

pub use buff::{ActiveBuffs, BuffKind};
pub use clock::{BurstState, StageClock};
pub use enemy::{EnemyCensus, EnemyKind, EnemyRecord};
pub use events::{Contact, GameEvent};
pub use hud::{BuffView, HudView};
pub use loot::{LootInstance, LootKind};
pub use perk::PerkId;
pub use spawner::{SpawnModifier, StageRampModifier};
pub use state::{GameState, MatchState, PlayerState};
pub use stats::{MatchSnapshot, MatchStats, StageSnapshot};
pub use tick::{TickInput, tick};
pub use weapon::WeaponKind;
