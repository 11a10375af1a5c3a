//! Arcade Survival - gameplay core for a stage-based survival shooter
//!
//! Core modules:
//! - `sim`: Tick-driven simulation (stages, spawning, combat, buffs, loot, perks)
//! - `tuning`: Data-driven game balance
//! - `error`: Configuration errors

pub mod error;
pub mod sim;
pub mod tuning;

pub use error::ConfigError;
pub use sim::{GameState, TickInput, tick};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Default run seed used by the demo binary
    pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;
    /// Nominal tick period used by the demo binary (ms)
    pub const DEMO_TICK_MS: u64 = 16;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit direction vector for an angle in radians
#[inline]
pub fn direction(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}
