//! Configuration errors
//!
//! Only broken static configuration is an error in this crate. Gameplay guard
//! rejections (cooldowns, caps, reloads) are silent no-ops.

/// Error raised when the injected tuning tables are missing or inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse tuning: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Phase table is empty")]
    NoPhases,

    #[error("Phase table has no entry for phase 1")]
    MissingFirstPhase,

    #[error("Phase {0} is defined more than once")]
    DuplicatePhase(u32),

    #[error("Invalid range for {field}: min {min} > max {max}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}
