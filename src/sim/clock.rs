//! Stage timer with a nested burst/recovery cycle
//!
//! A stage lasts for its phase's duration. Inside a stage the clock cycles
//! Idle -> Burst -> Recovery -> Idle, one transition per update at most, so no
//! sub-state is ever skipped even when a tick covers a large time gap.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::events::GameEvent;
use crate::tuning::ClockTuning;

/// Burst sub-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BurstState {
    #[default]
    Idle,
    Burst,
    Recovery,
}

#[derive(Debug, Clone)]
pub struct StageClock {
    stage: u32,
    stage_start_ms: u64,
    stage_elapsed_sec: f32,
    burst_state: BurstState,
    next_burst_at_ms: u64,
    burst_end_ms: u64,
    recovery_end_ms: u64,
    tuning: ClockTuning,
}

/// Uniform draw in [min, max] seconds, returned in ms
fn uniform_ms<R: Rng + ?Sized>(rng: &mut R, min_sec: f32, max_sec: f32) -> u64 {
    let secs = if max_sec > min_sec {
        rng.random_range(min_sec..=max_sec)
    } else {
        min_sec
    };
    (secs * 1000.0).round() as u64
}

impl StageClock {
    /// Start at stage 1 with the first burst scheduled
    pub fn new<R: Rng + ?Sized>(tuning: ClockTuning, now_ms: u64, rng: &mut R) -> Self {
        let mut clock = Self {
            stage: 1,
            stage_start_ms: now_ms,
            stage_elapsed_sec: 0.0,
            burst_state: BurstState::Idle,
            next_burst_at_ms: now_ms,
            burst_end_ms: 0,
            recovery_end_ms: 0,
            tuning,
        };
        clock.schedule_next_burst(now_ms, rng);
        clock
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn burst_state(&self) -> BurstState {
        self.burst_state
    }

    pub fn stage_elapsed_sec(&self) -> f32 {
        self.stage_elapsed_sec
    }

    pub fn next_burst_at_ms(&self) -> u64 {
        self.next_burst_at_ms
    }

    /// Seconds left in the current stage given its duration
    pub fn time_remaining_sec(&self, stage_duration_sec: f32) -> f32 {
        (stage_duration_sec - self.stage_elapsed_sec).max(0.0)
    }

    fn schedule_next_burst<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) {
        let t = &self.tuning;
        self.next_burst_at_ms = now_ms + uniform_ms(rng, t.burst_interval_min_sec, t.burst_interval_max_sec);
    }

    /// Advance the clock to `now_ms`, pushing stage and burst events
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now_ms: u64,
        stage_duration_sec: f32,
        rng: &mut R,
        events: &mut Vec<GameEvent>,
    ) {
        self.stage_elapsed_sec = now_ms.saturating_sub(self.stage_start_ms) as f32 / 1000.0;

        if self.stage_elapsed_sec >= stage_duration_sec {
            let ended = self.stage;
            events.push(GameEvent::StageEnded {
                stage: ended,
                survived: true,
            });
            if self.burst_state == BurstState::Burst {
                events.push(GameEvent::BurstEnded);
            }

            self.stage += 1;
            self.stage_start_ms = now_ms;
            self.stage_elapsed_sec = 0.0;
            self.burst_state = BurstState::Idle;
            self.schedule_next_burst(now_ms, rng);
            log::info!("Stage {} cleared, stage {} begins", ended, self.stage);
            events.push(GameEvent::StageStarted { stage: self.stage });
            return;
        }

        match self.burst_state {
            BurstState::Idle => {
                if now_ms >= self.next_burst_at_ms {
                    let t = &self.tuning;
                    let duration_ms = uniform_ms(rng, t.burst_duration_min_sec, t.burst_duration_max_sec);
                    self.burst_end_ms = now_ms + duration_ms;
                    self.burst_state = BurstState::Burst;
                    log::debug!("Burst started at {:.1}s for {}ms", self.stage_elapsed_sec, duration_ms);
                    events.push(GameEvent::BurstStarted {
                        stage_elapsed_sec: self.stage_elapsed_sec,
                        duration_sec: duration_ms as f32 / 1000.0,
                    });
                }
            }
            BurstState::Burst => {
                if now_ms >= self.burst_end_ms {
                    let t = &self.tuning;
                    self.recovery_end_ms = now_ms + uniform_ms(rng, t.recovery_min_sec, t.recovery_max_sec);
                    self.burst_state = BurstState::Recovery;
                    events.push(GameEvent::BurstEnded);
                }
            }
            BurstState::Recovery => {
                if now_ms >= self.recovery_end_ms {
                    self.burst_state = BurstState::Idle;
                    self.schedule_next_burst(now_ms, rng);
                }
            }
        }
    }

    /// Rebase the stage start after a stage-clear pause
    pub fn resume<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) {
        self.stage_start_ms = now_ms;
        self.stage_elapsed_sec = 0.0;
        self.burst_state = BurstState::Idle;
        self.schedule_next_burst(now_ms, rng);
    }
}
