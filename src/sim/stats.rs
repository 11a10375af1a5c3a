//! Match statistics and stage/match result snapshots
//!
//! [`MatchStats`] is fed exclusively by replaying [`GameEvent`]s.
//! [`ResultAggregator`] freezes copies at stage and match boundaries.

use serde::{Deserialize, Serialize};

use super::enemy::EnemyKind;
use super::events::GameEvent;

/// Accumulating counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Projectiles fired (not trigger pulls)
    pub shots_fired: u64,
    /// Distinct projectile -> enemy damage events
    pub hits: u64,
    pub kills_runner: u64,
    pub kills_tank: u64,
    pub kills_total: u64,
    pub damage_taken: u64,
    pub score: u64,
}

impl MatchStats {
    pub fn on_shot_fired(&mut self) {
        self.shots_fired += 1;
    }

    pub fn on_hit(&mut self) {
        self.hits += 1;
    }

    pub fn on_kill(&mut self, kind: EnemyKind) {
        match kind {
            EnemyKind::Runner => self.kills_runner += 1,
            EnemyKind::Tank => self.kills_tank += 1,
        }
        self.kills_total += 1;
        self.score += 1;
    }

    pub fn on_damage_taken(&mut self, amount: i32) {
        self.damage_taken += amount.max(0) as u64;
    }

    /// Feed one event to the matching handler
    pub fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::ProjectileSpawned { .. } => self.on_shot_fired(),
            GameEvent::EnemyHit { .. } => self.on_hit(),
            GameEvent::EnemyKilled { kind, .. } => self.on_kill(*kind),
            GameEvent::PlayerDamaged { amount, .. } => self.on_damage_taken(*amount),
            _ => {}
        }
    }

    /// Hits per projectile fired, as a percentage clamped to [0, 100]
    pub fn accuracy(&self) -> f32 {
        if self.shots_fired == 0 {
            return 0.0;
        }
        (self.hits as f32 / self.shots_fired as f32 * 100.0).clamp(0.0, 100.0)
    }

    /// Counters accumulated since `baseline`
    pub fn since(&self, baseline: &MatchStats) -> MatchStats {
        MatchStats {
            shots_fired: self.shots_fired.saturating_sub(baseline.shots_fired),
            hits: self.hits.saturating_sub(baseline.hits),
            kills_runner: self.kills_runner.saturating_sub(baseline.kills_runner),
            kills_tank: self.kills_tank.saturating_sub(baseline.kills_tank),
            kills_total: self.kills_total.saturating_sub(baseline.kills_total),
            damage_taken: self.damage_taken.saturating_sub(baseline.damage_taken),
            score: self.score.saturating_sub(baseline.score),
        }
    }
}

/// Frozen result of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub stage: u32,
    pub survived: bool,
    pub duration_ms: u64,
    /// Counters for this stage only
    pub stage_stats: MatchStats,
    /// Run totals at the end of the stage
    pub totals: MatchStats,
    /// Accuracy within this stage
    pub accuracy: f32,
}

/// Frozen result of the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub stage_reached: u32,
    pub duration_ms: u64,
    pub stats: MatchStats,
    pub accuracy: f32,
    pub stages: Vec<StageSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    match_started_ms: u64,
    stage_started_ms: u64,
    stage_baseline: MatchStats,
    stages: Vec<StageSnapshot>,
    final_result: Option<MatchSnapshot>,
}

impl ResultAggregator {
    pub fn new(now_ms: u64) -> Self {
        Self {
            match_started_ms: now_ms,
            stage_started_ms: now_ms,
            ..Default::default()
        }
    }

    /// Mark the start of a stage for per-stage deltas
    pub fn begin_stage(&mut self, now_ms: u64, totals: &MatchStats) {
        self.stage_started_ms = now_ms;
        self.stage_baseline = *totals;
    }

    fn build_stage(&self, stage: u32, survived: bool, totals: &MatchStats, now_ms: u64) -> StageSnapshot {
        let stage_stats = totals.since(&self.stage_baseline);
        StageSnapshot {
            stage,
            survived,
            duration_ms: now_ms.saturating_sub(self.stage_started_ms),
            stage_stats,
            totals: *totals,
            accuracy: stage_stats.accuracy(),
        }
    }

    /// Freeze the result of `stage`. A stage is captured at most once.
    pub fn capture_stage(&mut self, stage: u32, survived: bool, totals: &MatchStats, now_ms: u64) -> bool {
        if self.final_result.is_some() || self.stages.iter().any(|s| s.stage == stage) {
            return false;
        }
        let snapshot = self.build_stage(stage, survived, totals, now_ms);
        self.stages.push(snapshot);
        true
    }

    /// Freeze the run result. Captured at most once.
    pub fn capture_match(&mut self, stage_reached: u32, totals: &MatchStats, now_ms: u64) -> bool {
        if self.final_result.is_some() {
            return false;
        }
        self.final_result = Some(self.build_match(stage_reached, totals, now_ms));
        true
    }

    fn build_match(&self, stage_reached: u32, totals: &MatchStats, now_ms: u64) -> MatchSnapshot {
        MatchSnapshot {
            stage_reached,
            duration_ms: now_ms.saturating_sub(self.match_started_ms),
            stats: *totals,
            accuracy: totals.accuracy(),
            stages: self.stages.clone(),
        }
    }

    /// Captured snapshot for `stage`, or a live view if it has not ended yet
    pub fn stage_summary(&self, stage: u32, live: &MatchStats, now_ms: u64) -> StageSnapshot {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .cloned()
            .unwrap_or_else(|| self.build_stage(stage, true, live, now_ms))
    }

    /// Captured match result, or a live view while the run continues
    pub fn match_summary(&self, stage: u32, live: &MatchStats, now_ms: u64) -> MatchSnapshot {
        self.final_result
            .clone()
            .unwrap_or_else(|| self.build_match(stage, live, now_ms))
    }

    pub fn stages(&self) -> &[StageSnapshot] {
        &self.stages
    }

    pub fn is_final(&self) -> bool {
        self.final_result.is_some()
    }
}
