//! Tick-driven simulation step
//!
//! One `tick` call advances every system in a fixed order: match gate, stage
//! clock and burst reactions, buff expiry, due timers, reload completion,
//! contacts, weapon polling, loot cleanup. Event replay into stats happens
//! last.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::buff::{ActiveBuffs, BuffChange, BuffKind};
use super::clock::{BurstState, StageClock};
use super::combat::{BulletOutcome, resolve_bullet_hit, resolve_player_contact};
use super::enemy::EnemyKind;
use super::events::{Contact, GameEvent};
use super::loot::{LootInstance, LootReward};
use super::perk::{AfterApply, PerkId};
use super::state::{GameState, MatchState, PlayerState};
use super::stats::{MatchStats, ResultAggregator};
use super::timers::ScheduledTask;
use super::weapon::{FireModifiers, WeaponKind, WeaponState};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Aim direction in radians
    pub aim_angle: f32,
    /// Trigger held
    pub fire: bool,
    /// Overlaps reported by the physics layer since the last tick
    pub contacts: Vec<Contact>,
}

/// Advance the game to `now_ms`
pub fn tick(state: &mut GameState, input: &TickInput, now_ms: u64) {
    state.now_ms = now_ms;

    // Nothing runs before the match starts or after it ends
    if !state.match_state.started || state.match_state.game_over {
        return;
    }

    if state.match_state.is_running() {
        state.update_clock(now_ms);
    }

    // Expired buffs must be gone before delayed shots and spawns consult them
    state.update_buffs(now_ms);
    state.run_timers(now_ms);
    state.update_reload(now_ms);

    if state.match_state.is_running() {
        for contact in &input.contacts {
            state.apply_contact(*contact, now_ms);
            if !state.match_state.is_running() {
                break;
            }
        }
    }

    if state.match_state.is_running() {
        state.poll_weapon(input, now_ms);
    }

    state.expire_loot(now_ms);
    state.record_events(now_ms);
}

impl GameState {
    /// Start (or restart) the match at `now_ms`.
    ///
    /// Every pending timer from a previous run is revoked first so nothing
    /// scheduled by it can fire into the new match.
    pub fn start_match(&mut self, now_ms: u64) {
        self.timers.clear();
        self.rng = Pcg32::seed_from_u64(self.seed);

        self.match_state = MatchState {
            started: true,
            ..Default::default()
        };
        self.player = PlayerState::new(&self.tuning.player);
        self.clock = StageClock::new(self.tuning.clock.clone(), now_ms, &mut self.rng);
        self.enemies.clear();
        self.projectiles.clear();
        let starting = self.tuning.weapons.starting_weapon;
        self.weapon = WeaponState::new(starting, self.tuning.weapons.def(starting));
        self.buffs.clear();
        self.perks.clear();
        self.loot.clear();
        self.stats = MatchStats::default();
        self.results = ResultAggregator::new(now_ms);
        self.events.clear();
        self.recorded_events = 0;
        self.double_shot = false;
        self.fire_rate_factor = 1.0;
        self.hit_stop_depth = 0;
        self.perk_choice_unlocked = false;
        self.now_ms = now_ms;

        let phase = self.tuning.phase_for_stage(self.clock.stage());
        self.spawner.restart(now_ms, phase, BurstState::Idle);
        self.timers
            .schedule(now_ms + self.tuning.spawner.spawn_tick_ms, ScheduledTask::SpawnTick);

        log::info!("Match started with seed {:#x}", self.seed);
        self.emit(GameEvent::MatchStarted { seed: self.seed });
        self.emit(GameEvent::StageStarted {
            stage: self.clock.stage(),
        });
        self.record_events(now_ms);
    }

    /// Take a perk from the stage-clear offer and resume play.
    /// Ignored outside stage clear and during the choice debounce.
    pub fn choose_perk(&mut self, perk: PerkId, now_ms: u64) -> bool {
        self.now_ms = now_ms;
        if !self.match_state.stage_clear || self.match_state.game_over {
            return false;
        }
        if !self.perk_choice_unlocked {
            log::debug!("Perk choice {} ignored during debounce", perk.name());
            return false;
        }
        let Some(applied) = self.perks.choose(perk, &mut self.player, &self.tuning.perks) else {
            return false;
        };

        self.emit(GameEvent::PerkApplied {
            perk: applied.perk,
            level: applied.level,
        });
        if let Some(after) = applied.after_apply {
            match after {
                AfterApply::RecomputePickupRadius => {
                    let radius = self.player.recompute_pickup_radius();
                    self.emit(GameEvent::PickupRadiusChanged { radius });
                }
            }
        }

        self.resume_stage(now_ms);
        self.record_events(now_ms);
        true
    }

    /// Remove an enemy once the presentation layer is done with it
    pub fn despawn_enemy(&mut self, enemy_id: u32) -> bool {
        self.enemies.despawn(enemy_id)
    }

    fn update_clock(&mut self, now_ms: u64) {
        let before = self.clock.burst_state();
        let stage_duration_sec = self.tuning.phase_for_stage(self.clock.stage()).duration_sec;
        let mut clock_events = Vec::new();
        self.clock
            .update(now_ms, stage_duration_sec, &mut self.rng, &mut clock_events);

        let burst_speed = self.tuning.spawner.burst_enemy_speed_multiplier;
        let mut stage_ended = false;
        for event in clock_events {
            let speed = match event {
                GameEvent::BurstStarted { .. } => Some(burst_speed),
                GameEvent::BurstEnded => Some(1.0),
                GameEvent::StageEnded { .. } => {
                    stage_ended = true;
                    None
                }
                _ => None,
            };
            self.emit(event);
            if let Some(multiplier) = speed {
                self.set_enemy_speed(multiplier);
            }
        }

        if stage_ended {
            self.enter_stage_clear(now_ms);
            return;
        }

        let after = self.clock.burst_state();
        if after != before {
            let phase = self.tuning.phase_for_stage(self.clock.stage());
            self.spawner.reschedule(now_ms, phase, after);
        }
    }

    fn set_enemy_speed(&mut self, multiplier: f32) {
        self.enemies.set_speed_multiplier_all(multiplier);
        self.emit(GameEvent::EnemySpeedChanged { multiplier });
    }

    fn enter_stage_clear(&mut self, now_ms: u64) {
        self.match_state.stage_clear = true;
        self.perk_choice_unlocked = false;

        if self.player.heal_on_clear && self.player.heal_full() {
            self.emit(GameEvent::PlayerHealed {
                health: self.player.health,
            });
        }

        let choices = self.perks.roll_offer(&self.tuning.perks, &mut self.rng);
        if choices.is_empty() {
            log::info!("Every perk is maxed, skipping the perk choice");
            self.resume_stage(now_ms);
            return;
        }
        self.emit(GameEvent::PerksOffered { choices });
        self.timers.schedule(
            now_ms + self.tuning.perks.choice_debounce_ms,
            ScheduledTask::PerkChoiceUnlock,
        );
    }

    fn resume_stage(&mut self, now_ms: u64) {
        self.match_state.stage_clear = false;
        self.clock.resume(now_ms, &mut self.rng);
        let phase = self.tuning.phase_for_stage(self.clock.stage());
        self.spawner.restart(now_ms, phase, BurstState::Idle);
        // Stage deltas start from everything recorded so far
        self.record_events(now_ms);
        self.results.begin_stage(now_ms, &self.stats);
        log::info!("Stage {} resumed", self.clock.stage());
    }

    fn run_timers(&mut self, now_ms: u64) {
        while let Some(fired) = self.timers.pop_due(now_ms) {
            match fired.task {
                ScheduledTask::ProjectileExpire { projectile_id } => {
                    if self.projectiles.retire(projectile_id).is_some() {
                        self.emit(GameEvent::ProjectileRetired { projectile_id });
                    }
                }
                ScheduledTask::SpawnTick => {
                    if self.match_state.is_running() {
                        self.poll_spawner(now_ms);
                    }
                    // Re-arm on the cadence grid; a long gap catches up one poll at a time
                    let next = fired.due_ms + self.tuning.spawner.spawn_tick_ms;
                    self.timers.schedule(next, ScheduledTask::SpawnTick);
                }
                ScheduledTask::SecondShot { weapon, aim_angle } => {
                    self.fire_second_shot(weapon, aim_angle, now_ms);
                }
                ScheduledTask::HitStopResume => {
                    self.hit_stop_depth = self.hit_stop_depth.saturating_sub(1);
                    if self.hit_stop_depth == 0 {
                        self.emit(GameEvent::HitStopEnded);
                    }
                }
                ScheduledTask::PerkChoiceUnlock => {
                    self.perk_choice_unlocked = true;
                }
            }
        }
    }

    fn poll_spawner(&mut self, now_ms: u64) {
        let burst = self.clock.burst_state();
        let stage = self.clock.stage();
        let phase = self.tuning.phase_for_stage(stage);
        let Some(request) = self
            .spawner
            .poll(now_ms, phase, burst, stage, &self.enemies, &mut self.rng)
        else {
            return;
        };
        if request.forced_runner {
            log::trace!("Tank cap reached, spawning a runner instead");
        }

        let frozen = self.buffs.is_active(BuffKind::Freeze);
        let speed_multiplier = match burst {
            BurstState::Burst => self.tuning.spawner.burst_enemy_speed_multiplier,
            BurstState::Idle | BurstState::Recovery => 1.0,
        };
        let health = self.tuning.enemies.health(request.kind);
        let enemy_id = self.enemies.spawn(request.kind, health, speed_multiplier, frozen);
        self.emit(GameEvent::EnemySpawned {
            enemy_id,
            kind: request.kind,
            speed_multiplier,
            frozen,
        });
    }

    fn fire_second_shot(&mut self, weapon: WeaponKind, aim_angle: f32, now_ms: u64) {
        // The buff may have expired or the weapon changed since the first shot
        if !self.match_state.is_running() || !self.buffs.is_active(BuffKind::Double) || self.weapon.kind != weapon {
            log::trace!("Delayed {} shot dropped", weapon.name());
            return;
        }
        for angle in self.weapon.pattern(aim_angle) {
            self.spawn_projectile(angle, now_ms);
        }
    }

    fn update_buffs(&mut self, now_ms: u64) {
        for kind in self.buffs.update(now_ms) {
            self.emit(GameEvent::BuffExpired { kind });
            self.apply_buff_effect(kind, false);
        }
    }

    pub(crate) fn start_buff(&mut self, kind: BuffKind, now_ms: u64) {
        match self.buffs.start(kind, now_ms) {
            BuffChange::Started { kind, end_at_ms } => {
                self.emit(GameEvent::BuffStarted { kind, end_at_ms });
                self.apply_buff_effect(kind, true);
            }
            BuffChange::Extended { kind, end_at_ms } => {
                self.emit(GameEvent::BuffExtended { kind, end_at_ms });
            }
        }
    }

    /// Turn a buff's side effect on or off
    fn apply_buff_effect(&mut self, kind: BuffKind, active: bool) {
        match kind {
            BuffKind::Rapid => {
                self.fire_rate_factor = if active {
                    self.tuning.weapons.rapid_fire_factor
                } else {
                    1.0
                };
            }
            BuffKind::Double => self.double_shot = active,
            BuffKind::Freeze => {
                let count = self.enemies.set_frozen_all(active);
                self.emit(GameEvent::EnemiesFrozen { frozen: active, count });
            }
        }
    }

    fn apply_contact(&mut self, contact: Contact, now_ms: u64) {
        match contact {
            Contact::BulletEnemy {
                projectile_id,
                enemy_id,
                enemy_pos,
            } => self.on_bullet_hit(projectile_id, enemy_id, enemy_pos, now_ms),
            Contact::PlayerEnemy {
                enemy_id,
                enemy_pos,
                player_pos,
            } => self.on_player_touched(enemy_id, enemy_pos, player_pos, now_ms),
            Contact::PlayerLoot { loot_id } => self.on_loot_touched(loot_id, now_ms),
        }
    }

    fn on_bullet_hit(&mut self, projectile_id: u32, enemy_id: u32, enemy_pos: Vec2, now_ms: u64) {
        let expire_timer = self.projectiles.get(projectile_id).and_then(|p| p.expire_timer());
        let damage = self.player.base_damage;
        let outcome = resolve_bullet_hit(&mut self.projectiles, &mut self.enemies, projectile_id, enemy_id, damage);
        let BulletOutcome::Hit { damage, killed, retired } = outcome else {
            return;
        };

        self.emit(GameEvent::EnemyHit {
            enemy_id,
            projectile_id,
            damage,
            lethal: killed.is_some(),
        });
        if retired {
            if let Some(handle) = expire_timer {
                self.timers.cancel(handle);
            }
            self.emit(GameEvent::ProjectileRetired { projectile_id });
        }
        if let Some(kind) = killed {
            self.on_enemy_killed(enemy_id, kind, enemy_pos, now_ms);
        }
    }

    fn on_enemy_killed(&mut self, enemy_id: u32, kind: EnemyKind, at: Vec2, now_ms: u64) {
        self.emit(GameEvent::EnemyKilled { enemy_id, kind, at });
        self.start_hit_stop(now_ms);

        if let Some(loot) = self.loot.roll_buff_drop(now_ms, at, &self.buffs, &mut self.rng) {
            self.emit_loot_spawned(&loot);
        }
        if let Some(loot) = self.loot.roll_weapon_drop(now_ms, at, &mut self.rng) {
            self.emit_loot_spawned(&loot);
        }
    }

    fn emit_loot_spawned(&mut self, loot: &LootInstance) {
        self.emit(GameEvent::LootSpawned {
            loot_id: loot.id,
            kind: loot.kind,
            at: loot.at,
            expire_ms: loot.expire_ms,
        });
    }

    fn start_hit_stop(&mut self, now_ms: u64) {
        if self.hit_stop_depth == 0 {
            self.emit(GameEvent::HitStopStarted);
        }
        self.hit_stop_depth += 1;
        self.timers
            .schedule(now_ms + self.tuning.player.hit_stop_ms, ScheduledTask::HitStopResume);
    }

    fn on_player_touched(&mut self, enemy_id: u32, enemy_pos: Vec2, player_pos: Vec2, now_ms: u64) {
        let Some(hit) = resolve_player_contact(
            &mut self.player,
            &self.enemies,
            enemy_id,
            enemy_pos,
            player_pos,
            now_ms,
            &self.tuning.player,
            &self.tuning.enemies,
        ) else {
            return;
        };

        self.emit(GameEvent::PlayerDamaged {
            amount: hit.damage,
            health: self.player.health,
        });
        self.emit(GameEvent::PlayerKnockback { impulse: hit.impulse });
        if hit.died {
            self.emit(GameEvent::PlayerDied);
            self.end_match(now_ms);
        }
    }

    fn end_match(&mut self, now_ms: u64) {
        let stage = self.clock.stage();
        self.match_state.game_over = true;
        self.emit(GameEvent::StageEnded {
            stage,
            survived: false,
        });
        if self.hit_stop_depth > 0 {
            self.hit_stop_depth = 0;
            self.emit(GameEvent::HitStopEnded);
        }
        // Score must include every kill emitted before the death
        self.record_events(now_ms);
        self.emit(GameEvent::MatchEnded {
            stage,
            score: self.stats.score,
        });
        self.timers.clear();
        log::info!("Match over at stage {} with score {}", stage, self.stats.score);
    }

    fn on_loot_touched(&mut self, loot_id: u32, now_ms: u64) {
        let stage = self.clock.stage();
        let Some((kind, reward)) = self.loot.pickup(
            loot_id,
            now_ms,
            stage,
            self.weapon.kind,
            &self.tuning.weapons,
            &mut self.rng,
        ) else {
            return;
        };

        self.emit(GameEvent::LootPickedUp { loot_id, kind });
        match reward {
            LootReward::Buff(buff) => self.start_buff(buff, now_ms),
            LootReward::Weapon(weapon) => self.equip_weapon(weapon),
            LootReward::Nothing => log::debug!("Weapon crate #{} had nothing new", loot_id),
        }
    }

    fn equip_weapon(&mut self, kind: WeaponKind) {
        self.weapon = WeaponState::new(kind, self.tuning.weapons.def(kind));
        log::info!("Equipped {}", kind.name());
        self.emit(GameEvent::WeaponChanged { weapon: kind });
    }

    /// Reloads finish on time even while the perk screen is up
    fn update_reload(&mut self, now_ms: u64) {
        if self.weapon.update_reload(now_ms) {
            self.emit(GameEvent::ReloadFinished {
                weapon: self.weapon.kind,
            });
        }
    }

    fn poll_weapon(&mut self, input: &TickInput, now_ms: u64) {
        let weapon = self.weapon.kind;
        if !input.fire {
            return;
        }

        let mods = FireModifiers {
            fire_rate_factor: self.fire_rate_factor,
            ammo_bypass: self.double_shot,
            double_shot: self.double_shot,
            double_extra_angle: self.tuning.weapons.double_extra_angle,
        };
        let Some(shot) = self.weapon.try_fire(now_ms, input.aim_angle, mods) else {
            return;
        };

        for angle in shot.angles.iter().copied().chain(shot.bonus_angle) {
            self.spawn_projectile(angle, now_ms);
        }
        if shot.reload_started {
            self.emit(GameEvent::ReloadStarted { weapon });
        }
        if shot.schedule_repeat {
            self.timers.schedule(
                now_ms + self.tuning.weapons.double_repeat_delay_ms,
                ScheduledTask::SecondShot {
                    weapon,
                    aim_angle: input.aim_angle,
                },
            );
        }
    }

    fn spawn_projectile(&mut self, angle: f32, now_ms: u64) {
        let weapon = self.weapon.kind;
        let def = self.tuning.weapons.def(weapon);
        let speed = def.projectile_speed;
        let lifetime_ms = def.projectile_lifetime_ms;
        let radius = def.projectile_radius * self.player.bullet_size_multiplier;

        let projectile_id = self
            .projectiles
            .spawn(weapon, speed, lifetime_ms, radius, self.player.projectile_pierce());
        let handle = self
            .timers
            .schedule(now_ms + lifetime_ms, ScheduledTask::ProjectileExpire { projectile_id });
        self.projectiles.attach_timer(projectile_id, handle);

        self.emit(GameEvent::ProjectileSpawned {
            projectile_id,
            weapon,
            angle,
            speed,
            radius,
            lifetime_ms,
        });
    }

    fn expire_loot(&mut self, now_ms: u64) {
        for loot_id in self.loot.update(now_ms) {
            self.emit(GameEvent::LootExpired { loot_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::{EnemyCensus, EnemyRecord};
    use crate::sim::loot::LootKind;
    use crate::tuning::Tuning;

    fn started(tuning: Tuning, seed: u64) -> GameState {
        let mut state = GameState::new(tuning, seed).unwrap();
        state.start_match(0);
        state.drain_events();
        state
    }

    fn firing(aim_angle: f32) -> TickInput {
        TickInput {
            aim_angle,
            fire: true,
            ..Default::default()
        }
    }

    fn contacts(contacts: Vec<Contact>) -> TickInput {
        TickInput {
            contacts,
            ..Default::default()
        }
    }

    fn spawned_enemies(events: &[GameEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::EnemySpawned { enemy_id, .. } => Some(*enemy_id),
                _ => None,
            })
            .collect()
    }

    fn spawned_projectiles(events: &[GameEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::ProjectileSpawned { projectile_id, .. } => Some(*projectile_id),
                _ => None,
            })
            .collect()
    }

    fn count(events: &[GameEvent], pred: impl Fn(&GameEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    /// One-hit runners make kill tests independent of damage tuning
    fn fragile_tuning() -> Tuning {
        let mut tuning = Tuning::default();
        tuning.enemies.runner_health = 1;
        tuning.loot.buff_drop_chance = 0.0;
        tuning.loot.weapon_drop_chance = 0.0;
        tuning
    }

    #[test]
    fn test_tick_before_start_does_nothing() {
        let mut state = GameState::new(Tuning::default(), 1).unwrap();
        tick(&mut state, &firing(0.0), 5000);
        assert!(state.drain_events().is_empty());
        assert!(state.projectiles().is_empty());
    }

    #[test]
    fn test_first_spawn_follows_phase_delay() {
        let mut state = started(Tuning::default(), 7);
        let delay = state.current_phase().spawn_delay_ms;

        tick(&mut state, &TickInput::default(), delay - 1);
        assert!(spawned_enemies(&state.drain_events()).is_empty());

        tick(&mut state, &TickInput::default(), delay);
        let events = state.drain_events();
        assert_eq!(spawned_enemies(&events).len(), 1);
        // Phase 1 only spawns runners
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::EnemySpawned {
                kind: EnemyKind::Runner,
                frozen: false,
                ..
            }
        )));
    }

    #[test]
    fn test_determinism() {
        fn run(seed: u64) -> Vec<GameEvent> {
            let mut state = started(fragile_tuning(), seed);
            let mut history = Vec::new();
            let mut pending: Vec<Contact> = Vec::new();
            for step in 1..=1500u64 {
                let now = step * 16;
                let input = TickInput {
                    aim_angle: (step as f32 * 0.01).sin(),
                    fire: step % 3 != 0,
                    contacts: std::mem::take(&mut pending),
                };
                tick(&mut state, &input, now);
                let events = state.drain_events();
                // Scripted physics: the newest projectile hits the newest enemy
                let mut newest_enemy = None;
                state
                    .enemies()
                    .for_each_alive(&mut |e: &EnemyRecord| newest_enemy = Some(e.id));
                if let (Some(&p), Some(e)) = (spawned_projectiles(&events).last(), newest_enemy) {
                    pending.push(Contact::BulletEnemy {
                        projectile_id: p,
                        enemy_id: e,
                        enemy_pos: Vec2::new(step as f32, 0.0),
                    });
                }
                history.extend(events);
            }
            history
        }

        let a = run(4242);
        let b = run(4242);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_restart_revokes_pending_timers() {
        let mut state = started(Tuning::default(), 3);
        tick(&mut state, &firing(0.0), 10);
        assert_eq!(state.projectiles().len(), 1);
        assert!(state.pending_timers() >= 2);

        state.start_match(100);
        assert!(state.projectiles().is_empty());
        // Only the fresh spawn tick survives
        assert_eq!(state.pending_timers(), 1);

        state.drain_events();
        tick(&mut state, &TickInput::default(), 5000);
        let events = state.drain_events();
        assert_eq!(count(&events, |e| matches!(e, GameEvent::ProjectileRetired { .. })), 0);
    }

    #[test]
    fn test_projectile_expires_after_lifetime() {
        let mut state = started(Tuning::default(), 3);
        tick(&mut state, &firing(0.0), 0);
        let lifetime = state.tuning().weapons.basic.projectile_lifetime_ms;
        let id = spawned_projectiles(&state.drain_events())[0];

        tick(&mut state, &TickInput::default(), lifetime - 1);
        assert!(state.projectiles().get(id).is_some());
        tick(&mut state, &TickInput::default(), lifetime);
        assert!(state.projectiles().get(id).is_none());
        assert!(
            state
                .drain_events()
                .contains(&GameEvent::ProjectileRetired { projectile_id: id })
        );
    }

    #[test]
    fn test_lethal_kill_counted_once_with_single_hit_stop() {
        let mut state = started(fragile_tuning(), 9);
        let delay = state.current_phase().spawn_delay_ms;
        tick(&mut state, &firing(0.0), delay);
        let events = state.drain_events();
        let enemy = spawned_enemies(&events)[0];
        let first = spawned_projectiles(&events)[0];

        let interval = state.weapon().fire_interval_ms(1.0);
        tick(&mut state, &firing(0.0), delay + interval);
        let second = spawned_projectiles(&state.drain_events())[0];

        let now = delay + interval + 10;
        let at = Vec2::new(50.0, 0.0);
        let hit = |projectile_id| Contact::BulletEnemy {
            projectile_id,
            enemy_id: enemy,
            enemy_pos: at,
        };
        tick(&mut state, &contacts(vec![hit(first), hit(first), hit(second)]), now);
        let events = state.drain_events();

        assert_eq!(count(&events, |e| matches!(e, GameEvent::EnemyKilled { .. })), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::EnemyHit { .. })), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::HitStopStarted)), 1);
        assert_eq!(state.stats().kills_total, 1);
        assert_eq!(state.stats().kills_runner, 1);
        assert_eq!(state.stats().hits, 1);
        assert!(state.is_hit_stopped());
        // The second projectile never touched a live enemy
        assert!(state.projectiles().get(first).is_none());
        assert!(state.projectiles().get(second).is_some());

        let resume_at = now + state.tuning().player.hit_stop_ms;
        tick(&mut state, &TickInput::default(), resume_at);
        let events = state.drain_events();
        assert_eq!(count(&events, |e| matches!(e, GameEvent::HitStopEnded)), 1);
        assert!(!state.is_hit_stopped());

        assert!(state.despawn_enemy(enemy));
        assert!(state.enemies().get(enemy).is_none());
    }

    #[test]
    fn test_freeze_applies_to_new_spawns_and_lifts_on_expiry() {
        let mut state = started(Tuning::default(), 5);
        state.start_buff(BuffKind::Freeze, 0);
        let delay = state.current_phase().spawn_delay_ms;
        tick(&mut state, &TickInput::default(), delay);
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemySpawned { frozen: true, .. })));
        let enemy = spawned_enemies(&events)[0];
        assert!(state.enemies().get(enemy).is_some_and(|e| e.frozen));

        let freeze_end = state.tuning().buffs.freeze_ms;
        tick(&mut state, &TickInput::default(), freeze_end);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::BuffExpired { kind: BuffKind::Freeze }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemiesFrozen { frozen: false, .. })));
        assert!(state.enemies().get(enemy).is_some_and(|e| !e.frozen));
    }

    #[test]
    fn test_burst_speeds_up_enemies_until_it_ends() {
        let mut tuning = Tuning::default();
        tuning.clock.burst_interval_min_sec = 2.0;
        tuning.clock.burst_interval_max_sec = 2.0;
        tuning.clock.burst_duration_min_sec = 1.0;
        tuning.clock.burst_duration_max_sec = 1.0;
        let burst_speed = tuning.spawner.burst_enemy_speed_multiplier;
        let mut state = started(tuning, 2);

        let delay = state.current_phase().spawn_delay_ms;
        tick(&mut state, &TickInput::default(), delay);
        let enemy = spawned_enemies(&state.drain_events())[0];

        tick(&mut state, &TickInput::default(), 2000);
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::BurstStarted { .. })));
        assert!(events.contains(&GameEvent::EnemySpeedChanged { multiplier: burst_speed }));
        assert_eq!(state.clock().burst_state(), BurstState::Burst);
        assert!(state.enemies().get(enemy).is_some_and(|e| e.speed_multiplier == burst_speed));

        tick(&mut state, &TickInput::default(), 3000);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::BurstEnded));
        assert!(events.contains(&GameEvent::EnemySpeedChanged { multiplier: 1.0 }));
        assert_eq!(state.clock().burst_state(), BurstState::Recovery);
    }

    #[test]
    fn test_stage_clear_offers_perks_after_debounce() {
        let mut tuning = Tuning::default();
        tuning.phases[0].duration_sec = 2.0;
        let mut state = started(tuning, 11);
        state.player.heal_on_clear = true;
        state.player.health = 40;

        tick(&mut state, &TickInput::default(), 2000);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::StageEnded { stage: 1, survived: true }));
        assert!(events.contains(&GameEvent::StageStarted { stage: 2 }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::PerksOffered { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::PlayerHealed { .. })));
        assert_eq!(state.player().health, state.player().max_health);
        assert!(state.match_state().stage_clear);

        // Heal-on-clear is already enabled, so take anything else
        let pick = state
            .perks()
            .offer()
            .iter()
            .copied()
            .find(|&p| p != PerkId::HealOnClear)
            .unwrap();
        assert!(!state.choose_perk(pick, 2100), "choice accepted during debounce");

        let unlock_at = 2000 + state.tuning().perks.choice_debounce_ms;
        tick(&mut state, &TickInput::default(), unlock_at);
        assert!(state.choose_perk(pick, 2500));
        assert!(!state.match_state().stage_clear);
        assert_eq!(state.perks().level(pick), 1);
        assert!(state.drain_events().contains(&GameEvent::PerkApplied { perk: pick, level: 1 }));

        let stage1 = state.stage_summary(1);
        assert!(stage1.survived);
        assert_eq!(state.stage(), 2);
        // The new stage's clock starts at the resume, not the stage end
        assert!(state.clock().stage_elapsed_sec() < 0.01);
    }

    #[test]
    fn test_no_firing_during_stage_clear() {
        let mut tuning = Tuning::default();
        tuning.phases[0].duration_sec = 1.0;
        let mut state = started(tuning, 11);
        tick(&mut state, &TickInput::default(), 1000);
        state.drain_events();
        tick(&mut state, &firing(0.0), 1100);
        assert!(spawned_projectiles(&state.drain_events()).is_empty());
    }

    #[test]
    fn test_player_death_ends_match() {
        let mut tuning = Tuning::default();
        tuning.player.max_health = 10;
        tuning.player.contact_damage = 10;
        let mut state = started(tuning, 13);
        let delay = state.current_phase().spawn_delay_ms;
        tick(&mut state, &TickInput::default(), delay);
        let enemy = spawned_enemies(&state.drain_events())[0];

        let touch = Contact::PlayerEnemy {
            enemy_id: enemy,
            enemy_pos: Vec2::new(10.0, 0.0),
            player_pos: Vec2::ZERO,
        };
        tick(&mut state, &contacts(vec![touch]), delay + 100);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::PlayerDied));
        assert!(events.contains(&GameEvent::StageEnded { stage: 1, survived: false }));
        assert!(events.contains(&GameEvent::MatchEnded { stage: 1, score: 0 }));
        assert!(state.match_state().game_over);
        assert_eq!(state.pending_timers(), 0);

        let summary = state.match_summary();
        assert_eq!(summary.stage_reached, 1);
        assert_eq!(summary.stats.damage_taken, 10);
        assert!(!state.stage_summary(1).survived);

        // Game over freezes the simulation
        tick(&mut state, &firing(0.0), delay + 5000);
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_buff_loot_pickup_starts_buff() {
        let mut tuning = fragile_tuning();
        tuning.loot.buff_drop_chance = 1.0;
        let mut state = started(tuning, 17);
        let delay = state.current_phase().spawn_delay_ms;
        tick(&mut state, &firing(0.0), delay);
        let events = state.drain_events();
        let enemy = spawned_enemies(&events)[0];
        let bullet = spawned_projectiles(&events)[0];

        let hit = Contact::BulletEnemy {
            projectile_id: bullet,
            enemy_id: enemy,
            enemy_pos: Vec2::new(30.0, 30.0),
        };
        tick(&mut state, &contacts(vec![hit]), delay + 16);
        let events = state.drain_events();
        let (loot_id, buff) = events
            .iter()
            .find_map(|e| match e {
                GameEvent::LootSpawned {
                    loot_id,
                    kind: LootKind::Buff(buff),
                    at,
                    ..
                } => {
                    assert_eq!(*at, Vec2::new(30.0, 30.0));
                    Some((*loot_id, *buff))
                }
                _ => None,
            })
            .unwrap();

        assert!(state.loot().instances().any(|l| l.id == loot_id));

        tick(&mut state, &contacts(vec![Contact::PlayerLoot { loot_id }]), delay + 32);
        let events = state.drain_events();
        // Picked loot is swept at the end of the tick
        assert!(!state.loot().instances().any(|l| l.id == loot_id));
        assert!(events.contains(&GameEvent::LootPickedUp {
            loot_id,
            kind: LootKind::Buff(buff)
        }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::BuffStarted { kind, .. } if *kind == buff)));
        assert!(state.buffs().is_active(buff));

        // A second touch of the same pickup does nothing
        tick(&mut state, &contacts(vec![Contact::PlayerLoot { loot_id }]), delay + 48);
        assert!(
            !state
                .drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::LootPickedUp { .. }))
        );
    }

    #[test]
    fn test_double_buff_skips_ammo_and_adds_projectile() {
        let mut state = started(Tuning::default(), 19);
        state.start_buff(BuffKind::Double, 0);
        let magazine = state.weapon().magazine_size();
        tick(&mut state, &firing(0.0), 0);
        let events = state.drain_events();
        assert_eq!(spawned_projectiles(&events).len(), 2);
        assert_eq!(state.weapon().ammo_in_mag(), magazine);
        assert_eq!(state.stats().shots_fired, 2);
    }

    #[test]
    fn test_shotgun_double_repeats_unless_weapon_changes() {
        let mut state = started(Tuning::default(), 23);
        state.equip_weapon(WeaponKind::Shotgun);
        state.start_buff(BuffKind::Double, 0);
        let pellets = state.tuning().weapons.shotgun.spread_angles.len();
        let repeat = state.tuning().weapons.double_repeat_delay_ms;

        tick(&mut state, &firing(0.0), 0);
        assert_eq!(spawned_projectiles(&state.drain_events()).len(), pellets);
        tick(&mut state, &TickInput::default(), repeat);
        assert_eq!(spawned_projectiles(&state.drain_events()).len(), pellets);

        // Swap weapons between the shot and its repeat
        let interval = state.weapon().fire_interval_ms(1.0);
        tick(&mut state, &firing(0.0), interval);
        state.drain_events();
        state.equip_weapon(WeaponKind::Basic);
        tick(&mut state, &TickInput::default(), interval + repeat);
        assert!(spawned_projectiles(&state.drain_events()).is_empty());
    }

    #[test]
    fn test_reload_events() {
        let mut state = started(Tuning::default(), 29);
        let magazine = state.weapon().magazine_size() as u64;
        let interval = state.weapon().fire_interval_ms(1.0);
        let mut now = 0;
        let mut events = Vec::new();
        for _ in 0..magazine {
            tick(&mut state, &firing(0.0), now);
            events.extend(state.drain_events());
            now += interval;
        }
        assert!(events.contains(&GameEvent::ReloadStarted {
            weapon: WeaponKind::Basic
        }));
        assert!(state.weapon().is_reloading());

        let reload = state.tuning().weapons.basic.reload_time_ms;
        tick(&mut state, &TickInput::default(), now + reload);
        assert!(state.drain_events().contains(&GameEvent::ReloadFinished {
            weapon: WeaponKind::Basic
        }));
        assert_eq!(state.weapon().ammo_in_mag(), magazine as u32);
    }

    #[test]
    fn test_repeat_due_when_double_ends_is_dropped() {
        let mut state = started(Tuning::default(), 23);
        state.equip_weapon(WeaponKind::Shotgun);
        state.start_buff(BuffKind::Double, 0);
        let end = state.tuning().buffs.double_ms;
        let repeat = state.tuning().weapons.double_repeat_delay_ms;
        let pellets = state.tuning().weapons.shotgun.spread_angles.len();

        tick(&mut state, &firing(0.0), end - repeat);
        assert_eq!(spawned_projectiles(&state.drain_events()).len(), pellets);

        // The repeat and the buff's end land on the same tick
        tick(&mut state, &TickInput::default(), end);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::BuffExpired { kind: BuffKind::Double }));
        assert!(spawned_projectiles(&events).is_empty());
    }

    #[test]
    fn test_spawn_on_freeze_end_tick_is_not_frozen() {
        let mut tuning = Tuning::default();
        tuning.clock.burst_interval_min_sec = 100.0;
        tuning.clock.burst_interval_max_sec = 100.0;
        let delay = tuning.phases[0].spawn_delay_ms;
        tuning.buffs.freeze_ms = delay * 2;
        let mut state = started(tuning, 5);
        state.start_buff(BuffKind::Freeze, 0);

        tick(&mut state, &TickInput::default(), delay);
        assert!(
            state
                .drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::EnemySpawned { frozen: true, .. }))
        );

        tick(&mut state, &TickInput::default(), delay * 2);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::BuffExpired { kind: BuffKind::Freeze }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemySpawned { frozen: false, .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::EnemySpawned { frozen: true, .. })));
        let mut frozen = 0;
        state.enemies().for_each_alive(&mut |e: &EnemyRecord| {
            if e.frozen {
                frozen += 1;
            }
        });
        assert_eq!(frozen, 0);
    }

    #[test]
    fn test_rapid_shortens_fire_interval_until_expiry() {
        let mut state = started(Tuning::default(), 37);
        let factor = state.tuning().weapons.rapid_fire_factor;
        let rapid_end = state.tuning().buffs.rapid_ms;
        state.start_buff(BuffKind::Rapid, 0);
        assert_eq!(state.fire_rate_factor, factor);

        let fast = state.weapon().fire_interval_ms(factor);
        assert!(fast < state.weapon().fire_interval_ms(1.0));
        tick(&mut state, &firing(0.0), 0);
        tick(&mut state, &firing(0.0), fast);
        assert_eq!(spawned_projectiles(&state.drain_events()).len(), 2);

        tick(&mut state, &TickInput::default(), rapid_end);
        assert!(state.drain_events().contains(&GameEvent::BuffExpired { kind: BuffKind::Rapid }));
        assert_eq!(state.fire_rate_factor, 1.0);

        tick(&mut state, &firing(0.0), rapid_end);
        assert_eq!(spawned_projectiles(&state.drain_events()).len(), 1);
        // Back to the normal fire rate
        tick(&mut state, &firing(0.0), rapid_end + fast);
        assert!(spawned_projectiles(&state.drain_events()).is_empty());
    }

    #[test]
    fn test_magnet_perk_recomputes_pickup_radius() {
        let mut tuning = Tuning::default();
        tuning.phases[0].duration_sec = 1.0;
        // Offer the whole menu so magnet is always available
        tuning.perks.offer_count = PerkId::ALL.len();
        let base = tuning.player.base_pickup_radius;
        let mut state = started(tuning, 41);

        tick(&mut state, &TickInput::default(), 1000);
        let unlock_at = 1000 + state.tuning().perks.choice_debounce_ms;
        tick(&mut state, &TickInput::default(), unlock_at);
        state.drain_events();

        assert!(state.choose_perk(PerkId::Magnet, unlock_at));
        let events = state.drain_events();
        let radius = state.player().pickup_radius;
        assert!(state.player().magnet_multiplier > 1.0);
        assert!((radius - base * state.player().magnet_multiplier).abs() < 1e-3);
        assert!(events.contains(&GameEvent::PickupRadiusChanged { radius }));
    }

    #[test]
    fn test_reload_finishes_during_stage_clear() {
        let mut tuning = Tuning::default();
        tuning.phases[0].duration_sec = 1.0;
        tuning.weapons.basic.magazine_size = 1;
        let reload = tuning.weapons.basic.reload_time_ms;
        let mut state = started(tuning, 43);

        tick(&mut state, &firing(0.0), 900);
        assert!(state.drain_events().contains(&GameEvent::ReloadStarted {
            weapon: WeaponKind::Basic
        }));
        tick(&mut state, &TickInput::default(), 1000);
        assert!(state.match_state().stage_clear);
        state.drain_events();

        tick(&mut state, &TickInput::default(), 900 + reload);
        assert!(state.match_state().stage_clear);
        assert!(state.drain_events().contains(&GameEvent::ReloadFinished {
            weapon: WeaponKind::Basic
        }));
        let hud = state.hud();
        assert!(!hud.reloading);
        assert_eq!(hud.ammo_in_mag, 1);
    }
}
