//! Arcade Survival headless demo
//!
//! Drives a scripted match against a toy physics layer and prints the final
//! match summary as JSON.
//!
//! Usage: `arcade-survival [seed] [tuning.json]`

use std::collections::BTreeMap;

use glam::Vec2;

use arcade_survival::consts::{DEFAULT_SEED, DEMO_TICK_MS};
use arcade_survival::direction;
use arcade_survival::sim::{Contact, GameEvent, GameState, TickInput, tick};
use arcade_survival::tuning::Tuning;

/// Stop the demo after this much simulated time (ms)
const DEMO_LIMIT_MS: u64 = 10 * 60 * 1000;
const SPAWN_RADIUS: f32 = 420.0;
const ENEMY_SPEED: f32 = 70.0;
const ENEMY_RADIUS: f32 = 12.0;
const PLAYER_RADIUS: f32 = 14.0;
const ARENA_RADIUS: f32 = 300.0;

struct Bullet {
    pos: Vec2,
    vel: Vec2,
    radius: f32,
}

/// Stand-in for the physics layer: positions only, no shapes
#[derive(Default)]
struct DemoWorld {
    player: Vec2,
    enemies: BTreeMap<u32, Vec2>,
    bullets: BTreeMap<u32, Bullet>,
    loot: BTreeMap<u32, Vec2>,
    killed: Vec<u32>,
}

impl DemoWorld {
    fn apply(&mut self, event: &GameEvent) {
        match *event {
            GameEvent::EnemySpawned { enemy_id, .. } => {
                let angle = enemy_id as f32 * 2.399;
                self.enemies.insert(enemy_id, direction(angle) * SPAWN_RADIUS);
            }
            GameEvent::EnemyKilled { enemy_id, .. } => {
                self.enemies.remove(&enemy_id);
                self.killed.push(enemy_id);
            }
            GameEvent::ProjectileSpawned {
                projectile_id,
                angle,
                speed,
                radius,
                ..
            } => {
                self.bullets.insert(
                    projectile_id,
                    Bullet {
                        pos: self.player,
                        vel: direction(angle) * speed,
                        radius,
                    },
                );
            }
            GameEvent::ProjectileRetired { projectile_id } => {
                self.bullets.remove(&projectile_id);
            }
            GameEvent::LootSpawned { loot_id, at, .. } => {
                self.loot.insert(loot_id, at);
            }
            GameEvent::LootPickedUp { loot_id, .. } | GameEvent::LootExpired { loot_id } => {
                self.loot.remove(&loot_id);
            }
            GameEvent::PlayerKnockback { impulse } => {
                self.player = (self.player + impulse * 0.1).clamp_length_max(ARENA_RADIUS);
            }
            _ => {}
        }
    }

    /// Move everything by `dt` seconds and report overlaps
    fn step(&mut self, state: &GameState, dt: f32) -> Vec<Contact> {
        let player = self.player;
        for (id, pos) in self.enemies.iter_mut() {
            let Some(record) = state.enemies().get(*id) else {
                continue;
            };
            if record.frozen {
                continue;
            }
            let toward = (player - *pos).normalize_or_zero();
            *pos += toward * ENEMY_SPEED * record.speed_multiplier * dt;
        }
        for bullet in self.bullets.values_mut() {
            bullet.pos += bullet.vel * dt;
        }

        let mut contacts = Vec::new();
        for (&projectile_id, bullet) in &self.bullets {
            for (&enemy_id, &enemy_pos) in &self.enemies {
                if bullet.pos.distance(enemy_pos) <= bullet.radius + ENEMY_RADIUS {
                    contacts.push(Contact::BulletEnemy {
                        projectile_id,
                        enemy_id,
                        enemy_pos,
                    });
                }
            }
        }
        for (&enemy_id, &enemy_pos) in &self.enemies {
            if player.distance(enemy_pos) <= PLAYER_RADIUS + ENEMY_RADIUS {
                contacts.push(Contact::PlayerEnemy {
                    enemy_id,
                    enemy_pos,
                    player_pos: player,
                });
            }
        }
        let pickup_radius = state.player().pickup_radius;
        for (&loot_id, &at) in &self.loot {
            if player.distance(at) <= pickup_radius {
                contacts.push(Contact::PlayerLoot { loot_id });
            }
        }
        contacts
    }

    /// Aim at the closest enemy
    fn aim(&self) -> Option<f32> {
        self.enemies
            .values()
            .min_by(|a, b| a.distance_squared(self.player).total_cmp(&b.distance_squared(self.player)))
            .map(|target| {
                let d = *target - self.player;
                d.y.atan2(d.x)
            })
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Arcade Survival (headless) starting...");

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_SEED);
    let tuning = match args.next() {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => Tuning::from_json(&json),
            Err(e) => {
                log::error!("Cannot read tuning file {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Ok(Tuning::default()),
    };

    let mut state = match tuning.and_then(|tuning| GameState::new(tuning, seed)) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Invalid tuning: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Game initialized with seed: {}", seed);

    let mut world = DemoWorld::default();
    state.start_match(0);
    let dt = DEMO_TICK_MS as f32 / 1000.0;
    let mut contacts = Vec::new();
    let mut now_ms = 0;

    while now_ms < DEMO_LIMIT_MS {
        now_ms += DEMO_TICK_MS;
        let aim = world.aim();
        let input = TickInput {
            aim_angle: aim.unwrap_or(0.0),
            fire: aim.is_some(),
            contacts: std::mem::take(&mut contacts),
        };
        tick(&mut state, &input, now_ms);

        for event in state.drain_events() {
            world.apply(&event);
            if let GameEvent::StageEnded { stage, survived } = event {
                let summary = state.stage_summary(stage);
                log::info!(
                    "Stage {} {} - kills {} accuracy {:.1}%",
                    stage,
                    if survived { "cleared" } else { "lost" },
                    summary.stage_stats.kills_total,
                    summary.accuracy
                );
            }
        }
        // Death animations are instant here
        for enemy_id in world.killed.drain(..) {
            state.despawn_enemy(enemy_id);
        }

        if state.match_state().stage_clear {
            if let Some(&perk) = state.perks().offer().first() {
                state.choose_perk(perk, now_ms);
            }
        }
        if state.match_state().game_over {
            break;
        }

        contacts = world.step(&state, dt);
    }

    let summary = state.match_summary();
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize match summary: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation is a library on the web; there is no headless demo
}
