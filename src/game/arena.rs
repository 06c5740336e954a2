//! Arena state and the authoritative tick loop

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{tick_delta, unix_millis, Timer, TICK_INTERVAL_MS};
use crate::ws::protocol::{ClientMsg, ServerMsg, WireVec3};

use super::combat::{CombatSystem, FireOutcome, FireRejection};
use super::projectile::ProjectileSimulator;
use super::registry::{CombatantRegistry, SessionId};
use super::snapshot::SnapshotBuilder;
use super::vec3::Vec3;
use super::weapons::{FireMode, WeaponCatalog, WeaponKind};
use super::{ArenaCommand, Dispatch, Outbox};

/// Simulation core: the combatant registry, the live projectile set and the
/// weapon catalog. Every operation runs to completion and returns the
/// outbound events it produced.
pub struct Arena {
    registry: CombatantRegistry,
    projectiles: ProjectileSimulator,
    catalog: Arc<WeaponCatalog>,
    rng: ChaCha8Rng,
    tick: u64,
}

impl Arena {
    pub fn new(catalog: Arc<WeaponCatalog>, spawn_points: Vec<Vec3>, seed: u64) -> Self {
        Self {
            registry: CombatantRegistry::new(spawn_points, seed),
            projectiles: ProjectileSimulator::new(),
            catalog,
            // Separate stream so spread draws don't shift spawn selection
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            tick: 0,
        }
    }

    pub fn registry(&self) -> &CombatantRegistry {
        &self.registry
    }

    pub fn projectiles(&self) -> &ProjectileSimulator {
        &self.projectiles
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Apply one network command
    pub fn handle(&mut self, command: ArenaCommand, now: u64) -> Vec<Dispatch> {
        let mut out = Vec::new();
        match command {
            ArenaCommand::Join { session_id, name } => {
                self.join(session_id, name, now, &mut out);
            }
            ArenaCommand::Input {
                session_id,
                msg,
                received_at,
            } => match msg {
                ClientMsg::State {
                    position,
                    rotation,
                    weapon,
                } => self.apply_state(session_id, position, rotation, weapon.as_deref()),
                ClientMsg::Shoot {
                    origin,
                    direction,
                    weapon,
                } => match self.shoot(
                    session_id,
                    origin,
                    direction,
                    weapon.as_deref(),
                    received_at,
                    &mut out,
                ) {
                    FireOutcome::Resolved { kind, hits } => {
                        for hit in &hits {
                            debug!(
                                session_id = %session_id,
                                weapon = %kind,
                                target_id = %hit.target_id,
                                damage = hit.damage,
                                remaining = hit.remaining,
                                killed = hit.killed,
                                "Shot landed"
                            );
                        }
                    }
                    FireOutcome::ProjectileSpawned {
                        kind,
                        projectile_id,
                    } => {
                        debug!(session_id = %session_id, weapon = %kind, projectile_id = %projectile_id, "Projectile fired");
                    }
                    FireOutcome::Rejected(_) => {}
                },
            },
            ArenaCommand::Leave { session_id } => {
                self.leave(session_id);
            }
        }
        out
    }

    /// Register a session and queue its `init`
    pub fn join(&mut self, session_id: SessionId, name: String, now: u64, out: &mut Vec<Dispatch>) {
        let spawn = self.registry.add(session_id, name, now).position();
        if let Some(init) = SnapshotBuilder::init(&self.registry, session_id) {
            out.push(Dispatch::To(session_id, init));
        }
        info!(
            session_id = %session_id,
            x = spawn.x,
            z = spawn.z,
            player_count = self.registry.len(),
            "Combatant joined arena"
        );
    }

    /// Remove a session; repeated calls are no-ops
    pub fn leave(&mut self, session_id: SessionId) -> bool {
        match self.registry.remove(session_id) {
            Some(c) => {
                info!(
                    session_id = %session_id,
                    kills = c.kills(),
                    deaths = c.deaths(),
                    player_count = self.registry.len(),
                    "Combatant left arena"
                );
                true
            }
            None => false,
        }
    }

    /// Apply a client state update field by field
    pub fn apply_state(
        &mut self,
        session_id: SessionId,
        position: Option<WireVec3>,
        rotation: Option<WireVec3>,
        weapon: Option<&str>,
    ) {
        let Some(current) = self.registry.get(session_id) else {
            return;
        };
        let (current_pos, current_rot) = (current.position(), current.rotation());

        if let Some(position) = position {
            self.registry
                .set_position(session_id, position.resolve(current_pos));
        }
        if let Some(rotation) = rotation {
            self.registry
                .set_rotation(session_id, rotation.resolve(current_rot));
        }
        if let Some(kind) = weapon.and_then(|w| w.parse::<WeaponKind>().ok()) {
            self.registry.set_weapon(session_id, kind);
        }
    }

    /// Sanitize a raw `shoot` message and resolve it.
    ///
    /// Missing origin components fall back to the shooter's position; missing
    /// direction components fall back to `(0, 0, 1)`. A blank weapon name
    /// fires the current weapon; a name that is not a known kind drops the
    /// shot.
    pub fn shoot(
        &mut self,
        session_id: SessionId,
        origin: Option<WireVec3>,
        direction: Option<WireVec3>,
        weapon: Option<&str>,
        now: u64,
        out: &mut Vec<Dispatch>,
    ) -> FireOutcome {
        let Some(shooter) = self.registry.get(session_id) else {
            return FireOutcome::Rejected(FireRejection::UnknownShooter);
        };
        let weapon = weapon.map(str::trim).filter(|w| !w.is_empty());
        let requested = match weapon.map(str::parse::<WeaponKind>) {
            None => None,
            Some(Ok(kind)) => Some(kind),
            Some(Err(_)) => {
                debug!(session_id = %session_id, weapon = ?weapon, "Shot with unknown weapon dropped");
                return FireOutcome::Rejected(FireRejection::UnknownWeapon);
            }
        };
        let origin = origin.unwrap_or_default().resolve(shooter.position());
        let direction = direction.unwrap_or_default().resolve(Vec3::FORWARD);

        self.resolve_fire(session_id, origin, direction, requested, now, out)
    }

    /// Validate and resolve a fire event.
    ///
    /// Rejections mutate nothing and emit nothing. An accepted attempt
    /// records its fire time even when it hits nobody.
    pub fn resolve_fire(
        &mut self,
        shooter_id: SessionId,
        origin: Vec3,
        direction: Vec3,
        requested: Option<WeaponKind>,
        now: u64,
        out: &mut Vec<Dispatch>,
    ) -> FireOutcome {
        let Some(shooter) = self.registry.get(shooter_id) else {
            return FireOutcome::Rejected(FireRejection::UnknownShooter);
        };

        let kind = match requested {
            Some(kind) if shooter.owns(kind) => kind,
            _ => shooter.current_weapon(),
        };
        if !shooter.owns(kind) {
            return FireOutcome::Rejected(FireRejection::NotOwned);
        }
        let Some(weapon) = self.catalog.get(kind).copied() else {
            return FireOutcome::Rejected(FireRejection::UnknownWeapon);
        };
        if let Some(last) = shooter.last_fire_at(kind) {
            if now.saturating_sub(last) < weapon.cooldown_ms {
                debug!(session_id = %shooter_id, weapon = %kind, "Shot dropped by cooldown");
                return FireOutcome::Rejected(FireRejection::Cooldown);
            }
        }

        self.registry.record_fire(shooter_id, kind, now);
        let direction = direction.normalize_or(Vec3::FORWARD);

        match weapon.mode() {
            FireMode::Projectile => {
                let projectile =
                    self.projectiles
                        .spawn(shooter_id, origin, direction, &weapon, now);
                out.push(Dispatch::All(ServerMsg::ProjectileSpawn {
                    id: projectile.id,
                    owner: shooter_id,
                    position: projectile.position,
                }));
                FireOutcome::ProjectileSpawned {
                    kind,
                    projectile_id: projectile.id,
                }
            }
            FireMode::Hitscan => {
                let hits = CombatSystem::resolve_pellets(
                    &mut self.registry,
                    &mut self.rng,
                    shooter_id,
                    origin,
                    direction,
                    &weapon,
                    out,
                );
                FireOutcome::Resolved { kind, hits }
            }
            FireMode::Piercing => {
                let hits = CombatSystem::resolve_piercing(
                    &mut self.registry,
                    shooter_id,
                    origin,
                    direction,
                    &weapon,
                    out,
                );
                FireOutcome::Resolved { kind, hits }
            }
        }
    }

    /// One simulation tick: step projectiles, then snapshot the world
    pub fn tick(&mut self, now: u64) -> Vec<Dispatch> {
        self.tick += 1;
        let mut out = Vec::new();

        if !self.projectiles.is_empty() {
            let explosions = self
                .projectiles
                .step(&mut self.registry, tick_delta(), now, &mut out);
            for explosion in explosions {
                debug!(
                    projectile_id = %explosion.projectile_id,
                    owner_id = %explosion.owner_id,
                    cause = ?explosion.cause,
                    x = explosion.position.x,
                    y = explosion.position.y,
                    z = explosion.position.z,
                    hits = explosion.hits.len(),
                    kills = explosion.hits.iter().filter(|h| h.killed).count(),
                    "Projectile exploded"
                );
            }
        }

        out.push(Dispatch::All(SnapshotBuilder::world(
            &self.registry,
            &self.projectiles,
        )));
        out
    }
}

/// Live counters published by the arena task
#[derive(Debug, Default)]
pub struct ArenaStats {
    players: AtomicUsize,
    projectiles: AtomicUsize,
}

impl ArenaStats {
    pub fn players(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    pub fn projectiles(&self) -> usize {
        self.projectiles.load(Ordering::Relaxed)
    }

    fn publish(&self, arena: &Arena) {
        self.players.store(arena.registry().len(), Ordering::Relaxed);
        self.projectiles
            .store(arena.projectiles().len(), Ordering::Relaxed);
    }
}

/// Handle to the running arena task
#[derive(Clone)]
pub struct ArenaHandle {
    pub command_tx: mpsc::Sender<ArenaCommand>,
    pub stats: Arc<ArenaStats>,
}

impl ArenaHandle {
    /// Queue a command; false if the arena task has stopped
    pub async fn send(&self, command: ArenaCommand) -> bool {
        self.command_tx.send(command).await.is_ok()
    }
}

/// The arena task: the only place simulation state is touched
pub struct ArenaLoop<O> {
    arena: Arena,
    command_rx: mpsc::Receiver<ArenaCommand>,
    outbox: O,
    stats: Arc<ArenaStats>,
}

impl<O: Outbox> ArenaLoop<O> {
    pub fn new(arena: Arena, outbox: O) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let stats = Arc::new(ArenaStats::default());

        let handle = ArenaHandle {
            command_tx,
            stats: stats.clone(),
        };
        let arena_loop = Self {
            arena,
            command_rx,
            outbox,
            stats,
        };
        (arena_loop, handle)
    }

    /// Run until every command sender is dropped. Commands and ticks are
    /// handled one at a time on this task, so ticks never overlap.
    pub async fn run(mut self) {
        info!(tick_interval_ms = TICK_INTERVAL_MS, "Arena loop started");

        let mut tick_interval = interval(Duration::from_millis(TICK_INTERVAL_MS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let timer = Timer::new();
                    let dispatches = self.arena.tick(unix_millis());
                    self.outbox.deliver(dispatches);

                    let elapsed = timer.elapsed_ms();
                    if elapsed > TICK_INTERVAL_MS {
                        warn!(tick = self.arena.tick_count(), elapsed_ms = elapsed, "Tick overran its interval");
                    }
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        let dispatches = self.arena.handle(command, unix_millis());
                        self.outbox.deliver(dispatches);
                    }
                    None => break,
                },
            }
            self.stats.publish(&self.arena);
        }

        info!(tick = self.arena.tick_count(), "Arena loop stopped");
    }
}
