//! Combatant registry - authoritative per-session player state

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::f32::consts::PI;
use uuid::Uuid;

use super::vec3::Vec3;
use super::weapons::WeaponKind;

/// Session identifier, one per WebSocket connection
pub type SessionId = Uuid;

pub const MAX_HEALTH: i32 = 100;
/// Half-extent of the playable world on every axis
pub const WORLD_BOUND: f32 = 1000.0;

/// Spawn points used when no override is configured
pub const DEFAULT_SPAWN_POINTS: [Vec3; 6] = [
    Vec3::new(0.0, 1.6, 0.0),
    Vec3::new(10.0, 1.6, 10.0),
    Vec3::new(-12.0, 1.6, 8.0),
    Vec3::new(15.0, 1.6, -14.0),
    Vec3::new(-18.0, 1.6, -6.0),
    Vec3::new(6.0, 1.6, -12.0),
];

/// Authoritative state of one connected player.
///
/// Fields are read through accessors; every mutation goes through
/// [`CombatantRegistry`] so the health/bounds/inventory invariants hold.
#[derive(Debug, Clone)]
pub struct Combatant {
    id: SessionId,
    name: String,
    position: Vec3,
    rotation: Vec3,
    health: i32,
    current_weapon: WeaponKind,
    inventory: BTreeSet<WeaponKind>,
    last_fire_at: HashMap<WeaponKind, u64>,
    kills: u32,
    deaths: u32,
    joined_at: u64,
}

impl Combatant {
    fn new(id: SessionId, name: String, spawn: Vec3, joined_at: u64) -> Self {
        Self {
            id,
            name,
            position: spawn,
            rotation: Vec3::ZERO,
            health: MAX_HEALTH,
            current_weapon: WeaponKind::Rifle,
            inventory: WeaponKind::ALL.into_iter().collect(),
            last_fire_at: HashMap::new(),
            kills: 0,
            deaths: 0,
            joined_at,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn current_weapon(&self) -> WeaponKind {
        self.current_weapon
    }

    pub fn owns(&self, kind: WeaponKind) -> bool {
        self.inventory.contains(&kind)
    }

    pub fn inventory(&self) -> impl Iterator<Item = WeaponKind> + '_ {
        self.inventory.iter().copied()
    }

    /// Timestamp of the last accepted shot with `kind`, if any
    pub fn last_fire_at(&self, kind: WeaponKind) -> Option<u64> {
        self.last_fire_at.get(&kind).copied()
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }
}

/// Health before and after a damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub before: i32,
    pub after: i32,
}

impl HealthChange {
    /// True only on the transition from alive to dead
    pub fn is_lethal(&self) -> bool {
        self.before > 0 && self.after <= 0
    }
}

/// Owns every connected combatant. Setters clamp or ignore bad input and
/// silently skip unknown ids.
pub struct CombatantRegistry {
    combatants: BTreeMap<SessionId, Combatant>,
    spawn_points: Vec<Vec3>,
    rng: ChaCha8Rng,
}

impl CombatantRegistry {
    pub fn new(spawn_points: Vec<Vec3>, seed: u64) -> Self {
        let spawn_points = if spawn_points.is_empty() {
            DEFAULT_SPAWN_POINTS.to_vec()
        } else {
            spawn_points
        };
        Self {
            combatants: BTreeMap::new(),
            spawn_points,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Register a combatant at a random spawn point. An id that is already
    /// registered is returned unchanged.
    pub fn add(&mut self, id: SessionId, name: String, now: u64) -> &Combatant {
        if !self.combatants.contains_key(&id) {
            let spawn = self.random_spawn();
            self.combatants
                .insert(id, Combatant::new(id, name, spawn, now));
        }
        &self.combatants[&id]
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Combatant> {
        self.combatants.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    /// All combatants, ordered by id
    pub fn all(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn random_spawn(&mut self) -> Vec3 {
        let idx = self.rng.gen_range(0..self.spawn_points.len());
        self.spawn_points[idx]
    }

    /// Move within world bounds; non-finite components keep their current value
    pub fn set_position(&mut self, id: SessionId, position: Vec3) {
        if let Some(c) = self.combatants.get_mut(&id) {
            c.position = Vec3::new(
                sanitize(position.x, c.position.x),
                sanitize(position.y, c.position.y),
                sanitize(position.z, c.position.z),
            )
            .clamp(-WORLD_BOUND, WORLD_BOUND);
        }
    }

    /// Set rotation clamped to `[-π, π]`; roll is always 0
    pub fn set_rotation(&mut self, id: SessionId, rotation: Vec3) {
        if let Some(c) = self.combatants.get_mut(&id) {
            c.rotation = Vec3::new(
                sanitize(rotation.x, c.rotation.x).clamp(-PI, PI),
                sanitize(rotation.y, c.rotation.y).clamp(-PI, PI),
                0.0,
            );
        }
    }

    /// Switch weapon; returns false if the kind is not owned
    pub fn set_weapon(&mut self, id: SessionId, kind: WeaponKind) -> bool {
        match self.combatants.get_mut(&id) {
            Some(c) if c.inventory.contains(&kind) => {
                c.current_weapon = kind;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn set_health(&mut self, id: SessionId, health: i32) {
        if let Some(c) = self.combatants.get_mut(&id) {
            c.health = health.clamp(0, MAX_HEALTH);
        }
    }

    /// Subtract `amount` (negative amounts are ignored), flooring at zero
    pub fn damage(&mut self, id: SessionId, amount: i32) -> Option<HealthChange> {
        let c = self.combatants.get_mut(&id)?;
        let before = c.health;
        c.health = before.saturating_sub(amount.max(0)).clamp(0, MAX_HEALTH);
        Some(HealthChange {
            before,
            after: c.health,
        })
    }

    pub fn record_fire(&mut self, id: SessionId, kind: WeaponKind, now: u64) {
        if let Some(c) = self.combatants.get_mut(&id) {
            c.last_fire_at.insert(kind, now);
        }
    }

    pub fn add_kill(&mut self, id: SessionId) -> bool {
        self.combatants
            .get_mut(&id)
            .map(|c| c.kills = c.kills.saturating_add(1))
            .is_some()
    }

    pub fn add_death(&mut self, id: SessionId) -> bool {
        self.combatants
            .get_mut(&id)
            .map(|c| c.deaths = c.deaths.saturating_add(1))
            .is_some()
    }

    /// Move to a random spawn point at full health; returns the spawn point
    pub fn respawn(&mut self, id: SessionId) -> Option<Vec3> {
        if !self.combatants.contains_key(&id) {
            return None;
        }
        let spawn = self.random_spawn();
        let c = self.combatants.get_mut(&id)?;
        c.position = spawn;
        c.health = MAX_HEALTH;
        Some(spawn)
    }
}

fn sanitize(value: f32, current: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        current
    }
}
