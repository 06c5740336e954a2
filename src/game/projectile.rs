//! Projectile simulation - rocket flight, detonation and splash damage

use uuid::Uuid;

use crate::ws::protocol::{ProjectileSnapshot, ServerMsg};

use super::combat::{CombatSystem, HitRecord};
use super::physics::PhysicsSystem;
use super::registry::{CombatantRegistry, SessionId};
use super::vec3::Vec3;
use super::weapons::WeaponDef;
use super::Dispatch;

/// Rockets at or below this height hit the floor
pub const GROUND_HEIGHT: f32 = 0.5;
/// Rockets detonate within this distance of a non-owner combatant
pub const PROXIMITY_RADIUS: f32 = 1.0;

/// An in-flight projectile
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: Uuid,
    /// Lookup key only; the owner may have disconnected
    pub owner_id: SessionId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Absolute expiry time (unix millis)
    pub expires_at: u64,
    pub splash_radius: f32,
    pub splash_max: i32,
}

impl Projectile {
    /// Create a projectile travelling along `direction` (unit vector)
    pub fn new(owner_id: SessionId, origin: Vec3, direction: Vec3, weapon: &WeaponDef, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            position: origin,
            velocity: direction * weapon.speed,
            expires_at: now.saturating_add(weapon.ttl_ms),
            splash_radius: weapon.splash_radius,
            splash_max: weapon.splash_max,
        }
    }

    /// First matching detonation trigger, checked in priority order
    fn detonation_cause(&self, registry: &CombatantRegistry, now: u64) -> Option<DetonationCause> {
        if self.position.y <= GROUND_HEIGHT {
            return Some(DetonationCause::Ground);
        }
        if now >= self.expires_at {
            return Some(DetonationCause::Expired);
        }
        registry
            .all()
            .filter(|c| c.id() != self.owner_id)
            .any(|c| c.position().distance(self.position) <= PROXIMITY_RADIUS)
            .then_some(DetonationCause::Proximity)
    }
}

/// What made a projectile explode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetonationCause {
    Ground,
    Expired,
    Proximity,
}

/// A projectile removed this tick
#[derive(Debug, Clone)]
pub struct Explosion {
    pub projectile_id: Uuid,
    pub owner_id: SessionId,
    pub position: Vec3,
    pub cause: DetonationCause,
    pub hits: Vec<HitRecord>,
}

/// Owns the live projectile set
#[derive(Debug, Default)]
pub struct ProjectileSimulator {
    live: Vec<Projectile>,
}

impl ProjectileSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        owner_id: SessionId,
        origin: Vec3,
        direction: Vec3,
        weapon: &WeaponDef,
        now: u64,
    ) -> &Projectile {
        let projectile = Projectile::new(owner_id, origin, direction, weapon, now);
        self.live.push(projectile);
        &self.live[self.live.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.live.iter()
    }

    /// Positions for the world broadcast
    pub fn snapshot(&self) -> Vec<ProjectileSnapshot> {
        self.iter()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                position: p.position,
            })
            .collect()
    }

    /// Advance every projectile by `dt` seconds and detonate the ones whose
    /// trigger fired. Each detonation applies splash damage to every
    /// combatant in range (owner included), broadcasts `projectile_explode`
    /// and removes the projectile.
    pub fn step(
        &mut self,
        registry: &mut CombatantRegistry,
        dt: f32,
        now: u64,
        out: &mut Vec<Dispatch>,
    ) -> Vec<Explosion> {
        let mut explosions = Vec::new();

        self.live.retain_mut(|projectile| {
            projectile.position += projectile.velocity * dt;
            match projectile.detonation_cause(registry, now) {
                None => true,
                Some(cause) => {
                    explosions.push(detonate(projectile, cause, registry, out));
                    false
                }
            }
        });

        explosions
    }
}

fn detonate(
    projectile: &Projectile,
    cause: DetonationCause,
    registry: &mut CombatantRegistry,
    out: &mut Vec<Dispatch>,
) -> Explosion {
    let in_range: Vec<(SessionId, i32)> = registry
        .all()
        .map(|c| {
            let distance = c.position().distance(projectile.position);
            let damage = PhysicsSystem::splash_damage(
                distance,
                projectile.splash_radius,
                projectile.splash_max,
            );
            (c.id(), damage)
        })
        .filter(|(_, damage)| *damage > 0)
        .collect();

    let hits: Vec<HitRecord> = in_range
        .into_iter()
        .filter_map(|(target_id, damage)| {
            CombatSystem::apply_hit(registry, projectile.owner_id, target_id, damage, out)
        })
        .collect();

    out.push(Dispatch::All(ServerMsg::ProjectileExplode {
        id: projectile.id,
        position: projectile.position,
    }));

    Explosion {
        projectile_id: projectile.id,
        owner_id: projectile.owner_id,
        position: projectile.position,
        cause,
        hits,
    }
}
