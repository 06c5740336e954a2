//! Combat system - hitscan resolution and the shared damage/kill protocol

use rand::Rng;
use std::cmp::Ordering;
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::physics::{PhysicsSystem, Ray};
use super::registry::{CombatantRegistry, SessionId};
use super::vec3::Vec3;
use super::weapons::{WeaponDef, WeaponKind};
use super::Dispatch;

/// Why a fire attempt was dropped. None of these produce client feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRejection {
    /// Shooter is no longer registered
    UnknownShooter,
    /// Requested name is not a weapon, or the kind is missing from the catalog
    UnknownWeapon,
    NotOwned,
    Cooldown,
}

/// Result of a fire attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Rejected(FireRejection),
    ProjectileSpawned { kind: WeaponKind, projectile_id: Uuid },
    Resolved { kind: WeaponKind, hits: Vec<HitRecord> },
}

/// One damage application against one target
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub target_id: SessionId,
    pub damage: i32,
    /// Health right after the damage, before any respawn
    pub remaining: i32,
    pub killed: bool,
}

/// A target intersected by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub target_id: SessionId,
    /// Distance along the ray
    pub forward: f32,
}

fn by_distance_then_id(a: &RayHit, b: &RayHit) -> Ordering {
    a.forward
        .total_cmp(&b.forward)
        .then_with(|| a.target_id.cmp(&b.target_id))
}

/// Combat system for hit detection and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Nearest combatant on the ray, excluding `exclude`
    pub fn nearest_hit(
        registry: &CombatantRegistry,
        ray: &Ray,
        exclude: SessionId,
    ) -> Option<RayHit> {
        Self::candidates(registry, ray, exclude).min_by(by_distance_then_id)
    }

    /// Every combatant on the ray, nearest first (ties by id)
    pub fn all_hits(registry: &CombatantRegistry, ray: &Ray, exclude: SessionId) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = Self::candidates(registry, ray, exclude).collect();
        hits.sort_by(by_distance_then_id);
        hits
    }

    fn candidates<'a>(
        registry: &'a CombatantRegistry,
        ray: &'a Ray,
        exclude: SessionId,
    ) -> impl Iterator<Item = RayHit> + 'a {
        registry
            .all()
            .filter(move |c| c.id() != exclude)
            .filter_map(move |c| {
                PhysicsSystem::ray_hit(c.position(), ray).map(|forward| RayHit {
                    target_id: c.id(),
                    forward,
                })
            })
    }

    /// Resolve a non-piercing hitscan shot: each pellet hits at most its
    /// nearest target, and pellet damage is summed per target before a single
    /// damage application.
    pub fn resolve_pellets<R: Rng>(
        registry: &mut CombatantRegistry,
        rng: &mut R,
        shooter_id: SessionId,
        origin: Vec3,
        direction: Vec3,
        weapon: &WeaponDef,
        out: &mut Vec<Dispatch>,
    ) -> Vec<HitRecord> {
        let mut damage_by_target: Vec<(SessionId, i32)> = Vec::new();

        for _ in 0..weapon.pellets {
            let pellet_dir = if weapon.spread > 0.0 {
                let a = rng.gen_range(-weapon.spread..=weapon.spread);
                let b = rng.gen_range(-weapon.spread..=weapon.spread);
                PhysicsSystem::perturb(direction, a, b)
            } else {
                direction
            };
            let ray = Ray::new(origin, pellet_dir, weapon.range);

            if let Some(hit) = Self::nearest_hit(registry, &ray, shooter_id) {
                match damage_by_target.iter_mut().find(|(id, _)| *id == hit.target_id) {
                    Some((_, total)) => *total = total.saturating_add(weapon.damage),
                    None => damage_by_target.push((hit.target_id, weapon.damage)),
                }
            }
        }

        damage_by_target
            .into_iter()
            .filter_map(|(target_id, damage)| {
                Self::apply_hit(registry, shooter_id, target_id, damage, out)
            })
            .collect()
    }

    /// Resolve a piercing shot: full damage to every target on the ray
    pub fn resolve_piercing(
        registry: &mut CombatantRegistry,
        shooter_id: SessionId,
        origin: Vec3,
        direction: Vec3,
        weapon: &WeaponDef,
        out: &mut Vec<Dispatch>,
    ) -> Vec<HitRecord> {
        let ray = Ray::new(origin, direction, weapon.range);
        Self::all_hits(registry, &ray, shooter_id)
            .into_iter()
            .filter_map(|hit| {
                Self::apply_hit(registry, shooter_id, hit.target_id, weapon.damage, out)
            })
            .collect()
    }

    /// Apply damage to one target and run the kill/respawn protocol.
    ///
    /// Emits `hit` to the target and `confirm_hit` to the attacker. On the
    /// alive-to-dead transition the attacker (if still registered) gains a
    /// kill, the target gains a death, is moved to a spawn point at full
    /// health, and receives `died`. Returns `None` if the target is gone.
    pub fn apply_hit(
        registry: &mut CombatantRegistry,
        attacker_id: SessionId,
        target_id: SessionId,
        damage: i32,
        out: &mut Vec<Dispatch>,
    ) -> Option<HitRecord> {
        let change = registry.damage(target_id, damage)?;

        out.push(Dispatch::To(
            target_id,
            ServerMsg::Hit {
                health: change.after,
                by: attacker_id,
            },
        ));
        out.push(Dispatch::To(
            attacker_id,
            ServerMsg::ConfirmHit {
                target_id,
                remaining: change.after,
            },
        ));

        let killed = change.is_lethal();
        if killed {
            registry.add_kill(attacker_id);
            registry.add_death(target_id);
            if let Some(respawn) = registry.respawn(target_id) {
                out.push(Dispatch::To(
                    target_id,
                    ServerMsg::Died {
                        respawn,
                        killer_id: attacker_id,
                    },
                ));
            }
            info!(killer_id = %attacker_id, victim_id = %target_id, "Combatant killed");
        }

        Some(HitRecord {
            target_id,
            damage,
            remaining: change.after,
            killed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::registry::MAX_HEALTH;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn place(registry: &mut CombatantRegistry, pos: Vec3) -> SessionId {
        let id = Uuid::new_v4();
        registry.add(id, "p".to_string(), 0);
        registry.set_position(id, pos);
        id
    }

    #[test]
    fn test_nearest_hit_skips_shooter_and_picks_closest() {
        let mut registry = CombatantRegistry::new(Vec::new(), 3);
        let shooter = place(&mut registry, Vec3::new(0.0, 1.6, 0.0));
        let near = place(&mut registry, Vec3::new(0.0, 1.6, 5.0));
        let _far = place(&mut registry, Vec3::new(0.0, 1.6, 9.0));

        let ray = Ray::new(Vec3::new(0.0, 1.6, 0.0), Vec3::FORWARD, 120.0);
        let hit = CombatSystem::nearest_hit(&registry, &ray, shooter).unwrap();
        assert_eq!(hit.target_id, near);
        assert_eq!(hit.forward, 5.0);
    }

    #[test]
    fn test_equal_distance_ties_break_by_id() {
        let mut registry = CombatantRegistry::new(Vec::new(), 3);
        let shooter = place(&mut registry, Vec3::new(0.0, 1.6, 0.0));
        let a = place(&mut registry, Vec3::new(0.3, 1.6, 8.0));
        let b = place(&mut registry, Vec3::new(-0.3, 1.6, 8.0));

        let ray = Ray::new(Vec3::new(0.0, 1.6, 0.0), Vec3::FORWARD, 120.0);
        let hits = CombatSystem::all_hits(&registry, &ray, shooter);
        let order: Vec<SessionId> = hits.iter().map(|h| h.target_id).collect();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_apply_hit_lethal_protocol() {
        let mut registry = CombatantRegistry::new(Vec::new(), 3);
        let attacker = place(&mut registry, Vec3::new(0.0, 1.6, 0.0));
        let target = place(&mut registry, Vec3::new(0.0, 1.6, 5.0));
        registry.set_health(target, 20);

        let mut out = Vec::new();
        let record = CombatSystem::apply_hit(&mut registry, attacker, target, 25, &mut out).unwrap();
        assert!(record.killed);
        assert_eq!(record.remaining, 0);

        assert_eq!(registry.get(attacker).unwrap().kills(), 1);
        let t = registry.get(target).unwrap();
        assert_eq!(t.deaths(), 1);
        assert_eq!(t.health(), MAX_HEALTH);

        assert_eq!(out.len(), 3);
        assert_eq!(
            out[1],
            Dispatch::To(
                attacker,
                ServerMsg::ConfirmHit {
                    target_id: target,
                    remaining: 0
                }
            )
        );
        assert!(matches!(
            &out[2],
            Dispatch::To(id, ServerMsg::Died { killer_id, .. }) if *id == target && *killer_id == attacker
        ));
    }

    #[test]
    fn test_apply_hit_at_zero_does_not_retrigger_kill() {
        let mut registry = CombatantRegistry::new(Vec::new(), 3);
        let attacker = place(&mut registry, Vec3::new(0.0, 1.6, 0.0));
        let target = place(&mut registry, Vec3::new(0.0, 1.6, 5.0));
        registry.set_health(target, 0);

        let mut out = Vec::new();
        let record = CombatSystem::apply_hit(&mut registry, attacker, target, 25, &mut out).unwrap();
        assert!(!record.killed);
        assert_eq!(registry.get(attacker).unwrap().kills(), 0);
        assert_eq!(registry.get(target).unwrap().deaths(), 0);
        assert_eq!(registry.get(target).unwrap().health(), 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_pellets_on_one_target_are_summed() {
        let mut registry = CombatantRegistry::new(Vec::new(), 3);
        let shooter = place(&mut registry, Vec3::new(0.0, 1.6, 0.0));
        let target = place(&mut registry, Vec3::new(0.0, 1.6, 3.0));
        let shotgun = WeaponDef::for_kind(WeaponKind::Shotgun);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let mut out = Vec::new();
        let hits = CombatSystem::resolve_pellets(
            &mut registry,
            &mut rng,
            shooter,
            Vec3::new(0.0, 1.6, 0.0),
            Vec3::FORWARD,
            &shotgun,
            &mut out,
        );

        // At 3 units the max pellet offset is ~0.25, well inside the hit radius
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_id, target);
        assert_eq!(hits[0].damage, 12 * 8);
        assert_eq!(hits[0].remaining, 4);
        assert_eq!(out.len(), 2);
    }
}
