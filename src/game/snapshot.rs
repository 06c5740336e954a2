//! Snapshot building for the per-tick world broadcast

use crate::ws::protocol::{CombatantInfo, PlayerSnapshot, ServerMsg};

use super::projectile::ProjectileSimulator;
use super::registry::{Combatant, CombatantRegistry, SessionId};

/// Builds world and init messages from simulation state
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// World snapshot: every combatant plus every in-flight projectile
    pub fn world(registry: &CombatantRegistry, projectiles: &ProjectileSimulator) -> ServerMsg {
        ServerMsg::World {
            players: registry.all().map(Self::player).collect(),
            projectiles: projectiles.snapshot(),
        }
    }

    /// Init message for a newly joined session; `None` if it is not registered
    pub fn init(registry: &CombatantRegistry, session_id: SessionId) -> Option<ServerMsg> {
        let you = registry.get(session_id)?;
        Some(ServerMsg::Init {
            id: session_id,
            you: CombatantInfo::from(you),
            players: registry.all().map(CombatantInfo::from).collect(),
        })
    }

    fn player(c: &Combatant) -> PlayerSnapshot {
        PlayerSnapshot {
            id: c.id(),
            name: c.name().to_string(),
            position: c.position(),
            rotation: c.rotation(),
            health: c.health(),
            weapon: c.current_weapon(),
            kills: c.kills(),
            deaths: c.deaths(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::vec3::Vec3;
    use crate::game::weapons::{WeaponDef, WeaponKind};
    use uuid::Uuid;

    #[test]
    fn test_world_lists_players_and_projectiles() {
        let mut registry = CombatantRegistry::new(Vec::new(), 5);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.add(a, "alice".to_string(), 0);
        registry.add(b, "bob".to_string(), 0);
        registry.set_weapon(b, WeaponKind::Rail);

        let mut projectiles = ProjectileSimulator::new();
        let rocket = WeaponDef::for_kind(WeaponKind::Rocket);
        let pid = projectiles
            .spawn(a, Vec3::new(0.0, 2.0, 0.0), Vec3::FORWARD, &rocket, 0)
            .id;

        match SnapshotBuilder::world(&registry, &projectiles) {
            ServerMsg::World {
                players,
                projectiles,
            } => {
                assert_eq!(players.len(), 2);
                let bob = players.iter().find(|p| p.id == b).unwrap();
                assert_eq!(bob.name, "bob");
                assert_eq!(bob.weapon, WeaponKind::Rail);
                assert_eq!(bob.health, 100);
                assert_eq!(projectiles.len(), 1);
                assert_eq!(projectiles[0].id, pid);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_world_wire_shape() {
        let mut registry = CombatantRegistry::new(Vec::new(), 5);
        registry.add(Uuid::new_v4(), "alice".to_string(), 0);
        let json =
            serde_json::to_value(SnapshotBuilder::world(&registry, &ProjectileSimulator::new()))
                .unwrap();
        assert_eq!(json["type"], "world");
        let player = &json["players"][0];
        for key in ["id", "name", "position", "rotation", "health", "weapon", "kills", "deaths"] {
            assert!(player.get(key).is_some(), "missing {key}");
        }
        assert_eq!(player["weapon"], "rifle");
        assert_eq!(json["projectiles"], serde_json::json!([]));
    }

    #[test]
    fn test_init_requires_registration() {
        let mut registry = CombatantRegistry::new(Vec::new(), 5);
        assert!(SnapshotBuilder::init(&registry, Uuid::new_v4()).is_none());

        let id = Uuid::new_v4();
        registry.add(id, "alice".to_string(), 0);
        let json = serde_json::to_value(SnapshotBuilder::init(&registry, id).unwrap()).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["you"]["currentWeapon"], "rifle");
        assert_eq!(json["you"]["inventory"].as_array().map(|a| a.len()), Some(4));
        assert_eq!(json["players"].as_array().map(|a| a.len()), Some(1));
    }
}
