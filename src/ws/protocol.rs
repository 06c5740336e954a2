//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::registry::Combatant;
use crate::game::vec3::Vec3;
use crate::game::weapons::WeaponKind;

/// Messages sent from client to server.
///
/// Every field is optional and parsed leniently: a malformed field is
/// dropped on its own instead of rejecting the whole message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Movement/aim/weapon state, sent many times per second
    State {
        #[serde(default, deserialize_with = "lenient_vec")]
        position: Option<WireVec3>,
        #[serde(default, deserialize_with = "lenient_vec")]
        rotation: Option<WireVec3>,
        #[serde(default, deserialize_with = "lenient_string")]
        weapon: Option<String>,
    },

    /// Fire request
    Shoot {
        #[serde(default, deserialize_with = "lenient_vec")]
        origin: Option<WireVec3>,
        /// Aim direction, need not be normalized
        #[serde(default, deserialize_with = "lenient_vec")]
        direction: Option<WireVec3>,
        #[serde(default, deserialize_with = "lenient_string")]
        weapon: Option<String>,
    },
}

/// Untrusted vector from a client; missing or non-finite components are `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct WireVec3 {
    #[serde(default, deserialize_with = "lenient_f32")]
    pub x: Option<f32>,
    #[serde(default, deserialize_with = "lenient_f32")]
    pub y: Option<f32>,
    #[serde(default, deserialize_with = "lenient_f32")]
    pub z: Option<f32>,
}

impl WireVec3 {
    /// Fill unusable components from `fallback`
    pub fn resolve(&self, fallback: Vec3) -> Vec3 {
        Vec3::new(
            self.x.unwrap_or(fallback.x),
            self.y.unwrap_or(fallback.y),
            self.z.unwrap_or(fallback.z),
        )
    }
}

fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // Saturate before narrowing so huge finite values still reach the clamps
    Ok(number
        .filter(|n| n.is_finite())
        .map(|n| n.clamp(f32::MIN as f64, f32::MAX as f64) as f32))
}

fn lenient_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<WireVec3>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a newly connected session
    Init {
        id: Uuid,
        you: CombatantInfo,
        players: Vec<CombatantInfo>,
    },

    /// World snapshot, broadcast every tick
    World {
        players: Vec<PlayerSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    /// You were damaged
    Hit {
        /// Health after the damage
        health: i32,
        by: Uuid,
    },

    /// Your shot damaged someone
    #[serde(rename_all = "camelCase")]
    ConfirmHit { target_id: Uuid, remaining: i32 },

    /// You were killed and respawned
    #[serde(rename_all = "camelCase")]
    Died { respawn: Vec3, killer_id: Uuid },

    ProjectileSpawn {
        id: Uuid,
        owner: Uuid,
        position: Vec3,
    },

    ProjectileExplode { id: Uuid, position: Vec3 },
}

/// Full combatant record for `init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantInfo {
    pub id: Uuid,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: i32,
    pub current_weapon: WeaponKind,
    pub inventory: Vec<WeaponKind>,
    pub kills: u32,
    pub deaths: u32,
    pub joined_at: u64,
}

impl From<&Combatant> for CombatantInfo {
    fn from(c: &Combatant) -> Self {
        Self {
            id: c.id(),
            name: c.name().to_string(),
            position: c.position(),
            rotation: c.rotation(),
            health: c.health(),
            current_weapon: c.current_weapon(),
            inventory: c.inventory().collect(),
            kills: c.kills(),
            deaths: c.deaths(),
            joined_at: c.joined_at(),
        }
    }
}

/// Player state in a world snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: i32,
    pub weapon: WeaponKind,
    pub kills: u32,
    pub deaths: u32,
}

/// In-flight projectile in a world snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: Uuid,
    pub position: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_message() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"state","position":{"x":1,"y":1.6,"z":-2},"rotation":{"x":0,"y":0.5,"z":0},"weapon":"rail"}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::State {
                position,
                rotation,
                weapon,
            } => {
                assert_eq!(position.unwrap().resolve(Vec3::ZERO), Vec3::new(1.0, 1.6, -2.0));
                assert_eq!(rotation.unwrap().y, Some(0.5));
                assert_eq!(weapon.as_deref(), Some("rail"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_fields_are_dropped_individually() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"shoot","origin":{"x":"oops","y":null,"z":"4.5"},"direction":7,"weapon":42}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::Shoot {
                origin,
                direction,
                weapon,
            } => {
                let origin = origin.unwrap();
                assert_eq!(origin.x, None);
                assert_eq!(origin.y, None);
                assert_eq!(origin.z, Some(4.5));
                assert_eq!(
                    origin.resolve(Vec3::new(9.0, 8.0, 7.0)),
                    Vec3::new(9.0, 8.0, 4.5)
                );
                assert_eq!(direction, None);
                assert_eq!(weapon, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_numbers_saturate() {
        let v: WireVec3 = serde_json::from_str(r#"{"x":1e39,"y":"-1e300","z":"NaN"}"#).unwrap();
        assert_eq!(v.x, Some(f32::MAX));
        assert_eq!(v.y, Some(f32::MIN));
        assert_eq!(v.z, None);
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"shoot"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::Shoot {
                origin: None,
                direction: None,
                weapon: None
            }
        ));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn test_server_msg_wire_names() {
        let target = Uuid::new_v4();
        let json = serde_json::to_value(ServerMsg::ConfirmHit {
            target_id: target,
            remaining: 75,
        })
        .unwrap();
        assert_eq!(json["type"], "confirm_hit");
        assert_eq!(json["targetId"], target.to_string());
        assert_eq!(json["remaining"], 75);

        let json = serde_json::to_value(ServerMsg::Died {
            respawn: Vec3::new(0.0, 1.6, 0.0),
            killer_id: target,
        })
        .unwrap();
        assert_eq!(json["type"], "died");
        assert_eq!(json["killerId"], target.to_string());
        assert_eq!(json["respawn"]["x"], 0.0);
    }
}
