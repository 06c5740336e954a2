//! Weapon catalog - static per-kind weapon definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Weapon kinds a combatant can carry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Single accurate hitscan round
    #[default]
    Rifle,
    /// Spread of hitscan pellets
    Shotgun,
    /// Slow projectile with splash damage
    Rocket,
    /// Piercing hitscan beam
    Rail,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 4] = [Self::Rifle, Self::Shotgun, Self::Rocket, Self::Rail];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rifle => "rifle",
            Self::Shotgun => "shotgun",
            Self::Rocket => "rocket",
            Self::Rail => "rail",
        }
    }
}

impl fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeaponKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownKind(s.to_string()))
    }
}

/// How a weapon's shot is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    /// Nearest target per pellet, pellet damage summed per target
    Hitscan,
    /// Every target along the ray
    Piercing,
    /// Spawns a simulated projectile
    Projectile,
}

/// Immutable stats for one weapon kind.
///
/// Hitscan weapons use `damage`/`pellets`/`spread`/`range`; projectile weapons
/// use `speed`/`ttl_ms`/`splash_radius`/`splash_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponDef {
    /// Minimum time between shots (milliseconds)
    pub cooldown_ms: u64,
    /// Damage per hit
    #[serde(default)]
    pub damage: i32,
    /// Rays cast per shot
    #[serde(default = "default_pellets")]
    pub pellets: u32,
    /// Max random offset per non-forward axis
    #[serde(default)]
    pub spread: f32,
    /// Effective range
    #[serde(default)]
    pub range: f32,
    /// Damage every target on the ray instead of the nearest
    #[serde(default)]
    pub pierce: bool,
    /// Projectile speed (units per second), zero for hitscan weapons
    #[serde(default)]
    pub speed: f32,
    /// Projectile lifetime (milliseconds)
    #[serde(default)]
    pub ttl_ms: u64,
    #[serde(default)]
    pub splash_radius: f32,
    #[serde(default)]
    pub splash_max: i32,
}

fn default_pellets() -> u32 {
    1
}

impl WeaponDef {
    pub fn for_kind(kind: WeaponKind) -> Self {
        let base = Self {
            cooldown_ms: 0,
            damage: 0,
            pellets: 1,
            spread: 0.0,
            range: 0.0,
            pierce: false,
            speed: 0.0,
            ttl_ms: 0,
            splash_radius: 0.0,
            splash_max: 0,
        };
        match kind {
            WeaponKind::Rifle => Self {
                cooldown_ms: 180,
                damage: 25,
                range: 120.0,
                ..base
            },
            WeaponKind::Shotgun => Self {
                cooldown_ms: 800,
                damage: 12,
                pellets: 8,
                spread: 0.06,
                range: 40.0,
                ..base
            },
            WeaponKind::Rocket => Self {
                cooldown_ms: 900,
                speed: 45.0,
                ttl_ms: 3000,
                splash_radius: 6.0,
                splash_max: 85,
                ..base
            },
            WeaponKind::Rail => Self {
                cooldown_ms: 1200,
                damage: 90,
                range: 300.0,
                pierce: true,
                ..base
            },
        }
    }

    pub fn mode(&self) -> FireMode {
        if self.speed > 0.0 {
            FireMode::Projectile
        } else if self.pierce {
            FireMode::Piercing
        } else {
            FireMode::Hitscan
        }
    }

    fn validate(&self, kind: WeaponKind) -> Result<(), CatalogError> {
        let invalid = |reason: &'static str| CatalogError::Invalid { kind, reason };

        if self.cooldown_ms == 0 {
            return Err(invalid("cooldownMs must be positive"));
        }
        match self.mode() {
            FireMode::Projectile => {
                if self.ttl_ms == 0 {
                    return Err(invalid("ttlMs must be positive"));
                }
                if !(self.splash_radius > 0.0) {
                    return Err(invalid("splashRadius must be positive"));
                }
            }
            FireMode::Hitscan | FireMode::Piercing => {
                if self.pellets == 0 {
                    return Err(invalid("pellets must be at least 1"));
                }
                if !(self.range > 0.0) {
                    return Err(invalid("range must be positive"));
                }
                if !self.spread.is_finite() || self.spread < 0.0 {
                    return Err(invalid("spread must be finite and non-negative"));
                }
            }
        }
        Ok(())
    }
}

/// Read-only lookup of weapon definitions, built once at startup
#[derive(Debug, Clone)]
pub struct WeaponCatalog {
    weapons: BTreeMap<WeaponKind, WeaponDef>,
}

impl WeaponCatalog {
    pub fn get(&self, kind: WeaponKind) -> Option<&WeaponDef> {
        self.weapons.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = WeaponKind> + '_ {
        self.weapons.keys().copied()
    }

    /// Parse a catalog from JSON, e.g. `{"rifle": {"cooldownMs": 180, ...}}`
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let weapons: BTreeMap<WeaponKind, WeaponDef> = serde_json::from_str(json)?;
        for (kind, def) in &weapons {
            def.validate(*kind)?;
        }
        Ok(Self { weapons })
    }

    /// Load a catalog file (called once during startup)
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Default for WeaponCatalog {
    fn default() -> Self {
        Self {
            weapons: WeaponKind::ALL
                .into_iter()
                .map(|kind| (kind, WeaponDef::for_kind(kind)))
                .collect(),
        }
    }
}

/// Catalog loading errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown weapon kind: {0}")]
    UnknownKind(String),

    #[error("Failed to read weapon catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed weapon catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid definition for {kind}: {reason}")]
    Invalid {
        kind: WeaponKind,
        reason: &'static str,
    },
}
