//! Engine-level settings and the seedable random source.
//!
//! All randomness in the demolition core (cut planes, fragment offsets,
//! torque, reward rolls) flows through streams derived here, so a fixed
//! seed reproduces fragment counts and every budget decision.

use anyhow::Context;
use bevy::prelude::*;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::path::Path;
use tracing::warn;

use crate::constants::{DEFAULT_CUTS_PER_TICK, FRAGMENT_LIFETIME_SECS};

/// Tunables for the demolition core as a whole. Per-entity-type tunables
/// live in [`crate::destructible::DestructibleTemplate`].
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct DemolitionSettings {
    /// Master seed; every derived stream is a pure function of this
    pub seed: u64,
    /// Cuts a shatter branch may perform before yielding to the next tick
    pub cuts_per_tick: u32,
    /// Fragment lifetime when a template does not override it
    pub fragment_lifetime: f32,
    /// Material table (JSON); missing or malformed falls back to defaults
    pub material_table_path: String,
    /// Destructible template library (RON); same fallback rule
    pub template_library_path: String,
    /// Service availability: geometric shatter scheduler
    pub shatter_enabled: bool,
    /// Service availability: primitive fragment spawner
    pub spawner_enabled: bool,
}

impl Default for DemolitionSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            cuts_per_tick: DEFAULT_CUTS_PER_TICK,
            fragment_lifetime: FRAGMENT_LIFETIME_SECS,
            material_table_path: "assets/materials.json".into(),
            template_library_path: "assets/destructibles.ron".into(),
            shatter_enabled: true,
            spawner_enabled: true,
        }
    }
}

impl DemolitionSettings {
    /// Load settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_json_file(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("settings load failed ({err:#}), using defaults");
                Self::default()
            }
        }
    }

    /// Deterministic 64-bit hash of the master seed and a salt.
    pub fn stream_hash(&self, salt: u64) -> u64 {
        stream_hash(self.seed, salt)
    }

    /// Derive an independent RNG stream for the given salt. Streams for
    /// distinct salts are uncorrelated; the same (seed, salt) pair always
    /// yields the same stream.
    pub fn stream(&self, salt: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.stream_hash(salt))
    }

    /// Stream keyed to an entity, for per-destruction randomness.
    pub fn entity_stream(&self, entity: Entity, lane: u64) -> Xoshiro256PlusPlus {
        self.stream(entity.to_bits().wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ lane)
    }
}

/// Sha3-based seed/salt mixing shared by all stream derivation.
pub fn stream_hash(seed: u64, salt: u64) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(salt.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

/// Global RNG for randomness not tied to a particular entity (reward
/// rolls, fallback cube counts). Injected as a resource so tests can
/// reseed it.
#[derive(Resource)]
pub struct DemolitionRng(pub Xoshiro256PlusPlus);

impl DemolitionRng {
    pub fn from_settings(settings: &DemolitionSettings) -> Self {
        Self(settings.stream(u64::from_le_bytes(*b"wreckrng")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = DemolitionSettings::default();
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.cuts_per_tick, DEFAULT_CUTS_PER_TICK);
        assert!(settings.shatter_enabled);
        assert!(settings.spawner_enabled);
        assert!((settings.fragment_lifetime - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stream_hash_deterministic() {
        assert_eq!(stream_hash(42, 7), stream_hash(42, 7));
        assert_ne!(stream_hash(42, 7), stream_hash(42, 8));
        assert_ne!(stream_hash(42, 7), stream_hash(43, 7));
    }

    #[test]
    fn test_streams_reproducible() {
        let settings = DemolitionSettings::default();
        let mut a = settings.stream(123);
        let mut b = settings.stream(123);
        for _ in 0..16 {
            assert_eq!(a.gen::<u64>(), b.gen::<u64>());
        }
    }

    #[test]
    fn test_entity_streams_diverge_by_lane() {
        let settings = DemolitionSettings::default();
        let entity = Entity::from_raw(11);
        let mut a = settings.entity_stream(entity, 0);
        let mut b = settings.entity_stream(entity, 1);
        assert_ne!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = DemolitionSettings {
            seed: 7,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: DemolitionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.material_table_path, settings.material_table_path);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let settings = DemolitionSettings {
            seed: 99,
            cuts_per_tick: 2,
            ..Default::default()
        };
        write!(file, "{}", serde_json::to_string(&settings).unwrap()).unwrap();
        let loaded = DemolitionSettings::from_json_file(file.path()).unwrap();
        assert_eq!(loaded.seed, 99);
        assert_eq!(loaded.cuts_per_tick, 2);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let settings = DemolitionSettings::load_or_default("/nonexistent/settings.json");
        assert_eq!(settings.seed, DemolitionSettings::default().seed);
    }
}
