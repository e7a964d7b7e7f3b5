//! Material breakability rules.
//!
//! A registry of per-material rules (shatterability, strength threshold,
//! density) loaded once from a JSON table. Lookups never fail: unknown
//! tags degrade to a conservative breakable default and non-breakable
//! materials answer strength/density with sentinels, each with a logged
//! warning. The registry is read-only after load.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DemolitionSettings;

/// Conservative default for tags missing from the table
pub const UNKNOWN_STRENGTH: i32 = 30;
pub const UNKNOWN_DENSITY: i32 = 50;

/// Sentinels returned when strength/density is queried on a material
/// that cannot break (callers are expected to check `can_break` first)
pub const UNBREAKABLE_STRENGTH: i32 = 999;
pub const UNBREAKABLE_DENSITY: i32 = 100;

pub struct MaterialsPlugin;

impl Plugin for MaterialsPlugin {
    fn build(&self, app: &mut App) {
        let path = app
            .world()
            .get_resource::<DemolitionSettings>()
            .map(|s| s.material_table_path.clone())
            .unwrap_or_else(|| DemolitionSettings::default().material_table_path);
        app.insert_resource(MaterialRegistry::load_or_default(&path));
    }
}

/// One rule row of the material table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub can_shatter: bool,
    pub strength: i32,
    pub density: i32,
}

impl MaterialRule {
    pub fn new(kind: &str, can_shatter: bool, strength: i32, density: i32) -> Self {
        Self {
            kind: kind.to_string(),
            can_shatter,
            strength,
            density,
        }
    }
}

/// JSON root of the external material table.
#[derive(Debug, Serialize, Deserialize)]
struct MaterialTable {
    materials: Vec<MaterialRule>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("material table io: {0}")]
    Io(#[from] std::io::Error),
    #[error("material table parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("material table is empty")]
    Empty,
}

/// Tag linking an entity to a material rule.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct MaterialTag(pub String);

impl MaterialTag {
    pub fn new(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

/// Immutable-after-load lookup table of material rules.
#[derive(Resource, Debug, Clone)]
pub struct MaterialRegistry {
    rules: Vec<MaterialRule>,
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::fallback()
    }
}

impl MaterialRegistry {
    /// Built-in minimal rule set used whenever the external table is
    /// absent or malformed.
    pub fn fallback() -> Self {
        Self {
            rules: vec![
                MaterialRule::new("BEDROCK", false, 999, 100),
                MaterialRule::new("GLASS", true, 10, 20),
                MaterialRule::new("CONCRETE", true, 50, 80),
            ],
        }
    }

    pub fn from_rules(rules: Vec<MaterialRule>) -> Self {
        Self { rules }
    }

    /// Parse the JSON table at `path`. Strict variant used by the
    /// graceful loader and by tests.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path)?;
        let table: MaterialTable = serde_json::from_str(&raw)?;
        if table.materials.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self {
            rules: table.materials,
        })
    }

    /// Load the table, degrading to the built-in fallback set on any
    /// error. Never fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_json_file(path) {
            Ok(registry) => {
                debug!(
                    rules = registry.rules.len(),
                    path = %path.display(),
                    "material table loaded"
                );
                registry
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    "material table unavailable ({err}), using built-in defaults"
                );
                Self::fallback()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn find(&self, kind: &str) -> Option<&MaterialRule> {
        self.rules.iter().find(|r| r.kind == kind)
    }

    /// Whether the material can shatter. Unknown tags are treated as
    /// breakable with a warning.
    pub fn can_break(&self, kind: &str) -> bool {
        match self.find(kind) {
            Some(rule) => rule.can_shatter,
            None => {
                warn!(kind, "unknown material tag, assuming breakable");
                true
            }
        }
    }

    /// Minimum impact force needed to break this material. Check
    /// `can_break` first: non-breakable materials answer with a sentinel.
    pub fn strength(&self, kind: &str) -> i32 {
        match self.find(kind) {
            Some(rule) if rule.can_shatter => rule.strength,
            Some(_) => {
                warn!(kind, "strength queried on non-breakable material");
                UNBREAKABLE_STRENGTH
            }
            None => {
                warn!(kind, "unknown material tag, using default strength");
                UNKNOWN_STRENGTH
            }
        }
    }

    /// Density of the material; inversely drives the shatter cut count.
    /// Same lookup-before-use contract as `strength`.
    pub fn density(&self, kind: &str) -> i32 {
        match self.find(kind) {
            Some(rule) if rule.can_shatter => rule.density,
            Some(_) => {
                warn!(kind, "density queried on non-breakable material");
                UNBREAKABLE_DENSITY
            }
            None => {
                warn!(kind, "unknown material tag, using default density");
                UNKNOWN_DENSITY
            }
        }
    }

    /// Cut count for a material-driven break: lighter materials shatter
    /// into more pieces, harder impacts add more cuts. Truncating integer
    /// math, floored at one cut for breakable materials.
    pub fn shatter_count(&self, kind: &str, impact_force: f32) -> u32 {
        if !self.can_break(kind) {
            return 0;
        }
        let density = self.density(kind);
        let density_factor = (100 - density) / 10;
        let cuts = (density_factor as f32 * (impact_force / 10.0)) as i32;
        cuts.max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn registry() -> MaterialRegistry {
        MaterialRegistry::fallback()
    }

    #[test]
    fn test_fallback_rules() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        assert!(!reg.can_break("BEDROCK"));
        assert!(reg.can_break("GLASS"));
        assert!(reg.can_break("CONCRETE"));
    }

    #[test]
    fn test_known_lookups() {
        let reg = registry();
        assert_eq!(reg.strength("GLASS"), 10);
        assert_eq!(reg.density("GLASS"), 20);
        assert_eq!(reg.strength("CONCRETE"), 50);
        assert_eq!(reg.density("CONCRETE"), 80);
    }

    #[test]
    fn test_unknown_tag_conservative_defaults() {
        let reg = registry();
        assert!(reg.can_break("UNOBTAINIUM"));
        assert_eq!(reg.strength("UNOBTAINIUM"), UNKNOWN_STRENGTH);
        assert_eq!(reg.density("UNOBTAINIUM"), UNKNOWN_DENSITY);
    }

    #[test]
    fn test_non_breakable_sentinels() {
        let reg = registry();
        assert_eq!(reg.strength("BEDROCK"), UNBREAKABLE_STRENGTH);
        assert_eq!(reg.density("BEDROCK"), UNBREAKABLE_DENSITY);
    }

    #[test]
    fn test_shatter_count_density_scaling() {
        let reg = registry();
        // GLASS density 20 -> factor 8; force 10 -> 8 cuts
        assert_eq!(reg.shatter_count("GLASS", 10.0), 8);
        // CONCRETE density 80 -> factor 2; force 10 -> 2 cuts
        assert_eq!(reg.shatter_count("CONCRETE", 10.0), 2);
        // Harder impacts add cuts
        assert_eq!(reg.shatter_count("CONCRETE", 25.0), 5);
    }

    #[test]
    fn test_shatter_count_floors_at_one() {
        let reg = registry();
        assert_eq!(reg.shatter_count("CONCRETE", 1.0), 1);
    }

    #[test]
    fn test_shatter_count_non_breakable_is_zero() {
        let reg = registry();
        assert_eq!(reg.shatter_count("BEDROCK", 100.0), 0);
    }

    #[test]
    fn test_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"materials": [
                {{"type": "BRICK", "can_shatter": true, "strength": 25, "density": 60}},
                {{"type": "STEEL", "can_shatter": false, "strength": 500, "density": 95}}
            ]}}"#
        )
        .unwrap();
        let reg = MaterialRegistry::load_or_default(file.path());
        assert_eq!(reg.len(), 2);
        assert!(reg.can_break("BRICK"));
        assert_eq!(reg.strength("BRICK"), 25);
        assert!(!reg.can_break("STEEL"));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let reg = MaterialRegistry::load_or_default("/nonexistent/materials.json");
        assert_eq!(reg.len(), 3);
        assert!(reg.can_break("GLASS"));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let reg = MaterialRegistry::load_or_default(file.path());
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_empty_table_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"materials": []}}"#).unwrap();
        let reg = MaterialRegistry::load_or_default(file.path());
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_rule_serde_field_names() {
        let rule = MaterialRule::new("GLASS", true, 10, 20);
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains(r#""type":"GLASS""#));
        assert!(json.contains(r#""can_shatter":true"#));
    }
}
