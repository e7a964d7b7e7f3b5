//! Per-entity-type destruction tunables and the RON template library.
//!
//! Templates are authored data: validated once at load, then shared
//! read-only across every instance of that type via [`Arc`]. Runtime code
//! never mutates a template.

use bevy::prelude::*;
use rand::Rng;
use ron::de::from_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::constants::{
    DEFAULT_BREAK_FORCE_THRESHOLD, DEFAULT_FRAGMENT_EXPLOSION_FORCE, DEFAULT_HITS_TO_DESTROY,
    DEFAULT_IMPACT_FORCE_MULT, DEFAULT_MIN_IMPACT_FORCE, DEFAULT_SHATTER_AMOUNT,
    EFFECTIVE_CUTS_CAP, SHATTER_AMOUNT_MAX, SHATTER_AMOUNT_MIN,
};

/// Coins granted on destruction: a fixed amount or a uniform draw from an
/// inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinReward {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl Default for CoinReward {
    fn default() -> Self {
        CoinReward::Fixed(0)
    }
}

impl CoinReward {
    pub fn roll(&self, rng: &mut impl Rng) -> u32 {
        match *self {
            CoinReward::Fixed(amount) => amount,
            CoinReward::Range { min, max } => {
                let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
                rng.gen_range(lo..=hi)
            }
        }
    }
}

/// Authoring-time tunables for one destructible entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestructibleTemplate {
    /// Registered hits before the object breaks (>= 1)
    pub hits_to_destroy: u32,
    /// Impacts below this force never register
    pub minimum_impact_force: f32,
    /// Geometric mesh splitting instead of primitive fragments
    pub use_realistic_destruction: bool,
    /// Base cut budget for the shatter scheduler
    pub shatter_amount: u32,
    /// Add impact-force-scaled cuts on top of the base amount
    pub scale_force_with_impact: bool,
    pub impact_force_multiplier: f32,
    /// Outward impulse applied to spawned fragments
    pub fragment_explosion_force: f32,
    /// A single impact at or above `break_force_threshold` destroys the
    /// object outright, ignoring the remaining hit count
    pub fragile: bool,
    pub break_force_threshold: f32,
    /// Override for the engine-wide fragment lifetime
    pub fragment_lifetime: Option<f32>,
    pub reward: CoinReward,
}

impl Default for DestructibleTemplate {
    fn default() -> Self {
        Self {
            hits_to_destroy: DEFAULT_HITS_TO_DESTROY,
            minimum_impact_force: DEFAULT_MIN_IMPACT_FORCE,
            use_realistic_destruction: true,
            shatter_amount: DEFAULT_SHATTER_AMOUNT,
            scale_force_with_impact: false,
            impact_force_multiplier: DEFAULT_IMPACT_FORCE_MULT,
            fragment_explosion_force: DEFAULT_FRAGMENT_EXPLOSION_FORCE,
            fragile: false,
            break_force_threshold: DEFAULT_BREAK_FORCE_THRESHOLD,
            fragment_lifetime: None,
            reward: CoinReward::default(),
        }
    }
}

impl DestructibleTemplate {
    /// Pull out-of-range authored values back into their working ranges.
    /// Adjustments are logged, never fatal.
    pub fn validated(mut self) -> Self {
        if self.hits_to_destroy == 0 {
            warn!("template hits_to_destroy 0 raised to 1");
            self.hits_to_destroy = 1;
        }
        let clamped = self
            .shatter_amount
            .clamp(SHATTER_AMOUNT_MIN, SHATTER_AMOUNT_MAX);
        if clamped != self.shatter_amount {
            warn!(
                from = self.shatter_amount,
                to = clamped,
                "template shatter_amount clamped"
            );
            self.shatter_amount = clamped;
        }
        if self.minimum_impact_force < 0.0 {
            warn!("template minimum_impact_force below zero, using 0");
            self.minimum_impact_force = 0.0;
        }
        if self.impact_force_multiplier < 0.0 {
            warn!("template impact_force_multiplier below zero, using 0");
            self.impact_force_multiplier = 0.0;
        }
        if let CoinReward::Range { min, max } = self.reward {
            if min > max {
                warn!(min, max, "template reward range inverted, swapping");
                self.reward = CoinReward::Range { min: max, max: min };
            }
        }
        self
    }

    /// Cut budget for one destruction, optionally scaled by impact force
    /// and always capped.
    pub fn effective_cuts(&self, impact_force: f32) -> u32 {
        let mut cuts = self.shatter_amount;
        if self.scale_force_with_impact {
            let extra = (impact_force.max(0.0) * self.impact_force_multiplier) as u32;
            cuts = cuts.saturating_add(extra);
        }
        cuts.min(EFFECTIVE_CUTS_CAP)
    }
}

/// Named templates loaded from RON, shared by reference across all
/// instances of an entity type.
#[derive(Resource, Debug, Default)]
pub struct TemplateLibrary {
    templates: HashMap<String, Arc<DestructibleTemplate>>,
}

#[derive(Debug, Deserialize)]
struct TemplateLibraryFile {
    templates: HashMap<String, DestructibleTemplate>,
}

impl TemplateLibrary {
    pub fn from_ron_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading template library {}", path.display()))?;
        let file: TemplateLibraryFile = from_str(&raw)
            .with_context(|| format!("parsing template library {}", path.display()))?;
        let mut library = Self::default();
        for (name, template) in file.templates {
            library.insert(&name, template);
        }
        info!(templates = library.len(), path = %path.display(), "template library loaded");
        Ok(library)
    }

    /// Missing or malformed files fall back to the built-in library.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_ron_file(path) {
            Ok(library) => library,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "template library unavailable, using built-in defaults"
                );
                Self::default_library()
            }
        }
    }

    /// Built-in set covering the three destruction paths.
    pub fn default_library() -> Self {
        let mut library = Self::default();
        library.insert(
            "crate",
            DestructibleTemplate {
                reward: CoinReward::Range { min: 5, max: 15 },
                ..Default::default()
            },
        );
        library.insert(
            "vase",
            DestructibleTemplate {
                hits_to_destroy: 2,
                minimum_impact_force: 5.0,
                shatter_amount: 8,
                fragile: true,
                break_force_threshold: 40.0,
                reward: CoinReward::Fixed(10),
                ..Default::default()
            },
        );
        library.insert(
            "barrel",
            DestructibleTemplate {
                use_realistic_destruction: false,
                shatter_amount: 6,
                scale_force_with_impact: true,
                reward: CoinReward::Range { min: 10, max: 25 },
                ..Default::default()
            },
        );
        library
    }

    pub fn insert(&mut self, name: &str, template: DestructibleTemplate) {
        self.templates
            .insert(name.to_string(), Arc::new(template.validated()));
    }

    pub fn get(&self, name: &str) -> Option<Arc<DestructibleTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Unknown names degrade to the default template with a warning
    /// instead of failing the spawn.
    pub fn resolve(&self, name: &str) -> Arc<DestructibleTemplate> {
        match self.get(name) {
            Some(template) => template,
            None => {
                warn!(name, "unknown destructible template, using defaults");
                Arc::new(DestructibleTemplate::default())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
