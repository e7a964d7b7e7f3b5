//! Wreckroom Demolition Core
//!
//! Headless procedural-destruction engine for physics sandboxes:
//! - Material rules (breakability, strength, density) loaded from JSON
//! - Plane-clipping mesh splitter producing two watertight halves per cut
//! - Recursive shatter scheduler stepped a few cuts per tick
//! - Primitive fragment spawner with explosion impulses
//! - Per-object hit state machine with force gating and debounce
//! - Coin rewards wired into a wallet
//!
//! Rendering and physics stepping stay outside: the engine consumes
//! impact events and produces entities with rapier bodies and impulses.

pub mod config;
pub mod constants;
pub mod destructible;
pub mod economy;
pub mod fragments;
pub mod logging;
pub mod materials;
pub mod mesh;
pub mod physics;
pub mod shatter;

use bevy::prelude::*;

use crate::config::{DemolitionRng, DemolitionSettings};

/// Pipeline order of the demolition systems within [`Update`]: contacts
/// are relayed, hits registered and strategies dispatched, the shatter
/// queue stepped, fragments spawned and aged, rewards credited.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemolitionSet {
    Bridge,
    Impacts,
    Shatter,
    Fragments,
    Economy,
}

/// The whole destruction engine in pipeline order. Settings inserted
/// before this plugin are respected; otherwise defaults apply.
pub struct DemolitionCorePlugin;

impl Plugin for DemolitionCorePlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<DemolitionSettings>()
            .cloned()
            .unwrap_or_default();
        app.insert_resource(DemolitionRng::from_settings(&settings))
            .insert_resource(settings)
            .configure_sets(
                Update,
                (
                    DemolitionSet::Bridge,
                    DemolitionSet::Impacts,
                    DemolitionSet::Shatter,
                    DemolitionSet::Fragments,
                    DemolitionSet::Economy,
                )
                    .chain(),
            )
            .add_plugins((
                logging::LoggingPlugin,
                materials::MaterialsPlugin,
                physics::PhysicsBridgePlugin,
                destructible::DestructiblePlugin,
                shatter::ShatterPlugin,
                fragments::FragmentsPlugin,
                economy::EconomyPlugin,
            ));
    }
}
