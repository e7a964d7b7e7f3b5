//! Bridge from the rigid-body engine's contact reports to the
//! destruction engine's [`ImpactEvent`] contract.
//!
//! The destruction systems never read rapier events directly; game code
//! without a physics simulation (and every test) can send `ImpactEvent`s
//! itself.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use tracing::trace;

use crate::destructible::{BreakOnImpact, Destructible, ImpactEvent};
use crate::DemolitionSet;

pub struct PhysicsBridgePlugin;

impl Plugin for PhysicsBridgePlugin {
    fn build(&self, app: &mut App) {
        // Registered by the rapier plugin too; guard for headless setups
        app.add_event::<ContactForceEvent>().add_systems(
            Update,
            relay_contact_forces.in_set(DemolitionSet::Bridge),
        );
    }
}

/// Forward each contact-force report to any destructible endpoint.
/// Contact reports carry no exact contact point, so the target's
/// translation stands in; the strategies only use the point as an
/// explosion center.
fn relay_contact_forces(
    mut contacts: EventReader<ContactForceEvent>,
    targets: Query<&GlobalTransform, Or<(With<Destructible>, With<BreakOnImpact>)>>,
    mut impacts: EventWriter<ImpactEvent>,
) {
    for contact in contacts.read() {
        for target in [contact.collider1, contact.collider2] {
            let Ok(global) = targets.get(target) else {
                continue;
            };
            impacts.send(ImpactEvent {
                target,
                force: contact.total_force_magnitude,
                point: global.translation(),
                normal: contact.max_force_direction,
            });
            trace!(
                ?target,
                force = contact.total_force_magnitude,
                "contact relayed"
            );
        }
    }
}
