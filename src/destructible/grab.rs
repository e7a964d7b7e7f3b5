//! Grab/release interaction state.
//!
//! [`Held`] is an independent flag layered over the destroy state
//! machine: the hit gate doubles while it is present and reward
//! announcements stay quiet. Grabbing also swaps in heavier damping;
//! release restores the baseline stored on the [`Grabbable`].

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use tracing::debug;

use crate::constants::{HELD_ANGULAR_DAMPING, HELD_LINEAR_DAMPING};

/// Marks an object currently carried by the player.
#[derive(Component, Debug, Default)]
pub struct Held;

/// A prop the interaction layer may pick up. Remembers its resting
/// damping so release can restore it exactly.
#[derive(Component, Debug, Clone, Default)]
pub struct Grabbable {
    pub rest_damping: Damping,
}

impl Grabbable {
    pub fn with_rest_damping(linear: f32, angular: f32) -> Self {
        Self {
            rest_damping: Damping {
                linear_damping: linear,
                angular_damping: angular,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabAction {
    Grabbed,
    Released,
}

/// Sent by the interaction layer when the player picks up or drops a
/// prop.
#[derive(Event, Debug, Clone, Copy)]
pub struct GrabEvent {
    pub target: Entity,
    pub action: GrabAction,
}

/// Adjusts a prop's mass through the physics components. Negative
/// weights are floored at zero.
pub fn set_weight(commands: &mut Commands, target: Entity, weight: f32) {
    commands
        .entity(target)
        .insert(AdditionalMassProperties::Mass(weight.max(0.0)));
}

pub(super) fn apply_grab_events(
    mut commands: Commands,
    mut events: EventReader<GrabEvent>,
    mut grabbables: Query<(&Grabbable, Option<&mut Damping>, Option<&Name>)>,
) {
    for event in events.read() {
        let Ok((grabbable, damping, name)) = grabbables.get_mut(event.target) else {
            continue;
        };
        let label = name.map(Name::as_str).unwrap_or("prop");
        match event.action {
            GrabAction::Grabbed => {
                commands.entity(event.target).insert(Held);
                let held_damping = Damping {
                    linear_damping: HELD_LINEAR_DAMPING,
                    angular_damping: HELD_ANGULAR_DAMPING,
                };
                match damping {
                    Some(mut damping) => *damping = held_damping,
                    None => {
                        commands.entity(event.target).insert(held_damping);
                    }
                }
                debug!(target = %label, "grabbed");
            }
            GrabAction::Released => {
                commands.entity(event.target).remove::<Held>();
                match damping {
                    Some(mut damping) => *damping = grabbable.rest_damping,
                    None => {
                        commands.entity(event.target).insert(grabbable.rest_damping);
                    }
                }
                debug!(target = %label, "released, damping restored");
            }
        }
    }
}
