//! Debris fragments: spawning, transient parenting and timed cleanup.
//!
//! Both destruction strategies funnel through [`spawn_blueprint`]: the
//! fragment is spawned as a child of its source for hierarchy
//! bookkeeping, then detached to world space on the next command flush,
//! before the physics step consumes the spawn-time impulse, with its
//! world position and rotation preserved exactly. Every fragment is
//! removed unconditionally when its lifetime ends.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_FRAGMENT_MASS_MULT, DEFAULT_FRAGMENT_SIZE_MULT, DEFAULT_FRAGMENT_SPREAD,
    DEFAULT_ROTATION_STRENGTH, FRAGMENT_FADE_SECS, UPWARD_IMPULSE_BIAS,
};
use crate::mesh::{Geometry, MeshData};
use crate::DemolitionSet;

pub struct FragmentsPlugin;

impl Plugin for FragmentsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FragmentSettings>().add_systems(
            Update,
            (
                detach_spawned_fragments,
                tick_fragment_lifetimes,
                tick_despawn_after,
            )
                .chain()
                .in_set(DemolitionSet::Fragments),
        );
    }
}

/// A transient debris piece. Despawns when `lifetime` finishes,
/// independent of any further collisions.
#[derive(Component, Debug)]
pub struct Fragment {
    pub source: Entity,
    pub lifetime: Timer,
}

impl Fragment {
    pub fn new(source: Entity, lifetime_secs: f32) -> Self {
        Self {
            source,
            lifetime: Timer::from_seconds(lifetime_secs.max(0.0), TimerMode::Once),
        }
    }

    /// 1.0 for most of the fragment's life, fading linearly to 0.0 over
    /// the final fade window. Clients apply this to their render alpha.
    pub fn fade_alpha(&self) -> f32 {
        let remaining = self.lifetime.remaining_secs();
        if remaining >= FRAGMENT_FADE_SECS {
            1.0
        } else {
            (remaining / FRAGMENT_FADE_SECS).max(0.0)
        }
    }
}

/// Despawns the entity (and any children still attached) once the timer
/// finishes. Placed on destroyed sources so stragglers are cleaned up
/// together.
#[derive(Component, Debug)]
pub struct DespawnAfter(pub Timer);

impl DespawnAfter {
    pub fn secs(secs: f32) -> Self {
        Self(Timer::from_seconds(secs.max(0.0), TimerMode::Once))
    }
}

/// Marks a freshly spawned fragment still parented to its source; the
/// detach system moves it to world space using the transform recorded at
/// spawn time.
#[derive(Component, Debug)]
pub struct DetachToWorld(pub Transform);

/// Spawner tuning shared by all primitive-fragment destructions.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct FragmentSettings {
    /// Fragment size relative to the source's mean bound size
    pub size_multiplier: f32,
    /// Same size for every fragment; otherwise scaled by count^(-1/3)
    /// to conserve apparent total volume
    pub uniform_size: bool,
    /// Primitive cubes instead of scaled source-mesh copies
    pub use_primitives: bool,
    /// Spawn offset range as a fraction of the source half-extents
    pub spread_radius: f32,
    /// Fragment mass as a fraction of the source mass
    pub mass_multiplier: f32,
    /// Apply a random torque impulse on spawn
    pub random_rotation: bool,
    pub rotation_strength: f32,
}

impl Default for FragmentSettings {
    fn default() -> Self {
        Self {
            size_multiplier: DEFAULT_FRAGMENT_SIZE_MULT,
            uniform_size: true,
            use_primitives: true,
            spread_radius: DEFAULT_FRAGMENT_SPREAD,
            mass_multiplier: DEFAULT_FRAGMENT_MASS_MULT,
            random_rotation: true,
            rotation_strength: DEFAULT_ROTATION_STRENGTH,
        }
    }
}

impl FragmentSettings {
    /// Clamped setters mirror the authoring ranges; out-of-range values
    /// are pulled back instead of rejected.
    pub fn set_size_multiplier(&mut self, value: f32) {
        self.size_multiplier = value.clamp(0.05, 2.0);
    }

    pub fn set_spread_radius(&mut self, value: f32) {
        self.spread_radius = value.clamp(0.1, 5.0);
    }

    pub fn set_mass_multiplier(&mut self, value: f32) {
        self.mass_multiplier = value.clamp(0.01, 1.0);
    }

    /// Sane fragment-count range for authored configs.
    pub fn clamp_count(count: u32) -> u32 {
        count.clamp(1, 50)
    }
}

/// View of the entity being destroyed, assembled by the caller from its
/// components.
pub struct FragmentSource<'a> {
    pub entity: Entity,
    pub transform: &'a GlobalTransform,
    pub mesh: Option<&'a MeshData>,
    pub mass: f32,
    pub label: &'a str,
}

/// Everything needed to materialize one fragment entity.
pub struct FragmentBlueprint {
    pub label: String,
    pub world_transform: Transform,
    pub mesh: MeshData,
    pub collider: Collider,
    pub mass: f32,
    pub impulse: Vec3,
    pub torque: Vec3,
    pub lifetime_secs: f32,
}

/// Spawn one fragment: child of `source` with the equivalent local
/// transform, queued for detach back to the recorded world transform.
pub fn spawn_blueprint(
    commands: &mut Commands,
    source: Entity,
    source_global: &GlobalTransform,
    blueprint: FragmentBlueprint,
) -> Entity {
    let local = GlobalTransform::from(blueprint.world_transform).reparented_to(source_global);
    let id = commands
        .spawn((
            Name::new(blueprint.label),
            Fragment::new(source, blueprint.lifetime_secs),
            Geometry(blueprint.mesh),
            local,
            GlobalTransform::default(),
            RigidBody::Dynamic,
            blueprint.collider,
            AdditionalMassProperties::Mass(blueprint.mass),
            ExternalImpulse {
                impulse: blueprint.impulse,
                torque_impulse: blueprint.torque,
            },
            Velocity::zero(),
            DetachToWorld(blueprint.world_transform),
        ))
        .id();
    commands.entity(id).set_parent(source);
    id
}

/// Spawn `count` primitive or mesh-copy fragments for a destroyed
/// source. Returns the spawned entities: exactly `count` of them, or
/// none at all when the source has no geometry to derive bounds from.
#[allow(clippy::too_many_arguments)]
pub fn spawn_fragments(
    commands: &mut Commands,
    rng: &mut impl Rng,
    settings: &FragmentSettings,
    source: &FragmentSource,
    count: u32,
    explosion_force: f32,
    explosion_center: Vec3,
    lifetime_secs: f32,
) -> Vec<Entity> {
    let Some(mesh) = source.mesh else {
        warn!(source = %source.label, "fragment spawn skipped: source has no geometry");
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let base_size = mesh.mean_bound_size() * settings.size_multiplier;
    let scale = if settings.uniform_size {
        base_size
    } else {
        base_size * (count as f32).powf(-1.0 / 3.0)
    };
    let center = source.transform.translation();
    let spread = mesh.half_extents() * settings.spread_radius;
    let mass = (source.mass * settings.mass_multiplier).max(0.001);

    let mut spawned = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = Vec3::new(
            rng.gen_range(-1.0f32..=1.0) * spread.x,
            rng.gen_range(-1.0f32..=1.0) * spread.y,
            rng.gen_range(-1.0f32..=1.0) * spread.z,
        );
        let position = center + offset;

        let (piece, collider) = if settings.use_primitives {
            let half = Vec3::splat(scale * 0.5);
            (
                MeshData::cuboid(half),
                Collider::cuboid(half.x, half.y, half.z),
            )
        } else {
            scaled_mesh_copy(mesh, scale)
        };

        let impulse = explosion_impulse(position, explosion_center, center, explosion_force);
        let torque = if settings.random_rotation {
            random_in_unit_sphere(rng) * settings.rotation_strength
        } else {
            Vec3::ZERO
        };

        spawned.push(spawn_blueprint(
            commands,
            source.entity,
            source.transform,
            FragmentBlueprint {
                label: format!("{}_fragment_{}", source.label, i),
                world_transform: Transform::from_translation(position),
                mesh: piece,
                collider,
                mass,
                impulse,
                torque,
                lifetime_secs,
            },
        ));
    }

    debug!(
        source = %source.label,
        count,
        scale,
        "spawned primitive fragments"
    );
    spawned
}

/// Copy of the source mesh rescaled so its mean bound size equals
/// `target_size`, with a convex-hull collider (cuboid when the hull is
/// degenerate).
fn scaled_mesh_copy(mesh: &MeshData, target_size: f32) -> (MeshData, Collider) {
    let current = mesh.mean_bound_size().max(f32::EPSILON);
    let factor = target_size / current;
    let center = mesh.bounds_center();
    let mut copy = mesh.clone();
    for p in &mut copy.positions {
        *p = (*p - center) * factor;
    }
    let collider = Collider::convex_hull(&copy.positions)
        .unwrap_or_else(|| {
            let half = copy.half_extents().max(Vec3::splat(1e-3));
            Collider::cuboid(half.x, half.y, half.z)
        });
    (copy, collider)
}

/// Outward impulse: away from the explosion center and the object
/// center, with a small upward bias.
pub fn explosion_impulse(
    fragment_pos: Vec3,
    explosion_center: Vec3,
    object_center: Vec3,
    force: f32,
) -> Vec3 {
    let from_explosion = (fragment_pos - explosion_center)
        .try_normalize()
        .unwrap_or(Vec3::Y);
    let from_object = (fragment_pos - object_center)
        .try_normalize()
        .unwrap_or(Vec3::Y);
    let direction = (from_explosion + from_object + Vec3::Y * UPWARD_IMPULSE_BIAS)
        .try_normalize()
        .unwrap_or(Vec3::Y);
    direction * force
}

pub(crate) fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}

// =====================================================
// Systems
// =====================================================

fn detach_spawned_fragments(mut commands: Commands, pending: Query<(Entity, &DetachToWorld)>) {
    for (entity, detach) in &pending {
        commands
            .entity(entity)
            .remove_parent()
            .insert(detach.0)
            .remove::<DetachToWorld>();
    }
}

fn tick_fragment_lifetimes(
    mut commands: Commands,
    time: Res<Time>,
    mut fragments: Query<(Entity, &mut Fragment)>,
) {
    for (entity, mut fragment) in &mut fragments {
        if fragment.lifetime.tick(time.delta()).finished() {
            commands.entity(entity).despawn();
        }
    }
}

fn tick_despawn_after(
    mut commands: Commands,
    time: Res<Time>,
    mut pending: Query<(Entity, &mut DespawnAfter)>,
) {
    for (entity, mut despawn) in &mut pending {
        if despawn.0.tick(time.delta()).finished() {
            commands.entity(entity).despawn_recursive();
        }
    }
}
