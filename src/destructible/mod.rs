//! Per-object hit accumulation and the destroy state machine.
//!
//! Impacts arrive as [`ImpactEvent`]s from the physics bridge (or
//! directly from game code). Each destructible runs a small state
//! machine: debounce, force gate, hit count, then a terminal destroyed
//! state that picks exactly one destruction strategy and emits exactly
//! one reward. A second, stateless path ([`BreakOnImpact`]) breaks
//! material-tagged props on a single strong impact using the material
//! table's rules.

pub mod grab;
pub mod template;

pub use grab::{set_weight, GrabAction, GrabEvent, Grabbable, Held};
pub use template::{CoinReward, DestructibleTemplate, TemplateLibrary};

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::config::{DemolitionRng, DemolitionSettings};
use crate::constants::{
    DEFAULT_FRAGMENT_EXPLOSION_FORCE, FALLBACK_FRAGMENTS_MAX, FALLBACK_FRAGMENTS_MIN,
    FALLBACK_IMPULSE, FALLBACK_MASS, FALLBACK_SIZE_MAX, FALLBACK_SIZE_MIN, FALLBACK_TORQUE,
    HELD_FORCE_GATE_MULT, HIT_COOLDOWN_SECS, UPWARD_IMPULSE_BIAS,
};
use crate::economy::RewardEvent;
use crate::fragments::{
    random_in_unit_sphere, spawn_blueprint, spawn_fragments, FragmentBlueprint, FragmentSettings,
    FragmentSource,
};
use crate::materials::{MaterialRegistry, MaterialTag};
use crate::mesh::{Geometry, MeshData};
use crate::shatter::ShatterRequest;
use crate::DemolitionSet;

pub struct DestructiblePlugin;

impl Plugin for DestructiblePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ImpactEvent>()
            .add_event::<HitRegistered>()
            .add_event::<ObjectDestroyed>()
            .add_event::<GrabEvent>()
            .init_resource::<DemolitionSettings>()
            .init_resource::<TemplateLibrary>()
            .add_systems(Startup, load_template_library)
            .add_systems(
                Update,
                (
                    grab::apply_grab_events,
                    strip_conflicting_breakables,
                    register_impacts,
                    break_on_impact,
                )
                    .chain()
                    .in_set(DemolitionSet::Impacts),
            );
    }
}

fn load_template_library(mut commands: Commands, settings: Res<DemolitionSettings>) {
    commands.insert_resource(TemplateLibrary::load_or_default(
        &settings.template_library_path,
    ));
}

/// One physics contact, reduced to what the destruction engine needs.
#[derive(Event, Debug, Clone, Copy)]
pub struct ImpactEvent {
    pub target: Entity,
    pub force: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Emitted for every accepted hit, including the one that destroys.
#[derive(Event, Debug, Clone, Copy)]
pub struct HitRegistered {
    pub entity: Entity,
    pub hits: u32,
    pub remaining: u32,
}

/// Emitted exactly once per destroyed object.
#[derive(Event, Debug, Clone, Copy)]
pub struct ObjectDestroyed {
    pub entity: Entity,
    pub strategy: DestructionStrategy,
}

/// Which of the three destruction paths ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructionStrategy {
    Geometric,
    Spawner,
    Fallback,
}

/// Render-side flag: the entity still exists for bookkeeping but must
/// not be drawn. Colliders are disabled separately via the physics
/// components.
#[derive(Component, Debug, Default)]
pub struct HiddenVisual;

/// Outcome of feeding one impact into [`Destructible::register_hit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitResult {
    AlreadyDestroyed,
    Debounced,
    TooWeak,
    Registered { hits: u32 },
    Destroyed { hits: u32 },
}

/// Hit-accumulating destructible. The template is shared read-only
/// across all instances of the entity type.
#[derive(Component, Debug)]
pub struct Destructible {
    pub template: Arc<DestructibleTemplate>,
    hits: u32,
    last_hit: Option<f32>,
    destroyed: bool,
}

impl Destructible {
    pub fn new(template: Arc<DestructibleTemplate>) -> Self {
        Self {
            template,
            hits: 0,
            last_hit: None,
            destroyed: false,
        }
    }

    /// Convenience for one-off instances; library templates are already
    /// validated.
    pub fn from_template(template: DestructibleTemplate) -> Self {
        Self::new(Arc::new(template.validated()))
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn remaining_hits(&self) -> u32 {
        self.template.hits_to_destroy.saturating_sub(self.hits)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Repair hook: forget accumulated damage. Destroyed is terminal, so
    /// this does nothing once the object has broken.
    pub fn reset_hits(&mut self) {
        if !self.destroyed {
            self.hits = 0;
            self.last_hit = None;
        }
    }

    /// Feed one impact through the guards: terminal state, debounce
    /// window, force gate (doubled while held). Only accepted hits
    /// advance the count or the debounce clock.
    pub fn register_hit(&mut self, force: f32, now: f32, held: bool) -> HitResult {
        if self.destroyed {
            return HitResult::AlreadyDestroyed;
        }
        if let Some(last) = self.last_hit {
            if now - last < HIT_COOLDOWN_SECS {
                return HitResult::Debounced;
            }
        }
        let mut gate = self.template.minimum_impact_force;
        if held {
            gate *= HELD_FORCE_GATE_MULT;
        }
        if force < gate {
            return HitResult::TooWeak;
        }

        self.hits += 1;
        self.last_hit = Some(now);
        // A carried object never smashes outright, it only takes a hit
        let smashed =
            self.template.fragile && !held && force >= self.template.break_force_threshold;
        if self.hits >= self.template.hits_to_destroy || smashed {
            self.destroyed = true;
            return HitResult::Destroyed { hits: self.hits };
        }
        HitResult::Registered { hits: self.hits }
    }
}

/// Stateless companion to [`Destructible`]: breaks on the first impact
/// at or above the material strength (or an explicit override), with the
/// cut count taken from the material table.
#[derive(Component, Debug, Default)]
pub struct BreakOnImpact {
    /// Overrides the material strength threshold when set
    pub force_threshold: Option<f32>,
}

struct DestroyContext<'a> {
    entity: Entity,
    label: &'a str,
    template: &'a DestructibleTemplate,
    global: &'a GlobalTransform,
    geometry: Option<&'a Geometry>,
    mass: Option<&'a AdditionalMassProperties>,
    impact: ImpactEvent,
}

#[allow(clippy::too_many_arguments, clippy::type_complexity)]
fn register_impacts(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<DemolitionSettings>,
    fragment_settings: Res<FragmentSettings>,
    mut rng: ResMut<DemolitionRng>,
    mut impacts: EventReader<ImpactEvent>,
    mut targets: Query<(
        &mut Destructible,
        &GlobalTransform,
        Option<&Geometry>,
        Option<&Name>,
        Option<&AdditionalMassProperties>,
        Has<Held>,
    )>,
    mut hit_events: EventWriter<HitRegistered>,
    mut destroyed_events: EventWriter<ObjectDestroyed>,
    mut rewards: EventWriter<RewardEvent>,
    mut shatter: EventWriter<ShatterRequest>,
) {
    let now = time.elapsed_secs();
    for impact in impacts.read() {
        let Ok((mut destructible, global, geometry, name, mass, held)) =
            targets.get_mut(impact.target)
        else {
            continue;
        };
        let label = name.map(Name::as_str).unwrap_or("destructible");

        match destructible.register_hit(impact.force, now, held) {
            HitResult::AlreadyDestroyed => {
                trace!(target = %label, "impact on destroyed object ignored");
            }
            HitResult::Debounced => {
                trace!(target = %label, "impact inside cooldown window");
            }
            HitResult::TooWeak => {
                trace!(target = %label, force = impact.force, held, "impact below force gate");
            }
            HitResult::Registered { hits } => {
                let remaining = destructible.remaining_hits();
                debug!(target = %label, hits, remaining, "hit registered");
                hit_events.send(HitRegistered {
                    entity: impact.target,
                    hits,
                    remaining,
                });
            }
            HitResult::Destroyed { hits } => {
                hit_events.send(HitRegistered {
                    entity: impact.target,
                    hits,
                    remaining: 0,
                });
                let template = destructible.template.clone();
                destroy_object(
                    &mut commands,
                    &settings,
                    &fragment_settings,
                    &mut rng.0,
                    DestroyContext {
                        entity: impact.target,
                        label,
                        template: &template,
                        global,
                        geometry,
                        mass,
                        impact: *impact,
                    },
                    &mut destroyed_events,
                    &mut rewards,
                    &mut shatter,
                );
            }
        }
    }
}

/// Terminal transition: hide and freeze the object this tick, run
/// exactly one destruction strategy, pay exactly one reward, and
/// schedule the husk for removal together with its parented fragments.
#[allow(clippy::too_many_arguments)]
fn destroy_object(
    commands: &mut Commands,
    settings: &DemolitionSettings,
    fragment_settings: &FragmentSettings,
    rng: &mut Xoshiro256PlusPlus,
    ctx: DestroyContext,
    destroyed_events: &mut EventWriter<ObjectDestroyed>,
    rewards: &mut EventWriter<RewardEvent>,
    shatter: &mut EventWriter<ShatterRequest>,
) {
    let lifetime = ctx
        .template
        .fragment_lifetime
        .unwrap_or(settings.fragment_lifetime);

    // The object disappears this tick even though geometric splitting
    // may keep running for several more.
    commands.entity(ctx.entity).insert((
        HiddenVisual,
        ColliderDisabled,
        RigidBodyDisabled,
        crate::fragments::DespawnAfter::secs(lifetime),
    ));

    let has_mesh = ctx.geometry.map(|g| !g.0.is_empty()).unwrap_or(false);
    let cuts = ctx.template.effective_cuts(ctx.impact.force);
    let strategy =
        if ctx.template.use_realistic_destruction && has_mesh && settings.shatter_enabled {
            DestructionStrategy::Geometric
        } else if settings.spawner_enabled {
            DestructionStrategy::Spawner
        } else {
            DestructionStrategy::Fallback
        };

    match strategy {
        DestructionStrategy::Geometric => {
            shatter.send(ShatterRequest {
                target: ctx.entity,
                cuts,
                impact_point: ctx.impact.point,
                explosion_force: ctx.template.fragment_explosion_force,
                lifetime_secs: lifetime,
            });
        }
        DestructionStrategy::Spawner => {
            let source = FragmentSource {
                entity: ctx.entity,
                transform: ctx.global,
                mesh: ctx.geometry.map(|g| &g.0),
                mass: source_mass(ctx.mass),
                label: ctx.label,
            };
            spawn_fragments(
                commands,
                rng,
                fragment_settings,
                &source,
                cuts,
                ctx.template.fragment_explosion_force,
                ctx.impact.point,
                lifetime,
            );
        }
        DestructionStrategy::Fallback => {
            spawn_fallback_cubes(commands, rng, ctx.entity, ctx.label, ctx.global, lifetime);
        }
    }

    let amount = ctx.template.reward.roll(rng);
    rewards.send(RewardEvent {
        amount,
        source: ctx.entity,
    });
    destroyed_events.send(ObjectDestroyed {
        entity: ctx.entity,
        strategy,
    });
    info!(target = %ctx.label, ?strategy, cuts, reward = amount, "object destroyed");
}

fn source_mass(mass: Option<&AdditionalMassProperties>) -> f32 {
    match mass {
        Some(AdditionalMassProperties::Mass(m)) => *m,
        _ => 1.0,
    }
}

/// Last-resort destruction: a handful of small cubes with outward
/// impulses. Needs nothing from the source but a transform, so it
/// always succeeds.
pub fn spawn_fallback_cubes(
    commands: &mut Commands,
    rng: &mut impl Rng,
    source: Entity,
    label: &str,
    global: &GlobalTransform,
    lifetime_secs: f32,
) -> u32 {
    let count = rng.gen_range(FALLBACK_FRAGMENTS_MIN..=FALLBACK_FRAGMENTS_MAX);
    let center = global.translation();
    for i in 0..count {
        let half = rng.gen_range(FALLBACK_SIZE_MIN..FALLBACK_SIZE_MAX) * 0.5;
        let offset = random_in_unit_sphere(rng) * 0.5;
        let direction = (offset + Vec3::Y * UPWARD_IMPULSE_BIAS)
            .try_normalize()
            .unwrap_or(Vec3::Y);
        spawn_blueprint(
            commands,
            source,
            global,
            FragmentBlueprint {
                label: format!("{label}_rubble_{i}"),
                world_transform: Transform::from_translation(center + offset),
                mesh: MeshData::cuboid(Vec3::splat(half)),
                collider: Collider::cuboid(half, half, half),
                mass: FALLBACK_MASS,
                impulse: direction * FALLBACK_IMPULSE,
                torque: random_in_unit_sphere(rng) * FALLBACK_TORQUE,
                lifetime_secs,
            },
        );
    }
    debug!(target = %label, count, "fallback cubes spawned");
    count
}

#[allow(clippy::type_complexity)]
fn break_on_impact(
    mut commands: Commands,
    settings: Res<DemolitionSettings>,
    registry: Res<MaterialRegistry>,
    mut impacts: EventReader<ImpactEvent>,
    targets: Query<
        (
            &BreakOnImpact,
            &MaterialTag,
            Option<&Geometry>,
            Option<&Name>,
        ),
        Without<Destructible>,
    >,
    mut destroyed_events: EventWriter<ObjectDestroyed>,
    mut shatter: EventWriter<ShatterRequest>,
) {
    // Commands are deferred, so several impacts in one tick could break
    // the same entity twice without this.
    let mut handled: HashSet<Entity> = HashSet::new();
    for impact in impacts.read() {
        if handled.contains(&impact.target) {
            continue;
        }
        let Ok((breakable, tag, geometry, name)) = targets.get(impact.target) else {
            continue;
        };
        let label = name.map(Name::as_str).unwrap_or("breakable");

        if !registry.can_break(&tag.0) {
            trace!(target = %label, material = %tag.0, "material cannot shatter");
            continue;
        }
        let threshold = breakable
            .force_threshold
            .unwrap_or(registry.strength(&tag.0) as f32);
        if impact.force < threshold {
            trace!(target = %label, force = impact.force, threshold, "impact below break threshold");
            continue;
        }
        if geometry.map(|g| g.0.is_empty()).unwrap_or(true) {
            warn!(target = %label, "breakable has no geometry, skipping");
            continue;
        }
        if !settings.shatter_enabled {
            debug!(target = %label, "shatter scheduler disabled, breakable left intact");
            continue;
        }
        let cuts = registry.shatter_count(&tag.0, impact.force);
        if cuts == 0 {
            continue;
        }

        handled.insert(impact.target);
        commands
            .entity(impact.target)
            .insert((
                HiddenVisual,
                ColliderDisabled,
                RigidBodyDisabled,
                crate::fragments::DespawnAfter::secs(settings.fragment_lifetime),
            ))
            .remove::<BreakOnImpact>();
        shatter.send(ShatterRequest {
            target: impact.target,
            cuts,
            impact_point: impact.point,
            explosion_force: DEFAULT_FRAGMENT_EXPLOSION_FORCE,
            lifetime_secs: settings.fragment_lifetime,
        });
        destroyed_events.send(ObjectDestroyed {
            entity: impact.target,
            strategy: DestructionStrategy::Geometric,
        });
        info!(target = %label, material = %tag.0, cuts, "breakable shattered");
    }
}

/// An entity carrying both destruction paths would double-destroy; keep
/// the hit accumulator.
fn strip_conflicting_breakables(
    mut commands: Commands,
    conflicted: Query<(Entity, Option<&Name>), (With<Destructible>, With<BreakOnImpact>)>,
) {
    for (entity, name) in &conflicted {
        warn!(
            target = %name.map(Name::as_str).unwrap_or("entity"),
            "both hit-accumulating and break-on-impact destruction present, keeping the hit accumulator"
        );
        commands.entity(entity).remove::<BreakOnImpact>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::{DespawnAfter, Fragment};
    use std::time::Duration;

    fn template(hits: u32, min_force: f32) -> DestructibleTemplate {
        DestructibleTemplate {
            hits_to_destroy: hits,
            minimum_impact_force: min_force,
            ..Default::default()
        }
    }

    // ---- state machine ----

    #[test]
    fn test_hit_sequence_with_force_gate() {
        let mut d = Destructible::from_template(template(3, 10.0));
        let forces = [5.0, 15.0, 15.0, 15.0];
        let mut hit_counts = Vec::new();
        for (i, force) in forces.iter().enumerate() {
            d.register_hit(*force, i as f32 * 0.2, false);
            hit_counts.push(d.hits());
        }
        assert_eq!(hit_counts, vec![0, 1, 2, 3]);
        assert!(d.is_destroyed());
    }

    #[test]
    fn test_cooldown_debounces_rapid_hits() {
        let mut d = Destructible::from_template(template(3, 10.0));
        assert_eq!(
            d.register_hit(15.0, 0.20, false),
            HitResult::Registered { hits: 1 }
        );
        assert_eq!(d.register_hit(15.0, 0.25, false), HitResult::Debounced);
        assert_eq!(d.hits(), 1);
        assert_eq!(
            d.register_hit(15.0, 0.31, false),
            HitResult::Registered { hits: 2 }
        );
    }

    #[test]
    fn test_rejected_hits_do_not_reset_cooldown() {
        let mut d = Destructible::from_template(template(3, 10.0));
        d.register_hit(15.0, 0.0, false);
        // A too-weak impact must not extend the debounce window
        assert_eq!(d.register_hit(5.0, 0.15, false), HitResult::TooWeak);
        assert_eq!(
            d.register_hit(15.0, 0.15, false),
            HitResult::Registered { hits: 2 }
        );
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let mut d = Destructible::from_template(template(1, 10.0));
        assert_eq!(
            d.register_hit(15.0, 0.0, false),
            HitResult::Destroyed { hits: 1 }
        );
        assert_eq!(d.register_hit(50.0, 1.0, false), HitResult::AlreadyDestroyed);
        assert_eq!(d.hits(), 1);
    }

    #[test]
    fn test_held_doubles_force_gate() {
        let mut d = Destructible::from_template(template(3, 10.0));
        assert_eq!(d.register_hit(15.0, 0.0, true), HitResult::TooWeak);
        assert_eq!(
            d.register_hit(25.0, 0.2, true),
            HitResult::Registered { hits: 1 }
        );
    }

    #[test]
    fn test_fragile_breaks_on_single_strong_impact() {
        let mut d = Destructible::from_template(DestructibleTemplate {
            hits_to_destroy: 3,
            fragile: true,
            break_force_threshold: 100.0,
            ..Default::default()
        });
        assert_eq!(
            d.register_hit(150.0, 0.0, false),
            HitResult::Destroyed { hits: 1 }
        );
    }

    #[test]
    fn test_fragile_held_object_only_takes_a_hit() {
        let mut d = Destructible::from_template(DestructibleTemplate {
            hits_to_destroy: 3,
            fragile: true,
            break_force_threshold: 100.0,
            ..Default::default()
        });
        assert_eq!(
            d.register_hit(150.0, 0.0, true),
            HitResult::Registered { hits: 1 }
        );
        assert!(!d.is_destroyed());
    }

    #[test]
    fn test_fragile_below_break_threshold_accumulates() {
        let mut d = Destructible::from_template(DestructibleTemplate {
            hits_to_destroy: 3,
            fragile: true,
            break_force_threshold: 100.0,
            ..Default::default()
        });
        assert_eq!(
            d.register_hit(50.0, 0.0, false),
            HitResult::Registered { hits: 1 }
        );
    }

    #[test]
    fn test_reset_hits() {
        let mut d = Destructible::from_template(template(3, 10.0));
        d.register_hit(15.0, 0.0, false);
        d.register_hit(15.0, 0.2, false);
        assert_eq!(d.remaining_hits(), 1);
        d.reset_hits();
        assert_eq!(d.hits(), 0);
        assert_eq!(d.remaining_hits(), 3);
    }

    // ---- systems ----

    fn test_app(settings: DemolitionSettings) -> App {
        let mut app = App::new();
        app.insert_resource(Time::<()>::default())
            .insert_resource(DemolitionRng::from_settings(&settings))
            .insert_resource(settings)
            .init_resource::<FragmentSettings>()
            .insert_resource(MaterialRegistry::fallback())
            .add_event::<ImpactEvent>()
            .add_event::<HitRegistered>()
            .add_event::<ObjectDestroyed>()
            .add_event::<RewardEvent>()
            .add_event::<ShatterRequest>()
            .add_systems(
                Update,
                (strip_conflicting_breakables, register_impacts, break_on_impact).chain(),
            );
        app
    }

    fn send_impact(app: &mut App, target: Entity, force: f32) {
        app.world_mut().send_event(ImpactEvent {
            target,
            force,
            point: Vec3::new(0.3, 0.2, 0.0),
            normal: Vec3::X,
        });
    }

    fn advance(app: &mut App, secs: f32) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(secs));
    }

    fn drain_events<E: Event>(app: &mut App) -> Vec<E> {
        app.world_mut()
            .resource_mut::<Events<E>>()
            .drain()
            .collect()
    }

    fn fragment_count(app: &mut App) -> usize {
        app.world_mut()
            .query::<&Fragment>()
            .iter(app.world())
            .count()
    }

    fn spawn_destructible(app: &mut App, template: DestructibleTemplate) -> Entity {
        app.world_mut()
            .spawn((
                Name::new("crate"),
                Destructible::from_template(template),
                Geometry(MeshData::cuboid(Vec3::splat(0.5))),
                Transform::default(),
                GlobalTransform::default(),
                AdditionalMassProperties::Mass(10.0),
            ))
            .id()
    }

    #[test]
    fn test_spawner_path_destroys_exactly_once() {
        let mut app = test_app(DemolitionSettings::default());
        let target = spawn_destructible(
            &mut app,
            DestructibleTemplate {
                hits_to_destroy: 1,
                use_realistic_destruction: false,
                shatter_amount: 6,
                reward: CoinReward::Fixed(10),
                ..Default::default()
            },
        );

        send_impact(&mut app, target, 50.0);
        app.update();

        let rewards = drain_events::<RewardEvent>(&mut app);
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].amount, 10);
        let destroyed = drain_events::<ObjectDestroyed>(&mut app);
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].strategy, DestructionStrategy::Spawner);
        assert_eq!(fragment_count(&mut app), 6);

        let husk = app.world().entity(target);
        assert!(husk.contains::<HiddenVisual>());
        assert!(husk.contains::<ColliderDisabled>());
        assert!(husk.contains::<RigidBodyDisabled>());
        assert!(husk.contains::<DespawnAfter>());

        // Further impacts on the destroyed object are no-ops
        advance(&mut app, 0.5);
        send_impact(&mut app, target, 50.0);
        app.update();
        assert!(drain_events::<RewardEvent>(&mut app).is_empty());
        assert_eq!(fragment_count(&mut app), 6);
    }

    #[test]
    fn test_hit_counts_through_events() {
        let mut app = test_app(DemolitionSettings::default());
        let target = spawn_destructible(&mut app, template(3, 10.0));

        let mut observed = Vec::new();
        for force in [5.0, 15.0, 15.0, 15.0] {
            send_impact(&mut app, target, force);
            app.update();
            let d = app.world().entity(target).get::<Destructible>().unwrap();
            observed.push(d.hits());
            advance(&mut app, 0.2);
        }
        assert_eq!(observed, vec![0, 1, 2, 3]);
        assert_eq!(drain_events::<ObjectDestroyed>(&mut app).len(), 1);
    }

    #[test]
    fn test_geometric_path_requests_shatter() {
        let mut app = test_app(DemolitionSettings::default());
        let target = spawn_destructible(
            &mut app,
            DestructibleTemplate {
                hits_to_destroy: 1,
                ..Default::default()
            },
        );

        send_impact(&mut app, target, 50.0);
        app.update();

        let requests = drain_events::<ShatterRequest>(&mut app);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, target);
        assert_eq!(requests[0].cuts, 5);
        let destroyed = drain_events::<ObjectDestroyed>(&mut app);
        assert_eq!(destroyed[0].strategy, DestructionStrategy::Geometric);
        // Splitting happens in the scheduler, not here
        assert_eq!(fragment_count(&mut app), 0);
    }

    #[test]
    fn test_fallback_path_when_no_service_available() {
        let mut app = test_app(DemolitionSettings {
            shatter_enabled: false,
            spawner_enabled: false,
            ..Default::default()
        });
        let target = spawn_destructible(
            &mut app,
            DestructibleTemplate {
                hits_to_destroy: 1,
                ..Default::default()
            },
        );

        send_impact(&mut app, target, 50.0);
        app.update();

        let destroyed = drain_events::<ObjectDestroyed>(&mut app);
        assert_eq!(destroyed[0].strategy, DestructionStrategy::Fallback);
        let count = fragment_count(&mut app);
        assert!(
            (FALLBACK_FRAGMENTS_MIN as usize..=FALLBACK_FRAGMENTS_MAX as usize).contains(&count),
            "fallback spawned {count} cubes"
        );
    }

    #[test]
    fn test_spawner_runs_when_shatter_disabled() {
        let mut app = test_app(DemolitionSettings {
            shatter_enabled: false,
            ..Default::default()
        });
        let target = spawn_destructible(
            &mut app,
            DestructibleTemplate {
                hits_to_destroy: 1,
                shatter_amount: 4,
                ..Default::default()
            },
        );

        send_impact(&mut app, target, 50.0);
        app.update();

        let destroyed = drain_events::<ObjectDestroyed>(&mut app);
        assert_eq!(destroyed[0].strategy, DestructionStrategy::Spawner);
        assert_eq!(fragment_count(&mut app), 4);
    }

    #[test]
    fn test_break_on_impact_uses_material_rules() {
        let mut app = test_app(DemolitionSettings::default());
        let target = app
            .world_mut()
            .spawn((
                Name::new("window"),
                BreakOnImpact::default(),
                MaterialTag::new("GLASS"),
                Geometry(MeshData::cuboid(Vec3::splat(0.5))),
                Transform::default(),
                GlobalTransform::default(),
            ))
            .id();

        send_impact(&mut app, target, 15.0);
        app.update();

        let requests = drain_events::<ShatterRequest>(&mut app);
        assert_eq!(requests.len(), 1);
        // GLASS density 20 -> factor 8, times 15/10 force scaling
        assert_eq!(requests[0].cuts, 12);
        assert!(app.world().entity(target).contains::<HiddenVisual>());
        assert!(!app.world().entity(target).contains::<BreakOnImpact>());
    }

    #[test]
    fn test_break_on_impact_respects_material_strength() {
        let mut app = test_app(DemolitionSettings::default());
        let target = app
            .world_mut()
            .spawn((
                BreakOnImpact::default(),
                MaterialTag::new("CONCRETE"),
                Geometry(MeshData::cuboid(Vec3::splat(0.5))),
                Transform::default(),
                GlobalTransform::default(),
            ))
            .id();

        // CONCRETE strength is 50; a 20-force impact bounces off
        send_impact(&mut app, target, 20.0);
        app.update();
        assert!(drain_events::<ShatterRequest>(&mut app).is_empty());
        assert!(app.world().entity(target).contains::<BreakOnImpact>());
    }

    #[test]
    fn test_unbreakable_material_never_breaks() {
        let mut app = test_app(DemolitionSettings::default());
        let target = app
            .world_mut()
            .spawn((
                BreakOnImpact::default(),
                MaterialTag::new("BEDROCK"),
                Geometry(MeshData::cuboid(Vec3::splat(0.5))),
                Transform::default(),
                GlobalTransform::default(),
            ))
            .id();

        send_impact(&mut app, target, 500.0);
        app.update();
        assert!(drain_events::<ShatterRequest>(&mut app).is_empty());
        assert!(drain_events::<ObjectDestroyed>(&mut app).is_empty());
    }

    #[test]
    fn test_conflicting_paths_keep_hit_accumulator() {
        let mut app = test_app(DemolitionSettings::default());
        let target = app
            .world_mut()
            .spawn((
                Destructible::from_template(template(3, 10.0)),
                BreakOnImpact::default(),
                MaterialTag::new("GLASS"),
                Transform::default(),
                GlobalTransform::default(),
            ))
            .id();

        app.update();
        let entry = app.world().entity(target);
        assert!(entry.contains::<Destructible>());
        assert!(!entry.contains::<BreakOnImpact>());
    }

    #[test]
    fn test_held_gate_through_system() {
        let mut app = test_app(DemolitionSettings::default());
        let target = spawn_destructible(&mut app, template(3, 10.0));
        app.world_mut().entity_mut(target).insert(Held);

        send_impact(&mut app, target, 15.0);
        app.update();
        assert_eq!(
            app.world()
                .entity(target)
                .get::<Destructible>()
                .unwrap()
                .hits(),
            0
        );

        advance(&mut app, 0.2);
        send_impact(&mut app, target, 25.0);
        app.update();
        assert_eq!(
            app.world()
                .entity(target)
                .get::<Destructible>()
                .unwrap()
                .hits(),
            1
        );
    }
}
