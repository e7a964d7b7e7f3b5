use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use bevy_rapier3d::prelude::{
    AdditionalMassProperties, Collider, NoUserData, RapierPhysicsPlugin, RigidBody,
};
use std::time::Duration;

use wreckroom_core::config::DemolitionSettings;
use wreckroom_core::destructible::{Destructible, HiddenVisual, ImpactEvent, ObjectDestroyed, TemplateLibrary};
use wreckroom_core::economy::CoinWallet;
use wreckroom_core::fragments::Fragment;
use wreckroom_core::mesh::{Geometry, MeshData};
use wreckroom_core::DemolitionCorePlugin;

/// Headless demolition demo: three props take periodic hits of rising
/// force until everything is rubble, then the process exits with the
/// final wallet balance in the log.
fn main() {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / 60.0),
        )))
        .add_plugins(TransformPlugin)
        .add_plugins(HierarchyPlugin)
        // Headless physics, no debug rendering
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .insert_resource(DemolitionSettings::load_or_default("assets/settings.json"))
        .add_plugins(DemolitionCorePlugin)
        .init_resource::<DemoState>()
        // PostStartup so the template library is loaded first
        .add_systems(PostStartup, spawn_props)
        .add_systems(Update, (swing_wrecking_ball, report_destructions))
        .run();
}

#[derive(Resource)]
struct DemoState {
    swing: Timer,
    force: f32,
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            swing: Timer::from_seconds(0.6, TimerMode::Repeating),
            force: 8.0,
        }
    }
}

fn spawn_props(mut commands: Commands, library: Res<TemplateLibrary>) {
    commands.spawn((
        Name::new("ground"),
        RigidBody::Fixed,
        Collider::cuboid(20.0, 0.1, 20.0),
        Transform::from_xyz(0.0, -0.1, 0.0),
        GlobalTransform::default(),
    ));

    let mesh = MeshData::cuboid(Vec3::splat(0.5));
    for (i, kind) in ["crate", "vase", "barrel"].into_iter().enumerate() {
        commands.spawn((
            Name::new(kind),
            Destructible::new(library.resolve(kind)),
            Geometry(mesh.clone()),
            Transform::from_xyz(i as f32 * 2.0, 0.5, 0.0),
            GlobalTransform::default(),
            RigidBody::Dynamic,
            Collider::cuboid(0.5, 0.5, 0.5),
            AdditionalMassProperties::Mass(10.0),
        ));
    }
    info!("demo scene ready, three props on the floor");
}

fn swing_wrecking_ball(
    time: Res<Time>,
    mut state: ResMut<DemoState>,
    targets: Query<(Entity, &GlobalTransform), (With<Destructible>, Without<HiddenVisual>)>,
    debris: Query<(), With<Fragment>>,
    wallet: Res<CoinWallet>,
    mut impacts: EventWriter<ImpactEvent>,
    mut exit: EventWriter<AppExit>,
) {
    if !state.swing.tick(time.delta()).just_finished() {
        return;
    }
    let Some((target, global)) = targets.iter().next() else {
        if debris.is_empty() {
            info!(balance = wallet.balance(), "demolition complete");
            exit.send(AppExit::Success);
        }
        return;
    };

    state.force += 6.0;
    impacts.send(ImpactEvent {
        target,
        force: state.force,
        point: global.translation() + Vec3::new(0.4, 0.2, 0.0),
        normal: -Vec3::X,
    });
}

fn report_destructions(mut destroyed: EventReader<ObjectDestroyed>) {
    for event in destroyed.read() {
        info!(entity = ?event.entity, strategy = ?event.strategy, "prop destroyed");
    }
}
