//! Recursive mesh shatter, stepped as an explicit task queue.
//!
//! A [`ShatterRequest`] with cut budget N becomes one [`ShatterJob`]: the
//! initial cut splits the source mesh in two, then each half runs as its
//! own branch with a budget of N/2 cuts. Branches own disjoint piece
//! lists, so they never contend. The queue performs at most
//! `cuts_per_tick` slice attempts per update and carries the rest over,
//! so a large budget never stalls a frame. Cut planes come from a
//! per-entity seeded stream; geometry is random but piece counts and cut
//! totals reproduce for a fixed seed.
//!
//! Total cuts per request never exceed N: a piece cut with budget b
//! leaves (b - 1) / 2 to each half, and a branch also stops early once
//! its piece count reaches its budget.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

use crate::config::DemolitionSettings;
use crate::constants::{DEFAULT_ROTATION_STRENGTH, MIN_SHATTER_PIECE_SIZE};
use crate::fragments::{explosion_impulse, random_in_unit_sphere, spawn_blueprint, FragmentBlueprint};
use crate::mesh::slicer::{slice, CutPlane};
use crate::mesh::{Geometry, MeshData};
use crate::DemolitionSet;

/// Salt distinguishing cut-plane streams from other per-entity streams.
const SHATTER_RNG_LANE: u64 = 0x51;

pub struct ShatterPlugin;

impl Plugin for ShatterPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ShatterRequest>()
            .init_resource::<ShatterQueue>()
            .add_systems(
                Update,
                (begin_shatter_jobs, step_shatter_queue)
                    .chain()
                    .in_set(DemolitionSet::Shatter),
            );
    }
}

/// Ask the scheduler to carve `target` into debris with at most `cuts`
/// binary splits.
#[derive(Event, Debug, Clone)]
pub struct ShatterRequest {
    pub target: Entity,
    pub cuts: u32,
    pub impact_point: Vec3,
    pub explosion_force: f32,
    pub lifetime_secs: f32,
}

/// Piece waiting in a job's work list. `budget` is the cut allowance for
/// the subtree rooted at this piece; `branch` is None only for the root.
#[derive(Debug)]
struct PendingPiece {
    mesh: MeshData,
    budget: u32,
    branch: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct BranchStats {
    budget: u32,
    cuts_done: u32,
    pieces: u32,
}

impl BranchStats {
    /// A branch stops cutting once its cut budget is spent or it already
    /// holds as many pieces as its budget allows.
    fn exhausted(&self) -> bool {
        self.cuts_done >= self.budget || self.pieces >= self.budget.max(1)
    }
}

/// One in-flight shatter request.
#[derive(Debug)]
pub struct ShatterJob {
    source: Entity,
    label: String,
    origin: GlobalTransform,
    source_mass: f32,
    source_volume: f32,
    impact_point: Vec3,
    explosion_force: f32,
    lifetime_secs: f32,
    cuts_done: u32,
    branches: [BranchStats; 2],
    work: VecDeque<PendingPiece>,
    rng: Xoshiro256PlusPlus,
    spawned: u32,
}

/// Pending shatter work, drained a few cuts per tick.
#[derive(Resource, Default)]
pub struct ShatterQueue {
    jobs: Vec<ShatterJob>,
    /// Cuts performed across all completed and in-flight jobs
    pub total_cuts: u64,
}

impl ShatterQueue {
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }
}

fn begin_shatter_jobs(
    mut requests: EventReader<ShatterRequest>,
    mut queue: ResMut<ShatterQueue>,
    settings: Res<DemolitionSettings>,
    sources: Query<(
        &Geometry,
        &GlobalTransform,
        Option<&Name>,
        Option<&AdditionalMassProperties>,
    )>,
) {
    for request in requests.read() {
        if request.cuts == 0 {
            debug!(target = ?request.target, "shatter request with zero budget ignored");
            continue;
        }
        let Ok((geometry, origin, name, mass)) = sources.get(request.target) else {
            warn!(
                target = ?request.target,
                "shatter request skipped: target has no geometry"
            );
            continue;
        };
        if geometry.0.is_empty() || !geometry.0.is_valid() {
            warn!(
                target = ?request.target,
                "shatter request skipped: target geometry is empty or malformed"
            );
            continue;
        }

        let label = name
            .map(|n| n.as_str().to_owned())
            .unwrap_or_else(|| "debris".to_owned());
        let source_mass = match mass {
            Some(AdditionalMassProperties::Mass(m)) => *m,
            _ => 1.0,
        };
        let mut work = VecDeque::with_capacity(2);
        work.push_back(PendingPiece {
            mesh: geometry.0.clone(),
            budget: request.cuts,
            branch: None,
        });
        debug!(
            source = %label,
            cuts = request.cuts,
            "shatter job queued"
        );
        queue.jobs.push(ShatterJob {
            source: request.target,
            label,
            origin: *origin,
            source_mass,
            source_volume: geometry.0.signed_volume().abs().max(f32::EPSILON),
            impact_point: request.impact_point,
            explosion_force: request.explosion_force,
            lifetime_secs: request.lifetime_secs,
            cuts_done: 0,
            branches: [BranchStats::default(); 2],
            work,
            rng: settings.entity_stream(request.target, SHATTER_RNG_LANE),
            spawned: 0,
        });
    }
}

/// Drain the queue, performing at most `cuts_per_tick` slice attempts
/// before yielding to the next update. Finished pieces spawn immediately;
/// everything else carries over.
fn step_shatter_queue(
    mut commands: Commands,
    mut queue: ResMut<ShatterQueue>,
    settings: Res<DemolitionSettings>,
    alive: Query<Entity>,
) {
    if queue.jobs.is_empty() {
        return;
    }
    let mut attempts_left = settings.cuts_per_tick.max(1);

    let queue = &mut *queue;
    for job in &mut queue.jobs {
        if !alive.contains(job.source) {
            // Source despawned mid-split: the job stops without spawning
            // anything further.
            debug!(source = %job.label, "shatter source gone, dropping job");
            job.work.clear();
            continue;
        }

        loop {
            let Some(piece) = job.work.pop_front() else {
                break;
            };

            let branch_exhausted = piece
                .branch
                .map(|b| job.branches[b].exhausted())
                .unwrap_or(false);
            if piece.budget == 0
                || branch_exhausted
                || piece.mesh.mean_bound_size() < MIN_SHATTER_PIECE_SIZE
            {
                spawn_shatter_piece(&mut commands, job, piece.mesh);
                continue;
            }

            if attempts_left == 0 {
                job.work.push_front(piece);
                break;
            }
            attempts_left -= 1;

            let plane = CutPlane::random_through(
                piece.mesh.bounds_center(),
                piece.mesh.half_extents(),
                &mut job.rng,
            );
            match slice(&piece.mesh, &plane) {
                Some((front, back)) => {
                    job.cuts_done += 1;
                    queue.total_cuts += 1;
                    let child_budget = (piece.budget - 1) / 2;
                    match piece.branch {
                        None => {
                            // Initial cut: the halves become the two
                            // concurrent branches, each with its own
                            // budget and piece list.
                            for (i, mesh) in [front, back].into_iter().enumerate() {
                                job.branches[i] = BranchStats {
                                    budget: child_budget,
                                    cuts_done: 0,
                                    pieces: 1,
                                };
                                job.work.push_back(PendingPiece {
                                    mesh,
                                    budget: child_budget,
                                    branch: Some(i),
                                });
                            }
                        }
                        Some(b) => {
                            job.branches[b].cuts_done += 1;
                            job.branches[b].pieces += 1;
                            for mesh in [front, back] {
                                job.work.push_back(PendingPiece {
                                    mesh,
                                    budget: child_budget,
                                    branch: Some(b),
                                });
                            }
                        }
                    }
                    trace!(
                        source = %job.label,
                        cuts_done = job.cuts_done,
                        pending = job.work.len(),
                        "cut applied"
                    );
                }
                None => {
                    // Degenerate plane missed the piece; retry with the
                    // reduced budget so this cannot loop forever.
                    trace!(source = %job.label, "cut plane missed, requeueing piece");
                    job.work.push_back(PendingPiece {
                        mesh: piece.mesh,
                        budget: piece.budget - 1,
                        branch: piece.branch,
                    });
                }
            }
        }

        if job.work.is_empty() {
            info!(
                source = %job.label,
                fragments = job.spawned,
                cuts = job.cuts_done,
                "shatter complete"
            );
        }
        if attempts_left == 0 {
            break;
        }
    }

    queue.jobs.retain(|job| !job.work.is_empty());
}

/// Turn a finished piece into a debris entity at its own centroid, with
/// mass proportional to its share of the source volume.
fn spawn_shatter_piece(commands: &mut Commands, job: &mut ShatterJob, mesh: MeshData) {
    if mesh.is_empty() {
        return;
    }
    let centroid = mesh.centroid();
    let mut recentered = mesh;
    for p in &mut recentered.positions {
        *p -= centroid;
    }
    let collider = match Collider::convex_hull(&recentered.positions) {
        Some(collider) => collider,
        None => {
            let half = recentered.half_extents().max(Vec3::splat(1e-3));
            Collider::cuboid(half.x, half.y, half.z)
        }
    };

    let world_pos = job.origin.transform_point(centroid);
    let volume_share = (recentered.signed_volume().abs() / job.source_volume).clamp(0.0, 1.0);
    let mass = (job.source_mass * volume_share).max(0.001);
    let impulse = explosion_impulse(
        world_pos,
        job.impact_point,
        job.origin.translation(),
        job.explosion_force,
    );
    let torque = random_in_unit_sphere(&mut job.rng) * DEFAULT_ROTATION_STRENGTH;

    spawn_blueprint(
        commands,
        job.source,
        &job.origin,
        FragmentBlueprint {
            label: format!("{}_shard_{}", job.label, job.spawned),
            world_transform: Transform::from_translation(world_pos)
                .with_rotation(job.origin.rotation()),
            mesh: recentered,
            collider,
            mass,
            impulse,
            torque,
            lifetime_secs: job.lifetime_secs,
        },
    );
    job.spawned += 1;
}
