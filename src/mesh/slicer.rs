//! Plane split of a triangle mesh into two watertight halves.
//!
//! Straddling triangles are clipped for real: new vertices are inserted
//! where edges cross the plane (positions, normals and UVs interpolated)
//! and each side's 3-4 vertex polygon is re-triangulated as a fan. The
//! cut cross-section is closed with a centroid fan over the intersection
//! loop, which is exact for convex cross-sections. Inputs are never
//! mutated; both halves are freshly allocated.

use bevy::prelude::*;
use rand::Rng;
use tracing::warn;

use super::MeshData;
use crate::constants::{AXIS_BIAS_VARIATION, PLANE_EPSILON, PLANE_OFFSET_FACTOR};

/// Point + unit normal defining a half-space split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPlane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl CutPlane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal: normal.try_normalize().unwrap_or(Vec3::Y),
        }
    }

    /// Plane constant: `normal . x == offset` for points on the plane.
    pub fn offset(&self) -> f32 {
        self.normal.dot(self.point)
    }

    /// Signed distance of `v` from the plane, positive on the normal side.
    pub fn distance(&self, v: Vec3) -> f32 {
        self.normal.dot(v) - self.offset()
    }

    /// Sample a cut plane for a fragment with the given local bounds:
    /// a point near the bounds center (never a vertex) and a direction
    /// biased near one of the three principal axes. Keeps successive
    /// fragments comparable in size instead of producing slivers.
    pub fn random_through(center: Vec3, half_extents: Vec3, rng: &mut impl Rng) -> Self {
        let offset = Vec3::new(
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
        ) * half_extents
            * PLANE_OFFSET_FACTOR;

        let axis = rng.gen_range(0..3usize);
        let mut normal = Vec3::ZERO;
        normal[axis] = 1.0;
        normal.x += rng.gen_range(-AXIS_BIAS_VARIATION..=AXIS_BIAS_VARIATION);
        normal.y += rng.gen_range(-AXIS_BIAS_VARIATION..=AXIS_BIAS_VARIATION);
        normal.z += rng.gen_range(-AXIS_BIAS_VARIATION..=AXIS_BIAS_VARIATION);

        Self::new(center + offset, normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Coplanar,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy)]
struct ClipVert {
    pos: Vec3,
    normal: Vec3,
    uv: Vec2,
}

impl ClipVert {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            pos: a.pos.lerp(b.pos, t),
            normal: a.normal.lerp(b.normal, t).try_normalize().unwrap_or(a.normal),
            uv: a.uv.lerp(b.uv, t),
        }
    }
}

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn push(&mut self, v: ClipVert) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(v.pos);
        self.normals.push(v.normal);
        self.uvs.push(v.uv);
        index
    }

    fn push_triangle(&mut self, a: ClipVert, b: ClipVert, c: ClipVert) {
        let ia = self.push(a);
        let ib = self.push(b);
        let ic = self.push(c);
        self.indices.extend_from_slice(&[ia, ib, ic]);
    }

    /// Fan-triangulate a convex polygon in winding order.
    fn push_polygon(&mut self, poly: &[ClipVert]) {
        for i in 1..poly.len().saturating_sub(1) {
            self.push_triangle(poly[0], poly[i], poly[i + 1]);
        }
    }

    fn finish(self) -> MeshData {
        MeshData::new(self.positions, self.normals, self.uvs, self.indices)
    }
}

/// Split `mesh` at `plane` into (front, back) halves, front being the
/// side the plane normal points into. Returns `None` when the input
/// carries no usable geometry or when the plane misses the mesh entirely
/// (one half would be empty).
pub fn slice(mesh: &MeshData, plane: &CutPlane) -> Option<(MeshData, MeshData)> {
    if mesh.is_empty() {
        warn!("slice requested on empty mesh");
        return None;
    }
    if !mesh.is_valid() {
        warn!(
            vertices = mesh.vertex_count(),
            indices = mesh.indices.len(),
            "slice requested on malformed mesh buffers"
        );
        return None;
    }

    let offset = plane.offset();
    let mut front = MeshBuilder::default();
    let mut back = MeshBuilder::default();
    let mut cap_points: Vec<Vec3> = Vec::new();

    let vert = |i: u32| ClipVert {
        pos: mesh.positions[i as usize],
        normal: mesh.normals[i as usize],
        uv: mesh.uvs[i as usize],
    };

    for tri in mesh.indices.chunks_exact(3) {
        let verts = [vert(tri[0]), vert(tri[1]), vert(tri[2])];
        let sides = verts.map(|v| classify(plane.distance(v.pos)));

        let has_front = sides.contains(&Side::Front);
        let has_back = sides.contains(&Side::Back);

        match (has_front, has_back) {
            (true, false) => front.push_triangle(verts[0], verts[1], verts[2]),
            (false, true) => back.push_triangle(verts[0], verts[1], verts[2]),
            (false, false) => {
                // Fully coplanar triangle: assign by facing
                let tri_normal =
                    (verts[1].pos - verts[0].pos).cross(verts[2].pos - verts[0].pos);
                if tri_normal.dot(plane.normal) > 0.0 {
                    front.push_triangle(verts[0], verts[1], verts[2]);
                } else {
                    back.push_triangle(verts[0], verts[1], verts[2]);
                }
            }
            (true, true) => {
                clip_spanning(
                    &verts,
                    &sides,
                    plane.normal,
                    offset,
                    &mut front,
                    &mut back,
                    &mut cap_points,
                );
            }
        }
    }

    // A plane that misses the mesh is not a split
    if front.indices.is_empty() || back.indices.is_empty() {
        return None;
    }

    build_cap(&cap_points, plane.normal, &mut front, &mut back);

    Some((front.finish(), back.finish()))
}

fn classify(distance: f32) -> Side {
    if distance > PLANE_EPSILON {
        Side::Front
    } else if distance < -PLANE_EPSILON {
        Side::Back
    } else {
        Side::Coplanar
    }
}

/// Clip one straddling triangle into per-side polygons, recording the
/// intersection points for the cap loop.
#[allow(clippy::too_many_arguments)]
fn clip_spanning(
    verts: &[ClipVert; 3],
    sides: &[Side; 3],
    normal: Vec3,
    offset: f32,
    front: &mut MeshBuilder,
    back: &mut MeshBuilder,
    cap_points: &mut Vec<Vec3>,
) {
    let mut front_poly: Vec<ClipVert> = Vec::with_capacity(4);
    let mut back_poly: Vec<ClipVert> = Vec::with_capacity(4);

    for i in 0..3 {
        let j = (i + 1) % 3;
        let (vi, vj) = (verts[i], verts[j]);
        let (si, sj) = (sides[i], sides[j]);

        match si {
            Side::Front => front_poly.push(vi),
            Side::Back => back_poly.push(vi),
            Side::Coplanar => {
                front_poly.push(vi);
                back_poly.push(vi);
                cap_points.push(vi.pos);
            }
        }

        let crosses = matches!(
            (si, sj),
            (Side::Front, Side::Back) | (Side::Back, Side::Front)
        );
        if crosses {
            let denom = normal.dot(vj.pos - vi.pos);
            if denom.abs() > f32::EPSILON {
                let t = (offset - normal.dot(vi.pos)) / denom;
                let v = ClipVert::lerp(vi, vj, t.clamp(0.0, 1.0));
                front_poly.push(v);
                back_poly.push(v);
                cap_points.push(v.pos);
            }
        }
    }

    if front_poly.len() >= 3 {
        front.push_polygon(&front_poly);
    }
    if back_poly.len() >= 3 {
        back.push_polygon(&back_poly);
    }
}

/// Close the cut cross-section with a centroid fan: the back half gets a
/// cap facing the plane normal, the front half its mirror. Exact for
/// convex cross-sections; skipped when fewer than three distinct
/// intersection points exist (a cut through a single vertex or edge).
fn build_cap(points: &[Vec3], normal: Vec3, front: &mut MeshBuilder, back: &mut MeshBuilder) {
    let mut unique: Vec<Vec3> = Vec::with_capacity(points.len());
    for &p in points {
        if !unique
            .iter()
            .any(|&q| (p - q).length_squared() < PLANE_EPSILON * PLANE_EPSILON * 100.0)
        {
            unique.push(p);
        }
    }
    if unique.len() < 3 {
        return;
    }

    let centroid = unique.iter().copied().sum::<Vec3>() / unique.len() as f32;
    let u = normal.any_orthonormal_vector();
    let v = normal.cross(u);

    unique.sort_by(|a, b| {
        let pa = *a - centroid;
        let pb = *b - centroid;
        let angle_a = pa.dot(v).atan2(pa.dot(u));
        let angle_b = pb.dot(v).atan2(pb.dot(u));
        angle_a.total_cmp(&angle_b)
    });

    let radius = unique
        .iter()
        .map(|&p| (p - centroid).length())
        .fold(0.0f32, f32::max)
        .max(PLANE_EPSILON);
    let cap_vert = |p: Vec3, n: Vec3| ClipVert {
        pos: p,
        normal: n,
        uv: Vec2::new((p - centroid).dot(u), (p - centroid).dot(v)) / (2.0 * radius)
            + Vec2::splat(0.5),
    };

    let center_front = cap_vert(centroid, -normal);
    let center_back = cap_vert(centroid, normal);
    for i in 0..unique.len() {
        let a = unique[i];
        let b = unique[(i + 1) % unique.len()];
        // Sorted counterclockwise around +normal: that winding is the
        // outward cap for the back half, the mirror for the front half
        back.push_triangle(center_back, cap_vert(a, normal), cap_vert(b, normal));
        front.push_triangle(center_front, cap_vert(b, -normal), cap_vert(a, -normal));
    }
}
