//! Owned triangle-mesh buffers and geometric helpers.
//!
//! Meshes are immutable once built: a cut never mutates its input, it
//! allocates two new buffers. Invariants: the index buffer length is a
//! multiple of three, every index references a valid vertex, and the
//! normal/uv buffers run parallel to the positions.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub mod slicer;

/// Renderable/collidable geometry carried by an entity. Presence of this
/// component is what makes an entity eligible for geometric shatter and
/// mesh-copy fragments.
#[derive(Component, Debug, Clone)]
pub struct Geometry(pub MeshData);

/// Triangle mesh with per-vertex normals and UVs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, uvs: Vec<Vec2>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    /// Build from bare positions/indices, synthesizing flat normals and
    /// zero UVs. Convenience for tests and procedural callers.
    pub fn from_positions(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut normals = vec![Vec3::ZERO; positions.len()];
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = (positions[b] - positions[a])
                .cross(positions[c] - positions[a])
                .normalize_or_zero();
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        for n in &mut normals {
            *n = n.try_normalize().unwrap_or(Vec3::Y);
        }
        let uvs = vec![Vec2::ZERO; positions.len()];
        Self::new(positions, normals, uvs, indices)
    }

    /// Axis-aligned box with outward-wound faces, four vertices per face.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents;
        let (min, max) = (-h, h);
        // (position, normal, uv) per corner, quads wound counterclockwise
        // seen from outside
        let verts: [([f32; 3], [f32; 3], [f32; 2]); 24] = [
            // +Z
            ([min.x, min.y, max.z], [0., 0., 1.], [0., 0.]),
            ([max.x, min.y, max.z], [0., 0., 1.], [1., 0.]),
            ([max.x, max.y, max.z], [0., 0., 1.], [1., 1.]),
            ([min.x, max.y, max.z], [0., 0., 1.], [0., 1.]),
            // -Z
            ([min.x, max.y, min.z], [0., 0., -1.], [1., 0.]),
            ([max.x, max.y, min.z], [0., 0., -1.], [0., 0.]),
            ([max.x, min.y, min.z], [0., 0., -1.], [0., 1.]),
            ([min.x, min.y, min.z], [0., 0., -1.], [1., 1.]),
            // +X
            ([max.x, min.y, min.z], [1., 0., 0.], [0., 0.]),
            ([max.x, max.y, min.z], [1., 0., 0.], [1., 0.]),
            ([max.x, max.y, max.z], [1., 0., 0.], [1., 1.]),
            ([max.x, min.y, max.z], [1., 0., 0.], [0., 1.]),
            // -X
            ([min.x, min.y, max.z], [-1., 0., 0.], [1., 0.]),
            ([min.x, max.y, max.z], [-1., 0., 0.], [0., 0.]),
            ([min.x, max.y, min.z], [-1., 0., 0.], [0., 1.]),
            ([min.x, min.y, min.z], [-1., 0., 0.], [1., 1.]),
            // +Y
            ([max.x, max.y, min.z], [0., 1., 0.], [1., 0.]),
            ([min.x, max.y, min.z], [0., 1., 0.], [0., 0.]),
            ([min.x, max.y, max.z], [0., 1., 0.], [0., 1.]),
            ([max.x, max.y, max.z], [0., 1., 0.], [1., 1.]),
            // -Y
            ([max.x, min.y, max.z], [0., -1., 0.], [0., 0.]),
            ([min.x, min.y, max.z], [0., -1., 0.], [1., 0.]),
            ([min.x, min.y, min.z], [0., -1., 0.], [1., 1.]),
            ([max.x, min.y, min.z], [0., -1., 0.], [0., 1.]),
        ];

        let mut mesh = Self {
            positions: Vec::with_capacity(24),
            normals: Vec::with_capacity(24),
            uvs: Vec::with_capacity(24),
            indices: Vec::with_capacity(36),
        };
        for (p, n, uv) in verts {
            mesh.positions.push(Vec3::from(p));
            mesh.normals.push(Vec3::from(n));
            mesh.uvs.push(Vec2::from(uv));
        }
        for face in 0..6u32 {
            let base = face * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Structural invariants: triangle-aligned index buffer, in-range
    /// indices, parallel attribute buffers.
    pub fn is_valid(&self) -> bool {
        self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < self.positions.len())
            && self.normals.len() == self.positions.len()
            && self.uvs.len() == self.positions.len()
    }

    /// Axis-aligned bounds as (min, max); zero for an empty mesh.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut iter = self.positions.iter();
        let Some(&first) = iter.next() else {
            return (Vec3::ZERO, Vec3::ZERO);
        };
        let mut min = first;
        let mut max = first;
        for &p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    pub fn bounds_center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (max - min) * 0.5
    }

    /// Mean of the three bound sizes; the reference length for fragment
    /// scaling.
    pub fn mean_bound_size(&self) -> f32 {
        let size = self.half_extents() * 2.0;
        (size.x + size.y + size.z) / 3.0
    }

    /// Mean vertex position.
    pub fn centroid(&self) -> Vec3 {
        if self.positions.is_empty() {
            return Vec3::ZERO;
        }
        self.positions.iter().sum::<Vec3>() / self.positions.len() as f32
    }

    /// Signed volume via summed tetrahedra; positive for a closed,
    /// outward-wound mesh.
    pub fn signed_volume(&self) -> f32 {
        let mut volume = 0.0;
        for tri in self.indices.chunks_exact(3) {
            let a = self.positions[tri[0] as usize];
            let b = self.positions[tri[1] as usize];
            let c = self.positions[tri[2] as usize];
            volume += a.dot(b.cross(c));
        }
        volume / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_shape() {
        let mesh = MeshData::cuboid(Vec3::splat(0.5));
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_cuboid_bounds() {
        let mesh = MeshData::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let (min, max) = mesh.bounds();
        assert_eq!(min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.bounds_center(), Vec3::ZERO);
        assert_eq!(mesh.half_extents(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_cuboid_volume() {
        let mesh = MeshData::cuboid(Vec3::splat(0.5));
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-5);
        let stretched = MeshData::cuboid(Vec3::new(1.0, 0.5, 0.25));
        assert!((stretched.signed_volume() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_mean_bound_size() {
        let mesh = MeshData::cuboid(Vec3::new(0.5, 1.0, 1.5));
        assert!((mesh.mean_bound_size() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = MeshData::default();
        assert!(mesh.is_empty());
        assert!(mesh.is_valid());
        assert_eq!(mesh.bounds(), (Vec3::ZERO, Vec3::ZERO));
        assert_eq!(mesh.centroid(), Vec3::ZERO);
    }

    #[test]
    fn test_invalid_index_detected() {
        let mut mesh = MeshData::cuboid(Vec3::ONE);
        mesh.indices[0] = 999;
        assert!(!mesh.is_valid());
    }

    #[test]
    fn test_from_positions_synthesizes_attributes() {
        let mesh = MeshData::from_positions(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        );
        assert!(mesh.is_valid());
        assert_eq!(mesh.normals.len(), 3);
        // Flat triangle in the XY plane faces +Z
        assert!((mesh.normals[0] - Vec3::Z).length() < 1e-6);
    }
}
