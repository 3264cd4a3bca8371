//! Pluggable tangent space solver
//!
//! The solver sees the mesh through [`TangentSpaceGeometry`], a per face,
//! per corner view, and reports one tangent plus a bitangent sign per corner.

use ahash::AHashMap;
use glam::{Vec2, Vec3};

use crate::raw_mesh::RawMesh;

/// Face/corner view of a triangle mesh for tangent generation
pub trait TangentSpaceGeometry {
    fn num_faces(&self) -> usize;

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> Vec3;

    fn normal(&self, face: usize, vert: usize) -> Vec3;

    fn tex_coord(&self, face: usize, vert: usize) -> Vec2;

    /// Store the result for one corner. The bitangent is `sign * (normal x tangent)`.
    fn set_tangent(&mut self, face: usize, vert: usize, tangent: Vec3, sign: f32);
}

/// Tangent generator
pub trait TangentSpaceSolver {
    /// Fill in a tangent for every corner of `geometry`. Returns false on failure.
    fn generate_tangents(&mut self, geometry: &mut dyn TangentSpaceGeometry) -> bool;
}

/// Adapter exposing a raw mesh's wedges to a solver
pub struct RawMeshTangentGeometry<'a> {
    mesh: &'a mut RawMesh,
}

impl<'a> RawMeshTangentGeometry<'a> {
    /// Wrap a mesh whose normals and tangent arrays are already sized per wedge
    pub fn new(mesh: &'a mut RawMesh) -> Self {
        Self { mesh }
    }
}

impl TangentSpaceGeometry for RawMeshTangentGeometry<'_> {
    fn num_faces(&self) -> usize {
        self.mesh.num_faces()
    }

    fn position(&self, face: usize, vert: usize) -> Vec3 {
        self.mesh.wedge_position(face * 3 + vert)
    }

    fn normal(&self, face: usize, vert: usize) -> Vec3 {
        self.mesh
            .wedge_tangent_z
            .get(face * 3 + vert)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }

    fn tex_coord(&self, face: usize, vert: usize) -> Vec2 {
        self.mesh.wedge_tex_coords[0]
            .get(face * 3 + vert)
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    fn set_tangent(&mut self, face: usize, vert: usize, tangent: Vec3, sign: f32) {
        let wedge = face * 3 + vert;
        let normal = self.normal(face, vert);
        self.mesh.wedge_tangent_x[wedge] = tangent;
        self.mesh.wedge_tangent_y[wedge] = sign * normal.cross(tangent);
    }
}

/// Corners sharing position, normal and UV bit for bit accumulate together
type CornerKey = [u32; 8];

fn corner_key(position: Vec3, normal: Vec3, uv: Vec2) -> CornerKey {
    [
        position.x.to_bits(),
        position.y.to_bits(),
        position.z.to_bits(),
        normal.x.to_bits(),
        normal.y.to_bits(),
        normal.z.to_bits(),
        uv.x.to_bits(),
        uv.y.to_bits(),
    ]
}

/// Built-in solver: per-triangle UV gradients accumulated over corners with
/// identical position, normal and UV, then Gram-Schmidt orthogonalized
/// against the normal.
#[derive(Debug, Default, Clone, Copy)]
pub struct UvGradientSolver;

impl TangentSpaceSolver for UvGradientSolver {
    fn generate_tangents(&mut self, geometry: &mut dyn TangentSpaceGeometry) -> bool {
        let num_faces = geometry.num_faces();
        let mut groups: AHashMap<CornerKey, usize> = AHashMap::new();
        let mut accum: Vec<(Vec3, Vec3)> = Vec::new();
        let mut corner_group: Vec<usize> = Vec::with_capacity(num_faces * 3);

        for face in 0..num_faces {
            if geometry.num_vertices_of_face(face) != 3 {
                return false;
            }

            let p: [Vec3; 3] = std::array::from_fn(|v| geometry.position(face, v));
            let uv: [Vec2; 3] = std::array::from_fn(|v| geometry.tex_coord(face, v));

            let dp1 = p[1] - p[0];
            let dp2 = p[2] - p[0];
            let duv1 = uv[1] - uv[0];
            let duv2 = uv[2] - uv[0];

            let det = duv1.x * duv2.y - duv1.y * duv2.x;
            let (t, b) = if det.abs() < 1.0e-8 {
                (Vec3::ZERO, Vec3::ZERO)
            } else {
                let inv_det = 1.0 / det;
                (
                    (dp1 * duv2.y - dp2 * duv1.y) * inv_det,
                    (dp2 * duv1.x - dp1 * duv2.x) * inv_det,
                )
            };

            for v in 0..3 {
                let key = corner_key(p[v], geometry.normal(face, v), uv[v]);
                let group = *groups.entry(key).or_insert_with(|| {
                    accum.push((Vec3::ZERO, Vec3::ZERO));
                    accum.len() - 1
                });
                accum[group].0 += t;
                accum[group].1 += b;
                corner_group.push(group);
            }
        }

        for face in 0..num_faces {
            for v in 0..3 {
                let (t, b) = accum[corner_group[face * 3 + v]];
                let n = geometry.normal(face, v).normalize_or_zero();

                let mut tangent = (t - n * n.dot(t)).normalize_or_zero();
                if tangent == Vec3::ZERO {
                    tangent = if n == Vec3::ZERO {
                        Vec3::X
                    } else {
                        n.any_orthonormal_vector()
                    };
                }
                let sign = if n.cross(tangent).dot(b) < 0.0 { -1.0 } else { 1.0 };
                geometry.set_tangent(face, v, tangent, sign);
            }
        }
        true
    }
}
