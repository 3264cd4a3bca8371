//! Tangent space synthesis
//!
//! Per-triangle tangent bases are computed from positions and the first UV
//! channel, then blended per corner across the fan of faces that share the
//! corner, respecting smoothing groups, UV seams and mirrored bases.
//!
//! The fan around a corner starts with the corner's own face and grows by
//! repeated relaxation passes: a face joins when it shares an edge with a face
//! already in the fan and their smoothing masks intersect. Contributions are
//! summed without area or angle weighting.

use glam::{Mat4, Vec3, Vec4};
use kiln_core::diagnostics::Diagnostics;
use kiln_core::math::{
    create_orthonormal_basis, inverse_or_identity, normalize_or_keep, points_equal, safe_normal,
    triple, uvs_equal, KINDA_SMALL_NUMBER, SMALL_NUMBER, THRESH_POINTS_ARE_SAME,
};
use smallvec::SmallVec;

use crate::overlap::OverlapMap;
use crate::raw_mesh::RawMesh;
use crate::settings::TangentOptions;
use crate::tangent_solver::{RawMeshTangentGeometry, TangentSpaceSolver};

/// Unblended tangent basis of every triangle
#[derive(Debug, Clone, Default)]
pub struct TriangleTangents {
    /// U tangent per face
    pub x: Vec<Vec3>,
    /// V tangent per face
    pub y: Vec<Vec3>,
    /// Normal per face
    pub z: Vec<Vec3>,
}

impl TriangleTangents {
    /// Handedness of a face's basis
    fn determinant(&self, face: usize) -> f32 {
        triple(self.x[face], self.y[face], self.z[face])
    }
}

/// Compute one tangent basis per triangle.
///
/// The UV-to-local Jacobian is inverted through a homogeneous 4x4 matrix; a
/// singular UV mapping falls back to an identity inverse and yields a
/// degenerate basis rather than an error. X and Y are only made orthogonal to
/// the normal, not to each other.
pub fn compute_triangle_tangents(mesh: &RawMesh, normal_tolerance: f32) -> TriangleTangents {
    let num_faces = mesh.num_faces();
    let uvs = &mesh.wedge_tex_coords[0];
    let mut out = TriangleTangents {
        x: Vec::with_capacity(num_faces),
        y: Vec::with_capacity(num_faces),
        z: Vec::with_capacity(num_faces),
    };

    for face in 0..num_faces {
        let [p0, p1, p2] = mesh.face_positions(face);
        let normal = safe_normal((p1 - p2).cross(p0 - p2), normal_tolerance);

        // Columns here are the rows of the row-vector matrices, so the
        // composition below reads right to left.
        let parameter_to_local = Mat4::from_cols(
            (p1 - p0).extend(0.0),
            (p2 - p0).extend(0.0),
            p0.extend(0.0),
            Vec4::W,
        );

        let (t1, t2, t3) = match uvs.get(face * 3..face * 3 + 3) {
            Some(&[t1, t2, t3]) => (t1, t2, t3),
            _ => Default::default(),
        };
        let parameter_to_texture = Mat4::from_cols(
            Vec4::new(t2.x - t1.x, t2.y - t1.y, 0.0, 0.0),
            Vec4::new(t3.x - t1.x, t3.y - t1.y, 0.0, 0.0),
            Vec4::new(t1.x, t1.y, 1.0, 0.0),
            Vec4::W,
        );

        let texture_to_local = parameter_to_local * inverse_or_identity(parameter_to_texture);

        let mut x = safe_normal(texture_to_local.transform_vector3(Vec3::X), SMALL_NUMBER);
        let mut y = safe_normal(texture_to_local.transform_vector3(Vec3::Y), SMALL_NUMBER);
        let mut z = normal;
        create_orthonormal_basis(&mut x, &mut y, &mut z);

        out.x.push(x);
        out.y.push(y);
        out.z.push(z);
    }
    out
}

/// One face in the fan around a corner
#[derive(Debug, Clone, Copy)]
struct FanFace {
    face: usize,
    filled: bool,
    blend_tangents: bool,
    blend_normals: bool,
}

type Fan = SmallVec<[FanFace; 8]>;

/// Shared state for the per-corner fan walks of one mesh
struct FanContext<'a> {
    mesh: &'a RawMesh,
    overlaps: &'a OverlapMap,
    triangles: &'a TriangleTangents,
    threshold: f32,
    blend_overlapping_normals: bool,
}

impl FanContext<'_> {
    fn is_degenerate(&self, face: usize) -> bool {
        let [p0, p1, p2] = self.mesh.face_positions(face);
        points_equal(p0, p1, self.threshold)
            || points_equal(p0, p2, self.threshold)
            || points_equal(p1, p2, self.threshold)
    }

    /// Faces touching any corner of `face`, ascending and unique
    fn adjacent_faces(&self, face: usize) -> SmallVec<[usize; 16]> {
        let mut faces: SmallVec<[usize; 16]> = SmallVec::new();
        for wedge in face * 3..face * 3 + 3 {
            faces.push(face);
            faces.extend(self.overlaps.overlaps(wedge).iter().map(|&other| other as usize / 3));
        }
        faces.sort_unstable();
        faces.dedup();
        faces
    }

    /// Build the fan of each corner of `face` that is not in `skip`.
    ///
    /// With `track_tangents` the fan also records which faces may blend
    /// tangents: the shared edge must have matching UVs and both bases must
    /// have the same handedness as the seed face.
    fn corner_fans(&self, face: usize, skip: [bool; 3], track_tangents: bool) -> [Fan; 3] {
        let mesh = self.mesh;
        let mut fans: [Fan; 3] = Default::default();
        let corner_positions = mesh.face_positions(face);

        for other_face in self.adjacent_faces(face) {
            if other_face != face && self.is_degenerate(other_face) {
                continue;
            }
            for corner in 0..3 {
                if skip[corner] {
                    continue;
                }
                let connected = other_face == face
                    || (0..3).any(|other_corner| {
                        points_equal(
                            corner_positions[corner],
                            mesh.wedge_position(other_face * 3 + other_corner),
                            self.threshold,
                        )
                    });
                if connected {
                    let seed = other_face == face;
                    fans[corner].push(FanFace {
                        face: other_face,
                        filled: seed,
                        blend_tangents: seed,
                        blend_normals: seed,
                    });
                }
            }
        }

        let determinant = self.triangles.determinant(face);
        for corner in 0..3 {
            if !skip[corner] {
                self.flood_fill(&mut fans[corner], determinant, track_tangents);
            }
        }
        fans
    }

    /// Grow the filled part of the fan until a pass adds nothing
    fn flood_fill(&self, fan: &mut Fan, determinant: f32, track_tangents: bool) {
        let mesh = self.mesh;
        let uvs = &mesh.wedge_tex_coords[0];

        loop {
            let mut new_connections = 0;
            for other_idx in 0..fan.len() {
                if !fan[other_idx].filled {
                    continue;
                }
                let other = fan[other_idx];

                for next_idx in 0..fan.len() {
                    let next = fan[next_idx];
                    if next.filled
                        || next_idx == other_idx
                        || mesh.face_smoothing_masks[next.face] & mesh.face_smoothing_masks[other.face] == 0
                    {
                        continue;
                    }

                    let mut common_vertices = 0;
                    let mut common_tangent_vertices = 0;
                    let mut common_normal_vertices = 0;
                    for other_corner in 0..3 {
                        let other_wedge = other.face * 3 + other_corner;
                        let other_vertex = mesh.wedge_indices[other_wedge];
                        for next_corner in 0..3 {
                            let next_wedge = next.face * 3 + next_corner;
                            let next_vertex = mesh.wedge_indices[next_wedge];
                            if !points_equal(
                                mesh.vertex_positions[next_vertex as usize],
                                mesh.vertex_positions[other_vertex as usize],
                                self.threshold,
                            ) {
                                continue;
                            }
                            common_vertices += 1;
                            if uvs_equal(uvs[next_wedge], uvs[other_wedge]) {
                                common_tangent_vertices += 1;
                            }
                            if self.blend_overlapping_normals || next_vertex == other_vertex {
                                common_normal_vertices += 1;
                            }
                        }
                    }

                    // More than one common vertex means a shared edge.
                    if common_vertices > 1 {
                        let next = &mut fan[next_idx];
                        next.filled = true;
                        next.blend_normals = common_normal_vertices > 1;
                        new_connections += 1;

                        if track_tangents
                            && other.blend_tangents
                            && common_tangent_vertices > 1
                            && determinant * self.triangles.determinant(next.face) > 0.0
                        {
                            next.blend_tangents = true;
                        }
                    }
                }
            }
            if new_connections == 0 {
                break;
            }
        }
    }
}

fn resize_zeroed(array: &mut Vec<Vec3>, len: usize) {
    if array.len() != len {
        array.clear();
        array.resize(len, Vec3::ZERO);
    }
}

fn options_threshold(options: TangentOptions) -> (f32, f32) {
    if options.contains(TangentOptions::IGNORE_DEGENERATE_TRIANGLES) {
        (THRESH_POINTS_ARE_SAME, SMALL_NUMBER)
    } else {
        (0.0, 0.0)
    }
}

fn is_nearly_zero(v: Vec3) -> bool {
    v.abs().max_element() <= KINDA_SMALL_NUMBER
}

/// Fill in missing normals and tangents of every wedge.
///
/// A corner whose three basis vectors are already non-zero is left alone.
/// Degenerate triangles are skipped entirely, so their wedges keep whatever
/// they held before. The final basis is X against Z, then Y against X and Z,
/// all normalized.
pub fn compute_tangents(mesh: &mut RawMesh, overlaps: &OverlapMap, options: TangentOptions) {
    let (threshold, normal_tolerance) = options_threshold(options);
    let num_wedges = mesh.num_wedges();
    resize_zeroed(&mut mesh.wedge_tangent_x, num_wedges);
    resize_zeroed(&mut mesh.wedge_tangent_y, num_wedges);
    resize_zeroed(&mut mesh.wedge_tangent_z, num_wedges);

    let triangles = compute_triangle_tangents(mesh, normal_tolerance);
    let mut results: Vec<(usize, [Vec3; 3], [Vec3; 3], [Vec3; 3])> = Vec::new();

    {
        let ctx = FanContext {
            mesh,
            overlaps,
            triangles: &triangles,
            threshold,
            blend_overlapping_normals: options.contains(TangentOptions::BLEND_OVERLAPPING_NORMALS),
        };

        for face in 0..mesh.num_faces() {
            if ctx.is_degenerate(face) {
                continue;
            }

            let wedge_offset = face * 3;
            let has_tangents: [bool; 3] = std::array::from_fn(|corner| {
                let wedge = wedge_offset + corner;
                mesh.wedge_tangent_x[wedge] != Vec3::ZERO
                    && mesh.wedge_tangent_y[wedge] != Vec3::ZERO
                    && mesh.wedge_tangent_z[wedge] != Vec3::ZERO
            });
            if has_tangents.iter().all(|&has| has) {
                continue;
            }

            let fans = ctx.corner_fans(face, has_tangents, true);

            let mut corner_x = [Vec3::ZERO; 3];
            let mut corner_y = [Vec3::ZERO; 3];
            let mut corner_z = [Vec3::ZERO; 3];
            for corner in 0..3 {
                let wedge = wedge_offset + corner;
                let existing_x = mesh.wedge_tangent_x[wedge];
                let existing_y = mesh.wedge_tangent_y[wedge];
                let existing_z = mesh.wedge_tangent_z[wedge];

                if has_tangents[corner] {
                    corner_x[corner] = existing_x;
                    corner_y[corner] = existing_y;
                    corner_z[corner] = existing_z;
                    continue;
                }

                for fan_face in fans[corner].iter().filter(|f| f.filled) {
                    if fan_face.blend_tangents {
                        corner_x[corner] += triangles.x[fan_face.face];
                        corner_y[corner] += triangles.y[fan_face.face];
                    }
                    if fan_face.blend_normals {
                        corner_z[corner] += triangles.z[fan_face.face];
                    }
                }

                // Keep whatever part of the basis was imported.
                if existing_x != Vec3::ZERO {
                    corner_x[corner] = existing_x;
                }
                if existing_y != Vec3::ZERO {
                    corner_y[corner] = existing_y;
                }
                if existing_z != Vec3::ZERO {
                    corner_z[corner] = existing_z;
                }
            }

            for corner in 0..3 {
                let z = normalize_or_keep(corner_z[corner]);
                let mut x = normalize_or_keep(corner_x[corner]);
                let mut y = normalize_or_keep(corner_y[corner]);

                x = normalize_or_keep(x - z * z.dot(x));
                y -= x * x.dot(y);
                y = normalize_or_keep(y - z * z.dot(y));

                corner_x[corner] = x;
                corner_y[corner] = y;
                corner_z[corner] = z;
            }
            results.push((face, corner_x, corner_y, corner_z));
        }
    }

    for (face, xs, ys, zs) in results {
        for corner in 0..3 {
            let wedge = face * 3 + corner;
            mesh.wedge_tangent_x[wedge] = xs[corner];
            mesh.wedge_tangent_y[wedge] = ys[corner];
            mesh.wedge_tangent_z[wedge] = zs[corner];
        }
    }
}

/// Fill in missing normals only, using the same fan rules as [`compute_tangents`].
pub fn compute_normals(mesh: &mut RawMesh, overlaps: &OverlapMap, options: TangentOptions) {
    let (threshold, normal_tolerance) = options_threshold(options);
    let num_wedges = mesh.num_wedges();
    resize_zeroed(&mut mesh.wedge_tangent_z, num_wedges);

    let triangles = compute_triangle_tangents(mesh, normal_tolerance);
    let mut results: Vec<(usize, [Vec3; 3])> = Vec::new();

    {
        let ctx = FanContext {
            mesh,
            overlaps,
            triangles: &triangles,
            threshold,
            blend_overlapping_normals: options.contains(TangentOptions::BLEND_OVERLAPPING_NORMALS),
        };

        for face in 0..mesh.num_faces() {
            if ctx.is_degenerate(face) {
                continue;
            }

            let wedge_offset = face * 3;
            let has_normal: [bool; 3] =
                std::array::from_fn(|corner| mesh.wedge_tangent_z[wedge_offset + corner] != Vec3::ZERO);
            if has_normal.iter().all(|&has| has) {
                continue;
            }

            let fans = ctx.corner_fans(face, has_normal, false);
            let normals: [Vec3; 3] = std::array::from_fn(|corner| {
                if has_normal[corner] {
                    return mesh.wedge_tangent_z[wedge_offset + corner];
                }
                let sum: Vec3 = fans[corner]
                    .iter()
                    .filter(|f| f.filled && f.blend_normals)
                    .map(|f| triangles.z[f.face])
                    .sum();
                normalize_or_keep(sum)
            });
            results.push((face, normals));
        }
    }

    for (face, normals) in results {
        for (corner, normal) in normals.into_iter().enumerate() {
            mesh.wedge_tangent_z[face * 3 + corner] = normal;
        }
    }
}

/// True when every wedge carries a normal that is not nearly zero
pub fn has_wedge_normals(mesh: &RawMesh) -> bool {
    mesh.wedge_tangent_z.len() == mesh.num_wedges()
        && mesh.wedge_tangent_z.iter().all(|&z| !is_nearly_zero(z))
}

/// True when every wedge carries tangents that are not nearly zero
pub fn has_wedge_tangents(mesh: &RawMesh) -> bool {
    let num_wedges = mesh.num_wedges();
    mesh.wedge_tangent_x.len() == num_wedges
        && mesh.wedge_tangent_y.len() == num_wedges
        && mesh
            .wedge_tangent_x
            .iter()
            .zip(&mesh.wedge_tangent_y)
            .all(|(&x, &y)| !is_nearly_zero(x) && !is_nearly_zero(y))
}

/// Fill in missing normals with the fan rules, then hand tangent generation
/// to `solver`. Returns false if the solver reported failure.
pub fn compute_tangents_with_solver(
    mesh: &mut RawMesh,
    overlaps: &OverlapMap,
    options: TangentOptions,
    solver: &mut dyn TangentSpaceSolver,
    diagnostics: &mut dyn Diagnostics,
) -> bool {
    if !has_wedge_normals(mesh) {
        compute_normals(mesh, overlaps, options);
    }

    let num_wedges = mesh.num_wedges();
    resize_zeroed(&mut mesh.wedge_tangent_x, num_wedges);
    resize_zeroed(&mut mesh.wedge_tangent_y, num_wedges);

    if has_wedge_tangents(mesh) {
        return true;
    }

    let mut geometry = RawMeshTangentGeometry::new(mesh);
    let generated = solver.generate_tangents(&mut geometry);
    if !generated {
        diagnostics.warn("Tangent space solver failed; tangents may be zero");
    }
    generated
}
