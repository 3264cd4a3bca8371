//! Vertex welding
//!
//! Collapses wedges into a unique vertex buffer plus one index list per
//! section. A wedge reuses the vertex of the first lower-numbered overlapping
//! wedge whose attributes match within tolerance; the first match wins, not
//! the closest one.

use glam::{Vec2, Vec3};
use indexmap::IndexMap;
use kiln_core::math::{normals_equal, points_equal, safe_normal, uvs_equal, SMALL_NUMBER};

use crate::overlap::OverlapMap;
use crate::raw_mesh::{Color, RawMesh, MAX_TEXTURE_COORDS};

/// One unique vertex of the final vertex buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildVertex {
    pub position: Vec3,
    pub tangent_x: Vec3,
    pub tangent_y: Vec3,
    pub tangent_z: Vec3,
    pub uvs: [Vec2; MAX_TEXTURE_COORDS],
    pub color: Color,
}

impl Default for BuildVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            tangent_x: Vec3::ZERO,
            tangent_y: Vec3::ZERO,
            tangent_z: Vec3::ZERO,
            uvs: [Vec2::ZERO; MAX_TEXTURE_COORDS],
            color: Color::WHITE,
        }
    }
}

/// Welded vertices and per-section triangle lists
#[derive(Debug, Clone, Default)]
pub struct WeldOutput {
    /// Unique vertices
    pub vertices: Vec<BuildVertex>,
    /// Vertex indices per section, three per triangle
    pub section_indices: Vec<Vec<u32>>,
    /// Unique vertex per wedge; `None` for wedges of dropped triangles
    pub wedge_map: Vec<Option<u32>>,
}

impl WeldOutput {
    /// Number of triangles kept across all sections
    pub fn num_triangles(&self) -> usize {
        self.section_indices.iter().map(|indices| indices.len() / 3).sum()
    }
}

/// Map each material index to a section, in order of first use by a face
pub fn material_section_map(mesh: &RawMesh) -> IndexMap<u32, usize> {
    let mut map = IndexMap::new();
    for &material in &mesh.face_material_indices {
        let next = map.len();
        map.entry(material).or_insert(next);
    }
    map
}

/// Scale for direction vectors under a non-uniform position scale
fn inverse_transpose_scale(build_scale: Vec3) -> Vec3 {
    let recip = |s: f32| if s == 0.0 { 0.0 } else { 1.0 / s };
    Vec3::new(recip(build_scale.x), recip(build_scale.y), recip(build_scale.z))
}

/// Materialize the vertex a wedge would produce
pub fn build_vertex(mesh: &RawMesh, wedge: usize, build_scale: Vec3) -> BuildVertex {
    let tangent_scale = inverse_transpose_scale(build_scale);
    let tangent = |array: &[Vec3]| {
        let v = array.get(wedge).copied().unwrap_or(Vec3::ZERO);
        safe_normal(v * tangent_scale, SMALL_NUMBER)
    };

    let mut vertex = BuildVertex {
        position: mesh.wedge_position(wedge) * build_scale,
        tangent_x: tangent(&mesh.wedge_tangent_x),
        tangent_y: tangent(&mesh.wedge_tangent_y),
        tangent_z: tangent(&mesh.wedge_tangent_z),
        color: mesh.wedge_colors.get(wedge).copied().unwrap_or(Color::WHITE),
        ..Default::default()
    };
    for (uv, channel) in vertex.uvs.iter_mut().zip(&mesh.wedge_tex_coords) {
        if let Some(&value) = channel.get(wedge) {
            *uv = value;
        }
    }
    vertex
}

/// Attribute equality used to decide whether two wedges share a vertex
pub fn vertices_equal(a: &BuildVertex, b: &BuildVertex, position_tolerance: f32) -> bool {
    points_equal(a.position, b.position, position_tolerance)
        && normals_equal(a.tangent_x, b.tangent_x)
        && normals_equal(a.tangent_y, b.tangent_y)
        && normals_equal(a.tangent_z, b.tangent_z)
        && a.color == b.color
        && a.uvs.iter().zip(&b.uvs).all(|(&ua, &ub)| uvs_equal(ua, ub))
}

/// Weld the wedges of `mesh` into unique vertices and per-section indices.
///
/// Triangles with two corners within `position_tolerance` of each other, and
/// triangles whose corners weld onto fewer than three distinct vertices, are
/// dropped and leave `None` in all three of their wedge map slots.
pub fn build_vertex_and_index_buffers(
    mesh: &RawMesh,
    overlaps: &OverlapMap,
    material_to_section: &IndexMap<u32, usize>,
    position_tolerance: f32,
    build_scale: Vec3,
) -> WeldOutput {
    let num_wedges = mesh.num_wedges();
    let mut out = WeldOutput {
        vertices: Vec::with_capacity(num_wedges),
        section_indices: vec![Vec::new(); material_to_section.len()],
        wedge_map: Vec::with_capacity(num_wedges),
    };

    // Vertex each wedge welded to, kept even when its triangle is dropped.
    let mut final_verts: Vec<Option<u32>> = vec![None; num_wedges];

    for face in 0..mesh.num_faces() {
        let [p0, p1, p2] = mesh.face_positions(face);
        if points_equal(p0, p1, position_tolerance)
            || points_equal(p0, p2, position_tolerance)
            || points_equal(p1, p2, position_tolerance)
        {
            out.wedge_map.extend([None; 3]);
            continue;
        }

        let mut corner_verts = [0u32; 3];
        for (corner, slot) in corner_verts.iter_mut().enumerate() {
            let wedge = face * 3 + corner;
            let vertex = build_vertex(mesh, wedge, build_scale);

            let matched = overlaps
                .overlaps(wedge)
                .iter()
                .take_while(|&&other| (other as usize) < wedge)
                .filter_map(|&other| final_verts[other as usize])
                .find(|&index| vertices_equal(&out.vertices[index as usize], &vertex, position_tolerance));

            let index = match matched {
                Some(index) => index,
                None => {
                    out.vertices.push(vertex);
                    (out.vertices.len() - 1) as u32
                }
            };
            final_verts[wedge] = Some(index);
            *slot = index;
        }

        let [v0, v1, v2] = corner_verts;
        if v0 == v1 || v0 == v2 || v1 == v2 {
            out.wedge_map.extend([None; 3]);
            continue;
        }

        out.wedge_map.extend(corner_verts.map(Some));
        let material = mesh.face_material_indices.get(face).copied().unwrap_or(0);
        if let Some(&section) = material_to_section.get(&material) {
            out.section_indices[section].extend(corner_verts);
        }
    }

    out.vertices.shrink_to_fit();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::find_overlapping_corners;
    use crate::primitives;
    use crate::settings::TangentOptions;
    use crate::tangents::compute_tangents;
    use kiln_core::math::{KINDA_SMALL_NUMBER, THRESH_POINTS_ARE_SAME};

    fn prepared(mut mesh: RawMesh) -> (RawMesh, OverlapMap) {
        let overlaps = find_overlapping_corners(&mesh.vertex_positions, &mesh.wedge_indices, THRESH_POINTS_ARE_SAME);
        compute_tangents(
            &mut mesh,
            &overlaps,
            TangentOptions::BLEND_OVERLAPPING_NORMALS | TangentOptions::IGNORE_DEGENERATE_TRIANGLES,
        );
        (mesh, overlaps)
    }

    fn weld(mesh: &RawMesh, overlaps: &OverlapMap) -> WeldOutput {
        build_vertex_and_index_buffers(mesh, overlaps, &material_section_map(mesh), KINDA_SMALL_NUMBER, Vec3::ONE)
    }

    #[test]
    fn test_cube_welds_to_24_vertices() {
        let (cube, overlaps) = prepared(primitives::unit_cube());
        let out = weld(&cube, &overlaps);

        assert_eq!(out.vertices.len(), 24);
        assert_eq!(out.wedge_map.len(), 36);
        assert_eq!(out.section_indices.len(), 1);
        assert_eq!(out.section_indices[0].len(), 36);
        assert!(out.wedge_map.iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_fully_degenerate_triangle() {
        let mut mesh = RawMesh::new();
        mesh.vertex_positions = vec![Vec3::ONE, Vec3::ONE, Vec3::ONE];
        mesh.wedge_indices = vec![0, 1, 2];
        mesh.face_material_indices = vec![0];
        mesh.face_smoothing_masks = vec![1];
        mesh.wedge_tex_coords[0] = vec![Vec2::ZERO; 3];

        let overlaps = find_overlapping_corners(&mesh.vertex_positions, &mesh.wedge_indices, THRESH_POINTS_ARE_SAME);
        let out = weld(&mesh, &overlaps);

        assert!(out.vertices.is_empty());
        assert_eq!(out.num_triangles(), 0);
        assert_eq!(out.wedge_map, vec![None, None, None]);
    }

    #[test]
    fn test_degenerate_face_among_others() {
        let mut mesh = primitives::grid(1);
        mesh.vertex_positions.push(Vec3::new(0.0, 0.0, 0.00001));
        mesh.wedge_indices.extend([0, 4, 1]);
        mesh.face_material_indices.push(0);
        mesh.face_smoothing_masks.push(1);
        mesh.wedge_tex_coords[0].extend([Vec2::ZERO; 3]);

        let (mesh, overlaps) = prepared(mesh);
        let out = weld(&mesh, &overlaps);

        assert_eq!(out.wedge_map.len(), mesh.num_wedges());
        assert_eq!(&out.wedge_map[6..9], &[None, None, None]);
        assert_eq!(out.vertices.len(), 4);
        assert_eq!(out.num_triangles(), 2);
    }

    #[test]
    fn test_sections_follow_first_material_use() {
        let mut mesh = primitives::grid(2);
        mesh.face_material_indices = vec![3, 3, 1, 1, 3, 3, 0, 0];
        let map = material_section_map(&mesh);
        assert_eq!(map.get_index(0), Some((&3, &0)));
        assert_eq!(map.get_index(1), Some((&1, &1)));
        assert_eq!(map.get_index(2), Some((&0, &2)));

        let (mesh, overlaps) = prepared(mesh);
        let out = weld(&mesh, &overlaps);
        assert_eq!(out.section_indices[0].len(), 12);
        assert_eq!(out.section_indices[1].len(), 6);
        assert_eq!(out.section_indices[2].len(), 6);
    }

    #[test]
    fn test_first_match_wins() {
        let (mesh, overlaps) = prepared(primitives::grid(1));
        let out = weld(&mesh, &overlaps);
        // Wedge 3 sits on vertex 0 with wedge 0 and must reuse its vertex.
        assert_eq!(out.wedge_map[3], out.wedge_map[0]);
        assert_eq!(out.wedge_map[5], out.wedge_map[1]);
        assert_eq!(out.vertices.len(), 4);
    }

    #[test]
    fn test_color_difference_splits_vertex() {
        let (mut mesh, overlaps) = prepared(primitives::grid(1));
        mesh.wedge_colors = vec![Color::WHITE; mesh.num_wedges()];
        mesh.wedge_colors[3] = Color::BLACK;

        let out = weld(&mesh, &overlaps);
        assert_ne!(out.wedge_map[3], out.wedge_map[0]);
        assert_eq!(out.vertices.len(), 5);
    }

    #[test]
    fn test_build_scale() {
        let (mesh, overlaps) = prepared(primitives::grid(1));
        let scale = Vec3::new(2.0, 1.0, 1.0);
        let out = build_vertex_and_index_buffers(
            &mesh,
            &overlaps,
            &material_section_map(&mesh),
            KINDA_SMALL_NUMBER,
            scale,
        );

        let far = out.vertices.iter().map(|v| v.position.x).fold(0.0f32, f32::max);
        assert_eq!(far, 2.0);
        for v in &out.vertices {
            assert!((v.tangent_x.length() - 1.0).abs() < 1.0e-5);
            assert!((v.tangent_z - Vec3::Z).length() < 1.0e-5);
        }
    }

    #[test]
    fn test_missing_streams_default() {
        let mesh = primitives::grid(1);
        let v = build_vertex(&mesh, 0, Vec3::ONE);
        assert_eq!(v.color, Color::WHITE);
        assert_eq!(v.tangent_z, Vec3::ZERO);
        assert_eq!(v.uvs[1], Vec2::ZERO);
    }
}
