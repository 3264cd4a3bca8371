//! Primitive raw meshes
//!
//! Small procedural meshes in importer layout, used by tests, benchmarks and
//! the command line tool. Triangles wind clockwise seen from the front, so the
//! face normal `(p1 - p2) x (p0 - p2)` points out of the front side.

use glam::{Vec2, Vec3};

use crate::raw_mesh::RawMesh;

/// Cube corners for each side, counter-clockwise seen from outside. Triangles
/// walk each quad backwards.
/// Corner `c` sits at `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`.
const CUBE_SIDES: [[u32; 4]; 6] = [
    [1, 3, 7, 5], // +X
    [0, 4, 6, 2], // -X
    [2, 6, 7, 3], // +Y
    [0, 1, 5, 4], // -Y
    [4, 5, 7, 6], // +Z
    [0, 2, 3, 1], // -Z
];

const QUAD_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Unit cube centered on the origin.
///
/// 8 shared positions, 12 triangles, 36 wedges. Every side has its own
/// smoothing bit (flat shading) and its own UV square, so sides never weld
/// together.
pub fn unit_cube() -> RawMesh {
    let mut mesh = RawMesh::new();
    mesh.vertex_positions = (0..8u32)
        .map(|c| Vec3::new((c & 1) as f32, ((c >> 1) & 1) as f32, ((c >> 2) & 1) as f32) - Vec3::splat(0.5))
        .collect();

    for (side, corners) in CUBE_SIDES.iter().enumerate() {
        for quad_corners in [[0, 2, 1], [0, 3, 2]] {
            for q in quad_corners {
                mesh.wedge_indices.push(corners[q]);
                mesh.wedge_tex_coords[0].push(QUAD_UVS[q]);
            }
            mesh.face_material_indices.push(0);
            mesh.face_smoothing_masks.push(1 << side);
        }
    }
    mesh
}

/// Flat `size` x `size` grid of quads on the XY plane spanning `[0, 1]`,
/// facing +Z, one smoothing group, UVs matching XY.
pub fn grid(size: u32) -> RawMesh {
    let size = size.max(1);
    let row = size + 1;
    let mut mesh = RawMesh::new();

    for j in 0..row {
        for i in 0..row {
            mesh.vertex_positions.push(Vec3::new(i as f32 / size as f32, j as f32 / size as f32, 0.0));
        }
    }

    for j in 0..size {
        for i in 0..size {
            let v00 = j * row + i;
            let v10 = v00 + 1;
            let v01 = v00 + row;
            let v11 = v01 + 1;
            for tri in [[v00, v11, v10], [v00, v01, v11]] {
                for v in tri {
                    mesh.wedge_indices.push(v);
                    let p = mesh.vertex_positions[v as usize];
                    mesh.wedge_tex_coords[0].push(Vec2::new(p.x, p.y));
                }
                mesh.face_material_indices.push(0);
                mesh.face_smoothing_masks.push(1);
            }
        }
    }
    mesh
}
