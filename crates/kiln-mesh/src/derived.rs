//! Derived index buffers and bounds
//!
//! Everything here is computed from an LOD's finished vertex positions,
//! primary index buffer and section table.

use ahash::AHashMap;
use glam::Vec3;
use kiln_core::math::{Aabb, BoxSphereBounds, THRESH_POINTS_ARE_SAME};
use smallvec::SmallVec;

use crate::cache::{optimize_index_buffer, CacheOptimizerKind};
use crate::overlap::sorted_by_projection;
use crate::render_data::StaticMeshSection;

/// Reverse each section's index range so every triangle flips its winding
pub fn reversed_index_buffer(indices: &[u32], sections: &[StaticMeshSection]) -> Vec<u32> {
    let mut reversed = vec![0u32; indices.len()];
    for section in sections {
        let range = section.index_range();
        for (dst, &src) in reversed[range.clone()].iter_mut().zip(indices[range].iter().rev()) {
            *dst = src;
        }
    }
    reversed
}

/// Lowest index of any vertex at the same position, per vertex
pub fn position_canonical_map(positions: &[Vec3]) -> Vec<u32> {
    let mut canonical: Vec<u32> = (0..positions.len() as u32).collect();
    let keyed = sorted_by_projection(positions.iter().copied());
    let window = THRESH_POINTS_ARE_SAME * 4.01;

    for i in 0..keyed.len() {
        let (key_i, a) = keyed[i];
        for &(key_j, b) in &keyed[i + 1..] {
            if (key_j - key_i).abs() > window {
                break;
            }
            if positions[a as usize] == positions[b as usize] {
                let (a, b) = (a as usize, b as usize);
                canonical[a] = canonical[a].min(b as u32);
                canonical[b] = canonical[b].min(a as u32);
            }
        }
    }
    canonical
}

/// Index buffer drawing the same triangles through position-only vertices.
///
/// Each section's range is remapped onto the canonical vertices. When the
/// buffer has fewer than `max_optimize_indices` indices each range is then
/// reordered for the vertex cache.
pub fn depth_only_index_buffer(
    positions: &[Vec3],
    indices: &[u32],
    sections: &[StaticMeshSection],
    optimizer: CacheOptimizerKind,
    cache_size: usize,
    max_optimize_indices: usize,
) -> Vec<u32> {
    let canonical = position_canonical_map(positions);
    let mut depth_only: Vec<u32> = indices.iter().map(|&i| canonical[i as usize]).collect();

    if depth_only.len() < max_optimize_indices {
        for section in sections {
            let range = section.index_range();
            let optimized = optimize_index_buffer(optimizer, &depth_only[range.clone()], cache_size);
            depth_only[range].copy_from_slice(&optimized);
        }
    }
    depth_only
}

/// The whole buffer reversed
pub fn reversed_depth_only_index_buffer(depth_only: &[u32]) -> Vec<u32> {
    depth_only.iter().rev().copied().collect()
}

/// Edge shared by at most two triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshEdge {
    pub vertices: [u32; 2],
    pub faces: [Option<u32>; 2],
}

type PositionKey = [u32; 3];

fn position_key(position: Vec3) -> PositionKey {
    // Adding zero folds -0.0 into 0.0.
    let p = position + Vec3::ZERO;
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Collect the unique edges of a triangle list.
///
/// A directed edge joins an earlier edge when that edge runs the opposite way
/// between the same positions and has no second face yet; otherwise it starts
/// a new edge.
pub fn build_edges(positions: &[Vec3], indices: &[u32]) -> Vec<MeshEdge> {
    let mut edges: Vec<MeshEdge> = Vec::with_capacity(indices.len());
    let mut by_start: AHashMap<PositionKey, SmallVec<[u32; 4]>> = AHashMap::with_capacity(indices.len());

    for (triangle, corners) in indices.chunks_exact(3).enumerate() {
        for edge in 0..3 {
            let i1 = corners[edge];
            let i2 = corners[(edge + 1) % 3];

            let opposite = by_start.get(&position_key(positions[i2 as usize])).and_then(|candidates| {
                candidates.iter().copied().find(|&candidate| {
                    let other = &edges[candidate as usize];
                    positions[other.vertices[1] as usize] == positions[i1 as usize] && other.faces[1].is_none()
                })
            });

            match opposite {
                Some(found) => edges[found as usize].faces[1] = Some(triangle as u32),
                None => {
                    by_start
                        .entry(position_key(positions[i1 as usize]))
                        .or_default()
                        .push(edges.len() as u32);
                    edges.push(MeshEdge {
                        vertices: [i1, i2],
                        faces: [Some(triangle as u32), None],
                    });
                }
            }
        }
    }
    edges
}

/// Line list with one index pair per unique edge
pub fn wireframe_index_buffer(positions: &[Vec3], indices: &[u32]) -> Vec<u32> {
    build_edges(positions, indices)
        .iter()
        .flat_map(|edge| edge.vertices)
        .collect()
}

/// Box and sphere bounds around `positions`.
///
/// The sphere is centered on the box center, not fitted.
pub fn compute_bounds(positions: impl IntoIterator<Item = Vec3> + Clone) -> BoxSphereBounds {
    let aabb = Aabb::from_points(positions.clone());
    if aabb.is_empty() {
        return BoxSphereBounds::default();
    }

    let origin = aabb.center();
    let radius_squared = positions
        .into_iter()
        .map(|p| (p - origin).length_squared())
        .fold(0.0f32, f32::max);

    BoxSphereBounds {
        origin,
        box_extent: aabb.half_extents(),
        sphere_radius: radius_squared.sqrt(),
    }
}
