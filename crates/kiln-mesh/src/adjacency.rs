//! Tessellation adjacency
//!
//! PN-AEN index buffers: 12 indices per triangle. The 3 corners, then for each
//! edge the neighbor triangle's vertices on that edge, then each corner's
//! dominant vertex.

use ahash::AHashMap;
use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::derived::position_canonical_map;

/// Indices emitted per triangle
pub const ADJACENCY_INDICES_PER_TRIANGLE: usize = 12;

/// Builds an adjacency index buffer from a vertex stream and triangle list
pub trait AdjacencyBuilder {
    fn build_adjacency(&mut self, positions: &[Vec3], uvs: &[Vec2], indices: &[u32]) -> Vec<u32>;
}

/// Built-in PN-AEN adjacency.
///
/// Edges are matched across UV seams by position. For edge `(a, b)` the
/// neighbor's vertices are written in the same order, the one sharing `a`'s
/// position first; a border edge repeats `(a, b)`. The dominant vertex of a
/// corner is the lowest-numbered vertex at its position.
#[derive(Debug, Default, Clone, Copy)]
pub struct PnAenAdjacency;

impl AdjacencyBuilder for PnAenAdjacency {
    fn build_adjacency(&mut self, positions: &[Vec3], _uvs: &[Vec2], indices: &[u32]) -> Vec<u32> {
        let num_tris = indices.len() / 3;
        let canonical = position_canonical_map(positions);
        let canon = |index: u32| canonical[index as usize];

        // Directed position edge -> (triangle, start vertex, end vertex).
        let mut edges: AHashMap<(u32, u32), SmallVec<[(u32, u32, u32); 2]>> =
            AHashMap::with_capacity(indices.len());
        for (tri, corners) in indices.chunks_exact(3).enumerate() {
            for edge in 0..3 {
                let a = corners[edge];
                let b = corners[(edge + 1) % 3];
                edges.entry((canon(a), canon(b))).or_default().push((tri as u32, a, b));
            }
        }

        let mut out = Vec::with_capacity(num_tris * ADJACENCY_INDICES_PER_TRIANGLE);
        for (tri, corners) in indices.chunks_exact(3).enumerate() {
            out.extend_from_slice(corners);

            for edge in 0..3 {
                let a = corners[edge];
                let b = corners[(edge + 1) % 3];
                let neighbor = edges
                    .get(&(canon(b), canon(a)))
                    .and_then(|list| list.iter().find(|&&(other, _, _)| other as usize != tri));
                match neighbor {
                    // The neighbor runs b -> a.
                    Some(&(_, start, end)) => out.extend_from_slice(&[end, start]),
                    None => out.extend_from_slice(&[a, b]),
                }
            }

            out.extend(corners.iter().map(|&c| canon(c)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seamed_quad() {
        // Vertex 4 duplicates 2 and vertex 5 duplicates 0 across a UV seam.
        let positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::Y,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::ZERO,
        ];
        let uvs = vec![Vec2::ZERO; positions.len()];
        let indices = [0, 1, 2, 5, 4, 3];

        let adjacency = PnAenAdjacency.build_adjacency(&positions, &uvs, &indices);
        assert_eq!(adjacency.len(), 2 * ADJACENCY_INDICES_PER_TRIANGLE);
        assert_eq!(&adjacency[..12], &[0, 1, 2, 0, 1, 1, 2, 4, 5, 0, 1, 2]);
        assert_eq!(&adjacency[12..], &[5, 4, 3, 0, 2, 4, 3, 3, 5, 0, 2, 3]);
    }

    #[test]
    fn test_lone_triangle_repeats_its_edges() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let adjacency = PnAenAdjacency.build_adjacency(&positions, &[], &[0, 1, 2]);
        assert_eq!(adjacency, vec![0, 1, 2, 0, 1, 1, 2, 2, 0, 0, 1, 2]);
    }
}
