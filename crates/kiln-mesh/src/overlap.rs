//! Overlapping corner detection
//!
//! Finds wedges whose positions coincide within a tolerance. Wedges are
//! sorted by a cheap scalar projection of their position; each wedge only has
//! to be checked against the run of wedges whose projections fall within the
//! tolerance. Many points sharing one projection (a plane perpendicular to the
//! projection direction) degrade this toward quadratic time.

use glam::Vec3;
use kiln_core::math::points_equal;
use smallvec::SmallVec;

/// Symmetric wedge -> overlapping wedges relation. Never holds self pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapMap {
    overlaps: Vec<SmallVec<[u32; 4]>>,
}

impl OverlapMap {
    /// Create a map for `num_wedges` wedges with no overlaps
    pub fn with_wedges(num_wedges: usize) -> Self {
        Self {
            overlaps: vec![SmallVec::new(); num_wedges],
        }
    }

    /// Wedges overlapping `wedge`, ascending
    pub fn overlaps(&self, wedge: usize) -> &[u32] {
        self.overlaps.get(wedge).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// Number of wedges the map covers
    pub fn num_wedges(&self) -> usize {
        self.overlaps.len()
    }

    /// Total number of directed pairs
    pub fn pair_count(&self) -> usize {
        self.overlaps.iter().map(|list| list.len()).sum()
    }

    /// True when no wedge overlaps another
    pub fn is_empty(&self) -> bool {
        self.overlaps.iter().all(|list| list.is_empty())
    }

    fn add_pair(&mut self, a: u32, b: u32) {
        self.overlaps[a as usize].push(b);
        self.overlaps[b as usize].push(a);
    }

    fn sort(&mut self) {
        for list in &mut self.overlaps {
            list.sort_unstable();
        }
    }
}

/// Scalar key used to bucket positions before the exact comparison
#[inline]
pub(crate) fn projection_key(position: Vec3) -> f32 {
    0.30 * position.x + 0.33 * position.y + 0.37 * position.z
}

/// Sort `(key, index)` pairs by key. Ties keep index order.
pub(crate) fn sorted_by_projection(positions: impl Iterator<Item = Vec3>) -> Vec<(f32, u32)> {
    let mut keyed: Vec<(f32, u32)> = positions
        .enumerate()
        .map(|(index, position)| (projection_key(position), index as u32))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed
}

/// Find every pair of wedges whose positions are equal within `threshold` on each axis.
pub fn find_overlapping_corners(
    vertex_positions: &[Vec3],
    wedge_indices: &[u32],
    threshold: f32,
) -> OverlapMap {
    let wedge_position = |wedge: u32| vertex_positions[wedge_indices[wedge as usize] as usize];
    let keyed = sorted_by_projection((0..wedge_indices.len() as u32).map(wedge_position));

    let mut map = OverlapMap::with_wedges(wedge_indices.len());
    for i in 0..keyed.len() {
        let (key_i, wedge_i) = keyed[i];
        let position_i = wedge_position(wedge_i);

        // Pairs are added both ways, so only look forward.
        for &(key_j, wedge_j) in &keyed[i + 1..] {
            if (key_j - key_i).abs() > threshold {
                break;
            }
            if points_equal(position_i, wedge_position(wedge_j), threshold) {
                map.add_pair(wedge_i, wedge_j);
            }
        }
    }
    map.sort();
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;
    use kiln_core::math::THRESH_POINTS_ARE_SAME;

    fn assert_symmetric(map: &OverlapMap) {
        for a in 0..map.num_wedges() {
            for &b in map.overlaps(a) {
                assert_ne!(a, b as usize, "self pair for wedge {a}");
                assert!(map.overlaps(b as usize).contains(&(a as u32)));
            }
        }
    }

    #[test]
    fn test_shared_vertex_overlaps() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE];
        let wedges = [0, 1, 2, 2, 1, 3];
        let map = find_overlapping_corners(&positions, &wedges, THRESH_POINTS_ARE_SAME);

        assert_eq!(map.overlaps(1), &[4]);
        assert_eq!(map.overlaps(2), &[3]);
        assert!(map.overlaps(0).is_empty());
        assert_symmetric(&map);
    }

    #[test]
    fn test_tolerance_is_per_axis() {
        let positions = [
            Vec3::ZERO,
            Vec3::new(0.00001, 0.00001, 0.00001),
            Vec3::new(0.0, 0.0, 0.001),
        ];
        let wedges = [0, 1, 2];
        let map = find_overlapping_corners(&positions, &wedges, THRESH_POINTS_ARE_SAME);
        assert_eq!(map.overlaps(0), &[1]);
        assert!(map.overlaps(2).is_empty());

        let exact = find_overlapping_corners(&positions, &wedges, 0.0);
        assert!(exact.is_empty());
    }

    #[test]
    fn test_same_key_different_position() {
        // Both project to the same key but are far apart.
        let positions = [Vec3::new(0.33, 0.0, 0.0), Vec3::new(0.0, 0.30, 0.0)];
        let wedges = [0, 1, 0, 1];
        let map = find_overlapping_corners(&positions, &wedges, THRESH_POINTS_ARE_SAME);
        assert_eq!(map.overlaps(0), &[2]);
        assert_eq!(map.overlaps(1), &[3]);
    }

    #[test]
    fn test_cube_overlap_groups() {
        let cube = primitives::unit_cube();
        let map = find_overlapping_corners(&cube.vertex_positions, &cube.wedge_indices, THRESH_POINTS_ARE_SAME);
        assert_symmetric(&map);

        // Every wedge overlaps every other wedge at its cube corner.
        for wedge in 0..cube.num_wedges() {
            let expected = (0..cube.num_wedges())
                .filter(|&other| other != wedge && cube.wedge_position(other) == cube.wedge_position(wedge))
                .count();
            assert_eq!(map.overlaps(wedge).len(), expected);
        }
    }

    #[test]
    fn test_out_of_range_query() {
        let map = OverlapMap::with_wedges(3);
        assert!(map.overlaps(10).is_empty());
        assert_eq!(map.pair_count(), 0);
    }
}
