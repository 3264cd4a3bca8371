//! Vertex cache optimization
//!
//! Reorders triangles inside each section for post-transform cache reuse, then
//! renumbers vertices in order of first use so the vertex fetch is linear too.

use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::weld::BuildVertex;

/// Triangle reordering strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOptimizerKind {
    /// Greedy vertex scoring against a simulated LRU cache
    #[default]
    Forsyth,
    /// Walk triangle strips across shared edges
    Strip,
}

impl fmt::Display for CacheOptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOptimizerKind::Forsyth => write!(f, "forsyth"),
            CacheOptimizerKind::Strip => write!(f, "strip"),
        }
    }
}

impl FromStr for CacheOptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forsyth" => Ok(CacheOptimizerKind::Forsyth),
            "strip" => Ok(CacheOptimizerKind::Strip),
            other => Err(format!("Unknown cache optimizer: {other}")),
        }
    }
}

const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRI_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

/// Reorder the triangles of one index list
pub fn optimize_index_buffer(kind: CacheOptimizerKind, indices: &[u32], cache_size: usize) -> Vec<u32> {
    match kind {
        CacheOptimizerKind::Forsyth => forsyth_order(indices, cache_size),
        CacheOptimizerKind::Strip => strip_order(indices),
    }
}

fn vertex_score(cache_pos: Option<usize>, remaining: u32, cache_size: usize) -> f32 {
    if remaining == 0 {
        return -1.0;
    }

    let mut score = match cache_pos {
        None => 0.0,
        // The last triangle's vertices score the same regardless of order.
        Some(pos) if pos < 3 => LAST_TRI_SCORE,
        Some(pos) => {
            let scaler = 1.0 / (cache_size - 3) as f32;
            (1.0 - (pos - 3) as f32 * scaler).powf(CACHE_DECAY_POWER)
        }
    };
    score += VALENCE_BOOST_SCALE * (remaining as f32).powf(-VALENCE_BOOST_POWER);
    score
}

/// Greedy triangle ordering after Tom Forsyth's linear-speed optimizer.
///
/// Triangles keep their own corner order; only their sequence changes.
pub fn forsyth_order(indices: &[u32], cache_size: usize) -> Vec<u32> {
    let num_tris = indices.len() / 3;
    if num_tris == 0 {
        return indices.to_vec();
    }
    let cache_size = cache_size.max(4);
    let indices = &indices[..num_tris * 3];
    let num_vertices = indices.iter().max().map_or(0, |&max| max as usize + 1);

    let mut remaining = vec![0u32; num_vertices];
    for &index in indices {
        remaining[index as usize] += 1;
    }

    // Triangles per vertex, flattened.
    let mut offsets = Vec::with_capacity(num_vertices + 1);
    offsets.push(0usize);
    for &count in &remaining {
        offsets.push(offsets[offsets.len() - 1] + count as usize);
    }
    let mut fill = offsets.clone();
    let mut vertex_tris = vec![0u32; indices.len()];
    for (corner, &index) in indices.iter().enumerate() {
        let slot = &mut fill[index as usize];
        vertex_tris[*slot] = (corner / 3) as u32;
        *slot += 1;
    }

    let mut cache_pos: Vec<Option<usize>> = vec![None; num_vertices];
    let mut scores: Vec<f32> = (0..num_vertices)
        .map(|v| vertex_score(None, remaining[v], cache_size))
        .collect();
    let tri_corners = |tri: usize| [indices[tri * 3], indices[tri * 3 + 1], indices[tri * 3 + 2]];
    let tri_score = |scores: &[f32], tri: usize| -> f32 { tri_corners(tri).iter().map(|&v| scores[v as usize]).sum() };
    let mut added = vec![false; num_tris];
    // Everything below this triangle has been emitted.
    let mut next_unadded = 0usize;

    let mut out = Vec::with_capacity(indices.len());
    let mut cache: Vec<u32> = Vec::with_capacity(cache_size + 3);
    let mut best = (0..num_tris).reduce(|a, b| if tri_score(&scores, b) > tri_score(&scores, a) { b } else { a });

    while let Some(tri) = best {
        added[tri] = true;
        let corners = tri_corners(tri);
        out.extend_from_slice(&corners);

        let mut touched: Vec<u32> = Vec::with_capacity(cache_size + 3);
        for &v in &corners {
            remaining[v as usize] -= 1;
            if !touched.contains(&v) {
                touched.push(v);
            }
        }
        for &v in &cache {
            if !touched.contains(&v) {
                touched.push(v);
            }
        }

        for (pos, &v) in touched.iter().enumerate() {
            let v = v as usize;
            cache_pos[v] = (pos < cache_size).then_some(pos);
            scores[v] = vertex_score(cache_pos[v], remaining[v], cache_size);
        }

        best = None;
        let mut best_score = f32::MIN;
        for &v in &touched {
            let v = v as usize;
            for &other in &vertex_tris[offsets[v]..offsets[v + 1]] {
                let other = other as usize;
                if added[other] {
                    continue;
                }
                let score = tri_score(&scores, other);
                if score > best_score {
                    best_score = score;
                    best = Some(other);
                }
            }
        }

        touched.truncate(cache_size);
        cache = touched;

        if best.is_none() {
            while next_unadded < num_tris && added[next_unadded] {
                next_unadded += 1;
            }
            best = (next_unadded < num_tris).then_some(next_unadded);
        }
    }
    out
}

/// Order triangles by walking across shared edges, starting a new strip at the
/// first unvisited triangle whenever the walk gets stuck.
pub fn strip_order(indices: &[u32]) -> Vec<u32> {
    let num_tris = indices.len() / 3;
    let tri_corners = |tri: usize| [indices[tri * 3], indices[tri * 3 + 1], indices[tri * 3 + 2]];

    // Directed edge -> triangles containing it.
    let mut edges: AHashMap<(u32, u32), Vec<u32>> = AHashMap::with_capacity(indices.len());
    for tri in 0..num_tris {
        let [a, b, c] = tri_corners(tri);
        for edge in [(a, b), (b, c), (c, a)] {
            edges.entry(edge).or_default().push(tri as u32);
        }
    }

    let mut visited = vec![false; num_tris];
    let mut out = Vec::with_capacity(num_tris * 3);

    for start in 0..num_tris {
        if visited[start] {
            continue;
        }
        let mut current = start;
        loop {
            visited[current] = true;
            let [a, b, c] = tri_corners(current);
            out.extend_from_slice(&[a, b, c]);

            // A consistently wound neighbor holds the edge reversed.
            let next = [(c, b), (a, c), (b, a)].iter().find_map(|edge| {
                edges
                    .get(edge)
                    .and_then(|tris| tris.iter().copied().find(|&t| !visited[t as usize]))
            });
            match next {
                Some(tri) => current = tri as usize,
                None => break,
            }
        }
    }
    out
}

/// Average cache miss ratio (misses per triangle) for a FIFO cache
pub fn cache_miss_ratio(indices: &[u32], cache_size: usize) -> f32 {
    let num_tris = indices.len() / 3;
    if num_tris == 0 {
        return 0.0;
    }

    let mut fifo: std::collections::VecDeque<u32> = std::collections::VecDeque::with_capacity(cache_size);
    let mut misses = 0usize;
    for &index in indices {
        if !fifo.contains(&index) {
            misses += 1;
            if fifo.len() == cache_size {
                fifo.pop_front();
            }
            fifo.push_back(index);
        }
    }
    misses as f32 / num_tris as f32
}

/// Reorder every section's triangles, then renumber vertices in order of first
/// use across sections and remap the wedge map to match. Vertices no section
/// references are dropped.
pub fn cache_optimize_vertex_and_index_buffer(
    vertices: &mut Vec<BuildVertex>,
    section_indices: &mut [Vec<u32>],
    wedge_map: &mut [Option<u32>],
    kind: CacheOptimizerKind,
    cache_size: usize,
) {
    for indices in section_indices.iter_mut() {
        *indices = optimize_index_buffer(kind, indices, cache_size);
    }

    let mut index_cache: Vec<Option<u32>> = vec![None; vertices.len()];
    let mut reordered: Vec<BuildVertex> = Vec::with_capacity(vertices.len());

    for indices in section_indices.iter_mut() {
        for index in indices.iter_mut() {
            let old = *index as usize;
            let new = match index_cache[old] {
                Some(new) => new,
                None => {
                    let new = reordered.len() as u32;
                    reordered.push(vertices[old]);
                    index_cache[old] = Some(new);
                    new
                }
            };
            *index = new;
        }
    }

    for entry in wedge_map.iter_mut() {
        if let Some(old) = *entry {
            *entry = index_cache.get(old as usize).copied().flatten();
        }
    }
    *vertices = reordered;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn grid_indices(size: u32) -> Vec<u32> {
        let row = size + 1;
        let mut indices = Vec::new();
        for j in 0..size {
            for i in 0..size {
                let v00 = j * row + i;
                indices.extend([v00, v00 + 1, v00 + row + 1, v00, v00 + row + 1, v00 + row]);
            }
        }
        indices
    }

    fn scrambled(indices: &[u32]) -> Vec<u32> {
        let num_tris = indices.len() / 3;
        let mut out = Vec::with_capacity(indices.len());
        for k in 0..num_tris {
            let tri = (k * 7919) % num_tris;
            out.extend_from_slice(&indices[tri * 3..tri * 3 + 3]);
        }
        out
    }

    fn sorted_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut tris: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        tris.sort_unstable();
        tris
    }

    #[test]
    fn test_forsyth_keeps_triangles() {
        let input = scrambled(&grid_indices(8));
        let output = forsyth_order(&input, 32);
        assert_eq!(output.len(), input.len());
        assert_eq!(sorted_triangles(&output), sorted_triangles(&input));
    }

    #[test]
    fn test_forsyth_emits_disconnected_triangles_once() {
        // Loose triangles leave the cache with nothing to offer after every
        // pick, interleaved with a connected patch.
        let mut input: Vec<u32> = (0..3000).collect();
        let base = input.len() as u32;
        input.extend(grid_indices(4).iter().map(|&i| base + i));
        input.extend(base + 25..base + 28);
        let input = scrambled(&input);

        let output = forsyth_order(&input, 32);
        assert_eq!(output.len(), input.len());
        assert_eq!(sorted_triangles(&output), sorted_triangles(&input));
    }

    #[test]
    fn test_forsyth_reduces_cache_misses() {
        let input = scrambled(&grid_indices(24));
        let output = forsyth_order(&input, 32);
        assert!(cache_miss_ratio(&output, 32) < cache_miss_ratio(&input, 32));
    }

    #[test]
    fn test_strip_keeps_triangles() {
        let input = scrambled(&grid_indices(6));
        let output = strip_order(&input);
        assert_eq!(sorted_triangles(&output), sorted_triangles(&input));
    }

    #[test]
    fn test_strip_walks_neighbors() {
        // Two triangles sharing edge 1-2, listed apart with a stray in between.
        let input = [0, 1, 2, 10, 11, 12, 2, 1, 3];
        let output = strip_order(&input);
        assert_eq!(output, vec![0, 1, 2, 2, 1, 3, 10, 11, 12]);
    }

    #[test]
    fn test_empty_input() {
        assert!(forsyth_order(&[], 32).is_empty());
        assert!(strip_order(&[]).is_empty());
        assert_eq!(cache_miss_ratio(&[], 32), 0.0);
    }

    #[test]
    fn test_optimizer_kind_parsing() {
        assert_eq!("forsyth".parse::<CacheOptimizerKind>(), Ok(CacheOptimizerKind::Forsyth));
        assert_eq!("Strip".parse::<CacheOptimizerKind>(), Ok(CacheOptimizerKind::Strip));
        assert!("nvtristrip".parse::<CacheOptimizerKind>().is_err());
        assert_eq!(CacheOptimizerKind::Strip.to_string(), "strip");
    }

    fn tagged_vertices(count: usize) -> Vec<BuildVertex> {
        (0..count)
            .map(|i| BuildVertex {
                position: Vec3::new(i as f32, 0.0, 0.0),
                ..Default::default()
            })
            .collect()
    }

    fn section_pairs(vertices: &[BuildVertex], sections: &[Vec<u32>]) -> Vec<(usize, u32)> {
        let mut pairs: Vec<(usize, u32)> = sections
            .iter()
            .enumerate()
            .flat_map(|(s, indices)| indices.iter().map(move |&i| (s, vertices[i as usize].position.x as u32)))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn test_vertex_renumbering() {
        for kind in [CacheOptimizerKind::Forsyth, CacheOptimizerKind::Strip] {
            let grid = grid_indices(4);
            let (a, b) = grid.split_at(grid.len() / 2);
            let mut sections = vec![scrambled(b), scrambled(a)];
            // Vertex 25 is never referenced.
            let mut vertices = tagged_vertices(26);
            let mut wedge_map: Vec<Option<u32>> = vec![Some(0), Some(24), None, Some(12)];

            let before = section_pairs(&vertices, &sections);
            let old_map: Vec<Option<u32>> = wedge_map.clone();
            let old_vertices = vertices.clone();

            cache_optimize_vertex_and_index_buffer(&mut vertices, &mut sections, &mut wedge_map, kind, 32);

            assert_eq!(section_pairs(&vertices, &sections), before);
            assert_eq!(vertices.len(), 25);

            // New indices appear in increasing first-use order.
            let mut next = 0;
            for &index in sections.iter().flatten() {
                assert!(index <= next);
                if index == next {
                    next += 1;
                }
            }

            for (new, old) in wedge_map.iter().zip(&old_map) {
                match (new, old) {
                    (Some(n), Some(o)) => assert_eq!(vertices[*n as usize], old_vertices[*o as usize]),
                    (None, None) => {}
                    _ => panic!("wedge map entry changed presence"),
                }
            }
        }
    }
}
