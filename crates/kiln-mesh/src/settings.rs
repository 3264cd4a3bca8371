//! Build settings
//!
//! Per-LOD mesh build settings and pipeline-wide configuration.

use bitflags::bitflags;
use glam::Vec3;
use kiln_core::math::THRESH_POINTS_ARE_SAME;
use serde::{Deserialize, Serialize};

use crate::cache::CacheOptimizerKind;

bitflags! {
    /// Options for the tangent space stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TangentOptions: u32 {
        /// Faces blend normals across any spatially overlapping corner, not
        /// only corners that reference the same vertex index
        const BLEND_OVERLAPPING_NORMALS = 0x1;
        /// Degenerate triangles are detected with a tolerance and contribute nothing
        const IGNORE_DEGENERATE_TRIANGLES = 0x2;
    }
}

/// Settings applied when building one LOD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshBuildSettings {
    /// Recompute normals even if the raw mesh has them
    pub recompute_normals: bool,
    /// Recompute tangents even if the raw mesh has them
    pub recompute_tangents: bool,
    /// Detect coincident points with a tolerance and drop degenerate triangles
    pub remove_degenerates: bool,
    /// Hand tangent generation to the pluggable tangent space solver
    pub use_tangent_solver: bool,
    /// Build the tessellation adjacency index buffer
    pub build_adjacency_buffer: bool,
    /// Build reversed index buffers for mirrored transforms
    pub build_reversed_index_buffer: bool,
    /// Pack lightmap UVs before welding
    pub generate_lightmap_uvs: bool,
    /// UV channel the lightmap packer reads from
    pub src_lightmap_index: usize,
    /// UV channel the lightmap packer writes to
    pub dst_lightmap_index: usize,
    /// Lightmap resolution the packer targets
    pub min_lightmap_resolution: u32,
    /// Local scale applied to positions while welding
    pub build_scale_3d: Vec3,
}

impl Default for MeshBuildSettings {
    fn default() -> Self {
        Self {
            recompute_normals: true,
            recompute_tangents: true,
            remove_degenerates: true,
            use_tangent_solver: true,
            build_adjacency_buffer: true,
            build_reversed_index_buffer: true,
            generate_lightmap_uvs: true,
            src_lightmap_index: 0,
            dst_lightmap_index: 1,
            min_lightmap_resolution: 64,
            build_scale_3d: Vec3::ONE,
        }
    }
}

impl MeshBuildSettings {
    /// Position tolerance used by overlap detection and degenerate checks
    pub fn comparison_threshold(&self) -> f32 {
        if self.remove_degenerates {
            THRESH_POINTS_ARE_SAME
        } else {
            0.0
        }
    }

    /// Tangent stage options implied by these settings. Static meshes always
    /// blend normals across overlapping corners.
    pub fn tangent_options(&self) -> TangentOptions {
        let mut options = TangentOptions::BLEND_OVERLAPPING_NORMALS;
        if self.remove_degenerates {
            options |= TangentOptions::IGNORE_DEGENERATE_TRIANGLES;
        }
        options
    }
}

/// Pipeline-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Index reordering strategy
    pub cache_optimizer: CacheOptimizerKind,
    /// Post-transform cache size targeted by the greedy optimizer
    pub cache_size: usize,
    /// Meshes with this many wedges or more skip vertex/index cache optimization
    pub max_cache_optimize_wedges: usize,
    /// Depth-only index buffers with this many indices or more are not re-optimized
    pub max_depth_only_optimize_indices: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_optimizer: CacheOptimizerKind::Forsyth,
            cache_size: 32,
            max_cache_optimize_wedges: 100_000 * 3,
            max_depth_only_optimize_indices: 50_000 * 3,
        }
    }
}
