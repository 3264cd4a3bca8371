//! # Kiln Mesh
//!
//! Static mesh geometry build pipeline for the Kiln asset pipeline.
//!
//! Turns an imported per-corner ("wedge") triangle soup into GPU-ready
//! per-LOD vertex and index buffers.
//!
//! ## Stages
//! - Overlap detection of spatially coincident wedges
//! - Tangent space synthesis with smoothing-group aware blending
//! - Vertex welding into a unique vertex buffer and per-section indices
//! - Vertex cache optimization
//! - Derived buffers: reversed, depth-only, wireframe, adjacency, bounds
//!
//! Everything runs single-threaded on the calling thread. Each LOD owns its
//! raw mesh copy and scratch maps for the duration of its build.

pub mod adjacency;
pub mod builder;
pub mod bulk_data;
pub mod cache;
pub mod derived;
pub mod lightmap;
pub mod overlap;
pub mod primitives;
pub mod raw_mesh;
pub mod render_data;
pub mod section;
pub mod settings;
pub mod tangent_solver;
pub mod tangents;
pub mod weld;

pub use builder::{build_static_mesh, BuildCollaborators, BuildStage, StaticMeshBuilder, StaticMeshSourceModel};
pub use bulk_data::RawMeshBulkData;
pub use cache::CacheOptimizerKind;
pub use overlap::OverlapMap;
pub use raw_mesh::{Color, RawMesh, MAX_TEXTURE_COORDS};
pub use render_data::{LodResources, StaticMeshRenderData, StaticMeshSection};
pub use section::{MeshSectionInfo, MeshSectionInfoMap};
pub use settings::{MeshBuildSettings, PipelineConfig, TangentOptions};
pub use weld::{BuildVertex, WeldOutput};

use thiserror::Error;

/// Mesh build errors
#[derive(Error, Debug)]
pub enum MeshBuildError {
    #[error("Raw mesh is corrupt for LOD{lod}")]
    InvalidRawMesh { lod: usize },

    #[error("No raw mesh data for the base LOD")]
    MissingBaseLod,

    #[error("Base LOD has no wedges")]
    EmptyBaseLod,

    #[error("Render data requested before source meshes were gathered")]
    NotGathered,

    #[error("Unsupported raw mesh version: {0}")]
    UnsupportedVersion(i32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for mesh build operations
pub type MeshResult<T> = Result<T, MeshBuildError>;
