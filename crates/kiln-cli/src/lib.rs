//! # Kiln CLI
//!
//! Command-line interface for the Kiln static mesh pipeline.
//!
//! ## Commands
//! - `cube` - Write a unit cube raw mesh
//! - `grid` - Write a subdivided grid raw mesh
//! - `inspect` - Print raw mesh statistics
//! - `build` - Build render data from one raw mesh per LOD

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_core::diagnostics::LogDiagnostics;
use kiln_core::math::BoxSphereBounds;
use kiln_mesh::cache::{cache_miss_ratio, CacheOptimizerKind};
use kiln_mesh::{
    build_static_mesh, primitives, MeshBuildSettings, MeshSectionInfoMap, PipelineConfig, RawMesh, RawMeshBulkData,
    StaticMeshRenderData, StaticMeshSection, StaticMeshSourceModel,
};
use serde::Serialize;

/// Kiln asset pipeline CLI
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Write a unit cube raw mesh
    Cube {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a flat grid raw mesh
    Grid {
        /// Quads per side
        #[arg(short, long, default_value = "8")]
        size: u32,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print raw mesh statistics
    Inspect {
        /// Raw mesh file
        file: PathBuf,
    },

    /// Build render data, one raw mesh file per LOD
    Build {
        /// Raw mesh files, LOD0 first
        #[arg(required = true)]
        lods: Vec<PathBuf>,

        /// Build settings JSON applied to every LOD
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Cache optimizer (forsyth or strip)
        #[arg(short, long, default_value = "forsyth")]
        optimizer: CacheOptimizerKind,

        /// Write a JSON summary here
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

/// Per-LOD statistics of a build
#[derive(Debug, Serialize)]
pub struct LodSummary {
    pub lod: usize,
    pub num_vertices: usize,
    pub num_triangles: usize,
    pub index_bits: u32,
    pub depth_only_indices: usize,
    pub wireframe_indices: usize,
    pub adjacency_indices: usize,
    pub cache_miss_ratio: f32,
    pub sections: Vec<StaticMeshSection>,
}

/// Statistics of a whole build
#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub lods: Vec<LodSummary>,
    pub bounds: BoxSphereBounds,
}

/// Summarize built render data
pub fn summarize(render_data: &StaticMeshRenderData, cache_size: usize) -> BuildSummary {
    let lods = render_data
        .lod_resources
        .iter()
        .enumerate()
        .map(|(lod, resources)| LodSummary {
            lod,
            num_vertices: resources.num_vertices(),
            num_triangles: resources.num_triangles(),
            index_bits: if resources.index_buffer.is_32bit() { 32 } else { 16 },
            depth_only_indices: resources.depth_only_index_buffer.num_indices(),
            wireframe_indices: resources.wireframe_index_buffer.num_indices(),
            adjacency_indices: resources.adjacency_index_buffer.num_indices(),
            cache_miss_ratio: cache_miss_ratio(&resources.index_buffer.to_vec(), cache_size),
            sections: resources.sections.clone(),
        })
        .collect();

    BuildSummary {
        lods,
        bounds: render_data.bounds,
    }
}

/// Write a raw mesh as a bulk data file
pub fn write_raw_mesh(path: &Path, mesh: &RawMesh) -> Result<()> {
    let bulk = RawMeshBulkData::from_raw_mesh(mesh)?;
    fs::write(path, bulk.bytes()).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} ({} faces, id {})", path.display(), mesh.num_faces(), bulk.id_string());
    Ok(())
}

/// Read a bulk data file
pub fn read_bulk_data(path: &Path) -> Result<RawMeshBulkData> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(RawMeshBulkData::from_bytes(bytes))
}

/// Read build settings from JSON
pub fn load_settings(path: &Path) -> Result<MeshBuildSettings> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let settings = serde_json::from_str(&text).with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(settings)
}

/// Build render data from raw mesh files, LOD0 first
pub fn build_files(
    lods: &[PathBuf],
    settings: &MeshBuildSettings,
    config: &PipelineConfig,
) -> Result<StaticMeshRenderData> {
    let source_models = lods
        .iter()
        .enumerate()
        .map(|(lod, path)| {
            Ok(StaticMeshSourceModel {
                raw_mesh: read_bulk_data(path)?,
                build_settings: settings.clone(),
                screen_size: 0.5f32.powi(lod as i32),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let render_data = build_static_mesh(&source_models, &MeshSectionInfoMap::new(), config, &mut LogDiagnostics)?;
    Ok(render_data)
}

fn inspect(path: &Path) -> Result<()> {
    let bulk = read_bulk_data(path)?;
    let mesh = bulk.load_raw_mesh()?;

    log::info!("{} (id {})", path.display(), bulk.id_string());
    log::info!("  Vertices: {}", mesh.num_vertices());
    log::info!("  Faces: {}", mesh.num_faces());
    log::info!("  Wedges: {}", mesh.num_wedges());
    log::info!("  UV channels: {}", mesh.num_tex_coords());
    log::info!("  Has normals: {}", mesh.wedge_tangent_z.len() == mesh.num_wedges());
    log::info!("  Valid: {}", mesh.is_valid());
    log::info!("  Valid or fixable: {}", mesh.is_valid_or_fixable());
    Ok(())
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match cli.command {
        Commands::Cube { output } => {
            write_raw_mesh(&output, &primitives::unit_cube())?;
        }

        Commands::Grid { size, output } => {
            write_raw_mesh(&output, &primitives::grid(size))?;
        }

        Commands::Inspect { file } => {
            inspect(&file)?;
        }

        Commands::Build {
            lods,
            settings,
            optimizer,
            summary,
        } => {
            let settings = match settings {
                Some(path) => load_settings(&path)?,
                None => MeshBuildSettings::default(),
            };
            let config = PipelineConfig {
                cache_optimizer: optimizer,
                ..Default::default()
            };

            log::info!("Building {} LOD(s) with the {} optimizer...", lods.len(), optimizer);
            let render_data = build_files(&lods, &settings, &config)?;
            let report = summarize(&render_data, config.cache_size);

            for lod in &report.lods {
                log::info!(
                    "  LOD{}: {} vertices, {} triangles, {}-bit indices, ACMR {:.3}",
                    lod.lod,
                    lod.num_vertices,
                    lod.num_triangles,
                    lod.index_bits,
                    lod.cache_miss_ratio
                );
            }
            log::info!(
                "  Bounds: origin {:?}, extent {:?}, radius {:.4}",
                report.bounds.origin,
                report.bounds.box_extent,
                report.bounds.sphere_radius
            );

            if let Some(path) = summary {
                let json = serde_json::to_string_pretty(&report)?;
                fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("Summary written to {}", path.display());
            }
            log::info!("Build complete!");
        }
    }

    Ok(())
}
