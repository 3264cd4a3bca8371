//! LOD orchestration
//!
//! Drives every stage of the pipeline for each LOD in two passes:
//! - **Gather**: decode and validate each source model, detect overlapping
//!   corners, fill in normals and tangents, pack lightmap UVs
//! - **Generate**: weld, cache-optimize, assemble sections and build the
//!   derived index buffers, then compute bounds from LOD0
//!
//! An invalid or undecodable LOD0 fails the build. Any other LOD that fails
//! is skipped with a warning and the remaining LODs shift down.

use glam::{Vec2, Vec3};
use kiln_core::diagnostics::{Diagnostics, LogDiagnostics};
use kiln_core::math::KINDA_SMALL_NUMBER;

use crate::adjacency::{AdjacencyBuilder, PnAenAdjacency};
use crate::bulk_data::RawMeshBulkData;
use crate::cache::cache_optimize_vertex_and_index_buffer;
use crate::derived::{
    compute_bounds, depth_only_index_buffer, reversed_depth_only_index_buffer, reversed_index_buffer,
    wireframe_index_buffer,
};
use crate::lightmap::{ChannelCopyPacker, LightmapPacker};
use crate::overlap::{find_overlapping_corners, OverlapMap};
use crate::raw_mesh::{RawMesh, MAX_TEXTURE_COORDS};
use crate::render_data::{
    ColorVertexBuffer, IndexBufferStride, LodResources, PositionVertexBuffer, RawIndexBuffer,
    StaticMeshRenderData, StaticMeshSection, StaticMeshVertexBuffer,
};
use crate::section::MeshSectionInfoMap;
use crate::settings::{MeshBuildSettings, PipelineConfig};
use crate::tangent_solver::{TangentSpaceSolver, UvGradientSolver};
use crate::tangents::{compute_tangents, compute_tangents_with_solver};
use crate::weld::{build_vertex_and_index_buffers, material_section_map};
use crate::{MeshBuildError, MeshResult};

/// One LOD's source geometry and how to build it
#[derive(Debug, Clone, Default)]
pub struct StaticMeshSourceModel {
    pub raw_mesh: RawMeshBulkData,
    pub build_settings: MeshBuildSettings,
    pub screen_size: f32,
}

impl StaticMeshSourceModel {
    /// Store `mesh` with the given settings
    pub fn new(mesh: &RawMesh, build_settings: MeshBuildSettings) -> MeshResult<Self> {
        Ok(Self {
            raw_mesh: RawMeshBulkData::from_raw_mesh(mesh)?,
            build_settings,
            screen_size: 1.0,
        })
    }

    pub fn with_screen_size(mut self, screen_size: f32) -> Self {
        self.screen_size = screen_size;
        self
    }
}

/// Strategies for the stages handled outside the core pipeline
pub struct BuildCollaborators {
    pub tangent_solver: Box<dyn TangentSpaceSolver>,
    pub lightmap_packer: Box<dyn LightmapPacker>,
    pub adjacency_builder: Box<dyn AdjacencyBuilder>,
}

impl Default for BuildCollaborators {
    fn default() -> Self {
        Self {
            tangent_solver: Box::new(UvGradientSolver),
            lightmap_packer: Box::new(ChannelCopyPacker),
            adjacency_builder: Box::new(PnAenAdjacency),
        }
    }
}

/// Progress of a [`StaticMeshBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Uninitialized,
    Gathered,
    RenderingGenerated,
}

/// Scratch state of one gathered LOD
struct GatheredLod {
    source_index: usize,
    raw_mesh: RawMesh,
    overlaps: OverlapMap,
    settings: MeshBuildSettings,
    screen_size: f32,
}

/// Two-pass static mesh builder
pub struct StaticMeshBuilder<'a> {
    config: PipelineConfig,
    collaborators: BuildCollaborators,
    diagnostics: &'a mut dyn Diagnostics,
    stage: BuildStage,
    lods: Vec<GatheredLod>,
}

impl<'a> StaticMeshBuilder<'a> {
    pub fn new(config: PipelineConfig, collaborators: BuildCollaborators, diagnostics: &'a mut dyn Diagnostics) -> Self {
        Self {
            config,
            collaborators,
            diagnostics,
            stage: BuildStage::Uninitialized,
            lods: Vec::new(),
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Number of LODs that survived gathering
    pub fn num_gathered_lods(&self) -> usize {
        self.lods.len()
    }

    /// Run both passes
    pub fn build(
        &mut self,
        source_models: &[StaticMeshSourceModel],
        section_info: &MeshSectionInfoMap,
    ) -> MeshResult<StaticMeshRenderData> {
        self.gather_source_meshes(source_models)?;
        self.generate_render_data(section_info)
    }

    /// Decode, validate and prepare every source model
    pub fn gather_source_meshes(&mut self, source_models: &[StaticMeshSourceModel]) -> MeshResult<()> {
        self.lods.clear();
        self.stage = BuildStage::Uninitialized;

        for (lod, model) in source_models.iter().enumerate() {
            match self.gather_lod(lod, model) {
                Ok(Some(gathered)) => self.lods.push(gathered),
                Ok(None) => {}
                Err(err) if lod == 0 => {
                    self.diagnostics.error(&format!("LOD0: {err}"));
                    return Err(err);
                }
                Err(err) => {
                    self.diagnostics.warn(&format!("Skipping LOD{lod}: {err}"));
                }
            }
        }

        match self.lods.first() {
            Some(base) if base.source_index == 0 && base.raw_mesh.num_wedges() > 0 => {}
            Some(_) => return Err(MeshBuildError::EmptyBaseLod),
            None => return Err(MeshBuildError::MissingBaseLod),
        }

        self.stage = BuildStage::Gathered;
        Ok(())
    }

    fn gather_lod(&mut self, lod: usize, model: &StaticMeshSourceModel) -> MeshResult<Option<GatheredLod>> {
        if model.raw_mesh.is_empty() {
            if lod == 0 {
                return Err(MeshBuildError::MissingBaseLod);
            }
            self.diagnostics.log(&format!("LOD{lod} has no source mesh"));
            return Ok(None);
        }

        let mut raw_mesh = model.raw_mesh.load_raw_mesh()?;
        if raw_mesh.num_wedges() == 0 {
            if lod == 0 {
                return Err(MeshBuildError::EmptyBaseLod);
            }
            self.diagnostics.log(&format!("LOD{lod} source mesh is empty"));
            return Ok(None);
        }
        if !raw_mesh.is_valid_or_fixable() {
            return Err(MeshBuildError::InvalidRawMesh { lod });
        }
        raw_mesh.compact_material_indices();

        let settings = &model.build_settings;
        let overlaps = find_overlapping_corners(
            &raw_mesh.vertex_positions,
            &raw_mesh.wedge_indices,
            settings.comparison_threshold(),
        );

        let num_wedges = raw_mesh.num_wedges();
        let recompute_normals = settings.recompute_normals || raw_mesh.wedge_tangent_z.len() != num_wedges;
        let recompute_tangents = settings.recompute_tangents
            || raw_mesh.wedge_tangent_x.len() != num_wedges
            || raw_mesh.wedge_tangent_y.len() != num_wedges;

        if recompute_normals {
            raw_mesh.wedge_tangent_z = vec![Vec3::ZERO; num_wedges];
        }
        if recompute_tangents {
            raw_mesh.wedge_tangent_x = vec![Vec3::ZERO; num_wedges];
            raw_mesh.wedge_tangent_y = vec![Vec3::ZERO; num_wedges];
        }

        let options = settings.tangent_options();
        if settings.use_tangent_solver && (recompute_normals || recompute_tangents) {
            compute_tangents_with_solver(
                &mut raw_mesh,
                &overlaps,
                options,
                self.collaborators.tangent_solver.as_mut(),
                &mut *self.diagnostics,
            );
        } else {
            compute_tangents(&mut raw_mesh, &overlaps, options);
        }

        if settings.generate_lightmap_uvs {
            let requested = settings.src_lightmap_index.min(MAX_TEXTURE_COORDS - 1);
            let src = if raw_mesh.wedge_tex_coords[requested].is_empty() { 0 } else { requested };
            let packed = self.collaborators.lightmap_packer.pack(
                &mut raw_mesh,
                src,
                settings.dst_lightmap_index,
                settings.min_lightmap_resolution,
            );
            if !packed {
                self.diagnostics
                    .warn(&format!("LOD{lod}: lightmap UV packing failed, keeping existing UVs"));
            }
        }

        Ok(Some(GatheredLod {
            source_index: lod,
            raw_mesh,
            overlaps,
            settings: settings.clone(),
            screen_size: model.screen_size,
        }))
    }

    /// Build render buffers for every gathered LOD
    pub fn generate_render_data(&mut self, section_info: &MeshSectionInfoMap) -> MeshResult<StaticMeshRenderData> {
        if self.stage != BuildStage::Gathered {
            return Err(MeshBuildError::NotGathered);
        }

        let lods = std::mem::take(&mut self.lods);
        let mut render_data = StaticMeshRenderData::default();
        for (lod, gathered) in lods.iter().enumerate() {
            let resources = self.build_lod(lod, gathered, section_info);
            self.diagnostics.log(&format!(
                "LOD{lod}: {} wedges -> {} vertices, {} triangles, {} sections",
                gathered.raw_mesh.num_wedges(),
                resources.num_vertices(),
                resources.num_triangles(),
                resources.sections.len(),
            ));
            render_data.lod_resources.push(resources);
            render_data.screen_sizes.push(gathered.screen_size);
        }

        if let Some(base) = render_data.lod_resources.first() {
            render_data.bounds = compute_bounds(base.position_vertex_buffer.positions());
        }
        if let Some(base) = lods.first() {
            render_data.material_index_to_import_index = base.raw_mesh.material_index_to_import_index.clone();
        }

        self.stage = BuildStage::RenderingGenerated;
        Ok(render_data)
    }

    fn build_lod(&mut self, lod: usize, gathered: &GatheredLod, section_info: &MeshSectionInfoMap) -> LodResources {
        let raw_mesh = &gathered.raw_mesh;
        let settings = &gathered.settings;
        let material_to_section = material_section_map(raw_mesh);

        let mut weld = build_vertex_and_index_buffers(
            raw_mesh,
            &gathered.overlaps,
            &material_to_section,
            KINDA_SMALL_NUMBER,
            settings.build_scale_3d,
        );

        if raw_mesh.num_wedges() < self.config.max_cache_optimize_wedges {
            cache_optimize_vertex_and_index_buffer(
                &mut weld.vertices,
                &mut weld.section_indices,
                &mut weld.wedge_map,
                self.config.cache_optimizer,
                self.config.cache_size,
            );
        }

        let mut indices: Vec<u32> = Vec::with_capacity(weld.num_triangles() * 3);
        let mut sections = Vec::with_capacity(material_to_section.len());
        for (&material_index, &section_index) in &material_to_section {
            let section_indices = &weld.section_indices[section_index];
            let info = section_info.get(lod, section_index);
            sections.push(StaticMeshSection {
                material_index,
                first_index: indices.len() as u32,
                num_triangles: (section_indices.len() / 3) as u32,
                min_vertex_index: section_indices.iter().copied().min().unwrap_or(0),
                max_vertex_index: section_indices.iter().copied().max().unwrap_or(0),
                enable_collision: info.enable_collision,
                cast_shadow: info.cast_shadow,
            });
            indices.extend_from_slice(section_indices);
        }

        let index_buffer = RawIndexBuffer::from_indices(&indices, IndexBufferStride::AutoDetect);
        let stride = if index_buffer.is_32bit() {
            IndexBufferStride::Force32Bit
        } else {
            IndexBufferStride::Force16Bit
        };

        let positions: Vec<Vec3> = weld.vertices.iter().map(|v| v.position).collect();
        let mut resources = LodResources {
            position_vertex_buffer: PositionVertexBuffer::init_from(&weld.vertices),
            vertex_buffer: StaticMeshVertexBuffer::init_from(&weld.vertices, raw_mesh.num_tex_coords()),
            color_vertex_buffer: ColorVertexBuffer::init_from(&weld.vertices),
            ..Default::default()
        };

        if settings.build_reversed_index_buffer {
            resources.reversed_index_buffer =
                RawIndexBuffer::from_indices(&reversed_index_buffer(&indices, &sections), stride);
        }

        let depth_only = depth_only_index_buffer(
            &positions,
            &indices,
            &sections,
            self.config.cache_optimizer,
            self.config.cache_size,
            self.config.max_depth_only_optimize_indices,
        );
        if settings.build_reversed_index_buffer {
            resources.reversed_depth_only_index_buffer = RawIndexBuffer::from_indices(
                &reversed_depth_only_index_buffer(&depth_only),
                IndexBufferStride::AutoDetect,
            );
        }
        resources.depth_only_index_buffer = RawIndexBuffer::from_indices(&depth_only, IndexBufferStride::AutoDetect);

        resources.wireframe_index_buffer =
            RawIndexBuffer::from_indices(&wireframe_index_buffer(&positions, &indices), IndexBufferStride::AutoDetect);

        if settings.build_adjacency_buffer {
            let uvs: Vec<Vec2> = weld.vertices.iter().map(|v| v.uvs[0]).collect();
            let adjacency = self
                .collaborators
                .adjacency_builder
                .build_adjacency(&positions, &uvs, &indices);
            resources.adjacency_index_buffer = RawIndexBuffer::from_indices(&adjacency, stride);
        }

        resources.index_buffer = index_buffer;
        resources.sections = sections;
        resources.wedge_map = weld.wedge_map;
        resources
    }
}

/// Build render data with the built-in collaborators
pub fn build_static_mesh(
    source_models: &[StaticMeshSourceModel],
    section_info: &MeshSectionInfoMap,
    config: &PipelineConfig,
    diagnostics: &mut dyn Diagnostics,
) -> MeshResult<StaticMeshRenderData> {
    let mut builder = StaticMeshBuilder::new(config.clone(), BuildCollaborators::default(), diagnostics);
    builder.build(source_models, section_info)
}

/// [`build_static_mesh`] reporting through the `log` crate
pub fn build_static_mesh_logged(
    source_models: &[StaticMeshSourceModel],
    section_info: &MeshSectionInfoMap,
    config: &PipelineConfig,
) -> MeshResult<StaticMeshRenderData> {
    build_static_mesh(source_models, section_info, config, &mut LogDiagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptimizerKind;
    use crate::primitives;
    use crate::section::MeshSectionInfo;
    use kiln_core::diagnostics::CollectingDiagnostics;

    fn cube_model() -> StaticMeshSourceModel {
        StaticMeshSourceModel::new(&primitives::unit_cube(), MeshBuildSettings::default()).unwrap()
    }

    fn build(models: &[StaticMeshSourceModel], diag: &mut CollectingDiagnostics) -> MeshResult<StaticMeshRenderData> {
        build_static_mesh(models, &MeshSectionInfoMap::new(), &PipelineConfig::default(), diag)
    }

    #[test]
    fn test_build_cube() {
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[cube_model()], &mut diag).unwrap();
        assert_eq!(data.num_lods(), 1);

        let lod = &data.lod_resources[0];
        assert_eq!(lod.num_vertices(), 24);
        assert_eq!(lod.num_triangles(), 12);
        assert_eq!(lod.index_buffer.num_indices(), 36);
        assert!(!lod.index_buffer.is_32bit());
        assert_eq!(lod.reversed_index_buffer.num_indices(), 36);
        assert_eq!(lod.reversed_depth_only_index_buffer.num_indices(), 36);
        assert_eq!(lod.wireframe_index_buffer.num_indices(), 36);
        assert_eq!(lod.adjacency_index_buffer.num_indices(), 12 * 12);
        assert_eq!(lod.wedge_map.len(), 36);
        assert!(lod.wedge_map.iter().all(|v| v.is_some()));

        let depth = lod.depth_only_index_buffer.to_vec();
        assert_eq!(depth.len(), 36);
        let mut distinct = depth.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 8);

        assert_eq!(data.bounds.origin, Vec3::ZERO);
        assert_eq!(data.bounds.box_extent, Vec3::splat(0.5));
        assert!((data.bounds.sphere_radius - 0.75f32.sqrt()).abs() < 1.0e-6);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[cube_model()], &mut diag).unwrap();
        let lod = &data.lod_resources[0];
        for v in 0..lod.num_vertices() {
            let position = lod.position_vertex_buffer.position(v);
            let normal = lod.vertex_buffer.tangent_z(v);
            assert!(normal.dot(position) > 0.0);
        }
    }

    #[test]
    fn test_builder_stages() {
        let mut diag = CollectingDiagnostics::new();
        let mut builder = StaticMeshBuilder::new(PipelineConfig::default(), BuildCollaborators::default(), &mut diag);
        assert_eq!(builder.stage(), BuildStage::Uninitialized);
        assert!(matches!(
            builder.generate_render_data(&MeshSectionInfoMap::new()),
            Err(MeshBuildError::NotGathered)
        ));

        builder.gather_source_meshes(&[cube_model()]).unwrap();
        assert_eq!(builder.stage(), BuildStage::Gathered);
        assert_eq!(builder.num_gathered_lods(), 1);

        builder.generate_render_data(&MeshSectionInfoMap::new()).unwrap();
        assert_eq!(builder.stage(), BuildStage::RenderingGenerated);
        assert!(matches!(
            builder.generate_render_data(&MeshSectionInfoMap::new()),
            Err(MeshBuildError::NotGathered)
        ));
    }

    #[test]
    fn test_invalid_extra_lod_is_skipped() {
        let mut broken = primitives::grid(2);
        broken.wedge_indices[4] = 1000;
        let broken_model = StaticMeshSourceModel::new(&broken, MeshBuildSettings::default()).unwrap();
        let grid_model = StaticMeshSourceModel::new(&primitives::grid(2), MeshBuildSettings::default())
            .unwrap()
            .with_screen_size(0.25);

        let mut diag = CollectingDiagnostics::new();
        let data = build(&[cube_model(), broken_model, grid_model], &mut diag).unwrap();

        assert_eq!(data.num_lods(), 2);
        assert_eq!(data.lod_resources[1].num_triangles(), 8);
        assert_eq!(data.screen_sizes, vec![1.0, 0.25]);
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.of(kiln_core::Severity::Warning).any(|m| m.contains("LOD1")));
    }

    #[test]
    fn test_invalid_base_lod_fails() {
        let mut broken = primitives::unit_cube();
        broken.face_smoothing_masks.pop();
        let model = StaticMeshSourceModel::new(&broken, MeshBuildSettings::default()).unwrap();

        let mut diag = CollectingDiagnostics::new();
        let result = build(&[model, cube_model()], &mut diag);
        assert!(matches!(result, Err(MeshBuildError::InvalidRawMesh { lod: 0 })));
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_missing_and_empty_base_lod() {
        let mut diag = CollectingDiagnostics::new();
        assert!(matches!(build(&[], &mut diag), Err(MeshBuildError::MissingBaseLod)));

        let missing = StaticMeshSourceModel::default();
        assert!(matches!(
            build(&[missing, cube_model()], &mut diag),
            Err(MeshBuildError::MissingBaseLod)
        ));

        let empty = StaticMeshSourceModel::new(&RawMesh::new(), MeshBuildSettings::default()).unwrap();
        assert!(matches!(build(&[empty], &mut diag), Err(MeshBuildError::EmptyBaseLod)));
    }

    #[test]
    fn test_empty_extra_lod_is_skipped_quietly() {
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[cube_model(), StaticMeshSourceModel::default()], &mut diag).unwrap();
        assert_eq!(data.num_lods(), 1);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_optional_buffers_follow_settings() {
        let settings = MeshBuildSettings {
            build_reversed_index_buffer: false,
            build_adjacency_buffer: false,
            ..Default::default()
        };
        let model = StaticMeshSourceModel::new(&primitives::unit_cube(), settings).unwrap();
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[model], &mut diag).unwrap();

        let lod = &data.lod_resources[0];
        assert!(lod.reversed_index_buffer.is_empty());
        assert!(lod.reversed_depth_only_index_buffer.is_empty());
        assert!(lod.adjacency_index_buffer.is_empty());
        assert_eq!(lod.depth_only_index_buffer.num_indices(), 36);
    }

    #[test]
    fn test_sections_and_section_info() {
        let mut cube = primitives::unit_cube();
        // Alternate sides between materials 5 and 2.
        cube.face_material_indices = (0..12).map(|face| if (face / 2) % 2 == 0 { 5 } else { 2 }).collect();
        let model = StaticMeshSourceModel::new(&cube, MeshBuildSettings::default()).unwrap();

        let mut section_info = MeshSectionInfoMap::new();
        section_info.set(
            0,
            1,
            MeshSectionInfo {
                material_index: 2,
                enable_collision: false,
                cast_shadow: true,
            },
        );

        let mut diag = CollectingDiagnostics::new();
        let data = build_static_mesh(&[model], &section_info, &PipelineConfig::default(), &mut diag).unwrap();
        let sections = &data.lod_resources[0].sections;

        // Materials are compacted: 2 becomes 0 and 5 becomes 1.
        assert_eq!(data.material_index_to_import_index, vec![2, 5]);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].material_index, 1);
        assert_eq!(sections[1].material_index, 0);
        assert_eq!(sections[0].first_index, 0);
        assert_eq!(sections[1].first_index, 18);
        assert_eq!(sections[0].num_triangles, 6);
        assert!(sections[0].enable_collision);
        assert!(!sections[1].enable_collision);

        // Section 0's vertices are numbered first.
        assert_eq!(sections[0].min_vertex_index, 0);
        assert_eq!(sections[0].max_vertex_index, 11);
        assert_eq!(sections[1].min_vertex_index, 12);
        assert_eq!(sections[1].max_vertex_index, 23);
    }

    #[test]
    fn test_dense_materials_are_not_remapped() {
        let mut grid = primitives::grid(2);
        grid.face_material_indices = vec![1, 1, 0, 0, 1, 1, 0, 0];
        let model = StaticMeshSourceModel::new(&grid, MeshBuildSettings::default()).unwrap();

        let mut diag = CollectingDiagnostics::new();
        let data = build(&[model], &mut diag).unwrap();
        assert!(data.material_index_to_import_index.is_empty());
        let materials: Vec<u32> = data.lod_resources[0].sections.iter().map(|s| s.material_index).collect();
        assert_eq!(materials, vec![1, 0]);
    }

    #[test]
    fn test_reversed_buffer_flips_each_section() {
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[cube_model()], &mut diag).unwrap();
        let lod = &data.lod_resources[0];
        let forward = lod.index_buffer.to_vec();
        let reversed = lod.reversed_index_buffer.to_vec();

        for section in &lod.sections {
            let range = section.index_range();
            let mut expected = forward[range.clone()].to_vec();
            expected.reverse();
            assert_eq!(&reversed[range], expected.as_slice());
        }
    }

    #[test]
    fn test_builtin_tangents_without_solver() {
        let settings = MeshBuildSettings {
            use_tangent_solver: false,
            ..Default::default()
        };
        let model = StaticMeshSourceModel::new(&primitives::grid(3), settings).unwrap();
        let mut diag = CollectingDiagnostics::new();
        let data = build(&[model], &mut diag).unwrap();

        let lod = &data.lod_resources[0];
        assert_eq!(lod.num_vertices(), 16);
        for v in 0..lod.num_vertices() {
            assert!((lod.vertex_buffer.tangent_z(v) - Vec3::Z).length() < 0.01);
            assert!((lod.vertex_buffer.tangent_x(v) - Vec3::X).length() < 0.01);
        }
    }

    #[test]
    fn test_strip_optimizer_builds_same_geometry() {
        let config = PipelineConfig {
            cache_optimizer: CacheOptimizerKind::Strip,
            ..Default::default()
        };
        let mut diag = CollectingDiagnostics::new();
        let data = build_static_mesh(&[cube_model()], &MeshSectionInfoMap::new(), &config, &mut diag).unwrap();
        assert_eq!(data.lod_resources[0].num_vertices(), 24);
        assert_eq!(data.lod_resources[0].num_triangles(), 12);
    }

    /// Raw mesh with one wedge per index of an already built LOD
    fn raw_mesh_from_lod(lod: &LodResources) -> RawMesh {
        let mut mesh = RawMesh::new();
        mesh.vertex_positions = lod.position_vertex_buffer.positions().collect();
        for section in &lod.sections {
            for triangle in 0..section.num_triangles as usize {
                mesh.face_material_indices.push(section.material_index);
                mesh.face_smoothing_masks.push(1);
                for corner in 0..3 {
                    let index = lod.index_buffer.get(section.first_index as usize + triangle * 3 + corner);
                    let v = index as usize;
                    mesh.wedge_indices.push(index);
                    mesh.wedge_tangent_x.push(lod.vertex_buffer.tangent_x(v));
                    mesh.wedge_tangent_y.push(lod.vertex_buffer.tangent_y(v));
                    mesh.wedge_tangent_z.push(lod.vertex_buffer.tangent_z(v));
                    for channel in 0..lod.vertex_buffer.num_tex_coords() {
                        mesh.wedge_tex_coords[channel].push(lod.vertex_buffer.uv(v, channel));
                    }
                }
            }
        }
        mesh
    }

    #[test]
    fn test_rebuilding_welded_mesh_is_stable() {
        let mut diag = CollectingDiagnostics::new();
        let first = build(&[cube_model()], &mut diag).unwrap();
        let lod = &first.lod_resources[0];

        let settings = MeshBuildSettings {
            recompute_normals: false,
            recompute_tangents: false,
            generate_lightmap_uvs: false,
            ..Default::default()
        };
        let model = StaticMeshSourceModel::new(&raw_mesh_from_lod(lod), settings).unwrap();
        let second = build(&[model], &mut diag).unwrap();
        let relod = &second.lod_resources[0];

        assert_eq!(relod.num_vertices(), lod.num_vertices());
        let partition = |l: &LodResources| -> Vec<(u32, u32)> {
            l.sections.iter().map(|s| (s.material_index, s.num_triangles)).collect()
        };
        assert_eq!(partition(relod), partition(lod));
    }
}
