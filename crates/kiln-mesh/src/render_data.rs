//! GPU-ready render data
//!
//! Per-LOD vertex and index buffers laid out for direct upload, the section
//! table, and the mesh bounds.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use kiln_core::math::{basis_determinant_sign, BoxSphereBounds};
use serde::{Deserialize, Serialize};

use crate::raw_mesh::Color;
use crate::weld::BuildVertex;

/// Number of UV channels kept in the render vertex buffer
pub const MAX_STATIC_TEXCOORDS: usize = 2;

/// Unit vector packed into 4 unsigned bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PackedNormal {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub w: u8,
}

fn pack_component(value: f32) -> u8 {
    (value * 127.5 + 127.5).trunc().clamp(0.0, 255.0) as u8
}

fn unpack_component(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

impl PackedNormal {
    /// Pack a vector with `w` set to the +1 encoding
    pub fn new(v: Vec3) -> Self {
        Self::with_w(v, 1.0)
    }

    /// Pack a vector and a signed scalar in `w`
    pub fn with_w(v: Vec3, w: f32) -> Self {
        Self {
            x: pack_component(v.x),
            y: pack_component(v.y),
            z: pack_component(v.z),
            w: pack_component(w),
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(unpack_component(self.x), unpack_component(self.y), unpack_component(self.z))
    }

    /// Sign stored in `w`
    pub fn w_sign(self) -> f32 {
        if unpack_component(self.w) < 0.0 { -1.0 } else { 1.0 }
    }
}

/// Tightly packed vertex positions
#[derive(Debug, Clone, Default)]
pub struct PositionVertexBuffer {
    positions: Vec<[f32; 3]>,
}

impl PositionVertexBuffer {
    pub fn init_from(vertices: &[BuildVertex]) -> Self {
        Self {
            positions: vertices.iter().map(|v| v.position.to_array()).collect(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from_array(self.positions[index])
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + Clone + '_ {
        self.positions.iter().map(|&p| Vec3::from_array(p))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }
}

/// Tangent frame and UVs of one render vertex
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct TangentUvVertex {
    pub tangent_x: PackedNormal,
    /// Normal; `w` holds the sign of the tangent basis determinant
    pub tangent_z: PackedNormal,
    pub uvs: [[f32; 2]; MAX_STATIC_TEXCOORDS],
}

/// Tangent frames and UVs
#[derive(Debug, Clone, Default)]
pub struct StaticMeshVertexBuffer {
    vertices: Vec<TangentUvVertex>,
    num_tex_coords: usize,
}

impl StaticMeshVertexBuffer {
    /// Pack build vertices, keeping the first `num_tex_coords` UV channels
    pub fn init_from(vertices: &[BuildVertex], num_tex_coords: usize) -> Self {
        let num_tex_coords = num_tex_coords.clamp(1, MAX_STATIC_TEXCOORDS);
        let vertices = vertices
            .iter()
            .map(|v| {
                let sign = basis_determinant_sign(v.tangent_x, v.tangent_y, v.tangent_z);
                let mut uvs = [[0.0; 2]; MAX_STATIC_TEXCOORDS];
                for (dst, src) in uvs.iter_mut().zip(&v.uvs).take(num_tex_coords) {
                    *dst = src.to_array();
                }
                TangentUvVertex {
                    tangent_x: PackedNormal::new(v.tangent_x),
                    tangent_z: PackedNormal::with_w(v.tangent_z, sign),
                    uvs,
                }
            })
            .collect();
        Self { vertices, num_tex_coords }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_tex_coords(&self) -> usize {
        self.num_tex_coords
    }

    pub fn vertex(&self, index: usize) -> &TangentUvVertex {
        &self.vertices[index]
    }

    pub fn tangent_x(&self, index: usize) -> Vec3 {
        self.vertices[index].tangent_x.to_vec3()
    }

    pub fn tangent_z(&self, index: usize) -> Vec3 {
        self.vertices[index].tangent_z.to_vec3()
    }

    /// Bitangent rebuilt from the packed normal, tangent and handedness
    pub fn tangent_y(&self, index: usize) -> Vec3 {
        let vertex = &self.vertices[index];
        vertex.tangent_z.to_vec3().cross(vertex.tangent_x.to_vec3()) * vertex.tangent_z.w_sign()
    }

    pub fn uv(&self, index: usize, channel: usize) -> Vec2 {
        Vec2::from_array(self.vertices[index].uvs[channel])
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Per-vertex colors
#[derive(Debug, Clone, Default)]
pub struct ColorVertexBuffer {
    colors: Vec<Color>,
}

impl ColorVertexBuffer {
    pub fn init_from(vertices: &[BuildVertex]) -> Self {
        Self {
            colors: vertices.iter().map(|v| v.color).collect(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.colors.len()
    }

    pub fn color(&self, index: usize) -> Color {
        self.colors[index]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

/// Index width selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBufferStride {
    Force16Bit,
    Force32Bit,
    /// 32-bit only if some index does not fit in 16 bits
    #[default]
    AutoDetect,
}

#[derive(Debug, Clone)]
enum IndexStorage {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexStorage {
    fn default() -> Self {
        IndexStorage::U16(Vec::new())
    }
}

/// Index buffer stored as 16 or 32-bit indices
#[derive(Debug, Clone, Default)]
pub struct RawIndexBuffer {
    storage: IndexStorage,
}

impl RawIndexBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer from `indices` with the given width policy
    pub fn from_indices(indices: &[u32], stride: IndexBufferStride) -> Self {
        let mut buffer = Self::new();
        buffer.set_indices(indices, stride);
        buffer
    }

    /// Replace the contents. `Force16Bit` truncates indices that do not fit.
    pub fn set_indices(&mut self, indices: &[u32], stride: IndexBufferStride) {
        let use_32bit = match stride {
            IndexBufferStride::Force16Bit => false,
            IndexBufferStride::Force32Bit => true,
            IndexBufferStride::AutoDetect => indices.iter().any(|&i| i > u16::MAX as u32),
        };
        self.storage = if use_32bit {
            IndexStorage::U32(indices.to_vec())
        } else {
            IndexStorage::U16(indices.iter().map(|&i| i as u16).collect())
        };
    }

    pub fn num_indices(&self) -> usize {
        match &self.storage {
            IndexStorage::U16(v) => v.len(),
            IndexStorage::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_indices() == 0
    }

    pub fn is_32bit(&self) -> bool {
        matches!(self.storage, IndexStorage::U32(_))
    }

    pub fn get(&self, at: usize) -> u32 {
        match &self.storage {
            IndexStorage::U16(v) => v[at] as u32,
            IndexStorage::U32(v) => v[at],
        }
    }

    /// Indices widened to 32 bits
    pub fn to_vec(&self) -> Vec<u32> {
        match &self.storage {
            IndexStorage::U16(v) => v.iter().map(|&i| i as u32).collect(),
            IndexStorage::U32(v) => v.clone(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            IndexStorage::U16(v) => bytemuck::cast_slice(v),
            IndexStorage::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Contiguous index range drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticMeshSection {
    pub material_index: u32,
    pub first_index: u32,
    pub num_triangles: u32,
    pub min_vertex_index: u32,
    pub max_vertex_index: u32,
    pub enable_collision: bool,
    pub cast_shadow: bool,
}

impl StaticMeshSection {
    /// Index range of this section
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let first = self.first_index as usize;
        first..first + self.num_triangles as usize * 3
    }
}

/// Render buffers of one LOD
#[derive(Debug, Clone, Default)]
pub struct LodResources {
    pub position_vertex_buffer: PositionVertexBuffer,
    pub vertex_buffer: StaticMeshVertexBuffer,
    pub color_vertex_buffer: ColorVertexBuffer,
    pub index_buffer: RawIndexBuffer,
    pub reversed_index_buffer: RawIndexBuffer,
    pub depth_only_index_buffer: RawIndexBuffer,
    pub reversed_depth_only_index_buffer: RawIndexBuffer,
    pub wireframe_index_buffer: RawIndexBuffer,
    pub adjacency_index_buffer: RawIndexBuffer,
    pub sections: Vec<StaticMeshSection>,
    /// Unique vertex per raw mesh wedge
    pub wedge_map: Vec<Option<u32>>,
}

impl LodResources {
    pub fn num_vertices(&self) -> usize {
        self.position_vertex_buffer.num_vertices()
    }

    pub fn num_triangles(&self) -> usize {
        self.sections.iter().map(|s| s.num_triangles as usize).sum()
    }
}

/// Built render data for every LOD
#[derive(Debug, Clone, Default)]
pub struct StaticMeshRenderData {
    pub lod_resources: Vec<LodResources>,
    /// Screen size per LOD
    pub screen_sizes: Vec<f32>,
    pub bounds: BoxSphereBounds,
    /// Import-time material of each section material of the base LOD, empty
    /// when the source used every material it named
    pub material_index_to_import_index: Vec<u32>,
}

impl StaticMeshRenderData {
    pub fn num_lods(&self) -> usize {
        self.lod_resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_normal() {
        let packed = PackedNormal::new(Vec3::Z);
        assert_eq!((packed.x, packed.y, packed.z, packed.w), (127, 127, 255, 255));
        assert!((packed.to_vec3() - Vec3::Z).length() < 0.01);

        let negative = PackedNormal::with_w(-Vec3::X, -1.0);
        assert_eq!(negative.x, 0);
        assert_eq!(negative.w, 0);
        assert_eq!(negative.w_sign(), -1.0);
    }

    #[test]
    fn test_tangent_y_reconstruction() {
        let vertex = BuildVertex {
            tangent_x: Vec3::X,
            tangent_y: -Vec3::Y,
            tangent_z: Vec3::Z,
            ..Default::default()
        };
        let buffer = StaticMeshVertexBuffer::init_from(&[vertex], 1);
        assert!((buffer.tangent_y(0) + Vec3::Y).length() < 0.02);
        assert_eq!(buffer.as_bytes().len(), 24);
    }

    #[test]
    fn test_index_stride_auto_detect() {
        let small = RawIndexBuffer::from_indices(&[0, 1, 65535], IndexBufferStride::AutoDetect);
        assert!(!small.is_32bit());
        assert_eq!(small.as_bytes().len(), 6);

        let large = RawIndexBuffer::from_indices(&[0, 1, 65536], IndexBufferStride::AutoDetect);
        assert!(large.is_32bit());
        assert_eq!(large.get(2), 65536);
        assert_eq!(large.to_vec(), vec![0, 1, 65536]);
    }

    #[test]
    fn test_forced_strides() {
        let forced = RawIndexBuffer::from_indices(&[1, 2, 3], IndexBufferStride::Force32Bit);
        assert!(forced.is_32bit());
        assert_eq!(forced.as_bytes().len(), 12);

        let narrow = RawIndexBuffer::from_indices(&[1, 2, 3], IndexBufferStride::Force16Bit);
        assert!(!narrow.is_32bit());
        assert_eq!(narrow.num_indices(), 3);
    }

    #[test]
    fn test_section_range() {
        let section = StaticMeshSection {
            first_index: 6,
            num_triangles: 2,
            ..Default::default()
        };
        assert_eq!(section.index_range(), 6..12);
    }
}
