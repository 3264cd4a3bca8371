//! Raw mesh data model
//!
//! Imported geometry stored at three frequencies:
//! - **Face**: one triangle, owns a material index and a smoothing mask
//! - **Wedge**: one corner of one face (`face * 3 + corner`), owns tangent
//!   basis, texture coordinates and color
//! - **Vertex**: a position shared by every wedge imported at that point
//!
//! Every per-wedge array is either empty (not provided / not yet computed) or
//! holds exactly one entry per wedge.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Number of texture coordinate channels a raw mesh can carry
pub const MAX_TEXTURE_COORDS: usize = 8;

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Create a color from components
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Imported triangle soup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    /// Material index per face
    pub face_material_indices: Vec<u32>,
    /// Smoothing group bitmask per face
    pub face_smoothing_masks: Vec<u32>,
    /// Position per vertex, in local space
    pub vertex_positions: Vec<Vec3>,
    /// Vertex index per wedge
    pub wedge_indices: Vec<u32>,
    /// U tangent per wedge
    pub wedge_tangent_x: Vec<Vec3>,
    /// V tangent per wedge
    pub wedge_tangent_y: Vec<Vec3>,
    /// Normal per wedge
    pub wedge_tangent_z: Vec<Vec3>,
    /// Texture coordinates, `[channel][wedge]`
    pub wedge_tex_coords: [Vec<Vec2>; MAX_TEXTURE_COORDS],
    /// Color per wedge
    pub wedge_colors: Vec<Color>,
    /// Compacted material index -> material index at import time.
    /// Empty means the two are identical.
    pub material_index_to_import_index: Vec<u32>,
}

fn array_size_ok<T>(array: &[T], expected: usize) -> bool {
    array.is_empty() || array.len() == expected
}

impl RawMesh {
    /// Create an empty raw mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every array
    pub fn empty(&mut self) {
        self.face_material_indices.clear();
        self.face_smoothing_masks.clear();
        self.vertex_positions.clear();
        self.wedge_indices.clear();
        self.wedge_tangent_x.clear();
        self.wedge_tangent_y.clear();
        self.wedge_tangent_z.clear();
        self.wedge_colors.clear();
        for channel in &mut self.wedge_tex_coords {
            channel.clear();
        }
        self.material_index_to_import_index.clear();
    }

    /// Number of wedges
    pub fn num_wedges(&self) -> usize {
        self.wedge_indices.len()
    }

    /// Number of triangles
    pub fn num_faces(&self) -> usize {
        self.wedge_indices.len() / 3
    }

    /// Number of vertex positions
    pub fn num_vertices(&self) -> usize {
        self.vertex_positions.len()
    }

    /// Number of leading texture coordinate channels with data
    pub fn num_tex_coords(&self) -> usize {
        self.wedge_tex_coords
            .iter()
            .take_while(|channel| !channel.is_empty())
            .count()
    }

    /// Position of a wedge
    #[inline]
    pub fn wedge_position(&self, wedge: usize) -> Vec3 {
        self.vertex_positions[self.wedge_indices[wedge] as usize]
    }

    /// Positions of the three corners of a face
    #[inline]
    pub fn face_positions(&self, face: usize) -> [Vec3; 3] {
        [
            self.wedge_position(face * 3),
            self.wedge_position(face * 3 + 1),
            self.wedge_position(face * 3 + 2),
        ]
    }

    fn indices_in_range(&self) -> bool {
        let num_vertices = self.vertex_positions.len();
        self.wedge_indices.iter().all(|&index| (index as usize) < num_vertices)
    }

    fn tex_coords_ok(&self, num_wedges: usize) -> bool {
        self.wedge_tex_coords[0].len() == num_wedges
            && self.wedge_tex_coords[1..]
                .iter()
                .all(|channel| array_size_ok(channel, num_wedges))
    }

    /// Returns true if every stream is consistently sized, there is at least
    /// one texture coordinate channel and every wedge index is in range.
    pub fn is_valid(&self) -> bool {
        let num_wedges = self.num_wedges();
        let num_faces = self.num_faces();

        self.num_vertices() > 0
            && num_wedges > 0
            && num_wedges % 3 == 0
            && array_size_ok(&self.face_material_indices, num_faces)
            && array_size_ok(&self.face_smoothing_masks, num_faces)
            && array_size_ok(&self.wedge_tangent_x, num_wedges)
            && array_size_ok(&self.wedge_tangent_y, num_wedges)
            && array_size_ok(&self.wedge_tangent_z, num_wedges)
            && array_size_ok(&self.wedge_colors, num_wedges)
            && self.tex_coords_ok(num_wedges)
            && self.indices_in_range()
    }

    /// Returns true if the mesh is valid or only has problems the build can
    /// repair. Tangent streams are not checked since they can be recomputed,
    /// but per-face streams must be fully present.
    pub fn is_valid_or_fixable(&self) -> bool {
        let num_wedges = self.num_wedges();
        let num_faces = self.num_faces();

        self.num_vertices() > 0
            && num_wedges > 0
            && num_wedges % 3 == 0
            && self.face_material_indices.len() == num_faces
            && self.face_smoothing_masks.len() == num_faces
            && array_size_ok(&self.wedge_colors, num_wedges)
            && self.tex_coords_ok(num_wedges)
            && self.indices_in_range()
    }

    /// Remove materials that no face uses and renumber the rest densely.
    ///
    /// Records the mapping back to import indices in
    /// `material_index_to_import_index`, which stays empty when nothing was
    /// removed.
    pub fn compact_material_indices(&mut self) {
        self.material_index_to_import_index.clear();
        if !self.is_valid_or_fixable() {
            return;
        }

        let mut triangles_per_material: Vec<u32> = Vec::new();
        for &material in &self.face_material_indices {
            let material = material as usize;
            if material >= triangles_per_material.len() {
                triangles_per_material.resize(material + 1, 0);
            }
            triangles_per_material[material] += 1;
        }

        let mut import_to_material: Vec<Option<u32>> = Vec::with_capacity(triangles_per_material.len());
        for (import_index, &count) in triangles_per_material.iter().enumerate() {
            if count > 0 {
                import_to_material.push(Some(self.material_index_to_import_index.len() as u32));
                self.material_index_to_import_index.push(import_index as u32);
            } else {
                import_to_material.push(None);
            }
        }

        if self.material_index_to_import_index.len() != import_to_material.len() {
            for material in &mut self.face_material_indices {
                // Every face material has a triangle, so it always has a slot.
                if let Some(new_index) = import_to_material[*material as usize] {
                    *material = new_index;
                }
            }
        } else {
            self.material_index_to_import_index.clear();
        }
    }
}
