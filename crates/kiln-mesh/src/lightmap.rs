//! Lightmap UV generation

use glam::Vec2;

use crate::raw_mesh::{RawMesh, MAX_TEXTURE_COORDS};

/// Writes lightmap UVs into a raw mesh
pub trait LightmapPacker {
    /// Read UV channel `src`, write channel `dst`. On failure the mesh must be
    /// left untouched and false returned.
    fn pack(&mut self, mesh: &mut RawMesh, src: usize, dst: usize, min_resolution: u32) -> bool;
}

/// Copies the source channel into the destination channel, fitted into the
/// unit square with a one-texel border at the target resolution. Charts are
/// not separated, so overlapping source UVs stay overlapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelCopyPacker;

impl LightmapPacker for ChannelCopyPacker {
    fn pack(&mut self, mesh: &mut RawMesh, src: usize, dst: usize, min_resolution: u32) -> bool {
        if src >= MAX_TEXTURE_COORDS || dst >= MAX_TEXTURE_COORDS || min_resolution < 4 {
            return false;
        }
        let source = &mesh.wedge_tex_coords[src];
        if source.is_empty() || source.len() != mesh.num_wedges() {
            return false;
        }

        let (min, max) = source
            .iter()
            .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), &uv| (lo.min(uv), hi.max(uv)));
        let extent = (max - min).max(Vec2::splat(f32::EPSILON));
        if !extent.is_finite() {
            return false;
        }

        let border = 1.0 / min_resolution as f32;
        let scale = (1.0 - 2.0 * border) / extent.max_element();
        let packed: Vec<Vec2> = source
            .iter()
            .map(|&uv| Vec2::splat(border) + (uv - min) * scale)
            .collect();

        mesh.wedge_tex_coords[dst] = packed;
        true
    }
}
