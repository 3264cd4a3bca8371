//! Per-section material and flags
//!
//! Sections are addressed by `(lod, section)`. A section with no entry of its
//! own inherits LOD0's entry for the same section index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Material and rendering flags of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSectionInfo {
    pub material_index: u32,
    pub enable_collision: bool,
    pub cast_shadow: bool,
}

impl MeshSectionInfo {
    /// Default info for a section: its own index as material, collision and shadows on
    pub fn for_section(section: usize) -> Self {
        Self {
            material_index: section as u32,
            enable_collision: true,
            cast_shadow: true,
        }
    }
}

impl Default for MeshSectionInfo {
    fn default() -> Self {
        Self::for_section(0)
    }
}

fn section_key(lod: usize, section: usize) -> u32 {
    ((lod as u32 & 0xffff) << 16) | (section as u32 & 0xffff)
}

/// `(lod, section)` -> section info
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSectionInfoMap {
    map: BTreeMap<u32, MeshSectionInfo>,
}

impl MeshSectionInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of sections with an entry for `lod`
    pub fn section_count(&self, lod: usize) -> usize {
        let lod = lod as u32 & 0xffff;
        self.map.keys().filter(|&&key| key >> 16 == lod).count()
    }

    /// Info for a section, falling back to LOD0's entry and then to defaults
    pub fn get(&self, lod: usize, section: usize) -> MeshSectionInfo {
        self.map
            .get(&section_key(lod, section))
            .or_else(|| self.map.get(&section_key(0, section)))
            .copied()
            .unwrap_or_else(|| MeshSectionInfo::for_section(section))
    }

    pub fn set(&mut self, lod: usize, section: usize, info: MeshSectionInfo) {
        self.map.insert(section_key(lod, section), info);
    }

    pub fn remove(&mut self, lod: usize, section: usize) {
        self.map.remove(&section_key(lod, section));
    }

    /// Replace every entry with the entries of `other`
    pub fn copy_from(&mut self, other: &MeshSectionInfoMap) {
        self.map = other.map.clone();
    }

    /// True if any section of any LOD has collision enabled
    pub fn any_section_has_collision(&self) -> bool {
        self.map.values().any(|info| info.enable_collision)
    }
}
