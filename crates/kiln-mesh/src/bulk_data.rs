//! Raw mesh bulk storage
//!
//! A raw mesh is kept as an opaque byte blob: a version tag followed by the
//! mesh's flat primitive arrays, bincode encoded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::raw_mesh::RawMesh;
use crate::{MeshBuildError, MeshResult};

/// Current raw mesh serialization version
pub const RAW_MESH_VERSION: i32 = 0;

/// Content id of a stored raw mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BulkDataId(pub u64);

impl BulkDataId {
    /// Create an id from content bytes
    pub fn from_content(content: &[u8]) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for BulkDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Serialized raw mesh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMeshBulkData {
    bytes: Vec<u8>,
    id: BulkDataId,
}

impl RawMeshBulkData {
    /// Create empty bulk data
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap bytes previously produced by [`RawMeshBulkData::bytes`]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let id = BulkDataId::from_content(&bytes);
        Self { bytes, id }
    }

    /// Serialize a mesh into new bulk data
    pub fn from_raw_mesh(mesh: &RawMesh) -> MeshResult<Self> {
        let mut bulk = Self::new();
        bulk.save_raw_mesh(mesh)?;
        Ok(bulk)
    }

    /// Replace the stored mesh
    pub fn save_raw_mesh(&mut self, mesh: &RawMesh) -> MeshResult<()> {
        let mut bytes = bincode::serialize(&RAW_MESH_VERSION)?;
        bincode::serialize_into(&mut bytes, mesh)?;
        self.id = BulkDataId::from_content(&bytes);
        self.bytes = bytes;
        Ok(())
    }

    /// Decode the stored mesh. Empty bulk data yields an empty mesh.
    pub fn load_raw_mesh(&self) -> MeshResult<RawMesh> {
        if self.bytes.is_empty() {
            return Ok(RawMesh::default());
        }

        let mut reader = self.bytes.as_slice();
        let version: i32 = bincode::deserialize_from(&mut reader)?;
        if version != RAW_MESH_VERSION {
            return Err(MeshBuildError::UnsupportedVersion(version));
        }
        Ok(bincode::deserialize_from(&mut reader)?)
    }

    /// True when no mesh has been stored
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw serialized bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content id of the stored bytes
    pub fn id(&self) -> BulkDataId {
        self.id
    }

    /// Content id as a hex string
    pub fn id_string(&self) -> String {
        self.id.to_string()
    }
}
