//! Binary glTF (GLB) container validation
//!
//! Only the container is checked here: header magic, version, declared
//! length, and that the first chunk is the JSON chunk. Parsing the glTF scene
//! itself is left to the renderer.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;

use super::{AssetError, AssetId};

/// `glTF` in little-endian byte order
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// Supported container version
pub const GLB_VERSION: u32 = 2;
/// `JSON` chunk type
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// `BIN\0` chunk type
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = std::mem::size_of::<GlbHeader>();
const CHUNK_HEADER_LEN: usize = std::mem::size_of::<ChunkHeader>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GlbHeader {
    magic: u32,
    version: u32,
    length: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ChunkHeader {
    length: u32,
    chunk_type: u32,
}

/// Why an asset is standing in for the real art
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    /// Loading failed after all retries
    LoadFailed,
    /// The loader pool had no room; render undecorated
    PoolSaturated,
    /// The cache shut down before the load finished
    ShutDown,
}

/// A validated GLB model, or a placeholder
#[derive(Debug, Clone)]
pub struct ModelAsset {
    id: AssetId,
    bytes: Arc<[u8]>,
    json_len: usize,
    bin_len: Option<usize>,
    placeholder: Option<PlaceholderReason>,
}

impl ModelAsset {
    /// Validate `bytes` as a GLB container
    pub fn from_glb(id: AssetId, bytes: Vec<u8>) -> Result<Self, AssetError> {
        let invalid = |reason: String| AssetError::InvalidGlb { id: id.clone(), reason };

        if bytes.len() < HEADER_LEN + CHUNK_HEADER_LEN {
            return Err(invalid(format!("{} bytes is too short for a GLB file", bytes.len())));
        }

        let header: GlbHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_LEN]);
        let magic = u32::from_le(header.magic);
        let version = u32::from_le(header.version);
        let length = u32::from_le(header.length) as usize;

        if magic != GLB_MAGIC {
            return Err(invalid(format!("bad magic {magic:#010x}")));
        }
        if version != GLB_VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }
        if length != bytes.len() {
            return Err(invalid(format!("header declares {length} bytes, file has {}", bytes.len())));
        }

        let json = read_chunk(&bytes, HEADER_LEN).ok_or_else(|| invalid("truncated JSON chunk".to_string()))?;
        if json.chunk_type != CHUNK_JSON {
            return Err(invalid(format!("first chunk type {:#010x} is not JSON", json.chunk_type)));
        }
        let json_len = json.length as usize;

        let bin_offset = HEADER_LEN + CHUNK_HEADER_LEN + json_len;
        let bin_len = if bin_offset < bytes.len() {
            let bin = read_chunk(&bytes, bin_offset).ok_or_else(|| invalid("truncated BIN chunk".to_string()))?;
            (bin.chunk_type == CHUNK_BIN).then_some(bin.length as usize)
        } else {
            None
        };

        Ok(Self {
            id,
            bytes: Arc::from(bytes),
            json_len,
            bin_len,
            placeholder: None,
        })
    }

    /// Empty stand-in for `id`
    pub fn placeholder(id: AssetId, reason: PlaceholderReason) -> Self {
        Self {
            id,
            bytes: Arc::from(Vec::new()),
            json_len: 0,
            bin_len: None,
            placeholder: Some(reason),
        }
    }

    /// Asset id
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// Whole container
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// glTF JSON document
    pub fn json(&self) -> &[u8] {
        let start = HEADER_LEN + CHUNK_HEADER_LEN;
        self.bytes.get(start..start + self.json_len).unwrap_or(&[])
    }

    /// Length of the binary buffer chunk, if present
    pub fn bin_len(&self) -> Option<usize> {
        self.bin_len
    }

    /// Set when this is not real art
    pub fn placeholder_reason(&self) -> Option<PlaceholderReason> {
        self.placeholder
    }

    /// Whether this is a stand-in
    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }
}

fn read_chunk(bytes: &[u8], offset: usize) -> Option<ChunkHeader> {
    let raw = bytes.get(offset..offset + CHUNK_HEADER_LEN)?;
    let header: ChunkHeader = bytemuck::pod_read_unaligned(raw);
    let header = ChunkHeader {
        length: u32::from_le(header.length),
        chunk_type: u32::from_le(header.chunk_type),
    };
    (offset + CHUNK_HEADER_LEN + header.length as usize <= bytes.len()).then_some(header)
}

/// Build a minimal valid GLB around `json`, padded to 4 bytes
pub fn encode_glb(json: &str) -> Vec<u8> {
    let mut chunk = json.as_bytes().to_vec();
    while chunk.len() % 4 != 0 {
        chunk.push(b' ');
    }

    let total = HEADER_LEN + CHUNK_HEADER_LEN + chunk.len();
    let mut out = Vec::with_capacity(total);
    for word in [GLB_MAGIC, GLB_VERSION, total as u32, chunk.len() as u32, CHUNK_JSON] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&chunk);
    out
}
