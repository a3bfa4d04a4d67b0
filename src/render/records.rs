//! Draw records emitted toward the GPU backend.
//!
//! One [`DrawRecord`] per visible subset per frame; the backend consumes
//! the list and owns everything from there (pipeline state, GPU skinning,
//! submission). Buffer ids are opaque here — the backend allocated them
//! when the model finished loading and registered them on the nodes.

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, Vec3};

use crate::render::bone_buffer::BoneRange;
use crate::utils::Symbol;

/// Opaque GPU buffer identifier, issued by the external backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Index-buffer topology of a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PrimitiveTopology {
    TriangleList = 0,
    TriangleStrip = 1,
    LineList = 2,
    LineStrip = 3,
    PointList = 4,
}

impl PrimitiveTopology {
    /// Decodes the on-disk tag. Unknown tags are a malformed-asset error at
    /// the call site.
    #[must_use]
    pub fn from_u32(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::TriangleList,
            1 => Self::TriangleStrip,
            2 => Self::LineList,
            3 => Self::LineStrip,
            4 => Self::PointList,
            _ => return None,
        })
    }
}

/// Raw CPU-side copy of a node's geometry.
///
/// Kept alive alongside the GPU buffers for software occlusion tests and
/// for re-saving models in the native format.
#[derive(Debug, Clone, Default)]
pub struct CpuMeshData {
    /// Size of one vertex in bytes.
    pub vertex_stride: u32,
    /// Tightly packed vertex bytes, `vertex_stride` apart.
    pub vertices: Vec<u8>,
    pub indices: Vec<u32>,
}

impl CpuMeshData {
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        if self.vertex_stride == 0 {
            0
        } else {
            (self.vertices.len() / self.vertex_stride as usize) as u32
        }
    }
}

bitflags! {
    /// Per-frame feature toggles passed down the update walk.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct FrameFlags: u32 {
        /// Emit wireframe bounding-box debug records for every node.
        const DRAW_BOUNDS = 1 << 0;
    }
}

/// Explicit per-frame context handed through the update walk.
///
/// Replaces what would otherwise be ambient globals (debug toggles, the
/// camera) with a value constructed by the caller each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameContext {
    pub camera_position: Vec3,
    pub flags: FrameFlags,
}

/// Per-drawcall input for the external rendering backend.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    /// World transform of the emitting node.
    pub transform: Mat4,
    /// Last frame's world transform (motion vectors).
    pub prev_transform: Mat4,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub start_index: u32,
    pub index_count: u32,
    /// Resolved material name (instance override already applied).
    pub material: Symbol,
    pub topology: PrimitiveTopology,
    /// CPU geometry for software occlusion.
    pub occlusion: Arc<CpuMeshData>,
    /// Distance from the frame camera to the node origin.
    pub camera_distance: f32,
    /// Range in the frame's bone-matrix buffer, for skinned draws.
    pub bone_range: Option<BoneRange>,
    /// Last frame's range (motion vectors for skinned geometry).
    pub prev_bone_range: Option<BoneRange>,
}

/// Wireframe bounding-box debug draw.
#[derive(Debug, Clone, Copy)]
pub struct DebugRecord {
    pub transform: Mat4,
    pub center: Vec3,
    pub extents: Vec3,
}

/// Everything one `ResourceManager::update` produced for the backend.
#[derive(Debug, Default)]
pub struct FrameDrawList {
    pub records: Vec<DrawRecord>,
    pub debug: Vec<DebugRecord>,
}

impl FrameDrawList {
    pub fn append(&mut self, mut other: FrameDrawList) {
        self.records.append(&mut other.records);
        self.debug.append(&mut other.debug);
    }
}
