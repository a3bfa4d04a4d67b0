//! Render boundary.
//!
//! The GPU backend is an external collaborator: this subsystem only
//! *produces* its per-drawcall input. [`records`] defines the draw-record
//! types handed across that boundary each frame, and [`bone_buffer`] the
//! shared per-frame bone-matrix buffer skinned draws index into.

pub mod bone_buffer;
pub mod records;

pub use bone_buffer::{BoneMatrixRing, BoneRange};
pub use records::{
    BufferId, CpuMeshData, DebugRecord, DrawRecord, FrameContext, FrameDrawList, FrameFlags,
    PrimitiveTopology,
};
