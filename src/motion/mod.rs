//! Motion assets, sampling and playback.

pub mod clip;
pub mod recorder;
pub mod system;

pub use clip::{BoneTrack, Keyframe, Motion, MotionEvent, TrsSample};
pub use recorder::MotionRecorder;
pub use system::{MAX_MOTION_LAYERS, MotionLayer, MotionPlayParams, MotionSystem};
