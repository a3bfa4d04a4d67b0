#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod errors;
pub mod model;
pub mod motion;
pub mod render;
pub mod skeleton;
pub mod utils;

pub use assets::{AssetKey, ImportFormat, LoadSpec, ResourceManager, ResourceManagerDesc};
pub use errors::{Result, RigError};
pub use model::instance::{AttachmentKind, InstanceHandle};
pub use model::primitives::ProceduralShape;
pub use model::{Model, ModelHandle, ModelInstance, ModelState};
pub use motion::{Motion, MotionPlayParams, MotionSystem};
pub use render::{FrameContext, FrameDrawList, FrameFlags};
pub use skeleton::{Skeleton, SkeletonInstance};
pub use utils::interner;
