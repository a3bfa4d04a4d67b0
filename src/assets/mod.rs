//! Asset management: the resource manager, load dispatch and the native
//! binary formats.

pub mod loader;
pub mod manager;
pub mod model_file;
pub mod motion_file;

pub use loader::{
    ImporterRegistry, LoadSpec, ModelData, ModelImporter, NodeData, SkeletonData, SkinnedVertex,
    StaticVertex,
};
pub use manager::{
    AssetKey, ImportFormat, MotionHandle, ResourceManager, ResourceManagerDesc,
    SWEEP_INTERVAL_UNITS,
};
