//! Models: node hierarchies, load state and instance back-references.

pub mod instance;
pub mod material;
pub mod node;
pub mod primitives;
pub mod transform;

use glam::Affine3A;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::render::{BoneMatrixRing, FrameContext, FrameDrawList};
use crate::skeleton::{Skeleton, SkeletonInstance};
use crate::utils::{PoolHandle, Symbol, interner};

pub use instance::{
    Attachment, AttachmentKind, InstanceHandle, InstanceSlot, ModelInstance, TransformInstance,
};
pub use material::{Material, MaterialInstance};
pub use node::{Aabb, ModelNode, NodeKind, NodeLod, Subset};
pub use transform::Transform;

/// Handle to a pooled [`Model`].
pub type ModelHandle = PoolHandle<Model>;

/// Grace period, in game-time units, between a resource becoming
/// unreferenced and its eviction.
pub const DESTROY_GRACE_UNITS: f64 = 120.0;

/// Load lifecycle of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Allocated, no load requested or load still queued.
    Ready,
    /// A background load is in flight.
    Loading,
    Complete,
    Invalid,
}

impl ModelState {
    /// Complete or Invalid — the states the eviction sweep may act on.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Invalid)
    }
}

/// A shared model asset: node hierarchy, skeleton and the list of live
/// instances observing it.
pub struct Model {
    key: Symbol,
    pub name: String,
    pub visible: bool,
    pub transform: Transform,
    state: ModelState,

    skeleton: Skeleton,
    nodes: Vec<ModelNode>,
    roots: Vec<usize>,
    node_index: FxHashMap<Symbol, usize>,

    /// Observing back-references; validated by handle generation on use.
    instances: Vec<InstanceHandle>,
    /// Game time at which the instance list last became empty.
    empty_since: Option<f64>,
}

impl Model {
    #[must_use]
    pub fn new(key: Symbol, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            visible: true,
            transform: Transform::new(),
            state: ModelState::Ready,
            skeleton: Skeleton::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
            node_index: FxHashMap::default(),
            instances: Vec::new(),
            empty_since: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Symbol {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ModelState) {
        self.state = state;
    }

    #[inline]
    #[must_use]
    pub fn is_load_complete(&self) -> bool {
        self.state == ModelState::Complete
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[must_use]
    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    // ========================================================================
    // Node hierarchy
    // ========================================================================

    /// Inserts a node into the flat index and the hierarchy.
    ///
    /// A duplicate node name is logged and the insert dropped; a missing
    /// parent name is logged and the node falls back to the root list.
    pub fn add_node(&mut self, node: ModelNode, parent_name: Option<&str>) -> Option<usize> {
        if self.node_index.contains_key(&node.name) {
            log::error!(
                "model '{}': duplicate node name '{}', insert dropped",
                self.name,
                interner::resolve(node.name)
            );
            return None;
        }

        let index = self.nodes.len();
        let name = node.name;
        let parent = parent_name.and_then(|p| {
            let found = interner::get(p).and_then(|sym| self.node_index.get(&sym).copied());
            if found.is_none() {
                log::error!(
                    "model '{}': node '{}' references missing parent '{p}', attaching to root",
                    self.name,
                    interner::resolve(name)
                );
            }
            found
        });

        self.nodes.push(node);
        self.nodes[index].parent = parent;
        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        self.node_index.insert(name, index);
        Some(index)
    }

    /// Looks a node up by name.
    #[must_use]
    pub fn get_node(&self, name: &str) -> Option<&ModelNode> {
        let index = self.node_index_of(name)?;
        self.nodes.get(index)
    }

    #[must_use]
    pub fn node_index_of(&self, name: &str) -> Option<usize> {
        interner::get(name).and_then(|sym| self.node_index.get(&sym).copied())
    }

    #[inline]
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&ModelNode> {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn node_mut(&mut self, index: usize) -> Option<&mut ModelNode> {
        self.nodes.get_mut(index)
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[ModelNode] {
        &self.nodes
    }

    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Instance back-references
    // ========================================================================

    pub(crate) fn add_instance(&mut self, handle: InstanceHandle) {
        self.instances.push(handle);
        self.empty_since = None;
    }

    pub(crate) fn remove_instance(&mut self, handle: InstanceHandle, game_time: f64) {
        self.instances.retain(|&h| h != handle);
        if self.instances.is_empty() {
            self.empty_since = Some(game_time);
        }
    }

    #[inline]
    #[must_use]
    pub fn instances(&self) -> &[InstanceHandle] {
        &self.instances
    }

    #[inline]
    #[must_use]
    pub fn has_instances(&self) -> bool {
        !self.instances.is_empty()
    }

    /// Eviction gate: false (and resets the grace timer) while any instance
    /// is alive; otherwise starts the 120-unit timer on first call and
    /// reports true once it has elapsed.
    pub fn is_ready_to_destroy(&mut self, game_time: f64) -> bool {
        if !self.instances.is_empty() {
            self.empty_since = None;
            return false;
        }
        match self.empty_since {
            None => {
                self.empty_since = Some(game_time);
                false
            }
            Some(since) => game_time - since >= DESTROY_GRACE_UNITS,
        }
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Recomposes the local matrix when the model is complete and the
    /// transform is dirty. No-op otherwise.
    pub fn ready(&mut self) {
        if self.state == ModelState::Complete {
            self.transform.update_local_matrix();
        }
    }

    /// Depth-first walk over the node hierarchy, gated by the model's own
    /// visibility flag. Each node emits its draw records and hands the
    /// resolved transform to its children.
    pub(crate) fn update(
        &self,
        world: &Affine3A,
        skeleton_instance: Option<&SkeletonInstance>,
        material_instance: &MaterialInstance,
        transform_instance: &mut TransformInstance,
        ring: &Mutex<BoneMatrixRing>,
        ctx: &FrameContext,
        out: &mut FrameDrawList,
    ) {
        if !self.visible {
            return;
        }
        for &root in &self.roots {
            self.update_node(
                root,
                world,
                skeleton_instance,
                material_instance,
                transform_instance,
                ring,
                ctx,
                out,
            );
        }
    }

    fn update_node(
        &self,
        index: usize,
        parent_matrix: &Affine3A,
        skeleton_instance: Option<&SkeletonInstance>,
        material_instance: &MaterialInstance,
        transform_instance: &mut TransformInstance,
        ring: &Mutex<BoneMatrixRing>,
        ctx: &FrameContext,
        out: &mut FrameDrawList,
    ) {
        let node = &self.nodes[index];
        let resolved = node.update(
            index,
            parent_matrix,
            &self.skeleton,
            skeleton_instance,
            material_instance,
            transform_instance,
            ring,
            ctx,
            out,
        );
        for &child in &node.children {
            self.update_node(
                child,
                &resolved,
                skeleton_instance,
                material_instance,
                transform_instance,
                ring,
                ctx,
                out,
            );
        }
    }
}
