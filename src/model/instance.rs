//! Model instances: the composition root of all per-instance state.
//!
//! A `ModelInstance` owns one `MotionSystem`, one `SkeletonInstance`, one
//! `MaterialInstance`, one `TransformInstance` and an attachment list. The
//! shared `Model` only observes its instances through handles.

use std::sync::Arc;

use glam::{Affine3A, Mat4};
use parking_lot::Mutex;

use crate::model::material::MaterialInstance;
use crate::model::{Model, ModelHandle};
use crate::motion::MotionSystem;
use crate::render::{BoneMatrixRing, BoneRange, FrameContext, FrameDrawList};
use crate::skeleton::SkeletonInstance;
use crate::utils::{Pool, PoolHandle, Symbol, interner};

/// Shared slot an instance lives in; the mutex is what allows the
/// manager's data-parallel fan-out and the owner-driven attachment walks to
/// coexist.
pub type InstanceSlot = Arc<Mutex<ModelInstance>>;

/// Handle to a pooled instance slot.
pub type InstanceHandle = PoolHandle<InstanceSlot>;

/// Callback fired when the instance's model finishes loading (successfully
/// or not).
pub type LoadCallback = Box<dyn FnMut(bool) + Send>;

#[derive(Debug, Clone, Copy)]
struct PrevNodeState {
    transform: Mat4,
    bone_range: Option<BoneRange>,
    valid: bool,
}

/// Per-node previous-frame state of one instance.
///
/// Draw records carry last frame's transform and bone-buffer slot for
/// motion vectors; this is where they come from. Sized to the model's node
/// count when the load completes.
#[derive(Debug, Clone, Default)]
pub struct TransformInstance {
    states: Vec<PrevNodeState>,
}

impl TransformInstance {
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            states: vec![
                PrevNodeState {
                    transform: Mat4::IDENTITY,
                    bone_range: None,
                    valid: false,
                };
                node_count
            ],
        }
    }

    /// Last frame's state for a node; on the first frame the current
    /// transform doubles as the previous one.
    pub(crate) fn previous(&self, index: usize, current: Mat4) -> (Mat4, Option<BoneRange>) {
        match self.states.get(index) {
            Some(state) if state.valid => (state.transform, state.bone_range),
            _ => (current, None),
        }
    }

    pub(crate) fn store(&mut self, index: usize, transform: Mat4, bone_range: Option<BoneRange>) {
        if let Some(state) = self.states.get_mut(index) {
            *state = PrevNodeState {
                transform,
                bone_range,
                valid: true,
            };
        }
    }
}

/// How an attachment is placed each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Free-floating under the owner's world matrix.
    Free,
    /// Under the named bone's current global matrix. The attachment is
    /// silently dropped if the bone ever disappears.
    Bone(Symbol),
}

/// One attached child instance.
#[derive(Debug, Clone, Copy)]
pub struct Attachment {
    pub id: u32,
    /// The attacher is responsible for destroying the child; the slot
    /// itself stays in the instance pool.
    pub child: InstanceHandle,
    pub kind: AttachmentKind,
    pub offset: Affine3A,
}

/// A live instance of a model.
pub struct ModelInstance {
    model: ModelHandle,
    key: Symbol,
    pub visible: bool,
    /// True while this instance is driven by an owner's attachment walk
    /// and therefore excluded from the manager's top-level fan-out.
    is_attachment: bool,
    /// `None` until the model load settles, then `Some(is_success)`.
    load_result: Option<bool>,

    world_matrix: Affine3A,
    cached_dt: f32,

    motion_system: MotionSystem,
    skeleton_instance: Option<SkeletonInstance>,
    material_instance: MaterialInstance,
    transform_instance: TransformInstance,
    attachments: Vec<Attachment>,

    load_callback: Option<LoadCallback>,
}

impl ModelInstance {
    pub(crate) fn new(model: ModelHandle, key: Symbol) -> Self {
        Self {
            model,
            key,
            visible: true,
            is_attachment: false,
            load_result: None,
            world_matrix: Affine3A::IDENTITY,
            cached_dt: 0.0,
            motion_system: MotionSystem::new(),
            skeleton_instance: None,
            material_instance: MaterialInstance::new(),
            transform_instance: TransformInstance::default(),
            attachments: Vec::new(),
            load_callback: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> ModelHandle {
        self.model
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Symbol {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.is_attachment
    }

    pub(crate) fn set_attachment_flag(&mut self, flag: bool) {
        self.is_attachment = flag;
    }

    /// True once the model loaded successfully.
    #[inline]
    #[must_use]
    pub fn is_load_complete(&self) -> bool {
        self.load_result == Some(true)
    }

    /// `None` while the load is pending, otherwise the outcome.
    #[inline]
    #[must_use]
    pub fn load_result(&self) -> Option<bool> {
        self.load_result
    }

    /// Registers the completion callback. Fired at most once per load
    /// transition, on the thread that drains the completion queue.
    pub fn set_load_callback(&mut self, callback: LoadCallback) {
        self.load_callback = Some(callback);
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn motion_system(&self) -> &MotionSystem {
        &self.motion_system
    }

    #[must_use]
    pub fn motion_system_mut(&mut self) -> &mut MotionSystem {
        &mut self.motion_system
    }

    #[inline]
    #[must_use]
    pub fn skeleton_instance(&self) -> Option<&SkeletonInstance> {
        self.skeleton_instance.as_ref()
    }

    #[must_use]
    pub fn skeleton_instance_mut(&mut self) -> Option<&mut SkeletonInstance> {
        self.skeleton_instance.as_mut()
    }

    #[must_use]
    pub fn material_instance_mut(&mut self) -> &mut MaterialInstance {
        &mut self.material_instance
    }

    #[inline]
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Applies a load transition: binds the skeleton/transform instances on
    /// success and fires the completion callback either way.
    pub(crate) fn notify_load(&mut self, model: &Model, success: bool) {
        self.load_result = Some(success);
        if success {
            if model.skeleton().bone_count() > 0 {
                self.skeleton_instance = Some(SkeletonInstance::new(model.skeleton()));
            }
            self.transform_instance = TransformInstance::new(model.node_count());
        }
        if let Some(callback) = self.load_callback.as_mut() {
            callback(success);
        }
    }

    /// Per-frame placement: world matrix = parent × model local matrix;
    /// caches dt for the transformation pass.
    pub(crate) fn update(&mut self, dt: f32, parent: &Affine3A, model: &Model) {
        self.world_matrix = *parent * *model.transform.local_matrix();
        self.cached_dt = dt;
    }

    /// Records an attachment.
    ///
    /// Fails without mutating anything when this instance is not
    /// load-complete or a bone attachment names a bone the model's
    /// skeleton does not have.
    pub(crate) fn attach(
        &mut self,
        id: u32,
        child: InstanceHandle,
        kind: AttachmentKind,
        offset: Affine3A,
        model: &Model,
    ) -> bool {
        if !self.is_load_complete() {
            log::warn!("attach {id} rejected: instance not load-complete");
            return false;
        }
        if let AttachmentKind::Bone(bone) = kind
            && model.skeleton().find_bone_sym(bone).is_none()
        {
            log::warn!(
                "attach {id} rejected: no bone '{}' on model '{}'",
                interner::resolve(bone),
                model.name
            );
            return false;
        }
        self.attachments.push(Attachment {
            id,
            child,
            kind,
            offset,
        });
        true
    }

    /// Removes an attachment record, returning it so the caller can clear
    /// the child's attachment flag.
    pub(crate) fn detach(&mut self, id: u32) -> Option<Attachment> {
        let position = self.attachments.iter().position(|a| a.id == id)?;
        Some(self.attachments.remove(position))
    }

    /// Advances the pose and drives the attachment subtree.
    ///
    /// Attachments are updated synchronously inside this walk, never fanned
    /// out again; an attachment whose bone no longer exists is removed from
    /// the list without ceremony.
    fn update_transformations(
        &mut self,
        model: &Model,
        models: &Pool<Model>,
        instances: &Pool<InstanceSlot>,
        ring: &Mutex<BoneMatrixRing>,
        ctx: &FrameContext,
        out: &mut FrameDrawList,
    ) {
        if let Some(skeleton_instance) = self.skeleton_instance.as_mut() {
            self.motion_system.advance(self.cached_dt);
            self.motion_system.apply(model.skeleton(), skeleton_instance);
            skeleton_instance.update(model.skeleton(), &self.world_matrix);
        }

        let world = self.world_matrix;
        let dt = self.cached_dt;
        let skeleton_instance = self.skeleton_instance.as_ref();
        self.attachments.retain(|attachment| {
            let placement = match attachment.kind {
                AttachmentKind::Free => world * attachment.offset,
                AttachmentKind::Bone(bone) => {
                    let global = model
                        .skeleton()
                        .find_bone_sym(bone)
                        .and_then(|index| skeleton_instance?.global_matrix(index));
                    match global {
                        Some(global) => global * attachment.offset,
                        // Bone gone: silently detach.
                        None => return false,
                    }
                }
            };

            if let Some(slot) = instances.get(attachment.child) {
                let slot = Arc::clone(slot);
                let mut child = slot.lock();
                if let Some(child_model) = models.get(child.model) {
                    child.update(dt, &placement, child_model);
                }
                child.update_model(models, instances, ring, ctx, out);
            }
            true
        });
    }

    /// Pose + node-tree traversal, in that order.
    ///
    /// No-op while invisible or while the owning model is not
    /// load-complete.
    pub(crate) fn update_model(
        &mut self,
        models: &Pool<Model>,
        instances: &Pool<InstanceSlot>,
        ring: &Mutex<BoneMatrixRing>,
        ctx: &FrameContext,
        out: &mut FrameDrawList,
    ) {
        if !self.visible {
            return;
        }
        let Some(model) = models.get(self.model) else {
            return;
        };
        if !model.is_load_complete() {
            return;
        }

        self.update_transformations(model, models, instances, ring, ctx, out);
        model.update(
            &self.world_matrix,
            self.skeleton_instance.as_ref(),
            &self.material_instance,
            &mut self.transform_instance,
            ring,
            ctx,
            out,
        );
    }
}
