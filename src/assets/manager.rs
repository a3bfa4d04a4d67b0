//! The resource manager: pools, caches, load queues and the eviction sweep.
//!
//! # Threading
//!
//! Loading is fire-and-forget on a background runtime, but every state
//! transition happens on the thread that calls [`ResourceManager::cleanup`]
//! — background tasks only push onto the completion queue. The manager
//! admits **one** in-flight load at a time (a single-slot admission gate,
//! not a worker pool): load latency is serialized by design in exchange for
//! bounded contention on the importer subsystem.
//!
//! Per-frame instance updates are a data-parallel fan-out: one independent
//! unit of work per non-attached instance. No two instances' update paths
//! write shared mutable state, since each instance owns its own skeleton,
//! recorder and transform state; the bone-matrix ring is the one shared
//! sink and is locked per allocation.

use std::sync::Arc;

use glam::Affine3A;
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::assets::loader::{self, ImporterRegistry, LoadSpec, ModelImporter};
use crate::assets::{model_file, motion_file};
use crate::errors::Result;
use crate::model::instance::{AttachmentKind, InstanceHandle, InstanceSlot, ModelInstance};
use crate::model::{DESTROY_GRACE_UNITS, Model, ModelHandle, ModelState};
use crate::motion::Motion;
use crate::render::{BoneMatrixRing, FrameContext, FrameDrawList};
use crate::utils::{Pool, PoolHandle, Symbol, interner};

new_key_type! {
    /// Index+generation handle into the motion store.
    pub struct MotionHandle;
}

/// Interned identifier naming a model or motion. At most one live cache
/// entry exists per key and asset class.
pub type AssetKey = Symbol;

/// How often, in game-time units, the manager re-sorts live lists and runs
/// the eviction sweep.
pub const SWEEP_INTERVAL_UNITS: f64 = 10.0;

/// External file-format slots of the importer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Fbx,
    Obj,
    Xps,
}

/// Construction parameters; the manager is an explicitly built context
/// object, not an ambient singleton.
#[derive(Debug, Clone, Copy)]
pub struct ResourceManagerDesc {
    pub model_capacity: usize,
    pub instance_capacity: usize,
    /// Per-frame bone-matrix budget shared by all skinned draws.
    pub bone_matrix_capacity: usize,
}

impl Default for ResourceManagerDesc {
    fn default() -> Self {
        Self {
            model_capacity: 256,
            instance_capacity: 1024,
            bone_matrix_capacity: 4096,
        }
    }
}

struct LoadRequest {
    model: ModelHandle,
    spec: LoadSpec,
}

struct LoadCompletion {
    model: ModelHandle,
    /// `None` signals a failed load; waiting instances are still notified
    /// so they are never left pending.
    result: Option<loader::ModelData>,
}

struct MotionEntry {
    motion: Arc<Motion>,
    key: AssetKey,
    /// Game time at which the sweep first saw the motion unreferenced.
    destroy_timer: Option<f64>,
}

/// Owner of every pooled model, instance and cached motion.
pub struct ResourceManager {
    models: Pool<Model>,
    instances: Pool<InstanceSlot>,
    model_cache: FxHashMap<AssetKey, ModelHandle>,

    motions: SlotMap<MotionHandle, MotionEntry>,
    motion_cache: FxHashMap<AssetKey, MotionHandle>,

    importers: ImporterRegistry,
    load_tx: flume::Sender<LoadRequest>,
    load_rx: flume::Receiver<LoadRequest>,
    completion_tx: flume::Sender<LoadCompletion>,
    completion_rx: flume::Receiver<LoadCompletion>,
    /// Single-slot admission gate; set at dispatch, cleared at drain.
    load_in_flight: bool,

    /// Iteration-order handle lists, re-sorted by slot index at sweep time
    /// for cache-friendly traversal.
    live_models: Vec<ModelHandle>,
    live_instances: Vec<InstanceHandle>,
    live_dirty: bool,

    ring: Mutex<BoneMatrixRing>,

    game_time: f64,
    last_sweep: f64,
}

impl ResourceManager {
    #[must_use]
    pub fn new(desc: &ResourceManagerDesc) -> Self {
        let (load_tx, load_rx) = flume::unbounded();
        let (completion_tx, completion_rx) = flume::unbounded();
        Self {
            models: Pool::new(desc.model_capacity, "model"),
            instances: Pool::new(desc.instance_capacity, "instance"),
            model_cache: FxHashMap::default(),
            motions: SlotMap::with_key(),
            motion_cache: FxHashMap::default(),
            importers: ImporterRegistry::default(),
            load_tx,
            load_rx,
            completion_tx,
            completion_rx,
            load_in_flight: false,
            live_models: Vec::new(),
            live_instances: Vec::new(),
            live_dirty: false,
            ring: Mutex::new(BoneMatrixRing::new(desc.bone_matrix_capacity)),
            game_time: 0.0,
            last_sweep: 0.0,
        }
    }

    /// Installs an external importer for one of the foreign formats.
    pub fn register_importer(&mut self, format: ImportFormat, importer: Arc<dyn ModelImporter>) {
        match format {
            ImportFormat::Fbx => self.importers.set_fbx(importer),
            ImportFormat::Obj => self.importers.set_obj(importer),
            ImportFormat::Xps => self.importers.set_xps(importer),
        }
    }

    #[inline]
    #[must_use]
    pub fn game_time(&self) -> f64 {
        self.game_time
    }

    /// The frame's packed bone matrices, for backend upload.
    #[must_use]
    pub fn bone_matrix_ring(&self) -> &Mutex<BoneMatrixRing> {
        &self.ring
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Registers a model under `key`.
    ///
    /// A cache hit means the caller allocated twice — logged as an error,
    /// but the existing handle is returned rather than failing. Returns
    /// `None` only on pool exhaustion.
    pub fn allocate_model(&mut self, key: &str) -> Option<ModelHandle> {
        let sym = interner::intern(key);
        if let Some(&existing) = self.model_cache.get(&sym)
            && self.models.contains(existing)
        {
            log::error!("model '{key}' is already allocated, returning the cached handle");
            return Some(existing);
        }

        let handle = self.models.insert(Model::new(sym, key))?;
        self.model_cache.insert(sym, handle);
        self.live_models.push(handle);
        self.live_dirty = true;
        Some(handle)
    }

    /// Pure cache lookup.
    #[must_use]
    pub fn get_model(&self, key: &str) -> Option<ModelHandle> {
        let sym = interner::get(key)?;
        let handle = *self.model_cache.get(&sym)?;
        self.models.contains(handle).then_some(handle)
    }

    #[must_use]
    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle)
    }

    #[must_use]
    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Enqueues a background load. The request is admitted by `cleanup`,
    /// at most one at a time.
    pub fn async_load_model(&self, model: ModelHandle, spec: LoadSpec) {
        let _ = self.load_tx.send(LoadRequest { model, spec });
    }

    /// Allocate-and-load convenience: returns the cached handle when the
    /// key is already present, otherwise allocates and enqueues the load.
    pub fn create_model(&mut self, key: &str, spec: LoadSpec) -> Option<ModelHandle> {
        if let Some(existing) = self.get_model(key) {
            return Some(existing);
        }
        let handle = self.allocate_model(key)?;
        self.async_load_model(handle, spec);
        Some(handle)
    }

    /// Writes a model to the native binary format.
    pub fn save_model(&self, handle: ModelHandle, path: impl AsRef<std::path::Path>) -> Result<()> {
        let model = self.models.get(handle).ok_or_else(|| {
            crate::errors::RigError::AssetNotFound(format!("model handle {handle:?}"))
        })?;
        model_file::save_file(model, path)
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Pool-allocates a new instance of `model` and registers the
    /// back-reference.
    ///
    /// When the model is already in a terminal state the completion
    /// callback fires immediately, so late attachers never miss the event.
    pub fn create_model_instance(&mut self, model: ModelHandle) -> Option<InstanceHandle> {
        let (key, state) = {
            let model_ref = self.models.get(model)?;
            (model_ref.key(), model_ref.state())
        };

        let slot: InstanceSlot = Arc::new(Mutex::new(ModelInstance::new(model, key)));
        let handle = self.instances.insert(Arc::clone(&slot))?;
        self.models
            .get_mut(model)
            .expect("model checked above")
            .add_instance(handle);
        self.live_instances.push(handle);
        self.live_dirty = true;

        if state.is_terminal() {
            let model_ref = self.models.get(model).expect("model checked above");
            slot.lock()
                .notify_load(model_ref, state == ModelState::Complete);
        }
        Some(handle)
    }

    /// Destroys an instance explicitly. Instances are holder-managed and
    /// never collected by the timer sweep.
    pub fn destroy_model_instance(&mut self, handle: InstanceHandle) -> bool {
        let Some(slot) = self.instances.remove(handle) else {
            return false;
        };
        let (model_handle, attachments) = {
            let instance = slot.lock();
            (instance.model(), instance.attachments().to_vec())
        };

        for attachment in attachments {
            if let Some(child) = self.instances.get(attachment.child) {
                log::warn!(
                    "instance destroyed with live attachment {}, child released to top level",
                    attachment.id
                );
                child.lock().set_attachment_flag(false);
            }
        }

        if let Some(model) = self.models.get_mut(model_handle) {
            model.remove_instance(handle, self.game_time);
        }
        self.live_instances.retain(|&h| h != handle);
        self.live_dirty = true;
        true
    }

    /// Shared access to an instance slot.
    #[must_use]
    pub fn instance(&self, handle: InstanceHandle) -> Option<InstanceSlot> {
        self.instances.get(handle).cloned()
    }

    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Attaches `child` under `parent`.
    ///
    /// Fails without mutating anything when the parent is not
    /// load-complete or a bone attachment names a missing bone. On success
    /// the child is excluded from the top-level fan-out and driven only
    /// through the parent's walk.
    pub fn attach_instance(
        &mut self,
        parent: InstanceHandle,
        id: u32,
        child: InstanceHandle,
        kind: AttachmentKind,
        offset: Affine3A,
    ) -> bool {
        if parent == child {
            log::warn!("attach {id} rejected: instance cannot attach to itself");
            return false;
        }
        let Some(parent_slot) = self.instances.get(parent).cloned() else {
            return false;
        };
        let Some(child_slot) = self.instances.get(child).cloned() else {
            return false;
        };

        let mut parent_instance = parent_slot.lock();
        let Some(model) = self.models.get(parent_instance.model()) else {
            return false;
        };
        if parent_instance.attach(id, child, kind, offset, model) {
            child_slot.lock().set_attachment_flag(true);
            true
        } else {
            false
        }
    }

    /// Reverses [`Self::attach_instance`]; the child rejoins the top-level
    /// fan-out.
    pub fn detach_instance(&mut self, parent: InstanceHandle, id: u32) -> bool {
        let Some(parent_slot) = self.instances.get(parent).cloned() else {
            return false;
        };
        let detached = parent_slot.lock().detach(id);
        match detached {
            Some(attachment) => {
                if let Some(child) = self.instances.get(attachment.child) {
                    child.lock().set_attachment_flag(false);
                }
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Motions
    // ========================================================================

    /// Registers a motion under `key`. A duplicate key is logged and the
    /// existing entry wins.
    pub fn allocate_motion(&mut self, key: &str, motion: Motion) -> MotionHandle {
        let sym = interner::intern(key);
        if let Some(&existing) = self.motion_cache.get(&sym) {
            log::error!("motion '{key}' is already allocated, returning the cached handle");
            if let Some(entry) = self.motions.get_mut(existing) {
                entry.destroy_timer = None;
            }
            return existing;
        }
        let handle = self.motions.insert(MotionEntry {
            motion: Arc::new(motion),
            key: sym,
            destroy_timer: None,
        });
        self.motion_cache.insert(sym, handle);
        handle
    }

    /// Loads a motion from the native binary format and registers it.
    pub fn load_motion(&mut self, key: &str, path: impl AsRef<std::path::Path>) -> Result<MotionHandle> {
        let motion = motion_file::load_file(path)?;
        Ok(self.allocate_motion(key, motion))
    }

    /// Looks a motion up by key. Touch semantics: any pending destroy
    /// timer is cleared.
    pub fn get_motion(&mut self, key: &str) -> Option<Arc<Motion>> {
        let handle = self.get_motion_handle(key)?;
        self.motion(handle)
    }

    /// Looks a motion handle up by key, clearing its destroy timer.
    pub fn get_motion_handle(&mut self, key: &str) -> Option<MotionHandle> {
        let sym = interner::get(key)?;
        let handle = *self.motion_cache.get(&sym)?;
        self.motions.contains_key(handle).then_some(handle)
    }

    /// Looks a motion up by handle, clearing its destroy timer.
    pub fn motion(&mut self, handle: MotionHandle) -> Option<Arc<Motion>> {
        let entry = self.motions.get_mut(handle)?;
        entry.destroy_timer = None;
        Some(Arc::clone(&entry.motion))
    }

    #[inline]
    #[must_use]
    pub fn motion_count(&self) -> usize {
        self.motions.len()
    }

    // ========================================================================
    // Frame hooks
    // ========================================================================

    /// Per-frame update.
    ///
    /// Calls `ready()` on every cached model, then fans out across every
    /// non-attached instance — one independent unit of work each — and
    /// concatenates their draw lists. Within a frame a model's `ready()`
    /// always precedes any instance update; within one instance, pose
    /// computation always precedes node-tree traversal.
    pub fn update(&mut self, dt: f32, ctx: &FrameContext) -> FrameDrawList {
        self.ring.lock().begin_frame();

        for &handle in &self.live_models {
            if let Some(model) = self.models.get_mut(handle) {
                model.ready();
            }
        }

        let units: Vec<InstanceSlot> = self
            .live_instances
            .iter()
            .filter_map(|&handle| {
                let slot = self.instances.get(handle)?;
                let top_level = !slot.lock().is_attachment();
                top_level.then(|| Arc::clone(slot))
            })
            .collect();

        let models = &self.models;
        let instances = &self.instances;
        let ring = &self.ring;
        let lists: Vec<FrameDrawList> = units
            .par_iter()
            .map(|slot| {
                let mut out = FrameDrawList::default();
                let mut instance = slot.lock();
                if let Some(model) = models.get(instance.model()) {
                    instance.update(dt, &Affine3A::IDENTITY, model);
                }
                instance.update_model(models, instances, ring, ctx, &mut out);
                out
            })
            .collect();

        let mut frame = FrameDrawList::default();
        for list in lists {
            frame.append(list);
        }
        frame
    }

    /// Housekeeping: load admission, completion drain, periodic sweep.
    ///
    /// Must be called from the thread that owns the manager; all model and
    /// motion state transitions happen here.
    pub fn cleanup(&mut self, dt: f32) {
        self.game_time += f64::from(dt);

        self.admit_one_load();
        self.drain_completions();

        while self.game_time - self.last_sweep >= SWEEP_INTERVAL_UNITS {
            self.last_sweep += SWEEP_INTERVAL_UNITS;
            self.sweep();
        }
    }

    /// Pops one queued request when no load is in flight, flips the model
    /// to Loading synchronously (so a second dispatch cannot race it) and
    /// hands the actual work to the background runtime.
    fn admit_one_load(&mut self) {
        if self.load_in_flight {
            return;
        }
        let Ok(request) = self.load_rx.try_recv() else {
            return;
        };
        let Some(model) = self.models.get_mut(request.model) else {
            log::warn!("dropping load request for a destroyed model handle");
            return;
        };

        model.set_state(ModelState::Loading);
        self.load_in_flight = true;

        let tx = self.completion_tx.clone();
        let importers = self.importers.clone();
        let handle = request.model;
        let spec = request.spec;

        let work = move || {
            let result = match importers.dispatch(&spec) {
                Ok(data) => Some(data),
                Err(err) => {
                    log::error!("background load failed: {err}");
                    None
                }
            };
            let _ = tx.send(LoadCompletion {
                model: handle,
                result,
            });
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _join = loader::load_runtime().spawn_blocking(work);
        }
        #[cfg(target_arch = "wasm32")]
        {
            // No background threads on this target; run inline.
            work();
        }
    }

    /// Applies Complete/Invalid transitions and fires instance callbacks.
    /// Runs only on the calling thread.
    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.load_in_flight = false;
            let success = completion.result.is_some();

            let Some(model) = self.models.get_mut(completion.model) else {
                continue;
            };
            match completion.result {
                Some(data) => {
                    loader::apply_model_data(model, data);
                    model.set_state(ModelState::Complete);
                }
                None => model.set_state(ModelState::Invalid),
            }

            let waiting = model.instances().to_vec();
            let model = self
                .models
                .get(completion.model)
                .expect("model present above");
            for handle in waiting {
                if let Some(slot) = self.instances.get(handle) {
                    slot.lock().notify_load(model, success);
                }
            }
        }
    }

    /// The 10-unit housekeeping pass: list re-sort plus the grace-timed
    /// eviction of terminal, unreferenced models and idle motions.
    fn sweep(&mut self) {
        if self.live_dirty {
            let models = &self.models;
            self.live_models.retain(|&h| models.contains(h));
            self.live_models.sort_unstable_by_key(PoolHandle::index);
            let instances = &self.instances;
            self.live_instances.retain(|&h| instances.contains(h));
            self.live_instances.sort_unstable_by_key(PoolHandle::index);
            self.live_dirty = false;
        }

        // Models: terminal state, empty instance list, grace elapsed. A
        // Loading model is not terminal and therefore exempt — which is
        // also why a load can never complete against a destroyed model.
        let candidates: Vec<(AssetKey, ModelHandle)> =
            self.model_cache.iter().map(|(k, h)| (*k, *h)).collect();
        for (key, handle) in candidates {
            let Some(model) = self.models.get_mut(handle) else {
                self.model_cache.remove(&key);
                continue;
            };
            if model.state().is_terminal() && model.is_ready_to_destroy(self.game_time) {
                self.models.remove(handle);
                self.model_cache.remove(&key);
                self.live_models.retain(|&h| h != handle);
                log::debug!("evicted model '{}'", interner::resolve(key));
            }
        }

        // Motions: unreferenced (the cache holds the only Arc) and idle
        // through the same grace period.
        let game_time = self.game_time;
        let handles: Vec<MotionHandle> = self.motions.keys().collect();
        for handle in handles {
            let Some(entry) = self.motions.get_mut(handle) else {
                continue;
            };
            if Arc::strong_count(&entry.motion) <= 1 {
                match entry.destroy_timer {
                    None => entry.destroy_timer = Some(game_time),
                    Some(since) if game_time - since >= DESTROY_GRACE_UNITS => {
                        let key = entry.key;
                        self.motions.remove(handle);
                        self.motion_cache.remove(&key);
                        log::debug!("evicted motion '{}'", interner::resolve(key));
                    }
                    Some(_) => {}
                }
            } else {
                entry.destroy_timer = None;
            }
        }
    }
}
