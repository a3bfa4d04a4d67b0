//! Model Hierarchy and Instance Tests
//!
//! Tests for:
//! - Node insertion: flat name index, duplicate names, missing parents
//! - Depth-first update order over a three-node hierarchy
//! - Attachment rules: load-completeness, bone resolution, free placement
//! - Attachment exclusion from the top-level fan-out

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Affine3A, Vec3};

use rig::assets::{LoadSpec, ResourceManager, ResourceManagerDesc};
use rig::model::node::{Aabb, ModelNode, NodeKind};
use rig::model::{Model, ModelHandle};
use rig::{AttachmentKind, FrameContext, FrameFlags, ModelState};

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("rig_model_test_{}_{name}.model", std::process::id()));
    path
}

fn node_with_bounds(name: &str, center_x: f32) -> ModelNode {
    let mut node = ModelNode::new(name, NodeKind::Static);
    node.bounds = Aabb {
        center: Vec3::new(center_x, 0.0, 0.0),
        extents: Vec3::ONE,
    };
    node
}

/// root → childA → childB, with distinct bounds for identification.
fn build_three_node_model() -> Model {
    let mut model = Model::new(rig::interner::intern("three"), "three");
    model.add_node(node_with_bounds("root", 1.0), None);
    model.add_node(node_with_bounds("childA", 2.0), Some("root"));
    model.add_node(node_with_bounds("childB", 3.0), Some("childA"));
    model
}

/// Round-trips a hand-built model through the native format and the
/// manager's load queue so it ends up Complete and pool-owned.
fn load_into_manager(
    manager: &mut ResourceManager,
    model: &Model,
    key: &str,
    file_tag: &str,
) -> ModelHandle {
    let path = temp_path(file_tag);
    rig::assets::model_file::save_file(model, &path).expect("save");
    let handle = manager
        .create_model(key, LoadSpec::Native(path.clone()))
        .expect("allocate");
    let state = pump_until_terminal(manager, handle);
    std::fs::remove_file(path).ok();
    assert_eq!(state, ModelState::Complete);
    handle
}

fn pump_until_terminal(manager: &mut ResourceManager, handle: ModelHandle) -> ModelState {
    for _ in 0..5000 {
        // dt 0: drives the queues without advancing game time
        manager.cleanup(0.0);
        if let Some(state) = manager.model(handle).map(Model::state)
            && state.is_terminal()
        {
            return state;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("load never settled");
}

// ============================================================================
// Node hierarchy
// ============================================================================

#[test]
fn get_node_resolves_all_three_names() {
    let model = build_three_node_model();
    assert!(model.get_node("root").is_some());
    assert!(model.get_node("childA").is_some());
    assert!(model.get_node("childB").is_some());
    assert!(model.get_node("nonexistent").is_none(), "unknown name is None");
}

#[test]
fn duplicate_node_name_is_dropped() {
    let mut model = build_three_node_model();
    let result = model.add_node(node_with_bounds("childA", 9.0), None);
    assert!(result.is_none(), "duplicate insert must be dropped");
    assert_eq!(model.node_count(), 3);
    // Old entry wins
    let node = model.get_node("childA").unwrap();
    assert!((node.bounds.center.x - 2.0).abs() < 1e-6);
}

#[test]
fn missing_parent_falls_back_to_root() {
    let mut model = build_three_node_model();
    let index = model
        .add_node(node_with_bounds("stray", 4.0), Some("no_such_parent"))
        .expect("insert still succeeds");
    assert!(model.roots().contains(&index), "stray node must be a root");
}

#[test]
fn depth_first_update_visits_root_then_children() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let handle = load_into_manager(&mut manager, &source, "dfs", "dfs");

    manager.create_model_instance(handle).unwrap();

    let ctx = FrameContext {
        camera_position: Vec3::ZERO,
        flags: FrameFlags::DRAW_BOUNDS,
    };
    let frame = manager.update(0.016, &ctx);

    // Debug records are pushed in traversal order; bounds identify nodes.
    let order: Vec<f32> = frame.debug.iter().map(|d| d.center.x).collect();
    assert_eq!(order, vec![1.0, 2.0, 3.0], "expected root, childA, childB");
}

// ============================================================================
// Attachments
// ============================================================================

#[test]
fn attach_fails_before_load_completes() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let handle = manager.allocate_model("pending").unwrap();
    let parent = manager.create_model_instance(handle).unwrap();
    let child = manager.create_model_instance(handle).unwrap();

    assert!(
        !manager.attach_instance(parent, 1, child, AttachmentKind::Free, Affine3A::IDENTITY),
        "attach must fail while the model is not load-complete"
    );
    let slot = manager.instance(parent).unwrap();
    assert!(slot.lock().attachments().is_empty(), "nothing may be recorded");
}

#[test]
fn attach_to_missing_bone_fails_without_mutation() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let handle = load_into_manager(&mut manager, &source, "boneless", "boneless");

    let parent = manager.create_model_instance(handle).unwrap();
    let child = manager.create_model_instance(handle).unwrap();

    assert!(!manager.attach_instance(
        parent,
        7,
        child,
        AttachmentKind::Bone(rig::interner::intern("no_such_bone")),
        Affine3A::IDENTITY,
    ));
    let slot = manager.instance(parent).unwrap();
    assert!(slot.lock().attachments().is_empty());
    let child_slot = manager.instance(child).unwrap();
    assert!(!child_slot.lock().is_attachment(), "child flag untouched");
}

#[test]
fn free_attachment_follows_owner_and_leaves_fanout() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let handle = load_into_manager(&mut manager, &source, "carrier", "carrier");

    let parent = manager.create_model_instance(handle).unwrap();
    let child = manager.create_model_instance(handle).unwrap();

    let offset = Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0));
    assert!(manager.attach_instance(parent, 1, child, AttachmentKind::Free, offset));

    let child_slot = manager.instance(child).unwrap();
    assert!(child_slot.lock().is_attachment(), "child excluded from fan-out");

    manager.update(0.016, &FrameContext::default());
    let world: Vec3 = child_slot.lock().world_matrix().translation.into();
    assert!(
        (world - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-5,
        "child placed under owner's matrix with the offset, got {world}"
    );

    assert!(manager.detach_instance(parent, 1));
    assert!(!child_slot.lock().is_attachment(), "detach restores fan-out");
}

#[test]
fn bone_attachment_follows_bone_global_matrix() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());

    let mut source = build_three_node_model();
    source.skeleton_mut().create_bone(
        "hand",
        None,
        Affine3A::IDENTITY,
        Affine3A::from_translation(Vec3::new(0.0, 2.0, 0.0)),
    );
    let handle = load_into_manager(&mut manager, &source, "rigged", "rigged");

    let parent = manager.create_model_instance(handle).unwrap();
    let child = manager.create_model_instance(handle).unwrap();

    let offset = Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0));
    assert!(manager.attach_instance(
        parent,
        1,
        child,
        AttachmentKind::Bone(rig::interner::intern("hand")),
        offset,
    ));

    manager.update(0.016, &FrameContext::default());
    let child_slot = manager.instance(child).unwrap();
    let world: Vec3 = child_slot.lock().world_matrix().translation.into();
    assert!(
        (world - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5,
        "child placed under the bone's global matrix, got {world}"
    );
}

#[test]
fn destroyed_instance_releases_attachments() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let handle = load_into_manager(&mut manager, &source, "owner", "owner");

    let parent = manager.create_model_instance(handle).unwrap();
    let child = manager.create_model_instance(handle).unwrap();
    assert!(manager.attach_instance(parent, 1, child, AttachmentKind::Free, Affine3A::IDENTITY));

    assert!(manager.destroy_model_instance(parent));
    let child_slot = manager.instance(child).unwrap();
    assert!(
        !child_slot.lock().is_attachment(),
        "orphaned child returns to the top-level fan-out"
    );
}

// ============================================================================
// Instance update basics
// ============================================================================

#[test]
fn instance_world_matrix_composes_model_local() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let mut source = build_three_node_model();
    source.transform.position = Vec3::new(3.0, 0.0, 0.0);
    let handle = load_into_manager(&mut manager, &source, "offset", "offset");

    let instance = manager.create_model_instance(handle).unwrap();
    manager.update(0.016, &FrameContext::default());

    let slot = manager.instance(instance).unwrap();
    let world: Vec3 = slot.lock().world_matrix().translation.into();
    assert!((world - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
}

#[test]
fn late_attacher_gets_completion_callback() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let handle = load_into_manager(&mut manager, &source, "late", "late");

    // Model already Complete: the callback must fire inside create
    let instance = manager.create_model_instance(handle).unwrap();
    let slot = manager.instance(instance).unwrap();
    assert_eq!(
        slot.lock().load_result(),
        Some(true),
        "late attachers must not miss the completion event"
    );
}

// Shared `Arc` so the assertion sees the flag even though the callback is
// moved into the instance.
#[test]
fn completion_callback_fires_on_success() {
    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let source = build_three_node_model();
    let path = temp_path("callback");
    rig::assets::model_file::save_file(&source, &path).expect("save");

    let handle = manager
        .create_model("callback", LoadSpec::Native(path.clone()))
        .unwrap();
    let instance = manager.create_model_instance(handle).unwrap();

    let fired = Arc::new(flag::Flag::default());
    {
        let fired = Arc::clone(&fired);
        manager
            .instance(instance)
            .unwrap()
            .lock()
            .set_load_callback(Box::new(move |success| fired.set(success)));
    }

    let state = pump_until_terminal(&mut manager, handle);
    std::fs::remove_file(path).ok();
    assert_eq!(state, ModelState::Complete);
    assert_eq!(fired.get(), Some(true));
}

/// Tiny atomic tri-state flag for callback assertions.
mod flag {
    use std::sync::atomic::{AtomicU8, Ordering};

    #[derive(Default)]
    pub struct Flag(AtomicU8);

    impl Flag {
        pub fn set(&self, success: bool) {
            self.0.store(if success { 2 } else { 1 }, Ordering::SeqCst);
        }

        pub fn get(&self) -> Option<bool> {
            match self.0.load(Ordering::SeqCst) {
                0 => None,
                1 => Some(false),
                _ => Some(true),
            }
        }
    }
}
