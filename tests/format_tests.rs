//! Native Binary Format Tests
//!
//! Tests for:
//! - Model save → load → save round-trip, byte-for-byte
//! - Node, subset, bone-hierarchy and AABB fidelity across a round trip
//! - Malformed input: unknown node-type tags, truncated streams
//! - Motion save/load round-trip

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};

use rig::assets::{LoadSpec, ResourceManager, ResourceManagerDesc, SkinnedVertex, StaticVertex};
use rig::assets::{model_file, motion_file};
use rig::interner;
use rig::model::node::{Aabb, ModelNode, NodeKind, NodeLod, Subset};
use rig::model::{Material, Model, ModelHandle};
use rig::motion::{BoneTrack, Keyframe, Motion};
use rig::render::{CpuMeshData, PrimitiveTopology};
use rig::skeleton::INVALID_BONE_INDEX;
use rig::{ModelState, RigError};

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("rig_format_test_{}_{name}.model", std::process::id()));
    path
}

fn pump_until_terminal(manager: &mut ResourceManager, handle: ModelHandle) -> ModelState {
    for _ in 0..5000 {
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

/// A skinned body node with a static prop child attached to a bone.
fn build_hero() -> Model {
    let mut model = Model::new(interner::intern("hero"), "hero");
    model.transform.position = Vec3::new(1.0, 2.0, 3.0);
    model.transform.scale = Vec3::splat(2.0);
    model.transform.rotation = Quat::from_rotation_y(0.5);

    {
        let skeleton = model.skeleton_mut();
        skeleton.create_bone(
            "pelvis",
            None,
            Affine3A::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            Affine3A::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        );
        skeleton.create_bone(
            "spine",
            Some("pelvis"),
            Affine3A::from_translation(Vec3::new(0.0, -2.0, 0.0)),
            Affine3A::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        );
        skeleton.create_bone(
            "hand",
            Some("spine"),
            Affine3A::from_translation(Vec3::new(-0.5, -2.0, 0.0)),
            Affine3A::from_translation(Vec3::new(0.5, 0.0, 0.0)),
        );
        skeleton.register_binding(
            "body",
            vec![
                interner::intern("pelvis"),
                interner::intern("spine"),
                interner::intern("hand"),
            ],
        );
    }

    let skinned_vertices = [
        SkinnedVertex {
            position: [0.0, 0.0, 0.0],
            uv: [0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            bone_weights: [1.0, 0.0, 0.0],
            bone_indices: [0, 1, 2, 0],
        },
        SkinnedVertex {
            position: [1.0, 0.0, 0.0],
            uv: [1.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            bone_weights: [0.5, 0.25, 0.25],
            bone_indices: [0, 1, 2, 0],
        },
        SkinnedVertex {
            position: [0.0, 1.0, 0.0],
            uv: [0.0, 1.0],
            normal: [0.0, 1.0, 0.0],
            bone_weights: [0.25, 0.5, 0.25],
            bone_indices: [1, 2, 0, 0],
        },
    ];
    let mut body = ModelNode::new(
        "body",
        NodeKind::Skinned {
            binding: interner::intern("body"),
            bone_count: 3,
        },
    );
    body.bounds = Aabb {
        center: Vec3::new(0.25, 0.5, 0.0),
        extents: Vec3::new(0.5, 0.5, 0.1),
    };
    body.lods.push(NodeLod {
        vertex_buffer: None,
        index_buffer: None,
        subsets: vec![Subset {
            name: "main".to_string(),
            start_index: 0,
            index_count: 3,
            material_id: 0,
            topology: PrimitiveTopology::TriangleList,
        }],
    });
    body.materials.push(Material::new(interner::intern("skin")));
    body.cpu = Arc::new(CpuMeshData {
        vertex_stride: std::mem::size_of::<SkinnedVertex>() as u32,
        vertices: bytemuck::cast_slice(&skinned_vertices).to_vec(),
        indices: vec![0, 1, 2],
    });
    model.add_node(body, None);

    let static_vertices = [
        StaticVertex {
            position: [0.0, 0.0, 0.0],
            uv: [0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
        },
        StaticVertex {
            position: [1.0, 0.0, 0.0],
            uv: [1.0, 0.0],
            normal: [0.0, 0.0, 1.0],
        },
        StaticVertex {
            position: [0.0, 1.0, 0.0],
            uv: [0.0, 1.0],
            normal: [0.0, 0.0, 1.0],
        },
    ];
    let mut prop = ModelNode::new("prop", NodeKind::Static);
    prop.attached_bone = Some(interner::intern("hand"));
    prop.bounds = Aabb {
        center: Vec3::ZERO,
        extents: Vec3::splat(0.25),
    };
    prop.lods.push(NodeLod {
        vertex_buffer: None,
        index_buffer: None,
        subsets: vec![Subset {
            name: "prop".to_string(),
            start_index: 0,
            index_count: 3,
            material_id: 0,
            topology: PrimitiveTopology::TriangleStrip,
        }],
    });
    prop.materials.push(Material::new(interner::intern("wood")));
    prop.cpu = Arc::new(CpuMeshData {
        vertex_stride: std::mem::size_of::<StaticVertex>() as u32,
        vertices: bytemuck::cast_slice(&static_vertices).to_vec(),
        indices: vec![0, 1, 2],
    });
    model.add_node(prop, Some("body"));

    model
}

// ============================================================================
// Model round-trip
// ============================================================================

#[test]
fn model_round_trip_preserves_structure() {
    let source = build_hero();

    let mut bytes = Vec::new();
    model_file::save(&source, &mut bytes).expect("save");

    let path = temp_path("round_trip");
    std::fs::write(&path, &bytes).expect("write temp file");

    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let handle = manager
        .create_model("hero_rt", LoadSpec::Native(path.clone()))
        .unwrap();
    let state = pump_until_terminal(&mut manager, handle);
    std::fs::remove_file(&path).ok();
    assert_eq!(state, ModelState::Complete);

    let loaded = manager.model(handle).unwrap();

    // Identity and transform
    assert_eq!(loaded.name, "hero");
    assert!((loaded.transform.position - source.transform.position).length() < 1e-6);

    // Node hierarchy
    assert_eq!(loaded.node_count(), source.node_count());
    let body = loaded.get_node("body").expect("body node");
    let prop = loaded.get_node("prop").expect("prop node");
    assert!(matches!(body.kind, NodeKind::Skinned { bone_count: 3, .. }));
    assert_eq!(prop.parent(), loaded.node_index_of("body"));
    assert_eq!(prop.attached_bone, Some(interner::intern("hand")));

    // Subset layout
    let subsets = &body.lods[0].subsets;
    assert_eq!(subsets.len(), 1);
    assert_eq!(subsets[0].index_count, 3);
    assert_eq!(subsets[0].topology, PrimitiveTopology::TriangleList);
    assert_eq!(
        prop.lods[0].subsets[0].topology,
        PrimitiveTopology::TriangleStrip
    );

    // Bone hierarchy: names and parent links
    let skeleton = loaded.skeleton();
    assert_eq!(skeleton.bone_count(), 3);
    let spine = skeleton.bone(skeleton.find_bone("spine").unwrap()).unwrap();
    assert_eq!(spine.parent_index, skeleton.find_bone("pelvis").unwrap());
    let pelvis = skeleton.bone(0).unwrap();
    assert_eq!(pelvis.parent_index, INVALID_BONE_INDEX);

    // AABB within float tolerance
    assert!((body.bounds.center - Vec3::new(0.25, 0.5, 0.0)).length() < 1e-6);
    assert!((body.bounds.extents - Vec3::new(0.5, 0.5, 0.1)).length() < 1e-6);

    // Raw geometry
    assert_eq!(body.cpu.vertex_count(), 3);
    assert_eq!(body.cpu.indices, vec![0, 1, 2]);
}

#[test]
fn save_load_save_is_byte_identical() {
    let source = build_hero();

    let mut first = Vec::new();
    model_file::save(&source, &mut first).expect("first save");

    let path = temp_path("byte_identical");
    std::fs::write(&path, &first).expect("write temp file");

    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let handle = manager
        .create_model("hero_bytes", LoadSpec::Native(path.clone()))
        .unwrap();
    let state = pump_until_terminal(&mut manager, handle);
    std::fs::remove_file(&path).ok();
    assert_eq!(state, ModelState::Complete);

    let mut second = Vec::new();
    model_file::save(manager.model(handle).unwrap(), &mut second).expect("second save");

    assert_eq!(first, second, "save → load → save must round-trip exactly");
}

// ============================================================================
// Malformed input
// ============================================================================

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend((s.len() as u16).to_le_bytes());
    buf.extend(s.as_bytes());
}

#[test]
fn unknown_node_type_tag_is_rejected() {
    let mut buf = Vec::new();
    push_str(&mut buf, "m");
    for _ in 0..10 {
        // pos(3) + scale(3) + rot(4)
        buf.extend(0f32.to_le_bytes());
    }
    buf.extend(1u32.to_le_bytes()); // node count
    buf.extend(99u32.to_le_bytes()); // bogus type tag

    let err = model_file::load(&mut buf.as_slice()).unwrap_err();
    assert!(
        matches!(err, RigError::MalformedAsset(_)),
        "expected MalformedAsset, got {err}"
    );
}

#[test]
fn truncated_stream_is_an_error() {
    let bytes = [0u8, 1u8];
    assert!(model_file::load(&mut bytes.as_ref()).is_err());
}

// ============================================================================
// Motion round-trip
// ============================================================================

fn build_motion() -> Motion {
    let mut motion = Motion::new("wave", 0.0, 2.0, 0.5);
    for (bone, amplitude) in [("hand", 1.0f32), ("forearm", 0.5)] {
        motion.add_track(BoneTrack {
            bone: interner::intern(bone),
            keys: (0..5)
                .map(|i| {
                    let t = i as f32 * 0.5;
                    Keyframe {
                        time: t,
                        scale: Vec3::ONE,
                        rotation: Quat::from_rotation_z(amplitude * t),
                        position: Vec3::new(0.0, amplitude * t, 0.0),
                    }
                })
                .collect(),
        });
    }
    motion
}

#[test]
fn motion_round_trip_preserves_tracks() {
    let source = build_motion();

    let mut bytes = Vec::new();
    motion_file::save(&source, &mut bytes).expect("save");
    let loaded = motion_file::load(&mut bytes.as_slice()).expect("load");

    assert_eq!(loaded.name, "wave");
    assert!((loaded.start_time - 0.0).abs() < f32::EPSILON);
    assert!((loaded.end_time - 2.0).abs() < f32::EPSILON);
    assert!((loaded.interval - 0.5).abs() < f32::EPSILON);

    assert_eq!(loaded.tracks().len(), 2);
    for (a, b) in source.tracks().iter().zip(loaded.tracks()) {
        assert_eq!(a.bone, b.bone);
        assert_eq!(a.keys.len(), b.keys.len());
        for (ka, kb) in a.keys.iter().zip(&b.keys) {
            assert!((ka.time - kb.time).abs() < f32::EPSILON);
            assert!((ka.position - kb.position).length() < 1e-7);
            assert!((ka.rotation.xyz() - kb.rotation.xyz()).length() < 1e-7);
        }
    }

    // And the second save is byte-identical
    let mut second = Vec::new();
    motion_file::save(&loaded, &mut second).expect("second save");
    assert_eq!(bytes, second);
}

#[test]
fn motion_file_round_trips_through_manager() {
    let motion = build_motion();
    let path = temp_path("wave_motion");
    motion_file::save_file(&motion, &path).expect("save file");

    let mut manager = ResourceManager::new(&ResourceManagerDesc::default());
    let handle = manager.load_motion("wave", &path).expect("load");
    std::fs::remove_file(&path).ok();

    let cached = manager.get_motion("wave").unwrap();
    assert_eq!(cached.name, "wave");
    assert_eq!(cached.tracks().len(), 2);
    assert_eq!(manager.get_motion_handle("wave"), Some(handle));
}
