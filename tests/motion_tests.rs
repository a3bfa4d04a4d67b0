//! Motion Sampling and Playback Tests
//!
//! Tests for:
//! - BoneTrack sampling: exact keyframes, interpolation, range clamping
//! - Clamp direction flipping with inverse playback
//! - The raw component-lerp rotation interpolation
//! - Motion::update memoization guard and event windows
//! - MotionSystem layers: looping, pausing, fading, blending

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};

use rig::interner;
use rig::motion::{BoneTrack, Keyframe, Motion, MotionPlayParams, MotionRecorder, MotionSystem};
use rig::skeleton::{Skeleton, SkeletonInstance};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn key_at(time: f32, position: Vec3) -> Keyframe {
    Keyframe {
        time,
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        position,
    }
}

/// Two bones, five uniform keyframes over [0, 4], interval 1.0.
/// "root" moves along +X by t; "arm" moves along +Y by 2t.
fn make_two_bone_motion() -> Motion {
    let mut motion = Motion::new("walk", 0.0, 4.0, 1.0);
    motion.add_track(BoneTrack {
        bone: interner::intern("root"),
        keys: (0..5)
            .map(|i| key_at(i as f32, Vec3::new(i as f32, 0.0, 0.0)))
            .collect(),
    });
    motion.add_track(BoneTrack {
        bone: interner::intern("arm"),
        keys: (0..5)
            .map(|i| key_at(i as f32, Vec3::new(0.0, 2.0 * i as f32, 0.0)))
            .collect(),
    });
    motion
}

// ============================================================================
// BoneTrack: exact and interpolated sampling
// ============================================================================

#[test]
fn sample_exact_keyframe_returns_keyframe_unchanged() {
    let motion = make_two_bone_motion();
    let track = &motion.tracks()[0];

    let sample = track.sample(motion.interval, 2.0, false).unwrap();
    assert!(
        approx_vec3(sample.position, Vec3::new(2.0, 0.0, 0.0)),
        "expected (2,0,0), got {}",
        sample.position
    );
    assert!(approx_vec3(sample.scale, Vec3::ONE));
}

#[test]
fn sample_midpoint_interpolates_linearly() {
    let motion = make_two_bone_motion();

    let root = motion.tracks()[0].sample(motion.interval, 2.5, false).unwrap();
    assert!(
        approx_vec3(root.position, Vec3::new(2.5, 0.0, 0.0)),
        "expected (2.5,0,0), got {}",
        root.position
    );

    let arm = motion.tracks()[1].sample(motion.interval, 2.5, false).unwrap();
    assert!(
        approx_vec3(arm.position, Vec3::new(0.0, 5.0, 0.0)),
        "expected (0,5,0), got {}",
        arm.position
    );
}

#[test]
fn sample_beyond_range_clamps_to_boundary() {
    let motion = make_two_bone_motion();
    let track = &motion.tracks()[0];

    // t=10: clamp to last keyframe, never extrapolated
    let high = track.sample(motion.interval, 10.0, false).unwrap();
    assert!(approx_vec3(high.position, Vec3::new(4.0, 0.0, 0.0)));

    // t=-1: clamp to first keyframe
    let low = track.sample(motion.interval, -1.0, false).unwrap();
    assert!(approx_vec3(low.position, Vec3::ZERO));
}

#[test]
fn clamp_direction_flips_with_inverse() {
    let motion = make_two_bone_motion();
    let track = &motion.tracks()[0];

    let high = track.sample(motion.interval, 10.0, true).unwrap();
    assert!(
        approx_vec3(high.position, Vec3::ZERO),
        "inverse clamp above range should hit the first keyframe"
    );

    let low = track.sample(motion.interval, -1.0, true).unwrap();
    assert!(
        approx_vec3(low.position, Vec3::new(4.0, 0.0, 0.0)),
        "inverse clamp below range should hit the last keyframe"
    );
}

#[test]
fn sample_interior_with_inverse_matches_forward() {
    // Interior interpolation does not depend on playback direction, only
    // the boundary clamps and the scan direction do.
    let motion = make_two_bone_motion();
    let track = &motion.tracks()[0];

    let forward = track.sample(motion.interval, 1.75, false).unwrap();
    let inverse = track.sample(motion.interval, 1.75, true).unwrap();
    assert!(approx_vec3(forward.position, inverse.position));
}

#[test]
fn sample_survives_irregular_spacing() {
    // The interval-based estimate is wrong for this track; the binary
    // search fallback has to find the right bracket anyway.
    let track = BoneTrack {
        bone: interner::intern("root"),
        keys: vec![
            key_at(0.0, Vec3::ZERO),
            key_at(0.1, Vec3::X),
            key_at(3.9, Vec3::new(2.0, 0.0, 0.0)),
            key_at(4.0, Vec3::new(3.0, 0.0, 0.0)),
        ],
    };

    let sample = track.sample(1.0, 2.0, false).unwrap();
    // Bracket is [0.1, 3.9]; t = (2.0 - 0.1) / 3.8 = 0.5
    assert!(
        approx_vec3(sample.position, Vec3::new(1.5, 0.0, 0.0)),
        "expected (1.5,0,0), got {}",
        sample.position
    );
}

#[test]
fn rotation_interpolation_is_component_lerp() {
    let track = BoneTrack {
        bone: interner::intern("root"),
        keys: vec![
            Keyframe {
                time: 0.0,
                scale: Vec3::ONE,
                rotation: Quat::IDENTITY,
                position: Vec3::ZERO,
            },
            Keyframe {
                time: 1.0,
                scale: Vec3::ONE,
                rotation: Quat::from_rotation_y(FRAC_PI_2),
                position: Vec3::ZERO,
            },
        ],
    };

    let sample = track.sample(1.0, 0.5, false).unwrap();
    // Normalized component lerp between these two endpoints lands on the
    // 45-degree rotation.
    let expected = Quat::from_rotation_y(FRAC_PI_2 * 0.5);
    let angle = sample.rotation.angle_between(expected);
    assert!(angle < 1e-4, "expected 45 degree rotation, off by {angle}");
    assert!(
        approx(sample.rotation.length(), 1.0),
        "sampled rotation must be unit length"
    );
}

// ============================================================================
// Motion::update: memoization and events
// ============================================================================

#[test]
fn update_records_all_bone_tracks() {
    let motion = make_two_bone_motion();
    let mut recorder = MotionRecorder::new();

    motion.update(&mut recorder, 1.0, false);
    assert!(recorder.sample(interner::intern("root")).is_some());
    assert!(recorder.sample(interner::intern("arm")).is_some());
    assert_eq!(recorder.last_play_time(), Some(1.0));
}

#[test]
fn update_same_time_twice_is_a_no_op() {
    let mut motion = make_two_bone_motion();
    motion.set_events(vec![rig::motion::MotionEvent {
        time: 1.0,
        name: interner::intern("footstep"),
    }]);
    let mut recorder = MotionRecorder::new();

    motion.update(&mut recorder, 1.5, false);
    assert_eq!(recorder.pending_events(), 1);
    let first = *recorder.sample(interner::intern("root")).unwrap();

    // Same play time again: no new events, unchanged samples
    motion.update(&mut recorder, 1.5, false);
    assert_eq!(
        recorder.pending_events(),
        1,
        "memo guard must not re-emit events"
    );
    let second = *recorder.sample(interner::intern("root")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn events_fire_in_half_open_window() {
    let mut motion = make_two_bone_motion();
    motion.set_events(vec![
        rig::motion::MotionEvent {
            time: 1.0,
            name: interner::intern("left"),
        },
        rig::motion::MotionEvent {
            time: 2.0,
            name: interner::intern("right"),
        },
    ]);
    let mut recorder = MotionRecorder::new();

    // First update covers everything up to 1.5
    motion.update(&mut recorder, 1.5, false);
    assert_eq!(recorder.pending_events(), 1);
    assert_eq!(recorder.poll_event().unwrap().name, interner::intern("left"));

    // (1.5, 2.0] picks up the second event exactly at its timestamp
    motion.update(&mut recorder, 2.0, false);
    assert_eq!(recorder.pending_events(), 1);
    assert_eq!(
        recorder.poll_event().unwrap().name,
        interner::intern("right")
    );

    // Nothing left between 2.0 and 4.0
    motion.update(&mut recorder, 4.0, false);
    assert_eq!(recorder.pending_events(), 0);
}

// ============================================================================
// MotionSystem: layers
// ============================================================================

fn one_bone_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::new();
    skeleton.create_bone("root", None, Affine3A::IDENTITY, Affine3A::IDENTITY);
    skeleton
}

#[test]
fn layer_drives_skeleton_instance() {
    let skeleton = one_bone_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);
    let mut system = MotionSystem::new();

    let motion = Arc::new(make_two_bone_motion());
    assert!(system.play("base", motion, MotionPlayParams::default()));

    system.advance(1.0);
    system.apply(&skeleton, &mut instance);
    instance.update(&skeleton, &Affine3A::IDENTITY);

    let bone = instance.bone(0).unwrap();
    assert!(
        approx_vec3(bone.local.translation.into(), Vec3::new(1.0, 0.0, 0.0)),
        "bone should follow the sampled track, got {}",
        bone.local.translation
    );
}

#[test]
fn layer_count_is_capped() {
    let mut system = MotionSystem::new();
    let motion = Arc::new(make_two_bone_motion());

    for name in ["a", "b", "c", "d"] {
        assert!(system.play(name, Arc::clone(&motion), MotionPlayParams::default()));
    }
    assert!(
        !system.play("e", motion, MotionPlayParams::default()),
        "fifth layer must be rejected"
    );
    assert_eq!(system.active_layers(), 4);
}

#[test]
fn finite_loop_count_clamps_and_pauses() {
    let mut system = MotionSystem::new();
    let motion = Arc::new(make_two_bone_motion());
    system.play(
        "base",
        motion,
        MotionPlayParams {
            loops: Some(1),
            ..Default::default()
        },
    );

    // Duration is 4.0; advancing past the end with one loop left clamps
    system.advance(5.0);
    let layer = system.layer("base").unwrap();
    assert!(approx(layer.time(), 4.0), "time clamped, got {}", layer.time());
    assert!(layer.is_paused(), "exhausted loops should pause the layer");
}

#[test]
fn infinite_loop_wraps() {
    let mut system = MotionSystem::new();
    let motion = Arc::new(make_two_bone_motion());
    system.play("base", motion, MotionPlayParams::default());

    system.advance(5.0);
    let layer = system.layer("base").unwrap();
    assert!(approx(layer.time(), 1.0), "expected wrap to 1.0, got {}", layer.time());
}

#[test]
fn paused_layer_holds_time() {
    let mut system = MotionSystem::new();
    let motion = Arc::new(make_two_bone_motion());
    system.play("base", motion, MotionPlayParams::default());

    system.advance(1.0);
    system.set_paused("base", true);
    system.advance(1.0);
    assert!(approx(system.layer("base").unwrap().time(), 1.0));
}

#[test]
fn stop_with_blend_fades_out_then_removes() {
    let mut system = MotionSystem::new();
    let motion = Arc::new(make_two_bone_motion());
    system.play(
        "base",
        motion,
        MotionPlayParams {
            blend_time: 1.0,
            ..Default::default()
        },
    );

    // Fade in completes
    system.advance(1.0);
    assert!(approx(system.layer("base").unwrap().weight(), 1.0));

    system.stop("base");
    system.advance(0.5);
    let weight = system.layer("base").unwrap().weight();
    assert!(weight < 1.0 && weight > 0.0, "mid-fade weight, got {weight}");

    system.advance(1.0);
    assert!(
        system.layer("base").is_none(),
        "layer should be dropped after fading out"
    );
}

#[test]
fn equal_blend_of_identical_clips_matches_single_layer() {
    let skeleton = one_bone_skeleton();
    let motion = Arc::new(make_two_bone_motion());

    let mut single = MotionSystem::new();
    single.play("only", Arc::clone(&motion), MotionPlayParams::default());
    let mut single_instance = SkeletonInstance::new(&skeleton);
    single.advance(1.5);
    single.apply(&skeleton, &mut single_instance);

    let mut blended = MotionSystem::new();
    let half = MotionPlayParams {
        weight: 0.5,
        ..Default::default()
    };
    blended.play("a", Arc::clone(&motion), half);
    blended.play("b", motion, half);
    let mut blended_instance = SkeletonInstance::new(&skeleton);
    blended.advance(1.5);
    blended.apply(&skeleton, &mut blended_instance);

    single_instance.update(&skeleton, &Affine3A::IDENTITY);
    blended_instance.update(&skeleton, &Affine3A::IDENTITY);
    let a: Vec3 = single_instance.bone(0).unwrap().local.translation.into();
    let b: Vec3 = blended_instance.bone(0).unwrap().local.translation.into();
    assert!(approx_vec3(a, b), "50/50 self-blend must equal single layer");
}
