//! Motion assets and keyframe sampling.
//!
//! A [`Motion`] is a shared, read-only animation asset: per-bone keyframe
//! tracks over a fixed `[start, end]` time range plus an ordered list of
//! timed events. Sampling writes into a per-player
//! [`MotionRecorder`](crate::motion::MotionRecorder).

use glam::{Affine3A, Quat, Vec3, Vec4};

use crate::motion::recorder::MotionRecorder;
use crate::utils::Symbol;

/// How many bracketing steps the local scan takes before falling back to a
/// binary search.
const MAX_SCAN_OFFSET: usize = 3;

/// One keyframe of a bone track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub scale: Vec3,
    pub rotation: Quat,
    pub position: Vec3,
}

/// A sampled bone transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrsSample {
    pub scale: Vec3,
    pub rotation: Quat,
    pub position: Vec3,
}

impl TrsSample {
    pub const IDENTITY: Self = Self {
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    #[must_use]
    pub fn from_keyframe(key: &Keyframe) -> Self {
        Self {
            scale: key.scale,
            rotation: key.rotation,
            position: key.position,
        }
    }

    /// Linear-in-time interpolation of every TRS component.
    ///
    /// The rotation is a raw component lerp, not a spherical interpolation;
    /// the result is normalized only because matrix composition requires a
    /// unit quaternion.
    #[must_use]
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let qa = Vec4::from(a.rotation);
        let mut qb = Vec4::from(b.rotation);
        // Keep both endpoints in the same hemisphere so the component lerp
        // does not pass through zero.
        if qa.dot(qb) < 0.0 {
            qb = -qb;
        }
        Self {
            scale: a.scale.lerp(b.scale, t),
            rotation: Quat::from_vec4(qa.lerp(qb, t)).normalize(),
            position: a.position.lerp(b.position, t),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Time-ordered keyframes of one bone.
#[derive(Debug, Clone)]
pub struct BoneTrack {
    pub bone: Symbol,
    pub keys: Vec<Keyframe>,
}

impl BoneTrack {
    /// Samples the track at `play_time`.
    ///
    /// Outside the keyframe range the boundary transform is returned,
    /// never extrapolated; the clamp direction flips with `inverse`. For
    /// interior times the bracketing pair is estimated from the motion's
    /// fixed sampling `interval` (valid under near-uniform spacing), a few
    /// steps are walked in the playback direction, and a binary search over
    /// the whole track covers large jumps and irregular spacing.
    #[must_use]
    pub fn sample(&self, interval: f32, play_time: f32, inverse: bool) -> Option<TrsSample> {
        let keys = &self.keys;
        let first = keys.first()?;
        let last = keys.last()?;

        if play_time <= first.time {
            let key = if inverse { last } else { first };
            return Some(TrsSample::from_keyframe(key));
        }
        if play_time >= last.time {
            let key = if inverse { first } else { last };
            return Some(TrsSample::from_keyframe(key));
        }

        let len = keys.len();
        let mut estimate = if interval > 1e-6 {
            ((play_time - first.time) / interval) as usize
        } else {
            0
        };
        if estimate > len - 2 {
            estimate = len - 2;
        }

        let mut found = None;
        for step in 0..=MAX_SCAN_OFFSET {
            let idx = if inverse {
                match estimate.checked_sub(step) {
                    Some(i) => i,
                    None => break,
                }
            } else {
                let i = estimate + step;
                if i > len - 2 {
                    break;
                }
                i
            };
            if keys[idx].time <= play_time && play_time < keys[idx + 1].time {
                found = Some(idx);
                break;
            }
        }

        let idx = found.unwrap_or_else(|| {
            let next = keys.partition_point(|k| k.time <= play_time);
            next.saturating_sub(1).min(len - 2)
        });

        let k0 = &keys[idx];
        let k1 = &keys[idx + 1];
        let dt = k1.time - k0.time;
        let t = if dt > 1e-6 {
            ((play_time - k0.time) / dt).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(TrsSample::lerp(
            &TrsSample::from_keyframe(k0),
            &TrsSample::from_keyframe(k1),
            t,
        ))
    }
}

/// A timed event carried by a motion (footstep, hit frame, sound cue).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub time: f32,
    pub name: Symbol,
}

/// Shared animation asset.
#[derive(Debug, Clone)]
pub struct Motion {
    pub name: String,
    pub start_time: f32,
    pub end_time: f32,
    /// Fixed keyframe sampling interval used for bracketing estimates.
    pub interval: f32,
    tracks: Vec<BoneTrack>,
    /// Ascending by time.
    events: Vec<MotionEvent>,
}

impl Motion {
    #[must_use]
    pub fn new(name: impl Into<String>, start_time: f32, end_time: f32, interval: f32) -> Self {
        Self {
            name: name.into(),
            start_time,
            end_time,
            interval,
            tracks: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: BoneTrack) {
        self.tracks.push(track);
    }

    #[inline]
    #[must_use]
    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }

    /// Replaces the event list, restoring the time ordering.
    pub fn set_events(&mut self, mut events: Vec<MotionEvent>) {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.events = events;
    }

    #[inline]
    #[must_use]
    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Samples every bone track into `recorder` and queues the events whose
    /// timestamp falls in `(last_play_time, play_time]`.
    ///
    /// Calling again with an unchanged `play_time` while the recorder holds
    /// samples is a no-op (memoization guard).
    pub fn update(&self, recorder: &mut MotionRecorder, play_time: f32, inverse: bool) {
        if recorder.last_play_time == Some(play_time) && !recorder.is_empty() {
            return;
        }
        let last_play_time = recorder.last_play_time.unwrap_or(f32::NEG_INFINITY);

        for track in &self.tracks {
            if let Some(sample) = track.sample(self.interval, play_time, inverse) {
                recorder.record(track.bone, sample);
            }
        }

        for event in &self.events {
            if event.time > last_play_time && event.time <= play_time {
                recorder.push_event(*event);
            }
        }

        recorder.last_play_time = Some(play_time);
    }
}
