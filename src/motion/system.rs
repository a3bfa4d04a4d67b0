//! Per-instance motion playback and layer blending.
//!
//! A [`MotionSystem`] drives up to [`MAX_MOTION_LAYERS`] named layers, each
//! an independent player (speed, weight, blend time, loop count, pause,
//! inverse) over one shared [`Motion`]. Every frame the system advances
//! each active layer's time and blend weight, samples into the layer's
//! recorder, and feeds the blended per-bone transforms into a
//! [`SkeletonInstance`].

use std::sync::Arc;

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use crate::motion::clip::{Motion, TrsSample};
use crate::motion::recorder::MotionRecorder;
use crate::skeleton::{Skeleton, SkeletonInstance};
use crate::utils::{Symbol, interner};

/// Maximum number of simultaneously active layers.
pub const MAX_MOTION_LAYERS: usize = 4;

/// Playback parameters for [`MotionSystem::play`].
#[derive(Debug, Clone, Copy)]
pub struct MotionPlayParams {
    pub speed: f32,
    /// Target blend weight once fade-in completes.
    pub weight: f32,
    /// Seconds to ramp the weight in (and out on stop). Zero snaps.
    pub blend_time: f32,
    /// `None` loops forever.
    pub loops: Option<u32>,
    pub inverse: bool,
}

impl Default for MotionPlayParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            weight: 1.0,
            blend_time: 0.0,
            loops: None,
            inverse: false,
        }
    }
}

/// One playback layer.
#[derive(Debug, Clone)]
pub struct MotionLayer {
    name: Symbol,
    motion: Arc<Motion>,
    recorder: MotionRecorder,
    time: f32,
    speed: f32,
    weight: f32,
    target_weight: f32,
    blend_time: f32,
    remaining_loops: Option<u32>,
    paused: bool,
    inverse: bool,
    fading_out: bool,
    finished: bool,
}

impl MotionLayer {
    fn new(name: Symbol, motion: Arc<Motion>, params: MotionPlayParams) -> Self {
        let time = if params.inverse {
            motion.end_time
        } else {
            motion.start_time
        };
        Self {
            name,
            motion,
            recorder: MotionRecorder::new(),
            time,
            speed: params.speed,
            weight: if params.blend_time > 0.0 { 0.0 } else { params.weight },
            target_weight: params.weight,
            blend_time: params.blend_time,
            remaining_loops: params.loops,
            paused: false,
            inverse: params.inverse,
            fading_out: false,
            finished: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn motion(&self) -> &Arc<Motion> {
        &self.motion
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn recorder_mut(&mut self) -> &mut MotionRecorder {
        &mut self.recorder
    }

    fn advance(&mut self, dt: f32) {
        // Blend weight ramps even while paused so a stop always completes.
        let target = if self.fading_out { 0.0 } else { self.target_weight };
        if self.blend_time > 0.0 {
            let step = dt / self.blend_time;
            if self.weight < target {
                self.weight = (self.weight + step).min(target);
            } else if self.weight > target {
                self.weight = (self.weight - step).max(target);
            }
        } else {
            self.weight = target;
        }
        if self.fading_out && self.weight <= 0.0 {
            self.finished = true;
            return;
        }

        if self.paused {
            return;
        }

        let duration = self.motion.duration();
        let dir = if self.inverse { -1.0 } else { 1.0 };
        self.time += dt * self.speed * dir;

        if duration <= 0.0 {
            self.time = self.motion.start_time;
        } else if self.inverse {
            while self.time < self.motion.start_time {
                if self.consume_loop() {
                    self.time += duration;
                } else {
                    self.time = self.motion.start_time;
                    self.paused = true;
                    break;
                }
            }
        } else {
            while self.time > self.motion.end_time {
                if self.consume_loop() {
                    self.time -= duration;
                } else {
                    self.time = self.motion.end_time;
                    self.paused = true;
                    break;
                }
            }
        }

        self.motion.update(&mut self.recorder, self.time, self.inverse);
    }

    /// Returns true when another loop may start.
    fn consume_loop(&mut self) -> bool {
        match self.remaining_loops.as_mut() {
            None => true,
            Some(0 | 1) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// Composition of all motion layers of one model instance.
#[derive(Debug, Clone, Default)]
pub struct MotionSystem {
    layers: SmallVec<[MotionLayer; MAX_MOTION_LAYERS]>,
}

impl MotionSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the named layer.
    ///
    /// Returns false when all [`MAX_MOTION_LAYERS`] slots are taken by
    /// other layers.
    pub fn play(&mut self, name: &str, motion: Arc<Motion>, params: MotionPlayParams) -> bool {
        let sym = interner::intern(name);
        if let Some(layer) = self.layers.iter_mut().find(|l| l.name == sym) {
            *layer = MotionLayer::new(sym, motion, params);
            return true;
        }
        if self.layers.len() >= MAX_MOTION_LAYERS {
            log::warn!("all {MAX_MOTION_LAYERS} motion layers busy, cannot play '{name}'");
            return false;
        }
        self.layers.push(MotionLayer::new(sym, motion, params));
        true
    }

    /// Fades the named layer out over its blend time (or drops it
    /// immediately when the blend time is zero).
    pub fn stop(&mut self, name: &str) -> bool {
        let Some(sym) = interner::get(name) else {
            return false;
        };
        if let Some(layer) = self.layers.iter_mut().find(|l| l.name == sym) {
            if layer.blend_time > 0.0 {
                layer.fading_out = true;
            } else {
                layer.finished = true;
            }
            true
        } else {
            false
        }
    }

    pub fn stop_all(&mut self) {
        self.layers.clear();
    }

    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&MotionLayer> {
        let sym = interner::get(name)?;
        self.layers.iter().find(|l| l.name == sym)
    }

    #[must_use]
    pub fn layer_mut(&mut self, name: &str) -> Option<&mut MotionLayer> {
        let sym = interner::get(name)?;
        self.layers.iter_mut().find(|l| l.name == sym)
    }

    pub fn set_paused(&mut self, name: &str, paused: bool) {
        if let Some(layer) = self.layer_mut(name) {
            layer.paused = paused;
        }
    }

    pub fn set_speed(&mut self, name: &str, speed: f32) {
        if let Some(layer) = self.layer_mut(name) {
            layer.speed = speed;
        }
    }

    #[inline]
    #[must_use]
    pub fn active_layers(&self) -> usize {
        self.layers.len()
    }

    /// Advances time and blend weight of every layer and drops the ones
    /// that finished fading out.
    pub fn advance(&mut self, dt: f32) {
        for layer in &mut self.layers {
            layer.advance(dt);
        }
        self.layers.retain(|l| !l.finished);
    }

    /// Blends the layers' recorded samples by weight and feeds the result
    /// into the skeleton instance, one `set_motion_matrix` per bone.
    pub fn apply(&self, skeleton: &Skeleton, instance: &mut SkeletonInstance) {
        if self.layers.is_empty() {
            return;
        }

        for bone in skeleton.bones() {
            let mut total_weight = 0.0_f32;
            let mut scale = Vec3::ZERO;
            let mut position = Vec3::ZERO;
            let mut rotation = Vec4::ZERO;
            let mut reference = Vec4::ZERO;

            for layer in &self.layers {
                if layer.weight <= 0.0 {
                    continue;
                }
                let Some(sample) = layer.recorder.sample(bone.name) else {
                    continue;
                };
                let mut q = Vec4::from(sample.rotation);
                if total_weight == 0.0 {
                    reference = q;
                } else if reference.dot(q) < 0.0 {
                    q = -q;
                }
                scale += sample.scale * layer.weight;
                position += sample.position * layer.weight;
                rotation += q * layer.weight;
                total_weight += layer.weight;
            }

            if total_weight > 0.0 {
                let inv = 1.0 / total_weight;
                let blended = TrsSample {
                    scale: scale * inv,
                    position: position * inv,
                    rotation: glam::Quat::from_vec4(rotation * inv).normalize(),
                };
                instance.set_motion_matrix(bone.index, blended.to_affine());
            }
        }
    }
}
