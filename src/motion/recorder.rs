//! Per-player sampling scratch.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::motion::clip::{MotionEvent, TrsSample};
use crate::utils::Symbol;

/// Scratch state one motion layer samples into.
///
/// Holds the last-sampled transform per bone, the FIFO of events not yet
/// consumed by gameplay code, and the last play time used as the
/// memoization guard by [`Motion::update`](crate::motion::Motion::update).
#[derive(Debug, Clone, Default)]
pub struct MotionRecorder {
    samples: FxHashMap<Symbol, TrsSample>,
    events: VecDeque<MotionEvent>,
    pub(crate) last_play_time: Option<f32>,
}

impl MotionRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while no bone has been sampled yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn last_play_time(&self) -> Option<f32> {
        self.last_play_time
    }

    #[inline]
    pub(crate) fn record(&mut self, bone: Symbol, sample: TrsSample) {
        self.samples.insert(bone, sample);
    }

    /// The last-sampled transform of one bone.
    #[inline]
    #[must_use]
    pub fn sample(&self, bone: Symbol) -> Option<&TrsSample> {
        self.samples.get(&bone)
    }

    pub(crate) fn push_event(&mut self, event: MotionEvent) {
        self.events.push_back(event);
    }

    /// Pops the oldest unconsumed event.
    pub fn poll_event(&mut self) -> Option<MotionEvent> {
        self.events.pop_front()
    }

    #[inline]
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Forgets all samples, events and the memo guard.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.events.clear();
        self.last_play_time = None;
    }
}
