//! Shared per-frame bone-matrix buffer.
//!
//! Skinned nodes allocate a contiguous range sized to their bone count,
//! pack their skinning matrices into it, and put the resulting [`BoneRange`]
//! on the draw record instead of raw matrices. The buffer is reset at the
//! start of every frame; ranges from the previous frame stay meaningful to
//! the backend because it snapshots the buffer on upload.

use glam::Mat4;

/// A slot in the frame's bone-matrix buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneRange {
    pub offset: u32,
    pub count: u32,
}

/// Ring allocator over one frame's worth of bone matrices.
pub struct BoneMatrixRing {
    matrices: Vec<Mat4>,
    head: usize,
}

impl BoneMatrixRing {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; capacity],
            head: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.matrices.len()
    }

    /// Number of matrices allocated so far this frame.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.head
    }

    /// Resets the allocator for a new frame. The matrix contents are left
    /// in place; the backend has already consumed them.
    pub fn begin_frame(&mut self) {
        self.head = 0;
    }

    /// Reserves `count` consecutive slots.
    ///
    /// Returns `None` when the frame budget is spent; the caller skips the
    /// draw rather than corrupting earlier ranges.
    pub fn allocate(&mut self, count: u32) -> Option<BoneRange> {
        let count_usize = count as usize;
        if self.head + count_usize > self.matrices.len() {
            log::warn!(
                "bone matrix ring overflow: {} used, {} requested, {} capacity",
                self.head,
                count,
                self.matrices.len()
            );
            return None;
        }
        let range = BoneRange {
            offset: self.head as u32,
            count,
        };
        self.head += count_usize;
        Some(range)
    }

    /// Writes one matrix into an allocated range, applying the transposed
    /// layout the skinning shader reads. This is a repack, not a math
    /// correction.
    #[inline]
    pub fn pack(&mut self, range: BoneRange, index: u32, matrix: Mat4) {
        debug_assert!(index < range.count);
        self.matrices[(range.offset + index) as usize] = matrix.transpose();
    }

    /// The packed matrices for backend upload.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[Mat4] {
        &self.matrices[..self.head]
    }
}
