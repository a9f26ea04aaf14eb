//! Pre-speech prefix ring buffer.
//!
//! Keeps a rolling window of the most recent frames while the gate is idle.
//! When speech onset is confirmed, the window is flushed ahead of the live
//! audio so soft utterance onsets are never clipped.

use crate::audio::frame::samples_to_le_bytes;

/// Fixed-capacity ring of fixed-size frame copies.
///
/// Reads are non-destructive; past capacity the oldest slot is overwritten.
/// `clear()` resets the indices only — stale slot contents are masked by the
/// count, not zeroed.
#[derive(Debug, Clone)]
pub struct PrefixRingBuffer {
    /// Slot storage, `capacity * frame_size` samples.
    slots: Vec<i16>,
    frame_size: usize,
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl PrefixRingBuffer {
    /// Creates a buffer holding `capacity` frames of `frame_size` samples each.
    ///
    /// A zero capacity is clamped to one frame.
    pub fn new(capacity: usize, frame_size: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![0; capacity * frame_size],
            frame_size,
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    /// Copies a frame into the next write slot.
    ///
    /// Frames longer than the slot are truncated; shorter frames are
    /// zero-padded to the full slot width.
    pub fn add_frame(&mut self, samples: &[i16]) {
        let start = self.write_index * self.frame_size;
        let slot = &mut self.slots[start..start + self.frame_size];

        let copy_len = samples.len().min(self.frame_size);
        slot[..copy_len].copy_from_slice(&samples[..copy_len]);
        slot[copy_len..].fill(0);

        self.write_index = (self.write_index + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);
    }

    /// Returns the frame at logical index `i`, where 0 is the oldest held frame.
    pub fn frame(&self, i: usize) -> Option<&[i16]> {
        if i >= self.count {
            return None;
        }

        // Oldest frame sits at write_index once the ring has wrapped.
        let oldest = if self.count == self.capacity {
            self.write_index
        } else {
            0
        };
        let physical = (oldest + i) % self.capacity;
        let start = physical * self.frame_size;
        Some(&self.slots[start..start + self.frame_size])
    }

    /// Concatenates all held frames in chronological order.
    pub fn all_frames(&self) -> Vec<i16> {
        let mut out = Vec::with_capacity(self.count * self.frame_size);
        for i in 0..self.count {
            if let Some(frame) = self.frame(i) {
                out.extend_from_slice(frame);
            }
        }
        out
    }

    /// Concatenates all held frames as little-endian PCM16 bytes.
    ///
    /// This is exactly the payload flushed on speech onset.
    pub fn all_frames_as_bytes(&self) -> Vec<u8> {
        samples_to_le_bytes(&self.all_frames())
    }

    /// Resets the write index and count without zeroing slot contents.
    pub fn clear(&mut self) {
        self.write_index = 0;
        self.count = 0;
    }

    /// Returns the number of frames currently held.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no frames are held.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the frame capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
