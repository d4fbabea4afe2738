//! Length-prefixed framing over a byte stream.
//!
//! Format: [4 bytes big-endian length][payload]

use std::collections::VecDeque;

pub const FRAME_HEADER_SIZE: usize = 4;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max {1})")]
    TooLarge(usize, usize),
}

pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Vec<u8>, FrameError> {
    if payload.len() > max_frame_size {
        return Err(FrameError::TooLarge(payload.len(), max_frame_size));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reassembles frames from arbitrarily split reads.
///
/// An oversized frame is reported once and its payload is discarded as it
/// arrives, leaving the stream aligned on the next frame.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: VecDeque<u8>,
    skip_remaining: usize,
    max_frame_size: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameBuffer {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            skip_remaining: 0,
            max_frame_size,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        if self.skip_remaining > 0 {
            let skipped = self.skip_remaining.min(self.pending.len());
            self.pending.drain(..skipped);
            self.skip_remaining -= skipped;
            if self.skip_remaining > 0 {
                return None;
            }
        }

        if self.pending.len() < FRAME_HEADER_SIZE {
            return None;
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        for (slot, byte) in header.iter_mut().zip(self.pending.iter()) {
            *slot = *byte;
        }
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_size {
            self.pending.drain(..FRAME_HEADER_SIZE);
            self.skip_remaining = len;
            return Some(Err(FrameError::TooLarge(len, self.max_frame_size)));
        }

        if self.pending.len() < FRAME_HEADER_SIZE + len {
            return None;
        }

        self.pending.drain(..FRAME_HEADER_SIZE);
        Some(Ok(self.pending.drain(..len).collect()))
    }
}
