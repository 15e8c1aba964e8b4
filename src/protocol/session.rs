//! Write-progress tracking for one firmware transfer. Zero-initialized at
//! boot and reset only by device reset; a transfer cannot be restarted
//! mid-session.

use super::MAX_TRANSFER_BLOCKS;

const MASK_BYTES: usize = (MAX_TRANSFER_BLOCKS as usize + 7) / 8;

/// Outcome of offering one received block to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDisposition {
    /// Malformed session parameters; no state was touched.
    Rejected,
    /// The transfer already completed; protects a flashed image from
    /// accidental re-writes during host-side verification passes.
    AlreadyComplete,
    /// This index was seen before; counted once, idempotent.
    Duplicate,
    /// First reception of this index.
    Recorded,
    /// First reception of this index, and it was the last missing one.
    Completed,
}

pub struct TransferTracker {
    /// Declared total, fixed at first observation. Zero means no session yet.
    num_blocks: u32,
    num_received: u32,
    mask: [u8; MASK_BYTES],
}

impl TransferTracker {
    pub const fn new() -> Self {
        TransferTracker {
            num_blocks: 0,
            num_received: 0,
            mask: [0; MASK_BYTES],
        }
    }

    pub fn in_progress(&self) -> bool {
        self.num_blocks != 0
    }

    pub fn is_complete(&self) -> bool {
        self.num_blocks != 0 && self.num_received >= self.num_blocks
    }

    pub fn declared_total(&self) -> u32 {
        self.num_blocks
    }

    pub fn received(&self) -> u32 {
        self.num_received
    }

    pub fn offer(&mut self, block_no: u32, declared_total: u32) -> BlockDisposition {
        if declared_total == 0 || declared_total >= MAX_TRANSFER_BLOCKS {
            return BlockDisposition::Rejected;
        }
        if self.num_blocks != 0 && self.num_blocks != declared_total {
            // A different transfer mid-session; only a device reset starts over.
            return BlockDisposition::Rejected;
        }
        if block_no >= declared_total {
            return BlockDisposition::Rejected;
        }
        if self.is_complete() {
            return BlockDisposition::AlreadyComplete;
        }

        self.num_blocks = declared_total;

        let byte = (block_no / 8) as usize;
        let bit = 1u8 << (block_no % 8);
        if self.mask[byte] & bit != 0 {
            return BlockDisposition::Duplicate;
        }
        self.mask[byte] |= bit;
        self.num_received += 1;

        if self.num_received >= self.num_blocks {
            BlockDisposition::Completed
        } else {
            BlockDisposition::Recorded
        }
    }
}

impl Default for TransferTracker {
    fn default() -> Self {
        TransferTracker::new()
    }
}
