//! Block averaging of the continuous scan.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::channel::{Callback, Status};

/// Channels in the continuous scan, converted 0, 1, 2, 3.
pub const SCAN_CHANNELS: usize = 4;

/// Scans averaged into one set of means.
pub const BLOCK: u32 = 4096;

#[allow(clippy::declare_interior_mutable_const)]
const ZERO_SUM: AtomicU32 = AtomicU32::new(0);
#[allow(clippy::declare_interior_mutable_const)]
const ZERO_MEAN: AtomicU16 = AtomicU16::new(0);

/// Sums scans in blocks of [`BLOCK`], emitting each block's per-channel
/// mean.
///
/// The accumulator owns the memory the DMA channel writes each scan into.
/// As a [`Callback`], it folds that scan into the running sums every time
/// the transfer completes.
///
/// With `index` counting scans from zero, scan `index` starts a new block
/// when `index % BLOCK == 0`, and finishes one when
/// `index % BLOCK == BLOCK - 1`.
pub struct Accumulator {
    buffer: UnsafeCell<[u16; SCAN_CHANNELS]>,
    sums: [AtomicU32; SCAN_CHANNELS],
    count: AtomicU32,
    means: [AtomicU16; SCAN_CHANNELS],
    blocks: AtomicU32,
}

// Safety: the buffer is only written by the DMA controller, and only read
// with volatile loads. The rest is atomic.
unsafe impl Sync for Accumulator {}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([0; SCAN_CHANNELS]),
            sums: [ZERO_SUM; SCAN_CHANNELS],
            count: AtomicU32::new(0),
            means: [ZERO_MEAN; SCAN_CHANNELS],
            blocks: AtomicU32::new(0),
        }
    }

    /// The DMA destination.
    pub(crate) fn buffer(&self) -> *mut u16 {
        self.buffer.get().cast()
    }

    /// The most recent scan written by the DMA controller.
    pub fn samples(&self) -> [u16; SCAN_CHANNELS] {
        // Safety: the pointer is valid and aligned. The DMA controller
        // may write concurrently, so every load is volatile.
        core::array::from_fn(|i| unsafe { self.buffer().add(i).read_volatile() })
    }

    /// Fold one scan into the running sums.
    ///
    /// Returns the block's means when `samples` completes a block.
    pub fn accumulate(&self, samples: [u16; SCAN_CHANNELS]) -> Option<[u16; SCAN_CHANNELS]> {
        let index = self.count.fetch_add(1, Ordering::AcqRel);
        let position = index % BLOCK;
        for (sum, sample) in self.sums.iter().zip(samples) {
            if position == 0 {
                sum.store(u32::from(sample), Ordering::Relaxed);
            } else {
                sum.fetch_add(u32::from(sample), Ordering::Relaxed);
            }
        }
        if position != BLOCK - 1 {
            return None;
        }
        let means = self.sums().map(|sum| (sum / BLOCK) as u16);
        for (mean, value) in self.means.iter().zip(means) {
            mean.store(value, Ordering::Relaxed);
        }
        self.blocks.fetch_add(1, Ordering::Release);
        info!("ADC means {}", means);
        Some(means)
    }

    /// Running sums of the current block.
    pub fn sums(&self) -> [u32; SCAN_CHANNELS] {
        core::array::from_fn(|i| self.sums[i].load(Ordering::Relaxed))
    }

    /// Means of the most recent complete block.
    pub fn means(&self) -> [u16; SCAN_CHANNELS] {
        core::array::from_fn(|i| self.means[i].load(Ordering::Relaxed))
    }

    /// Complete blocks so far.
    pub fn blocks(&self) -> u32 {
        self.blocks.load(Ordering::Acquire)
    }

    /// Scans accumulated so far.
    pub fn sample_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Callback for Accumulator {
    fn call(&self, status: Status) {
        if status.is_complete() {
            self.accumulate(self.samples());
        }
    }
}
