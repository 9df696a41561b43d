use core::sync::atomic::{AtomicBool, Ordering};

use crate::Spinlock;

/// A one-value slot with a ready flag.
///
/// A new value overwrites one that was never taken. The overrun isn't
/// detected.
pub struct Mailbox {
    value: Spinlock<u16>,
    ready: AtomicBool,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            value: Spinlock::new(0),
            ready: AtomicBool::new(false),
        }
    }

    /// Store `value` and mark it ready.
    pub fn post(&self, value: u16) {
        *self.value.lock() = value;
        self.ready.store(true, Ordering::Release);
    }

    /// Returns `true` if a value is waiting.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Take the value if one is ready.
    pub fn try_take(&self) -> Option<u16> {
        if !self.is_ready() {
            return None;
        }
        let value = self.value.lock();
        self.ready.store(false, Ordering::Release);
        Some(*value)
    }

    /// Spin, without bound, until a value is ready. Then take it.
    pub fn take(&self) -> u16 {
        loop {
            if let Some(value) = self.try_take() {
                return value;
            }
            crate::wait::relax();
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
