//! Bounded busy-waiting.
//!
//! Every hardware handshake in this crate polls a status condition with a
//! [`BoundedWait`]. There's no other timeout mechanism.

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        /// Pause between polls.
        #[inline(always)]
        pub(crate) fn relax() {
            cortex_m::asm::nop();
        }
    } else {
        /// Pause between polls.
        #[inline(always)]
        pub(crate) fn relax() {
            core::hint::spin_loop();
        }
    }
}

/// Polls a condition a bounded number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoundedWait {
    budget: u32,
}

impl BoundedWait {
    /// The iteration budget used by the drivers unless configured otherwise.
    pub const DEFAULT_BUDGET: u32 = 100_000;

    /// A wait with the default budget.
    pub const DEFAULT: Self = Self::new(Self::DEFAULT_BUDGET);

    /// A wait that polls at most `budget` times.
    pub const fn new(budget: u32) -> Self {
        Self { budget }
    }

    /// The configured number of polls.
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    /// Poll `condition` until it returns `true`, or until the budget runs
    /// out.
    ///
    /// Returns `true` as soon as the condition holds, `false` on timeout.
    /// The wait doesn't touch any hardware state on its own; only
    /// `condition` does.
    pub fn until<F: FnMut() -> bool>(&self, mut condition: F) -> bool {
        for _ in 0..self.budget {
            if condition() {
                return true;
            }
            relax();
        }
        false
    }
}

impl Default for BoundedWait {
    fn default() -> Self {
        Self::DEFAULT
    }
}
