//! Flag sets
//!
//! Two small packed flag sets: the per-privilege scheduling traits and
//! the per-process run-time-suspension reasons. Both are plain
//! newtypes; interpretation is fixed and the layouts are part of the
//! provisioning ABI.

use core::fmt;

/// Privilege traits of a process.
///
/// # Layout
///
/// Packed into a single byte:
/// - Bit 0: Preemptible
/// - Bit 1: Billable
/// - Bit 2: ReadyQueueHead
/// - Bits 3-7: Reserved (must be zero)
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PrivFlags(u8);

impl PrivFlags {
    /// No traits.
    pub const NONE: Self = Self(0);

    /// The scheduler may demote and rotate this process when it
    /// exhausts its quantum. Kernel tasks are not preemptible.
    pub const PREEMPTIBLE: Self = Self(1 << 0);

    /// When picked, this process is recorded as the billing target for
    /// system time.
    pub const BILLABLE: Self = Self(1 << 1);

    /// Ready at the head of its priority queue instead of the tail.
    /// Favours I/O-bound user processes.
    pub const RDY_Q_HEAD: Self = Self(1 << 2);

    /// Create a flag set from raw bits. Reserved bits are masked off.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x07)
    }

    /// Get the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if these flags contain all of `other`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check the Preemptible trait.
    #[inline]
    #[must_use]
    pub const fn preemptible(self) -> bool {
        self.contains(Self::PREEMPTIBLE)
    }

    /// Check the Billable trait.
    #[inline]
    #[must_use]
    pub const fn billable(self) -> bool {
        self.contains(Self::BILLABLE)
    }

    /// Check the ReadyQueueHead trait.
    #[inline]
    #[must_use]
    pub const fn rdy_q_head(self) -> bool {
        self.contains(Self::RDY_Q_HEAD)
    }

    /// Union of two flag sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for PrivFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Debug for PrivFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.preemptible() { "P" } else { "-" },
            if self.billable() { "B" } else { "-" },
            if self.rdy_q_head() { "H" } else { "-" },
        )
    }
}

/// Run-time-suspension reasons of a process.
///
/// A process is runnable exactly when no bit is set. This core owns
/// the `SENDING` and `RECEIVING` bits; the remaining bits belong to
/// slot management and the signalling paths outside the core, and are
/// only ever tested here.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct RtsFlags(u16);

impl RtsFlags {
    /// Runnable: no suspension reason.
    pub const RUNNABLE: Self = Self(0);

    /// The slot is not in use.
    pub const SLOT_FREE: Self = Self(0x01);
    /// The slot has no memory map yet.
    pub const NO_MAP: Self = Self(0x02);
    /// Blocked sending; the process sits on a destination caller queue.
    pub const SENDING: Self = Self(0x04);
    /// Blocked receiving.
    pub const RECEIVING: Self = Self(0x08);
    /// A signal arrived for this process.
    pub const SIGNALED: Self = Self(0x10);
    /// A signal is being delivered.
    pub const SIG_PENDING: Self = Self(0x20);
    /// Stopped by a tracer.
    pub const P_STOP: Self = Self(0x40);

    /// Get the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if these flags contain all of `other`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Runnable exactly when no suspension reason is set.
    #[inline]
    #[must_use]
    pub const fn runnable(self) -> bool {
        self.0 == 0
    }

    /// Check the slot-free bit.
    #[inline]
    #[must_use]
    pub const fn slot_free(self) -> bool {
        self.contains(Self::SLOT_FREE)
    }

    /// Set the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl fmt::Debug for RtsFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.runnable() {
            return write!(f, "runnable");
        }
        let mut list = f.debug_set();
        if self.contains(Self::SLOT_FREE) {
            list.entry(&"SLOT_FREE");
        }
        if self.contains(Self::NO_MAP) {
            list.entry(&"NO_MAP");
        }
        if self.contains(Self::SENDING) {
            list.entry(&"SENDING");
        }
        if self.contains(Self::RECEIVING) {
            list.entry(&"RECEIVING");
        }
        if self.contains(Self::SIGNALED) {
            list.entry(&"SIGNALED");
        }
        if self.contains(Self::SIG_PENDING) {
            list.entry(&"SIG_PENDING");
        }
        if self.contains(Self::P_STOP) {
            list.entry(&"P_STOP");
        }
        list.finish()
    }
}
