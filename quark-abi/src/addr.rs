//! Virtual and Physical Address Types
//!
//! Simple address newtypes shared between the kernel core and its
//! collaborators. Memory is measured in *clicks*, the allocation
//! granularity of the process memory maps; the dispatcher's message
//! buffer range check operates on click numbers.
//!
//! These types are intentionally simple `#[repr(transparent)]` wrappers
//! around `usize`: zero runtime overhead and compatible with `#[repr(C)]`
//! structs.

use core::fmt;

/// Log2 of the click size.
pub const CLICK_SHIFT: usize = 10;

/// Allocation granularity of process memory, in bytes.
pub const CLICK_SIZE: usize = 1 << CLICK_SHIFT;

/// Virtual memory address, as seen by a process.
///
/// Virtual addresses are per-process: every process sees its data
/// segment starting at virtual click 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirAddr(pub usize);

/// Physical memory address into the kernel's flat memory.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(pub usize);

impl VirAddr {
    /// Create a new virtual address.
    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// The click this address falls in.
    #[inline]
    #[must_use]
    pub const fn click(self) -> usize {
        self.0 >> CLICK_SHIFT
    }

    /// Add a byte offset to this address.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: usize) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl PhysAddr {
    /// Create a new physical address.
    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if this address is null (zero).
    ///
    /// Null is the rest value of stack-guard fields for process slots
    /// that have no kernel stack.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Add a byte offset to this address.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: usize) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl fmt::Debug for VirAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirAddr({:#x})", self.0)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}
