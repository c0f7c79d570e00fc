//! # quark-priv
//!
//! Privilege records and the bitmap primitives behind them.
//!
//! Every process slot references a [`Priv`] record holding what the
//! process may do: which calls it may make, whom it may send to, and
//! the per-destination pending-notification state. The records are
//! provisioned by the privilege database outside the kernel core and
//! are read-only during IPC (the core mutates only the pending maps
//! and pseudo-source payload words).
//!
//! # Core Types
//!
//! - [`Priv`]: the privilege record itself
//! - [`PrivFlags`]: scheduling/accounting traits (preemptible, billable, ...)
//! - [`RtsFlags`]: per-process run-time-suspension reasons
//! - [`SysMap`]: fixed-width set of dense system IDs
//! - [`pool`]: the bit allocator used by the notification buffer pool

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod flags;
pub mod pool;
pub mod record;
pub mod sysmap;

pub use flags::{PrivFlags, RtsFlags};
pub use record::{Priv, SysId, NR_SYS_PROCS, STACK_GUARD};
pub use sysmap::{BitChunk, SysMap, BITCHUNK_BITS};
