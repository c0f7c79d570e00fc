//! # quark-abi
//!
//! Shared ABI types for the Quark kernel core.
//!
//! This crate defines the contract between the kernel core and everything
//! that talks to it: user processes trapping in, kernel tasks calling
//! through the lock gateways, and the privilege-database provisioning
//! that populates process slots.
//!
//! - [`CallFn`](call::CallFn): system-call function codes and flag bits
//! - [`Error`](error::Error): system-call status codes (small negative integers)
//! - [`Message`](message::Message): the fixed-size message record
//! - [`proc_nr`]: process-number space, task slots, and sentinels
//! - [`addr`]: click-granular virtual/physical address newtypes
//! - [`memmap`]: per-process memory-map segments used by the buffer range check
//!
//! # no_std
//!
//! This crate is `#![no_std]` and has zero dependencies, making it suitable
//! as a foundation crate that all other Quark crates can depend on.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod addr;
pub mod call;
pub mod error;
pub mod memmap;
pub mod message;
pub mod proc_nr;

// Re-export commonly used types
pub use addr::{PhysAddr, VirAddr, CLICK_SHIFT, CLICK_SIZE};
pub use call::{CallFn, FRESH_ANSWER, NON_BLOCKING};
pub use error::{Error, KernelResult, OK};
pub use message::{Message, MESS_SIZE};
pub use proc_nr::ProcNr;
