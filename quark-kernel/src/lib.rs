//! # quark-kernel
//!
//! The message-passing and scheduling core of the Quark microkernel.
//!
//! Every service in the surrounding system communicates through this
//! core: it validates and routes IPC requests, implements the four
//! message-passing primitives, and decides which process runs next.
//!
//! # Entry points
//!
//! One entry from the outside: [`Kernel::sys_call`], reached through a
//! trap. Tasks and interrupt handlers re-enter through the lock
//! gateways on [`lock::LockedKernel`] (`lock_send`, `lock_notify`,
//! `lock_alert`, `lock_ready`, `lock_unready`, `lock_sched`).
//!
//! # Model
//!
//! The core is a single-flow kernel: at most one control flow mutates
//! the state at a time, and no primitive suspends midway. All state
//! lives in one [`Kernel`] value, including a flat simulated physical
//! memory that stands in for the machine's address spaces; linked
//! structures are index arenas over the static process table.
//!
//! # Features
//!
//! - `sched-check`: verify ready-queue consistency after every
//!   `ready`/`unready`, panicking on violation.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod ipc;
pub mod kernel;
pub mod lock;
pub mod memory;
pub mod notify;
pub mod proc;
pub mod sched;
pub mod syscall;

pub use kernel::Kernel;
pub use lock::{kernel, LockedKernel};
pub use notify::{Notification, NR_NOTIFY_BUFS};
pub use proc::{Proc, ProcInit};
pub use sched::{quantums, DEFAULT_QUANTUM, IDLE_Q, NR_SCHED_QUEUES, TASK_Q, USER_Q};
