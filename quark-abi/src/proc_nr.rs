//! Process-number space
//!
//! Every process occupies a fixed slot in the process table, addressed
//! by a small signed integer. Kernel tasks use negative numbers,
//! user and system processes use `0..NR_PROCS`. Two out-of-range
//! sentinels complete the space: [`ANY`] (receive from anyone) and
//! [`NONE`] (rest value of link and peer fields).

/// Process number: slot address in the process table.
///
/// Kernel tasks are negative, user/system processes non-negative.
pub type ProcNr = i32;

/// Number of kernel task slots (negative process numbers).
pub const NR_TASKS: ProcNr = 4;

/// Number of user/system process slots.
pub const NR_PROCS: ProcNr = 16;

/// Total number of process-table slots.
pub const NR_TOTAL_PROCS: usize = (NR_TASKS + NR_PROCS) as usize;

/// The idle task. Lives on the lowest-priority queue and never blocks.
pub const IDLE: ProcNr = -4;

/// The clock task. Owns quantum accounting outside this core.
pub const CLOCK: ProcNr = -3;

/// Pseudo-source for kernel-synthesised signal notifications.
pub const SYSTEM: ProcNr = -2;

/// Pseudo-source for kernel-synthesised interrupt notifications.
pub const HARDWARE: ProcNr = -1;

/// Receive-from-anyone sentinel. Legal only as a RECEIVE source.
pub const ANY: ProcNr = 0x7ace;

/// No-process sentinel: terminates intrusive lists and marks unset
/// `send_to` / `get_from` fields.
pub const NONE: ProcNr = 0x6ace;

/// Check whether `nr` names a valid process-table slot.
#[inline]
#[must_use]
pub const fn is_ok_proc_nr(nr: ProcNr) -> bool {
    nr >= -NR_TASKS && nr < NR_PROCS
}

/// Check whether `nr` names a kernel task.
///
/// Callers must have established `is_ok_proc_nr(nr)` first; the
/// sentinels are not kernel tasks.
#[inline]
#[must_use]
pub const fn is_kernel_nr(nr: ProcNr) -> bool {
    nr < 0
}

/// Map a process number to its process-table index.
#[inline]
#[must_use]
pub const fn nr_to_index(nr: ProcNr) -> usize {
    (nr + NR_TASKS) as usize
}

/// Map a process-table index back to a process number.
#[inline]
#[must_use]
pub const fn index_to_nr(index: usize) -> ProcNr {
    index as ProcNr - NR_TASKS
}
