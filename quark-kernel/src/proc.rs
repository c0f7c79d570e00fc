//! Process slots
//!
//! Every process occupies a fixed slot in the static process table,
//! addressed by its process number. The slot carries the run-time
//! suspension flags, scheduling accounting, the intrusive links for the
//! ready queues and caller queues, and the per-process memory map.
//!
//! All links are process numbers into the table arena; [`NONE`]
//! terminates a list. The cyclic shapes (caller-queue entries pointing
//! at processes that point back through `send_to`) are lookup edges
//! over the table, not ownership edges.

use quark_abi::memmap::{MemSeg, NR_SEGS};
use quark_abi::proc_nr::{ProcNr, NONE};
use quark_abi::VirAddr;
use quark_priv::{PrivFlags, RtsFlags, SysId};

use crate::sched::{DEFAULT_QUANTUM, USER_Q};

/// One process-table slot.
#[derive(Clone, Copy, Debug)]
pub struct Proc {
    /// Run-time suspension reasons; runnable exactly when empty.
    pub rts_flags: RtsFlags,
    /// Current scheduling queue. Lower is higher priority.
    pub priority: usize,
    /// Ceiling queue this process is reset to when it blocks.
    pub max_priority: usize,
    /// Full quantums left before the scheduler demotes this process.
    pub full_quantums: u8,
    /// Ticks left in the current quantum.
    pub sched_ticks: u32,
    /// Quantum length in ticks.
    pub quantum_size: u32,
    /// Ticks billed to this process.
    pub user_time: u64,
    /// Caller's message buffer while blocked sending or receiving.
    pub msg_addr: VirAddr,
    /// Desired source while RECEIVING: `ANY` or a process number.
    pub get_from: ProcNr,
    /// Destination while SENDING.
    pub send_to: ProcNr,
    /// Head of the queue of processes blocked sending to this one.
    pub caller_q: ProcNr,
    /// Link within some destination's caller queue.
    pub q_link: ProcNr,
    /// Link within this process's ready queue.
    pub next_ready: ProcNr,
    /// Head of the typed-notification queue (pool indices).
    pub ntf_q: Option<usize>,
    /// Shadow bit: member of some ready queue.
    pub ready: bool,
    /// Index of this process's privilege record.
    pub priv_id: SysId,
    /// Memory-map segments, in clicks.
    pub mem_map: [MemSeg; NR_SEGS],
    /// Debug name.
    pub name: [u8; 8],
}

impl Proc {
    /// An unused slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rts_flags: RtsFlags::SLOT_FREE,
            priority: 0,
            max_priority: 0,
            full_quantums: 0,
            sched_ticks: 0,
            quantum_size: 0,
            user_time: 0,
            msg_addr: VirAddr::new(0),
            get_from: NONE,
            send_to: NONE,
            caller_q: NONE,
            q_link: NONE,
            next_ready: NONE,
            ntf_q: None,
            ready: false,
            priv_id: 0,
            mem_map: [MemSeg::empty(); NR_SEGS],
            name: [0; 8],
        }
    }

    /// Set the debug name, truncating to the field width.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(self.name.len());
        self.name[..len].copy_from_slice(&bytes[..len]);
        if len < self.name.len() {
            self.name[len..].fill(0);
        }
    }

    /// Get the debug name.
    #[must_use]
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("<invalid>")
    }
}

impl Default for Proc {
    fn default() -> Self {
        Self::empty()
    }
}

/// Provisioning data for one user/system slot, supplied by the
/// privilege database when the slot comes alive.
#[derive(Clone, Copy, Debug)]
pub struct ProcInit {
    /// Ceiling (and initial) scheduling queue.
    pub max_priority: usize,
    /// Quantum length in ticks.
    pub quantum: u32,
    /// Privilege traits.
    pub flags: PrivFlags,
    /// Allowed call functions.
    pub call_mask: u16,
    /// Allowed destinations, by system ID.
    pub send_mask: quark_priv::SysMap,
    /// Debug name.
    pub name: &'static str,
}

impl Default for ProcInit {
    /// An ordinary preemptible, billable user process with no
    /// restrictions.
    fn default() -> Self {
        Self {
            max_priority: USER_Q,
            quantum: DEFAULT_QUANTUM,
            flags: PrivFlags::PREEMPTIBLE | PrivFlags::BILLABLE,
            call_mask: quark_abi::call::ALL_CALLS_MASK,
            send_mask: quark_priv::SysMap::full(),
            name: "user",
        }
    }
}
