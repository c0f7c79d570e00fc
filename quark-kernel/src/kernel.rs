//! The kernel state
//!
//! Everything the core mutates lives in one [`Kernel`] value: the
//! process table, the privilege table, the ready queues, the
//! typed-notification pool, the scheduling pointers, the uptime
//! counter, and the simulated physical memory. A trap, an interrupt,
//! or a lock-gateway call is the only way in, and each runs to
//! completion before the next; see [`crate::lock`].
//!
//! Construction installs the kernel tasks from a static image table;
//! user and system slots are populated later by the privilege-database
//! provisioning through [`Kernel::install`].

use quark_abi::memmap::{MemSeg, D, S, T};
use quark_abi::proc_nr::{
    is_kernel_nr, is_ok_proc_nr, nr_to_index, ProcNr, ANY, CLOCK, HARDWARE, IDLE, NONE,
    NR_TOTAL_PROCS, SYSTEM,
};
use quark_abi::call::ALL_CALLS_MASK;
use quark_abi::{PhysAddr, VirAddr, CLICK_SHIFT};
use quark_priv::{Priv, PrivFlags, RtsFlags, SysId, SysMap, NR_SYS_PROCS, STACK_GUARD};

use crate::memory::{PhysMem, PROC_MEM_CLICKS};
use crate::notify::NotifyPool;
use crate::proc::{Proc, ProcInit};
use crate::sched::{quantums, DEFAULT_QUANTUM, IDLE_Q, NR_SCHED_QUEUES, TASK_Q};

/// One kernel task in the boot image.
struct TaskImage {
    nr: ProcNr,
    priority: usize,
    flags: PrivFlags,
    name: &'static str,
}

/// The kernel tasks installed at construction. IDLE keeps the lowest
/// queue non-empty forever; the other three park themselves receiving.
const TASK_IMAGE: [TaskImage; 4] = [
    TaskImage {
        nr: IDLE,
        priority: IDLE_Q,
        flags: PrivFlags::BILLABLE,
        name: "idle",
    },
    TaskImage {
        nr: CLOCK,
        priority: TASK_Q,
        flags: PrivFlags::NONE,
        name: "clock",
    },
    TaskImage {
        nr: SYSTEM,
        priority: TASK_Q,
        flags: PrivFlags::NONE,
        name: "system",
    },
    TaskImage {
        nr: HARDWARE,
        priority: TASK_Q,
        flags: PrivFlags::NONE,
        name: "hardware",
    },
];

/// The complete mutable state of the core.
pub struct Kernel {
    pub(crate) procs: [Proc; NR_TOTAL_PROCS],
    pub(crate) privs: [Priv; NR_SYS_PROCS],
    pub(crate) rdy_head: [ProcNr; NR_SCHED_QUEUES],
    pub(crate) rdy_tail: [ProcNr; NR_SCHED_QUEUES],
    /// Currently running process.
    pub(crate) proc_ptr: ProcNr,
    /// Winner of the last `pick_proc`; runs at the next switch.
    pub(crate) next_ptr: ProcNr,
    /// Process billed for system time.
    pub(crate) bill_ptr: ProcNr,
    pub(crate) uptime: u64,
    pub(crate) pool: NotifyPool,
    pub(crate) mem: PhysMem,
}

impl Kernel {
    /// Build a kernel with the task image installed and IDLE running.
    #[must_use]
    pub fn new() -> Self {
        const EMPTY: Proc = Proc::empty();
        let mut k = Self {
            procs: [EMPTY; NR_TOTAL_PROCS],
            privs: core::array::from_fn(Priv::new),
            rdy_head: [NONE; NR_SCHED_QUEUES],
            rdy_tail: [NONE; NR_SCHED_QUEUES],
            proc_ptr: IDLE,
            next_ptr: IDLE,
            bill_ptr: IDLE,
            uptime: 0,
            pool: NotifyPool::new(),
            mem: PhysMem::new(),
        };

        // Every slot owns a contiguous run of clicks: data at virtual
        // click 0, stack at the top, one gap click between.
        for (idx, p) in k.procs.iter_mut().enumerate() {
            let base = idx * PROC_MEM_CLICKS;
            p.mem_map[T] = MemSeg::new(0, base, 0);
            p.mem_map[D] = MemSeg::new(0, base, 2);
            p.mem_map[S] = MemSeg::new(3, base + 3, 1);
            p.priv_id = idx as SysId;
        }

        for task in &TASK_IMAGE {
            let idx = nr_to_index(task.nr);
            let pv = &mut k.privs[idx];
            pv.proc_nr = task.nr;
            pv.flags = task.flags;
            pv.call_mask = ALL_CALLS_MASK;
            pv.send_mask = SysMap::full();

            // Plant the canary at the base of the task stack.
            let guard = PhysAddr::new(k.procs[idx].mem_map[S].phys << CLICK_SHIFT);
            k.privs[idx].stack_guard = guard;
            k.mem.write_u32(guard, STACK_GUARD);

            let p = &mut k.procs[idx];
            p.rts_flags = RtsFlags::RUNNABLE;
            p.priority = task.priority;
            p.max_priority = task.priority;
            p.quantum_size = DEFAULT_QUANTUM;
            p.sched_ticks = DEFAULT_QUANTUM;
            p.full_quantums = quantums(task.priority);
            p.set_name(task.name);
            if task.nr != IDLE {
                // Tasks park waiting for work the moment they exist.
                p.get_from = ANY;
                p.msg_addr = VirAddr::new(0);
                p.rts_flags.insert(RtsFlags::RECEIVING);
            }

            // IDLE is born runnable; it anchors the lowest queue.
            if task.nr == IDLE {
                k.ready(task.nr);
            }
        }

        k.pick_proc();
        k.proc_ptr = k.next_ptr;
        k
    }

    /// Populate a user/system slot from provisioning data and make it
    /// runnable.
    ///
    /// # Panics
    ///
    /// Panics if `nr` is not a free user/system slot; provisioning a
    /// live slot is a configuration bug.
    pub fn install(&mut self, nr: ProcNr, init: ProcInit) {
        assert!(is_ok_proc_nr(nr) && !is_kernel_nr(nr), "bad slot {}", nr);
        assert!(self.is_empty_slot(nr), "slot {} is live", nr);
        assert!(init.max_priority < IDLE_Q, "only IDLE lives in IDLE_Q");

        let idx = nr_to_index(nr);
        let pv = &mut self.privs[idx];
        pv.proc_nr = nr;
        pv.flags = init.flags;
        pv.call_mask = init.call_mask;
        pv.send_mask = init.send_mask;

        let p = &mut self.procs[idx];
        p.rts_flags = RtsFlags::RUNNABLE;
        p.priority = init.max_priority;
        p.max_priority = init.max_priority;
        p.quantum_size = init.quantum;
        p.sched_ticks = init.quantum;
        p.full_quantums = quantums(init.max_priority);
        p.set_name(init.name);

        log::debug!("install: slot {} ({}) at queue {}", nr, init.name, init.max_priority);
        self.ready(nr);
    }

    /// Is this slot unused?
    #[inline]
    #[must_use]
    pub fn is_empty_slot(&self, nr: ProcNr) -> bool {
        self.slot(nr).rts_flags.slot_free()
    }

    /// The currently running process.
    #[inline]
    #[must_use]
    pub fn current(&self) -> ProcNr {
        self.proc_ptr
    }

    /// The process chosen to run at the next switch.
    #[inline]
    #[must_use]
    pub fn chosen_next(&self) -> ProcNr {
        self.next_ptr
    }

    /// The process billed for system time.
    #[inline]
    #[must_use]
    pub fn billing(&self) -> ProcNr {
        self.bill_ptr
    }

    /// Ticks since boot.
    #[inline]
    #[must_use]
    pub fn uptime(&self) -> u64 {
        self.uptime
    }

    /// Read-only view of a process slot.
    #[inline]
    #[must_use]
    pub fn proc(&self, nr: ProcNr) -> &Proc {
        self.slot(nr)
    }

    /// Read-only view of a process's privilege record.
    #[inline]
    #[must_use]
    pub fn privilege(&self, nr: ProcNr) -> &Priv {
        self.priv_of(nr)
    }

    /// OR interrupt bits into a process's pending-interrupt word.
    /// Called by the interrupt hub before alerting from HARDWARE.
    pub fn set_int_pending(&mut self, nr: ProcNr, bits: u32) {
        self.priv_of_mut(nr).int_pending |= bits;
    }

    /// OR signal bits into a process's pending-signal word.
    /// Called by the signal path before alerting from SYSTEM.
    pub fn set_sig_pending(&mut self, nr: ProcNr, bits: u32) {
        self.priv_of_mut(nr).sig_pending |= bits;
    }

    /// Commit the last scheduling decision: the chosen process becomes
    /// the running one. This is the context-switch point owned by the
    /// trap stubs.
    pub fn run_next(&mut self) {
        self.proc_ptr = self.next_ptr;
    }

    /// Model a context switch to a specific process.
    ///
    /// # Panics
    ///
    /// Panics if `nr` is not a live slot.
    pub fn switch_to(&mut self, nr: ProcNr) {
        assert!(is_ok_proc_nr(nr) && !self.is_empty_slot(nr), "bad switch to {}", nr);
        debug_assert!(
            self.slot(nr).rts_flags.runnable(),
            "switching to blocked process {}",
            nr
        );
        self.proc_ptr = nr;
    }

    /// The clock task's quantum-decrement hook, invoked once per tick.
    ///
    /// Charges the billing target, burns a tick of the running
    /// process's quantum and hands the CPU decision to `sched` when the
    /// quantum is gone.
    pub fn clock_tick(&mut self) {
        self.uptime += 1;

        let bill = self.bill_ptr;
        self.slot_mut(bill).user_time += 1;

        let cur = self.proc_ptr;
        let ticks_left = {
            let p = self.slot_mut(cur);
            p.sched_ticks = p.sched_ticks.saturating_sub(1);
            p.sched_ticks
        };
        if ticks_left == 0 && self.priv_of(cur).flags.preemptible() {
            self.sched(cur);
        }
    }

    // -- Table access helpers

    #[inline]
    pub(crate) fn slot(&self, nr: ProcNr) -> &Proc {
        &self.procs[nr_to_index(nr)]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, nr: ProcNr) -> &mut Proc {
        &mut self.procs[nr_to_index(nr)]
    }

    #[inline]
    pub(crate) fn priv_of(&self, nr: ProcNr) -> &Priv {
        &self.privs[self.slot(nr).priv_id]
    }

    #[inline]
    pub(crate) fn priv_of_mut(&mut self, nr: ProcNr) -> &mut Priv {
        let id = self.slot(nr).priv_id;
        &mut self.privs[id]
    }

    /// Map a dense system ID back to its process number.
    #[inline]
    pub(crate) fn id_to_nr(&self, id: SysId) -> ProcNr {
        self.privs[id].proc_nr
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_fixture {
    use super::*;

    /// A kernel with `users` default user processes installed at slots
    /// `0..users`.
    pub(crate) fn kernel_with_users(users: usize) -> Kernel {
        let mut k = Kernel::new();
        for nr in 0..users as ProcNr {
            k.install(nr, ProcInit::default());
        }
        k
    }
}
