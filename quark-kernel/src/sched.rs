//! Multilevel priority scheduling
//!
//! Runnable processes sit on one of [`NR_SCHED_QUEUES`] linked lists,
//! lower index meaning higher priority. `pick_proc` recomputes the
//! winner after every insert, removal, or rotation, so `next_ptr`
//! always names the head of the highest-priority non-empty queue; the
//! IDLE task keeps the lowest queue non-empty forever.
//!
//! A process that keeps exhausting full quantums is demoted one queue
//! at a time (never into the IDLE queue) to limit the damage of
//! runaway loops; blocking resets it to its ceiling.

use quark_abi::proc_nr::{index_to_nr, is_kernel_nr, nr_to_index, ProcNr, NONE, NR_TOTAL_PROCS};
use quark_priv::STACK_GUARD;

use crate::kernel::Kernel;

/// Number of scheduling queues.
pub const NR_SCHED_QUEUES: usize = 16;

/// Queue of the kernel tasks.
pub const TASK_Q: usize = 0;

/// Default queue of user processes.
pub const USER_Q: usize = 8;

/// The lowest queue, owned by the IDLE task.
pub const IDLE_Q: usize = NR_SCHED_QUEUES - 1;

/// Default quantum length in ticks.
pub const DEFAULT_QUANTUM: u32 = 8;

/// Full quantums a process at queue `q` may burn in a row before it is
/// demoted. Higher priority gets a longer leash.
#[inline]
#[must_use]
pub const fn quantums(q: usize) -> u8 {
    (NR_SCHED_QUEUES - q) as u8
}

impl Kernel {
    /// Add a runnable process to its priority queue and recompute the
    /// winner.
    ///
    /// Processes are appended to the tail, except that privileges with
    /// the ready-queue-head trait are prepended, which is a bit fairer
    /// to I/O bound user processes.
    pub(crate) fn ready(&mut self, nr: ProcNr) {
        #[cfg(feature = "sched-check")]
        {
            self.check_runqueues("ready");
            if self.slot(nr).ready {
                log::warn!("ready: {} is already on a queue", nr);
            }
        }

        let q = self.slot(nr).priority;
        if self.rdy_head[q] == NONE {
            self.rdy_head[q] = nr;
            self.rdy_tail[q] = nr;
            self.slot_mut(nr).next_ready = NONE;
        } else if self.priv_of(nr).flags.rdy_q_head() {
            self.slot_mut(nr).next_ready = self.rdy_head[q];
            self.rdy_head[q] = nr;
        } else {
            let tail = self.rdy_tail[q];
            self.slot_mut(tail).next_ready = nr;
            self.rdy_tail[q] = nr;
            self.slot_mut(nr).next_ready = NONE;
        }
        self.slot_mut(nr).ready = true;
        self.pick_proc();

        #[cfg(feature = "sched-check")]
        self.check_runqueues("ready end");
    }

    /// Remove a blocked process from its priority queue, recompute the
    /// winner if it was the running or chosen process, and reset its
    /// scheduling state for the next activation.
    ///
    /// # Panics
    ///
    /// Panics if a kernel task's stack canary has been overwritten.
    pub(crate) fn unready(&mut self, nr: ProcNr) {
        if is_kernel_nr(nr) {
            let guard = self.priv_of(nr).stack_guard;
            if !guard.is_null() && self.mem.read_u32(guard) != STACK_GUARD {
                panic!("stack overrun by task {}", nr);
            }
        }

        #[cfg(feature = "sched-check")]
        {
            self.check_runqueues("unready");
            if !self.slot(nr).ready {
                log::warn!("unready: {} is not on a queue", nr);
            }
        }

        let q = self.slot(nr).priority;
        let mut prev: ProcNr = NONE;
        let mut cur = self.rdy_head[q];
        while cur != NONE {
            if cur == nr {
                let next = self.slot(cur).next_ready;
                if prev == NONE {
                    self.rdy_head[q] = next;
                } else {
                    self.slot_mut(prev).next_ready = next;
                }
                if self.rdy_tail[q] == nr {
                    self.rdy_tail[q] = prev;
                }
                self.slot_mut(nr).next_ready = NONE;
                if nr == self.proc_ptr || nr == self.next_ptr {
                    self.pick_proc();
                }
                break;
            }
            prev = cur;
            cur = self.slot(cur).next_ready;
        }
        self.slot_mut(nr).ready = false;

        // The blocked process may have been demoted for eating full
        // quantums in a row; its next activation starts at the ceiling.
        let ceiling = self.slot(nr).max_priority;
        let p = self.slot_mut(nr);
        p.priority = ceiling;
        p.full_quantums = quantums(ceiling);

        #[cfg(feature = "sched-check")]
        self.check_runqueues("unready end");
    }

    /// The process has used up its quantum: account for it, demote it
    /// if it has also burnt all its full quantums, rotate its queue,
    /// and recompute the winner.
    pub(crate) fn sched(&mut self, nr: ProcNr) {
        if !self.priv_of(nr).flags.preemptible() {
            return;
        }

        let left = {
            let p = self.slot_mut(nr);
            p.full_quantums = p.full_quantums.saturating_sub(1);
            p.full_quantums
        };
        if left == 0 {
            let prio = self.slot(nr).priority;
            if prio + 1 < IDLE_Q {
                let demoted = prio + 1;
                self.unready(nr);
                self.slot_mut(nr).priority = demoted;
                self.ready(nr);
            }
            let now = self.slot(nr).priority;
            self.slot_mut(nr).full_quantums = quantums(now);
        }

        // Round-robin within the queue: an expired head moves to the
        // tail, possibly promoting another process to head.
        let q = self.slot(nr).priority;
        if self.rdy_head[q] == nr {
            let head = self.rdy_head[q];
            let tail = self.rdy_tail[q];
            if head != tail {
                self.rdy_head[q] = self.slot(head).next_ready;
                self.slot_mut(tail).next_ready = head;
                self.rdy_tail[q] = head;
                self.slot_mut(head).next_ready = NONE;
            }
        }

        let refill = self.slot(nr).quantum_size;
        self.slot_mut(nr).sched_ticks = refill;
        self.pick_proc();
    }

    /// Choose who runs next: the head of the lowest-indexed non-empty
    /// queue. A billable winner is also recorded as the billing target
    /// so the clock task can tell whom to charge for system time.
    pub(crate) fn pick_proc(&mut self) {
        for q in 0..NR_SCHED_QUEUES {
            let head = self.rdy_head[q];
            if head != NONE {
                self.next_ptr = head;
                if self.priv_of(head).flags.billable() {
                    self.bill_ptr = head;
                }
                return;
            }
        }
    }

    /// Verify the ready queues: acyclic, no process on two queues, the
    /// shadow bit matching membership, and tails in sync.
    ///
    /// Runs after every `ready`/`unready` when the `sched-check`
    /// feature is enabled.
    ///
    /// # Panics
    ///
    /// Panics on any inconsistency.
    pub fn check_runqueues(&self, when: &str) {
        let mut seen = [false; NR_TOTAL_PROCS];
        for q in 0..NR_SCHED_QUEUES {
            let mut cur = self.rdy_head[q];
            let mut last = NONE;
            let mut steps = 0;
            while cur != NONE {
                steps += 1;
                if steps > NR_TOTAL_PROCS {
                    panic!("{}: ready queue {} is cyclic", when, q);
                }
                let idx = nr_to_index(cur);
                if seen[idx] {
                    panic!("{}: process {} is on two ready queues", when, cur);
                }
                seen[idx] = true;
                if !self.procs[idx].ready {
                    panic!("{}: process {} queued without ready bit", when, cur);
                }
                last = cur;
                cur = self.procs[idx].next_ready;
            }
            if self.rdy_tail[q] != last {
                panic!("{}: queue {} tail out of sync", when, q);
            }
        }
        for (idx, p) in self.procs.iter().enumerate() {
            if p.ready && !seen[idx] {
                panic!(
                    "{}: process {} has the ready bit but is on no queue",
                    when,
                    index_to_nr(idx)
                );
            }
        }
    }
}
