//! Lock gateways
//!
//! The kernel is a single flow: a trap, a hardware interrupt, or a
//! task-level call mutates the core to completion before the next one
//! starts. On the machine that exclusion comes from masking
//! interrupts; here the bracket is a spinlock held across the whole
//! primitive, which is also what a preemptible host must do.
//!
//! Interrupt context is tracked by a re-entry counter that starts at
//! `-1`. The interrupt stub raises it on entry; a gateway invoked with
//! the counter at zero or above skips the bracket, because the
//! interrupt path already owns the kernel. Each bracket carries a
//! small identifier and a name used only for trace logging.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use quark_abi::error::to_return_value;
use quark_abi::proc_nr::ProcNr;
use quark_abi::{KernelResult, Message, VirAddr, NON_BLOCKING};

use crate::kernel::Kernel;

/// A kernel behind the interrupt-disable bracket.
pub struct LockedKernel {
    locked: AtomicBool,
    /// Interrupt nesting depth minus one: `-1` outside interrupt
    /// context, `>= 0` inside.
    k_reenter: AtomicI32,
    data: UnsafeCell<Kernel>,
}

// SAFETY: all access to the inner kernel goes through the bracket or
// the interrupt-context fast path, which the single-flow model makes
// exclusive.
unsafe impl Send for LockedKernel {}
unsafe impl Sync for LockedKernel {}

impl LockedKernel {
    /// Wrap a kernel in the bracket.
    #[must_use]
    pub fn new(kernel: Kernel) -> Self {
        Self {
            locked: AtomicBool::new(false),
            k_reenter: AtomicI32::new(-1),
            data: UnsafeCell::new(kernel),
        }
    }

    /// Run `f` on the kernel under the bracket.
    ///
    /// From interrupt context (`k_reenter >= 0`) the bracket is
    /// skipped: interrupts are already masked there and taking the
    /// lock again would wedge the flow that owns it.
    fn with<R>(&self, id: u8, name: &str, f: impl FnOnce(&mut Kernel) -> R) -> R {
        if self.k_reenter.load(Ordering::Acquire) >= 0 {
            log::trace!("lock {} ({}): interrupt context", id, name);
            // SAFETY: k_reenter >= 0 means this flow entered through
            // the interrupt path, which holds the bracket; nothing
            // else can run until it returns.
            let kernel = unsafe { &mut *self.data.get() };
            return f(kernel);
        }

        log::trace!("lock {} ({})", id, name);
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        // SAFETY: the bracket is held; exclusive until the release
        // below.
        let result = f(unsafe { &mut *self.data.get() });
        self.locked.store(false, Ordering::Release);
        result
    }

    /// Enter interrupt context: the first entry takes the bracket,
    /// nested entries only deepen the counter.
    pub fn interrupt_enter(&self) {
        if self.k_reenter.fetch_add(1, Ordering::AcqRel) < 0 {
            while self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                core::hint::spin_loop();
            }
        }
    }

    /// Leave interrupt context, releasing the bracket on the outermost
    /// exit.
    pub fn interrupt_leave(&self) {
        if self.k_reenter.fetch_sub(1, Ordering::AcqRel) == 0 {
            self.locked.store(false, Ordering::Release);
        }
    }

    /// Run a closure against the kernel under the bracket. The escape
    /// hatch for collaborators with no dedicated gateway, such as the
    /// clock interrupt calling [`Kernel::clock_tick`].
    pub fn with_kernel<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> R {
        self.with(7, "kernel", f)
    }

    /// Safe gateway to the dispatcher for the trap stubs. Returns the
    /// raw status for the caller's register.
    pub fn handle_sys_call(&self, call_nr: u32, peer: ProcNr, msg_addr: VirAddr) -> i32 {
        self.with(6, "sys_call", |k| {
            to_return_value(k.sys_call(call_nr, peer, msg_addr))
        })
    }

    /// Safe gateway to `mini_alert` for tasks and interrupt handlers.
    /// The sender is explicitly given to prevent confusion about where
    /// the call comes from.
    pub fn lock_alert(&self, src: ProcNr, dst: ProcNr) -> KernelResult<()> {
        self.with(0, "alert", |k| k.mini_alert(src, dst))
    }

    /// Safe gateway to `mini_notify` for tasks and interrupt handlers.
    pub fn lock_notify(&self, src: ProcNr, dst: ProcNr, msg: &Message) -> KernelResult<()> {
        self.with(1, "notify", |k| k.mini_notify(src, dst, msg))
    }

    /// Safe gateway to `mini_send` for tasks. Task-level sends never
    /// block: a task that suspended inside the kernel would wedge it.
    pub fn lock_send(&self, dst: ProcNr, msg_addr: VirAddr) -> KernelResult<()> {
        self.with(2, "send", |k| {
            let caller = k.current();
            k.mini_send(caller, dst, msg_addr, NON_BLOCKING)
        })
    }

    /// Safe gateway to `ready` for tasks.
    pub fn lock_ready(&self, nr: ProcNr) {
        self.with(3, "ready", |k| k.ready(nr));
    }

    /// Safe gateway to `unready` for tasks.
    pub fn lock_unready(&self, nr: ProcNr) {
        self.with(4, "unready", |k| k.unready(nr));
    }

    /// Safe gateway to `sched` for tasks.
    pub fn lock_sched(&self, nr: ProcNr) {
        self.with(5, "sched", |k| k.sched(nr));
    }
}

/// The well-known kernel instance shared by the trap stubs, the
/// interrupt handlers, and the tasks.
static KERNEL: spin::Once<LockedKernel> = spin::Once::new();

/// Get the global kernel, constructing it on first use.
pub fn kernel() -> &'static LockedKernel {
    KERNEL.call_once(|| LockedKernel::new(Kernel::new()))
}
