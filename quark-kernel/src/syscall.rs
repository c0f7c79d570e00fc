//! The system-call dispatcher
//!
//! The trap stub delivers `(call_nr, peer, msg_addr)` here; the caller
//! is always the currently running process. The dispatcher validates
//! in a fixed order, short-circuiting with the first failure:
//!
//! 1. call permitted by the caller's call mask, and kernel tasks only
//!    reachable through SENDREC (tasks always reply and must not leave
//!    the caller without a receive);
//! 2. function code known;
//! 3. peer names a live slot, `ANY` being legal only for RECEIVE;
//! 4. the message buffer lies inside the caller's data-to-stack span;
//! 5. for sending calls, the destination is in the caller's send mask
//!    and its slot is occupied.
//!
//! Routing then hands over to the primitives; SENDREC flows from the
//! send half into the receive half with `FRESH_ANSWER` forced.

use quark_abi::call::{CallFn, SYSCALL_FLAGS, SYSCALL_FUNC};
use quark_abi::memmap::{D, S};
use quark_abi::proc_nr::{is_kernel_nr, is_ok_proc_nr, ProcNr, ANY};
use quark_abi::{Error, KernelResult, VirAddr, FRESH_ANSWER, MESS_SIZE};

use crate::kernel::Kernel;

impl Kernel {
    /// Validate and route one system call from the running process.
    pub fn sys_call(&mut self, call_nr: u32, peer: ProcNr, msg_addr: VirAddr) -> KernelResult<()> {
        let caller = self.proc_ptr;
        let flags = call_nr & SYSCALL_FLAGS;
        let func_bit = 1u16 << (call_nr & SYSCALL_FUNC);

        // Check if the process has privileges for the requested call.
        // Calls to kernel tasks may only be SENDREC, because tasks
        // always reply and may not block if the caller doesn't receive.
        let kernel_peer = is_ok_proc_nr(peer) && is_kernel_nr(peer);
        if !self.priv_of(caller).allows_call(func_bit)
            || (kernel_peer && call_nr & SYSCALL_FUNC != CallFn::SendRec as u32)
        {
            log::warn!("sys_call: {:#x} denied for {}", call_nr, caller);
            return Err(Error::CallDenied);
        }

        let function = CallFn::from_number(call_nr).ok_or(Error::BadCall)?;
        log::trace!(
            "sys_call: {} from {} peer {} flags {:#x}",
            function.name(),
            caller,
            peer,
            flags
        );

        // Require a valid peer, unless echoing.
        if !(is_ok_proc_nr(peer) || (peer == ANY && function.receives()) || function == CallFn::Echo)
        {
            return Err(Error::BadSrcDst);
        }

        // Any call that transports a message must name a buffer fully
        // inside the caller's address space.
        if function.transports_message() {
            self.range_check(caller, msg_addr)?;
        }

        // A sending call must be allowed by the send mask and must not
        // target the dead.
        if function.sends() {
            let dst_id = self.slot(peer).priv_id;
            if !self.priv_of(caller).allows_send_to(dst_id) {
                log::warn!("sys_call: send mask denied {} sending to {}", caller, peer);
                return Err(Error::CallDenied);
            }
            if self.is_empty_slot(peer) {
                return Err(Error::DeadDst);
            }
        }

        match function {
            CallFn::Send => self.mini_send(caller, peer, msg_addr, flags),
            CallFn::SendRec => {
                self.mini_send(caller, peer, msg_addr, flags)?;
                // The answer must be a true reply, not a stale
                // notification.
                self.mini_receive(caller, peer, msg_addr, flags | FRESH_ANSWER)
            }
            CallFn::Receive => self.mini_receive(caller, peer, msg_addr, flags),
            CallFn::Notify => {
                let m = self.read_user_message(caller, msg_addr)?;
                self.mini_notify(caller, peer, &m)
            }
            CallFn::Alert => self.mini_alert(caller, peer),
            CallFn::Echo => self.copy_message(caller, caller, msg_addr, caller, msg_addr),
        }
    }

    /// Reject message buffers that are not wholly inside the caller's
    /// data, gap, or stack region, at click granularity.
    fn range_check(&self, caller: ProcNr, msg_addr: VirAddr) -> KernelResult<()> {
        let map = &self.slot(caller).mem_map;
        let vlo = msg_addr.click();
        let vhi = msg_addr.offset(MESS_SIZE - 1).click();
        if vlo < map[D].vir || vlo > vhi || vhi >= map[S].vir + map[S].len {
            return Err(Error::Fault);
        }
        Ok(())
    }
}
