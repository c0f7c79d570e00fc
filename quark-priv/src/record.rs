//! The privilege record
//!
//! One record per privileged process, provisioned by the privilege
//! database and consumed read-only by the kernel core during IPC. The
//! only fields the core writes are the pending-notification map and the
//! pseudo-source payload words, both of which are delivery state rather
//! than policy.

use quark_abi::proc_nr::{ProcNr, NONE};
use quark_abi::PhysAddr;

use crate::flags::PrivFlags;
use crate::sysmap::SysMap;

/// Number of dense system IDs, and so the width of every [`SysMap`].
pub const NR_SYS_PROCS: usize = 32;

/// Dense system ID of a privileged process. Distinct from the process
/// number; used to index bitmaps.
pub type SysId = usize;

/// Pattern planted at the base of every kernel-task stack.
pub const STACK_GUARD: u32 = 0xDEAD_BEEF;

/// Privilege record of one process.
#[derive(Clone, Copy, Debug)]
pub struct Priv {
    /// Dense system ID.
    pub id: SysId,
    /// Reverse mapping back to the process number.
    pub proc_nr: ProcNr,
    /// Scheduling/accounting traits.
    pub flags: PrivFlags,
    /// Allowed call functions, one bit per function code.
    pub call_mask: u16,
    /// Allowed destinations, by system ID.
    pub send_mask: SysMap,
    /// Sources with a pending-bitmap notification queued for this
    /// process. Owned by the delivery path.
    pub notify_pending: SysMap,
    /// Pending-interrupt word, spliced into HARDWARE notifications.
    pub int_pending: u32,
    /// Pending-signal word, spliced into SYSTEM notifications.
    pub sig_pending: u32,
    /// Location of the stack canary for kernel tasks; null otherwise.
    pub stack_guard: PhysAddr,
}

impl Priv {
    /// An unprovisioned record.
    #[inline]
    #[must_use]
    pub const fn new(id: SysId) -> Self {
        Self {
            id,
            proc_nr: NONE,
            flags: PrivFlags::NONE,
            call_mask: 0,
            send_mask: SysMap::new(),
            notify_pending: SysMap::new(),
            int_pending: 0,
            sig_pending: 0,
            stack_guard: PhysAddr::new(0),
        }
    }

    /// May this privilege invoke the call function with mask bit `bit`?
    #[inline]
    #[must_use]
    pub const fn allows_call(&self, bit: u16) -> bool {
        self.call_mask & bit != 0
    }

    /// May this privilege send to the destination with system ID `id`?
    #[inline]
    #[must_use]
    pub const fn allows_send_to(&self, id: SysId) -> bool {
        self.send_mask.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quark_abi::call::CallFn;

    #[test]
    fn test_unprovisioned_denies_everything() {
        let p = Priv::new(0);
        assert!(!p.allows_call(CallFn::Send.mask_bit()));
        assert!(!p.allows_send_to(1));
        assert!(p.stack_guard.is_null());
        assert_eq!(p.proc_nr, NONE);
    }

    #[test]
    fn test_masks() {
        let mut p = Priv::new(3);
        p.call_mask = CallFn::Send.mask_bit() | CallFn::Receive.mask_bit();
        p.send_mask.set(7);

        assert!(p.allows_call(CallFn::Send.mask_bit()));
        assert!(!p.allows_call(CallFn::Notify.mask_bit()));
        assert!(p.allows_send_to(7));
        assert!(!p.allows_send_to(8));
    }
}
