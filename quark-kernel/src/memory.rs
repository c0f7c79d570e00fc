//! Message copies across address spaces
//!
//! The core owns a flat physical memory; each process-table slot is
//! allotted a contiguous run of clicks and its memory map places the
//! data segment at virtual click 0 and the stack segment at the top,
//! with a gap click between. Because the allocation is contiguous the
//! whole region translates linearly through the data segment.
//!
//! The only cross-space transfer the core ever performs is a single
//! message body, stamped with the source process number as it is
//! copied. The trap stubs use the user read/write helpers to move
//! messages between a caller's registers and its buffer.

use quark_abi::memmap::{D, S};
use quark_abi::proc_nr::{ProcNr, NR_TOTAL_PROCS};
use quark_abi::{Error, KernelResult, Message, PhysAddr, VirAddr, CLICK_SHIFT, MESS_SIZE};

use crate::kernel::Kernel;

/// Clicks allotted to each process-table slot.
pub const PROC_MEM_CLICKS: usize = 4;

/// Bytes of simulated physical memory.
pub const MEM_BYTES: usize = NR_TOTAL_PROCS * (PROC_MEM_CLICKS << CLICK_SHIFT);

/// The flat physical memory.
pub(crate) struct PhysMem {
    bytes: [u8; MEM_BYTES],
}

impl PhysMem {
    pub(crate) const fn new() -> Self {
        Self {
            bytes: [0; MEM_BYTES],
        }
    }

    pub(crate) fn read(&self, at: PhysAddr, buf: &mut [u8]) {
        let a = at.as_usize();
        buf.copy_from_slice(&self.bytes[a..a + buf.len()]);
    }

    pub(crate) fn write(&mut self, at: PhysAddr, buf: &[u8]) {
        let a = at.as_usize();
        self.bytes[a..a + buf.len()].copy_from_slice(buf);
    }

    pub(crate) fn read_u32(&self, at: PhysAddr) -> u32 {
        let mut b = [0u8; 4];
        self.read(at, &mut b);
        u32::from_le_bytes(b)
    }

    pub(crate) fn write_u32(&mut self, at: PhysAddr, value: u32) {
        self.write(at, &value.to_le_bytes());
    }
}

impl Kernel {
    /// Translate `len` bytes at `vir` in `nr`'s address space.
    ///
    /// The range must lie inside `[D.vir, S.vir + S.len)`; the gap
    /// between data and stack is part of the allocation and is legal.
    pub(crate) fn vir_to_phys(&self, nr: ProcNr, vir: VirAddr, len: usize) -> Option<PhysAddr> {
        let map = &self.slot(nr).mem_map;
        let lo = map[D].vir << CLICK_SHIFT;
        let hi = (map[S].vir + map[S].len) << CLICK_SHIFT;
        let a = vir.as_usize();
        if a < lo || a.checked_add(len)? > hi {
            return None;
        }
        Some(PhysAddr::new(a - lo + (map[D].phys << CLICK_SHIFT)))
    }

    /// Copy one message from `src_nr`'s space into `dst_nr`'s space,
    /// stamping `stamp` as its source.
    pub(crate) fn copy_message(
        &mut self,
        stamp: ProcNr,
        src_nr: ProcNr,
        src_addr: VirAddr,
        dst_nr: ProcNr,
        dst_addr: VirAddr,
    ) -> KernelResult<()> {
        let sp = self
            .vir_to_phys(src_nr, src_addr, MESS_SIZE)
            .ok_or(Error::Fault)?;
        let mut raw = [0u8; MESS_SIZE];
        self.mem.read(sp, &mut raw);
        let mut m = Message::read_from(&raw);
        m.source = stamp;
        self.put_message(dst_nr, dst_addr, &m)
    }

    /// Deliver a kernel-assembled message into `dst_nr`'s space,
    /// stamping `stamp` as its source.
    pub(crate) fn deliver_kernel_message(
        &mut self,
        stamp: ProcNr,
        dst_nr: ProcNr,
        dst_addr: VirAddr,
        msg: &Message,
    ) -> KernelResult<()> {
        let mut m = *msg;
        m.source = stamp;
        self.put_message(dst_nr, dst_addr, &m)
    }

    fn put_message(&mut self, dst_nr: ProcNr, dst_addr: VirAddr, msg: &Message) -> KernelResult<()> {
        let dp = self
            .vir_to_phys(dst_nr, dst_addr, MESS_SIZE)
            .ok_or(Error::Fault)?;
        let mut raw = [0u8; MESS_SIZE];
        msg.write_to(&mut raw);
        self.mem.write(dp, &raw);
        Ok(())
    }

    /// Write a message into a process's buffer, as the trap stub does
    /// when marshalling a caller's request.
    pub fn write_user_message(
        &mut self,
        nr: ProcNr,
        vaddr: VirAddr,
        msg: &Message,
    ) -> KernelResult<()> {
        self.put_message(nr, vaddr, msg)
    }

    /// Read a message out of a process's buffer, as the trap stub does
    /// when a call completes.
    pub fn read_user_message(&self, nr: ProcNr, vaddr: VirAddr) -> KernelResult<Message> {
        let p = self
            .vir_to_phys(nr, vaddr, MESS_SIZE)
            .ok_or(Error::Fault)?;
        let mut raw = [0u8; MESS_SIZE];
        self.mem.read(p, &mut raw);
        Ok(Message::read_from(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quark_abi::CLICK_SIZE;

    #[test]
    fn test_translation_is_per_process() {
        let k = Kernel::new();
        let a = k.vir_to_phys(0, VirAddr::new(0x40), MESS_SIZE).unwrap();
        let b = k.vir_to_phys(1, VirAddr::new(0x40), MESS_SIZE).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            b.as_usize() - a.as_usize(),
            PROC_MEM_CLICKS << CLICK_SHIFT
        );
    }

    #[test]
    fn test_translation_rejects_out_of_region() {
        let k = Kernel::new();
        let top = PROC_MEM_CLICKS * CLICK_SIZE;
        assert!(k.vir_to_phys(0, VirAddr::new(top), 1).is_none());
        assert!(k
            .vir_to_phys(0, VirAddr::new(top - MESS_SIZE + 1), MESS_SIZE)
            .is_none());
        // The last full message inside the stack click is fine.
        assert!(k
            .vir_to_phys(0, VirAddr::new(top - MESS_SIZE), MESS_SIZE)
            .is_some());
    }

    #[test]
    fn test_user_message_roundtrip() {
        let mut k = Kernel::new();
        let mut m = Message::new();
        m.mtype = 42;
        m.payload[0] = 0xfeed;
        k.write_user_message(2, VirAddr::new(0x100), &m).unwrap();
        let got = k.read_user_message(2, VirAddr::new(0x100)).unwrap();
        assert_eq!(got.mtype, 42);
        assert_eq!(got.payload[0], 0xfeed);
        // Neighbouring slots are untouched.
        let other = k.read_user_message(3, VirAddr::new(0x100)).unwrap();
        assert_eq!(other.mtype, 0);
    }

    #[test]
    fn test_copy_stamps_source() {
        let mut k = Kernel::new();
        let mut m = Message::new();
        m.source = 9; // forged by the sender
        m.mtype = 7;
        k.write_user_message(0, VirAddr::new(0), &m).unwrap();
        k.copy_message(0, 0, VirAddr::new(0), 1, VirAddr::new(0x80))
            .unwrap();
        let got = k.read_user_message(1, VirAddr::new(0x80)).unwrap();
        assert_eq!(got.source, 0, "kernel stamps the true source");
        assert_eq!(got.mtype, 7);
    }
}
