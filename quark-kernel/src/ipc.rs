//! The message-passing primitives
//!
//! Four primitives, all operating on the process table:
//!
//! - [`Kernel::mini_send`]: deliver to a waiting receiver or block the
//!   sender on the destination's caller queue.
//! - [`Kernel::mini_receive`]: consume a pending notification, a queued
//!   typed notification, or a queued sender, in that order, or block.
//! - [`Kernel::mini_alert`]: non-blocking kernel-synthesised
//!   notification, coalesced through the pending bitmap.
//! - [`Kernel::mini_notify`]: non-blocking typed notification, parked
//!   in the buffer pool with `(source, type)` coalescing.
//!
//! Blocked senders are consumed FIFO per destination. A receive that
//! is the answer half of SENDREC carries `FRESH_ANSWER` and must not be
//! satisfied by either notification path, only by a true reply.

use quark_abi::proc_nr::{ProcNr, ANY, HARDWARE, NONE, SYSTEM};
use quark_abi::{Error, KernelResult, Message, VirAddr, FRESH_ANSWER, NON_BLOCKING};
use quark_priv::{RtsFlags, SysId};

use crate::kernel::Kernel;
use crate::notify::Notification;

impl Kernel {
    /// Send the message at `msg_addr` from `caller` to `dst`.
    ///
    /// If `dst` is blocked waiting for this message, copy it over and
    /// unblock `dst`. Otherwise block and queue the caller, unless the
    /// flags forbid blocking.
    pub(crate) fn mini_send(
        &mut self,
        caller: ProcNr,
        dst: ProcNr,
        msg_addr: VirAddr,
        flags: u32,
    ) -> KernelResult<()> {
        // Refuse to complete a cycle of processes sending to each
        // other. Each hop has a unique destination, so the walk
        // terminates.
        let mut xp = dst;
        while self.slot(xp).rts_flags.contains(RtsFlags::SENDING) {
            xp = self.slot(xp).send_to;
            if xp == caller {
                return Err(Error::Locked);
            }
        }

        // The destination's SENDING flag may be set when its SENDREC
        // call blocked while sending; it is not receiving then.
        let drf = self.slot(dst).rts_flags;
        let waiting_for_us = drf.contains(RtsFlags::RECEIVING)
            && !drf.contains(RtsFlags::SENDING)
            && (self.slot(dst).get_from == ANY || self.slot(dst).get_from == caller);

        if waiting_for_us {
            let dst_buf = self.slot(dst).msg_addr;
            self.copy_message(caller, caller, msg_addr, dst, dst_buf)?;
            self.slot_mut(dst).rts_flags.remove(RtsFlags::RECEIVING);
            if self.slot(dst).rts_flags.runnable() {
                self.ready(dst);
            }
        } else if flags & NON_BLOCKING != 0 {
            return Err(Error::NotReady);
        } else {
            self.slot_mut(caller).msg_addr = msg_addr;
            if self.slot(caller).rts_flags.runnable() {
                self.unready(caller);
            }
            let p = self.slot_mut(caller);
            p.rts_flags.insert(RtsFlags::SENDING);
            p.send_to = dst;
            self.caller_q_append(dst, caller);
        }
        Ok(())
    }

    /// Receive into `msg_addr` from `src` (`ANY` or a specific slot).
    ///
    /// Delivery is skipped entirely while the caller's own SENDING flag
    /// is set: a SENDREC whose send blocked must wait for that send to
    /// complete first.
    pub(crate) fn mini_receive(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
        msg_addr: VirAddr,
        flags: u32,
    ) -> KernelResult<()> {
        if !self.slot(caller).rts_flags.contains(RtsFlags::SENDING) {
            // Notifications first, except for the answer half of
            // SENDREC, which only a true reply may satisfy.
            if flags & FRESH_ANSWER == 0 {
                if self.take_pending_alert(caller, src, msg_addr)? {
                    return Ok(());
                }
                if self.take_queued_notification(caller, src, msg_addr)? {
                    return Ok(());
                }
            }

            // Queued senders, FIFO, oldest acceptable one wins.
            let mut prev: ProcNr = NONE;
            let mut cur = self.slot(caller).caller_q;
            while cur != NONE {
                if src == ANY || src == cur {
                    let sender_buf = self.slot(cur).msg_addr;
                    self.copy_message(cur, cur, sender_buf, caller, msg_addr)?;
                    self.slot_mut(cur).rts_flags.remove(RtsFlags::SENDING);
                    if self.slot(cur).rts_flags.runnable() {
                        self.ready(cur);
                    }
                    let next = self.slot(cur).q_link;
                    if prev == NONE {
                        self.slot_mut(caller).caller_q = next;
                    } else {
                        self.slot_mut(prev).q_link = next;
                    }
                    self.slot_mut(cur).q_link = NONE;
                    return Ok(());
                }
                prev = cur;
                cur = self.slot(cur).q_link;
            }
        }

        // Nothing acceptable was available, or the caller's SENDREC
        // could not send yet.
        if flags & NON_BLOCKING != 0 {
            return Err(Error::NotReady);
        }
        self.slot_mut(caller).get_from = src;
        self.slot_mut(caller).msg_addr = msg_addr;
        if self.slot(caller).rts_flags.runnable() {
            self.unready(caller);
        }
        self.slot_mut(caller).rts_flags.insert(RtsFlags::RECEIVING);
        Ok(())
    }

    /// Alert `dst` on behalf of `caller`: deliver a kernel-synthesised
    /// notification now, or mark it pending in the destination's
    /// bitmap. Never blocks; repeated alerts from one source coalesce
    /// into a single pending bit and the payload is recomputed at
    /// receive time.
    pub(crate) fn mini_alert(&mut self, caller: ProcNr, dst: ProcNr) -> KernelResult<()> {
        if self.waiting_for(dst, caller) {
            let m = self.build_mess(caller, dst);
            let dst_buf = self.slot(dst).msg_addr;
            self.deliver_kernel_message(caller, dst, dst_buf, &m)?;
            self.slot_mut(dst).rts_flags.remove(RtsFlags::RECEIVING);
            if self.slot(dst).rts_flags.runnable() {
                self.ready(dst);
            }
            return Ok(());
        }

        // Note the indirection: the pending bitmap is keyed by system
        // ID, not process number.
        let src_id = self.priv_of(caller).id;
        self.priv_of_mut(dst).notify_pending.set(src_id);
        Ok(())
    }

    /// Send the typed notification `msg` from `caller` to `dst`:
    /// deliver it now, or park it in the notification pool. Never
    /// blocks; a queued notification with the same source and type is
    /// overwritten in place.
    pub(crate) fn mini_notify(
        &mut self,
        caller: ProcNr,
        dst: ProcNr,
        msg: &Message,
    ) -> KernelResult<()> {
        if self.waiting_for(dst, caller) {
            let mut m = *msg;
            // The hardware pseudo-source carries the map of pending
            // interrupts as its argument.
            if caller == HARDWARE {
                m.arg = self.priv_of(dst).int_pending;
                self.priv_of_mut(dst).int_pending = 0;
            }
            let dst_buf = self.slot(dst).msg_addr;
            self.deliver_kernel_message(caller, dst, dst_buf, &m)?;
            self.slot_mut(dst).rts_flags.remove(RtsFlags::RECEIVING);
            if self.slot(dst).rts_flags.runnable() {
                self.ready(dst);
            }
            return Ok(());
        }

        // Coalesce with a queued notification of the same source and
        // type.
        let mut cur = self.slot(dst).ntf_q;
        while let Some(i) = cur {
            let n = self.pool.get(i);
            if n.source == caller && n.ntype == msg.mtype {
                let slot = self.pool.get_mut(i);
                slot.flags = msg.flags;
                slot.arg = msg.arg;
                return Ok(());
            }
            cur = n.next;
        }

        // Park a fresh notification at the tail of the queue.
        let index = self.pool.alloc().ok_or(Error::NoSpace)?;
        *self.pool.get_mut(index) = Notification {
            source: caller,
            ntype: msg.mtype,
            flags: msg.flags,
            arg: msg.arg,
            next: None,
        };
        match self.slot(dst).ntf_q {
            None => self.slot_mut(dst).ntf_q = Some(index),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.pool.get(tail).next {
                    tail = next;
                }
                self.pool.get_mut(tail).next = Some(index);
            }
        }
        Ok(())
    }

    /// Is `dst` blocked receiving a message that `src` may satisfy?
    fn waiting_for(&self, dst: ProcNr, src: ProcNr) -> bool {
        let drf = self.slot(dst).rts_flags;
        drf.contains(RtsFlags::RECEIVING)
            && !drf.contains(RtsFlags::SENDING)
            && (self.slot(dst).get_from == ANY || self.slot(dst).get_from == src)
    }

    /// Assemble the notification message for `src` arriving at `dst`.
    /// The pseudo-sources splice in, and clear, their pending word.
    pub(crate) fn build_mess(&mut self, src: ProcNr, dst: ProcNr) -> Message {
        let mut m = Message::new();
        m.source = src;
        m.mtype = Message::notify_type_from(src);
        m.timestamp = self.uptime;
        match src {
            HARDWARE => {
                m.arg = self.priv_of(dst).int_pending;
                self.priv_of_mut(dst).int_pending = 0;
            }
            SYSTEM => {
                m.arg = self.priv_of(dst).sig_pending;
                self.priv_of_mut(dst).sig_pending = 0;
            }
            _ => {}
        }
        m
    }

    /// Try to consume a pending-bitmap notification acceptable to
    /// `src`. Bits are scanned in ascending system-ID order.
    fn take_pending_alert(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
        msg_addr: VirAddr,
    ) -> KernelResult<bool> {
        let mut found: Option<(SysId, ProcNr)> = None;
        for id in self.priv_of(caller).notify_pending.iter_set() {
            let src_nr = self.id_to_nr(id);
            if src == ANY || src == src_nr {
                found = Some((id, src_nr));
                break;
            }
        }
        let Some((id, src_nr)) = found else {
            return Ok(false);
        };
        self.priv_of_mut(caller).notify_pending.unset(id);
        let m = self.build_mess(src_nr, caller);
        self.deliver_kernel_message(src_nr, caller, msg_addr, &m)?;
        Ok(true)
    }

    /// Try to consume a queued typed notification acceptable to `src`,
    /// releasing its pool buffer.
    fn take_queued_notification(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
        msg_addr: VirAddr,
    ) -> KernelResult<bool> {
        let mut prev: Option<usize> = None;
        let mut cur = self.slot(caller).ntf_q;
        while let Some(i) = cur {
            let n = self.pool.get(i);
            if src == ANY || src == n.source {
                let mut m = Message::new();
                m.source = n.source;
                m.mtype = n.ntype;
                m.flags = n.flags;
                m.arg = n.arg;
                if n.source == HARDWARE {
                    m.arg = self.priv_of(caller).int_pending;
                    self.priv_of_mut(caller).int_pending = 0;
                }
                self.deliver_kernel_message(n.source, caller, msg_addr, &m)?;
                match prev {
                    None => self.slot_mut(caller).ntf_q = n.next,
                    Some(p) => self.pool.get_mut(p).next = n.next,
                }
                self.pool.free(i);
                return Ok(true);
            }
            prev = cur;
            cur = n.next;
        }
        Ok(false)
    }

    /// Append `caller` at the tail of `dst`'s caller queue (FIFO).
    fn caller_q_append(&mut self, dst: ProcNr, caller: ProcNr) {
        self.slot_mut(caller).q_link = NONE;
        let head = self.slot(dst).caller_q;
        if head == NONE {
            self.slot_mut(dst).caller_q = caller;
            return;
        }
        let mut tail = head;
        loop {
            let next = self.slot(tail).q_link;
            if next == NONE {
                break;
            }
            tail = next;
        }
        self.slot_mut(tail).q_link = caller;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_fixture::kernel_with_users;
    use quark_abi::proc_nr::CLOCK;

    const A: ProcNr = 0;
    const B: ProcNr = 1;
    const C: ProcNr = 2;

    const BUF: VirAddr = VirAddr(0x100);
    const BUF2: VirAddr = VirAddr(0x200);

    fn put(k: &mut Kernel, nr: ProcNr, at: VirAddr, mtype: i32) {
        let mut m = Message::new();
        m.mtype = mtype;
        k.write_user_message(nr, at, &m).unwrap();
    }

    #[test]
    fn test_rendezvous() {
        let mut k = kernel_with_users(2);
        k.mini_receive(B, ANY, BUF, 0).unwrap();
        assert!(k.proc(B).rts_flags.contains(RtsFlags::RECEIVING));
        assert!(!k.proc(B).ready);

        put(&mut k, A, BUF2, 33);
        k.mini_send(A, B, BUF2, 0).unwrap();

        let got = k.read_user_message(B, BUF).unwrap();
        assert_eq!(got.source, A);
        assert_eq!(got.mtype, 33);
        assert!(k.proc(A).rts_flags.runnable());
        assert!(k.proc(B).rts_flags.runnable());
        assert!(k.proc(B).ready);
    }

    #[test]
    fn test_send_to_specific_receiver_filter() {
        let mut k = kernel_with_users(3);
        // B waits for C specifically; A's send must queue.
        k.mini_receive(B, C, BUF, 0).unwrap();
        k.mini_send(A, B, BUF2, 0).unwrap();
        assert!(k.proc(A).rts_flags.contains(RtsFlags::SENDING));
        assert!(k.proc(B).rts_flags.contains(RtsFlags::RECEIVING));

        // C's send is the one B was waiting for.
        put(&mut k, C, BUF2, 7);
        k.mini_send(C, B, BUF2, 0).unwrap();
        assert!(k.proc(B).rts_flags.runnable());
        assert_eq!(k.read_user_message(B, BUF).unwrap().source, C);
        // A stays queued until B asks again.
        assert!(k.proc(A).rts_flags.contains(RtsFlags::SENDING));
    }

    #[test]
    fn test_queued_senders_delivered_fifo() {
        let mut k = kernel_with_users(3);
        put(&mut k, A, BUF, 100);
        put(&mut k, C, BUF, 200);
        k.mini_send(A, B, BUF, 0).unwrap();
        k.mini_send(C, B, BUF, 0).unwrap();
        assert_eq!(k.proc(B).caller_q, A);
        assert_eq!(k.proc(A).q_link, C);

        k.mini_receive(B, ANY, BUF2, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF2).unwrap().source, A);
        assert!(k.proc(A).rts_flags.runnable());

        k.mini_receive(B, ANY, BUF2, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF2).unwrap().source, C);
        assert!(k.proc(C).rts_flags.runnable());
        assert_eq!(k.proc(B).caller_q, NONE);
    }

    #[test]
    fn test_receive_by_source_picks_from_middle() {
        let mut k = kernel_with_users(3);
        put(&mut k, A, BUF, 1);
        put(&mut k, C, BUF, 2);
        k.mini_send(A, B, BUF, 0).unwrap();
        k.mini_send(C, B, BUF, 0).unwrap();

        k.mini_receive(B, C, BUF2, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF2).unwrap().mtype, 2);
        // A is still queued and still first.
        assert_eq!(k.proc(B).caller_q, A);
        assert_eq!(k.proc(A).q_link, NONE);
    }

    #[test]
    fn test_deadlock_rejected() {
        let mut k = kernel_with_users(2);
        k.mini_send(A, B, BUF, 0).unwrap();
        assert!(k.proc(A).rts_flags.contains(RtsFlags::SENDING));

        let err = k.mini_send(B, A, BUF, 0).unwrap_err();
        assert_eq!(err, Error::Locked);
        assert!(k.proc(A).rts_flags.contains(RtsFlags::SENDING));
        assert!(k.proc(B).rts_flags.runnable());
    }

    #[test]
    fn test_deadlock_rejected_through_chain() {
        let mut k = kernel_with_users(3);
        k.mini_send(A, B, BUF, 0).unwrap();
        k.mini_send(B, C, BUF, 0).unwrap();
        let err = k.mini_send(C, A, BUF, 0).unwrap_err();
        assert_eq!(err, Error::Locked);
    }

    #[test]
    fn test_non_blocking_never_suspends() {
        let mut k = kernel_with_users(2);
        let err = k.mini_send(A, B, BUF, NON_BLOCKING).unwrap_err();
        assert_eq!(err, Error::NotReady);
        assert!(k.proc(A).rts_flags.runnable());

        let err = k.mini_receive(A, ANY, BUF, NON_BLOCKING).unwrap_err();
        assert_eq!(err, Error::NotReady);
        assert!(k.proc(A).rts_flags.runnable());
        assert!(k.proc(A).ready);
    }

    #[test]
    fn test_alert_delivers_to_waiting_receiver() {
        let mut k = kernel_with_users(2);
        k.mini_receive(B, ANY, BUF, 0).unwrap();
        k.mini_alert(A, B).unwrap();
        let got = k.read_user_message(B, BUF).unwrap();
        assert_eq!(got.source, A);
        assert_eq!(got.mtype, Message::notify_type_from(A));
        assert!(k.proc(B).rts_flags.runnable());
        assert!(k.privilege(B).notify_pending.is_empty());
    }

    #[test]
    fn test_alert_coalesces_in_pending_bitmap() {
        let mut k = kernel_with_users(2);
        // B is busy; three interrupt bursts accumulate externally.
        k.set_int_pending(B, 0x1);
        k.mini_alert(HARDWARE, B).unwrap();
        k.set_int_pending(B, 0x2);
        k.mini_alert(HARDWARE, B).unwrap();
        k.set_int_pending(B, 0x4);
        k.mini_alert(HARDWARE, B).unwrap();
        assert_eq!(k.privilege(B).notify_pending.iter_set().count(), 1);

        k.mini_receive(B, HARDWARE, BUF, 0).unwrap();
        let got = k.read_user_message(B, BUF).unwrap();
        assert_eq!(got.source, HARDWARE);
        assert_eq!(got.arg, 0x7, "payload is recomputed at receive time");
        assert_eq!(k.privilege(B).int_pending, 0);
        assert!(k.privilege(B).notify_pending.is_empty());
    }

    #[test]
    fn test_system_alert_carries_signal_word() {
        let mut k = kernel_with_users(1);
        k.set_sig_pending(A, 0x30);
        k.mini_alert(SYSTEM, A).unwrap();
        k.mini_receive(A, ANY, BUF, 0).unwrap();
        let got = k.read_user_message(A, BUF).unwrap();
        assert_eq!(got.source, SYSTEM);
        assert_eq!(got.arg, 0x30);
        assert_eq!(k.privilege(A).sig_pending, 0);
    }

    #[test]
    fn test_alert_timestamps_with_uptime() {
        let mut k = kernel_with_users(2);
        for _ in 0..5 {
            k.clock_tick();
        }
        k.mini_receive(B, ANY, BUF, 0).unwrap();
        k.mini_alert(A, B).unwrap();
        assert_eq!(k.read_user_message(B, BUF).unwrap().timestamp, 5);
    }

    #[test]
    fn test_notify_overwrite_coalescing() {
        let mut k = kernel_with_users(2);
        let mut m = Message::new();
        m.mtype = 0x42;
        m.arg = 1;
        k.mini_notify(A, B, &m).unwrap();
        m.arg = 2;
        k.mini_notify(A, B, &m).unwrap();

        // Still one queued entry, carrying the newer argument.
        let head = k.proc(B).ntf_q.unwrap();
        assert_eq!(k.pool.get(head).next, None);
        assert_eq!(k.pool.get(head).arg, 2);

        k.mini_receive(B, A, BUF, 0).unwrap();
        let got = k.read_user_message(B, BUF).unwrap();
        assert_eq!(got.source, A);
        assert_eq!(got.mtype, 0x42);
        assert_eq!(got.arg, 2);
        assert_eq!(k.proc(B).ntf_q, None, "buffer reclaimed on delivery");
    }

    #[test]
    fn test_notify_distinct_types_queue_separately() {
        let mut k = kernel_with_users(2);
        let mut m = Message::new();
        m.mtype = 1;
        k.mini_notify(A, B, &m).unwrap();
        m.mtype = 2;
        k.mini_notify(A, B, &m).unwrap();

        k.mini_receive(B, A, BUF, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF).unwrap().mtype, 1);
        k.mini_receive(B, A, BUF, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF).unwrap().mtype, 2);
        assert_eq!(k.proc(B).ntf_q, None);
    }

    #[test]
    fn test_notify_pool_exhaustion() {
        let mut k = kernel_with_users(2);
        let mut m = Message::new();
        for t in 0..crate::notify::NR_NOTIFY_BUFS {
            m.mtype = t as i32;
            k.mini_notify(A, B, &m).unwrap();
        }
        m.mtype = crate::notify::NR_NOTIFY_BUFS as i32;
        assert_eq!(k.mini_notify(A, B, &m).unwrap_err(), Error::NoSpace);

        // Consuming one frees a buffer for the next notify.
        k.mini_receive(B, A, BUF, 0).unwrap();
        k.mini_notify(A, B, &m).unwrap();
    }

    #[test]
    fn test_notifications_delivered_before_queued_senders() {
        let mut k = kernel_with_users(3);
        put(&mut k, C, BUF, 55);
        k.mini_send(C, B, BUF, 0).unwrap();
        k.mini_alert(A, B).unwrap();

        // The pending notification wins even though the sender queued
        // first.
        k.mini_receive(B, ANY, BUF2, 0).unwrap();
        let first = k.read_user_message(B, BUF2).unwrap();
        assert_eq!(first.source, A);
        assert_eq!(first.mtype, Message::notify_type_from(A));

        k.mini_receive(B, ANY, BUF2, 0).unwrap();
        assert_eq!(k.read_user_message(B, BUF2).unwrap().source, C);
    }

    #[test]
    fn test_fresh_answer_suppresses_notifications() {
        let mut k = kernel_with_users(3);
        k.mini_alert(A, B).unwrap();
        let mut m = Message::new();
        m.mtype = 9;
        k.mini_notify(A, B, &m).unwrap();

        // A receive carrying FRESH_ANSWER sees neither notification
        // path and blocks.
        k.mini_receive(B, ANY, BUF, FRESH_ANSWER).unwrap();
        assert!(k.proc(B).rts_flags.contains(RtsFlags::RECEIVING));
        assert!(!k.privilege(B).notify_pending.is_empty());
        assert!(k.proc(B).ntf_q.is_some());
    }

    #[test]
    fn test_receive_while_sending_stays_blocked() {
        let mut k = kernel_with_users(3);
        // A's SENDREC to B blocks in the send half.
        k.mini_send(A, B, BUF, 0).unwrap();
        k.mini_receive(A, B, BUF, FRESH_ANSWER).unwrap();
        assert!(k.proc(A).rts_flags.contains(RtsFlags::SENDING));
        assert!(k.proc(A).rts_flags.contains(RtsFlags::RECEIVING));

        // Even a pending alert for A must not unblock the receive.
        k.mini_alert(C, A).unwrap();
        assert!(!k.proc(A).rts_flags.runnable());

        // B consumes the send; A remains blocked receiving the answer.
        k.mini_receive(B, ANY, BUF2, 0).unwrap();
        assert!(!k.proc(A).rts_flags.contains(RtsFlags::SENDING));
        assert!(k.proc(A).rts_flags.contains(RtsFlags::RECEIVING));

        // B's reply completes the exchange.
        put(&mut k, B, BUF2, 77);
        k.mini_send(B, A, BUF2, 0).unwrap();
        assert!(k.proc(A).rts_flags.runnable());
        assert_eq!(k.read_user_message(A, BUF).unwrap().source, B);
    }

    #[test]
    fn test_alert_to_parked_kernel_task_delivers() {
        let mut k = kernel_with_users(1);
        // CLOCK parked receiving ANY at boot.
        k.mini_alert(A, CLOCK).unwrap();
        assert!(k.proc(CLOCK).rts_flags.runnable());
        assert!(k.proc(CLOCK).ready);
        assert_eq!(k.read_user_message(CLOCK, VirAddr(0)).unwrap().source, A);
    }
}
