//! Typed-notification pool
//!
//! Typed notifications that cannot be delivered immediately are parked
//! in a fixed pool of buffers and chained onto the destination's
//! notification queue. The pool is the only dynamically allocated
//! resource in the core; slots are claimed through a bit allocator and
//! reclaimed when a receive consumes the notification.
//!
//! Repeated notifications with the same `(source, type)` coalesce into
//! the already-queued buffer, so a slow receiver costs its senders at
//! most one buffer per distinct notification.

use quark_abi::proc_nr::{ProcNr, NONE};
use quark_priv::pool::{alloc_bit, free_bit};
use quark_priv::sysmap::{bitmap_chunks, BitChunk};

/// Number of buffers in the pool.
pub const NR_NOTIFY_BUFS: usize = 128;

const MAP_CHUNKS: usize = bitmap_chunks(NR_NOTIFY_BUFS);

/// One parked typed notification.
#[derive(Clone, Copy, Debug)]
pub struct Notification {
    /// Sending process.
    pub source: ProcNr,
    /// Message type the sender chose.
    pub ntype: i32,
    /// Notify body: flag word.
    pub flags: u32,
    /// Notify body: argument word.
    pub arg: u32,
    /// Next notification for the same destination.
    pub next: Option<usize>,
}

impl Notification {
    const fn empty() -> Self {
        Self {
            source: NONE,
            ntype: 0,
            flags: 0,
            arg: 0,
            next: None,
        }
    }
}

/// The fixed buffer pool and its allocation bitmap.
pub(crate) struct NotifyPool {
    bufs: [Notification; NR_NOTIFY_BUFS],
    map: [BitChunk; MAP_CHUNKS],
}

impl NotifyPool {
    pub(crate) const fn new() -> Self {
        Self {
            bufs: [Notification::empty(); NR_NOTIFY_BUFS],
            map: [0; MAP_CHUNKS],
        }
    }

    /// Claim a free buffer, lowest index first.
    pub(crate) fn alloc(&mut self) -> Option<usize> {
        alloc_bit(&mut self.map, NR_NOTIFY_BUFS)
    }

    /// Release a buffer after its notification was consumed.
    pub(crate) fn free(&mut self, index: usize) {
        free_bit(&mut self.map, index);
        self.bufs[index] = Notification::empty();
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Notification {
        self.bufs[index]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> &mut Notification {
        &mut self.bufs[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_alloc_free() {
        let mut pool = NotifyPool::new();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_ne!(a, b);

        pool.get_mut(a).arg = 7;
        assert_eq!(pool.get(a).arg, 7);

        pool.free(a);
        assert_eq!(pool.get(a).source, NONE);
        // Freed slot is reused lowest-first.
        assert_eq!(pool.alloc(), Some(a));
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = NotifyPool::new();
        for _ in 0..NR_NOTIFY_BUFS {
            assert!(pool.alloc().is_some());
        }
        assert!(pool.alloc().is_none());
    }
}
