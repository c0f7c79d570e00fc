//! The message record
//!
//! All IPC transports the same fixed-size record. The kernel copies
//! exactly [`MESS_SIZE`] bytes and stamps the source slot; everything
//! past `mtype` is interpreted by the peers, except for the notify body
//! slots which the kernel itself fills when synthesising notification
//! messages.
//!
//! The explicit little-endian codec is what the kernel's memory model
//! moves between address spaces; `#[repr(C)]` keeps the in-kernel view
//! ABI-stable as well.

use crate::proc_nr::{ProcNr, NR_TASKS};

/// Size of a message on the wire, in bytes.
pub const MESS_SIZE: usize = 48;

/// Type-code bit marking kernel-synthesised notification messages.
pub const NOTIFICATION: i32 = 0x1000;

/// The fixed-size message record.
///
/// Field roles for notification messages (`mtype` has [`NOTIFICATION`]
/// set): `flags` and `arg` carry the notify body, `timestamp` the
/// uptime at assembly. For ordinary messages the same space is free
/// payload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Sending process; stamped by the kernel on every copy.
    pub source: ProcNr,
    /// Message type, chosen by the sender.
    pub mtype: i32,
    /// Notify body: flag word.
    pub flags: u32,
    /// Notify body: argument word (pending-interrupt or pending-signal
    /// payload for the pseudo-sources).
    pub arg: u32,
    /// Notify body: uptime when the notification was assembled.
    pub timestamp: u64,
    /// Free-form payload words.
    pub payload: [u64; 3],
}

impl Message {
    /// An all-zero message.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source: 0,
            mtype: 0,
            flags: 0,
            arg: 0,
            timestamp: 0,
            payload: [0; 3],
        }
    }

    /// The `mtype` of a notification from `src`.
    ///
    /// Encodes the source slot so receivers can demultiplex
    /// notifications without trusting the body.
    #[inline]
    #[must_use]
    pub const fn notify_type_from(src: ProcNr) -> i32 {
        NOTIFICATION | (src + NR_TASKS)
    }

    /// Serialise into `buf` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`MESS_SIZE`].
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.source.to_le_bytes());
        buf[4..8].copy_from_slice(&self.mtype.to_le_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..16].copy_from_slice(&self.arg.to_le_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_le_bytes());
        for (i, word) in self.payload.iter().enumerate() {
            let at = 24 + i * 8;
            buf[at..at + 8].copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Deserialise from `buf` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`MESS_SIZE`].
    #[must_use]
    pub fn read_from(buf: &[u8]) -> Self {
        let word32 = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[at..at + 4]);
            b
        };
        let word64 = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        Self {
            source: ProcNr::from_le_bytes(word32(0)),
            mtype: i32::from_le_bytes(word32(4)),
            flags: u32::from_le_bytes(word32(8)),
            arg: u32::from_le_bytes(word32(12)),
            timestamp: word64(16),
            payload: [word64(24), word64(32), word64(40)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_size() {
        assert_eq!(core::mem::size_of::<Message>(), MESS_SIZE);
    }

    #[test]
    fn test_codec() {
        let m = Message {
            source: -1,
            mtype: Message::notify_type_from(-1),
            flags: 0x11,
            arg: 0x2233,
            timestamp: 0x4455_6677_8899_aabb,
            payload: [1, 2, 3],
        };
        let mut buf = [0u8; MESS_SIZE];
        m.write_to(&mut buf);
        assert_eq!(Message::read_from(&buf), m);
    }

    #[test]
    fn test_notify_type_is_marked() {
        let t = Message::notify_type_from(0);
        assert_ne!(t & NOTIFICATION, 0);
        assert_ne!(Message::notify_type_from(1), t);
    }
}
