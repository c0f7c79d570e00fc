//! System-call numbers
//!
//! A raw call number packs a function code in the low nibble and flag
//! bits above it. The only calls that exist in this kernel are the
//! message-passing primitives; everything else in the system is built
//! on top of them.

/// Mask selecting the function code from a raw call number.
pub const SYSCALL_FUNC: u32 = 0x0F;

/// Mask selecting the flag bits from a raw call number.
pub const SYSCALL_FLAGS: u32 = 0xF0;

/// Do not block; fail with `ENOTREADY` if the peer is not ready.
/// Applies to SEND and RECEIVE.
pub const NON_BLOCKING: u32 = 0x10;

/// Suppress notification delivery for this receive: only a true reply
/// may satisfy it. Set implicitly for the receive half of SENDREC.
pub const FRESH_ANSWER: u32 = 0x20;

/// System-call function codes.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallFn {
    /// Blocking send: block until the message has been delivered.
    Send = 1,
    /// Blocking receive: block until an acceptable message has arrived.
    Receive = 2,
    /// Combined send-then-receive in a single trap (RPC pattern).
    SendRec = 3,
    /// Non-blocking typed notification; delivered or queued, never blocks.
    Notify = 4,
    /// Non-blocking pseudo-source alert via the pending bitmap.
    Alert = 5,
    /// Echo the message straight back to the caller.
    Echo = 6,
}

impl CallFn {
    /// Try to decode the function code of a raw call number.
    #[must_use]
    pub const fn from_number(call_nr: u32) -> Option<Self> {
        match call_nr & SYSCALL_FUNC {
            1 => Some(Self::Send),
            2 => Some(Self::Receive),
            3 => Some(Self::SendRec),
            4 => Some(Self::Notify),
            5 => Some(Self::Alert),
            6 => Some(Self::Echo),
            _ => None,
        }
    }

    /// Get the function name for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Send => "SEND",
            Self::Receive => "RECEIVE",
            Self::SendRec => "SENDREC",
            Self::Notify => "NOTIFY",
            Self::Alert => "ALERT",
            Self::Echo => "ECHO",
        }
    }

    /// The bit this function occupies in a privilege call mask.
    #[inline]
    #[must_use]
    pub const fn mask_bit(self) -> u16 {
        1 << (self as u32)
    }

    /// Does this call send a message to a peer?
    ///
    /// Sending calls are subject to the send-mask and dead-destination
    /// checks.
    #[inline]
    #[must_use]
    pub const fn sends(self) -> bool {
        matches!(self, Self::Send | Self::SendRec | Self::Notify | Self::Alert)
    }

    /// Does this call transport a message body?
    ///
    /// Transporting calls are subject to the buffer range check. ALERT
    /// carries no caller-supplied message; its body is synthesised in
    /// the kernel.
    #[inline]
    #[must_use]
    pub const fn transports_message(self) -> bool {
        !matches!(self, Self::Alert)
    }

    /// Is this the plain RECEIVE function?
    ///
    /// Only RECEIVE may name the `ANY` sentinel as its peer.
    #[inline]
    #[must_use]
    pub const fn receives(self) -> bool {
        matches!(self, Self::Receive)
    }
}

/// Call mask granting every function. Provisioning data for ordinary
/// system processes starts from this and attenuates.
pub const ALL_CALLS_MASK: u16 = CallFn::Send.mask_bit()
    | CallFn::Receive.mask_bit()
    | CallFn::SendRec.mask_bit()
    | CallFn::Notify.mask_bit()
    | CallFn::Alert.mask_bit()
    | CallFn::Echo.mask_bit();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(CallFn::from_number(1), Some(CallFn::Send));
        assert_eq!(CallFn::from_number(3 | NON_BLOCKING), Some(CallFn::SendRec));
        assert_eq!(CallFn::from_number(6 | FRESH_ANSWER), Some(CallFn::Echo));
        assert_eq!(CallFn::from_number(0), None);
        assert_eq!(CallFn::from_number(7), None);
        assert_eq!(CallFn::from_number(0xF), None);
    }

    #[test]
    fn test_predicates() {
        assert!(CallFn::Send.sends());
        assert!(CallFn::Notify.sends());
        assert!(CallFn::Alert.sends());
        assert!(!CallFn::Receive.sends());
        assert!(!CallFn::Echo.sends());

        assert!(CallFn::Send.transports_message());
        assert!(CallFn::Echo.transports_message());
        assert!(!CallFn::Alert.transports_message());

        assert!(CallFn::Receive.receives());
        assert!(!CallFn::SendRec.receives());
    }

    #[test]
    fn test_mask_bits() {
        assert_eq!(CallFn::Send.mask_bit(), 0x02);
        assert_eq!(CallFn::Receive.mask_bit(), 0x04);
        assert_eq!(ALL_CALLS_MASK, 0x7E);
    }
}
