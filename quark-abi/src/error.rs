//! System-call status codes
//!
//! Errors are reported synchronously to the immediate caller as small
//! negative integers; the kernel never throws and no error crosses a
//! process boundary. Zero is success.

/// Success status, as delivered to the trap stub.
pub const OK: i32 = 0;

/// System-call error codes.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use = "kernel status codes must be handled"]
pub enum Error {
    /// Permission check failed: call mask or send mask.
    CallDenied = -1,
    /// Invalid peer process number.
    BadSrcDst = -2,
    /// Destination slot is empty.
    DeadDst = -3,
    /// Message buffer outside the caller's address space.
    Fault = -4,
    /// Completing the send would create a send-chain cycle.
    Locked = -5,
    /// Non-blocking call found the peer not ready.
    NotReady = -6,
    /// Notification buffer pool exhausted.
    NoSpace = -7,
    /// Unknown call number.
    BadCall = -8,
}

impl Error {
    /// Convert to the raw i32 delivered to the trap stub.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the classic error name for logging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CallDenied => "ECALLDENIED",
            Self::BadSrcDst => "EBADSRCDST",
            Self::DeadDst => "EDEADDST",
            Self::Fault => "EFAULT",
            Self::Locked => "ELOCKED",
            Self::NotReady => "ENOTREADY",
            Self::NoSpace => "ENOSPC",
            Self::BadCall => "EBADCALL",
        }
    }
}

/// Result type of kernel-core operations.
pub type KernelResult<T> = Result<T, Error>;

/// Convert an operation result to the raw status the trap stub returns
/// to the caller.
#[inline]
pub fn to_return_value(result: KernelResult<()>) -> i32 {
    match result {
        Ok(()) => OK,
        Err(e) => e.as_i32(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_distinct() {
        let all = [
            Error::CallDenied,
            Error::BadSrcDst,
            Error::DeadDst,
            Error::Fault,
            Error::Locked,
            Error::NotReady,
            Error::NoSpace,
            Error::BadCall,
        ];
        for (i, e) in all.iter().enumerate() {
            assert!(e.as_i32() < 0);
            for other in &all[i + 1..] {
                assert_ne!(e.as_i32(), other.as_i32());
            }
        }
    }

    #[test]
    fn test_return_value() {
        assert_eq!(to_return_value(Ok(())), OK);
        assert_eq!(to_return_value(Err(Error::Locked)), -5);
        assert_eq!(Error::Fault.name(), "EFAULT");
    }
}
