//! Error handling for the capture path
//!
//! Every failure here is terminal for a single event only. None of them is
//! ever surfaced to the traced syscall.

use core::fmt;

/// Failures that can occur while building one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ring buffer had no room for another event
    Reserve,

    /// A guarded read of kernel memory failed
    KernelRead(i64),

    /// A guarded read of user memory failed
    UserRead(i64),

    /// A BPF helper other than a memory read failed
    Helper(i64),

    /// A kernel pointer that must be set was NULL
    NullPointer(&'static str),
}

impl Error {
    /// Convert error to a return code suitable for BPF programs
    #[inline(always)]
    pub const fn to_retval(self) -> u32 {
        match self {
            Self::KernelRead(code) | Self::UserRead(code) | Self::Helper(code) => code as u32,
            Self::Reserve => 1,
            Self::NullPointer(_) => 2,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserve => write!(f, "ring buffer reservation failed"),
            Self::KernelRead(code) => write!(f, "kernel read error: {}", code),
            Self::UserRead(code) => write!(f, "user read error: {}", code),
            Self::Helper(code) => write!(f, "helper function error: {}", code),
            Self::NullPointer(what) => write!(f, "null pointer: {}", what),
        }
    }
}

/// Result type specialized for the capture path
pub type Result<T> = core::result::Result<T, Error>;
