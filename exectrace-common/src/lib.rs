#![no_std]

//! Types and capture logic shared between the `sys_enter_execve` probe and
//! the user-space consumer.
//!
//! Everything in here compiles for `bpfel-unknown-none`: no allocation, no
//! unbounded loops, and every memory access goes through [`ProbeHelpers`].

#[cfg(any(test, feature = "user"))]
extern crate std;

pub mod argv;
pub mod capture;
pub mod error;
pub mod event;
pub mod helpers;
pub mod ring;
pub mod scratch;
pub mod task;

#[cfg(test)]
pub(crate) mod sim;

pub use capture::{capture_exec, Outcome};
pub use error::{Error, Result};
pub use event::{ExecEvent, SysEnterExecve};
pub use helpers::ProbeHelpers;
pub use ring::{EventRing, RingEntry};
pub use task::TaskLayout;

/// Kernel task name length (`TASK_COMM_LEN`).
pub const COMM_LEN: usize = 16;
/// Capacity of the last cwd path component.
pub const CWD_LEN: usize = 32;
/// Capacity of the execve path argument.
pub const FILENAME_LEN: usize = 1024;
/// Capacity of one argv slot.
pub const ARG_LEN: usize = 256;
/// Number of argv slots in an event.
pub const MAX_ARGS: usize = 32;

/// Byte size of the `EVENTS` ring buffer map (16 MiB).
pub const RINGBUF_BYTE_SIZE: u32 = 1 << 24;

/// Wire layout version written into every [`ExecEvent`].
pub const EVENT_VERSION: u32 = 1;

/// The cwd walk failed; `cwd` is zero.
pub const FLAG_CWD_UNRESOLVED: u32 = 1 << 0;
/// The argv walk stopped on an unreadable element instead of the terminator.
pub const FLAG_ARGV_FAULT: u32 = 1 << 1;
/// The process had more than [`MAX_ARGS`] arguments.
pub const FLAG_ARGV_TRUNCATED: u32 = 1 << 2;

/// Returns the bytes of a fixed-capacity C string up to (not including)
/// the first NUL, or the whole buffer when no NUL is present.
#[inline(always)]
pub fn cstr_bytes(buf: &[u8]) -> &[u8] {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..len]
}
