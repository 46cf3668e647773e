//! The BPF helper surface used by the capture path.
//!
//! Addresses are plain `u64` values: they come from the tracepoint record
//! or from other guarded reads and are never dereferenced directly.

use crate::{Result, COMM_LEN};

pub trait ProbeHelpers {
    /// `bpf_get_current_pid_tgid`: tgid in the high half, thread id in the low half.
    fn pid_tgid(&self) -> u64;

    /// `bpf_get_current_uid_gid`: gid in the high half, uid in the low half.
    fn uid_gid(&self) -> u64;

    /// `bpf_ktime_get_ns`
    fn ktime_ns(&self) -> u64;

    /// `bpf_get_current_comm`
    fn current_comm(&self) -> Result<[u8; COMM_LEN]>;

    /// `bpf_get_current_task`: address of the current `task_struct`.
    fn current_task(&self) -> u64;

    /// Guarded read of one pointer-sized word from kernel memory.
    fn read_kernel_u64(&self, addr: u64) -> Result<u64>;

    /// Guarded NUL-terminated string read from kernel memory.
    ///
    /// On success `dst` holds a NUL-terminated prefix of the string and the
    /// returned length includes the NUL. On failure `dst` is zero-filled.
    fn read_kernel_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize>;

    /// Guarded read of one pointer-sized word from user memory.
    fn read_user_u64(&self, addr: u64) -> Result<u64>;

    /// Guarded NUL-terminated string read from user memory, same contract
    /// as [`ProbeHelpers::read_kernel_str`].
    fn read_user_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize>;

    /// Overwrite `dst` with the leading bytes of a static template.
    ///
    /// Large stores into ring buffer memory cannot be emitted as plain
    /// loops in BPF, so the reset goes through a helper copy.
    fn copy_template(&self, dst: &mut [u8], template: &'static [u8]) -> Result<()>;
}
