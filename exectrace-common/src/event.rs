use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{cstr_bytes, ARG_LEN, COMM_LEN, CWD_LEN, FILENAME_LEN, MAX_ARGS};

/// One captured execution, as written into the `EVENTS` ring buffer.
///
/// Memory Layout (9304 bytes total, no implicit padding):
///
/// ```text
/// +----------------+----------------+
/// |    version     |   syscall_nr   | 4 + 4 bytes
/// +----------------+----------------+
/// |      pid       |      tid       | 4 + 4 bytes
/// +----------------+----------------+
/// |      uid       |      gid       | 4 + 4 bytes
/// +----------------+----------------+
/// |      argc      |     flags      | 4 + 4 bytes
/// +----------------+----------------+
/// |          timestamp_ns           | 8 bytes
/// +---------------------------------+
/// |              comm               | 16 bytes
/// +---------------------------------+
/// |               cwd               | 32 bytes
/// +---------------------------------+
/// |            filename             | 1024 bytes
/// +---------------------------------+
/// |       argv[32] x 256 bytes      | 8192 bytes
/// +---------------------------------+
/// ```
///
/// Any change to this layout must bump [`crate::EVENT_VERSION`].
#[repr(C, align(8))]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ExecEvent {
    pub version: u32,
    pub syscall_nr: i32,
    /// Thread-group id of the execving process (high half of pid_tgid).
    pub pid: u32,
    /// Id of the thread that issued the syscall (low half of pid_tgid).
    pub tid: u32,
    pub uid: u32,
    pub gid: u32,
    /// Number of populated `argv` slots.
    pub argc: u32,
    pub flags: u32,
    pub timestamp_ns: u64,
    pub comm: [u8; COMM_LEN],
    pub cwd: [u8; CWD_LEN],
    pub filename: [u8; FILENAME_LEN],
    pub argv: [[u8; ARG_LEN]; MAX_ARGS],
}

const _: () = {
    assert!(core::mem::size_of::<ExecEvent>() == 9304);
    assert!(core::mem::size_of::<ExecEvent>() % 8 == 0);
    assert!(core::mem::offset_of!(ExecEvent, timestamp_ns) == 32);
    assert!(core::mem::offset_of!(ExecEvent, filename) == 88);
    assert!(core::mem::offset_of!(ExecEvent, argv) == 1112);
};

#[cfg(feature = "user")]
unsafe impl aya::Pod for ExecEvent {}

impl ExecEvent {
    #[inline(always)]
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn comm_bytes(&self) -> &[u8] {
        cstr_bytes(&self.comm)
    }

    pub fn cwd_bytes(&self) -> &[u8] {
        cstr_bytes(&self.cwd)
    }

    pub fn filename_bytes(&self) -> &[u8] {
        cstr_bytes(&self.filename)
    }

    /// Populated argv slots, bounded by [`MAX_ARGS`] whatever `argc` says.
    pub fn args(&self) -> impl Iterator<Item = &[u8]> {
        let argc = (self.argc as usize).min(MAX_ARGS);
        self.argv[..argc].iter().map(|a| cstr_bytes(a))
    }
}

/// Record passed to `syscalls/sys_enter_execve` programs.
///
/// Layout from `/sys/kernel/debug/tracing/events/syscalls/sys_enter_execve/format`:
///
/// ```text
/// field:unsigned short common_type;          offset:0;  size:2;
/// field:unsigned char common_flags;          offset:2;  size:1;
/// field:unsigned char common_preempt_count;  offset:3;  size:1;
/// field:int common_pid;                      offset:4;  size:4;
/// field:int __syscall_nr;                    offset:8;  size:4;
/// field:const char * filename;               offset:16; size:8;
/// field:const char *const * argv;            offset:24; size:8;
/// field:const char *const * envp;            offset:32; size:8;
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SysEnterExecve {
    pub common_type: u16,
    pub common_flags: u8,
    pub common_preempt_count: u8,
    pub common_pid: i32,
    pub syscall_nr: i32,
    pub _pad: u32,
    /// User pointer to the path string.
    pub filename: u64,
    /// User pointer to the NULL-terminated array of argument pointers.
    pub argv: u64,
    pub envp: u64,
}

const _: () = {
    assert!(core::mem::offset_of!(SysEnterExecve, filename) == 16);
    assert!(core::mem::offset_of!(SysEnterExecve, argv) == 24);
};
