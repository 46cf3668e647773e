#![no_std]
#![no_main]

use core::mem::offset_of;

use aya_ebpf::{
    helpers::{
        bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_task,
        bpf_get_current_uid_gid, bpf_ktime_get_ns, bpf_probe_read_kernel,
        bpf_probe_read_kernel_buf, bpf_probe_read_kernel_str_bytes, bpf_probe_read_user,
        bpf_probe_read_user_str_bytes,
    },
    macros::{map, tracepoint},
    maps::{ring_buf::RingBufEntry, RingBuf},
    programs::TracePointContext,
};
use aya_log_ebpf::debug;
use exectrace_common::{
    capture_exec, Error, EventRing, ExecEvent, Outcome, ProbeHelpers, Result, RingEntry,
    SysEnterExecve, TaskLayout, COMM_LEN, RINGBUF_BYTE_SIZE,
};

#[allow(non_upper_case_globals)]
#[allow(non_snake_case)]
#[allow(non_camel_case_types)]
#[allow(dead_code)]
mod vmlinux;

use vmlinux::{dentry, fs_struct, path, qstr, task_struct};

#[map(name = "EVENTS")]
static EVENTS: RingBuf = RingBuf::with_byte_size(RINGBUF_BYTE_SIZE, 0);

const TASK_LAYOUT: TaskLayout = TaskLayout {
    task_fs: offset_of!(task_struct, fs) as u64,
    fs_pwd_dentry: (offset_of!(fs_struct, pwd) + offset_of!(path, dentry)) as u64,
    dentry_name: (offset_of!(dentry, d_name) + offset_of!(qstr, name)) as u64,
};

#[tracepoint]
pub fn enter_execve(ctx: TracePointContext) -> u32 {
    match try_enter_execve(&ctx) {
        Ok(()) => 0,
        Err(e) => {
            debug!(&ctx, "execve capture failed: {}", e.to_retval());
            0
        }
    }
}

#[inline(always)]
fn try_enter_execve(ctx: &TracePointContext) -> Result<()> {
    let args: SysEnterExecve =
        unsafe { ctx.read_at(0) }.map_err(Error::KernelRead)?;

    match capture_exec(&BpfHelpers, &EventsRing, &TASK_LAYOUT, &args) {
        Outcome::Submitted => Ok(()),
        Outcome::Dropped => Err(Error::Reserve),
        Outcome::Discarded(e) => Err(e),
    }
}

/// Helper calls backing the capture path inside the kernel.
struct BpfHelpers;

impl ProbeHelpers for BpfHelpers {
    #[inline(always)]
    fn pid_tgid(&self) -> u64 {
        bpf_get_current_pid_tgid()
    }

    #[inline(always)]
    fn uid_gid(&self) -> u64 {
        bpf_get_current_uid_gid()
    }

    #[inline(always)]
    fn ktime_ns(&self) -> u64 {
        unsafe { bpf_ktime_get_ns() }
    }

    #[inline(always)]
    fn current_comm(&self) -> Result<[u8; COMM_LEN]> {
        bpf_get_current_comm().map_err(Error::Helper)
    }

    #[inline(always)]
    fn current_task(&self) -> u64 {
        unsafe { bpf_get_current_task() }
    }

    #[inline(always)]
    fn read_kernel_u64(&self, addr: u64) -> Result<u64> {
        unsafe { bpf_probe_read_kernel(addr as *const u64) }.map_err(Error::KernelRead)
    }

    #[inline(always)]
    fn read_kernel_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize> {
        // the returned slice stops before the NUL
        unsafe { bpf_probe_read_kernel_str_bytes(addr as *const u8, dst) }
            .map(|s| s.len() + 1)
            .map_err(Error::KernelRead)
    }

    #[inline(always)]
    fn read_user_u64(&self, addr: u64) -> Result<u64> {
        unsafe { bpf_probe_read_user(addr as *const u64) }.map_err(Error::UserRead)
    }

    #[inline(always)]
    fn read_user_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize> {
        unsafe { bpf_probe_read_user_str_bytes(addr as *const u8, dst) }
            .map(|s| s.len() + 1)
            .map_err(Error::UserRead)
    }

    #[inline(always)]
    fn copy_template(&self, dst: &mut [u8], template: &'static [u8]) -> Result<()> {
        if template.len() < dst.len() {
            return Err(Error::KernelRead(-22));
        }
        unsafe { bpf_probe_read_kernel_buf(template.as_ptr(), dst) }.map_err(Error::KernelRead)
    }
}

/// The `EVENTS` map seen through the capture path's ring protocol.
struct EventsRing;

/// A reserved `EVENTS` slot.
struct EventsEntry(RingBufEntry<ExecEvent>);

impl EventRing for EventsRing {
    type Entry = EventsEntry;

    #[inline(always)]
    fn reserve(&self) -> Option<EventsEntry> {
        EVENTS.reserve::<ExecEvent>(0).map(EventsEntry)
    }
}

impl RingEntry for EventsEntry {
    #[inline(always)]
    fn event_mut(&mut self) -> &mut ExecEvent {
        // ExecEvent is valid for any bit pattern and capture_exec writes
        // every field before submitting
        unsafe { &mut *self.0.as_mut_ptr() }
    }

    #[inline(always)]
    fn submit(self) {
        self.0.submit(0)
    }

    #[inline(always)]
    fn discard(self) {
        self.0.discard(0)
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
