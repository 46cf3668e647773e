//! In-process stand-ins for the kernel side of the probe.
//!
//! `SimKernel` keeps separate user and kernel address spaces made of
//! disjoint regions; any access that leaves a region fails like a faulting
//! `bpf_probe_read_*` would. `SimRing` hands out slots filled with 0xAA so
//! tests notice fields that were never written.

use std::{boxed::Box, cell::RefCell, collections::BTreeMap, rc::Rc, vec, vec::Vec};

use zerocopy::{FromZeros, IntoBytes};

use crate::{
    Error, EventRing, ExecEvent, ProbeHelpers, Result, RingEntry, TaskLayout, COMM_LEN,
};

/// Field offsets of the simulated kernel structures.
pub const LAYOUT: TaskLayout = TaskLayout {
    task_fs: 0x6f8,
    fs_pwd_dentry: 0x30,
    dentry_name: 0x28,
};

const EFAULT: i64 = -14;

const TASK_ADDR: u64 = 0xffff_8880_0001_0000;
const FS_ADDR: u64 = 0xffff_8880_0002_0000;
const DENTRY_ADDR: u64 = 0xffff_8880_0003_0000;
const NAME_ADDR: u64 = 0xffff_8880_0004_0000;
const DANGLING_ADDR: u64 = 0xffff_8880_dead_0000;

const USER_BASE: u64 = 0x7ffd_0000_0000;
// unmapped gap between user regions
const USER_GAP: u64 = 0x1000;

#[derive(Default)]
struct Memory {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl Memory {
    fn map(&mut self, addr: u64, bytes: Vec<u8>) {
        self.regions.insert(addr, bytes);
    }

    fn region(&self, addr: u64) -> Option<(u64, &[u8])> {
        let (&start, bytes) = self.regions.range(..=addr).next_back()?;
        let end = start + bytes.len() as u64;
        (addr < end).then_some((start, bytes.as_slice()))
    }

    fn byte(&self, addr: u64) -> Option<u8> {
        let (start, bytes) = self.region(addr)?;
        Some(bytes[(addr - start) as usize])
    }

    fn write_u64(&mut self, addr: u64, value: u64) {
        let (&start, bytes) = self
            .regions
            .range_mut(..=addr)
            .next_back()
            .expect("write outside of mapped memory");
        let off = (addr - start) as usize;
        bytes[off..off + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn read_u64(&self, addr: u64) -> Option<u64> {
        let mut word = [0u8; 8];
        for (i, b) in word.iter_mut().enumerate() {
            *b = self.byte(addr.checked_add(i as u64)?)?;
        }
        Some(u64::from_le_bytes(word))
    }

    fn read_str(&self, addr: u64, dst: &mut [u8]) -> Option<usize> {
        if dst.is_empty() {
            return None;
        }
        let mut len = 0;
        while len < dst.len() - 1 {
            let b = self.byte(addr.checked_add(len as u64)?)?;
            if b == 0 {
                break;
            }
            dst[len] = b;
            len += 1;
        }
        dst[len] = 0;
        Some(len + 1)
    }
}

pub struct SimKernel {
    pid_tgid: u64,
    uid_gid: u64,
    comm: Option<[u8; COMM_LEN]>,
    broken_templates: bool,
    kernel: Memory,
    user: Memory,
    next_user: u64,
}

impl SimKernel {
    /// A root-owned process named `sim` sitting in `/`.
    pub fn new() -> Self {
        let mut kernel = SimKernel {
            pid_tgid: (1 << 32) | 1,
            uid_gid: 0,
            comm: None,
            broken_templates: false,
            kernel: Memory::default(),
            user: Memory::default(),
            next_user: USER_BASE,
        };
        kernel.kernel.map(TASK_ADDR, vec![0; LAYOUT.task_fs as usize + 8]);
        kernel.kernel.map(FS_ADDR, vec![0; LAYOUT.fs_pwd_dentry as usize + 8]);
        kernel.kernel.map(DENTRY_ADDR, vec![0; LAYOUT.dentry_name as usize + 8]);
        kernel.kernel.write_u64(TASK_ADDR + LAYOUT.task_fs, FS_ADDR);
        kernel.kernel.write_u64(FS_ADDR + LAYOUT.fs_pwd_dentry, DENTRY_ADDR);
        kernel.kernel.write_u64(DENTRY_ADDR + LAYOUT.dentry_name, NAME_ADDR);
        kernel.with_comm(b"sim").with_cwd(b"/")
    }

    pub fn with_ids(mut self, tgid: u32, tid: u32, uid: u32, gid: u32) -> Self {
        self.pid_tgid = (u64::from(tgid) << 32) | u64::from(tid);
        self.uid_gid = (u64::from(gid) << 32) | u64::from(uid);
        self
    }

    pub fn with_comm(mut self, name: &[u8]) -> Self {
        let mut comm = [0u8; COMM_LEN];
        let len = name.len().min(COMM_LEN - 1);
        comm[..len].copy_from_slice(&name[..len]);
        self.comm = Some(comm);
        self
    }

    pub fn with_broken_comm(mut self) -> Self {
        self.comm = None;
        self
    }

    /// Name of the dentry the task's pwd points at.
    pub fn with_cwd(mut self, name: &[u8]) -> Self {
        let mut bytes = name.to_vec();
        bytes.push(0);
        self.kernel.map(NAME_ADDR, bytes);
        self
    }

    pub fn with_null_fs(mut self) -> Self {
        self.kernel.write_u64(TASK_ADDR + LAYOUT.task_fs, 0);
        self
    }

    pub fn with_dangling_pwd(mut self) -> Self {
        self.kernel
            .write_u64(FS_ADDR + LAYOUT.fs_pwd_dentry, DANGLING_ADDR);
        self
    }

    pub fn with_broken_templates(mut self) -> Self {
        self.broken_templates = true;
        self
    }

    fn map_user(&mut self, bytes: Vec<u8>) -> u64 {
        let addr = self.next_user;
        let len = (bytes.len() as u64).next_multiple_of(8);
        self.user.map(addr, bytes);
        self.next_user = addr + len + USER_GAP;
        addr
    }

    /// Map a NUL-terminated copy of `s` into user memory.
    pub fn map_str(&mut self, s: &[u8]) -> u64 {
        let mut bytes = s.to_vec();
        bytes.push(0);
        self.map_user(bytes)
    }

    /// Map every argument plus a NULL-terminated pointer array, returning
    /// the address of the array.
    pub fn map_argv(&mut self, args: &[&[u8]]) -> u64 {
        let mut array = Vec::with_capacity((args.len() + 1) * 8);
        for arg in args {
            let addr = self.map_str(arg);
            array.extend_from_slice(&addr.to_le_bytes());
        }
        array.extend_from_slice(&0u64.to_le_bytes());
        self.map_user(array)
    }

    /// Unmap the string that `argv[idx]` points at, leaving the pointer.
    pub fn unmap_arg(&mut self, argv: u64, idx: usize) {
        let arg = self
            .user
            .read_u64(argv + idx as u64 * 8)
            .expect("argv entry is mapped");
        self.user.regions.remove(&arg);
    }
}

impl ProbeHelpers for SimKernel {
    fn pid_tgid(&self) -> u64 {
        self.pid_tgid
    }

    fn uid_gid(&self) -> u64 {
        self.uid_gid
    }

    fn ktime_ns(&self) -> u64 {
        1_000_000_000
    }

    fn current_comm(&self) -> Result<[u8; COMM_LEN]> {
        self.comm.ok_or(Error::Helper(EFAULT))
    }

    fn current_task(&self) -> u64 {
        TASK_ADDR
    }

    fn read_kernel_u64(&self, addr: u64) -> Result<u64> {
        self.kernel.read_u64(addr).ok_or(Error::KernelRead(EFAULT))
    }

    fn read_kernel_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize> {
        self.kernel.read_str(addr, dst).ok_or_else(|| {
            dst.fill(0);
            Error::KernelRead(EFAULT)
        })
    }

    fn read_user_u64(&self, addr: u64) -> Result<u64> {
        self.user.read_u64(addr).ok_or(Error::UserRead(EFAULT))
    }

    fn read_user_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize> {
        self.user.read_str(addr, dst).ok_or_else(|| {
            dst.fill(0);
            Error::UserRead(EFAULT)
        })
    }

    fn copy_template(&self, dst: &mut [u8], template: &'static [u8]) -> Result<()> {
        if self.broken_templates || template.len() < dst.len() {
            return Err(Error::KernelRead(EFAULT));
        }
        dst.copy_from_slice(&template[..dst.len()]);
        Ok(())
    }
}

#[derive(Default)]
struct RingState {
    capacity: usize,
    in_flight: usize,
    committed: Vec<ExecEvent>,
    discarded: usize,
}

/// A ring with room for a fixed number of events; committed events are
/// never consumed.
#[derive(Clone)]
pub struct SimRing {
    state: Rc<RefCell<RingState>>,
}

impl SimRing {
    pub fn new(capacity: usize) -> Self {
        SimRing {
            state: Rc::new(RefCell::new(RingState {
                capacity,
                ..Default::default()
            })),
        }
    }

    pub fn committed(&self) -> Vec<ExecEvent> {
        self.state.borrow().committed.clone()
    }

    pub fn discarded(&self) -> usize {
        self.state.borrow().discarded
    }
}

pub struct SimEntry {
    state: Rc<RefCell<RingState>>,
    event: Box<ExecEvent>,
}

impl EventRing for SimRing {
    type Entry = SimEntry;

    fn reserve(&self) -> Option<SimEntry> {
        let mut state = self.state.borrow_mut();
        if state.committed.len() + state.in_flight >= state.capacity {
            return None;
        }
        state.in_flight += 1;

        let mut event = Box::new(ExecEvent::new_zeroed());
        event.as_mut_bytes().fill(0xAA);
        Some(SimEntry {
            state: Rc::clone(&self.state),
            event,
        })
    }
}

impl RingEntry for SimEntry {
    fn event_mut(&mut self) -> &mut ExecEvent {
        &mut self.event
    }

    fn submit(self) {
        let mut state = self.state.borrow_mut();
        state.in_flight -= 1;
        state.committed.push(*self.event);
    }

    fn discard(self) {
        let mut state = self.state.borrow_mut();
        state.in_flight -= 1;
        state.discarded += 1;
    }
}
