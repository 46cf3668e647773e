use crate::{Error, ProbeHelpers, Result, CWD_LEN};

/// Byte offsets of the kernel fields followed by [`resolve_cwd`].
///
/// Built by the probe crate from its generated kernel bindings.
#[derive(Clone, Copy, Debug)]
pub struct TaskLayout {
    /// `task_struct.fs`
    pub task_fs: u64,
    /// `fs_struct.pwd.dentry`
    pub fs_pwd_dentry: u64,
    /// `dentry.d_name.name`
    pub dentry_name: u64,
}

/// Read the last path component of the current working directory.
///
/// Kernel Structure:
///
/// ```text
///  +-------------+
///  | task_struct |
///  +-------------+
///  | fs    ------|---> +-----------+
///  +-------------+     | fs_struct |
///                      +-----------+
///                      | pwd.dentry|---> +---------+
///                      +-----------+     | dentry  |
///                                        +---------+
///                                        | d_name  |---> "dir\0" (read this)
///                                        +---------+
/// ```
///
/// Only the last component is captured, never the full path. Each hop is
/// a separate guarded read; the first NULL or failed read stops the walk
/// and `cwd` keeps the zeroes it had on entry.
#[inline(always)]
pub fn resolve_cwd<H: ProbeHelpers>(
    helpers: &H,
    layout: &TaskLayout,
    cwd: &mut [u8; CWD_LEN],
) -> Result<usize> {
    let task = helpers.current_task();
    if task == 0 {
        return Err(Error::NullPointer("task"));
    }

    let fs = helpers.read_kernel_u64(task.wrapping_add(layout.task_fs))?;
    if fs == 0 {
        return Err(Error::NullPointer("fs"));
    }

    let dentry = helpers.read_kernel_u64(fs.wrapping_add(layout.fs_pwd_dentry))?;
    if dentry == 0 {
        return Err(Error::NullPointer("pwd.dentry"));
    }

    let name = helpers.read_kernel_u64(dentry.wrapping_add(layout.dentry_name))?;
    if name == 0 {
        return Err(Error::NullPointer("d_name.name"));
    }

    helpers.read_kernel_str(name, cwd)
}
