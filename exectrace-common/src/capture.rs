//! Entry handler for `sys_enter_execve`.

use zerocopy::IntoBytes;

use crate::{
    argv::copy_argv,
    scratch::{zero_argv_bytes, ZERO_CWD, ZERO_FILENAME},
    task::resolve_cwd,
    Error, EventRing, ExecEvent, ProbeHelpers, RingEntry, SysEnterExecve, TaskLayout,
    EVENT_VERSION, FLAG_CWD_UNRESOLVED,
};

/// What happened to one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The event was committed to the ring.
    Submitted,
    /// No slot could be reserved; nothing was written.
    Dropped,
    /// A slot was reserved but released unseen.
    Discarded(Error),
}

/// Capture one execve call into `ring`.
///
/// Either a complete event is committed or nothing becomes visible. The
/// outcome is informational only, the traced syscall never depends on it.
#[inline(always)]
pub fn capture_exec<H, R>(
    helpers: &H,
    ring: &R,
    layout: &TaskLayout,
    args: &SysEnterExecve,
) -> Outcome
where
    H: ProbeHelpers,
    R: EventRing,
{
    let Some(mut entry) = ring.reserve() else {
        return Outcome::Dropped;
    };

    match fill_event(helpers, layout, args, entry.event_mut()) {
        Ok(()) => {
            entry.submit();
            Outcome::Submitted
        }
        Err(e) => {
            entry.discard();
            Outcome::Discarded(e)
        }
    }
}

#[inline(always)]
fn fill_event<H: ProbeHelpers>(
    helpers: &H,
    layout: &TaskLayout,
    args: &SysEnterExecve,
    event: &mut ExecEvent,
) -> Result<(), Error> {
    // reserved memory is whatever the previous record left behind
    helpers.copy_template(&mut event.filename, &ZERO_FILENAME)?;
    helpers.copy_template(&mut event.cwd, &ZERO_CWD)?;
    helpers.copy_template(event.argv.as_mut_bytes(), zero_argv_bytes())?;

    let pid_tgid = helpers.pid_tgid();
    let uid_gid = helpers.uid_gid();

    event.version = EVENT_VERSION;
    event.syscall_nr = args.syscall_nr;
    event.pid = (pid_tgid >> 32) as u32;
    event.tid = pid_tgid as u32;
    event.uid = uid_gid as u32;
    event.gid = (uid_gid >> 32) as u32;
    event.argc = 0;
    event.flags = 0;
    event.timestamp_ns = helpers.ktime_ns();
    event.comm = helpers.current_comm().unwrap_or([0; crate::COMM_LEN]);

    helpers.read_user_str(args.filename, &mut event.filename)?;

    if resolve_cwd(helpers, layout, &mut event.cwd).is_err() {
        event.flags |= FLAG_CWD_UNRESOLVED;
    }

    let argv = copy_argv(helpers, args.argv, &mut event.argv);
    event.argc = argv.argc;
    event.flags |= argv.flags;

    Ok(())
}
