//! Decoding of raw `EVENTS` records into owned, printable values.

use std::{fmt, mem::size_of};

use chrono::{DateTime, Utc};
use exectrace_common::{
    cstr_bytes, ExecEvent, EVENT_VERSION, FLAG_ARGV_FAULT, FLAG_ARGV_TRUNCATED,
    FLAG_CWD_UNRESOLVED,
};
use nix::unistd::{Uid, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zerocopy::FromBytes;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record is {len} bytes, expected at least {expected}")]
    Truncated { len: usize, expected: usize },

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),
}

/// One execution as handed to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRecord {
    /// Wall clock time the consumer read the record.
    pub received_at: DateTime<Utc>,
    /// Monotonic kernel time of the syscall.
    pub timestamp_ns: u64,
    pub syscall_nr: i32,
    pub pid: u32,
    pub tid: u32,
    pub uid: u32,
    pub gid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub comm: String,
    /// Last component of the working directory, `None` when it was not
    /// resolved.
    pub cwd: Option<String>,
    pub filename: String,
    pub args: Vec<String>,
    pub argv_truncated: bool,
    pub argv_fault: bool,
}

/// Decode one ring buffer record.
///
/// Records may carry trailing padding; only the leading
/// `size_of::<ExecEvent>()` bytes are looked at.
pub fn decode(bytes: &[u8]) -> Result<ExecRecord, DecodeError> {
    let (event, _) = ExecEvent::read_from_prefix(bytes).map_err(|_| DecodeError::Truncated {
        len: bytes.len(),
        expected: size_of::<ExecEvent>(),
    })?;
    ExecRecord::try_from(&event)
}

impl TryFrom<&ExecEvent> for ExecRecord {
    type Error = DecodeError;

    fn try_from(event: &ExecEvent) -> Result<Self, Self::Error> {
        if event.version != EVENT_VERSION {
            return Err(DecodeError::UnsupportedVersion(event.version));
        }

        let cwd = if event.has_flag(FLAG_CWD_UNRESOLVED) || event.cwd_bytes().is_empty() {
            None
        } else {
            Some(lossy(event.cwd_bytes()))
        };

        Ok(ExecRecord {
            received_at: Utc::now(),
            timestamp_ns: event.timestamp_ns,
            syscall_nr: event.syscall_nr,
            pid: event.pid,
            tid: event.tid,
            uid: event.uid,
            gid: event.gid,
            username: None,
            comm: lossy(event.comm_bytes()),
            cwd,
            filename: lossy(event.filename_bytes()),
            args: event.args().map(lossy).collect(),
            argv_truncated: event.has_flag(FLAG_ARGV_TRUNCATED),
            argv_fault: event.has_flag(FLAG_ARGV_FAULT),
        })
    }
}

impl ExecRecord {
    /// Fill in `username` from the local user database.
    pub fn resolve_username(mut self) -> Self {
        self.username = lookup_username(self.uid);
        self
    }
}

impl fmt::Display for ExecRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pid={} tid={} uid={}",
            self.received_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.pid,
            self.tid,
            self.uid,
        )?;
        if let Some(user) = &self.username {
            write!(f, "({})", user)?;
        }
        write!(
            f,
            " gid={} comm={} cwd={} exe={} argv={:?}",
            self.gid,
            self.comm,
            self.cwd.as_deref().unwrap_or("?"),
            self.filename,
            self.args,
        )?;
        if self.argv_truncated {
            f.write_str(" [argv truncated]")?;
        }
        if self.argv_fault {
            f.write_str(" [argv fault]")?;
        }
        Ok(())
    }
}

/// Get a username by UID through `getpwuid_r(3)`.
///
/// Returns `None` when the uid has no entry or the lookup fails.
pub fn lookup_username(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(cstr_bytes(bytes)).into_owned()
}
