//! User-space side of exectrace: loads the `sys_enter_execve` probe,
//! drains its ring buffer and hands decoded records to a sink.

pub mod config;
pub mod programs;
pub mod reader;
pub mod record;
pub mod sink;
