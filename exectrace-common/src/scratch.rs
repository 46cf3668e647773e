//! Read-only zero templates.
//!
//! These land in `.rodata` of the probe object and are copied over the
//! variable-length fields of every reserved slot, so stale ring buffer
//! memory never reaches the consumer.

use crate::{ARG_LEN, CWD_LEN, FILENAME_LEN, MAX_ARGS};

pub static ZERO_FILENAME: [u8; FILENAME_LEN] = [0; FILENAME_LEN];

pub static ZERO_CWD: [u8; CWD_LEN] = [0; CWD_LEN];

pub static ZERO_ARGV: [[u8; ARG_LEN]; MAX_ARGS] = [[0; ARG_LEN]; MAX_ARGS];

/// [`ZERO_ARGV`] viewed as a flat byte slice.
#[inline(always)]
pub fn zero_argv_bytes() -> &'static [u8] {
    ZERO_ARGV.as_flattened()
}
