use crate::{
    ProbeHelpers, ARG_LEN, FLAG_ARGV_FAULT, FLAG_ARGV_TRUNCATED, MAX_ARGS,
};

/// Distance between two entries of the user argv array.
pub const ARGV_STRIDE: u64 = core::mem::size_of::<u64>() as u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArgvCopy {
    /// Number of slots that were populated.
    pub argc: u32,
    /// `FLAG_ARGV_*` bits describing why the walk stopped.
    pub flags: u32,
}

/// Copy the user argument vector into fixed-capacity slots.
///
/// Syscall Arguments Structure:
///
/// ```text
///  argv ---> +-----------------+
///            | argv + 0*8      |---> "arg0\0"   -> slots[0]
///            | argv + 1*8      |---> "arg1\0"   -> slots[1]
///            | ...             |
///            | argv + n*8      |---> NULL       (stop)
///            +-----------------+
/// ```
///
/// The trip count is the constant [`MAX_ARGS`]. The walk breaks on the
/// NULL terminator or on the first element that cannot be read; later
/// slots are left untouched, so they stay zero after a template reset.
#[inline(always)]
pub fn copy_argv<H: ProbeHelpers>(
    helpers: &H,
    argv: u64,
    slots: &mut [[u8; ARG_LEN]; MAX_ARGS],
) -> ArgvCopy {
    let mut copy = ArgvCopy::default();

    if argv == 0 {
        return copy;
    }

    for (i, slot) in slots.iter_mut().enumerate() {
        let entry = argv.wrapping_add(i as u64 * ARGV_STRIDE);

        let arg = match helpers.read_user_u64(entry) {
            Ok(arg) => arg,
            Err(_) => {
                copy.flags |= FLAG_ARGV_FAULT;
                return copy;
            }
        };

        if arg == 0 {
            return copy;
        }

        if helpers.read_user_str(arg, slot).is_err() {
            copy.flags |= FLAG_ARGV_FAULT;
            return copy;
        }

        copy.argc += 1;
    }

    // every slot is used, see whether the vector goes on
    let next = argv.wrapping_add(MAX_ARGS as u64 * ARGV_STRIDE);
    if let Ok(arg) = helpers.read_user_u64(next) {
        if arg != 0 {
            copy.flags |= FLAG_ARGV_TRUNCATED;
        }
    }

    copy
}
