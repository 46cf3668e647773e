//! Reserve / commit / discard protocol of the event channel.

use crate::ExecEvent;

/// Producer side of a ring buffer holding [`ExecEvent`] records.
pub trait EventRing {
    type Entry: RingEntry;

    /// Reserve room for one event, `None` when the ring is full.
    fn reserve(&self) -> Option<Self::Entry>;
}

/// A reserved, not yet visible slot.
///
/// The slot memory is uninitialized: every byte must be written before
/// [`RingEntry::submit`].
pub trait RingEntry {
    fn event_mut(&mut self) -> &mut ExecEvent;

    /// Make the event visible to the consumer.
    fn submit(self);

    /// Release the slot without the consumer ever seeing it.
    fn discard(self);
}
