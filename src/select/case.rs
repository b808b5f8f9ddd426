//! Case descriptors.

use std::time::Instant;

use crate::chan::RawChannel;

/// The kind of a select case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CaseKind {
    /// Never ready: a send or receive on an absent channel.
    Never,

    /// Receives a message.
    Recv,

    /// Sends a message.
    Send,

    /// Fires when no other case is ready.
    Default,
}

/// One arm of a select.
pub(crate) struct Case<'a> {
    /// The channel, if any.
    pub(crate) chan: Option<&'a dyn RawChannel>,

    /// What the case does.
    pub(crate) kind: CaseKind,

    /// Type-erased `Option<T>` slot matching the message type of `chan`.
    pub(crate) slot: *mut (),

    /// When a counterpart released this case, if blocking time is being profiled.
    pub(crate) release_time: Option<Instant>,
}

impl<'a> Case<'a> {
    /// Creates a case.
    pub(crate) fn new(chan: Option<&'a dyn RawChannel>, kind: CaseKind, slot: *mut ()) -> Case<'a> {
        Case {
            chan,
            kind,
            slot,
            release_time: None,
        }
    }

    /// Returns a case that is never ready.
    pub(crate) fn never() -> Case<'a> {
        Case::new(None, CaseKind::Never, std::ptr::null_mut())
    }

    /// Returns a default case.
    pub(crate) fn default_case() -> Case<'a> {
        Case::new(None, CaseKind::Default, std::ptr::null_mut())
    }

    /// Rewrites a send or receive on an absent channel into a case that is never ready.
    pub(crate) fn normalize(&mut self) {
        if self.chan.is_none() && self.kind != CaseKind::Default {
            *self = Case::never();
        }
    }

    /// Returns the key this case is sorted by when computing the locking order.
    ///
    /// Cases without a channel sort last.
    pub(crate) fn sort_key(&self) -> usize {
        self.chan
            .map_or(usize::MAX, |c| c.chan_id().as_usize())
    }
}
