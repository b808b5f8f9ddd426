use std::fmt;

use thiserror::Error;

/// An error returned from [`Select::select`] and [`dynamic::select`].
///
/// Sending on a closed channel is a bug in the calling code rather than a condition to retry, so
/// the whole select is abandoned as soon as such a case is seen. No other case of the same call
/// completes, and the message stays in the caller's slot.
///
/// [`Select::select`]: struct.Select.html#method.select
/// [`dynamic::select`]: dynamic/fn.select.html
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
pub enum SelectError {
    /// The send case at `index` targets a channel that is already closed.
    #[error("send on closed channel (case {index})")]
    SendOnClosed {
        /// Index of the offending case.
        index: usize,
    },
}

/// An error returned from the [`send`] method.
///
/// The message could not be sent because the channel is closed.
///
/// The error contains the message so it can be recovered.
///
/// [`send`]: struct.Chan.html#method.send
#[derive(Error, PartialEq, Eq, Clone, Copy)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

/// An error returned from the [`try_send`] method.
///
/// The error contains the message being sent so it can be recovered.
///
/// [`try_send`]: struct.Chan.html#method.try_send
#[derive(Error, PartialEq, Eq, Clone, Copy)]
pub enum TrySendError<T> {
    /// The message could not be sent because the channel is full.
    ///
    /// If this is a zero-capacity channel, then the error indicates that there was no receiver
    /// waiting to take the message at the time.
    #[error("sending on a full channel")]
    Full(T),

    /// The message could not be sent because the channel is closed.
    #[error("sending on a closed channel")]
    Closed(T),
}

/// An error returned from the [`try_recv`] method.
///
/// [`try_recv`]: struct.Chan.html#method.try_recv
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TryRecvError {
    /// A message could not be received because the channel is empty.
    ///
    /// If this is a zero-capacity channel, then the error indicates that there was no sender
    /// waiting to hand over a message at the time.
    #[error("receiving on an empty channel")]
    Empty,

    /// The channel is closed and holds no more messages.
    #[error("receiving on an empty and closed channel")]
    Closed,
}

/// An error returned from the [`close`] method when the channel was already closed.
///
/// [`close`]: struct.Chan.html#method.close
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[error("close of closed channel")]
pub struct CloseError;

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "SendError(..)".fmt(f)
    }
}

impl<T> SendError<T> {
    /// Unwraps the message.
    ///
    /// # Examples
    ///
    /// ```
    /// use multiselect::Chan;
    ///
    /// let c = Chan::new(1);
    /// c.close().unwrap();
    ///
    /// if let Err(err) = c.send("foo") {
    ///     assert_eq!(err.into_inner(), "foo");
    /// }
    /// ```
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TrySendError::Full(..) => "Full(..)".fmt(f),
            TrySendError::Closed(..) => "Closed(..)".fmt(f),
        }
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(err: SendError<T>) -> TrySendError<T> {
        match err {
            SendError(t) => TrySendError::Closed(t),
        }
    }
}

impl<T> TrySendError<T> {
    /// Unwraps the message.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) => v,
            TrySendError::Closed(v) => v,
        }
    }

    /// Returns `true` if the send operation failed because the channel is full.
    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }

    /// Returns `true` if the send operation failed because the channel is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, TrySendError::Closed(_))
    }
}

impl TryRecvError {
    /// Returns `true` if the receive operation failed because the channel is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, TryRecvError::Empty)
    }

    /// Returns `true` if the receive operation failed because the channel is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, TryRecvError::Closed)
    }
}
