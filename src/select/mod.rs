//! Interface to the select mechanism.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use smallvec::SmallVec;

use crate::chan::{Chan, RawChannel};
use crate::err::SelectError;

use self::case::{Case, CaseKind};

mod case;
mod engine;
mod lock;
mod order;

/// Waits on a set of channel operations and completes exactly one of them.
///
/// Cases are added with [`recv`], [`send`] and [`default_case`], and each of these returns the
/// index of the new case. [`select`] then blocks until one case can complete, completes it, and
/// returns its index. If several cases are ready at the same time, a random one among them is
/// chosen. A default case is chosen only when no other case is ready, and makes the select
/// non-blocking.
///
/// A case on an absent channel (`None`) is never ready. A select without any cases, or with only
/// absent channels and no default case, blocks forever.
///
/// Messages travel through `Option<T>` slots owned by the caller: a send case takes its message
/// out of the slot if it's chosen, and a receive case stores the received message into its slot,
/// or `None` if the channel turned out to be closed.
///
/// [`recv`]: Select::recv
/// [`send`]: Select::send
/// [`default_case`]: Select::default_case
/// [`select`]: Select::select
///
/// # Examples
///
/// ```
/// use multiselect::{Chan, Select};
///
/// let c1 = Chan::new(1);
/// let c2 = Chan::new(1);
/// c1.send(10).unwrap();
///
/// let mut got = None;
/// let mut out = Some(20);
///
/// let mut sel = Select::new();
/// let recv = sel.recv(&c1, &mut got);
/// let send = sel.send(&c2, &mut out);
///
/// // Both cases are ready, so a random one is chosen.
/// let selected = sel.select().unwrap();
/// if selected.index() == recv {
///     assert!(selected.recv_ok());
///     assert_eq!(got, Some(10));
/// } else {
///     assert_eq!(selected.index(), send);
///     assert_eq!(out, None);
///     assert_eq!(c2.recv(), Some(20));
/// }
/// ```
pub struct Select<'a> {
    /// The case table, indexed by case.
    cases: SmallVec<[Case<'a>; 4]>,

    /// Equals `true` once a default case has been added.
    has_default: bool,

    /// The slots are borrowed mutably for `'a`.
    _marker: PhantomData<&'a mut ()>,
}

impl<'a> Select<'a> {
    /// Creates an empty select.
    pub fn new() -> Select<'a> {
        Select {
            cases: SmallVec::new(),
            has_default: false,
            _marker: PhantomData,
        }
    }

    /// Adds a receive case and returns its index.
    ///
    /// On success the message is stored into `slot`.
    pub fn recv<T, C>(&mut self, chan: C, slot: &'a mut Option<T>) -> usize
    where
        T: Send + 'a,
        C: Into<Option<&'a Chan<T>>>,
    {
        let chan = chan.into().map(|c| c as &'a dyn RawChannel);
        let slot = slot as *mut Option<T> as *mut ();
        self.push(Case::new(chan, CaseKind::Recv, slot))
    }

    /// Adds a send case and returns its index.
    ///
    /// The message is taken out of `msg` if the case is chosen.
    ///
    /// # Panics
    ///
    /// Panics if `msg` is `None`.
    pub fn send<T, C>(&mut self, chan: C, msg: &'a mut Option<T>) -> usize
    where
        T: Send + 'a,
        C: Into<Option<&'a Chan<T>>>,
    {
        assert!(msg.is_some(), "send case without a message");
        let chan = chan.into().map(|c| c as &'a dyn RawChannel);
        let slot = msg as *mut Option<T> as *mut ();
        self.push(Case::new(chan, CaseKind::Send, slot))
    }

    /// Adds the default case and returns its index.
    ///
    /// # Panics
    ///
    /// Panics if a default case was already added.
    pub fn default_case(&mut self) -> usize {
        assert!(!self.has_default, "multiple defaults in select");
        self.has_default = true;
        self.push(Case::default_case())
    }

    /// Returns the number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns `true` if no cases have been added.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Blocks until one of the cases completes and returns it.
    ///
    /// Fails without completing anything if a send case targets a closed channel.
    pub fn select(mut self) -> Result<Selected, SelectError> {
        engine::select(&mut self.cases)
    }

    fn push(&mut self, case: Case<'a>) -> usize {
        self.cases.push(case);
        self.cases.len() - 1
    }
}

impl Default for Select<'_> {
    fn default() -> Self {
        Select::new()
    }
}

impl fmt::Debug for Select<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("cases", &self.cases.len())
            .field("has_default", &self.has_default)
            .finish()
    }
}

/// The outcome of a select.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selected {
    index: usize,
    recv_ok: bool,
    blocked: Option<Duration>,
}

impl Selected {
    /// Returns the index of the chosen case.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns `true` if the chosen case is a receive that got a message, or the default case.
    ///
    /// A receive that found its channel closed reports `false`, and so does a send.
    pub fn recv_ok(&self) -> bool {
        self.recv_ok
    }

    /// Returns how long the select was blocked, if blocking time is being profiled.
    pub fn blocked_for(&self) -> Option<Duration> {
        self.blocked
    }
}
