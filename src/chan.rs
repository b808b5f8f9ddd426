//! Channels with an optional bounded buffer.
//!
//! A channel of capacity zero is a *rendezvous* channel: a sender and a receiver have to meet, and
//! the message is handed over directly from one to the other. A channel with a positive capacity
//! buffers up to that many messages and only blocks senders when the buffer is full.
//!
//! All state of a channel lives behind a single raw lock. Single-channel operations take it
//! through a guard, while select takes the locks of all its channels at once through the
//! [`RawChannel`] interface, in ascending [`ChanId`] order.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;
use smallvec::SmallVec;
use tracing::trace;

use crate::err::{CloseError, SendError, TryRecvError, TrySendError};
use crate::profile;
use crate::task::{self, Wake};
use crate::waitq::{WaitQueue, Waiter, WaiterKey};

/// Unique identity of a channel.
///
/// Identities are handed out in increasing order and never reused. Select sorts its channels by
/// identity to obtain a global locking order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChanId(usize);

impl ChanId {
    fn next() -> ChanId {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        ChanId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the identity as a number.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Inner state of a channel, guarded by the channel lock.
struct State<T> {
    /// Buffered messages.
    buf: VecDeque<T>,

    /// Capacity of the buffer.
    cap: usize,

    /// Equals `true` once the channel is closed.
    closed: bool,

    /// Senders waiting for a receiver or for buffer space.
    sendq: WaitQueue,

    /// Receivers waiting for a sender or for a buffered message.
    recvq: WaitQueue,
}

impl<T> State<T> {
    /// Takes the message owed to a receiver that pairs up with the blocked sender `waiter`.
    ///
    /// On a buffered channel a blocked sender means the buffer is full, so the receiver gets the
    /// oldest buffered message and the sender's message takes the freed spot.
    ///
    /// # Safety
    ///
    /// `waiter.slot` must point to an `Option<T>`.
    unsafe fn take_from_sender(&mut self, waiter: &Waiter) -> Option<T> {
        let sent = (*(waiter.slot as *mut Option<T>)).take();
        if self.cap == 0 {
            sent
        } else {
            let head = self.buf.pop_front();
            if let Some(msg) = sent {
                self.buf.push_back(msg);
            }
            head
        }
    }
}

/// A channel carrying messages of type `T`.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use std::sync::Arc;
/// use multiselect::Chan;
///
/// let c = Arc::new(Chan::new(0));
///
/// let c2 = c.clone();
/// thread::spawn(move || c2.send("Hi!").unwrap());
///
/// assert_eq!(c.recv(), Some("Hi!"));
/// ```
pub struct Chan<T> {
    /// Identity used for lock ordering.
    id: ChanId,

    /// Guards `state`.
    lock: RawMutex,

    /// State of the channel.
    state: UnsafeCell<State<T>>,
}

unsafe impl<T: Send> Send for Chan<T> {}
unsafe impl<T: Send> Sync for Chan<T> {}

/// The locked state of a channel. Unlocks on drop.
struct Locked<'a, T> {
    chan: &'a Chan<T>,
}

impl<T> Deref for Locked<'_, T> {
    type Target = State<T>;

    fn deref(&self) -> &State<T> {
        unsafe { &*self.chan.state.get() }
    }
}

impl<T> DerefMut for Locked<'_, T> {
    fn deref_mut(&mut self) -> &mut State<T> {
        unsafe { &mut *self.chan.state.get() }
    }
}

impl<T> Drop for Locked<'_, T> {
    fn drop(&mut self) {
        unsafe { self.chan.lock.unlock() }
    }
}

impl<T> Chan<T> {
    /// Creates a channel that buffers up to `cap` messages.
    ///
    /// With `cap == 0` every send has to meet a receive.
    pub fn new(cap: usize) -> Chan<T> {
        Chan {
            id: ChanId::next(),
            lock: RawMutex::INIT,
            state: UnsafeCell::new(State {
                buf: VecDeque::with_capacity(cap),
                cap,
                closed: false,
                sendq: WaitQueue::new(),
                recvq: WaitQueue::new(),
            }),
        }
    }

    /// Returns the identity of the channel.
    pub fn id(&self) -> ChanId {
        self.id
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.acquire().cap
    }

    /// Returns the number of buffered messages.
    pub fn len(&self) -> usize {
        self.acquire().buf.len()
    }

    /// Returns `true` if the buffer holds no messages.
    pub fn is_empty(&self) -> bool {
        self.acquire().buf.is_empty()
    }

    /// Returns `true` if the channel is closed.
    pub fn is_closed(&self) -> bool {
        self.acquire().closed
    }

    fn acquire(&self) -> Locked<'_, T> {
        self.lock.lock();
        Locked { chan: self }
    }

    /// Returns the state of the channel.
    ///
    /// # Safety
    ///
    /// The channel lock must be held, and the returned reference must not outlive it.
    #[allow(clippy::mut_from_ref)]
    unsafe fn state(&self) -> &mut State<T> {
        &mut *self.state.get()
    }

    /// Sends a message, blocking until a receiver takes it or it fits into the buffer.
    ///
    /// If the channel is closed, or gets closed while waiting, the message is returned in the
    /// error.
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        let mut st = self.acquire();
        if st.closed {
            return Err(SendError(msg));
        }

        // If there's a waiting receiver, hand the message over directly.
        if let Some(waiter) = st.recvq.dequeue() {
            unsafe { *(waiter.slot as *mut Option<T>) = Some(msg) };
            drop(st);
            waiter.complete();
            return Ok(());
        }

        if st.buf.len() < st.cap {
            st.buf.push_back(msg);
            return Ok(());
        }

        // Block until a receiver takes the message.
        let task = task::current();
        let mut slot = Some(msg);
        let mut waiter = Waiter::new(task.clone(), &mut slot as *mut Option<T> as *mut (), false, 0);
        let t0 = profile::start(&mut waiter);
        st.sendq.enqueue(waiter);
        task::park(move || {
            drop(st);
            true
        });

        match task.take_wake() {
            Some(Wake::Completed { released, .. }) => {
                profile::finish(t0, released);
                Ok(())
            }
            _ => match slot.take() {
                Some(msg) => Err(SendError(msg)),
                None => Ok(()),
            },
        }
    }

    /// Attempts to send a message without blocking.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let mut st = self.acquire();
        if st.closed {
            return Err(TrySendError::Closed(msg));
        }

        if let Some(waiter) = st.recvq.dequeue() {
            unsafe { *(waiter.slot as *mut Option<T>) = Some(msg) };
            drop(st);
            waiter.complete();
            return Ok(());
        }

        if st.buf.len() < st.cap {
            st.buf.push_back(msg);
            Ok(())
        } else {
            Err(TrySendError::Full(msg))
        }
    }

    /// Receives a message, blocking until one is available.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        self.recv_ok().0
    }

    /// Receives a message and reports whether it was actually sent.
    ///
    /// A receive from a closed and drained channel yields `(None, false)`.
    pub fn recv_ok(&self) -> (Option<T>, bool) {
        let mut st = self.acquire();

        // If there's a waiting sender, pair up with it.
        if let Some(waiter) = st.sendq.dequeue() {
            let msg = unsafe { st.take_from_sender(&waiter) };
            drop(st);
            waiter.complete();
            return (msg, true);
        }

        if let Some(msg) = st.buf.pop_front() {
            return (Some(msg), true);
        }

        if st.closed {
            return (None, false);
        }

        // Block until a sender shows up or the channel gets closed.
        let task = task::current();
        let mut slot: Option<T> = None;
        let mut waiter = Waiter::new(task.clone(), &mut slot as *mut Option<T> as *mut (), false, 0);
        let t0 = profile::start(&mut waiter);
        st.recvq.enqueue(waiter);
        task::park(move || {
            drop(st);
            true
        });

        match task.take_wake() {
            Some(Wake::Completed { released, .. }) => {
                profile::finish(t0, released);
                (slot.take(), true)
            }
            _ => (None, false),
        }
    }

    /// Attempts to receive a message without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut st = self.acquire();

        if let Some(waiter) = st.sendq.dequeue() {
            let msg = unsafe { st.take_from_sender(&waiter) };
            drop(st);
            waiter.complete();
            return msg.ok_or(TryRecvError::Closed);
        }

        if let Some(msg) = st.buf.pop_front() {
            return Ok(msg);
        }

        if st.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    /// Closes the channel.
    ///
    /// Every blocked receiver wakes up empty-handed and every blocked sender wakes up to find the
    /// channel closed. Buffered messages can still be received.
    pub fn close(&self) -> Result<(), CloseError> {
        let mut st = self.acquire();
        if st.closed {
            return Err(CloseError);
        }
        st.closed = true;

        let mut woken = SmallVec::<[Waiter; 4]>::new();
        while let Some(waiter) = st.recvq.dequeue() {
            unsafe { *(waiter.slot as *mut Option<T>) = None };
            woken.push(waiter);
        }
        while let Some(waiter) = st.sendq.dequeue() {
            woken.push(waiter);
        }
        drop(st);

        trace!(chan = self.id.0, released = woken.len(), "channel closed");
        for waiter in woken {
            waiter.close();
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Chan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Chan { .. }")
    }
}

/// The interface select uses to drive a channel of any message type.
///
/// Apart from [`chan_id`], [`raw_lock`] and [`raw_unlock`], every method requires the caller to
/// hold the channel lock. Slots are type-erased `Option<T>` pointers, where `T` is the message
/// type of the channel.
///
/// [`chan_id`]: RawChannel::chan_id
/// [`raw_lock`]: RawChannel::raw_lock
/// [`raw_unlock`]: RawChannel::raw_unlock
pub(crate) trait RawChannel: Sync {
    /// Returns the identity used for lock ordering.
    fn chan_id(&self) -> ChanId;

    /// Acquires the channel lock.
    fn raw_lock(&self);

    /// Releases the channel lock.
    unsafe fn raw_unlock(&self);

    /// Returns `true` if the channel is closed.
    unsafe fn closed(&self) -> bool;

    /// Returns the number of buffered messages.
    unsafe fn occupancy(&self) -> usize;

    /// Returns the capacity of the buffer.
    unsafe fn buffer_capacity(&self) -> usize;

    /// Takes the first blocked sender that can still be paired with.
    unsafe fn dequeue_sender(&self) -> Option<Waiter>;

    /// Takes the first blocked receiver that can still be paired with.
    unsafe fn dequeue_receiver(&self) -> Option<Waiter>;

    /// Queues a blocked sender.
    unsafe fn enqueue_sender(&self, waiter: Waiter) -> WaiterKey;

    /// Queues a blocked receiver.
    unsafe fn enqueue_receiver(&self, waiter: Waiter) -> WaiterKey;

    /// Removes a queued sender, if it's still there.
    unsafe fn remove_sender(&self, key: WaiterKey) -> Option<Waiter>;

    /// Removes a queued receiver, if it's still there.
    unsafe fn remove_receiver(&self, key: WaiterKey) -> Option<Waiter>;

    /// Receives into `slot` from the blocked sender `waiter`.
    unsafe fn recv_from_sender(&self, waiter: &Waiter, slot: *mut ());

    /// Receives into `slot` from the buffer.
    unsafe fn recv_buffered(&self, slot: *mut ());

    /// Receives the zero value into `slot` from a closed channel.
    unsafe fn recv_closed(&self, slot: *mut ());

    /// Moves the message in `slot` to the blocked receiver `waiter`.
    unsafe fn send_to_receiver(&self, waiter: &Waiter, slot: *mut ());

    /// Moves the message in `slot` into the buffer.
    unsafe fn send_buffered(&self, slot: *mut ());
}

impl<T: Send> RawChannel for Chan<T> {
    fn chan_id(&self) -> ChanId {
        self.id
    }

    fn raw_lock(&self) {
        self.lock.lock();
    }

    unsafe fn raw_unlock(&self) {
        self.lock.unlock();
    }

    unsafe fn closed(&self) -> bool {
        self.state().closed
    }

    unsafe fn occupancy(&self) -> usize {
        self.state().buf.len()
    }

    unsafe fn buffer_capacity(&self) -> usize {
        self.state().cap
    }

    unsafe fn dequeue_sender(&self) -> Option<Waiter> {
        self.state().sendq.dequeue()
    }

    unsafe fn dequeue_receiver(&self) -> Option<Waiter> {
        self.state().recvq.dequeue()
    }

    unsafe fn enqueue_sender(&self, waiter: Waiter) -> WaiterKey {
        self.state().sendq.enqueue(waiter)
    }

    unsafe fn enqueue_receiver(&self, waiter: Waiter) -> WaiterKey {
        self.state().recvq.enqueue(waiter)
    }

    unsafe fn remove_sender(&self, key: WaiterKey) -> Option<Waiter> {
        self.state().sendq.remove(key)
    }

    unsafe fn remove_receiver(&self, key: WaiterKey) -> Option<Waiter> {
        self.state().recvq.remove(key)
    }

    unsafe fn recv_from_sender(&self, waiter: &Waiter, slot: *mut ()) {
        let msg = self.state().take_from_sender(waiter);
        *(slot as *mut Option<T>) = msg;
    }

    unsafe fn recv_buffered(&self, slot: *mut ()) {
        *(slot as *mut Option<T>) = self.state().buf.pop_front();
    }

    unsafe fn recv_closed(&self, slot: *mut ()) {
        *(slot as *mut Option<T>) = None;
    }

    unsafe fn send_to_receiver(&self, waiter: &Waiter, slot: *mut ()) {
        *(waiter.slot as *mut Option<T>) = (*(slot as *mut Option<T>)).take();
    }

    unsafe fn send_buffered(&self, slot: *mut ()) {
        if let Some(msg) = (*(slot as *mut Option<T>)).take() {
            self.state().buf.push_back(msg);
        }
    }
}
