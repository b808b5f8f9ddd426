//! Tasks that park on channel operations.
//!
//! Every thread that touches a channel lazily gets a [`Task`]. A task blocked in a channel
//! operation is *parked*: it has published wait records on one or more channels and sleeps until
//! another task completes one of them (or closes the channel) and makes it runnable again.
//!
//! Parking is two-phase. The task is first marked as parked, then a commit callback releases the
//! channel locks, and only then does the thread actually sleep. Whoever wakes the task needs one
//! of those locks, so a wakeup can never slip in before the task is marked as parked.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::sync::{Parker, Unparker};
use crossbeam_utils::Backoff;
use parking_lot::Mutex;

/// The task is executing.
const RUNNING: u8 = 0;

/// The task is parked and waits for someone to make it runnable.
const PARKED: u8 = 1;

/// The task has been made runnable but hasn't resumed yet.
const RUNNABLE: u8 = 2;

/// What the waking task left for the woken one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// A counterpart completed the operation of the wait record tagged with `case`.
    Completed {
        /// The case tag of the completed wait record.
        case: usize,

        /// When the operation was completed, if blocking time is being profiled.
        released: Option<Instant>,
    },

    /// A channel the task was waiting on has been closed.
    Closed,
}

struct Inner {
    /// One of `RUNNING`, `PARKED`, or `RUNNABLE`.
    status: AtomicU8,

    /// Set by the first counterpart that claims a select operation of this task.
    select_done: AtomicBool,

    /// The reason for the last wakeup.
    wake: Mutex<Option<Wake>>,

    /// Wakes up the thread running this task.
    unparker: Unparker,
}

/// A handle to a task that may park on channel operations.
///
/// Handles are cheap to clone and can be sent to other threads.
#[derive(Clone)]
pub struct Task {
    inner: Arc<Inner>,
}

struct Local {
    task: Task,
    parker: Parker,
}

impl Local {
    fn new() -> Local {
        let parker = Parker::new();
        let task = Task {
            inner: Arc::new(Inner {
                status: AtomicU8::new(RUNNING),
                select_done: AtomicBool::new(false),
                wake: Mutex::new(None),
                unparker: parker.unparker().clone(),
            }),
        };
        Local { task, parker }
    }
}

thread_local! {
    static LOCAL: Local = Local::new();
}

/// Returns the task running on the current thread.
pub fn current() -> Task {
    LOCAL.with(|local| local.task.clone())
}

/// Parks the current task.
///
/// The task is marked as parked before `commit` runs. If `commit` returns `false` the park is
/// abandoned and this function returns immediately. Otherwise the thread sleeps until another
/// task calls [`Task::make_runnable`].
pub(crate) fn park<F>(commit: F)
where
    F: FnOnce() -> bool,
{
    LOCAL.with(|local| {
        let inner = &local.task.inner;
        inner.status.store(PARKED, Ordering::SeqCst);

        if !commit() {
            inner.status.store(RUNNING, Ordering::SeqCst);
            return;
        }

        // Spin for a short time before putting the thread to sleep.
        let backoff = Backoff::new();
        while inner.status.load(Ordering::Acquire) == PARKED {
            if backoff.is_completed() {
                local.parker.park();
            } else {
                backoff.snooze();
            }
        }

        inner.status.store(RUNNING, Ordering::Release);
    })
}

/// Parks the current task forever.
///
/// This is what a select with no cases does.
pub fn block() -> ! {
    loop {
        park(|| true);
    }
}

impl Task {
    /// Returns `true` if the task is parked and nobody has made it runnable yet.
    pub fn is_parked(&self) -> bool {
        self.inner.status.load(Ordering::SeqCst) == PARKED
    }

    /// Stores the reason for waking up and makes the task runnable.
    pub(crate) fn make_runnable(&self, wake: Wake) {
        *self.inner.wake.lock() = Some(wake);
        self.inner.status.store(RUNNABLE, Ordering::Release);
        self.inner.unparker.unpark();
    }

    /// Takes the reason for the last wakeup.
    pub(crate) fn take_wake(&self) -> Option<Wake> {
        self.inner.wake.lock().take()
    }

    /// Attempts to claim the task's current select for a single operation.
    ///
    /// Only the first claim succeeds until [`Task::reset_select`] is called.
    pub(crate) fn try_claim_select(&self) -> bool {
        self.inner
            .select_done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Makes the task's select claimable again.
    pub(crate) fn reset_select(&self) {
        self.inner.select_done.store(false, Ordering::Release);
    }

    /// Returns `true` if both handles refer to the same task.
    pub fn same_as(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.inner.status.load(Ordering::Relaxed) {
            RUNNING => "running",
            PARKED => "parked",
            _ => "runnable",
        };
        f.debug_struct("Task").field("status", &status).finish()
    }
}
