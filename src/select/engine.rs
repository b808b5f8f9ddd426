//! The select algorithm.
//!
//! With all channels locked, the cases are scanned in polling order for one that can complete
//! right away. If there's none and no default case either, a wait record is published on every
//! channel, the locks are released and the task parks. Whoever completes one of those records
//! claims the select, so exactly one case wins. After waking up, the task locks everything again,
//! figures out which case won, and withdraws the remaining records.
//!
//! A task woken up because a channel was closed doesn't know which case to take, so it simply
//! scans again. Channels never reopen, so the next scan is guaranteed to find the closed one
//! ready.

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use super::case::{Case, CaseKind};
use super::lock::{lock_all, unlock_all};
use super::order::{lock_order, poll_order};
use super::Selected;
use crate::chan::RawChannel;
use crate::err::SelectError;
use crate::profile;
use crate::task::{self, Wake};
use crate::waitq::{Waiter, WaiterKey};

/// A case found ready during the scan, together with how to complete it.
enum Ready {
    /// Receive from a blocked sender.
    SyncRecv(Waiter),

    /// Receive from the buffer.
    BufRecv,

    /// Receive from a closed channel.
    ClosedRecv,

    /// Send to a blocked receiver.
    SyncSend(Waiter),

    /// Send into the buffer.
    BufSend,
}

/// Runs a select over `cases` and returns the chosen one.
///
/// Blocks forever if there are no cases.
pub(crate) fn select(cases: &mut [Case<'_>]) -> Result<Selected, SelectError> {
    let n = cases.len();
    if n == 0 {
        task::block();
    }

    for case in cases.iter_mut() {
        case.normalize();
        case.release_time = None;
    }
    let t0 = profile::now();

    let mut poll: SmallVec<[usize; 4]> = smallvec![0; n];
    let mut lock: SmallVec<[usize; 4]> = smallvec![0; n];
    poll_order(&mut poll);
    lock_order(&poll, &mut lock, |i| cases[i].sort_key());

    lock_all(cases, &lock);

    loop {
        // A send on a closed channel fails the whole select, whatever else is ready.
        for &i in poll.iter() {
            if let (CaseKind::Send, Some(c)) = (cases[i].kind, cases[i].chan) {
                if unsafe { c.closed() } {
                    unsafe { unlock_all(cases, &lock) };
                    return Err(SelectError::SendOnClosed { index: i });
                }
            }
        }

        // Pass 1: look for a case that can complete right away.
        let mut dfl = None;
        let mut found = None;
        for &i in poll.iter() {
            let case = &cases[i];
            match (case.kind, case.chan) {
                (CaseKind::Recv, Some(c)) => unsafe {
                    if let Some(w) = c.dequeue_sender() {
                        found = Some((i, c, Ready::SyncRecv(w)));
                        break;
                    }
                    if c.occupancy() > 0 {
                        found = Some((i, c, Ready::BufRecv));
                        break;
                    }
                    if c.closed() {
                        found = Some((i, c, Ready::ClosedRecv));
                        break;
                    }
                },
                (CaseKind::Send, Some(c)) => unsafe {
                    if let Some(w) = c.dequeue_receiver() {
                        found = Some((i, c, Ready::SyncSend(w)));
                        break;
                    }
                    if c.occupancy() < c.buffer_capacity() {
                        found = Some((i, c, Ready::BufSend));
                        break;
                    }
                },
                (CaseKind::Default, _) => dfl = Some(i),
                _ => {}
            }
        }

        if let Some((i, chan, ready)) = found {
            return Ok(complete(cases, &lock, i, chan, ready));
        }

        if let Some(i) = dfl {
            unsafe { unlock_all(cases, &lock) };
            return Ok(Selected {
                index: i,
                recv_ok: true,
                blocked: None,
            });
        }

        // Pass 2: publish a wait record on every channel, in locking order.
        let me = task::current();
        let mut waiting: SmallVec<[(usize, WaiterKey); 4]> = SmallVec::new();
        for &i in lock.iter() {
            let case = &cases[i];
            let mut waiter = Waiter::new(me.clone(), case.slot, true, i);
            waiter.profiled = t0.is_some();
            let key = match (case.kind, case.chan) {
                (CaseKind::Recv, Some(c)) => unsafe { c.enqueue_receiver(waiter) },
                (CaseKind::Send, Some(c)) => unsafe { c.enqueue_sender(waiter) },
                _ => continue,
            };
            waiting.push((i, key));
        }

        trace!(records = waiting.len(), "select parking");
        task::park(|| {
            unsafe { unlock_all(cases, &lock) };
            true
        });

        lock_all(cases, &lock);
        let wake = me.take_wake();
        me.reset_select();

        // Pass 3: find the case that won and withdraw the other records.
        let mut chosen = None;
        for &(i, key) in waiting.iter() {
            let case = &mut cases[i];
            if let Some(Wake::Completed { case: won, released }) = wake {
                if won == i {
                    // Already dequeued by the task that woke us up.
                    chosen = Some(i);
                    case.release_time = released;
                    continue;
                }
            }
            let withdrawn = match (case.kind, case.chan) {
                (CaseKind::Recv, Some(c)) => unsafe { c.remove_receiver(key) },
                (CaseKind::Send, Some(c)) => unsafe { c.remove_sender(key) },
                _ => None,
            };
            drop(withdrawn);
        }

        let i = match chosen {
            Some(i) => i,
            None => {
                // Woken up by a closed channel. Scan again and find it.
                trace!("select woken without a case, scanning again");
                continue;
            }
        };

        unsafe { unlock_all(cases, &lock) };

        let blocked = profile::finish(t0, cases[i].release_time);
        return Ok(Selected {
            index: i,
            recv_ok: cases[i].kind == CaseKind::Recv,
            blocked,
        });
    }
}

/// Completes a case found ready during the scan and releases all locks.
fn complete(
    cases: &[Case<'_>],
    lock: &[usize],
    i: usize,
    chan: &dyn RawChannel,
    ready: Ready,
) -> Selected {
    let slot = cases[i].slot;
    let (recv_ok, counterpart) = unsafe {
        match ready {
            Ready::SyncRecv(w) => {
                chan.recv_from_sender(&w, slot);
                (true, Some(w))
            }
            Ready::BufRecv => {
                chan.recv_buffered(slot);
                (true, None)
            }
            Ready::ClosedRecv => {
                chan.recv_closed(slot);
                (false, None)
            }
            Ready::SyncSend(w) => {
                chan.send_to_receiver(&w, slot);
                (false, Some(w))
            }
            Ready::BufSend => {
                chan.send_buffered(slot);
                (false, None)
            }
        }
    };

    unsafe { unlock_all(cases, lock) };

    // Wake up the counterpart only once it can take the locks it needs.
    if let Some(w) = counterpart {
        w.complete();
    }

    Selected {
        index: i,
        recv_ok,
        blocked: None,
    }
}
