//! Wait records and the queues that hold them.
//!
//! A [`Waiter`] represents one task blocked on one operation of one channel. Every channel keeps
//! two [`WaitQueue`]s: one for blocked senders and one for blocked receivers.
//!
//! The queue is a doubly linked list threaded through an arena of nodes. Links are arena indices
//! and records are addressed from the outside by a [`WaiterKey`], which pairs the index with a
//! generation counter. Removing from the front, the middle, or the back are all O(1), and a stale
//! key (one whose record was already taken by somebody else) is simply not found.
//!
//! Vacated nodes go onto a free list and get reused by later records, so the arena doubles as
//! the pool of wait records. A record is released exactly once: either by the counterpart that
//! dequeues it or by the owner that removes it.

use std::time::Instant;

use crate::task::{Task, Wake};

/// A task blocked on a channel operation.
pub(crate) struct Waiter {
    /// The task owning this record.
    pub(crate) task: Task,

    /// Points to the owner's `Option<T>` slot: the message to send, or where to put the received
    /// one. Only accessed while holding the channel lock.
    pub(crate) slot: *mut (),

    /// `true` if the record belongs to a multi-way select.
    pub(crate) is_select: bool,

    /// The select case this record was published for.
    pub(crate) case: usize,

    /// `true` if the owner wants the completion time for blocking profiles.
    pub(crate) profiled: bool,
}

impl Waiter {
    /// Creates a record for an operation of `task`.
    pub(crate) fn new(task: Task, slot: *mut (), is_select: bool, case: usize) -> Waiter {
        Waiter {
            task,
            slot,
            is_select,
            case,
            profiled: false,
        }
    }

    /// Wakes up the owner after a counterpart completed the operation.
    ///
    /// Must be called after the channel lock has been released.
    pub(crate) fn complete(self) {
        let released = if self.profiled {
            Some(Instant::now())
        } else {
            None
        };
        self.task.make_runnable(Wake::Completed {
            case: self.case,
            released,
        });
    }

    /// Wakes up the owner because the channel was closed.
    ///
    /// Must be called after the channel lock has been released.
    pub(crate) fn close(self) {
        self.task.make_runnable(Wake::Closed);
    }
}

/// Identifies a record inside the queue it was enqueued in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WaiterKey {
    index: u32,
    generation: u32,
}

struct Node {
    waiter: Option<Waiter>,
    generation: u32,
    prev: Option<u32>,
    next: Option<u32>,
}

/// A FIFO queue of blocked operations.
pub(crate) struct WaitQueue {
    nodes: Vec<Node>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl WaitQueue {
    /// Creates an empty queue.
    pub(crate) fn new() -> WaitQueue {
        WaitQueue {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Returns the number of queued records.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no records are queued.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a record to the back of the queue.
    pub(crate) fn enqueue(&mut self, waiter: Waiter) -> WaiterKey {
        let index = match self.free.pop() {
            Some(index) => {
                let node = &mut self.nodes[index as usize];
                node.waiter = Some(waiter);
                node.prev = self.tail;
                node.next = None;
                index
            }
            None => {
                let index = self.nodes.len() as u32;
                self.nodes.push(Node {
                    waiter: Some(waiter),
                    generation: 0,
                    prev: self.tail,
                    next: None,
                });
                index
            }
        };

        match self.tail {
            Some(tail) => self.nodes[tail as usize].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        WaiterKey {
            index,
            generation: self.nodes[index as usize].generation,
        }
    }

    /// Takes the first record whose operation can still be completed.
    ///
    /// A record belonging to a select whose task was already claimed through another channel is
    /// dropped on the way: that select has already got its operation.
    pub(crate) fn dequeue(&mut self) -> Option<Waiter> {
        while let Some(index) = self.head {
            let waiter = self.unlink(index);
            if waiter.is_select && !waiter.task.try_claim_select() {
                continue;
            }
            return Some(waiter);
        }
        None
    }

    /// Removes the record identified by `key`, if it's still queued.
    pub(crate) fn remove(&mut self, key: WaiterKey) -> Option<Waiter> {
        match self.nodes.get(key.index as usize) {
            Some(node) if node.generation == key.generation && node.waiter.is_some() => {
                Some(self.unlink(key.index))
            }
            _ => None,
        }
    }

    /// Detaches an occupied node and puts it onto the free list.
    fn unlink(&mut self, index: u32) -> Waiter {
        let (prev, next, waiter) = {
            let node = &mut self.nodes[index as usize];
            node.generation = node.generation.wrapping_add(1);
            let waiter = node.waiter.take();
            (node.prev.take(), node.next.take(), waiter)
        };

        match prev {
            Some(prev) => self.nodes[prev as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next as usize].prev = prev,
            None => self.tail = prev,
        }

        self.free.push(index);
        self.len -= 1;

        match waiter {
            Some(waiter) => waiter,
            None => unreachable!("unlinked a vacant wait queue node"),
        }
    }
}

impl Drop for WaitQueue {
    fn drop(&mut self) {
        debug_assert!(self.is_empty());
    }
}
