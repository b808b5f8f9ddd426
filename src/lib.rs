//! Multi-way select over channels.
//!
//! A [`Select`] waits on several channel operations at once (sends, receives, and an optional
//! default case), completes exactly one of them and reports which. When several operations are
//! ready at the same time, one is picked at random, so no channel is starved over repeated
//! selects.
//!
//! Channels are created with [`Chan::new`]. A channel of capacity zero is a rendezvous channel
//! where every send has to meet a receive; otherwise up to `cap` messages are buffered. A closed
//! channel stays closed: receives drain what is buffered and then report `ok == false`, while
//! sends fail.
//!
//! ```
//! use std::thread;
//! use std::sync::Arc;
//! use multiselect::{Chan, Select};
//!
//! let numbers = Arc::new(Chan::new(0));
//! let done = Arc::new(Chan::<()>::new(0));
//!
//! let (n, d) = (numbers.clone(), done.clone());
//! thread::spawn(move || {
//!     n.send(1).unwrap();
//!     d.close().unwrap();
//! });
//!
//! let mut sum = 0;
//! loop {
//!     let mut num = None;
//!     let mut stop = None;
//!
//!     let mut sel = Select::new();
//!     let recv_num = sel.recv(&*numbers, &mut num);
//!     sel.recv(&*done, &mut stop);
//!
//!     let selected = sel.select().unwrap();
//!     if selected.index() == recv_num {
//!         sum += num.unwrap();
//!     } else {
//!         break;
//!     }
//! }
//! assert_eq!(sum, 1);
//! ```
//!
//! # Sending on a closed channel
//!
//! A send case on a closed channel makes the whole select fail with
//! [`SelectError::SendOnClosed`], even if other cases are ready. No operation is performed in that
//! case.
//!
//! # Blocking profile
//!
//! Time spent blocked can be accounted with [`profile::set_block_profile`].

#![warn(missing_docs, missing_debug_implementations)]

mod chan;
mod err;
mod select;
mod waitq;

pub mod dynamic;
pub mod profile;
pub mod task;

pub use crate::chan::{Chan, ChanId};
pub use crate::err::{CloseError, SelectError, SendError, TryRecvError, TrySendError};
pub use crate::select::{Select, Selected};
