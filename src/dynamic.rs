//! Select over a case list built at run time.
//!
//! [`Select`] needs a slot borrowed for each case. When the set of cases is only known at run time,
//! it's easier to describe them as values and let [`select`] own the slots.
//!
//! [`Select`]: crate::Select

use std::fmt;

use crate::chan::Chan;
use crate::err::SelectError;
use crate::select::Select;
use crate::task;

/// One case of a dynamic select.
pub enum SelectCase<'a, T> {
    /// Sends the message on the channel. Never ready if the channel is absent.
    Send(Option<&'a Chan<T>>, T),

    /// Receives from the channel. Never ready if the channel is absent.
    Recv(Option<&'a Chan<T>>),

    /// Fires when no other case is ready.
    Default,
}

impl<T> fmt::Debug for SelectCase<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectCase::Send(chan, _) => f.debug_tuple("Send").field(chan).finish(),
            SelectCase::Recv(chan) => f.debug_tuple("Recv").field(chan).finish(),
            SelectCase::Default => f.write_str("Default"),
        }
    }
}

enum Dir<'a, T> {
    Send(Option<&'a Chan<T>>),
    Recv(Option<&'a Chan<T>>),
    Default,
}

/// Runs a select over `cases`.
///
/// Returns the index of the chosen case, the received message if it's a receive case, and the
/// same `ok` flag as [`Selected::recv_ok`]. Blocks forever if `cases` is empty.
///
/// Messages of send cases that weren't chosen are dropped.
///
/// # Panics
///
/// Panics if there is more than one default case.
///
/// [`Selected::recv_ok`]: crate::Selected::recv_ok
///
/// # Examples
///
/// ```
/// use multiselect::Chan;
/// use multiselect::dynamic::{select, SelectCase};
///
/// let chans: Vec<Chan<i32>> = (0..4).map(|_| Chan::new(1)).collect();
/// chans[2].send(7).unwrap();
///
/// let cases = chans.iter().map(|c| SelectCase::Recv(Some(c))).collect();
/// assert_eq!(select(cases), Ok((2, Some(7), true)));
/// ```
pub fn select<T: Send>(cases: Vec<SelectCase<'_, T>>) -> Result<(usize, Option<T>, bool), SelectError> {
    if cases.is_empty() {
        task::block();
    }

    let (dirs, mut slots): (Vec<_>, Vec<_>) = cases
        .into_iter()
        .map(|case| match case {
            SelectCase::Send(chan, msg) => (Dir::Send(chan), Some(msg)),
            SelectCase::Recv(chan) => (Dir::Recv(chan), None),
            SelectCase::Default => (Dir::Default, None),
        })
        .unzip();

    let mut sel = Select::new();
    for (dir, slot) in dirs.iter().zip(slots.iter_mut()) {
        match *dir {
            Dir::Send(chan) => sel.send(chan, slot),
            Dir::Recv(chan) => sel.recv(chan, slot),
            Dir::Default => sel.default_case(),
        };
    }
    let selected = sel.select()?;

    let i = selected.index();
    let msg = match dirs[i] {
        Dir::Recv(_) => slots[i].take(),
        _ => None,
    };
    Ok((i, msg, selected.recv_ok()))
}
