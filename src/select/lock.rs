//! Locking and unlocking all channels of a select.

use super::case::Case;

/// Locks every channel referenced by `cases`, following `lock_order`.
///
/// Cases on the same channel are adjacent in the locking order, so each channel is locked once.
pub(crate) fn lock_all(cases: &[Case<'_>], lock_order: &[usize]) {
    let mut last = None;
    for &o in lock_order {
        if let Some(c) = cases[o].chan {
            let id = c.chan_id();
            if last != Some(id) {
                last = Some(id);
                c.raw_lock();
            }
        }
    }
}

/// Unlocks every channel referenced by `cases`, in the reverse of `lock_order`.
///
/// A channel is never touched after its lock has been released.
///
/// # Safety
///
/// The channels must have been locked by [`lock_all`] with the same arguments.
pub(crate) unsafe fn unlock_all(cases: &[Case<'_>], lock_order: &[usize]) {
    for i in (0..lock_order.len()).rev() {
        let c = match cases[lock_order[i]].chan {
            Some(c) => c,
            None => continue,
        };
        if i > 0 {
            if let Some(prev) = cases[lock_order[i - 1]].chan {
                if prev.chan_id() == c.chan_id() {
                    // Will be unlocked on the next iteration.
                    continue;
                }
            }
        }
        c.raw_unlock();
    }
}
