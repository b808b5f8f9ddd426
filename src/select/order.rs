//! Polling and locking orders.
//!
//! The polling order is a fresh random permutation of the cases on every select, so that no case
//! is favored when several are ready at once. The locking order sorts the cases by channel
//! identity: any two selects lock the channels they share in the same relative order, and all
//! cases on one channel end up next to each other so the channel is locked only once.

use rand::Rng;

/// Fills `order` with a uniformly random permutation of `0..order.len()`.
pub(crate) fn poll_order(order: &mut [usize]) {
    let mut rng = rand::thread_rng();
    for i in 0..order.len() {
        let j = rng.gen_range(0..=i);
        order[i] = order[j];
        order[j] = i;
    }
}

/// Fills `lock` with the cases of `poll` sorted by `key`.
///
/// Cases with equal keys keep their relative polling order. This is a heap sort running in
/// O(n log n) time without any extra memory.
pub(crate) fn lock_order<F>(poll: &[usize], lock: &mut [usize], key: F)
where
    F: Fn(usize) -> usize,
{
    let n = poll.len();
    debug_assert_eq!(lock.len(), n);

    // Sort positions in the polling order rather than case indices, breaking ties on equal keys
    // by position.
    let k = |pos: usize| (key(poll[pos]), pos);

    // Build a max-heap.
    for i in 0..n {
        let c = k(i);
        let mut j = i;
        while j > 0 && k(lock[(j - 1) / 2]) < c {
            let parent = (j - 1) / 2;
            lock[j] = lock[parent];
            j = parent;
        }
        lock[j] = i;
    }

    // Repeatedly move the maximum to the end.
    for i in (0..n).rev() {
        let o = lock[i];
        let c = k(o);
        lock[i] = lock[0];
        let mut j = 0;
        loop {
            let mut child = j * 2 + 1;
            if child >= i {
                break;
            }
            if child + 1 < i && k(lock[child]) < k(lock[child + 1]) {
                child += 1;
            }
            if c < k(lock[child]) {
                lock[j] = lock[child];
                j = child;
                continue;
            }
            break;
        }
        lock[j] = o;
    }

    for pos in lock.iter_mut() {
        *pos = poll[*pos];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(v: &[usize]) -> bool {
        let mut sorted = v.to_vec();
        sorted.sort_unstable();
        sorted.iter().enumerate().all(|(i, &x)| i == x)
    }

    #[test]
    fn empty_and_single() {
        let mut poll: [usize; 0] = [];
        let mut lock: [usize; 0] = [];
        poll_order(&mut poll);
        lock_order(&poll, &mut lock, |i| i);

        let mut poll = [5];
        let mut lock = [9];
        poll_order(&mut poll);
        lock_order(&poll, &mut lock, |_| 42);
        assert_eq!(poll, [0]);
        assert_eq!(lock, [0]);
    }

    #[test]
    fn poll_is_permutation() {
        for n in 1..20 {
            let mut poll = vec![0; n];
            poll_order(&mut poll);
            assert!(is_permutation(&poll));
        }
    }

    #[test]
    fn poll_is_uniform() {
        const TRIALS: usize = 60_000;
        let mut hits = [[0usize; 3]; 3];
        let mut poll = [0; 3];
        for _ in 0..TRIALS {
            poll_order(&mut poll);
            for (pos, &case) in poll.iter().enumerate() {
                hits[pos][case] += 1;
            }
        }
        for row in hits.iter() {
            for &h in row.iter() {
                assert!(h > TRIALS / 3 * 9 / 10 && h < TRIALS / 3 * 11 / 10);
            }
        }
    }

    #[test]
    fn sorted_and_contiguous() {
        let keys = [30, 10, usize::MAX, 20, 10, 30, 10];
        for _ in 0..100 {
            let mut poll = vec![0; keys.len()];
            let mut lock = vec![0; keys.len()];
            poll_order(&mut poll);
            lock_order(&poll, &mut lock, |i| keys[i]);

            assert!(is_permutation(&lock));
            for w in lock.windows(2) {
                assert!(keys[w[0]] <= keys[w[1]]);
            }
            assert_eq!(keys[lock[keys.len() - 1]], usize::MAX);

            // Ties keep their polling order.
            let pos = |case: usize| poll.iter().position(|&c| c == case).unwrap();
            for w in lock.windows(2) {
                if keys[w[0]] == keys[w[1]] {
                    assert!(pos(w[0]) < pos(w[1]));
                }
            }
        }
    }
}
