//! Tests borrowed from Go and ported to Rust.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_utils::thread::scope;
use multiselect::{Chan, Select};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

// https://github.com/golang/go/blob/master/test/chan/doubleselect.go
mod doubleselect {
    use super::*;

    const ITERATIONS: i32 = 10_000;

    // Sends each value on one of the four channels, then closes them all.
    fn sender(n: i32, c1: &Chan<i32>, c2: &Chan<i32>, c3: &Chan<i32>, c4: &Chan<i32>) {
        for i in 0..n {
            let mut a = Some(i);
            let mut b = Some(i);
            let mut c = Some(i);
            let mut d = Some(i);
            let mut sel = Select::new();
            sel.send(c1, &mut a);
            sel.send(c2, &mut b);
            sel.send(c3, &mut c);
            sel.send(c4, &mut d);
            sel.select().unwrap();
        }
        c1.close().unwrap();
        c2.close().unwrap();
        c3.close().unwrap();
        c4.close().unwrap();
    }

    // Forwards everything from `input` to `out` with a select, to exercise the wait queues.
    fn mux(out: &Chan<i32>, input: &Chan<i32>, done: &Chan<bool>) {
        while let Some(v) = input.recv() {
            // Stress the closed-channel wakeups by using a select with a single case.
            let mut msg = Some(v);
            let mut sel = Select::new();
            sel.send(out, &mut msg);
            sel.select().unwrap();
        }
        done.send(true).unwrap();
    }

    fn recver(input: &Chan<i32>) {
        let mut seen = vec![false; ITERATIONS as usize];
        while let Some(v) = input.recv() {
            assert!(!seen[v as usize], "got duplicate value {}", v);
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn main() {
        let c1 = Chan::new(0);
        let c2 = Chan::new(0);
        let c3 = Chan::new(0);
        let c4 = Chan::new(0);
        let done = Chan::new(0);
        let cmux = Chan::new(0);

        scope(|s| {
            s.spawn(|_| sender(ITERATIONS, &c1, &c2, &c3, &c4));
            s.spawn(|_| mux(&cmux, &c1, &done));
            s.spawn(|_| mux(&cmux, &c2, &done));
            s.spawn(|_| mux(&cmux, &c3, &done));
            s.spawn(|_| mux(&cmux, &c4, &done));
            s.spawn(|_| {
                for _ in 0..4 {
                    done.recv().unwrap();
                }
                cmux.close().unwrap();
            });

            // We keep the recver because it might catch more bugs in the future.
            recver(&cmux);
        })
        .unwrap();
    }
}

// https://github.com/golang/go/blob/master/test/chan/fifo.go
mod fifo {
    use super::*;

    const N: i32 = 10;

    #[test]
    fn asynch_fifo() {
        let ch = Chan::new(N as usize);
        for i in 0..N {
            ch.send(i).unwrap();
        }
        for i in 0..N {
            assert_eq!(ch.recv(), Some(i));
        }
    }

    fn chain(ch: &Chan<i32>, val: i32, input: &Chan<i32>, out: &Chan<i32>) {
        input.recv().unwrap();
        assert_eq!(ch.recv(), Some(val));
        out.send(1).unwrap();
    }

    #[test]
    fn synch_fifo() {
        let ch = Chan::new(0);
        let links: Vec<Chan<i32>> = (0..=N).map(|_| Chan::new(0)).collect();

        scope(|s| {
            for i in 0..N as usize {
                let (ch, input, out) = (&ch, &links[i], &links[i + 1]);
                s.spawn(move |_| chain(ch, i as i32, input, out));
            }
            links[0].send(0).unwrap();
            for i in 0..N {
                ch.send(i).unwrap();
            }
            links[N as usize].recv().unwrap();
        })
        .unwrap();
    }
}

// https://github.com/golang/go/blob/master/test/chan/nonblock.go
mod nonblock {
    use super::*;

    fn try_recv_with_default(c: &Chan<i32>) -> Option<i32> {
        let mut got = None;
        let mut sel = Select::new();
        let recv = sel.recv(c, &mut got);
        sel.default_case();
        if sel.select().unwrap().index() == recv {
            got
        } else {
            None
        }
    }

    fn try_send_with_default(c: &Chan<i32>, v: i32) -> bool {
        let mut msg = Some(v);
        let mut sel = Select::new();
        let send = sel.send(c, &mut msg);
        sel.default_case();
        sel.select().unwrap().index() == send
    }

    #[test]
    fn main() {
        for buffer in [0usize, 1, 10] {
            let c = Chan::new(buffer);
            assert_eq!(try_recv_with_default(&c), None);

            let sent = AtomicUsize::new(0);
            scope(|s| {
                s.spawn(|_| {
                    c.send(123).unwrap();
                    sent.fetch_add(1, Ordering::SeqCst);
                });

                // Poll until the blocked or buffered value shows up.
                let got = loop {
                    if let Some(v) = try_recv_with_default(&c) {
                        break v;
                    }
                    thread::sleep(ms(1));
                };
                assert_eq!(got, 123);
            })
            .unwrap();
            assert_eq!(sent.load(Ordering::SeqCst), 1);

            scope(|s| {
                s.spawn(|_| assert_eq!(c.recv(), Some(456)));

                // Poll until the receiver is waiting, or the value fits into the buffer.
                while !try_send_with_default(&c, 456) {
                    thread::sleep(ms(1));
                }
            })
            .unwrap();
        }
    }
}

// https://github.com/golang/go/blob/master/test/chan/select3.go
mod select3 {
    use super::*;

    #[test]
    fn nil_channels_never_fire() {
        let mut a: Option<i32> = None;
        let mut b = Some(1);
        let mut sel = Select::new();
        sel.recv(None::<&Chan<i32>>, &mut a);
        sel.send(None::<&Chan<i32>>, &mut b);
        let dfl = sel.default_case();
        assert_eq!(sel.select().unwrap().index(), dfl);
    }

    #[test]
    fn closed_channel_never_blocks() {
        let closed = Chan::<i32>::new(0);
        closed.close().unwrap();
        let idle = Chan::<i32>::new(0);

        for _ in 0..10 {
            let mut a = None;
            let mut b = None;
            let mut sel = Select::new();
            sel.recv(&idle, &mut a);
            let c = sel.recv(&closed, &mut b);
            let selected = sel.select().unwrap();
            assert_eq!(selected.index(), c);
            assert!(!selected.recv_ok());
        }
    }

    #[test]
    fn select_unblocks_on_close() {
        let c = Chan::<i32>::new(0);
        scope(|s| {
            s.spawn(|_| {
                thread::sleep(ms(50));
                c.close().unwrap();
            });
            let mut a = None;
            let mut b = None;
            let mut sel = Select::new();
            sel.recv(&c, &mut a);
            sel.recv(None::<&Chan<i32>>, &mut b);
            assert_eq!(sel.select().unwrap().index(), 0);
        })
        .unwrap();
    }
}

// https://github.com/golang/go/blob/master/test/chan/sieve1.go
mod sieve1 {
    use super::*;

    fn generate(ch: &Chan<i32>, quit: &Chan<()>) {
        let mut i = 2;
        loop {
            let mut msg = Some(i);
            let mut stop = None;
            let mut sel = Select::new();
            sel.send(ch, &mut msg);
            let q = sel.recv(quit, &mut stop);
            if sel.select().unwrap().index() == q {
                return;
            }
            i += 1;
        }
    }

    fn filter(input: &Chan<i32>, out: &Chan<i32>, prime: i32, quit: &Chan<()>) {
        loop {
            let mut got = None;
            let mut stop = None;
            let mut sel = Select::new();
            let r = sel.recv(input, &mut got);
            sel.recv(quit, &mut stop);
            if sel.select().unwrap().index() != r {
                return;
            }

            let i = got.unwrap();
            if i % prime != 0 {
                let mut msg = Some(i);
                let mut stop = None;
                let mut sel = Select::new();
                sel.send(out, &mut msg);
                let q = sel.recv(quit, &mut stop);
                if sel.select().unwrap().index() == q {
                    return;
                }
            }
        }
    }

    #[test]
    fn main() {
        const PRIMES: [i32; 10] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29];

        let quit = Chan::new(0);
        let chans: Vec<Chan<i32>> = (0..=PRIMES.len()).map(|_| Chan::new(0)).collect();

        scope(|s| {
            s.spawn(|_| generate(&chans[0], &quit));

            for (i, &expected) in PRIMES.iter().enumerate() {
                let prime = chans[i].recv().unwrap();
                assert_eq!(prime, expected);

                let (input, out, quit) = (&chans[i], &chans[i + 1], &quit);
                s.spawn(move |_| filter(input, out, prime, quit));
            }

            quit.close().unwrap();
        })
        .unwrap();
    }
}
