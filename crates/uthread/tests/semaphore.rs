//! Semaphore scenarios: mutual exclusion, FIFO wakeup, producer/consumer

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use uthread::{create, current, run_with_config, yield_now, RuntimeConfig, Semaphore};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn config() -> RuntimeConfig {
    RuntimeConfig::new().stack_size(64 * 1024).preempt_hz(1000)
}

const WORKERS: usize = 4;
const ROUNDS: usize = 50;

static INSIDE: AtomicUsize = AtomicUsize::new(0);
static MAX_INSIDE: AtomicUsize = AtomicUsize::new(0);
static ENTRIES: AtomicUsize = AtomicUsize::new(0);

/// N workers loop over down / critical section / up on a count-1 semaphore
fn mutual_exclusion(preempt: bool, spin: usize) {
    INSIDE.store(0, Ordering::SeqCst);
    MAX_INSIDE.store(0, Ordering::SeqCst);
    ENTRIES.store(0, Ordering::SeqCst);

    // Leaked so that preempted threads never touch a shared refcount
    let sem: &'static Semaphore = Box::leak(Box::new(Semaphore::new(1)));

    run_with_config(config(), preempt, move || {
        for _ in 0..WORKERS {
            create(move || {
                for _ in 0..ROUNDS {
                    sem.down().unwrap();
                    let now = INSIDE.fetch_add(1, Ordering::SeqCst) + 1;
                    MAX_INSIDE.fetch_max(now, Ordering::SeqCst);
                    ENTRIES.fetch_add(1, Ordering::SeqCst);

                    for _ in 0..spin {
                        std::hint::spin_loop();
                    }
                    yield_now();

                    INSIDE.fetch_sub(1, Ordering::SeqCst);
                    sem.up();
                }
            })
            .unwrap();
        }
    })
    .unwrap();

    assert_eq!(MAX_INSIDE.load(Ordering::SeqCst), 1);
    assert_eq!(ENTRIES.load(Ordering::SeqCst), WORKERS * ROUNDS);
    assert_eq!(sem.count(), 1);
    assert_eq!(sem.waiters(), 0);
}

#[test]
fn test_mutual_exclusion_cooperative() {
    let _g = serial();
    mutual_exclusion(false, 0);
}

#[test]
fn test_mutual_exclusion_preemptive() {
    let _g = serial();
    mutual_exclusion(true, 20_000);
}

#[test]
fn test_fifo_wakeup() {
    let _g = serial();
    let order = Rc::new(RefCell::new(Vec::new()));
    let o = order.clone();

    run_with_config(config(), false, move || {
        let sem = Rc::new(Semaphore::new(0));

        // T1 blocks strictly before T2
        for _ in 0..2 {
            let (s, o) = (sem.clone(), o.clone());
            create(move || {
                s.down().unwrap();
                o.borrow_mut().push(current().as_u32());
            })
            .unwrap();
            yield_now();
        }

        o.borrow_mut().push(sem.waiters() as u32 * 100);
        sem.up();
        sem.up();
    })
    .unwrap();

    assert_eq!(*order.borrow(), vec![200, 2, 3]);
}

#[test]
fn test_producer_consumer() {
    let _g = serial();
    const SLOTS: usize = 2;
    const ITEMS: u32 = 10;

    let received = Rc::new(RefCell::new(Vec::new()));
    let r = received.clone();

    run_with_config(config(), false, move || {
        let buffer = Rc::new(RefCell::new(std::collections::VecDeque::new()));
        let empty = Rc::new(Semaphore::new(SLOTS));
        let full = Rc::new(Semaphore::new(0));

        let (b, e, f) = (buffer.clone(), empty.clone(), full.clone());
        create(move || {
            for item in 0..ITEMS {
                e.down().unwrap();
                b.borrow_mut().push_back(item);
                f.up();
            }
        })
        .unwrap();

        create(move || {
            for _ in 0..ITEMS {
                full.down().unwrap();
                let item = buffer.borrow_mut().pop_front();
                if let Some(item) = item {
                    r.borrow_mut().push(item);
                }
                empty.up();
            }
        })
        .unwrap();
    })
    .unwrap();

    assert_eq!(*received.borrow(), (0..ITEMS).collect::<Vec<_>>());
}

#[test]
fn test_try_down_never_blocks() {
    let _g = serial();
    let results = Rc::new(RefCell::new(Vec::new()));
    let r = results.clone();
    let blocked = Rc::new(Cell::new(false));
    let bl = blocked.clone();

    run_with_config(config(), false, move || {
        let sem = Semaphore::new(1);
        r.borrow_mut().push(sem.try_down());
        r.borrow_mut().push(sem.try_down());
        sem.up();
        r.borrow_mut().push(sem.try_down());
        bl.set(sem.waiters() != 0);
    })
    .unwrap();

    assert_eq!(*results.borrow(), vec![true, false, true]);
    assert!(!blocked.get());
}
