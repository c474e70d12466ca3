//! Semaphore example: bounded producer/consumer
//!
//! Two producers and two consumers share a ring of `SLOTS` entries guarded
//! by three semaphores (free slots, filled slots, and a count-1 lock).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use uthread::{create, current, kinfo, run, yield_now, Semaphore};

const SLOTS: usize = 4;
const PER_PRODUCER: u32 = 8;
const PRODUCERS: u32 = 2;
const CONSUMERS: u32 = 2;

struct Ring {
    items: RefCell<VecDeque<u32>>,
    free: Semaphore,
    filled: Semaphore,
    lock: Semaphore,
}

fn main() {
    println!("=== uthread Semaphore Example ===\n");

    let ring = Rc::new(Ring {
        items: RefCell::new(VecDeque::with_capacity(SLOTS)),
        free: Semaphore::new(SLOTS),
        filled: Semaphore::new(0),
        lock: Semaphore::new(1),
    });
    let consumed = Rc::new(RefCell::new(Vec::new()));

    let (r, c) = (ring.clone(), consumed.clone());
    let result = run(false, move || {
        for p in 0..PRODUCERS {
            let r = r.clone();
            create(move || {
                for n in 0..PER_PRODUCER {
                    let item = p * 100 + n;
                    r.free.down().expect("free slot");
                    r.lock.down().expect("lock");
                    r.items.borrow_mut().push_back(item);
                    r.lock.up();
                    r.filled.up();
                    println!("[T{}] produced {}", current(), item);
                    yield_now();
                }
            })
            .expect("create producer");
        }

        for _ in 0..CONSUMERS {
            let (r, c) = (r.clone(), c.clone());
            create(move || {
                for _ in 0..(PRODUCERS * PER_PRODUCER / CONSUMERS) {
                    r.filled.down().expect("filled slot");
                    r.lock.down().expect("lock");
                    let item = r.items.borrow_mut().pop_front();
                    r.lock.up();
                    r.free.up();
                    if let Some(item) = item {
                        println!("[T{}] consumed {}", current(), item);
                        c.borrow_mut().push(item);
                    }
                }
            })
            .expect("create consumer");
        }
    });

    match result {
        Ok(()) => kinfo!("run finished"),
        Err(e) => {
            eprintln!("run failed: {}", e);
            std::process::exit(1);
        }
    }

    let consumed = consumed.borrow();
    println!("\nconsumed {} item(s), {} slot(s) free", consumed.len(), ring.free.count());
    println!("\n=== Example Complete ===");
}
