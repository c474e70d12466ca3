//! Basic uthread example
//!
//! Three threads take turns through `yield_now`, showing the strict
//! round-robin order of the scheduler.
//!
//! # Environment Variables
//!
//! - `UT_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `UT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `UT_STACK_SIZE=64K` - Stack size per thread

use std::cell::Cell;
use std::rc::Rc;

use uthread::{create, current, kdebug, kinfo, yield_now, Runtime, RuntimeConfig};

// UT_LOG_LEVEL=debug UT_FLUSH_EPRINT=1 cargo run -p uthread-basic
fn main() {
    println!("=== uthread Basic Example ===\n");

    let config = RuntimeConfig::from_env();
    config.print();

    let completed = Rc::new(Cell::new(0));
    let c = completed.clone();

    let result = Runtime::new(config).block_on(move || {
        kinfo!("Creating threads...");

        for i in 1..=3 {
            let c = c.clone();
            let id = create(move || {
                kdebug!("[worker {}] started", i);

                for j in 0..3 {
                    println!("worker {} (id={}) iteration {}", i, current(), j);
                    yield_now();
                }

                kdebug!("[worker {}] finished", i);
                c.set(c.get() + 1);
            });

            match id {
                Ok(id) => println!("Created worker {} (ID={})", i, id),
                Err(e) => println!("Failed to create worker {}: {}", i, e),
            }
        }
    });

    match result {
        Ok(()) => kinfo!("{} thread(s) completed", completed.get()),
        Err(e) => println!("run failed: {}", e),
    }

    println!("\n=== Example Complete ===");
}
