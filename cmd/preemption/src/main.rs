//! Preemption example
//!
//! One thread spins without ever yielding; a second thread still gets the
//! CPU because the timer interrupts the spinner. Run with `--no-preempt`
//! to see the second thread wait until the spinner finishes.
//!
//! # Environment Variables
//!
//! - `UT_PREEMPT_HZ=250` - Timer frequency
//! - `UT_LOG_LEVEL=debug` - Show preemption start/stop

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use uthread::{create, run, without_preemption};

static TICKS: AtomicU64 = AtomicU64::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

const SPIN_FOR: Duration = Duration::from_secs(2);

fn main() {
    let preempt = !std::env::args().any(|a| a == "--no-preempt");
    println!("=== uthread Preemption Example (preempt={}) ===\n", preempt);

    let start = Instant::now();
    let result = run(preempt, move || {
        create(move || {
            let mut last = 0;
            while !DONE.load(Ordering::SeqCst) {
                let ticks = TICKS.fetch_add(1, Ordering::SeqCst) + 1;
                if ticks - last >= 1_000_000 {
                    last = ticks;
                    // Printing takes the stdout lock; keep the timer out
                    without_preemption(|| println!("  counter at {} ms", start.elapsed().as_millis()));
                }
            }
        })
        .expect("create counter");

        // Never yields
        let mut spins: u64 = 0;
        while start.elapsed() < SPIN_FOR {
            spins = spins.wrapping_add(1);
            std::hint::spin_loop();
        }
        DONE.store(true, Ordering::SeqCst);

        without_preemption(|| println!("spinner done after {} spins", spins));
    });

    if let Err(e) = result {
        eprintln!("run failed: {}", e);
        std::process::exit(1);
    }

    println!("\ncounter advanced {} times while the spinner ran", TICKS.load(Ordering::SeqCst));
    println!("\n=== Example Complete ===");
}
