//! Timer preemption: a thread that never yields still shares the CPU
//!
//! Code running with preemption on sticks to atomics and spinning; it
//! neither allocates nor prints while it can be interrupted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uthread::{create, run, run_with_config, without_preemption, RuntimeConfig};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

static SPINS: AtomicU64 = AtomicU64::new(0);
static SIBLING_RUNS: AtomicU64 = AtomicU64::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

const DEADLINE: Duration = Duration::from_secs(10);

fn reset() {
    SPINS.store(0, Ordering::SeqCst);
    SIBLING_RUNS.store(0, Ordering::SeqCst);
    DONE.store(false, Ordering::SeqCst);
}

/// Counts one run each time it gets the CPU while the spinner progressed
fn sibling() {
    while !DONE.load(Ordering::SeqCst) {
        SIBLING_RUNS.fetch_add(1, Ordering::SeqCst);
        let seen = SPINS.load(Ordering::SeqCst);
        while SPINS.load(Ordering::SeqCst) == seen && !DONE.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
    }
}

/// Never yields; stops once the sibling ran `target` times or on deadline
fn spin_until_sibling_runs(target: u64) {
    let deadline = Instant::now() + DEADLINE;
    while SIBLING_RUNS.load(Ordering::SeqCst) < target && Instant::now() < deadline {
        SPINS.fetch_add(1, Ordering::SeqCst);
    }
    DONE.store(true, Ordering::SeqCst);
}

#[test]
fn test_spinning_thread_is_preempted() {
    let _g = serial();
    reset();

    let result = run(true, || {
        create(sibling).unwrap();
        spin_until_sibling_runs(3);
    });

    assert_eq!(result, Ok(()));
    assert!(SIBLING_RUNS.load(Ordering::SeqCst) >= 3);
}

#[test]
fn test_high_frequency_timer() {
    let _g = serial();
    reset();

    let config = RuntimeConfig::new().stack_size(64 * 1024).preempt_hz(1000);
    let result = run_with_config(config, true, || {
        for _ in 0..3 {
            create(sibling).unwrap();
        }
        spin_until_sibling_runs(20);
    });

    assert_eq!(result, Ok(()));
    assert!(SIBLING_RUNS.load(Ordering::SeqCst) >= 20);
}

#[test]
fn test_cooperative_mode_never_preempts() {
    let _g = serial();
    reset();

    let result = run(false, || {
        create(sibling).unwrap();
        for _ in 0..5_000_000 {
            SPINS.fetch_add(1, Ordering::SeqCst);
        }
        let quiet = SIBLING_RUNS.load(Ordering::SeqCst) == 0;
        DONE.store(true, Ordering::SeqCst);
        SPINS.store(u64::from(quiet), Ordering::SeqCst);
    });

    assert_eq!(result, Ok(()));
    assert_eq!(SPINS.load(Ordering::SeqCst), 1, "sibling ran before the spinner yielded");
}

#[test]
fn test_without_preemption_section() {
    let _g = serial();
    reset();

    static RUNS_DURING: AtomicU64 = AtomicU64::new(u64::MAX);

    let result = run(true, || {
        create(sibling).unwrap();

        // Masked: the sibling cannot run however long we spin
        without_preemption(|| {
            let until = Instant::now() + Duration::from_millis(100);
            while Instant::now() < until {
                SPINS.fetch_add(1, Ordering::SeqCst);
            }
            RUNS_DURING.store(SIBLING_RUNS.load(Ordering::SeqCst), Ordering::SeqCst);
        });

        spin_until_sibling_runs(1);
    });

    assert_eq!(result, Ok(()));
    assert_eq!(RUNS_DURING.load(Ordering::SeqCst), 0);
    assert!(SIBLING_RUNS.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_panic_under_preemption_is_contained() {
    let _g = serial();
    reset();

    static PANICKER_RAN: AtomicBool = AtomicBool::new(false);
    PANICKER_RAN.store(false, Ordering::SeqCst);

    let config = RuntimeConfig::new().stack_size(64 * 1024).preempt_hz(1000);
    let result = run_with_config(config, true, || {
        create(sibling).unwrap();
        create(|| {
            for _ in 0..100_000 {
                SPINS.fetch_add(1, Ordering::SeqCst);
            }
            PANICKER_RAN.store(true, Ordering::SeqCst);
            panic!("worker failure");
        })
        .unwrap();
        spin_until_sibling_runs(10);
    });

    assert_eq!(result, Ok(()));
    assert!(PANICKER_RAN.load(Ordering::SeqCst));
    assert!(SIBLING_RUNS.load(Ordering::SeqCst) >= 10);
}
