//! Bounded worker pool over an indexed job list.
//!
//! A fixed number of scoped threads claim job indices from a shared atomic
//! counter until the list is exhausted or the cancel flag is set. The scope
//! join doubles as the wait-group: when `run_indexed` returns, every claimed
//! job has run to completion. No job is ever claimed twice.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Run `job(0..jobs)` on at most `workers` threads.
///
/// Setting `cancel` stops workers from claiming further indices; jobs already
/// claimed run to completion before the call returns.
pub fn run_indexed<F>(workers: usize, jobs: usize, cancel: &AtomicBool, job: F)
where
    F: Fn(usize) + Sync,
{
    if jobs == 0 {
        return;
    }
    let workers = workers.clamp(1, jobs);
    let next = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while !cancel.load(Ordering::Relaxed) {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= jobs {
                        break;
                    }
                    job(i);
                }
            });
        }
    });
}
