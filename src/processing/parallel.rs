// src/processing/parallel.rs
use std::{num::NonZero, thread};

use flume::{Receiver, Sender};
use tracing::debug;

/// Bounded pool of scoped worker threads fed through a `flume` channel.
///
/// Each job runs to completion independently: a job returning an error has no
/// effect on its siblings. Results come back in the order workers finish.
pub struct ParallelProcessor {
    workers: usize,
}

impl ParallelProcessor {
    pub fn new(workers: Option<usize>) -> Self {
        let workers = workers.filter(|&n| n > 0).unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZero::get)
                .unwrap_or(4)
                .max(4)
        });

        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` over every item and return `(input position, output)` pairs
    /// in completion order.
    pub fn process<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<(usize, R)>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }
        let threads = self.workers.min(total);
        debug!(jobs = total, threads, "dispatching to worker pool");

        let (req_tx, req_rx): (Sender<(usize, T)>, Receiver<(usize, T)>) = flume::unbounded();
        let (res_tx, res_rx) = flume::unbounded();

        for (idx, item) in items.into_iter().enumerate() {
            // Receiver is alive until the scope below ends
            let _ = req_tx.send((idx, item));
        }
        drop(req_tx);

        let job = &job;
        thread::scope(|scope| {
            for _ in 0..threads {
                let req_rx = req_rx.clone();
                let res_tx = res_tx.clone();
                scope.spawn(move || {
                    for (idx, item) in req_rx {
                        let _ = res_tx.send((idx, job(item)));
                    }
                });
            }
        });
        drop(res_tx);

        res_rx.into_iter().collect()
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_item_is_processed_once() {
        let pool = ParallelProcessor::new(Some(3));
        let mut out = pool.process((0..20).collect(), |x: u32| x * 2);
        out.sort_by_key(|(idx, _)| *idx);

        assert_eq!(out.len(), 20);
        for (idx, value) in out {
            assert_eq!(value, idx as u32 * 2);
        }
    }

    #[test]
    fn failures_do_not_stop_siblings() {
        let pool = ParallelProcessor::new(Some(2));
        let out = pool.process(vec![1, 0, 4], |x: i32| if x == 0 { Err("zero") } else { Ok(8 / x) });

        assert_eq!(out.iter().filter(|(_, r)| r.is_ok()).count(), 2);
        assert_eq!(out.iter().filter(|(_, r)| r.is_err()).count(), 1);
    }

    #[test]
    fn zero_workers_falls_back_to_default() {
        assert!(ParallelProcessor::new(Some(0)).workers() >= 4);
        assert!(ParallelProcessor::new(None).workers() >= 4);
        assert!(pool_is_empty_safe());
    }

    fn pool_is_empty_safe() -> bool {
        ParallelProcessor::new(Some(2)).process(Vec::<u8>::new(), |x| x).is_empty()
    }
}
