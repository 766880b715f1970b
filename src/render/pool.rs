//! Fixed-size worker pool with a priority-ordered queue.
//!
//! Jobs wait in a binary heap keyed by `(priority, submission sequence)`, so
//! a free worker always takes the most urgent job and, within a tier, the
//! oldest one. Running jobs are never preempted.

use crate::model::EngineError;
use crate::view_state::RenderPriority;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default number of render workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedJob {
    priority: RenderPriority,
    seq: u64,
    job: Job,
}

// BinaryHeap is a max-heap: "greater" means "runs first".
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

#[derive(Default)]
struct PoolQueue {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    active: usize,
    shutdown: bool,
}

impl PoolQueue {
    fn is_idle(&self) -> bool {
        self.heap.is_empty() && self.active == 0
    }
}

#[derive(Default)]
struct PoolShared {
    queue: Mutex<PoolQueue>,
    work_ready: Condvar,
    idle: Condvar,
}

/// Bounded pool of render threads.
///
/// Dropping the pool discards queued jobs and joins every worker after its
/// current job finishes.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers (at least one).
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        let concurrency = concurrency.max(1);
        let mut pool = Self {
            shared: Arc::new(PoolShared::default()),
            workers: Vec::with_capacity(concurrency),
        };
        for index in 0..concurrency {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("chunkview-render-{index}"))
                .spawn(move || worker_loop(index, &shared))
                .map_err(|source| EngineError::WorkerSpawn { index, source })?;
            pool.workers.push(handle);
        }
        tracing::debug!(target: "render.pool", concurrency, "worker_pool_started");
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Returns `false` if the pool is shutting down.
    pub(crate) fn submit(&self, priority: RenderPriority, job: Job) -> bool {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return false;
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(QueuedJob { priority, seq, job });
        drop(queue);
        self.shared.work_ready.notify_one();
        true
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().heap.len()
    }

    /// Block until the queue is empty and no job is running.
    pub fn wait_idle(&self) {
        let mut queue = self.shared.queue.lock();
        while !queue.is_idle() && !queue.shutdown {
            self.shared.idle.wait(&mut queue);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            queue.heap.clear();
        }
        self.shared.work_ready.notify_all();
        self.shared.idle.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!(target: "render.pool", "worker_join_failed");
            }
        }
    }
}

fn worker_loop(index: usize, shared: &PoolShared) {
    loop {
        let queued = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(queued) = queue.heap.pop() {
                    queue.active += 1;
                    break queued;
                }
                shared.work_ready.wait(&mut queue);
            }
        };

        let QueuedJob { priority, seq, job } = queued;
        tracing::trace!(
            target: "render.pool",
            worker = index,
            priority = priority.as_str(),
            seq,
            "job_started"
        );
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(
                target: "render.pool",
                worker = index,
                priority = priority.as_str(),
                "job_panicked"
            );
        }

        let mut queue = shared.queue.lock();
        queue.active -= 1;
        if queue.is_idle() {
            shared.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn zero_concurrency_still_spawns_one_worker() {
        let pool = WorkerPool::new(0).expect("pool");
        assert_eq!(pool.concurrency(), 1);
    }

    #[test]
    fn wait_idle_returns_after_all_jobs_ran() {
        let pool = WorkerPool::new(3).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(
                RenderPriority::Normal,
                Box::new(move || {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                }),
            );
        }
        pool.wait_idle();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 50);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn queued_jobs_run_most_urgent_first() {
        let pool = WorkerPool::new(1).expect("pool");
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        // Occupy the only worker so the rest queue up.
        pool.submit(
            RenderPriority::Immediate,
            Box::new(move || {
                let _ = gate_rx.recv();
            }),
        );
        for (label, priority) in [
            ("low", RenderPriority::Low),
            ("normal", RenderPriority::Normal),
            ("immediate", RenderPriority::Immediate),
            ("high", RenderPriority::High),
            ("low-2", RenderPriority::Low),
        ] {
            let order = Arc::clone(&order);
            pool.submit(priority, Box::new(move || order.lock().push(label)));
        }
        drop(gate_tx);
        pool.wait_idle();

        assert_eq!(
            *order.lock(),
            vec!["immediate", "high", "normal", "low", "low-2"]
        );
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1).expect("pool");
        pool.submit(RenderPriority::High, Box::new(|| panic!("render blew up")));
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        pool.submit(
            RenderPriority::High,
            Box::new(move || {
                flag.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        pool.wait_idle();
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    }
}
