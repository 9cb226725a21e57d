//! Fixed-size worker pool over an unbounded FIFO task queue.
//!
//! Producers (the watcher callback) submit boxed closures; workers pull
//! them in submission order, though completion order across workers is
//! not deterministic. `wait` blocks until the queue is empty and every
//! worker is idle; `destroy` signals shutdown and joins the threads. A
//! panicking task is logged and dropped without taking the pool down.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::{BigsiError, Result};

/// Default number of worker threads.
pub const DEFAULT_POOL_SIZE: usize = 4;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Task>,
    active: usize,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_available: Condvar,
    all_idle: Condvar,
}

struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(id: usize, shared: Arc<PoolShared>) -> Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("bigsid-worker-{}", id))
            .spawn(move || worker_loop(id, shared))
            .map_err(|e| BigsiError::Thread(format!("could not spawn worker {}: {}", id, e)))?;
        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }
}

fn worker_loop(id: usize, shared: Arc<PoolShared>) {
    loop {
        let task = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if let Some(task) = state.queue.pop_front() {
                    state.active += 1;
                    break Some(task);
                }
                if state.shutdown {
                    break None;
                }
                state = shared.work_available.wait(state).unwrap();
            }
        };

        let Some(task) = task else { break };

        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("worker {}: task panicked, continuing", id);
        }

        let idle = {
            let mut state = shared.state.lock().unwrap();
            state.active -= 1;
            state.queue.is_empty() && state.active == 0
        };
        if idle {
            shared.all_idle.notify_all();
        }
    }
    debug!("worker {} exiting", id);
}

/// A pool of `size` OS threads sharing one FIFO queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<WorkerPool> {
        if size == 0 {
            return Err(BigsiError::invalid("worker pool needs at least one thread"));
        }
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                shutdown: false,
            }),
            work_available: Condvar::new(),
            all_idle: Condvar::new(),
        });
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::spawn(id, Arc::clone(&shared))?);
        }
        Ok(WorkerPool { shared, workers })
    }

    /// Enqueue a task. FIFO relative to other submissions.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock().unwrap();
        if state.shutdown {
            warn!("task submitted after pool shutdown, dropping");
            return;
        }
        state.queue.push_back(Box::new(task));
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Block until the queue is empty and every worker is idle.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while !(state.queue.is_empty() && state.active == 0) {
            state = self.shared.all_idle.wait(state).unwrap();
        }
    }

    /// Signal shutdown and join every worker.
    pub fn destroy(mut self) -> Result<()> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        self.shared.work_available.notify_all();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                thread
                    .join()
                    .map_err(|_| BigsiError::Thread(format!("worker {} panicked", worker.id)))?;
            }
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.workers.iter().any(|w| w.thread.is_some()) {
            if let Err(e) = self.shutdown_and_join() {
                warn!("worker pool teardown: {}", e);
            }
        }
    }
}
