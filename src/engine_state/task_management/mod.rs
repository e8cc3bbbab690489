//! # Task Management System
//!
//! This module runs [`Task`]s on a fixed pool of named worker threads and hands
//! their [`TaskResult`]s back to the owning thread.
//!
//! ## Architecture Overview
//! - `TaskManager`: owns the worker threads, the shared task queue and the result
//!   queue
//! - `Task`: a unit of work executed on a worker
//! - `TaskResult`: the outcome of a task, applied on the owning thread
//!
//! All workers pull from a single unbounded `crossbeam_channel` queue, so an idle
//! worker always picks up the next task and no round-robin bookkeeping is needed.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The first idle worker receives it and calls `Task::process`
//! 3. A returned result goes onto the result queue
//! 4. The owning thread drains results with `TaskManager::drain_results()` and
//!    applies them
//!
//! ## Shutdown
//! Shutting down raises the shared [`CancellationToken`], closes the task queue
//! and joins every worker. Queued tasks are discarded; tasks already running
//! observe the token and return early.
//!
//! ## Example Usage
//! ```
//! use voxel_stream::core::CancellationToken;
//! use voxel_stream::engine_state::task_management::{
//!     task::{Task, TaskContext, TaskResult},
//!     TaskManager,
//! };
//!
//! struct Noop;
//!
//! impl Task for Noop {
//!     fn process(self: Box<Self>, _cancel: &CancellationToken) -> Option<Box<dyn TaskResult>> {
//!         None
//!     }
//! }
//!
//! let task_manager = TaskManager::new(2);
//! task_manager.publish_task(Box::new(Noop));
//! while !task_manager.is_idle() {
//!     std::thread::yield_now();
//! }
//! assert!(task_manager.drain_results().is_empty());
//! ```

pub mod task;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};
use task::{Task, TaskResult};

use crate::core::CancellationToken;

/// Manages a pool of worker threads and coordinates task execution.
pub struct TaskManager {
    task_sender: Option<Sender<Box<dyn Task>>>,
    result_receiver: Receiver<Box<dyn TaskResult>>,
    workers: Vec<JoinHandle<()>>,
    /// Tasks published but not yet finished by a worker
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl TaskManager {
    /// Creates a new `TaskManager` with `num_workers` worker threads (at least one).
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let (task_sender, task_receiver) = unbounded::<Box<dyn Task>>();
        let (result_sender, result_receiver) = unbounded::<Box<dyn TaskResult>>();
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        info!(
            "Available parallelism: {:?}, spawning {} workers",
            thread::available_parallelism(),
            num_workers
        );

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let task_receiver = task_receiver.clone();
            let result_sender = result_sender.clone();
            let pending = pending.clone();
            let cancel = cancel.clone();

            let task_closure = move || {
                while let Ok(task) = task_receiver.recv() {
                    if !cancel.is_cancelled() {
                        if let Some(result) = task.process(&cancel) {
                            let _ = result_sender.send(result);
                        }
                    }
                    // Decrement after sending so an idle manager has every result queued.
                    pending.fetch_sub(1, Ordering::AcqRel);
                }
                debug!("Worker {} stopped", index);
            };

            match thread::Builder::new()
                .name(format!("voxel-worker-{index}"))
                .spawn(task_closure)
            {
                Ok(worker) => workers.push(worker),
                Err(error) => error!("Failed to spawn worker {}: {}", index, error),
            }
        }

        TaskManager {
            task_sender: Some(task_sender),
            result_receiver,
            workers,
            pending,
            cancel,
        }
    }

    /// Queues a task for the next idle worker.
    ///
    /// Returns `false` if the manager is shut down (or has no workers) and the
    /// task was dropped.
    pub fn publish_task(&self, task: Box<dyn Task>) -> bool {
        if self.workers.is_empty() {
            return false;
        }
        let Some(sender) = &self.task_sender else {
            return false;
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Takes every result that is ready without blocking.
    pub fn drain_results(&self) -> Vec<Box<dyn TaskResult>> {
        self.result_receiver.try_iter().collect()
    }

    /// Number of published tasks not yet finished by a worker.
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// `true` when no task is queued or running and no result is waiting.
    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == 0 && self.result_receiver.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels outstanding work and joins every worker.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.task_sender = None;

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("A worker thread panicked before shutdown");
            }
        }
        // Results of tasks that finished during shutdown are never applied.
        self.result_receiver.try_iter().for_each(drop);
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
