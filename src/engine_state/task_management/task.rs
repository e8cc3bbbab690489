//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which executes work on background threads and applies the outcome on the
//! thread that owns the engine state.
//!
//! ## Core Components
//! - `Task`: a unit of work run on a worker thread
//! - `TaskResult`: the outcome of a task, applied on the owning thread
//! - `TaskContext`: the mutable engine state a result may touch
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. Unless the task was abandoned, it returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the owning thread with a
//!    [`TaskContext`]
//!
//! ## Thread Safety
//! - `Task` and `TaskResult` must be `Send` to cross threads
//! - Results are the only way a task mutates engine state, so that state needs
//!   no locks beyond the ones on voxel data

use crate::{
    core::CancellationToken,
    engine_state::{
        buffer_state::GeometrySink, rendering::MeshManager, voxels::chunk_manager::ChunkManager,
    },
};

/// A unit of work that can be executed on a worker thread.
///
/// Tasks own everything they need, typically `Arc` handles to shared voxel
/// data, so they can outlive the frame that published them.
pub trait Task: Send {
    /// Runs the task.
    ///
    /// Returns `None` when the work turned out to be unnecessary (stale input)
    /// or was abandoned because `cancel` was raised.
    fn process(self: Box<Self>, cancel: &CancellationToken) -> Option<Box<dyn TaskResult>>;
}

/// The result of processing a [`Task`].
///
/// Results are applied one at a time on the thread that owns the engine state.
/// They must re-validate anything that may have changed while the task ran.
pub trait TaskResult: Send {
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>);
}

/// Engine state a [`TaskResult`] is allowed to mutate.
pub struct TaskContext<'a> {
    pub chunk_manager: &'a mut ChunkManager,
    pub mesh_manager: &'a mut MeshManager,
    pub sink: &'a mut dyn GeometrySink,
}
