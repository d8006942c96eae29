//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which provides a framework for executing work asynchronously across multiple threads.
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed asynchronously
//! - `TaskResult`: Represents the result of a completed task
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the owning thread with
//!    mutable access to the context `C`
//! 5. The result can spawn new tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the owning thread
//! - The context `C` never leaves the owning thread, so it needs no locking

/// A unit of work that can be executed on a worker thread.
///
/// Tasks own everything they need (shared, immutable services behind `Arc`
/// plus their own input data). They never touch the context directly; all
/// state changes happen when their result is handled.
pub trait Task<C>: Send {
    /// Processes the task and returns a result.
    ///
    /// Runs on a background thread (or inline when the pool has no workers).
    /// Errors are captured inside the result rather than propagated, since
    /// only the owning thread can decide how to recover.
    fn process(&self) -> Box<dyn TaskResult<C> + Send>;

    /// Short human-readable description used in stuck-task warnings.
    fn label(&self) -> String {
        String::from("task")
    }
}

/// The result of processing a [`Task`].
///
/// Results are handled on the owning thread, one at a time, in arrival order.
pub trait TaskResult<C>: Send {
    /// Applies the result to the context.
    ///
    /// # Returns
    /// Follow-up tasks to schedule (usually empty).
    fn handle_result(self: Box<Self>, context: &mut C) -> Vec<Box<dyn Task<C> + Send>>;
}
