//! # Task Management System
//!
//! This module provides a small worker pool for executing chunk work (loading,
//! generating, saving) off the owning thread. Results come back to the owning
//! thread, which is the only place shared state is mutated.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, applied to a context on the
//!   owning thread, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the owning thread and one worker
//!
//! All workers report into a single result channel tagged with the worker's
//! index, so the owning thread can block on "the next result from anyone" with
//! a timeout.
//!
//! ## Inline Mode
//! A manager created with zero workers runs every task on the owning thread
//! at publish time and buffers its result. Results are still applied through
//! `process_completed_tasks()`, so callers see the same ordering either way.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks asynchronously and return results
//! 4. Results are applied on the owning thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks
//! 6. The cycle continues until all work is complete
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::<ChunkTable>::new(num_workers);
//!
//! // Publish a task for background processing
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // Once per tick:
//! task_manager.process_completed_tasks(&mut table);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use task::{Task, TaskResult};
use web_time::Instant;

/// Result channel tag for tasks that ran inline.
const INLINE_CHANNEL: usize = usize::MAX;

type BoxedTask<C> = Box<dyn Task<C> + Send>;
type TaggedResult<C> = (usize, Box<dyn TaskResult<C> + Send>);

/// Bookkeeping for a task a worker is currently processing.
struct InFlightTask {
    label: String,
    started: Instant,
    reported_stuck: bool,
}

/// A communication channel between the owning thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from the owning thread to the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `in_flight`: Labels and start times of those tasks, oldest first
/// - `worker`: Handle to the worker thread, joined on shutdown
pub struct TaskChannel<C> {
    task_sender: Sender<BoxedTask<C>>,
    num_tasks_in_flight: usize,
    in_flight: VecDeque<InFlightTask>,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and managing worker threads
/// - Distributing tasks across available workers
/// - Collecting results and applying them to the context `C`
/// - Handling task queuing when all workers are busy
/// - Reporting tasks that run for suspiciously long
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `result_receiver`: Results from every worker, tagged with the channel index
/// - `result_sender`: Kept so inline tasks can report through the same path
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
/// - `inline_results`: Results of inline tasks not yet applied
/// - `shut_down`: Set once the workers have been joined
pub struct TaskManager<C: 'static> {
    channels: Vec<TaskChannel<C>>,
    result_receiver: Receiver<TaggedResult<C>>,
    result_sender: Sender<TaggedResult<C>>,
    queued_tasks: VecDeque<BoxedTask<C>>,
    current_channel: usize,
    inline_results: usize,
    shut_down: bool,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// This is set to 1 to ensure tasks are processed in order within each channel
/// and that a busy worker never hoards work another worker could pick up.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<C: 'static> TaskManager<C> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. `0` runs every
    ///   task inline on the owning thread.
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new(num_workers: usize) -> Self {
        let (result_tx, result_rx) = channel::<TaggedResult<C>>();
        let mut channels = Vec::with_capacity(num_workers);

        for channel_idx in 0..num_workers {
            let (task_tx, task_rx) = channel::<BoxedTask<C>>();
            let worker_result_tx = result_tx.clone();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if worker_result_tx.send((channel_idx, result)).is_err() {
                        break;
                    }
                }
            };

            channels.push(TaskChannel {
                task_sender: task_tx,
                num_tasks_in_flight: 0,
                in_flight: VecDeque::new(),
                worker: Some(thread::spawn(task_closure)),
            });
        }

        if num_workers > 0 {
            info!(
                "Started {num_workers} chunk workers (available parallelism: {:?})",
                thread::available_parallelism()
            );
        } else {
            info!("Running chunk tasks inline");
        }

        TaskManager {
            channels,
            result_receiver: result_rx,
            result_sender: result_tx,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            inline_results: 0,
            shut_down: false,
        }
    }

    /// Number of worker threads. `0` means inline mode.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the send failed (the worker has exited)
    fn try_send_task(
        &mut self,
        task: BoxedTask<C>,
        channel_idx: usize,
    ) -> Result<(), BoxedTask<C>> {
        let label = task.label();
        let channel = &mut self.channels[channel_idx];
        match channel.task_sender.send(task) {
            Ok(_) => {
                channel.num_tasks_in_flight += 1;
                channel.in_flight.push_back(InFlightTask {
                    label,
                    started: Instant::now(),
                    reported_stuck: false,
                });
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// This implements a round-robin scheduling strategy starting from the last
    /// used channel to ensure even distribution of tasks across all workers.
    /// Channels that have reached their maximum number of in-flight tasks are
    /// skipped.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel;
        let mut current = start_channel;
        loop {
            if self.channels[current].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// The task will be executed as soon as a worker becomes available, or
    /// queued if all workers are busy. In inline mode it runs immediately.
    ///
    /// # Returns
    /// - `true` if the task was scheduled (or ran inline)
    /// - `false` if the task was queued because all workers are busy, or
    ///   dropped because the manager has shut down
    pub fn publish_task(&mut self, task: BoxedTask<C>) -> bool {
        if self.shut_down {
            warn!("Dropping task '{}' published after shutdown", task.label());
            return false;
        }

        if self.channels.is_empty() {
            let result = task.process();
            // The receiver lives in `self`, so this send cannot fail.
            let _ = self.result_sender.send((INLINE_CHANNEL, result));
            self.inline_results += 1;
            return true;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    warn!("Worker {channel_idx} is gone, queueing task");
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Processes any queued tasks if workers are available.
    ///
    /// Tasks are dispatched in FIFO order until the queue is empty or all
    /// workers are busy.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Applies every result that has already arrived, without blocking.
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_completed_tasks(&mut self, context: &mut C) -> usize {
        let mut handled = 0;
        while let Ok((channel_idx, result)) = self.result_receiver.try_recv() {
            self.apply(channel_idx, result, context);
            handled += 1;
        }
        self.process_queued_tasks();
        handled
    }

    /// Blocks until one result arrives or `timeout` elapses, and applies it.
    ///
    /// # Returns
    /// `true` if a result was applied, `false` on timeout or when nothing is
    /// outstanding.
    pub fn wait_for_result(&mut self, context: &mut C, timeout: Duration) -> bool {
        if self.is_idle() {
            return false;
        }
        match self.result_receiver.recv_timeout(timeout) {
            Ok((channel_idx, result)) => {
                self.apply(channel_idx, result, context);
                self.process_queued_tasks();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn apply(
        &mut self,
        channel_idx: usize,
        result: Box<dyn TaskResult<C> + Send>,
        context: &mut C,
    ) {
        if channel_idx == INLINE_CHANNEL {
            self.inline_results = self.inline_results.saturating_sub(1);
        } else if let Some(channel) = self.channels.get_mut(channel_idx) {
            channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
            channel.in_flight.pop_front();
        }
        for task in result.handle_result(context) {
            self.publish_task(task);
        }
    }

    /// Number of tasks currently running on workers.
    pub fn in_flight_count(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum()
    }

    /// Number of tasks waiting for a free worker.
    pub fn queued_count(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Returns `true` when no task is queued, running, or waiting to be applied.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.in_flight_count() == 0 && self.inline_results == 0
    }

    /// Logs a warning for every task that has been running longer than
    /// `threshold`. Each task is reported once.
    ///
    /// # Returns
    /// The number of tasks newly reported.
    pub fn warn_stuck_tasks(&mut self, threshold: Duration) -> usize {
        let mut reported = 0;
        for (channel_idx, channel) in self.channels.iter_mut().enumerate() {
            for task in channel.in_flight.iter_mut() {
                let elapsed = task.started.elapsed();
                if !task.reported_stuck && elapsed >= threshold {
                    warn!(
                        "Task '{}' on worker {channel_idx} has been running for {elapsed:?}",
                        task.label
                    );
                    task.reported_stuck = true;
                    reported += 1;
                }
            }
        }
        reported
    }

    /// Drops queued tasks, disconnects the workers and joins the idle ones.
    ///
    /// Workers still processing a task are detached instead of joined, so a
    /// task that never returns cannot hold up shutdown. Results that arrive
    /// afterwards are never applied.
    ///
    /// # Returns
    /// The number of workers that were detached.
    pub fn shutdown(&mut self) -> usize {
        if self.shut_down {
            return 0;
        }
        self.shut_down = true;
        if !self.queued_tasks.is_empty() {
            info!("Dropping {} queued tasks at shutdown", self.queued_tasks.len());
            self.queued_tasks.clear();
        }

        let mut detached = 0;
        for (channel_idx, channel) in self.channels.drain(..).enumerate() {
            let TaskChannel {
                task_sender,
                in_flight,
                worker,
                ..
            } = channel;
            drop(task_sender);
            let Some(worker) = worker else {
                continue;
            };
            match in_flight.front() {
                Some(task) if !worker.is_finished() => {
                    warn!(
                        "Detaching worker {channel_idx}, still running '{}' after {:?}",
                        task.label,
                        task.started.elapsed()
                    );
                    detached += 1;
                }
                _ => {
                    if worker.join().is_err() {
                        warn!("A chunk worker panicked");
                    }
                }
            }
        }
        detached
    }
}

impl<C: 'static> Drop for TaskManager<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square(u64);
    struct Squared(u64);

    impl Task<Vec<u64>> for Square {
        fn process(&self) -> Box<dyn TaskResult<Vec<u64>> + Send> {
            Box::new(Squared(self.0 * self.0))
        }
    }

    impl TaskResult<Vec<u64>> for Squared {
        fn handle_result(
            self: Box<Self>,
            context: &mut Vec<u64>,
        ) -> Vec<Box<dyn Task<Vec<u64>> + Send>> {
            context.push(self.0);
            // Squares of small numbers are squared again once.
            if self.0 < 10 {
                vec![Box::new(Square(self.0))]
            } else {
                Vec::new()
            }
        }
    }

    /// Blocks its worker until the gate's sender is dropped.
    struct Gated(Receiver<()>);

    impl Task<Vec<u64>> for Gated {
        fn process(&self) -> Box<dyn TaskResult<Vec<u64>> + Send> {
            let _ = self.0.recv();
            Box::new(Squared(100))
        }

        fn label(&self) -> String {
            String::from("gated")
        }
    }

    fn drain(manager: &mut TaskManager<Vec<u64>>, results: &mut Vec<u64>) {
        while !manager.is_idle() {
            manager.process_completed_tasks(results);
            manager.wait_for_result(results, Duration::from_secs(5));
        }
    }

    #[test]
    fn inline_mode_defers_results_until_processed() {
        let mut manager = TaskManager::new(0);
        let mut results = Vec::new();
        assert!(manager.publish_task(Box::new(Square(3))));
        assert!(results.is_empty());
        assert!(!manager.is_idle());

        drain(&mut manager, &mut results);
        assert_eq!(results, vec![9, 81]);
    }

    #[test]
    fn workers_process_every_task() {
        let mut manager = TaskManager::new(2);
        let mut results = Vec::new();
        for n in 2..=6 {
            manager.publish_task(Box::new(Square(n)));
        }
        assert!(manager.in_flight_count() <= 2 * MAX_TASKS_IN_FLIGHT);

        drain(&mut manager, &mut results);
        results.sort_unstable();
        assert_eq!(results, vec![4, 9, 16, 16, 25, 36, 81]);
        manager.shutdown();
    }

    #[test]
    fn tasks_after_shutdown_are_dropped() {
        let mut manager = TaskManager::<Vec<u64>>::new(1);
        assert_eq!(manager.shutdown(), 0);
        assert!(!manager.publish_task(Box::new(Square(2))));
        assert!(manager.is_idle());
    }

    #[test]
    fn long_running_tasks_are_reported_once() {
        let (release, gate) = channel();
        let mut manager = TaskManager::<Vec<u64>>::new(1);
        manager.publish_task(Box::new(Gated(gate)));
        assert_eq!(manager.warn_stuck_tasks(Duration::from_secs(60)), 0);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(manager.warn_stuck_tasks(Duration::from_millis(10)), 1);
        assert_eq!(manager.warn_stuck_tasks(Duration::from_millis(10)), 0);

        drop(release);
        let mut results = Vec::new();
        drain(&mut manager, &mut results);
        assert_eq!(results, vec![100]);
        assert_eq!(manager.shutdown(), 0);
    }

    #[test]
    fn shutdown_detaches_workers_that_never_finish() {
        let (release, gate) = channel();
        let mut manager = TaskManager::<Vec<u64>>::new(2);
        manager.publish_task(Box::new(Gated(gate)));
        manager.publish_task(Box::new(Square(20)));
        let mut results = Vec::new();
        while results.is_empty() {
            manager.wait_for_result(&mut results, Duration::from_secs(5));
        }

        let started = Instant::now();
        assert_eq!(manager.shutdown(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(release);
    }
}
