//! Tick scheduler
//!
//! The host drives [`TickScheduler::tick`] once per game tick from its main
//! thread. Tasks run on that thread when they come due. Other threads can
//! hand work to the main thread with [`TickScheduler::run_on_main`], which
//! blocks the caller until the work has run or a timeout expires.

use crate::error::{Result, ScriptError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};
use std::time::Duration;
use trellis_core::{IdGenerator, Ticks};

/// Scheduled task ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

enum Job {
    Once(Box<dyn FnOnce() + Send>),
    Repeating(Box<dyn FnMut() + Send>),
}

struct Task {
    id: TaskId,
    due: u64,
    period: u64,
    job: Job,
}

type MainJob = Box<dyn FnOnce() + Send>;

pub struct TickScheduler {
    current_tick: AtomicU64,
    task_ids: IdGenerator<TaskId>,
    tasks: Mutex<Vec<Task>>,
    /// Tasks taken out of `tasks` by the tick in progress
    in_flight: Mutex<HashSet<TaskId>>,
    cancelled: Mutex<HashSet<TaskId>>,
    main_queue: Mutex<Vec<MainJob>>,
    main_thread: Mutex<Option<ThreadId>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            current_tick: AtomicU64::new(0),
            task_ids: IdGenerator::starting_at(1),
            tasks: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            cancelled: Mutex::new(HashSet::new()),
            main_queue: Mutex::new(Vec::new()),
            main_thread: Mutex::new(None),
        }
    }

    /// Declare the calling thread as the main thread
    pub fn bind_main_thread(&self) {
        *self.main_thread.lock() = Some(thread::current().id());
    }

    /// Whether the caller runs on the main thread. Before any thread is
    /// bound, every thread counts as main.
    pub fn is_main_thread(&self) -> bool {
        match *self.main_thread.lock() {
            Some(id) => id == thread::current().id(),
            None => true,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Run `job` once, `delay` ticks from now
    pub fn schedule_once(&self, delay: Ticks, job: impl FnOnce() + Send + 'static) -> TaskId {
        self.push(delay.get().max(1), 0, Job::Once(Box::new(job)))
    }

    /// Run `job` after `delay` ticks and then every `period` ticks
    pub fn schedule_repeating(&self, delay: Ticks, period: Ticks, job: impl FnMut() + Send + 'static) -> TaskId {
        self.push(delay.get().max(1), period.get().max(1), Job::Repeating(Box::new(job)))
    }

    fn push(&self, delay: u64, period: u64, job: Job) -> TaskId {
        let id = self
            .task_ids
            .next_id()
            .unwrap_or(TaskId(u64::MAX));
        let due = self.current_tick().saturating_add(delay);
        self.tasks.lock().push(Task { id, due, period, job });
        id
    }

    /// Cancel a task; a repeating task that is running right now finishes
    /// its current run. Unknown or finished tasks are ignored.
    pub fn cancel(&self, id: TaskId) {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before && self.in_flight.lock().contains(&id) {
            self.cancelled.lock().insert(id);
        }
    }

    /// Number of pending tasks
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Drop every pending task
    pub fn clear(&self) {
        self.tasks.lock().clear();
        self.main_queue.lock().clear();
    }

    /// Advance one tick: run handed-off work, then every task that is due.
    ///
    /// Tasks scheduled while ticking run on a later tick at the earliest.
    pub fn tick(&self) {
        self.run_main_queue();

        let now = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;
        let due: Vec<Task> = {
            let mut tasks = self.tasks.lock();
            let (due, pending): (Vec<Task>, Vec<Task>) =
                std::mem::take(&mut *tasks).into_iter().partition(|task| task.due <= now);
            *tasks = pending;
            self.in_flight.lock().extend(due.iter().map(|task| task.id));
            due
        };

        for task in due {
            let Task { id, period, job, .. } = task;
            // Cancelled by a task that ran earlier in this tick
            if self.cancelled.lock().remove(&id) {
                continue;
            }
            match job {
                Job::Once(job) => job(),
                Job::Repeating(mut job) => {
                    job();
                    if !self.cancelled.lock().remove(&id) {
                        self.tasks.lock().push(Task {
                            id,
                            due: now + period,
                            period,
                            job: Job::Repeating(job),
                        });
                    }
                }
            }
        }
        self.in_flight.lock().clear();
        self.cancelled.lock().clear();
    }

    /// Run work handed over from other threads
    pub fn run_main_queue(&self) {
        let jobs = std::mem::take(&mut *self.main_queue.lock());
        for job in jobs {
            job();
        }
    }

    /// Run `job` on the main thread and wait for its result.
    ///
    /// On the main thread the job runs immediately. Elsewhere the caller
    /// blocks until the next tick picks the job up, or fails with
    /// [`ScriptError::SyncTimeout`]. A timed-out job never runs; a job the
    /// main thread already started is waited for.
    pub fn run_on_main<R: Send + 'static>(
        &self,
        job: impl FnOnce() -> R + Send + 'static,
        timeout: Duration,
    ) -> Result<R> {
        if self.is_main_thread() {
            return Ok(job());
        }
        let (sender, receiver) = mpsc::sync_channel(1);
        // Set by whichever side gets there first: the main thread starting
        // the job or the caller giving up
        let claimed = Arc::new(AtomicBool::new(false));
        let main_claim = Arc::clone(&claimed);
        self.main_queue.lock().push(Box::new(move || {
            if main_claim.swap(true, Ordering::AcqRel) {
                tracing::debug!("Skipping handed-off work whose caller timed out");
                return;
            }
            let _ = sender.send(job());
        }));
        match receiver.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(_) if !claimed.swap(true, Ordering::AcqRel) => Err(ScriptError::SyncTimeout(timeout)),
            Err(_) => receiver.recv().map_err(|_| ScriptError::SyncTimeout(timeout)),
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickScheduler")
            .field("current_tick", &self.current_tick())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_runs_when_due() {
        let scheduler = TickScheduler::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        scheduler.schedule_once(Ticks::new(2), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_repeating_and_cancel() {
        let scheduler = TickScheduler::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let id = scheduler.schedule_repeating(Ticks::ONE, Ticks::new(2), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            scheduler.tick();
        }
        // ticks 1, 3 and 5
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        scheduler.cancel(id);
        for _ in 0..4 {
            scheduler.tick();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_run_on_main_from_other_thread() {
        let scheduler = Arc::new(TickScheduler::new());
        scheduler.bind_main_thread();

        let remote = Arc::clone(&scheduler);
        let handle = thread::spawn(move || remote.run_on_main(|| 21 * 2, Duration::from_secs(5)));

        while !handle.is_finished() {
            scheduler.tick();
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_run_on_main_times_out() {
        let scheduler = Arc::new(TickScheduler::new());
        scheduler.bind_main_thread();

        let remote = Arc::clone(&scheduler);
        let result = thread::spawn(move || remote.run_on_main(|| (), Duration::from_millis(20)))
            .join()
            .unwrap();
        assert!(matches!(result, Err(ScriptError::SyncTimeout(_))));
    }

    #[test]
    fn test_timed_out_handoff_never_runs() {
        let scheduler = Arc::new(TickScheduler::new());
        scheduler.bind_main_thread();
        let hits = Arc::new(AtomicU64::new(0));

        let remote = Arc::clone(&scheduler);
        let counter = Arc::clone(&hits);
        let result = thread::spawn(move || {
            remote.run_on_main(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                Duration::from_millis(20),
            )
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(ScriptError::SyncTimeout(_))));

        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_from_a_task_due_in_the_same_tick() {
        let scheduler = Arc::new(TickScheduler::new());
        let hits = Arc::new(AtomicU64::new(0));
        let victim = Arc::new(Mutex::new(None));

        let canceller = Arc::clone(&scheduler);
        let target = Arc::clone(&victim);
        scheduler.schedule_once(Ticks::ONE, move || {
            if let Some(id) = *target.lock() {
                canceller.cancel(id);
            }
        });
        let counter = Arc::clone(&hits);
        let id = scheduler.schedule_repeating(Ticks::ONE, Ticks::ONE, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock() = Some(id);

        scheduler.tick();
        scheduler.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancelling_unknown_tasks_leaves_no_trace() {
        let scheduler = TickScheduler::new();
        let id = scheduler.schedule_once(Ticks::ONE, || {});
        scheduler.tick();
        scheduler.cancel(id);
        scheduler.cancel(TaskId(9999));
        assert!(scheduler.cancelled.lock().is_empty());
        assert!(scheduler.in_flight.lock().is_empty());
    }

    #[test]
    fn test_main_thread_runs_inline() {
        let scheduler = TickScheduler::new();
        scheduler.bind_main_thread();
        assert!(scheduler.is_main_thread());
        assert_eq!(scheduler.run_on_main(|| "inline", Duration::ZERO).unwrap(), "inline");
    }
}
