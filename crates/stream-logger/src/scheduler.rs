//! Background sync timer.
//!
//! The scheduler is a two-state machine. While running it owns one task on a
//! small private runtime that sleeps for the sync period, runs a cycle on the
//! blocking pool, and sleeps again. Stopping aborts the task; a cycle that is
//! already running finishes. Rescheduling is an abort followed by a new task.

use crate::logger::Shared;
use crate::{Logger, LoggerResult};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error};

enum SchedulerState {
    Stopped,
    Running {
        task: JoinHandle<()>,
        period: Duration,
        generation: u64,
    },
}

pub(crate) struct Scheduler {
    runtime: Option<Runtime>,
    state: SchedulerState,
    generation: u64,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            runtime: None,
            state: SchedulerState::Stopped,
            generation: 0,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    pub(crate) fn period(&self) -> Option<Duration> {
        match self.state {
            SchedulerState::Running { period, .. } => Some(period),
            SchedulerState::Stopped => None,
        }
    }

    /// Enter the running state with a fresh timer, replacing any current one.
    pub(crate) fn arm(&mut self, shared: Weak<Shared>, period: Duration) -> LoggerResult<()> {
        self.disarm();

        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => build_runtime()?,
        };
        self.generation += 1;
        let generation = self.generation;
        let task = runtime.spawn(run_periodic(shared, period, generation));
        self.runtime = Some(runtime);

        debug!(generation, period_secs = period.as_secs_f64(), "Armed sync timer");
        self.state = SchedulerState::Running {
            task,
            period,
            generation,
        };
        Ok(())
    }

    /// Enter the stopped state. Returns whether a timer was cancelled.
    pub(crate) fn disarm(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SchedulerState::Stopped) {
            SchedulerState::Running { task, .. } => {
                task.abort();
                true
            }
            SchedulerState::Stopped => false,
        }
    }

    /// Mark the timer of `generation` as gone, if it is still the current one.
    fn halt(&mut self, generation: u64) {
        if matches!(self.state, SchedulerState::Running { generation: current, .. } if current == generation)
        {
            self.state = SchedulerState::Stopped;
        }
    }

    /// Stop and tear down the runtime without waiting for it.
    pub(crate) fn shutdown(&mut self) {
        self.disarm();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(1)
        .thread_name("stream-logger-sync")
        .enable_time()
        .build()
}

async fn run_periodic(shared: Weak<Shared>, period: Duration, generation: u64) {
    loop {
        tokio::time::sleep(period).await;

        let cycle_shared = shared.clone();
        let joined = tokio::task::spawn_blocking(move || match cycle_shared.upgrade() {
            Some(shared) => {
                Logger::from_shared(shared).run_scheduled_cycle();
                true
            }
            None => false,
        })
        .await;

        match joined {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) if err.is_panic() => {
                error!(generation, "Sync failure handler panicked, stopping background sync");
                if let Some(shared) = shared.upgrade() {
                    shared.sync.lock().scheduler.halt(generation);
                }
                return;
            }
            Err(_) => return,
        }
    }
}
