use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, error, info, info_span, warn};

use super::job::{JobRunStatus, JobStatusView, ScheduledTask, TriggerOutcome};
use crate::error::SchedulerError;

#[derive(Debug, Default)]
struct JobState {
    last_status: Option<JobRunStatus>,
    last_run_started_at: Option<DateTime<Utc>>,
    last_run_finished_at: Option<DateTime<Utc>>,
    next_run_eta: Option<DateTime<Utc>>,
    run_count: u64,
    last_error: Option<String>,
}

struct JobSlot {
    name: String,
    interval: Duration,
    task: Arc<dyn ScheduledTask>,
    running: AtomicBool,
    dropped: AtomicU64,
    state: Mutex<JobState>,
}

impl JobSlot {
    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle → Running, or count the drop
    fn try_start(self: &Arc<Self>) -> Option<RunGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(job = %self.name, dropped_triggers = dropped, "Job still running, dropping trigger");
            return None;
        }
        let mut state = self.state();
        state.last_status = Some(JobRunStatus::Running);
        state.last_run_started_at = Some(Utc::now());
        Some(RunGuard { slot: Arc::clone(self), finished: false })
    }

    fn view(&self) -> JobStatusView {
        let state = self.state();
        JobStatusView {
            name: self.name.clone(),
            interval_secs: self.interval.as_secs(),
            running: self.running.load(Ordering::Acquire),
            last_status: state.last_status,
            last_run_started_at: state.last_run_started_at,
            last_run_finished_at: state.last_run_finished_at,
            next_run_eta: state.next_run_eta,
            dropped_triggers: self.dropped.load(Ordering::Relaxed),
            run_count: state.run_count,
            last_error: state.last_error.clone(),
        }
    }
}

/// Returns the job to Idle. A guard dropped without `finish` (panic or
/// cancellation) records the run as failed.
struct RunGuard {
    slot: Arc<JobSlot>,
    finished: bool,
}

impl RunGuard {
    fn finish(mut self, result: eyre::Result<()>) {
        match result {
            Ok(()) => self.complete(JobRunStatus::Success, None),
            Err(e) => {
                error!(job = %self.slot.name, error = ?e, "Job run failed");
                self.complete(JobRunStatus::Failed, Some(format!("{:#}", e)));
            }
        }
    }

    fn complete(&mut self, status: JobRunStatus, last_error: Option<String>) {
        self.finished = true;
        {
            let mut state = self.slot.state();
            state.last_status = Some(status);
            state.last_run_finished_at = Some(Utc::now());
            state.run_count += 1;
            state.last_error = last_error;
        }
        self.slot.running.store(false, Ordering::Release);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(job = %self.slot.name, "Job run aborted before completion");
            self.complete(JobRunStatus::Failed, Some("run aborted".to_string()));
        }
    }
}

async fn execute(slot: Arc<JobSlot>, guard: RunGuard) {
    let span = info_span!("job_run", job = %slot.name, on_close = true);
    let result = slot.task.run().instrument(span).await;
    guard.finish(result);
}

/// Registered jobs, owned by the composition root and shared by reference
/// with whatever triggers them (interval workers, API, CLI, tests).
#[derive(Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<JobSlot>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        task: Arc<dyn ScheduledTask>,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        let slot = JobSlot {
            name: name.clone(),
            interval,
            task,
            running: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            state: Mutex::new(JobState::default()),
        };
        info!(job = %name, interval_secs = interval.as_secs(), "Registered job");
        self.jobs.insert(name, Arc::new(slot));
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.keys().map(String::as_str).collect()
    }

    fn slot(&self, name: &str) -> Result<&Arc<JobSlot>, SchedulerError> {
        self.jobs
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))
    }

    /// Starts a run in the background unless one is already in flight
    pub fn trigger(&self, name: &str) -> Result<TriggerOutcome, SchedulerError> {
        let slot = self.slot(name)?;
        Ok(match slot.try_start() {
            Some(guard) => {
                tokio::spawn(execute(Arc::clone(slot), guard));
                TriggerOutcome::Started
            }
            None => TriggerOutcome::Dropped,
        })
    }

    /// Runs the job on the current task and waits for it to finish
    pub async fn run_once(&self, name: &str) -> Result<TriggerOutcome, SchedulerError> {
        let slot = self.slot(name)?;
        match slot.try_start() {
            Some(guard) => {
                execute(Arc::clone(slot), guard).await;
                Ok(TriggerOutcome::Started)
            }
            None => Ok(TriggerOutcome::Dropped),
        }
    }

    /// One interval worker per job. The first tick fires immediately. Workers
    /// stop when `shutdown` flips to true or its sender is dropped; runs
    /// already in flight are left to finish.
    pub fn spawn_workers(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.jobs
            .values()
            .map(|slot| {
                let slot = Arc::clone(slot);
                let mut shutdown = shutdown.clone();
                slot.state().next_run_eta = Some(Utc::now());
                tokio::spawn(async move {
                    let mut ticker = interval(slot.interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    info!(job = %slot.name, interval_secs = slot.interval.as_secs(), "Starting job worker");
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                let next = chrono::Duration::from_std(slot.interval)
                                    .ok()
                                    .and_then(|d| Utc::now().checked_add_signed(d));
                                slot.state().next_run_eta = next;
                                if let Some(guard) = slot.try_start() {
                                    tokio::spawn(execute(Arc::clone(&slot), guard));
                                }
                            }
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    info!(job = %slot.name, "Stopping job worker");
                                    break;
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }

    pub fn status(&self) -> BTreeMap<String, JobStatusView> {
        self.jobs
            .iter()
            .map(|(name, slot)| (name.clone(), slot.view()))
            .collect()
    }

    pub fn job_status(&self, name: &str) -> Result<JobStatusView, SchedulerError> {
        Ok(self.slot(name)?.view())
    }
}
