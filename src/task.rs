//! Aggregate of Jobs sharing lifecycle and completion callbacks (spec §3).

use std::sync::Arc;
use std::time::SystemTime;

use crate::job::StdioTarget;

/// Capability object for task-level lifecycle hooks, mirroring
/// [`crate::job::Callbacks`]. Runs on the supervisor thread.
pub trait TaskCallbacks: Send + Sync {
    fn on_start(&self, _task: &Task) {}
    fn on_done(&self, _task: &Task) {}
}

pub struct NoopTaskCallbacks;
impl TaskCallbacks for NoopTaskCallbacks {}

pub struct Task {
    pub name: String,
    pub timeout_s: f64,
    pub callbacks: Arc<dyn TaskCallbacks>,
    pub stdout: StdioTarget,
    pub stderr: StdioTarget,

    pub tstart: Option<SystemTime>,
    pub tstop: Option<SystemTime>,
    /// Jobs ever attached to this task.
    pub num_added: u64,
    /// Jobs that finished successfully (`rcode == 0`).
    pub num_done: u64,
    /// Jobs that were terminated (timeout without restart, eviction,
    /// shutdown).
    pub num_term: u64,
    started: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            timeout_s: 0.0,
            callbacks: Arc::new(NoopTaskCallbacks),
            stdout: StdioTarget::Null,
            stderr: StdioTarget::Null,
            tstart: None,
            tstop: None,
            num_added: 0,
            num_done: 0,
            num_term: 0,
            started: false,
        }
    }

    /// Attach a job: increments `num_added`. Does not itself start the task
    /// clock — that happens when the job's `on_start` fires, via
    /// [`Task::mark_started`].
    pub fn attach_job(&mut self) {
        self.num_added += 1;
    }

    /// Called once, the first time any attached job enters the active set.
    pub fn mark_started(&mut self) {
        if !self.started {
            self.started = true;
            self.tstart = Some(SystemTime::now());
            self.callbacks.on_start(self);
        }
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn record_job_done(&mut self) {
        self.num_done += 1;
        self.maybe_complete();
    }

    pub fn record_job_terminated(&mut self) {
        self.num_term += 1;
        self.maybe_complete();
    }

    fn maybe_complete(&mut self) {
        if self.is_complete() && self.tstop.is_none() {
            self.tstop = Some(SystemTime::now());
            self.callbacks.on_done(self);
        }
    }

    /// Invariant 3/5: completed once every attached job has finished (done
    /// or terminated), with no pending jobs remaining.
    pub fn is_complete(&self) -> bool {
        self.num_added > 0 && self.num_done + self.num_term >= self.num_added
    }
}

/// Builder for a [`Task`], mirroring [`crate::job::JobBuilder`].
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TaskBuilder {
            task: Task::new(name),
        }
    }

    pub fn timeout_s(mut self, timeout_s: f64) -> Self {
        self.task.timeout_s = timeout_s;
        self
    }

    pub fn callbacks(mut self, cb: Arc<dyn TaskCallbacks>) -> Self {
        self.task.callbacks = cb;
        self
    }

    pub fn stdout(mut self, target: StdioTarget) -> Self {
        self.task.stdout = target;
        self
    }

    pub fn stderr(mut self, target: StdioTarget) -> Self {
        self.task.stderr = target;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
