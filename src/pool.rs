//! The supervisor: waiting queue, active set, admission, eviction, chained
//! rescheduling, promotion, shutdown (spec §4.4).
//!
//! The pool itself is single-threaded and cooperative — one call into
//! `execute`/`join` owns all mutation of `waiting`, `active`, and Task
//! counters, matching the concurrency model in spec §5. Children are OS
//! processes (`job::Job`), never threads.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::affinity::AffinityMap;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::job::{
    evict_chain, Job, JobPhase, OnTimeout, PollOutcome, Size, StdioTarget, TerminationReason,
};
use crate::memory::MemoryProbe;
use crate::snapshot::{PoolSnapshot, SnapshotEntry};
use crate::task::Task;

/// Weight given to the previous `vmem_smooth` sample vs. the new one.
/// `vmem_smooth = max(sample, ALPHA * vmem_smooth + (1 - ALPHA) * sample)`.
const VMEM_SMOOTH_ALPHA: f64 = 0.7;

pub struct ExecPool {
    config: PoolConfig,
    affinity: AffinityMap,
    memory_probe: MemoryProbe,

    /// Dynamically reduced on memory pressure, never below 1 (invariant 1).
    cur_wks_num: usize,
    /// Fixed-size, indexed by worker slot; `None` means the slot is free.
    active: Vec<Option<Job>>,
    waiting: VecDeque<Job>,
    finished: Vec<Job>,

    tasks: HashMap<String, Task>,
    submitted_names: HashSet<String>,
    /// Per-category (size, vmem_smooth) pairs of finished Jobs, used for
    /// predicted-vmem lookups on new admissions.
    category_stats: HashMap<String, Vec<(u64, u64)>>,

    /// Set once `MemoryProbe` reports unavailable; degrades the pool to
    /// unlimited-memory mode for the rest of its life (spec §7).
    memory_degraded: bool,
    tstart: SystemTime,
    alive: bool,

    /// Paces admissions after a Job with `start_delay_s > 0` starts, so the
    /// async path honors the same delay `run_sync` enforces by blocking —
    /// without blocking the supervisor thread itself.
    defer_admission_until: Option<Instant>,
}

impl ExecPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let affinity = AffinityMap::new(config.core_threads, config.nodes, config.afn_step)?;
        let wks_num = config.wks_num;
        Ok(ExecPool {
            cur_wks_num: wks_num,
            active: (0..wks_num).map(|_| None).collect(),
            waiting: VecDeque::new(),
            finished: Vec::new(),
            tasks: HashMap::new(),
            submitted_names: HashSet::new(),
            category_stats: HashMap::new(),
            memory_probe: MemoryProbe::new(),
            memory_degraded: false,
            tstart: SystemTime::now(),
            alive: true,
            defer_admission_until: None,
            affinity,
            config,
        })
    }

    pub fn cur_wks_num(&self) -> usize {
        self.cur_wks_num
    }

    pub fn register_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(Error::ConfigInvalid(format!(
                "task '{}' already registered",
                task.name
            )));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Submit a Job. `sync` runs it inline on the caller's thread and
    /// returns its exit code; async admits it immediately (slot free and
    /// predicted vmem fits, or the active set is currently empty — the
    /// forward-progress guarantee from spec §9) or appends it to the
    /// waiting queue.
    pub fn execute(&mut self, mut job: Job, sync: bool) -> Result<i32> {
        if self.submitted_names.contains(&job.name) {
            return Err(Error::ConfigInvalid(format!(
                "job '{}' already submitted",
                job.name
            )));
        }
        if let Some(task_name) = &job.task
            && !self.tasks.contains_key(task_name)
        {
            return Err(Error::ConfigInvalid(format!(
                "job '{}' references unknown task '{task_name}'",
                job.name
            )));
        }
        self.submitted_names.insert(job.name.clone());
        if let Some(task_name) = job.task.clone()
            && let Some(task) = self.tasks.get_mut(&task_name)
        {
            task.attach_job();
            // A Job that didn't set its own stdio inherits the Task's
            // (spec §3 Task stdio targets); `Null` doubles as both "default"
            // and "not customized" since it's the default for both types.
            if matches!(job.stdout, StdioTarget::Null) {
                job.stdout = task.stdout.clone();
            }
            if matches!(job.stderr, StdioTarget::Null) {
                job.stderr = task.stderr.clone();
            }
        }

        if sync {
            return self.run_sync(job);
        }

        let free_slot = (0..self.active.len())
            .filter(|&i| i < self.cur_wks_num)
            .find(|&i| self.active[i].is_none());
        let active_count = self.active.iter().filter(|s| s.is_some()).count();
        let predicted = self.predicted_vmem(job.category.as_deref(), job.size);
        let limit = self.config.vm_limit_bytes();
        let fits = limit == 0
            || self.memory_degraded
            || self.total_active_vmem() + predicted <= limit
            || active_count == 0;

        match free_slot {
            Some(slot) if fits && self.admission_gate_open() => {
                match job.start(slot, &self.affinity) {
                    Ok(()) => {
                        self.mark_task_started(&job);
                        self.arm_admission_gate(&job);
                        self.active[slot] = Some(job);
                        Ok(0)
                    }
                    Err(e) => {
                        warn!(error = %e, "job failed to start synchronously at admission");
                        self.handle_spawn_failure(job);
                        Ok(1)
                    }
                }
            }
            _ => {
                job.phase = JobPhase::Waiting;
                self.waiting.push_back(job);
                Ok(0)
            }
        }
    }

    fn run_sync(&mut self, mut job: Job) -> Result<i32> {
        job.start(0, &self.affinity)?;
        self.mark_task_started(&job);
        // start_delay_s is a caller-side pacing delay (spec §3); only the
        // sync path can afford to block on it, since async `execute` must
        // never block beyond spawn (spec §5).
        if job.start_delay_s > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(job.start_delay_s));
        }
        loop {
            if let PollOutcome::Exited(code) = job.poll()? {
                self.finish_exited(&mut job, code);
                let code = job.rcode.unwrap_or(-1);
                self.finished.push(job);
                return Ok(code);
            }
            if job.timeout_s > 0.0
                && let Some(elapsed) = job.elapsed()
                && elapsed.as_secs_f64() > job.timeout_s
            {
                job.terminate(TerminationReason::Timeout)?;
                if let Some(t) = job.task.clone()
                    && let Some(task) = self.tasks.get_mut(&t)
                {
                    task.record_job_terminated();
                }
                self.record_category_stats(&job);
                let code = job.rcode.unwrap_or(-1);
                self.finished.push(job);
                return Ok(code);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Run one supervisor tick: poll + timeout-enforce every active Job,
    /// sample memory, evict if over budget, then promote waiting Jobs.
    pub fn tick(&mut self) -> Result<()> {
        for slot in 0..self.active.len() {
            if self.active[slot].is_none() {
                continue;
            }
            let outcome = self.active[slot].as_mut().unwrap().poll()?;
            if let PollOutcome::Exited(code) = outcome {
                let mut job = self.active[slot].take().unwrap();
                self.finish_exited(&mut job, code);
                self.finished.push(job);
                continue;
            }

            let timed_out = {
                let job = self.active[slot].as_ref().unwrap();
                job.timeout_s > 0.0
                    && job
                        .elapsed()
                        .is_some_and(|e| e.as_secs_f64() > job.timeout_s)
            };
            if !timed_out {
                continue;
            }
            let on_timeout = self.active[slot].as_ref().unwrap().on_timeout;
            match on_timeout {
                OnTimeout::Restart => {
                    debug!(slot, "timeout: restarting in place");
                    self.active[slot].as_mut().unwrap().restart(&self.affinity)?;
                }
                OnTimeout::Terminate => {
                    let mut job = self.active[slot].take().unwrap();
                    job.terminate(TerminationReason::Timeout)?;
                    if let Some(t) = job.task.clone()
                        && let Some(task) = self.tasks.get_mut(&t)
                    {
                        task.record_job_terminated();
                    }
                    self.record_category_stats(&job);
                    self.finished.push(job);
                }
            }
        }

        self.enforce_task_timeouts()?;

        self.sample_memory();

        if !self.memory_degraded && self.config.vm_limit_bytes() > 0 {
            self.run_eviction();
        }

        self.promote_waiting();

        Ok(())
    }

    /// Sleep-poll-evict-promote until both sets drain or `global_timeout_s`
    /// elapses (0 means no global deadline). Returns `true` on clean drain.
    pub fn join(&mut self, global_timeout_s: f64) -> Result<bool> {
        let deadline = if global_timeout_s > 0.0 {
            Some(Instant::now() + Duration::from_secs_f64(global_timeout_s))
        } else {
            None
        };
        loop {
            std::thread::sleep(Duration::from_secs_f64(self.config.effective_latency_s()));
            self.tick()?;

            if self.waiting.is_empty() && self.active.iter().all(|s| s.is_none()) {
                return Ok(true);
            }
            if let Some(dl) = deadline
                && Instant::now() >= dl
            {
                self.terminate_all(TerminationReason::GlobalDeadline);
                return Ok(false);
            }
        }
    }

    /// Terminate every active Job, clear the waiting queue without firing
    /// `on_done`, idempotent.
    pub fn shutdown(&mut self) {
        self.terminate_all(TerminationReason::Shutdown);
    }

    /// Finished Jobs (success, failure, or termination) in completion order.
    /// An embedder that wants more than `rcode`/`phase` — e.g. `termination_error()`
    /// to distinguish a timeout from a memory eviction — reads them here;
    /// `snapshot()` only exposes the flattened, serializable view.
    pub fn finished_jobs(&self) -> &[Job] {
        &self.finished
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let mut failures: Vec<SnapshotEntry> = self
            .finished
            .iter()
            .filter(|j| j.phase == JobPhase::FinishedFail)
            .map(job_to_entry)
            .collect();
        failures.extend(
            self.tasks
                .values()
                .filter(|t| t.num_term > 0)
                .map(task_to_entry),
        );

        let mut jobs: Vec<SnapshotEntry> = self.waiting.iter().map(job_to_entry).collect();
        jobs.extend(self.active.iter().flatten().map(job_to_entry));

        let tasks = self
            .tasks
            .values()
            .filter(|t| t.has_started())
            .map(task_to_entry)
            .collect();

        PoolSnapshot {
            failures,
            jobs,
            tasks,
        }
    }

    // -- internals --

    fn terminate_all(&mut self, reason: TerminationReason) {
        if !self.alive {
            return;
        }
        for slot in 0..self.active.len() {
            let Some(mut job) = self.active[slot].take() else {
                continue;
            };
            let _ = job.terminate(reason);
            if let Some(t) = job.task.clone()
                && let Some(task) = self.tasks.get_mut(&t)
            {
                task.record_job_terminated();
            }
            self.finished.push(job);
        }
        self.waiting.clear();
        self.alive = false;
    }

    fn finish_exited(&mut self, job: &mut Job, code: i32) {
        job.tstop = Some(SystemTime::now());
        job.rcode = Some(code);
        job.phase = if code == 0 {
            JobPhase::FinishedOk
        } else {
            JobPhase::FinishedFail
        };
        self.record_category_stats(job);
        if code == 0 {
            job.callbacks.on_done(job);
            if let Some(t) = job.task.clone()
                && let Some(task) = self.tasks.get_mut(&t)
            {
                task.record_job_done();
            }
        } else if let Some(t) = job.task.clone()
            && let Some(task) = self.tasks.get_mut(&t)
        {
            task.record_job_terminated();
        }
    }

    fn record_category_stats(&mut self, job: &Job) {
        if let (Some(cat), Some(size)) = (job.category.clone(), job.size.value()) {
            self.category_stats
                .entry(cat)
                .or_default()
                .push((size, job.vmem_smooth));
        }
    }

    /// Whether a Job may be admitted right now — closed while a prior Job's
    /// `start_delay_s` window is still pending.
    fn admission_gate_open(&self) -> bool {
        match self.defer_admission_until {
            Some(t) => Instant::now() >= t,
            None => true,
        }
    }

    /// Arm the admission gate after a Job starts, if it carries a
    /// `start_delay_s`. Non-blocking counterpart to `run_sync`'s sleep: the
    /// next admission (immediate or promoted) simply waits for the next tick
    /// instead of stalling the supervisor thread.
    fn arm_admission_gate(&mut self, job: &Job) {
        if job.start_delay_s > 0.0 {
            self.defer_admission_until =
                Some(Instant::now() + Duration::from_secs_f64(job.start_delay_s));
        }
    }

    /// Task-level deadline (spec §3 `Task.timeout_s`): once a Task's clock
    /// exceeds it, every Job still attached — active or waiting — is
    /// terminated and counted against the Task, same as a Job timeout.
    fn enforce_task_timeouts(&mut self) -> Result<()> {
        let now = SystemTime::now();
        let expired: HashSet<String> = self
            .tasks
            .values()
            .filter(|t| {
                t.timeout_s > 0.0
                    && t.tstop.is_none()
                    && t.tstart.is_some_and(|start| {
                        now.duration_since(start)
                            .map(|d| d.as_secs_f64())
                            .unwrap_or(0.0)
                            > t.timeout_s
                    })
            })
            .map(|t| t.name.clone())
            .collect();
        if expired.is_empty() {
            return Ok(());
        }

        for slot in 0..self.active.len() {
            let belongs = self.active[slot]
                .as_ref()
                .is_some_and(|j| j.task.as_deref().is_some_and(|t| expired.contains(t)));
            if !belongs {
                continue;
            }
            let mut job = self.active[slot].take().unwrap();
            job.terminate(TerminationReason::Timeout)?;
            if let Some(t) = job.task.clone()
                && let Some(task) = self.tasks.get_mut(&t)
            {
                task.record_job_terminated();
            }
            self.record_category_stats(&job);
            self.finished.push(job);
        }

        let mut remaining = VecDeque::with_capacity(self.waiting.len());
        while let Some(mut job) = self.waiting.pop_front() {
            if job.task.as_deref().is_some_and(|t| expired.contains(t)) {
                job.phase = JobPhase::FinishedFail;
                job.term_reason = Some(TerminationReason::Timeout);
                job.tstop = Some(now);
                if let Some(t) = job.task.clone()
                    && let Some(task) = self.tasks.get_mut(&t)
                {
                    task.record_job_terminated();
                }
                self.finished.push(job);
            } else {
                remaining.push_back(job);
            }
        }
        self.waiting = remaining;
        Ok(())
    }

    fn mark_task_started(&mut self, job: &Job) {
        if let Some(t) = &job.task
            && let Some(task) = self.tasks.get_mut(t)
        {
            task.mark_started();
        }
    }

    fn handle_spawn_failure(&mut self, mut job: Job) {
        job.phase = JobPhase::FinishedFail;
        job.rcode = Some(-1);
        job.tstop = Some(SystemTime::now());
        if let Some(t) = job.task.clone()
            && let Some(task) = self.tasks.get_mut(&t)
        {
            task.record_job_terminated();
        }
        self.finished.push(job);
    }

    fn total_active_vmem(&self) -> u64 {
        self.active.iter().flatten().map(|j| j.vmem_smooth).sum()
    }

    /// Largest completed vmem among same-category Jobs with `size <=
    /// new_size` (spec "Predicted vmem"). 0 for the first admission of a
    /// category, or when `category`/`size` is absent.
    fn predicted_vmem(&self, category: Option<&str>, size: Size) -> u64 {
        let Some(cat) = category else { return 0 };
        let Some(limit) = size.value() else { return 0 };
        let Some(stats) = self.category_stats.get(cat) else {
            return 0;
        };
        stats
            .iter()
            .filter(|(s, _)| *s <= limit)
            .map(|(_, v)| *v)
            .max()
            .unwrap_or(0)
    }

    fn sample_memory(&mut self) {
        if self.memory_degraded {
            return;
        }
        let probe = self.memory_probe;
        let mut probe_failed = false;
        for slot in self.active.iter_mut() {
            let Some(job) = slot else { continue };
            let Some(pid) = job.pid else { continue };
            match probe.sample(pid) {
                Ok(sample) => {
                    let sample_f = sample as f64;
                    let smoothed =
                        VMEM_SMOOTH_ALPHA * job.vmem_smooth as f64 + (1.0 - VMEM_SMOOTH_ALPHA) * sample_f;
                    job.vmem_smooth = sample_f.max(smoothed).round() as u64;
                }
                Err(Error::MemoryProbeUnavailable) => probe_failed = true,
                Err(_) => {}
            }
        }
        if probe_failed {
            warn!("memory accounting unavailable on this platform; degrading to unlimited memory mode");
            self.memory_degraded = true;
        }
    }

    /// Sort the active set by `vmem_smooth` descending; evict chains (same
    /// category, size >= the triggering Job's) until total vmem fits the
    /// budget, requeue evicted Jobs at the front of `waiting` in decreasing
    /// `size` order, shrink `cur_wks_num` once per round (spec §4.4).
    fn run_eviction(&mut self) {
        let limit = self.config.vm_limit_bytes();
        if self.total_active_vmem() <= limit {
            return;
        }
        loop {
            if self.total_active_vmem() <= limit {
                break;
            }
            let max_slot = self
                .active
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|j| (i, j.vmem_smooth)))
                .max_by_key(|&(_, v)| v)
                .map(|(i, _)| i);
            let Some(max_slot) = max_slot else { break };

            let (cat, size) = {
                let j = self.active[max_slot].as_ref().unwrap();
                (j.category.clone(), j.size)
            };
            let mut chain_slots = vec![max_slot];
            if self.config.chained_constraints
                && let (Some(cat), Some(sz)) = (&cat, size.value())
            {
                for (i, slot) in self.active.iter().enumerate() {
                    if i == max_slot {
                        continue;
                    }
                    if let Some(j) = slot
                        && j.category.as_deref() == Some(cat.as_str())
                        && j.size.value().is_some_and(|s| s >= sz)
                    {
                        chain_slots.push(i);
                    }
                }
            }

            let mut evicted: Vec<Job> = chain_slots
                .iter()
                .filter_map(|&slot| self.active[slot].take())
                .collect();
            evict_chain(&mut evicted);
            for job in &evicted {
                debug!(job = %job.name, "evicted for memory pressure");
            }
            // Decreasing size, each pushed to the front: the smallest ends
            // up frontmost, so larger chained Jobs retry only after it.
            evicted.sort_by(|a, b| b.size.cmp(&a.size));
            for job in evicted {
                self.waiting.push_front(job);
            }
        }
        self.cur_wks_num = self.cur_wks_num.saturating_sub(1).max(1);
    }

    /// From the head of `waiting`, admit Jobs while a slot is free and
    /// predicted vmem fits; a head Job that doesn't fit blocks everything
    /// behind it (strict FIFO, spec "Promotion").
    fn promote_waiting(&mut self) {
        loop {
            if !self.admission_gate_open() {
                break;
            }
            let Some(front) = self.waiting.front() else {
                break;
            };
            let free_slot = (0..self.active.len())
                .filter(|&i| i < self.cur_wks_num)
                .find(|&i| self.active[i].is_none());
            let Some(slot) = free_slot else { break };

            let limit = self.config.vm_limit_bytes();
            let predicted = self.predicted_vmem(front.category.as_deref(), front.size);
            let fits =
                limit == 0 || self.memory_degraded || self.total_active_vmem() + predicted <= limit;
            if !fits {
                break;
            }

            let mut job = self.waiting.pop_front().unwrap();
            match job.start(slot, &self.affinity) {
                Ok(()) => {
                    self.mark_task_started(&job);
                    self.arm_admission_gate(&job);
                    self.active[slot] = Some(job);
                }
                Err(e) => {
                    warn!(job = %job.name, error = %e, "promotion spawn failed");
                    self.handle_spawn_failure(job);
                }
            }
        }
    }
}

impl Drop for ExecPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn to_epoch_secs(t: SystemTime) -> Option<f64> {
    t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs_f64())
}

fn job_to_entry(job: &Job) -> SnapshotEntry {
    SnapshotEntry {
        category: job.category.clone(),
        rcode: job.rcode,
        duration: job.tstart.and_then(|start| {
            let end = job.tstop.unwrap_or_else(SystemTime::now);
            end.duration_since(start).ok().map(|d| d.as_secs_f64())
        }),
        memkind: job.category.clone(),
        memsize: Some(job.vmem_smooth),
        name: job.name.clone(),
        numadded: None,
        numdone: None,
        numterm: Some(job.num_terminations as u64),
        pid: job.pid,
        task: job.task.clone(),
        tstart: job.tstart.and_then(to_epoch_secs),
        tstop: job.tstop.and_then(to_epoch_secs),
    }
}

fn task_to_entry(task: &Task) -> SnapshotEntry {
    SnapshotEntry {
        category: None,
        rcode: None,
        duration: task.tstart.and_then(|start| {
            let end = task.tstop.unwrap_or_else(SystemTime::now);
            end.duration_since(start).ok().map(|d| d.as_secs_f64())
        }),
        memkind: None,
        memsize: None,
        name: task.name.clone(),
        numadded: Some(task.num_added),
        numdone: Some(task.num_done),
        numterm: Some(task.num_term),
        pid: None,
        task: None,
        tstart: task.tstart.and_then(to_epoch_secs),
        tstop: task.tstop.and_then(to_epoch_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg(wks_num: usize) -> PoolConfig {
        PoolConfig {
            wks_num,
            afn_step: None,
            vm_limit_gb: 0.0,
            latency_s: 0.05,
            core_threads: 1,
            nodes: 1,
            chained_constraints: true,
        }
    }

    struct CountingCallbacks {
        done: Arc<AtomicUsize>,
    }
    impl crate::job::Callbacks for CountingCallbacks {
        fn on_done(&self, _job: &Job) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn s1_basic_drain() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let job = JobBuilder::new("j1", vec!["/bin/true".into()])
            .callbacks(Arc::new(CountingCallbacks { done: done.clone() }))
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        assert!(pool.join(5.0).unwrap());
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(pool.snapshot().failures.is_empty());
    }

    #[test]
    fn s2_timeout_terminate_no_on_done() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let job = JobBuilder::new("j2", vec!["/bin/sleep".into(), "10".into()])
            .timeout_s(0.2)
            .callbacks(Arc::new(CountingCallbacks { done: done.clone() }))
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        assert!(pool.join(5.0).unwrap());
        assert_eq!(done.load(Ordering::SeqCst), 0);
        let snap = pool.snapshot();
        assert_eq!(snap.failures.len(), 1);
    }

    #[test]
    fn s3_timeout_restart_keeps_retrying_until_deadline() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        let job = JobBuilder::new("j3", vec!["/bin/sleep".into(), "10".into()])
            .timeout_s(0.15)
            .on_timeout(crate::job::OnTimeout::Restart)
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        assert!(!pool.join(0.6).unwrap());
        let snap = pool.snapshot();
        let entry = snap.failures.iter().find(|e| e.name == "j3").unwrap();
        assert!(entry.numterm.unwrap_or(0) >= 2);
    }

    #[test]
    fn chained_eviction_evicts_same_category_larger_or_equal() {
        let mut pool = ExecPool::new(cfg(3)).unwrap();
        pool.config.vm_limit_gb = 20_000.0 / (1024.0 * 1024.0 * 1024.0); // 20,000-byte budget

        // "a" (size=10) is the heaviest and triggers eviction; "b" (size=20
        // >= 10) chains with it; "c" (size=1 < 10) does not.
        for (name, size, vmem) in [("a", 10u64, 100_000u64), ("b", 20, 50_000), ("c", 1, 10_000)] {
            let mut job = JobBuilder::new(name, vec!["/bin/sleep".into(), "10".into()])
                .category("cat")
                .size(size)
                .build()
                .unwrap();
            job.start(0, &pool.affinity).unwrap();
            job.vmem_smooth = vmem;
            let slot = (0..pool.active.len()).find(|&i| pool.active[i].is_none()).unwrap();
            pool.active[slot] = Some(job);
        }

        pool.run_eviction();

        assert!(pool.active.iter().flatten().all(|j| j.name == "c"));
        assert_eq!(pool.waiting.len(), 2);
        // Pushed front in decreasing-size order: "b" (20) pushed first, then
        // "a" (10) pushed to the front last, so "a" ends up frontmost.
        assert_eq!(pool.waiting[0].name, "a");
        assert_eq!(pool.waiting[1].name, "b");
        assert_eq!(pool.cur_wks_num(), 2);
    }

    #[test]
    fn fifo_blocking_head_job_blocks_the_queue() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        pool.config.vm_limit_gb = 512.0 / (1024.0 * 1024.0 * 1024.0); // 512 bytes
        pool.category_stats
            .insert("big".to_string(), vec![(1, 1_000_000)]);
        pool.category_stats
            .insert("small".to_string(), vec![(1, 10)]);

        let q1 = JobBuilder::new("q1", vec!["/bin/true".into()])
            .category("big")
            .size(1)
            .build()
            .unwrap();
        let q2 = JobBuilder::new("q2", vec!["/bin/true".into()])
            .category("small")
            .size(1)
            .build()
            .unwrap();
        pool.waiting.push_back(q1);
        pool.waiting.push_back(q2);

        pool.promote_waiting();

        // q1's predicted vmem (1_000_000) blows the 512-byte budget, so it
        // stays at the head and q2 must not overtake it.
        assert_eq!(pool.waiting.len(), 2);
        assert_eq!(pool.waiting.front().unwrap().name, "q1");
        assert!(pool.active.iter().all(|s| s.is_none()));
    }

    #[test]
    fn chained_constraints_false_evicts_only_the_triggering_job() {
        let mut pool = ExecPool::new(cfg(3)).unwrap();
        pool.config.vm_limit_gb = 70_000.0 / (1024.0 * 1024.0 * 1024.0);
        pool.config.chained_constraints = false;

        // Evicting "a" alone already brings the total under budget; with
        // chaining off, "b" (which would otherwise chain, same category,
        // size 20 >= 10) must stay active.
        for (name, size, vmem) in [("a", 10u64, 100_000u64), ("b", 20, 5_000), ("c", 1, 10_000)] {
            let mut job = JobBuilder::new(name, vec!["/bin/sleep".into(), "10".into()])
                .category("cat")
                .size(size)
                .build()
                .unwrap();
            job.start(0, &pool.affinity).unwrap();
            job.vmem_smooth = vmem;
            let slot = (0..pool.active.len()).find(|&i| pool.active[i].is_none()).unwrap();
            pool.active[slot] = Some(job);
        }

        pool.run_eviction();

        assert_eq!(pool.waiting.len(), 1);
        assert_eq!(pool.waiting[0].name, "a");
        let active_names: Vec<_> = pool.active.iter().flatten().map(|j| j.name.clone()).collect();
        assert!(active_names.contains(&"b".to_string()));
        assert!(active_names.contains(&"c".to_string()));
    }

    #[test]
    fn start_delay_s_paces_async_admission() {
        let mut pool = ExecPool::new(cfg(2)).unwrap();
        let d1 = JobBuilder::new("d1", vec!["/bin/true".into()])
            .start_delay_s(0.2)
            .build()
            .unwrap();
        pool.execute(d1, false).unwrap();

        let d2 = JobBuilder::new("d2", vec!["/bin/true".into()])
            .build()
            .unwrap();
        pool.execute(d2, false).unwrap();

        // d1's start_delay_s gate is armed; d2 must wait even though a
        // second slot is free.
        assert_eq!(pool.waiting.len(), 1);
        assert_eq!(pool.waiting.front().unwrap().name, "d2");

        std::thread::sleep(std::time::Duration::from_millis(250));
        pool.tick().unwrap();
        assert!(pool.waiting.is_empty());
    }

    #[test]
    fn task_timeout_terminates_attached_jobs() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        pool.register_task(crate::task::TaskBuilder::new("t1").timeout_s(0.15).build())
            .unwrap();
        let job = JobBuilder::new("tj1", vec!["/bin/sleep".into(), "10".into()])
            .task("t1")
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        assert!(pool.join(2.0).unwrap());
        let snap = pool.snapshot();
        assert_eq!(
            snap.failures.iter().filter(|e| e.name == "tj1").count(),
            1
        );
    }

    #[test]
    fn task_stdio_targets_apply_to_attached_jobs_with_default_stdio() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        pool.register_task(
            crate::task::TaskBuilder::new("t2")
                .stdout(crate::job::StdioTarget::Inherit)
                .build(),
        )
        .unwrap();
        let job = JobBuilder::new("tj2", vec!["/bin/true".into()])
            .task("t2")
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        let active_job = pool
            .active
            .iter()
            .flatten()
            .find(|j| j.name == "tj2")
            .unwrap();
        assert!(matches!(active_job.stdout, crate::job::StdioTarget::Inherit));
    }

    #[test]
    fn finished_jobs_exposes_termination_error() {
        let mut pool = ExecPool::new(cfg(1)).unwrap();
        let job = JobBuilder::new("te1", vec!["/bin/sleep".into(), "10".into()])
            .timeout_s(0.15)
            .build()
            .unwrap();
        pool.execute(job, false).unwrap();
        assert!(pool.join(5.0).unwrap());
        let job = pool
            .finished_jobs()
            .iter()
            .find(|j| j.name == "te1")
            .unwrap();
        assert!(matches!(
            job.termination_error(),
            Some(crate::error::Error::Terminated(_))
        ));
    }
}
