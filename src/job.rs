//! One external process with timeout, category, size, vmem estimate, stdio
//! redirection, and lifecycle callbacks (spec §3, §4.2).

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{debug, info};

use crate::affinity::AffinityMap;
use crate::error::{Error, Result};

/// `ontimeout` as a plain boolean in the source this spec was distilled from
/// is ambiguous; model the two behaviors explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    Terminate,
    Restart,
}

/// The `size` field doubles as "unknown" (0) and a numeric ordering key in
/// the source. Modeled as a sum so chained eviction can never compare two
/// unknown sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Size {
    Unknown,
    Known(u64),
}

impl Size {
    pub fn is_unknown(self) -> bool {
        matches!(self, Size::Unknown)
    }

    pub fn value(self) -> Option<u64> {
        match self {
            Size::Unknown => None,
            Size::Known(v) => Some(v),
        }
    }
}

/// Where a child's stdout/stderr stream goes.
#[derive(Debug, Clone)]
pub enum StdioTarget {
    Inherit,
    Null,
    File(PathBuf),
    Pipe,
    /// Valid only for `stderr`: merge stderr into the job's stdout stream.
    MergeIntoStdout,
}

impl Default for StdioTarget {
    fn default() -> Self {
        StdioTarget::Null
    }
}

/// Capability object for job lifecycle hooks. Both methods default to
/// no-ops so embedders implement only what they need. Runs on the
/// supervisor thread — implementations must not block.
pub trait Callbacks: Send + Sync {
    fn on_start(&self, _job: &Job) {}
    fn on_done(&self, _job: &Job) {}
}

/// Default no-op callback set.
pub struct NoopCallbacks;
impl Callbacks for NoopCallbacks {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Unsubmitted,
    Waiting,
    Active,
    FinishedOk,
    FinishedFail,
}

/// Outcome of a non-blocking poll of a running job.
#[derive(Debug, Clone, Copy)]
pub enum PollOutcome {
    Running,
    Exited(i32),
}

/// Reason a job was terminated, recorded for the observation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Timeout,
    MemoryEviction,
    GlobalDeadline,
    Shutdown,
}

/// Grace period between a polite signal and a forced kill.
pub const TERMINATE_GRACE: std::time::Duration = std::time::Duration::from_millis(300);

pub struct Job {
    // -- caller-supplied configuration --
    pub name: String,
    pub argv: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub timeout_s: f64,
    pub on_timeout: OnTimeout,
    pub start_delay_s: f64,
    pub task: Option<String>,
    pub callbacks: Arc<dyn Callbacks>,
    pub category: Option<String>,
    pub size: Size,
    pub slowdown: f64,
    pub stdout: StdioTarget,
    pub stderr: StdioTarget,
    pub omit_affinity: bool,

    // -- runtime fields set by the pool --
    pub tstart: Option<SystemTime>,
    pub tstop: Option<SystemTime>,
    pub(crate) proc_handle: Option<Child>,
    pub pid: Option<u32>,
    pub worker_slot: Option<usize>,
    pub vmem_smooth: u64,
    pub rcode: Option<i32>,
    pub num_terminations: u32,
    pub phase: JobPhase,
    /// Why the most recent attempt ended in `terminate`/`evict_chain`, if it did.
    pub term_reason: Option<TerminationReason>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("argv", &self.argv)
            .field("category", &self.category)
            .field("size", &self.size)
            .field("phase", &self.phase)
            .field("pid", &self.pid)
            .field("rcode", &self.rcode)
            .finish()
    }
}

/// Builder for a [`Job`], with sane defaults for everything but `name` and
/// `argv`.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Self {
        JobBuilder {
            job: Job {
                name: name.into(),
                argv,
                workdir: None,
                timeout_s: 0.0,
                on_timeout: OnTimeout::Terminate,
                start_delay_s: 0.0,
                task: None,
                callbacks: Arc::new(NoopCallbacks),
                category: None,
                size: Size::Unknown,
                slowdown: 1.0,
                stdout: StdioTarget::Null,
                stderr: StdioTarget::Null,
                omit_affinity: false,
                tstart: None,
                tstop: None,
                proc_handle: None,
                pid: None,
                worker_slot: None,
                vmem_smooth: 0,
                rcode: None,
                num_terminations: 0,
                phase: JobPhase::Unsubmitted,
                term_reason: None,
            },
        }
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.workdir = Some(dir.into());
        self
    }

    pub fn timeout_s(mut self, t: f64) -> Self {
        self.job.timeout_s = t;
        self
    }

    pub fn on_timeout(mut self, v: OnTimeout) -> Self {
        self.job.on_timeout = v;
        self
    }

    pub fn start_delay_s(mut self, t: f64) -> Self {
        self.job.start_delay_s = t;
        self
    }

    pub fn task(mut self, name: impl Into<String>) -> Self {
        self.job.task = Some(name.into());
        self
    }

    pub fn callbacks(mut self, cb: Arc<dyn Callbacks>) -> Self {
        self.job.callbacks = cb;
        self
    }

    pub fn category(mut self, c: impl Into<String>) -> Self {
        self.job.category = Some(c.into());
        self
    }

    /// `0` means "unknown" (spec §3) and disables chaining for this Job.
    pub fn size(mut self, s: u64) -> Self {
        self.job.size = if s == 0 { Size::Unknown } else { Size::Known(s) };
        self
    }

    pub fn slowdown(mut self, v: f64) -> Self {
        self.job.slowdown = v;
        self
    }

    pub fn stdout(mut self, target: StdioTarget) -> Self {
        self.job.stdout = target;
        self
    }

    pub fn stderr(mut self, target: StdioTarget) -> Self {
        self.job.stderr = target;
        self
    }

    pub fn omit_affinity(mut self, v: bool) -> Self {
        self.job.omit_affinity = v;
        self
    }

    pub fn build(self) -> Result<Job> {
        validate(&self.job)?;
        Ok(self.job)
    }
}

fn validate(job: &Job) -> Result<()> {
    if job.name.trim().is_empty() {
        return Err(Error::ConfigInvalid("job name must be non-empty".into()));
    }
    if job.timeout_s < 0.0 {
        return Err(Error::ConfigInvalid("timeout_s must be >= 0".into()));
    }
    if job.slowdown <= 0.0 {
        return Err(Error::ConfigInvalid("slowdown must be > 0".into()));
    }
    Ok(())
}

impl Job {
    /// Spawn the child, apply CPU affinity unless omitted, record `tstart`,
    /// and invoke `on_start` — all before the caller (the supervisor loop)
    /// considers the job active.
    pub fn start(&mut self, worker_slot: usize, affinity: &AffinityMap) -> Result<()> {
        if self.argv.is_empty() {
            // A "stub" job that only runs callbacks (spec: argv may be
            // empty). No child process, so `poll` reports it exited
            // immediately with `rcode = 0` on the next tick.
            self.proc_handle = None;
            self.pid = None;
            self.worker_slot = Some(worker_slot);
            if self.tstart.is_none() {
                self.tstart = Some(SystemTime::now());
            }
            self.tstop = None;
            self.rcode = None;
            self.phase = JobPhase::Active;
            self.callbacks.on_start(self);
            return Ok(());
        }

        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let stdout_stdio = resolve_stdio(&self.stdout)?;
        let stderr_stdio = match &self.stderr {
            StdioTarget::MergeIntoStdout => merge_stdio(&self.stdout)?,
            other => resolve_stdio(other)?,
        };

        cmd.stdin(Stdio::null());
        cmd.stdout(stdout_stdio);
        cmd.stderr(stderr_stdio);

        let child = cmd.spawn().map_err(Error::SpawnFailed)?;
        let pid = child.id();

        if !self.omit_affinity {
            affinity.pin_current_thread(worker_slot)?;
        }

        self.proc_handle = Some(child);
        self.pid = Some(pid);
        self.worker_slot = Some(worker_slot);
        // Only the first attempt sets tstart (spec §9 Open Question: tstart
        // is the first attempt's start time across restarts/evictions).
        if self.tstart.is_none() {
            self.tstart = Some(SystemTime::now());
        }
        self.tstop = None;
        self.rcode = None;
        self.phase = JobPhase::Active;

        info!(job = %self.name, pid, worker_slot, "job started");
        self.callbacks.on_start(self);
        Ok(())
    }

    /// Non-blocking poll of the child's state.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        let Some(child) = self.proc_handle.as_mut() else {
            // No child process at all: a stub job (empty argv). It has
            // nothing to wait for, so it completes on the first poll after
            // `on_start`.
            return Ok(PollOutcome::Exited(0));
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(-1);
                Ok(PollOutcome::Exited(code))
            }
            Ok(None) => Ok(PollOutcome::Running),
            Err(e) => Err(Error::SpawnFailed(e)),
        }
    }

    /// Send a polite signal, wait up to [`TERMINATE_GRACE`], then force
    /// kill. Closes stdio handles deterministically on every exit path.
    pub fn terminate(&mut self, reason: TerminationReason) -> Result<()> {
        if self.phase != JobPhase::Active {
            return Ok(());
        }
        debug!(job = %self.name, pid = ?self.pid, ?reason, "terminating job");
        self.kill_current_process();
        self.term_reason = Some(reason);
        self.finish_terminated();
        Ok(())
    }

    /// The spec's `Error` classification for how the most recent attempt
    /// ended, if it ended in termination rather than a natural exit.
    pub fn termination_error(&self) -> Option<Error> {
        match self.term_reason? {
            TerminationReason::GlobalDeadline => Some(Error::DeadlineExceeded),
            TerminationReason::Timeout => Some(Error::Terminated("timeout".into())),
            TerminationReason::MemoryEviction => Some(Error::Terminated("memory eviction".into())),
            TerminationReason::Shutdown => Some(Error::Terminated("pool shutdown".into())),
        }
    }

    /// Send a polite signal to the current child, wait up to
    /// [`TERMINATE_GRACE`], then force kill and reap. Does not touch
    /// `phase`/counters — shared by `terminate` and `restart`.
    fn kill_current_process(&mut self) {
        let Some(pid) = self.pid else { return };

        send_polite_signal(pid);
        let deadline = Instant::now() + TERMINATE_GRACE;
        loop {
            if let Ok(PollOutcome::Exited(_)) = self.poll() {
                break;
            }
            if Instant::now() >= deadline {
                force_kill(pid);
                if let Some(child) = self.proc_handle.as_mut() {
                    let _ = child.wait();
                }
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        self.proc_handle = None;
    }

    fn finish_terminated(&mut self) {
        self.tstop = Some(SystemTime::now());
        self.phase = JobPhase::FinishedFail;
        self.proc_handle = None;
        self.num_terminations += 1;
    }

    /// Re-spawn with identical arguments, on the same worker slot. Only
    /// valid when the cause was a timeout with `on_timeout == Restart`,
    /// never for memory eviction. Reopens file-backed stdio targets in
    /// append mode (via `start` -> `resolve_stdio`) to preserve prior
    /// output.
    pub fn restart(&mut self, affinity: &AffinityMap) -> Result<()> {
        let worker_slot = self.worker_slot.unwrap_or(0);
        self.kill_current_process();
        self.num_terminations += 1;
        self.phase = JobPhase::Unsubmitted;
        self.start(worker_slot, affinity)
    }

    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.tstart.and_then(|t| t.elapsed().ok())
    }
}

/// Evict every Active Job in `jobs` — returning each to `Waiting` rather
/// than a finished state so the pool can requeue it, keeping `vmem_smooth`
/// (the eviction/rescheduling algorithm sorts chains by it) and `tstart`
/// (the first-attempt time) — against one shared [`TERMINATE_GRACE`]
/// deadline instead of each Job waiting out its own grace period in turn.
/// Evicting an N-Job chain costs one grace period, not N; a single-Job
/// slice is just the N = 1 case.
pub fn evict_chain(jobs: &mut [Job]) {
    for job in jobs.iter_mut() {
        if job.phase == JobPhase::Active
            && let Some(pid) = job.pid
        {
            send_polite_signal(pid);
        }
    }
    let deadline = Instant::now() + TERMINATE_GRACE;
    loop {
        let mut all_exited = true;
        for job in jobs.iter_mut() {
            if job.phase != JobPhase::Active || job.pid.is_none() {
                continue;
            }
            match job.poll() {
                Ok(PollOutcome::Exited(_)) => {}
                _ => all_exited = false,
            }
        }
        if all_exited || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    for job in jobs.iter_mut() {
        if job.phase != JobPhase::Active {
            continue;
        }
        if let Some(pid) = job.pid
            && !matches!(job.poll(), Ok(PollOutcome::Exited(_)))
        {
            force_kill(pid);
        }
        if let Some(child) = job.proc_handle.as_mut() {
            let _ = child.wait();
        }
        job.proc_handle = None;
        job.pid = None;
        job.worker_slot = None;
        job.num_terminations += 1;
        job.term_reason = Some(TerminationReason::MemoryEviction);
        job.phase = JobPhase::Waiting;
    }
}

fn resolve_stdio(target: &StdioTarget) -> Result<Stdio> {
    match target {
        StdioTarget::Inherit => Ok(Stdio::inherit()),
        StdioTarget::Null => Ok(Stdio::null()),
        StdioTarget::Pipe => Ok(Stdio::piped()),
        StdioTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(Error::StdioFailed)?;
            Ok(Stdio::from(file))
        }
        StdioTarget::MergeIntoStdout => Err(Error::StdioFailed(std::io::Error::other(
            "MergeIntoStdout is only valid for stderr",
        ))),
    }
}

/// Build the stderr `Stdio` that merges into whatever `stdout_target`
/// resolves to. File- and null-backed stdout reopen cleanly (append mode
/// for files keeps output interleaved across restarts/evictions);
/// inherited stdout is mirrored by also inheriting stderr.
///
/// TODO: merging into a *piped* stdout (captured by the caller rather than a
/// file) would need `dup`-ing the pipe's write end, which `std::process`
/// does not expose; that combination currently returns `StdioFailed`.
fn merge_stdio(stdout_target: &StdioTarget) -> Result<Stdio> {
    match stdout_target {
        StdioTarget::Inherit => Ok(Stdio::inherit()),
        StdioTarget::Null => Ok(Stdio::null()),
        StdioTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(Error::StdioFailed)?;
            Ok(Stdio::from(file))
        }
        StdioTarget::Pipe | StdioTarget::MergeIntoStdout => Err(Error::StdioFailed(
            std::io::Error::other("cannot merge stderr into a piped or merged stdout"),
        )),
    }
}

#[cfg(unix)]
fn send_polite_signal(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(unix)]
fn force_kill(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(windows)]
fn send_polite_signal(pid: u32) {
    // Windows has no SIGTERM equivalent for arbitrary processes; go straight
    // to termination but still honor the grace-period loop in `terminate`.
    force_kill(pid);
}

/// Terminate the whole process tree rooted at `pid`: assign it to a fresh
/// Job Object and terminate the job, which takes every descendant with it.
/// Falls back to [`terminate_process_tree`]'s snapshot BFS when the process
/// already belongs to another job (nested job objects, common under CI
/// runners), since a process can only belong to one job at a time.
#[cfg(windows)]
fn force_kill(pid: u32) {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, TerminateJobObject,
    };
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

    unsafe {
        let Ok(proc_handle) = OpenProcess(PROCESS_TERMINATE | PROCESS_SET_QUOTA, false, pid) else {
            return;
        };
        let Ok(job) = CreateJobObjectW(None, None) else {
            let _ = CloseHandle(proc_handle);
            terminate_process_tree(pid);
            return;
        };
        if AssignProcessToJobObject(job, proc_handle).is_err() {
            let _ = CloseHandle(job);
            let _ = CloseHandle(proc_handle);
            terminate_process_tree(pid);
            return;
        }
        let _ = TerminateJobObject(job, 1);
        let _ = CloseHandle(proc_handle);
        let _ = CloseHandle(job);
    }
}

/// Descendant BFS over a Toolhelp32 snapshot, terminating children before
/// the root. Same snapshot-then-BFS shape `MemoryProbe` uses to sum a
/// process tree's RSS, applied to termination instead of sampling.
#[cfg(windows)]
fn terminate_process_tree(root_pid: u32) {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    unsafe {
        let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
            return;
        };
        let mut entries: Vec<(u32, u32)> = Vec::new();
        let mut entry = PROCESSENTRY32 {
            dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
            ..Default::default()
        };
        if Process32First(snapshot, &mut entry).is_ok() {
            loop {
                entries.push((entry.th32ProcessID, entry.th32ParentProcessID));
                entry = PROCESSENTRY32 {
                    dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
                    ..Default::default()
                };
                if Process32Next(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);

        let mut to_kill = vec![root_pid];
        let mut i = 0;
        while i < to_kill.len() {
            let parent = to_kill[i];
            for &(child_pid, parent_pid) in &entries {
                if parent_pid == parent && !to_kill.contains(&child_pid) {
                    to_kill.push(child_pid);
                }
            }
            i += 1;
        }

        for &pid in to_kill.iter().rev() {
            if let Ok(h) = OpenProcess(PROCESS_TERMINATE, false, pid) {
                let _ = TerminateProcess(h, 1);
                let _ = CloseHandle(h);
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn send_polite_signal(_pid: u32) {}

#[cfg(not(any(unix, windows)))]
fn force_kill(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let job = JobBuilder::new("j1", vec!["/bin/true".to_string()])
            .build()
            .unwrap();
        assert_eq!(job.timeout_s, 0.0);
        assert_eq!(job.on_timeout, OnTimeout::Terminate);
        assert!(job.size.is_unknown());
        assert_eq!(job.phase, JobPhase::Unsubmitted);
    }

    #[test]
    fn rejects_empty_name() {
        assert!(JobBuilder::new("", vec!["/bin/true".into()]).build().is_err());
    }

    #[test]
    fn zero_size_is_unknown() {
        let job = JobBuilder::new("j", vec!["/bin/true".into()])
            .size(0)
            .build()
            .unwrap();
        assert!(job.size.is_unknown());
    }

    #[test]
    fn rejects_negative_timeout() {
        assert!(
            JobBuilder::new("j", vec!["/bin/true".into()])
                .timeout_s(-1.0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn rejects_nonpositive_slowdown() {
        assert!(
            JobBuilder::new("j", vec!["/bin/true".into()])
                .slowdown(0.0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn stub_job_runs_callbacks_and_finishes_on_first_poll() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut job = JobBuilder::new("stub", vec![]).build().unwrap();
        job.start(0, &affinity).unwrap();
        assert_eq!(job.phase, JobPhase::Active);
        assert!(job.pid.is_none());
        assert!(matches!(job.poll().unwrap(), PollOutcome::Exited(0)));
    }

    #[test]
    fn start_and_poll_true() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut job = JobBuilder::new("t", vec!["/bin/true".into()])
            .build()
            .unwrap();
        job.start(0, &affinity).unwrap();
        assert!(job.pid.is_some());
        // Poll until exited (bounded loop for a near-instant process).
        for _ in 0..200 {
            if let PollOutcome::Exited(code) = job.poll().unwrap() {
                assert_eq!(code, 0);
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("/bin/true did not exit in time");
    }

    #[test]
    fn terminate_sleep_job() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut job = JobBuilder::new("s", vec!["/bin/sleep".into(), "10".into()])
            .build()
            .unwrap();
        job.start(0, &affinity).unwrap();
        job.terminate(TerminationReason::Timeout).unwrap();
        assert_eq!(job.phase, JobPhase::FinishedFail);
        assert_eq!(job.num_terminations, 1);
        assert!(matches!(job.termination_error(), Some(Error::Terminated(_))));
    }

    #[test]
    fn global_deadline_termination_maps_to_deadline_exceeded() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut job = JobBuilder::new("s", vec!["/bin/sleep".into(), "10".into()])
            .build()
            .unwrap();
        job.start(0, &affinity).unwrap();
        job.terminate(TerminationReason::GlobalDeadline).unwrap();
        assert!(matches!(job.termination_error(), Some(Error::DeadlineExceeded)));
    }

    #[test]
    fn evict_chain_terminates_all_members_within_one_grace_period() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut jobs = Vec::new();
        for name in ["a", "b", "c"] {
            let mut job = JobBuilder::new(name, vec!["/bin/sleep".into(), "10".into()])
                .build()
                .unwrap();
            job.start(0, &affinity).unwrap();
            jobs.push(job);
        }

        let start = Instant::now();
        evict_chain(&mut jobs);
        let elapsed = start.elapsed();

        assert!(jobs.iter().all(|j| j.phase == JobPhase::Waiting));
        assert!(jobs.iter().all(|j| j.pid.is_none()));
        assert!(
            elapsed < TERMINATE_GRACE * 3,
            "evict_chain should bound the whole chain by roughly one grace period, took {elapsed:?}"
        );
    }

    #[test]
    fn restart_preserves_first_attempt_tstart() {
        let affinity = AffinityMap::new(1, 1, None).unwrap();
        let mut job = JobBuilder::new("r", vec!["/bin/sleep".into(), "10".into()])
            .build()
            .unwrap();
        job.start(0, &affinity).unwrap();
        let first_tstart = job.tstart;
        std::thread::sleep(std::time::Duration::from_millis(20));
        job.restart(&affinity).unwrap();
        assert_eq!(job.tstart, first_tstart);
    }
}
