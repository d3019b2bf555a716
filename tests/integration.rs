//! End-to-end tests driving `ExecPool` directly as a library — there is no
//! subcommand-per-operation CLI surface to shell out to here, only a single
//! `run`-a-pool-from-config wrapper, so the harness owns an isolated
//! temporary directory and exercises the pool API in process instead.

use std::path::PathBuf;

use exec_pool::{ExecPool, JobBuilder, OnTimeout, PoolConfig, StdioTarget, Task};

struct TestHarness {
    _tmp: tempfile::TempDir,
    dir: PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let dir = tmp.path().to_path_buf();
        Self { _tmp: tmp, dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

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

#[test]
fn basic_drain_runs_job_to_completion() {
    let mut pool = ExecPool::new(cfg(1)).unwrap();
    let job = JobBuilder::new("basic", vec!["/bin/true".into()])
        .build()
        .unwrap();
    pool.execute(job, false).unwrap();
    assert!(pool.join(5.0).unwrap());
    let snap = pool.snapshot();
    assert!(snap.jobs.is_empty());
    assert!(snap.failures.is_empty());
}

#[test]
fn stdout_redirects_to_file_and_persists_across_content() {
    let harness = TestHarness::new();
    let out_path = harness.path("out.log");
    let job = JobBuilder::new(
        "echo",
        vec![
            "/bin/sh".into(),
            "-c".into(),
            "echo hello-from-job".into(),
        ],
    )
    .stdout(StdioTarget::File(out_path.clone()))
    .build()
    .unwrap();

    let mut pool = ExecPool::new(cfg(1)).unwrap();
    pool.execute(job, false).unwrap();
    assert!(pool.join(5.0).unwrap());

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(contents.trim(), "hello-from-job");
}

#[test]
fn task_completes_when_all_attached_jobs_finish() {
    let mut pool = ExecPool::new(cfg(2)).unwrap();
    pool.register_task(Task::new("batch")).unwrap();

    let ok_job = JobBuilder::new("ok", vec!["/bin/true".into()])
        .task("batch")
        .build()
        .unwrap();
    let fail_job = JobBuilder::new("fail", vec!["/bin/false".into()])
        .task("batch")
        .build()
        .unwrap();

    pool.execute(ok_job, false).unwrap();
    pool.execute(fail_job, false).unwrap();
    assert!(pool.join(5.0).unwrap());

    let snap = pool.snapshot();
    let task_entry = snap
        .failures
        .iter()
        .find(|e| e.name == "batch")
        .expect("task with a failed job appears in failures");
    assert_eq!(task_entry.numadded, Some(2));
    assert_eq!(task_entry.numdone, Some(1));
    assert_eq!(task_entry.numterm, Some(1));
}

#[test]
fn timeout_terminate_reports_failure_without_on_done() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl exec_pool::Callbacks for Counter {
        fn on_done(&self, _job: &exec_pool::Job) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let done = Arc::new(AtomicUsize::new(0));
    let mut pool = ExecPool::new(cfg(1)).unwrap();
    let job = JobBuilder::new("slow", vec!["/bin/sleep".into(), "10".into()])
        .timeout_s(0.2)
        .on_timeout(OnTimeout::Terminate)
        .callbacks(Arc::new(Counter(done.clone())))
        .build()
        .unwrap();
    pool.execute(job, false).unwrap();
    assert!(pool.join(5.0).unwrap());

    assert_eq!(done.load(Ordering::SeqCst), 0);
    let snap = pool.snapshot();
    let entry = snap.failures.iter().find(|e| e.name == "slow").unwrap();
    assert!(entry.duration.unwrap_or(0.0) >= 0.2);
}

#[test]
fn sync_job_returns_exit_code_inline() {
    let mut pool = ExecPool::new(cfg(1)).unwrap();
    let job = JobBuilder::new("sync", vec!["/bin/sh".into(), "-c".into(), "exit 7".into()])
        .build()
        .unwrap();
    let code = pool.execute(job, true).unwrap();
    assert_eq!(code, 7);
}

#[test]
fn duplicate_job_name_is_rejected() {
    let mut pool = ExecPool::new(cfg(1)).unwrap();
    let job1 = JobBuilder::new("dup", vec!["/bin/true".into()]).build().unwrap();
    let job2 = JobBuilder::new("dup", vec!["/bin/true".into()]).build().unwrap();
    pool.execute(job1, false).unwrap();
    assert!(pool.execute(job2, false).is_err());
    pool.join(5.0).unwrap();
}

#[test]
fn shutdown_drains_waiting_queue_without_on_done() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl exec_pool::Callbacks for Counter {
        fn on_done(&self, _job: &exec_pool::Job) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let done = Arc::new(AtomicUsize::new(0));
    let mut pool = ExecPool::new(cfg(1)).unwrap();
    // Fill the only slot with a long sleep, then queue a second job behind it.
    let blocker = JobBuilder::new("blocker", vec!["/bin/sleep".into(), "10".into()])
        .build()
        .unwrap();
    let queued = JobBuilder::new("queued", vec!["/bin/true".into()])
        .callbacks(Arc::new(Counter(done.clone())))
        .build()
        .unwrap();
    pool.execute(blocker, false).unwrap();
    pool.execute(queued, false).unwrap();

    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 0);
}
