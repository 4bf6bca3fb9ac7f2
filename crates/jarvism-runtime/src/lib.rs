//! jarvism execution engine
//!
//! Takes a linked plan, groups its flattened test cases into flows (one per
//! distinct build fingerprint) and executes them: flows in parallel, the
//! build first inside each flow, tests in parallel after it, everything
//! bounded by one shared job limiter. Per-phase results stream through a
//! single monitor task into the registered reporters.
//!
//! The entry points [`run_group`], [`run_test`] and [`run_only_build`]
//! wrap a configuration snippet into a synthetic top-level group, graft it
//! onto the caller's root and run it.

mod cancel;
mod error;
mod exec;
mod flow;
mod limiter;
mod report;
mod signal;

pub use cancel::CancelToken;
pub use error::{Result, RuntimeError};
pub use limiter::JobLimiter;
pub use report::{register_reporter, Reporter, ReporterFactory, StatusCounts};
pub use signal::spawn_signal_handler;

use crate::exec::RunLog;
use crate::flow::{FlowCtx, RunFlow};
use crate::report::{registered_reporters, StatusReporter};
use indexmap::IndexMap;
use jarvism_ast::{
    cur_runner, cur_simulator, fingerprint_of, AstError, Group, Root, Runner, RuntimeResult,
    MAX_JOB_OPT, NAME_SEP, SIM_ONLY_OPT, UNIQUE_OPT,
};
use jarvism_config::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Name of the synthetic top-level group the entry points graft onto the root
pub const ENTRY_GROUP: &str = "jarvism";

/// Aggregate outcome of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub name: String,
    pub runtime_id: String,
    pub flow_count: usize,
    pub total_test: usize,
    /// Command stdout was mirrored to the real stdout (single-run mode)
    pub mirror_stdout: bool,
    pub counts: StatusCounts,
    pub log_file: PathBuf,
}

impl RunSummary {
    /// Non-zero exit is owed iff any phase failed
    pub fn has_fail(&self) -> bool {
        self.counts.has_fail()
    }

    pub fn render(&self) -> String {
        format!(
            "{} [{}]: {} flow(s), {} test(s)\n{}\nlogFile: {}",
            self.name,
            self.runtime_id,
            self.flow_count,
            self.total_test,
            self.counts.render(),
            self.log_file.display()
        )
    }
}

pub struct Runtime {
    name: String,
    runtime_id: String,
    work_dir: PathBuf,
    flows: IndexMap<String, RunFlow>,
    total_test: usize,
    mirror_stdout: bool,
    max_job: i64,
    sim_only: bool,
    unique: bool,
    runner: Arc<dyn Runner>,
    cancel: CancelToken,
    reporters: Vec<Box<dyn Reporter>>,
    counts: Arc<Mutex<StatusCounts>>,
}

impl Runtime {
    /// Build the flow set for one linked group of `root`
    pub fn new(name: &str, root: &Root, group_name: &str, cancel: CancelToken) -> Result<Runtime> {
        let group = root
            .group(group_name)
            .ok_or_else(|| AstError::UnknownGroup(group_name.to_string()))?;
        let engine_args = root.merged_option_args(&group.spec);
        let max_job = engine_args
            .get(MAX_JOB_OPT)
            .map(|o| o.as_i64())
            .unwrap_or(-1);
        let sim_only = engine_args
            .get(SIM_ONLY_OPT)
            .map(|o| o.as_bool())
            .unwrap_or(false);
        let unique = engine_args
            .get(UNIQUE_OPT)
            .map(|o| o.as_bool())
            .unwrap_or(false);
        let simulator = cur_simulator()?;

        let mut rt = Runtime {
            name: name.to_string(),
            runtime_id: make_runtime_id(),
            work_dir: root.env.work_dir.clone(),
            flows: IndexMap::new(),
            total_test: 0,
            mirror_stdout: false,
            max_job,
            sim_only,
            unique,
            runner: cur_runner()?,
            cancel,
            reporters: Vec::new(),
            counts: Arc::new(Mutex::new(StatusCounts::default())),
        };

        for mut template in root.collect_test_cases(group_name)? {
            root.apply_args(&mut template);
            let build_name = template
                .resolved_build
                .clone()
                .ok_or_else(|| RuntimeError::NoBuild(template.name().to_string()))?;
            let build = root
                .build(&build_name)
                .ok_or_else(|| RuntimeError::NoBuild(template.name().to_string()))?;
            let key = rt.flow_key(build);
            rt.ensure_flow(&key, build);
            let flow = rt.flows.get_mut(&key).expect("flow just ensured");
            for concrete in template.expand(simulator.seed_option()) {
                rt.total_test += flow.add_test(concrete);
            }
        }

        // build-only runs still get exactly one flow
        if rt.total_test == 0 && rt.flows.is_empty() {
            let build_name = root
                .inherited_build_of_group(group_name)
                .ok_or_else(|| RuntimeError::NoBuild(group_name.to_string()))?;
            let build = root
                .build(&build_name)
                .ok_or_else(|| AstError::UndefBuild {
                    build: build_name.clone(),
                    item: group_name.to_string(),
                })?;
            let key = rt.flow_key(build);
            rt.ensure_flow(&key, build);
        }
        rt.mirror_stdout = rt.total_test <= 1;

        let mut reporters: Vec<Box<dyn Reporter>> =
            vec![Box::new(StatusReporter::new(rt.counts.clone()))];
        reporters.extend(registered_reporters());
        for reporter in reporters.iter_mut() {
            reporter.init(&rt.runtime_id, rt.flows.len(), rt.total_test);
        }
        rt.reporters = reporters;
        Ok(rt)
    }

    fn flow_key(&self, build: &jarvism_ast::Build) -> String {
        if self.unique {
            fingerprint_of(&format!("{}{}", self.runtime_id, build.raw_sign()))
        } else {
            build.fingerprint()
        }
    }

    fn ensure_flow(&mut self, key: &str, build: &jarvism_ast::Build) {
        if !self.flows.contains_key(key) {
            let mut clone = build.clone();
            clone.name = format!("{}{}{}_{}", self.runtime_id, NAME_SEP, build.name, key);
            self.flows.insert(key.to_string(), RunFlow::new(clone));
        }
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn total_test(&self) -> usize {
        self.total_test
    }

    pub fn mirror_stdout(&self) -> bool {
        self.mirror_stdout
    }

    /// Run all flows to completion and aggregate the results
    pub async fn run(mut self) -> Result<RunSummary> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| RuntimeError::io(self.work_dir.display(), e))?;
        let log = RunLog::create(&self.work_dir, &self.runtime_id).await?;

        // sized so a cancelled flow can always drain its in-flight sends
        let capacity = self.flows.len() + self.total_test + 1;
        let (build_tx, build_rx) = mpsc::channel(capacity);
        let (test_tx, test_rx) = mpsc::channel(capacity);
        let limiter = JobLimiter::new(self.max_job);

        let reporters = std::mem::take(&mut self.reporters);
        let monitor = tokio::spawn(monitor(build_rx, test_rx, reporters));

        let mut handles = Vec::new();
        for (_, flow) in std::mem::take(&mut self.flows) {
            let permit = limiter.acquire().await;
            let ctx = FlowCtx {
                cancel: self.cancel.clone(),
                log: log.clone(),
                limiter: limiter.clone(),
                runner: self.runner.clone(),
                build_done: build_tx.clone(),
                test_done: test_tx.clone(),
                sim_only: self.sim_only,
                mirror_stdout: self.mirror_stdout,
            };
            handles.push(tokio::spawn(flow.run(ctx, permit)));
        }
        drop(build_tx);
        drop(test_tx);

        let flow_count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        self.cancel.cancel();
        let _ = monitor.await;

        let counts = self
            .counts
            .lock()
            .expect("status counts poisoned")
            .clone();
        let summary = RunSummary {
            name: self.name,
            runtime_id: self.runtime_id,
            flow_count,
            total_test: self.total_test,
            mirror_stdout: self.mirror_stdout,
            counts,
            log_file: log.path().to_path_buf(),
        };
        log::info!("logFile: {}", summary.log_file.display());
        Ok(summary)
    }
}

/// Single consumer of the per-phase result channels
async fn monitor(
    mut build_rx: mpsc::Receiver<RuntimeResult>,
    mut test_rx: mpsc::Receiver<RuntimeResult>,
    mut reporters: Vec<Box<dyn Reporter>>,
) {
    let mut builds_open = true;
    let mut tests_open = true;
    while builds_open || tests_open {
        tokio::select! {
            result = build_rx.recv(), if builds_open => match result {
                Some(result) => {
                    for reporter in reporters.iter_mut() {
                        reporter.collect_build_result(&result);
                    }
                }
                None => builds_open = false,
            },
            result = test_rx.recv(), if tests_open => match result {
                Some(result) => {
                    for reporter in reporters.iter_mut() {
                        reporter.collect_test_result(&result);
                    }
                }
                None => tests_open = false,
            },
        }
    }
    for reporter in reporters.iter_mut() {
        reporter.report();
    }
}

fn make_runtime_id() -> String {
    chrono::Local::now()
        .format("%Y%m%d_%H%M%S%.3f")
        .to_string()
        .replace('.', "")
}

/// Keep only argv fragments that resolve to a registered option
fn filter_args(root: &Root, args: &[String]) -> Value {
    Value::List(
        args.iter()
            .filter(|a| root.options.knows_arg(a))
            .map(|a| Value::Str(a.clone()))
            .collect(),
    )
}

async fn run_entry(
    root: &mut Root,
    name: &str,
    cfg: Value,
    cancel: CancelToken,
) -> Result<RunSummary> {
    let entry_cfg = cfg.as_map(ENTRY_GROUP)?;
    let mut entry = Group::new(ENTRY_GROUP);
    entry.parse(&entry_cfg).map_err(RuntimeError::Ast)?;
    root.adopt_group(entry).map_err(RuntimeError::Ast)?;
    let runtime = Runtime::new(name, root, ENTRY_GROUP, cancel)?;
    runtime.run().await
}

/// Run every test of a configured group
pub async fn run_group(
    root: &mut Root,
    group_name: &str,
    args: &[String],
    cancel: CancelToken,
) -> Result<RunSummary> {
    let mut cfg = IndexMap::new();
    cfg.insert("args".to_string(), filter_args(root, args));
    cfg.insert(
        "groups".to_string(),
        Value::List(vec![Value::Str(group_name.to_string())]),
    );
    run_entry(root, group_name, Value::Map(cfg), cancel).await
}

/// Run one test against one build
pub async fn run_test(
    root: &mut Root,
    test_name: &str,
    build_name: &str,
    args: &[String],
    cancel: CancelToken,
) -> Result<RunSummary> {
    let mut cfg = IndexMap::new();
    cfg.insert("build".to_string(), Value::Str(build_name.to_string()));
    cfg.insert("args".to_string(), filter_args(root, args));
    cfg.insert(
        "tests".to_string(),
        Value::Map(IndexMap::from([(test_name.to_string(), Value::Null)])),
    );
    run_entry(root, test_name, Value::Map(cfg), cancel).await
}

/// Run a build with no tests
pub async fn run_only_build(
    root: &mut Root,
    build_name: &str,
    args: &[String],
    cancel: CancelToken,
) -> Result<RunSummary> {
    let mut cfg = IndexMap::new();
    cfg.insert("build".to_string(), Value::Str(build_name.to_string()));
    cfg.insert("args".to_string(), filter_args(root, args));
    run_entry(root, build_name, Value::Map(cfg), cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jarvism_ast::{
        register_runner, set_cur_runner, Build, CmdExecutor, RuntimeStatus, TestCase,
    };
    use jarvism_config::load_str;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex as StdMutex, Once, OnceLock};
    use std::time::Duration;

    /// Runner that never spawns; tracks peak phase concurrency
    struct MockRunner {
        name: &'static str,
        fail_build: bool,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockRunner {
        fn new(name: &'static str, fail_build: bool) -> Arc<Self> {
            Arc::new(MockRunner {
                name,
                fail_build,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        async fn busy(&self) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        fn reset_peak(&self) {
            self.peak.store(0, Ordering::SeqCst);
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Runner for MockRunner {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn prepare_build(&self, _: &Build, _: &dyn CmdExecutor) -> RuntimeResult {
            RuntimeResult::pass("")
        }
        async fn build(&self, _: &Build, _: &dyn CmdExecutor) -> RuntimeResult {
            if self.fail_build {
                return RuntimeResult::fail("forced build failure");
            }
            self.busy().await;
            RuntimeResult::pass("")
        }
        async fn prepare_test(&self, _: &TestCase, _: &dyn CmdExecutor) -> RuntimeResult {
            RuntimeResult::pass("")
        }
        async fn run_test(&self, _: &TestCase, _: &dyn CmdExecutor) -> RuntimeResult {
            self.busy().await;
            RuntimeResult::pass("")
        }
    }

    fn mock() -> &'static Arc<MockRunner> {
        static MOCK: OnceLock<Arc<MockRunner>> = OnceLock::new();
        MOCK.get_or_init(|| MockRunner::new("mock", false))
    }

    fn mock_fail() -> &'static Arc<MockRunner> {
        static MOCK_FAIL: OnceLock<Arc<MockRunner>> = OnceLock::new();
        MOCK_FAIL.get_or_init(|| MockRunner::new("mock_fail", true))
    }

    fn init_plugins() {
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            std::env::set_var("JVS_PRJ_HOME", std::env::temp_dir().join("jvs_rt_tests"));
            jarvism_plugins::register_all();
            register_runner(mock().clone());
            register_runner(mock_fail().clone());
        });
    }

    /// Scenario tests share process-wide runner selection; serialize them
    fn scenario_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<StdMutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| StdMutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn scenario_root(work_dir: &std::path::Path) -> Root {
        let yaml = format!(
            r#"
env:
  work_dir: {}
builds:
  build1:
    compile_option: -full64
  build2:
    compile_option: -sverilog
groups:
  group1:
    build: build1
    args: ["-repeat 1"]
    tests:
      test1:
      test2:
  group2:
    tests:
      test1:
        build: build1
      test2:
        build: build2
"#,
            work_dir.display()
        );
        Root::from_cfg(&load_str(&yaml).unwrap()).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Root, std::sync::MutexGuard<'static, ()>) {
        init_plugins();
        let guard = scenario_lock();
        set_cur_runner("mock").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = scenario_root(dir.path());
        (dir, root, guard)
    }

    #[tokio::test]
    async fn test_group1_has_one_flow_and_two_tests() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_group(&mut root, "group1", &[], CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.flow_count, 1);
        assert_eq!(summary.total_test, 2);
        assert_eq!(summary.counts.build(RuntimeStatus::Pass), 1);
        assert_eq!(summary.counts.test_total(), 2);
        assert!(!summary.has_fail());
        assert!(summary.log_file.exists());
    }

    #[tokio::test]
    async fn test_group2_builds_two_flows() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_group(&mut root, "group2", &[], CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.flow_count, 2);
        assert_eq!(summary.counts.build(RuntimeStatus::Pass), 2);
        assert_eq!(summary.counts.test_total(), 2);
    }

    #[tokio::test]
    async fn test_single_seeded_test_mirrors_stdout() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_test(
            &mut root,
            "test1",
            "build1",
            &["-seed 1".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.total_test, 1);
        assert!(summary.mirror_stdout);
    }

    #[tokio::test]
    async fn test_repeat_expands_into_ten_results() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_test(
            &mut root,
            "test1",
            "build1",
            &["-repeat 10".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.counts.build(RuntimeStatus::Pass), 1);
        assert_eq!(summary.counts.test_total(), 10);
    }

    #[tokio::test]
    async fn test_sim_only_skips_build_phases() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_test(
            &mut root,
            "test1",
            "build1",
            &["-sim_only".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.counts.build_total(), 0);
        assert_eq!(summary.counts.test_total(), 1);
    }

    #[tokio::test]
    async fn test_build_only_run_collects_one_build_result() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_only_build(
            &mut root,
            "build1",
            &["-test_phase jarvis".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.flow_count, 1);
        assert_eq!(summary.total_test, 0);
        assert!(summary.mirror_stdout);
        assert_eq!(summary.counts.build_total(), 1);
        assert_eq!(summary.counts.test_total(), 0);
    }

    #[tokio::test]
    async fn test_max_job_one_never_overlaps() {
        let (_dir, mut root, _guard) = setup();
        mock().reset_peak();
        let summary = run_group(
            &mut root,
            "group2",
            &["-max_job 1".to_string(), "-repeat 3".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.counts.test_total(), 6);
        assert!(mock().peak() <= 1, "peak concurrency {}", mock().peak());
    }

    #[tokio::test]
    async fn test_unknown_args_are_filtered_out() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_group(
            &mut root,
            "group1",
            &["-repeat 2".to_string(), "-bogus xyz".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.counts.test_total(), 4);
    }

    #[tokio::test]
    async fn test_failed_build_skips_tests() {
        let (_dir, mut root, _guard) = setup();
        set_cur_runner("mock_fail").unwrap();
        let summary = run_group(&mut root, "group1", &[], CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.counts.build(RuntimeStatus::Fail), 1);
        assert_eq!(summary.counts.test_total(), 0);
        assert!(summary.has_fail());
    }

    #[tokio::test]
    async fn test_unique_mode_still_coalesces_within_a_run() {
        let (_dir, mut root, _guard) = setup();
        let summary = run_group(
            &mut root,
            "group1",
            &["-unique".to_string()],
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.flow_count, 1);
    }
}
