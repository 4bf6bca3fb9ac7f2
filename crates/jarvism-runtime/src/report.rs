//! Result aggregation and reporters
//!
//! Reporters observe every per-phase result of a run. They are registered
//! globally as factories and a fresh set is instantiated per runtime; the
//! monitor task is their single caller, so no reporter needs to be
//! thread-safe beyond `Send`.

use jarvism_ast::{RuntimeResult, RuntimeStatus};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

pub trait Reporter: Send {
    fn init(&mut self, runtime_id: &str, flow_count: usize, test_count: usize);
    fn collect_build_result(&mut self, result: &RuntimeResult);
    fn collect_test_result(&mut self, result: &RuntimeResult);
    /// Called exactly once, after the last result
    fn report(&mut self);
}

pub type ReporterFactory = fn() -> Box<dyn Reporter>;

fn factories() -> &'static RwLock<Vec<ReporterFactory>> {
    static FACTORIES: OnceLock<RwLock<Vec<ReporterFactory>>> = OnceLock::new();
    FACTORIES.get_or_init(|| RwLock::new(Vec::new()))
}

/// Add a reporter to every future runtime
pub fn register_reporter(factory: ReporterFactory) {
    factories().write().expect("reporter registry poisoned").push(factory);
}

pub(crate) fn registered_reporters() -> Vec<Box<dyn Reporter>> {
    factories()
        .read()
        .expect("reporter registry poisoned")
        .iter()
        .map(|f| f())
        .collect()
}

/// Per-severity build and test counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    builds: [usize; 4],
    tests: [usize; 4],
}

impl StatusCounts {
    fn idx(status: RuntimeStatus) -> usize {
        match status {
            RuntimeStatus::Pass => 0,
            RuntimeStatus::Warning => 1,
            RuntimeStatus::Fail => 2,
            RuntimeStatus::Unknown => 3,
        }
    }

    pub fn build(&self, status: RuntimeStatus) -> usize {
        self.builds[Self::idx(status)]
    }

    pub fn test(&self, status: RuntimeStatus) -> usize {
        self.tests[Self::idx(status)]
    }

    pub fn build_total(&self) -> usize {
        self.builds.iter().sum()
    }

    pub fn test_total(&self) -> usize {
        self.tests.iter().sum()
    }

    /// Whether any phase failed
    pub fn has_fail(&self) -> bool {
        self.build(RuntimeStatus::Fail) + self.test(RuntimeStatus::Fail) > 0
    }

    pub(crate) fn bump_build(&mut self, status: RuntimeStatus) {
        self.builds[Self::idx(status)] += 1;
    }

    pub(crate) fn bump_test(&mut self, status: RuntimeStatus) {
        self.tests[Self::idx(status)] += 1;
    }

    pub fn render(&self) -> String {
        let line = |label: &str, counts: &[usize; 4]| {
            format!(
                "{}: PASS {} / WARNING {} / FAIL {} / UNKNOWN {}",
                label, counts[0], counts[1], counts[2], counts[3]
            )
        };
        format!("{}\n{}", line("builds", &self.builds), line("tests", &self.tests))
    }
}

/// Built-in reporter keeping the running status counts
pub(crate) struct StatusReporter {
    runtime_id: String,
    counts: Arc<Mutex<StatusCounts>>,
}

impl StatusReporter {
    pub fn new(counts: Arc<Mutex<StatusCounts>>) -> Self {
        StatusReporter {
            runtime_id: String::new(),
            counts,
        }
    }
}

impl Reporter for StatusReporter {
    fn init(&mut self, runtime_id: &str, _flow_count: usize, _test_count: usize) {
        self.runtime_id = runtime_id.to_string();
    }

    fn collect_build_result(&mut self, result: &RuntimeResult) {
        self.counts
            .lock()
            .expect("status counts poisoned")
            .bump_build(result.status);
    }

    fn collect_test_result(&mut self, result: &RuntimeResult) {
        self.counts
            .lock()
            .expect("status counts poisoned")
            .bump_test(result.status);
    }

    fn report(&mut self) {
        let counts = self.counts.lock().expect("status counts poisoned");
        log::info!("run {} finished\n{}", self.runtime_id, counts.render());
    }
}
