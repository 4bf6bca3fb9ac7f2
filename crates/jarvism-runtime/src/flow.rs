//! Run flows
//!
//! A flow owns one build phase and the tests grouped under that build's
//! fingerprint. Flows run in parallel; inside a flow the build runs first
//! and the tests run in parallel after it succeeds. Per-phase results go
//! out on the runtime's channels; the shared job limiter bounds how much
//! of this happens at once.

use crate::cancel::CancelToken;
use crate::exec::{FlowExecutor, RunLog, CHECKER_PIPE_CAPACITY};
use crate::limiter::JobLimiter;
use indexmap::IndexMap;
use jarvism_ast::{
    new_checker, Build, Runner, RuntimeResult, RuntimeStatus, TestCase, NAME_SEP,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;

/// Everything a flow (and its test tasks) needs from the runtime
#[derive(Clone)]
pub(crate) struct FlowCtx {
    pub cancel: CancelToken,
    pub log: RunLog,
    pub limiter: JobLimiter,
    pub runner: Arc<dyn Runner>,
    pub build_done: mpsc::Sender<RuntimeResult>,
    pub test_done: mpsc::Sender<RuntimeResult>,
    pub sim_only: bool,
    pub mirror_stdout: bool,
}

pub(crate) struct RunFlow {
    pub build: Build,
    pub tests: IndexMap<String, TestCase>,
}

impl RunFlow {
    pub fn new(build: Build) -> Self {
        RunFlow {
            build,
            tests: IndexMap::new(),
        }
    }

    /// Adopt a concrete test case, prefixing its name with the flow build
    ///
    /// Returns how many tests were actually added; a name collision means
    /// the case is already scheduled.
    pub fn add_test(&mut self, mut test: TestCase) -> usize {
        test.spec.name = format!("{}{}{}", self.build.name, NAME_SEP, test.spec.name);
        test.build = Some(self.build.clone());
        if self.tests.contains_key(test.name()) {
            return 0;
        }
        self.tests.insert(test.name().to_string(), test);
        1
    }

    /// Execute the flow; `flow_permit` is released once the build is done
    pub async fn run(mut self, ctx: FlowCtx, flow_permit: Option<OwnedSemaphorePermit>) {
        if !ctx.sim_only {
            let result = prepare_build_phase(&ctx, &self.build).await;
            if result.status != RuntimeStatus::Pass {
                let _ = ctx.build_done.send(result).await;
                drop(flow_permit);
                return;
            }
            let result = build_phase(&ctx, &self.build).await;
            let ok = result.status == RuntimeStatus::Pass;
            let _ = ctx.build_done.send(result).await;
            if !ok {
                drop(flow_permit);
                return;
            }
        }
        drop(flow_permit);

        let mut handles = Vec::new();
        for (_, test) in std::mem::take(&mut self.tests) {
            let permit = ctx.limiter.acquire().await;
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = prepare_test_phase(&ctx, &test).await;
                if result.status != RuntimeStatus::Pass {
                    let _ = ctx.test_done.send(result).await;
                    return;
                }
                let result = run_test_phase(&ctx, &test).await;
                let _ = ctx.test_done.send(result).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn plain_executor(ctx: &FlowCtx) -> FlowExecutor {
    FlowExecutor::new(ctx.cancel.clone(), ctx.log.clone(), ctx.mirror_stdout)
}

async fn prepare_build_phase(ctx: &FlowCtx, build: &Build) -> RuntimeResult {
    log::info!("[BEGIN] prepare {}", build.name);
    let exec = plain_executor(ctx);
    let result = ctx.runner.prepare_build(build, &exec).await.named(&build.name);
    if result.status != RuntimeStatus::Pass {
        log::warn!("{}", result);
    }
    result
}

async fn build_phase(ctx: &FlowCtx, build: &Build) -> RuntimeResult {
    let result = checked_phase(ctx, &build.checker, |exec| async move {
        ctx.runner.build(build, &exec).await
    })
    .await
    .named(&build.name);
    log::info!("{}", result);
    result
}

async fn prepare_test_phase(ctx: &FlowCtx, test: &TestCase) -> RuntimeResult {
    log::info!("[BEGIN] prepare {}", test.name());
    let exec = plain_executor(ctx);
    let result = ctx.runner.prepare_test(test, &exec).await.named(test.name());
    if result.status != RuntimeStatus::Pass {
        log::warn!("{}", result);
    }
    result
}

async fn run_test_phase(ctx: &FlowCtx, test: &TestCase) -> RuntimeResult {
    let result = checked_phase(ctx, &test.checker, |exec| async move {
        ctx.runner.run_test(test, &exec).await
    })
    .await
    .named(test.name());
    log::info!("{}", result);
    result
}

/// Wire a checker onto the executor, run the phase, merge both outcomes
///
/// The checker reads the pipe side of the command's stdout fan-out; its
/// result is raced against cancellation so a cancelled run never waits on
/// a stuck read.
async fn checked_phase<F, Fut>(ctx: &FlowCtx, checker_name: &str, run: F) -> RuntimeResult
where
    F: FnOnce(FlowExecutor) -> Fut,
    Fut: std::future::Future<Output = RuntimeResult>,
{
    let checker = match new_checker(checker_name) {
        Ok(checker) => checker,
        Err(e) => return RuntimeResult::unknown(e.to_string()),
    };
    let (rd, wr) = tokio::io::duplex(CHECKER_PIPE_CAPACITY);
    let check_handle = tokio::spawn(async move { checker.check(Box::new(rd)).await });

    let exec = FlowExecutor::with_checker(
        ctx.cancel.clone(),
        ctx.log.clone(),
        ctx.mirror_stdout,
        wr,
    );
    let exec_result = run(exec).await;

    let check_result = tokio::select! {
        result = check_handle => {
            result.unwrap_or_else(|e| RuntimeResult::unknown(format!("checker panicked: {}", e)))
        }
        _ = ctx.cancel.cancelled() => RuntimeResult::unknown("context canceled"),
    };
    RuntimeResult::merge(exec_result, check_result)
}
