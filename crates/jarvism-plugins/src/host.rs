//! Host runner
//!
//! Runs simulator commands on the local machine. Prepare phases scaffold
//! per-build and per-test directories under the working directory and drop
//! a shell script reproducing the command; run phases hand the actual
//! invocation to the engine's executor, which owns cancellation and stdout
//! routing.

use async_trait::async_trait;
use jarvism_ast::{cur_simulator, Build, CmdAttr, CmdExecutor, Runner, RuntimeResult, TestCase};
use jarvism_config::work_dir;
use std::path::{Path, PathBuf};

pub struct HostRunner;

fn build_dir(build: &Build) -> Result<PathBuf, RuntimeResult> {
    work_dir()
        .map(|dir| dir.join(&build.name))
        .map_err(|e| RuntimeResult::unknown(e.to_string()))
}

async fn scaffold(dir: &Path, script: &str, cmd_line: String) -> Result<(), RuntimeResult> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RuntimeResult::unknown(format!("mkdir {}: {}", dir.display(), e)))?;
    let path = dir.join(script);
    let contents = format!("#!/bin/sh\ncd {}\n{}\n", dir.display(), cmd_line);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| RuntimeResult::unknown(format!("write {}: {}", path.display(), e)))?;
    Ok(())
}

#[async_trait]
impl Runner for HostRunner {
    fn name(&self) -> &'static str {
        "host"
    }

    async fn prepare_build(&self, build: &Build, _exec: &dyn CmdExecutor) -> RuntimeResult {
        let sim = match cur_simulator() {
            Ok(sim) => sim,
            Err(e) => return RuntimeResult::unknown(e.to_string()),
        };
        let dir = match build_dir(build) {
            Ok(dir) => dir,
            Err(r) => return r,
        };
        let cmd_line = format!("{} {}", sim.compile_cmd(), build.items.compile_args().join(" "));
        match scaffold(&dir, "compile.sh", cmd_line).await {
            Ok(()) => RuntimeResult::pass(""),
            Err(r) => r,
        }
    }

    async fn build(&self, build: &Build, exec: &dyn CmdExecutor) -> RuntimeResult {
        let sim = match cur_simulator() {
            Ok(sim) => sim,
            Err(e) => return RuntimeResult::unknown(e.to_string()),
        };
        let dir = match build_dir(build) {
            Ok(dir) => dir,
            Err(r) => return r,
        };
        exec.exec(
            CmdAttr::in_dir(dir),
            sim.compile_cmd(),
            &build.items.compile_args(),
        )
        .await
    }

    async fn prepare_test(&self, test: &TestCase, _exec: &dyn CmdExecutor) -> RuntimeResult {
        let Some(build) = test.build() else {
            return RuntimeResult::unknown(format!("test {} carries no build", test.name()));
        };
        let sim = match cur_simulator() {
            Ok(sim) => sim,
            Err(e) => return RuntimeResult::unknown(e.to_string()),
        };
        let build_dir = match build_dir(build) {
            Ok(dir) => dir,
            Err(r) => return r,
        };
        let dir = build_dir.join(test.name());
        let simv = build_dir.join(sim.sim_cmd());
        let cmd_line = format!("{} {}", simv.display(), test.items.sim_args().join(" "));
        match scaffold(&dir, "sim.sh", cmd_line).await {
            Ok(()) => RuntimeResult::pass(""),
            Err(r) => r,
        }
    }

    async fn run_test(&self, test: &TestCase, exec: &dyn CmdExecutor) -> RuntimeResult {
        let Some(build) = test.build() else {
            return RuntimeResult::unknown(format!("test {} carries no build", test.name()));
        };
        let sim = match cur_simulator() {
            Ok(sim) => sim,
            Err(e) => return RuntimeResult::unknown(e.to_string()),
        };
        let build_dir = match build_dir(build) {
            Ok(dir) => dir,
            Err(r) => return r,
        };
        let simv = build_dir.join(sim.sim_cmd());
        exec.exec(
            CmdAttr::in_dir(build_dir.join(test.name())),
            &simv.display().to_string(),
            &test.items.sim_args(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvism_ast::{OptKey, RuntimeStatus};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeExec {
        calls: Mutex<Vec<(Option<PathBuf>, String, Vec<String>)>>,
    }

    #[async_trait]
    impl CmdExecutor for FakeExec {
        async fn exec(&self, attr: CmdAttr, program: &str, args: &[String]) -> RuntimeResult {
            self.calls
                .lock()
                .unwrap()
                .push((attr.cwd, program.to_string(), args.to_vec()));
            RuntimeResult::pass("")
        }
    }

    fn setup(tag: &str) -> (PathBuf, Build, TestCase) {
        crate::register_all();
        static WORK: std::sync::OnceLock<PathBuf> = std::sync::OnceLock::new();
        let work = WORK
            .get_or_init(|| {
                let dir = std::env::temp_dir().join("jvs_host_runner_tests");
                std::fs::create_dir_all(&dir).unwrap();
                jarvism_config::set_work_dir(&dir);
                dir
            })
            .clone();

        let mut build = Build::new(&format!("20260101_000000000__{}_abcd", tag));
        build.items.cat_item(OptKey::Compile, "-full64 -sverilog");
        let mut test = TestCase::new("test1__1");
        test.items.cat_item(OptKey::Sim, "+ntb_random_seed=1");
        test.build = Some(build.clone());
        (work, build, test)
    }

    #[tokio::test]
    async fn test_prepare_build_scaffolds_dir_and_script() {
        let (work, build, _test) = setup("prep");
        let exec = FakeExec::default();
        let result = HostRunner.prepare_build(&build, &exec).await;
        assert_eq!(result.status, RuntimeStatus::Pass);
        let dir = work.join(&build.name);
        assert!(dir.is_dir());
        let script = std::fs::read_to_string(dir.join("compile.sh")).unwrap();
        assert!(script.contains("vcs -full64 -sverilog"), "{}", script);
    }

    #[tokio::test]
    async fn test_build_invokes_compile_cmd_in_build_dir() {
        let (work, build, _test) = setup("compile");
        let exec = FakeExec::default();
        HostRunner.build(&build, &exec).await;
        let calls = exec.calls.lock().unwrap();
        let (cwd, program, args) = &calls[0];
        assert_eq!(cwd.as_deref(), Some(work.join(&build.name).as_path()));
        assert_eq!(program, "vcs");
        assert_eq!(args, &vec!["-full64".to_string(), "-sverilog".to_string()]);
    }

    #[tokio::test]
    async fn test_run_test_invokes_simv_from_test_dir() {
        let (work, build, test) = setup("sim");
        let exec = FakeExec::default();
        HostRunner.prepare_test(&test, &exec).await;
        HostRunner.run_test(&test, &exec).await;
        let calls = exec.calls.lock().unwrap();
        let (cwd, program, args) = &calls[0];
        let build_dir = work.join(&build.name);
        assert_eq!(cwd.as_deref(), Some(build_dir.join(test.name()).as_path()));
        assert_eq!(program, &build_dir.join("simv").display().to_string());
        assert_eq!(args, &vec!["+ntb_random_seed=1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_build_is_unknown() {
        let (_work, _build, mut test) = setup("nobuild");
        test.build = None;
        let exec = FakeExec::default();
        let result = HostRunner.run_test(&test, &exec).await;
        assert_eq!(result.status, RuntimeStatus::Unknown);
    }
}
