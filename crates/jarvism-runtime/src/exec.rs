//! Command spawning with stdout fan-out
//!
//! Every external command a runner asks for goes through [`FlowExecutor`].
//! The child's stdout is read line by line and fanned out to the per-run
//! log, the checker pipe when one is attached, any extra sinks from the
//! runner's attribute bundle, and the process stdout in single-run mode.
//! Stderr is buffered and joined into the failure message on non-zero
//! exit. Cancellation kills the child; the checker's write end is closed
//! on every exit path because the executor owns it.

use crate::cancel::CancelToken;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use jarvism_ast::{CmdAttr, CmdExecutor, RuntimeResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Buffer size of the in-memory pipe feeding a checker
pub(crate) const CHECKER_PIPE_CAPACITY: usize = 64 * 1024;

/// Per-run log sink, shared by every flow
#[derive(Clone)]
pub(crate) struct RunLog {
    file: Arc<Mutex<tokio::fs::File>>,
    path: PathBuf,
}

impl RunLog {
    pub async fn create(dir: &Path, runtime_id: &str) -> Result<RunLog> {
        let path = dir.join(format!("{}.log", runtime_id));
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| RuntimeError::io(path.display(), e))?;
        Ok(RunLog {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_line(&self, line: &str) {
        let mut file = self.file.lock().await;
        let _ = file.write_all(line.as_bytes()).await;
        let _ = file.write_all(b"\n").await;
    }
}

/// Engine-owned command executor handed to runner phases
pub(crate) struct FlowExecutor {
    cancel: CancelToken,
    log: RunLog,
    checker_pipe: Mutex<Option<DuplexStream>>,
    mirror_stdout: bool,
}

impl FlowExecutor {
    pub fn new(cancel: CancelToken, log: RunLog, mirror_stdout: bool) -> Self {
        FlowExecutor {
            cancel,
            log,
            checker_pipe: Mutex::new(None),
            mirror_stdout,
        }
    }

    pub fn with_checker(
        cancel: CancelToken,
        log: RunLog,
        mirror_stdout: bool,
        pipe: DuplexStream,
    ) -> Self {
        FlowExecutor {
            cancel,
            log,
            checker_pipe: Mutex::new(Some(pipe)),
            mirror_stdout,
        }
    }
}

#[async_trait]
impl CmdExecutor for FlowExecutor {
    async fn exec(&self, mut attr: CmdAttr, program: &str, args: &[String]) -> RuntimeResult {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &attr.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &attr.envs {
            cmd.env(key, value);
        }
        if let Some(setup) = attr.setup.take() {
            if let Err(e) = setup(&mut cmd) {
                return RuntimeResult::unknown(format!("setup of {}: {}", program, e));
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RuntimeResult::unknown(format!("failed to spawn {}: {}", program, e))
            }
        };
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let checker_wr = self.checker_pipe.lock().await.take();
        let sinks = std::mem::take(&mut attr.sinks);
        let log = self.log.clone();
        let mirror = self.mirror_stdout;

        let fan_out = tokio::spawn(async move {
            let mut checker_wr = checker_wr;
            let mut sinks = sinks;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log.write_line(&line).await;
                if let Some(wr) = checker_wr.as_mut() {
                    let _ = wr.write_all(line.as_bytes()).await;
                    let _ = wr.write_all(b"\n").await;
                }
                for sink in sinks.iter_mut() {
                    let _ = sink.write_all(line.as_bytes()).await;
                    let _ = sink.write_all(b"\n").await;
                }
                if mirror {
                    println!("{}", line);
                }
            }
            for sink in sinks.iter_mut() {
                let _ = sink.shutdown().await;
            }
            // checker_wr drops here, signalling EOF to the checker
        });
        let read_stderr = tokio::spawn(async move {
            let mut buf = String::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_string(&mut buf).await;
            buf
        });

        let status = {
            let wait = child.wait();
            tokio::pin!(wait);
            tokio::select! {
                status = &mut wait => Some(status),
                _ = self.cancel.cancelled() => None,
            }
        };
        let status = match status {
            Some(status) => status,
            None => {
                let _ = child.kill().await;
                let _ = fan_out.await;
                let _ = read_stderr.await;
                return RuntimeResult::unknown("context canceled");
            }
        };
        let _ = fan_out.await;
        let stderr_text = read_stderr.await.unwrap_or_default();

        match status {
            Ok(s) if s.success() => RuntimeResult::pass(""),
            Ok(s) => RuntimeResult::unknown(format!("{}\n{}", stderr_text.trim_end(), s)),
            Err(e) => RuntimeResult::unknown(format!("{}\n{}", stderr_text.trim_end(), e)),
        }
    }
}
