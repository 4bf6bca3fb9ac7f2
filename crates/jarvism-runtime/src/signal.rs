//! OS-signal-driven cancellation
//!
//! The first of SIGHUP, SIGINT, SIGTERM or SIGQUIT cancels the root token,
//! which kills every running command and unblocks every checker. The
//! listener exits on its own when the run finishes first.

use crate::cancel::CancelToken;
use tokio::task::JoinHandle;

#[cfg(unix)]
pub fn spawn_signal_handler(cancel: CancelToken) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};
    tokio::spawn(async move {
        let mut hup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
        let mut int = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        let mut quit = signal(SignalKind::quit()).expect("install SIGQUIT handler");
        tokio::select! {
            _ = hup.recv() => {}
            _ = int.recv() => {}
            _ = term.recv() => {}
            _ = quit.recv() => {}
            _ = cancel.cancelled() => return,
        }
        log::info!("signal received, canceling run");
        cancel.cancel();
    })
}

#[cfg(not(unix))]
pub fn spawn_signal_handler(cancel: CancelToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("signal received, canceling run");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}
