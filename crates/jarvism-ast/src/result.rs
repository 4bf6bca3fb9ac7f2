//! Runtime result severities
//!
//! Every phase of a run (prepare-build, build, prepare-test, run-test)
//! produces a [`RuntimeResult`]. Severities are strictly ordered so the
//! worst of several observations can be taken with `max`.

use std::fmt;

/// Outcome severity, ordered `Pass < Warning < Fail < Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeStatus {
    Pass,
    Warning,
    Fail,
    Unknown,
}

impl RuntimeStatus {
    pub const ALL: [RuntimeStatus; 4] = [
        RuntimeStatus::Pass,
        RuntimeStatus::Warning,
        RuntimeStatus::Fail,
        RuntimeStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeStatus::Pass => "PASS",
            RuntimeStatus::Warning => "WARNING",
            RuntimeStatus::Fail => "FAIL",
            RuntimeStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one phase, tagged with the entity it belongs to
#[derive(Debug, Clone)]
pub struct RuntimeResult {
    pub name: String,
    pub status: RuntimeStatus,
    pub message: String,
}

impl RuntimeResult {
    pub fn new(status: RuntimeStatus, message: impl Into<String>) -> Self {
        RuntimeResult {
            name: String::new(),
            status,
            message: message.into(),
        }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(RuntimeStatus::Pass, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(RuntimeStatus::Warning, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(RuntimeStatus::Fail, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RuntimeStatus::Unknown, message)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Worst status of the two, with both messages kept
    pub fn merge(exec: RuntimeResult, check: RuntimeResult) -> RuntimeResult {
        let status = exec.status.max(check.status);
        let message = match (check.message.is_empty(), exec.message.is_empty()) {
            (true, true) => String::new(),
            (true, false) => exec.message,
            (false, true) => check.message,
            (false, false) => format!("{}\n{}", check.message, exec.message),
        };
        RuntimeResult {
            name: exec.name,
            status,
            message,
        }
    }
}

impl fmt::Display for RuntimeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "[{}] {}", self.status, self.name)
        } else {
            write!(f, "[{}] {}: {}", self.status, self.name, self.message)
        }
    }
}
