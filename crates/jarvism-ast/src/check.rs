//! Regex-driven stream checker
//!
//! [`PatternChecker`] is the base most checker plugins are built from: an
//! ordered pattern list, each carrying a severity. Lines are read until EOF;
//! the first matching pattern classifies a line and the worst classification
//! wins. A stream with no matches is a pass.

use crate::plugins::{Checker, CheckStream};
use crate::result::{RuntimeResult, RuntimeStatus};
use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct CheckPattern {
    pub status: RuntimeStatus,
    pub regex: Regex,
}

pub struct PatternChecker {
    name: &'static str,
    patterns: Vec<CheckPattern>,
}

impl PatternChecker {
    pub fn new(name: &'static str) -> Self {
        PatternChecker {
            name,
            patterns: Vec::new(),
        }
    }

    /// Append a pattern; a malformed regex is a programmer error
    pub fn pattern(mut self, status: RuntimeStatus, pattern: &str) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("checker {}: bad pattern {}: {}", self.name, pattern, e));
        self.patterns.push(CheckPattern { status, regex });
        self
    }
}

#[async_trait]
impl Checker for PatternChecker {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self, input: CheckStream) -> RuntimeResult {
        let mut lines = BufReader::new(input).lines();
        let mut worst = RuntimeStatus::Pass;
        let mut message = String::new();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                // EOF, or the write end went away mid-line
                Ok(None) | Err(_) => break,
            };
            for pat in &self.patterns {
                if pat.regex.is_match(&line) {
                    if pat.status > worst {
                        worst = pat.status;
                        message = line.clone();
                    }
                    break;
                }
            }
        }
        RuntimeResult::new(worst, message)
    }
}
