//! UVM test discoverer
//!
//! A test is a subdirectory of the discoverer's test directory. The
//! directory defaults to `$JVS_PRJ_HOME/testcases` and can be moved per
//! build with the `test_dir` attribute (relative paths resolve against the
//! project root).

use indexmap::IndexMap;
use jarvism_ast::{AstError, Result, TestDiscoverer, DEFAULT_DISCOVERER};
use jarvism_config::{prj_home, Value};
use std::path::PathBuf;

pub struct UvmDiscoverer {
    test_dir: PathBuf,
}

pub fn new_uvm_discoverer() -> Box<dyn TestDiscoverer> {
    Box::new(UvmDiscoverer {
        test_dir: PathBuf::new(),
    })
}

impl TestDiscoverer for UvmDiscoverer {
    fn name(&self) -> &'static str {
        DEFAULT_DISCOVERER
    }

    fn configure(&mut self, attr: &IndexMap<String, Value>) -> Result<()> {
        for key in attr.keys() {
            if key != "test_dir" {
                return Err(AstError::Syntax {
                    tag: "Error in test_discoverer attr:".to_string(),
                    key: key.clone(),
                    expect: vec!["test_dir".to_string()],
                });
            }
        }
        let dir = match attr.get("test_dir") {
            Some(v) => v.as_str("test_dir")?.to_string(),
            None => "testcases".to_string(),
        };
        self.test_dir = prj_home()?.join(dir);
        Ok(())
    }

    fn test_dir(&self) -> PathBuf {
        self.test_dir.clone()
    }

    fn test_list(&self) -> Vec<String> {
        let mut tests = Vec::new();
        let entries = match std::fs::read_dir(&self.test_dir) {
            Ok(entries) => entries,
            Err(_) => return tests,
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    tests.push(name);
                }
            }
        }
        tests.sort();
        tests
    }
}
