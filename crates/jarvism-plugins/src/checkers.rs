//! Built-in output checkers
//!
//! The compile checker flags VCS error report lines. The test checker adds
//! the UVM report grammar on top: `UVM_ERROR`/`UVM_FATAL` fail a test,
//! `UVM_WARNING` and timing violations are reported but do not fail it.

use jarvism_ast::{Checker, PatternChecker, RuntimeStatus, COMPILE_CHECKER, TEST_CHECKER};

pub fn compile_checker() -> Box<dyn Checker> {
    Box::new(
        PatternChecker::new(COMPILE_CHECKER)
            .pattern(RuntimeStatus::Fail, r"^Error((.+:)|(-\[.*\]))"),
    )
}

pub fn test_checker() -> Box<dyn Checker> {
    Box::new(
        PatternChecker::new(TEST_CHECKER)
            .pattern(RuntimeStatus::Fail, r"^.*UVM_((ERROR)|(FATAL)) .*@.*:")
            .pattern(RuntimeStatus::Fail, r"^Error((.+:)|(-\[.*\]))")
            .pattern(RuntimeStatus::Warning, r"^.*UVM_WARNING .*@.*:")
            .pattern(RuntimeStatus::Warning, r".*Timing violation.*"),
    )
}
