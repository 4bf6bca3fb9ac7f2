//! Default jarvism plugin set
//!
//! Registers the pieces a stock installation runs with: the `host` runner
//! executing simulator commands on the local machine, the compile and test
//! checkers scanning for the VCS/UVM failure grammar, the `uvm_test`
//! discoverer, and the `vcs` simulator adapter.

pub mod checkers;
pub mod host;
pub mod uvm;
pub mod vcs;

use std::sync::{Arc, Once};

/// Register every built-in plugin; safe to call more than once
pub fn register_all() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        jarvism_ast::register_simulator(Arc::new(vcs::Vcs));
        jarvism_ast::register_runner(Arc::new(host::HostRunner));
        jarvism_ast::register_checker(checkers::compile_checker);
        jarvism_ast::register_checker(checkers::test_checker);
        jarvism_ast::register_test_discoverer(uvm::new_uvm_discoverer);
    });
}
