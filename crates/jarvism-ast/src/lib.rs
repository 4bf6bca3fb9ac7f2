//! jarvism plan compiler
//!
//! Turns a declarative configuration tree into runnable work. Pass one
//! parses the tree into a validated model (builds, options, groups, tests),
//! pass two links cross-references and detects include loops, and the
//! flatten step expands the linked tree into concrete test cases, one per
//! seed, with deterministic option application.
//!
//! The crate also defines the contracts the execution engine and the
//! simulator adapters meet in the middle: [`Runner`], [`Checker`],
//! [`Simulator`] and [`TestDiscoverer`], with their process-wide
//! registries.

pub mod build;
pub mod check;
pub mod error;
pub mod items;
pub mod options;
mod parse;
pub mod plugins;
pub mod result;
pub mod root;
pub mod test;

pub use build::{fingerprint_of, Build};
pub use check::{CheckPattern, PatternChecker};
pub use error::{AstError, Result};
pub use items::{ItemSet, OptKey};
pub use options::{
    draw_seeds, set_seed_rng, OptionDef, OptionKind, OptionRegistry, MAX_JOB_OPT, REPEAT_OPT,
    SEED_OPT, SIM_ONLY_OPT, UNIQUE_OPT,
};
pub use plugins::{
    cur_runner, cur_simulator, new_checker, new_test_discoverer, register_checker,
    register_runner, register_simulator, register_test_discoverer, set_cur_runner,
    set_cur_simulator, Checker, CheckStream, CmdAttr, CmdExecutor, CmdSetup, Runner, Simulator,
    TestDiscoverer, COMPILE_CHECKER, DEFAULT_DISCOVERER, DEFAULT_RUNNER, DEFAULT_SIMULATOR,
    TEST_CHECKER,
};
pub use result::{RuntimeResult, RuntimeStatus};
pub use root::{Env, Root};
pub use test::{Group, TestCase, TestSpec, NAME_SEP};
