//! jarvism configuration plumbing
//!
//! This crate owns the pieces every other jarvism crate leans on: the generic
//! configuration tree ([`Value`]), the YAML loader producing it, and the
//! project environment (`JVS_PRJ_HOME`, working-directory resolution).
//!
//! The plan compiler in `jarvism-ast` consumes only [`Value`]; it never sees
//! YAML types, so alternative front ends only need to produce the same tree.

pub mod env;
pub mod error;
pub mod loader;
pub mod value;

pub use env::{cfg_file, check_env, prj_home, reset_work_dir, set_work_dir, work_dir};
pub use error::{ConfigError, Result};
pub use loader::{load_file, load_str};
pub use value::Value;
