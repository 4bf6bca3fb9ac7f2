//! Project environment
//!
//! `JVS_PRJ_HOME` points at the project root (the directory holding
//! `jarvism_cfg/`) and must be set before anything else runs. The working
//! directory defaults to `$JVS_PRJ_HOME/work`, can be overridden by
//! `JVS_WORK_DIR`, and can be overridden again by the `env.work_dir` key of
//! the project configuration.

use crate::error::{ConfigError, Result};
use std::path::PathBuf;
use std::sync::RwLock;

pub const PRJ_HOME_ENV: &str = "JVS_PRJ_HOME";
pub const WORK_DIR_ENV: &str = "JVS_WORK_DIR";

/// Name of the configuration directory under the project root
pub const CFG_DIR: &str = "jarvism_cfg";

/// Name of the project configuration file inside [`CFG_DIR`]
pub const CFG_FILE: &str = "jarvism_cfg.yaml";

static WORK_DIR: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Verify the required environment is present
pub fn check_env() -> Result<()> {
    prj_home().map(|_| ())
}

/// The project root from `$JVS_PRJ_HOME`
pub fn prj_home() -> Result<PathBuf> {
    match std::env::var_os(PRJ_HOME_ENV) {
        Some(v) if !v.is_empty() => Ok(PathBuf::from(v)),
        _ => Err(ConfigError::EnvNotSet(PRJ_HOME_ENV)),
    }
}

/// Path of the project configuration file
pub fn cfg_file() -> Result<PathBuf> {
    Ok(prj_home()?.join(CFG_DIR).join(CFG_FILE))
}

/// Override the working directory for this process
pub fn set_work_dir(dir: impl Into<PathBuf>) {
    *WORK_DIR.write().expect("work dir lock poisoned") = Some(dir.into());
}

/// Drop any override and fall back to the environment defaults
pub fn reset_work_dir() {
    *WORK_DIR.write().expect("work dir lock poisoned") = None;
}

/// The effective working directory
///
/// Resolution order: explicit [`set_work_dir`] override, then
/// `$JVS_WORK_DIR`, then `$JVS_PRJ_HOME/work`.
pub fn work_dir() -> Result<PathBuf> {
    if let Some(dir) = WORK_DIR.read().expect("work dir lock poisoned").clone() {
        return Ok(dir);
    }
    if let Some(v) = std::env::var_os(WORK_DIR_ENV) {
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    Ok(prj_home()?.join("work"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_dir_override_wins() {
        set_work_dir("/tmp/jvs_work_override");
        assert_eq!(work_dir().unwrap(), PathBuf::from("/tmp/jvs_work_override"));
        reset_work_dir();
    }
}
