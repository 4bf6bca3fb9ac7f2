//! Shared parse helpers
//!
//! The parser is recursive and top-down: at each node the handler first
//! validates the keys against the node's legal keyword set, then dispatches
//! per key. These helpers keep the diagnostics uniform.

use crate::error::{AstError, Result};
use indexmap::IndexMap;
use jarvism_config::Value;

/// Reject any key of `cfg` outside `allowed`, naming the offending node
pub(crate) fn check_keywords(
    tag: &str,
    cfg: &IndexMap<String, Value>,
    allowed: &[&str],
) -> Result<()> {
    for key in cfg.keys() {
        if !allowed.iter().any(|a| a == key) {
            return Err(AstError::Syntax {
                tag: tag.to_string(),
                key: key.clone(),
                expect: allowed.iter().map(|s| s.to_string()).collect(),
            });
        }
    }
    Ok(())
}

/// Fetch a key that must be present
pub(crate) fn required<'a>(cfg: &'a IndexMap<String, Value>, key: &str) -> Result<&'a Value> {
    cfg.get(key).ok_or_else(|| AstError::NotDefined(key.to_string()))
}

/// Fetch a key that may be absent
pub(crate) fn optional<'a>(cfg: &'a IndexMap<String, Value>, key: &str) -> Option<&'a Value> {
    cfg.get(key)
}
