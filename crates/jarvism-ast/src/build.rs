//! Compile targets
//!
//! A [`Build`] is a named compile target: the compile/sim fragments baked
//! into every test built against it, plus the test discoverer enumerating
//! which tests it can run. Builds executed by the engine are always clones
//! of the parsed originals, so per-flow option application never mutates
//! the parse result.

use crate::error::{AstError, Result, ResultExt};
use crate::items::{ItemSet, OptKey};
use crate::parse::{check_keywords, optional, required};
use crate::plugins::{
    new_test_discoverer, test_discoverer_names, TestDiscoverer, COMPILE_CHECKER,
    DEFAULT_DISCOVERER,
};
use indexmap::IndexMap;
use jarvism_config::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Stable short hash of a build's raw signature, used to coalesce flows
pub fn fingerprint_of(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(&digest[..8])
}

#[derive(Clone)]
pub struct Build {
    pub name: String,
    pub items: ItemSet,
    /// Checker classifying this build's compile output
    pub checker: String,
    discoverer: Option<Arc<dyn TestDiscoverer>>,
    discoverer_cfg: Option<Value>,
}

impl Build {
    pub fn new(name: &str) -> Self {
        Build {
            name: name.to_string(),
            items: ItemSet::new(),
            checker: COMPILE_CHECKER.to_string(),
            discoverer: None,
            discoverer_cfg: None,
        }
    }

    pub fn parse(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        let mut allowed = OptKey::names();
        allowed.push("test_discoverer".to_string());
        let allowed_refs: Vec<&str> = allowed.iter().map(String::as_str).collect();
        check_keywords(
            &format!("Error in build {}:", self.name),
            cfg,
            &allowed_refs,
        )?;

        match optional(cfg, "test_discoverer") {
            Some(v) => {
                self.discoverer_cfg = Some(v.clone());
                self.discoverer = Some(parse_discoverer(v).ctx(&format!("build {}", self.name))?);
            }
            None => {
                let default = Value::Map(IndexMap::from([(
                    "type".to_string(),
                    Value::Str(DEFAULT_DISCOVERER.to_string()),
                )]));
                self.discoverer =
                    Some(parse_discoverer(&default).ctx(&format!("build {}", self.name))?);
            }
        }

        self.items
            .parse(cfg)
            .ctx(&format!("build {}", self.name))?;
        Ok(())
    }

    /// The discoverer enumerating this build's tests
    ///
    /// Always present after a successful parse.
    pub fn discoverer(&self) -> Arc<dyn TestDiscoverer> {
        self.discoverer
            .clone()
            .unwrap_or_else(|| panic!("build {} used before parse", self.name))
    }

    /// Signature text the flow fingerprint is derived from
    pub fn raw_sign(&self) -> String {
        format!("{}:{}", self.name, self.items.raw_text())
    }

    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.raw_sign())
    }

    pub fn to_cfg(&self) -> Value {
        let mut map = self.items.to_cfg();
        if let Some(d) = &self.discoverer_cfg {
            map.insert("test_discoverer".to_string(), d.clone());
        }
        Value::Map(map)
    }

    pub fn hier_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}{}:\n", pad, self.name);
        out.push_str(&self.items.hier_string(indent + 2));
        if let Some(d) = &self.discoverer {
            out.push_str(&format!("{}  test_discoverer: {}\n", pad, d.name()));
        }
        out
    }
}

impl std::fmt::Debug for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Build")
            .field("name", &self.name)
            .field("items", &self.items)
            .field("checker", &self.checker)
            .finish()
    }
}

impl PartialEq for Build {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.items == other.items
            && self.checker == other.checker
            && self.discoverer_cfg == other.discoverer_cfg
    }
}

fn parse_discoverer(v: &Value) -> Result<Arc<dyn TestDiscoverer>> {
    let cfg = v.as_map("test_discoverer")?;
    check_keywords("Error in test_discoverer:", &cfg, &["type", "attr"])?;
    let type_name = required(&cfg, "type")?.as_str("type")?;
    let mut discoverer =
        new_test_discoverer(type_name).ok_or_else(|| AstError::InvalidDiscoverer {
            name: type_name.to_string(),
            valid: test_discoverer_names(),
        })?;
    let attr = match optional(&cfg, "attr") {
        Some(a) => a.as_map("attr")?,
        None => IndexMap::new(),
    };
    discoverer.configure(&attr).ctx("test_discoverer")?;
    Ok(Arc::from(discoverer))
}
