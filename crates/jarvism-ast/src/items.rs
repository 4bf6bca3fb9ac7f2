//! Command-fragment buffers
//!
//! An [`ItemSet`] is the unit of command-line text composition: six named
//! buffers, three feeding the compile command and three feeding the
//! simulation command. Builds, test cases and option actions all carry one;
//! merging them is ordered concatenation.
//!
//! An absent buffer is distinct from an empty one. Only buffers the
//! configuration actually mentioned participate in serialization, and the
//! hierarchical dump renders absent buffers as `null`.

use crate::error::Result;
use indexmap::IndexMap;
use jarvism_config::Value;

/// Key of one buffer in an [`ItemSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptKey {
    PreCompile,
    Compile,
    PostCompile,
    PreSim,
    Sim,
    PostSim,
}

impl OptKey {
    pub const ALL: [OptKey; 6] = [
        OptKey::PreCompile,
        OptKey::Compile,
        OptKey::PostCompile,
        OptKey::PreSim,
        OptKey::Sim,
        OptKey::PostSim,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptKey::PreCompile => "pre_compile_option",
            OptKey::Compile => "compile_option",
            OptKey::PostCompile => "post_compile_option",
            OptKey::PreSim => "pre_sim_option",
            OptKey::Sim => "sim_option",
            OptKey::PostSim => "post_sim_option",
        }
    }

    pub fn parse(s: &str) -> Option<OptKey> {
        OptKey::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Legal keyword set, for parser diagnostics
    pub fn names() -> Vec<String> {
        OptKey::ALL.iter().map(|k| k.as_str().to_string()).collect()
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Fixed-key map of command-line text buffers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSet {
    items: [Option<String>; 6],
}

impl ItemSet {
    pub fn new() -> Self {
        ItemSet::default()
    }

    pub fn get(&self, key: OptKey) -> Option<&str> {
        self.items[key.index()].as_deref()
    }

    /// Append `text` to one buffer, materializing it if absent
    pub fn cat_item(&mut self, key: OptKey, text: &str) {
        match &mut self.items[key.index()] {
            Some(existing) => {
                if existing.is_empty() {
                    existing.push_str(text);
                } else if !text.is_empty() {
                    existing.push(' ');
                    existing.push_str(text);
                }
            }
            slot => *slot = Some(text.to_string()),
        }
    }

    /// Key-by-key concatenation; absent buffers in `other` change nothing
    pub fn cat(&mut self, other: &ItemSet) {
        for key in OptKey::ALL {
            if let Some(text) = other.get(key) {
                self.cat_item(key, text);
            }
        }
    }

    /// Textual substitution across all buffers; negative `count` is unlimited
    pub fn replace(&mut self, old: &str, new: &str, count: isize) {
        for slot in self.items.iter_mut().flatten() {
            *slot = if count < 0 {
                slot.replace(old, new)
            } else {
                slot.replacen(old, new, count as usize)
            };
        }
    }

    /// True when no compile-phase buffer is present
    pub fn is_sim_only(&self) -> bool {
        self.get(OptKey::PreCompile).is_none()
            && self.get(OptKey::Compile).is_none()
            && self.get(OptKey::PostCompile).is_none()
    }

    /// Argv for the compile command
    pub fn compile_args(&self) -> Vec<String> {
        self.args_of(&[OptKey::PreCompile, OptKey::Compile, OptKey::PostCompile])
    }

    /// Argv for the simulation command
    pub fn sim_args(&self) -> Vec<String> {
        self.args_of(&[OptKey::PreSim, OptKey::Sim, OptKey::PostSim])
    }

    fn args_of(&self, keys: &[OptKey]) -> Vec<String> {
        keys.iter()
            .filter_map(|k| self.get(*k))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect()
    }

    /// Stable rendering of all buffers, absent ones included
    ///
    /// This is the raw signature text fingerprints are derived from.
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        for key in OptKey::ALL {
            out.push_str(key.as_str());
            out.push('=');
            out.push_str(self.get(key).unwrap_or("null"));
            out.push(';');
        }
        out
    }

    /// Fill buffers from a config node; unrelated keys are left to the caller
    pub fn parse(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        for key in OptKey::ALL {
            if let Some(v) = cfg.get(key.as_str()) {
                self.items[key.index()] = Some(v.as_text(key.as_str())?);
            }
        }
        Ok(())
    }

    /// Present buffers as config-tree entries
    pub fn to_cfg(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        for key in OptKey::ALL {
            if let Some(text) = self.get(key) {
                map.insert(key.as_str().to_string(), Value::Str(text.to_string()));
            }
        }
        map
    }

    /// Debug rendering, one buffer per line, sorted by key name
    pub fn hier_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut keys: Vec<OptKey> = OptKey::ALL.to_vec();
        keys.sort_by_key(|k| k.as_str());
        let mut out = String::new();
        for key in keys {
            out.push_str(&format!(
                "{}{}: {}\n",
                pad,
                key.as_str(),
                self.get(key).unwrap_or("null")
            ));
        }
        out
    }
}
