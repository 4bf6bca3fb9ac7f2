//! Option registry and flag surface
//!
//! Options come from three places, registered in this order: the engine
//! options baked into every registry (`seed`, `repeat`, `max_job`,
//! `sim_only`, `unique`), built-in document options loaded from the global
//! and simulator-specific option documents, and user options from the
//! project configuration. User options shadow built-ins on name collision;
//! a collision between two user options fails the parse.
//!
//! The flag surface parses argv fragments of the form `-name` (boolean) or
//! `-name value` (the value separated by whitespace inside the token).

use crate::error::{AstError, Result, ResultExt};
use crate::items::{ItemSet, OptKey};
use crate::parse::check_keywords;
use crate::test::TestCase;
use indexmap::IndexMap;
use jarvism_config::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Mutex;

pub const SEED_OPT: &str = "seed";
pub const REPEAT_OPT: &str = "repeat";
pub const MAX_JOB_OPT: &str = "max_job";
pub const SIM_ONLY_OPT: &str = "sim_only";
pub const UNIQUE_OPT: &str = "unique";

/// What activating an option does
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Document-defined option with exactly one action body
    Action {
        on: Option<ItemSet>,
        with_value: Option<ItemSet>,
    },
    /// Pin the seed list of a test case
    Seed,
    /// Expand a test case into N randomly-seeded cases
    Repeat,
    /// Cap concurrent jobs across all flows
    MaxJob,
    /// Skip build phases, run simulations only
    SimOnly,
    /// Mix the runtime id into build fingerprints
    Unique,
}

/// A named option, either a registry template or a resolved instance
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDef {
    pub name: String,
    pub value: String,
    pub kind: OptionKind,
}

impl OptionDef {
    fn new(name: &str, kind: OptionKind) -> Self {
        OptionDef {
            name: name.to_string(),
            value: "false".to_string(),
            kind,
        }
    }

    /// Parse a document option (`on_action` / `with_value_action` body)
    pub fn parse(name: &str, cfg: &IndexMap<String, Value>) -> Result<OptionDef> {
        let tag = format!("Error in {}:", name);
        check_keywords(&tag, cfg, &["on_action", "with_value_action"])?;
        let on = match cfg.get("on_action") {
            Some(v) => Some(parse_action(name, "on_action", v)?),
            None => None,
        };
        let with_value = match cfg.get("with_value_action") {
            Some(v) => Some(parse_action(name, "with_value_action", v)?),
            None => None,
        };
        if on.is_some() && with_value.is_some() {
            return Err(AstError::ctx(name, AstError::BothActions));
        }
        Ok(OptionDef::new(name, OptionKind::Action { on, with_value }))
    }

    /// Boolean options take `-name`; the rest take `-name value`
    pub fn is_bool(&self) -> bool {
        match &self.kind {
            OptionKind::Action { with_value, .. } => with_value.is_none(),
            OptionKind::SimOnly | OptionKind::Unique => true,
            OptionKind::Seed | OptionKind::Repeat | OptionKind::MaxJob => false,
        }
    }

    pub fn usage(&self) -> &'static str {
        match &self.kind {
            OptionKind::Action { .. } => "user-defined flag",
            OptionKind::Seed => "run with a fixed simulation seed",
            OptionKind::Repeat => "repeat each test N times with random seeds",
            OptionKind::MaxJob => "cap concurrent jobs; <= 0 disables the cap",
            OptionKind::SimOnly => "skip build phases and only simulate",
            OptionKind::Unique => "never share builds with previous invocations",
        }
    }

    /// Assign a value, validating it against the option's shape
    pub fn set(&mut self, raw: &str) -> Result<()> {
        let name = self.name.clone();
        let invalid = move |reason: &str| AstError::InvalidValue {
            name: name.clone(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        match &self.kind {
            OptionKind::Action { with_value: Some(_), .. } => {
                self.value = raw.to_string();
            }
            OptionKind::Action { .. } | OptionKind::SimOnly | OptionKind::Unique => {
                let b = parse_bool(raw).ok_or_else(|| invalid("expected a boolean"))?;
                self.value = b.to_string();
            }
            OptionKind::Seed => {
                raw.parse::<u32>().map_err(|_| invalid("expected a u32 seed"))?;
                self.value = raw.to_string();
            }
            OptionKind::Repeat => {
                let n = raw.parse::<usize>().map_err(|_| invalid("expected a count"))?;
                if n == 0 {
                    return Err(invalid("count must be at least 1"));
                }
                self.value = raw.to_string();
            }
            OptionKind::MaxJob => {
                raw.parse::<i64>().map_err(|_| invalid("expected an integer"))?;
                self.value = raw.to_string();
            }
        }
        Ok(())
    }

    pub fn as_bool(&self) -> bool {
        self.value == "true"
    }

    pub fn as_i64(&self) -> i64 {
        self.value.parse().unwrap_or(0)
    }

    /// Apply this option's activation to a declarative test case
    pub fn apply_to_test(&self, test: &mut TestCase) {
        match &self.kind {
            OptionKind::Action { on: Some(items), .. } => {
                test.items.cat(items);
            }
            OptionKind::Action { with_value: Some(items), .. } => {
                let mut resolved = items.clone();
                resolved.replace(&format!("${}", self.name), &self.value, -1);
                test.items.cat(&resolved);
            }
            OptionKind::Action { .. } => {}
            OptionKind::Seed => {
                // set() validated the u32
                test.seeds = vec![self.value.parse().unwrap_or(0)];
            }
            OptionKind::Repeat => {
                test.seeds = draw_seeds(self.value.parse().unwrap_or(1));
            }
            OptionKind::MaxJob | OptionKind::SimOnly | OptionKind::Unique => {}
        }
    }

    /// Serialize a document option back to its config shape
    pub fn to_cfg(&self) -> Value {
        let mut map = IndexMap::new();
        if let OptionKind::Action { on, with_value } = &self.kind {
            if let Some(items) = on {
                map.insert("on_action".to_string(), Value::Map(items.to_cfg()));
            }
            if let Some(items) = with_value {
                map.insert("with_value_action".to_string(), Value::Map(items.to_cfg()));
            }
        }
        Value::Map(map)
    }

    pub fn hier_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}{}:\n{}  value: {}\n", pad, self.name, pad, self.value);
        if let OptionKind::Action { on, with_value } = &self.kind {
            for (label, action) in [("on_action", on), ("with_value_action", with_value)] {
                match action {
                    Some(items) => {
                        out.push_str(&format!("{}  {}:\n", pad, label));
                        out.push_str(&items.hier_string(indent + 4));
                    }
                    None => out.push_str(&format!("{}  {}: null\n", pad, label)),
                }
            }
        }
        out
    }
}

fn parse_action(option: &str, label: &str, v: &Value) -> Result<ItemSet> {
    let cfg = v.as_map(label)?;
    let allowed = OptKey::names();
    let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
    check_keywords(&format!("Error in {} of {}:", label, option), &cfg, &allowed)?;
    let mut items = ItemSet::new();
    items
        .parse(&cfg)
        .ctx(&format!("{} of {}", label, option))?;
    Ok(items)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Global map of user-defined and built-in options
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    options: IndexMap<String, OptionDef>,
    user: HashSet<String>,
}

impl OptionRegistry {
    /// Registry with the engine options pre-registered
    pub fn with_builtins() -> Self {
        let mut reg = OptionRegistry::default();
        for (name, kind) in [
            (SEED_OPT, OptionKind::Seed),
            (REPEAT_OPT, OptionKind::Repeat),
            (MAX_JOB_OPT, OptionKind::MaxJob),
            (SIM_ONLY_OPT, OptionKind::SimOnly),
            (UNIQUE_OPT, OptionKind::Unique),
        ] {
            reg.options.insert(name.to_string(), OptionDef::new(name, kind));
        }
        reg
    }

    /// Register a built-in document option; later documents shadow earlier ones
    pub fn register_builtin(&mut self, def: OptionDef) {
        self.options.insert(def.name.clone(), def);
    }

    /// Register a user option; shadows built-ins, collides with user options
    pub fn register_user(&mut self, def: OptionDef) -> Result<()> {
        if self.user.contains(&def.name) {
            return Err(AstError::RedefinedOption(def.name));
        }
        self.user.insert(def.name.clone());
        self.options.insert(def.name.clone(), def);
        Ok(())
    }

    /// Look up a registered option by name
    pub fn get(&self, name: &str) -> Result<&OptionDef> {
        self.options
            .get(name)
            .ok_or_else(|| AstError::UnknownOption(name.to_string()))
    }

    /// Parse one argv fragment into a resolved option instance
    pub fn parse_arg(&self, token: &str) -> Result<OptionDef> {
        let body = token
            .trim()
            .strip_prefix('-')
            .ok_or_else(|| AstError::UnknownOption(token.trim().to_string()))?;
        let (name, value) = match body.split_once(char::is_whitespace) {
            Some((n, v)) => (n, Some(v.trim())),
            None => (body, None),
        };
        let mut inst = self.get(name)?.clone();
        match value {
            Some(v) if !v.is_empty() => inst.set(v)?,
            _ if inst.is_bool() => inst.set("true")?,
            _ => return Err(AstError::MissingValue(name.to_string())),
        }
        Ok(inst)
    }

    /// Whether an argv fragment names a registered option
    pub fn knows_arg(&self, token: &str) -> bool {
        self.parse_arg(token).is_ok()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// User options, in registration order
    pub fn user_options(&self) -> impl Iterator<Item = &OptionDef> {
        self.options.values().filter(|o| self.user.contains(&o.name))
    }
}

static SEED_RNG: Mutex<Option<StdRng>> = Mutex::new(None);

/// Make seed expansion deterministic, for tests
pub fn set_seed_rng(seed: u64) {
    *SEED_RNG.lock().expect("seed rng lock poisoned") = Some(StdRng::seed_from_u64(seed));
}

/// Draw `n` distinct random seeds
pub fn draw_seeds(n: usize) -> Vec<u32> {
    let mut guard = SEED_RNG.lock().expect("seed rng lock poisoned");
    let draw = |rng: &mut dyn FnMut() -> u32| {
        let mut seen = HashSet::new();
        let mut seeds = Vec::with_capacity(n);
        while seeds.len() < n {
            let s = rng();
            if seen.insert(s) {
                seeds.push(s);
            }
        }
        seeds
    };
    match guard.as_mut() {
        Some(rng) => draw(&mut || rng.gen()),
        None => {
            let mut rng = rand::thread_rng();
            draw(&mut || rng.gen())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvism_config::load_str;

    fn option_cfg(yaml: &str) -> IndexMap<String, Value> {
        load_str(yaml).unwrap().as_map("option").unwrap()
    }

    #[test]
    fn test_both_actions_is_a_parse_error() {
        let cfg = option_cfg(
            "on_action:\n  sim_option: +a\nwith_value_action:\n  sim_option: +b=$x\n",
        );
        let err = OptionDef::parse("x", &cfg).unwrap_err();
        assert!(err.to_string().contains("both defined"), "{}", err);
    }

    #[test]
    fn test_unknown_action_keyword_fails() {
        let cfg = option_cfg("on_action:\n  sim_opt: +a\n");
        let err = OptionDef::parse("x", &cfg).unwrap_err();
        assert!(err.to_string().contains("sim_opt"), "{}", err);
    }

    #[test]
    fn test_bool_flag_parses_without_value() {
        let reg = OptionRegistry::with_builtins();
        let inst = reg.parse_arg("-sim_only").unwrap();
        assert!(inst.as_bool());
    }

    #[test]
    fn test_value_flag_requires_value() {
        let reg = OptionRegistry::with_builtins();
        let err = reg.parse_arg("-repeat").unwrap_err();
        assert!(matches!(err, AstError::MissingValue(_)));
        let inst = reg.parse_arg("-repeat 10").unwrap();
        assert_eq!(inst.value, "10");
    }

    #[test]
    fn test_unknown_option_is_distinguished() {
        let reg = OptionRegistry::with_builtins();
        assert!(matches!(
            reg.parse_arg("-no_such_flag"),
            Err(AstError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_user_collision_fails_but_shadowing_builtin_works() {
        let mut reg = OptionRegistry::with_builtins();
        let cfg = option_cfg("on_action:\n  sim_option: +quiet\n");
        let doc_opt = OptionDef::parse("quiet", &cfg).unwrap();
        reg.register_builtin(doc_opt.clone());
        // a user option may shadow the built-in
        reg.register_user(doc_opt.clone()).unwrap();
        // but not another user option
        let err = reg.register_user(doc_opt).unwrap_err();
        assert!(matches!(err, AstError::RedefinedOption(_)));
    }

    #[test]
    fn test_draw_seeds_distinct_and_deterministic() {
        set_seed_rng(7);
        let a = draw_seeds(16);
        set_seed_rng(7);
        let b = draw_seeds(16);
        assert_eq!(a, b);
        let unique: HashSet<_> = a.iter().collect();
        assert_eq!(unique.len(), a.len());
    }
}
