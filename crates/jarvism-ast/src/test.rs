//! Tests and groups
//!
//! A [`TestCase`] is a named unit of simulation work; a [`Group`] is a
//! container with the same contract plus child tests and child groups.
//! Both reference builds and parents by name; the link pass resolves names
//! against the root and the flatten pass expands declarative cases into
//! concrete ones, one per seed.

use crate::items::{ItemSet, OptKey};
use crate::error::{AstError, Result, ResultExt};
use crate::options::{draw_seeds, OptionDef, OptionRegistry};
use crate::parse::{check_keywords, optional};
use crate::plugins::TEST_CHECKER;
use crate::build::Build;
use indexmap::IndexMap;
use jarvism_config::Value;
use std::collections::BTreeMap;

/// Separator used when link and flatten compose names
pub const NAME_SEP: &str = "__";

/// The shared test/group contract: build reference, args, parentage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSpec {
    pub name: String,
    /// Build declared directly on this entity
    pub build_name: Option<String>,
    /// Raw argv fragments, resolved at link
    pub args: Vec<String>,
    /// Option instances resolved from `args`, cloned per entity
    pub option_args: BTreeMap<String, OptionDef>,
    /// Owning group, set at link
    pub parent: Option<String>,
}

impl TestSpec {
    pub fn new(name: &str) -> Self {
        TestSpec {
            name: name.to_string(),
            ..TestSpec::default()
        }
    }

    pub(crate) fn parse(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        if let Some(v) = optional(cfg, "build") {
            self.build_name = Some(v.as_str("build").ctx(&self.name)?.to_string());
        }
        if let Some(v) = optional(cfg, "args") {
            self.args = v.as_str_list("args").ctx(&self.name)?;
        }
        Ok(())
    }

    /// Resolve raw args against the registry, storing cloned instances
    pub(crate) fn link_args(&mut self, registry: &OptionRegistry) -> Result<()> {
        for arg in &self.args {
            let inst = registry
                .parse_arg(arg)
                .ctx(&format!("args of {}", self.name))?;
            self.option_args.insert(inst.name.clone(), inst);
        }
        Ok(())
    }

    fn to_cfg_entries(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        if let Some(b) = &self.build_name {
            map.insert("build".to_string(), Value::Str(b.clone()));
        }
        if !self.args.is_empty() {
            map.insert(
                "args".to_string(),
                Value::List(self.args.iter().cloned().map(Value::Str).collect()),
            );
        }
        map
    }
}

/// A named unit of simulation work
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub spec: TestSpec,
    pub items: ItemSet,
    pub seeds: Vec<u32>,
    /// Checker classifying this test's simulation output
    pub checker: String,
    /// Effective build name, resolved through the parent chain at link
    pub resolved_build: Option<String>,
    /// Build clone carried by concrete cases after flatten
    pub build: Option<Build>,
}

impl TestCase {
    pub fn new(name: &str) -> Self {
        TestCase {
            spec: TestSpec::new(name),
            items: ItemSet::new(),
            seeds: Vec::new(),
            checker: TEST_CHECKER.to_string(),
            resolved_build: None,
            build: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn parse(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        check_keywords(
            &format!("Error in {}:", self.spec.name),
            cfg,
            &["build", "args"],
        )?;
        self.spec.parse(cfg)
    }

    /// Expand into one concrete case per seed
    ///
    /// Option application must already have run. Each concrete case copies
    /// this case's ItemSet, appends the simulator seed argument and keeps
    /// the resolved build for the flow to replace with its clone.
    pub fn expand(&self, seed_prefix: &str) -> Vec<TestCase> {
        let seeds = if self.seeds.is_empty() {
            draw_seeds(1)
        } else {
            self.seeds.clone()
        };
        seeds
            .into_iter()
            .map(|seed| {
                let mut concrete =
                    TestCase::new(&format!("{}{}{}", self.spec.name, NAME_SEP, seed));
                concrete.spec.parent = self.spec.parent.clone();
                concrete.items = self.items.clone();
                concrete
                    .items
                    .cat_item(OptKey::Sim, &format!("{}{}", seed_prefix, seed));
                concrete.seeds = vec![seed];
                concrete.checker = self.checker.clone();
                concrete.resolved_build = self.resolved_build.clone();
                concrete.build = self.build.clone();
                concrete
            })
            .collect()
    }

    /// The build carried by a concrete case
    pub fn build(&self) -> Option<&Build> {
        self.build.as_ref()
    }

    pub fn hier_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}{}:\n", pad, self.spec.name);
        out.push_str(&format!(
            "{}  parent: {}\n",
            pad,
            self.spec.parent.as_deref().unwrap_or("null")
        ));
        out.push_str(&self.items.hier_string(indent + 2));
        if !self.seeds.is_empty() {
            out.push_str(&format!("{}  seeds: {:?}\n", pad, self.seeds));
        }
        out
    }
}

/// A named container of tests and sub-groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub spec: TestSpec,
    pub tests: IndexMap<String, TestCase>,
    /// Child groups, by name, in declaration order
    pub groups: Vec<String>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Group {
            spec: TestSpec::new(name),
            ..Group::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn parse(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        check_keywords(
            &format!("Error in group {}:", self.spec.name),
            cfg,
            &["build", "args", "tests", "groups"],
        )?;
        self.spec.parse(cfg)?;

        if let Some(v) = optional(cfg, "tests") {
            let tests = v.as_map("tests").ctx(&format!("group {}", self.spec.name))?;
            for (name, test_cfg) in &tests {
                let mut test = TestCase::new(name);
                let entries = test_cfg
                    .as_map(name)
                    .ctx(&format!("group {}", self.spec.name))?;
                test.parse(&entries)
                    .ctx(&format!("group {}", self.spec.name))?;
                self.tests.insert(name.clone(), test);
            }
        }

        if let Some(v) = optional(cfg, "groups") {
            let names = v
                .as_str_list("groups")
                .ctx(&format!("group {}", self.spec.name))?;
            for name in names {
                if self.groups.contains(&name) {
                    return Err(AstError::RedefinedSubGroup {
                        sub: name,
                        group: self.spec.name.clone(),
                    });
                }
                self.groups.push(name);
            }
        }
        Ok(())
    }

    pub fn to_cfg(&self) -> Value {
        let mut map = self.spec.to_cfg_entries();
        if !self.tests.is_empty() {
            let mut tests = IndexMap::new();
            for (name, test) in &self.tests {
                tests.insert(name.clone(), Value::Map(test.spec.to_cfg_entries()));
            }
            map.insert("tests".to_string(), Value::Map(tests));
        }
        if !self.groups.is_empty() {
            map.insert(
                "groups".to_string(),
                Value::List(self.groups.iter().cloned().map(Value::Str).collect()),
            );
        }
        Value::Map(map)
    }

    pub fn hier_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}{}:\n", pad, self.spec.name);
        out.push_str(&format!(
            "{}  build: {}\n",
            pad,
            self.spec.build_name.as_deref().unwrap_or("null")
        ));
        for test in self.tests.values() {
            out.push_str(&test.hier_string(indent + 2));
        }
        if !self.groups.is_empty() {
            out.push_str(&format!("{}  groups: {:?}\n", pad, self.groups));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvism_config::load_str;

    fn group_cfg(yaml: &str) -> IndexMap<String, Value> {
        load_str(yaml).unwrap().as_map("group").unwrap()
    }

    #[test]
    fn test_group_parses_tests_and_subgroups() {
        let mut g = Group::new("group1");
        g.parse(&group_cfg(
            "build: build1\nargs: [\"-repeat 1\"]\ntests:\n  test1:\n  test2:\n    args: [\"-seed 3\"]\ngroups: [g2, g3]\n",
        ))
        .unwrap();
        assert_eq!(g.tests.len(), 2);
        assert_eq!(g.groups, vec!["g2", "g3"]);
        assert_eq!(g.tests["test2"].spec.args, vec!["-seed 3"]);
    }

    #[test]
    fn test_duplicate_subgroup_is_an_error() {
        let mut g = Group::new("group1");
        let err = g.parse(&group_cfg("groups: [g2, g2]\n")).unwrap_err();
        assert!(err.to_string().contains("redefined in group group1"), "{}", err);
    }

    #[test]
    fn test_unknown_test_key_is_rejected() {
        let mut g = Group::new("group1");
        let err = g
            .parse(&group_cfg("tests:\n  test1:\n    bulid: x\n"))
            .unwrap_err();
        assert!(err.to_string().contains("bulid"), "{}", err);
    }

    #[test]
    fn test_expand_appends_seed_argument() {
        let mut t = TestCase::new("group1__test1");
        t.items.cat_item(OptKey::Sim, "+UVM_VERBOSITY=UVM_LOW");
        t.seeds = vec![7, 9];
        let cases = t.expand("+ntb_random_seed=");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name(), "group1__test1__7");
        assert_eq!(
            cases[0].items.get(OptKey::Sim),
            Some("+UVM_VERBOSITY=UVM_LOW +ntb_random_seed=7")
        );
        assert_eq!(cases[1].name(), "group1__test1__9");
    }

    #[test]
    fn test_expand_defaults_to_one_seed() {
        let t = TestCase::new("t");
        assert_eq!(t.expand("+seed=").len(), 1);
    }
}
