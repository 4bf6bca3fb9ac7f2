//! The configuration root
//!
//! [`Root`] holds one environment, the option registry, and the build and
//! group maps. Parsing is pass one: recursive descent over the generic tree
//! with keyword validation at every node. Linking is pass two: resolve
//! cross-references by name, detect include loops, and clone option
//! instances onto the entities that mentioned them. After link the root is
//! a set of immutable templates; the execution engine works on clones.

use crate::build::Build;
use crate::error::{AstError, Result, ResultExt};
use crate::options::{OptionDef, OptionRegistry};
use crate::parse::{check_keywords, optional, required};
use crate::plugins::{cur_simulator, set_cur_simulator};
use crate::test::{Group, TestCase, TestSpec, NAME_SEP};
use indexmap::IndexMap;
use jarvism_config::{load_str, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Simulator-agnostic built-in options, loaded at the start of every parse
const GLOBAL_OPTIONS_DOC: &str = include_str!("../options/global_options.yaml");

/// Resolved `env` section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    pub simulator: String,
    pub work_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct Root {
    pub env: Env,
    pub options: OptionRegistry,
    pub builds: IndexMap<String, Build>,
    pub groups: IndexMap<String, Group>,
}

impl Root {
    /// Parse and link a configuration tree
    pub fn from_cfg(cfg: &Value) -> Result<Root> {
        jarvism_config::check_env()?;
        let mut root = Root::parse(cfg)?;
        root.link()?;
        Ok(root)
    }

    /// Pass one: build the model from the generic tree
    pub fn parse(cfg: &Value) -> Result<Root> {
        let cfg = cfg.as_map("root")?;
        check_keywords("Error in root:", &cfg, &["env", "builds", "options", "groups"])?;

        let mut root = Root {
            options: OptionRegistry::with_builtins(),
            ..Root::default()
        };
        load_builtin_doc(GLOBAL_OPTIONS_DOC, &mut root.options).ctx("global options")?;

        let env_cfg = match optional(&cfg, "env") {
            Some(v) => v.as_map("env")?,
            None => IndexMap::new(),
        };
        root.parse_env(&env_cfg)?;

        let builds = required(&cfg, "builds")?.as_map("builds")?;
        for (name, build_cfg) in &builds {
            let mut build = Build::new(name);
            build.parse(&build_cfg.as_map(name)?)?;
            root.builds.insert(name.clone(), build);
        }

        if let Some(v) = optional(&cfg, "options") {
            for (name, option_cfg) in &v.as_map("options")? {
                let def = OptionDef::parse(name, &option_cfg.as_map(name)?)?;
                root.options.register_user(def)?;
            }
        }

        if let Some(v) = optional(&cfg, "groups") {
            for (name, group_cfg) in &v.as_map("groups")? {
                let mut group = Group::new(name);
                group.parse(&group_cfg.as_map(name)?)?;
                root.groups.insert(name.clone(), group);
            }
        }
        Ok(root)
    }

    fn parse_env(&mut self, cfg: &IndexMap<String, Value>) -> Result<()> {
        check_keywords("Error in Env:", cfg, &["simulator", "work_dir"])?;
        if let Some(v) = optional(cfg, "simulator") {
            let name = v.as_str("simulator").ctx("Env")?;
            set_cur_simulator(name).ctx("Env")?;
        }
        let sim = cur_simulator().ctx("Env")?;
        self.env.simulator = sim.name().to_string();
        load_builtin_doc(sim.builtin_options(), &mut self.options)
            .ctx(&format!("built-in options of {}", sim.name()))?;

        if let Some(v) = optional(cfg, "work_dir") {
            let dir = v.as_str("work_dir").ctx("Env")?;
            self.env.work_dir = PathBuf::from(dir);
            jarvism_config::set_work_dir(dir);
        } else {
            self.env.work_dir = jarvism_config::work_dir()?;
        }
        Ok(())
    }

    /// Pass two: resolve references, detect loops, clone option instances
    pub fn link(&mut self) -> Result<()> {
        let names: Vec<String> = self.groups.keys().cloned().collect();
        for name in names {
            self.link_one(&name)?;
        }
        Ok(())
    }

    /// Insert a group after the initial link and link just that group
    ///
    /// This is how the runtime entry points graft their synthetic top-level
    /// group onto an already-linked root.
    pub fn adopt_group(&mut self, group: Group) -> Result<()> {
        let name = group.name().to_string();
        self.groups.insert(name.clone(), group);
        self.link_one(&name)
    }

    fn link_one(&mut self, name: &str) -> Result<()> {
        let subs = self
            .groups
            .get(name)
            .ok_or_else(|| AstError::UnknownGroup(name.to_string()))?
            .groups
            .clone();
        for sub in &subs {
            if !self.groups.contains_key(sub) {
                return Err(AstError::UndefGroup {
                    sub: sub.clone(),
                    group: name.to_string(),
                });
            }
        }
        for sub in &subs {
            self.groups
                .get_mut(sub)
                .expect("sub group checked above")
                .spec
                .parent = Some(name.to_string());
        }

        self.check_loop(name)?;

        let group_build = self.inherited_build_of_group(name);

        let Root {
            groups,
            options,
            builds,
            ..
        } = self;
        let group = groups.get_mut(name).expect("group checked above");
        group.spec.link_args(options)?;
        for test in group.tests.values_mut() {
            test.spec.parent = Some(name.to_string());
            test.spec.link_args(options)?;
            let build_name = test.spec.build_name.clone().or_else(|| group_build.clone());
            match build_name {
                Some(b) if builds.contains_key(&b) => test.resolved_build = Some(b),
                Some(b) => {
                    return Err(AstError::UndefBuild {
                        build: b,
                        item: test.spec.name.clone(),
                    })
                }
                None => return Err(AstError::NoBuild(test.spec.name.clone())),
            }
            test.spec.name = format!("{}{}{}", name, NAME_SEP, test.spec.name);
        }
        Ok(())
    }

    /// Walk the parent chain; seeing our own name again is an include loop
    fn check_loop(&self, name: &str) -> Result<()> {
        let mut prev = name.to_string();
        let mut cur = self.groups[name].spec.parent.clone();
        let mut walked = 0;
        while let Some(ancestor) = cur {
            if ancestor == name || walked > self.groups.len() {
                return Err(AstError::LoopInclude {
                    group: name.to_string(),
                    ancestor: prev,
                });
            }
            cur = self
                .groups
                .get(&ancestor)
                .and_then(|g| g.spec.parent.clone());
            prev = ancestor;
            walked += 1;
        }
        Ok(())
    }

    pub fn build(&self, name: &str) -> Option<&Build> {
        self.builds.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Effective build of a group, walking the parent chain bottom-up
    pub fn inherited_build_of_group(&self, name: &str) -> Option<String> {
        let mut cur = Some(name.to_string());
        while let Some(g) = cur.as_deref().and_then(|n| self.groups.get(n)) {
            if g.spec.build_name.is_some() {
                return g.spec.build_name.clone();
            }
            cur = g.spec.parent.clone();
        }
        None
    }

    /// Option instances visible to `spec`: parents first, children override
    pub fn merged_option_args(&self, spec: &TestSpec) -> BTreeMap<String, OptionDef> {
        let mut chain: Vec<&TestSpec> = Vec::new();
        let mut cur = spec.parent.as_deref();
        while let Some(parent) = cur.and_then(|n| self.groups.get(n)) {
            chain.push(&parent.spec);
            cur = parent.spec.parent.as_deref();
        }
        let mut merged = BTreeMap::new();
        for s in chain.iter().rev() {
            merged.extend(s.option_args.clone());
        }
        merged.extend(spec.option_args.clone());
        merged
    }

    /// Template test cases of a group, recursively, in declaration order
    pub fn collect_test_cases(&self, name: &str) -> Result<Vec<TestCase>> {
        let group = self
            .group(name)
            .ok_or_else(|| AstError::UnknownGroup(name.to_string()))?;
        let mut out: Vec<TestCase> = group.tests.values().cloned().collect();
        for sub in &group.groups {
            out.extend(self.collect_test_cases(sub)?);
        }
        Ok(out)
    }

    /// Run option application for one declarative test case
    ///
    /// Iteration is sorted by option name, making the produced command-line
    /// text reproducible run over run.
    pub fn apply_args(&self, test: &mut TestCase) {
        let merged = self.merged_option_args(&test.spec);
        for opt in merged.values() {
            opt.apply_to_test(test);
        }
    }

    /// Serialize the model back to the generic tree shape
    pub fn to_cfg(&self) -> Value {
        let mut map = IndexMap::new();
        let mut env = IndexMap::new();
        env.insert(
            "simulator".to_string(),
            Value::Str(self.env.simulator.clone()),
        );
        env.insert(
            "work_dir".to_string(),
            Value::Str(self.env.work_dir.display().to_string()),
        );
        map.insert("env".to_string(), Value::Map(env));

        let mut builds = IndexMap::new();
        for (name, build) in &self.builds {
            builds.insert(name.clone(), build.to_cfg());
        }
        map.insert("builds".to_string(), Value::Map(builds));

        let user: IndexMap<String, Value> = self
            .options
            .user_options()
            .map(|o| (o.name.clone(), o.to_cfg()))
            .collect();
        if !user.is_empty() {
            map.insert("options".to_string(), Value::Map(user));
        }

        let groups: IndexMap<String, Value> = self
            .groups
            .iter()
            .map(|(name, g)| (name.clone(), g.to_cfg()))
            .collect();
        if !groups.is_empty() {
            map.insert("groups".to_string(), Value::Map(groups));
        }
        Value::Map(map)
    }

    /// Human-readable hierarchical dump
    pub fn hier_string(&self) -> String {
        let mut out = String::from("root\n");
        out.push_str(&format!(
            "  env:\n    simulator: {}\n    work_dir: {}\n",
            self.env.simulator,
            self.env.work_dir.display()
        ));
        out.push_str("  builds:\n");
        let mut names: Vec<&String> = self.builds.keys().collect();
        names.sort();
        for name in names {
            out.push_str(&self.builds[name.as_str()].hier_string(4));
        }
        out.push_str("  groups:\n");
        let mut names: Vec<&String> = self.groups.keys().collect();
        names.sort();
        for name in names {
            out.push_str(&self.groups[name.as_str()].hier_string(4));
        }
        out
    }
}

fn load_builtin_doc(doc: &str, registry: &mut OptionRegistry) -> Result<()> {
    let tree = load_str(doc)?;
    let map = tree.as_map("options document")?;
    let options = required(&map, "options")?.as_map("options")?;
    for (name, option_cfg) in &options {
        let def = OptionDef::parse(name, &option_cfg.as_map(name)?)?;
        registry.register_builtin(def);
    }
    Ok(())
}
