//! Plugin contracts and their registries
//!
//! Four seams let external crates adapt jarvism to a simulator toolchain:
//!
//! - [`Simulator`]: names the compile/sim commands and the seed flag, and
//!   ships the simulator-specific built-in options document.
//! - [`Runner`]: drives the four execution phases. A runner never spawns
//!   processes itself; every command goes through the engine-supplied
//!   [`CmdExecutor`] so the engine owns cancellation and stdout routing.
//! - [`Checker`]: consumes a command's stdout stream and classifies it.
//! - [`TestDiscoverer`]: enumerates the tests a build can run.
//!
//! Registries are process-wide and write-once: populated during plugin
//! init, read during parse and execution. Double registration of a name is
//! a programmer error and panics.

use crate::build::Build;
use crate::error::{AstError, Result};
use crate::result::RuntimeResult;
use crate::test::TestCase;
use async_trait::async_trait;
use indexmap::IndexMap;
use jarvism_config::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};

/// Default checker name for build phases
pub const COMPILE_CHECKER: &str = "compile_checker";
/// Default checker name for test phases
pub const TEST_CHECKER: &str = "test_checker";
/// Default test discoverer type
pub const DEFAULT_DISCOVERER: &str = "uvm_test";
/// Default simulator
pub const DEFAULT_SIMULATOR: &str = "vcs";
/// Default runner
pub const DEFAULT_RUNNER: &str = "host";

/// Simulator toolchain adapter
pub trait Simulator: Send + Sync {
    fn name(&self) -> &'static str;
    /// Contents of this simulator's built-in options document
    fn builtin_options(&self) -> &'static str;
    fn compile_cmd(&self) -> &'static str;
    fn sim_cmd(&self) -> &'static str;
    /// Prefix concatenated with a seed integer to form the seed argument
    fn seed_option(&self) -> &'static str;
}

/// Enumerates the tests available to a build
pub trait TestDiscoverer: Send + Sync {
    fn name(&self) -> &'static str;
    /// Consume the `attr` map of the `test_discoverer` config node
    fn configure(&mut self, attr: &IndexMap<String, Value>) -> Result<()>;
    fn test_dir(&self) -> PathBuf;
    fn test_list(&self) -> Vec<String>;
    fn is_valid_test(&self, name: &str) -> bool {
        self.test_list().iter().any(|t| t == name)
    }
}

/// Readable side of a command's stdout fan-out
pub type CheckStream = Box<dyn AsyncRead + Send + Unpin>;

/// Stream scanner classifying a command's output
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;
    /// Read lines until EOF and return the worst observed status
    async fn check(&self, input: CheckStream) -> RuntimeResult;
}

/// Hook run on the command object just before spawning
pub type CmdSetup = Box<dyn FnOnce(&mut tokio::process::Command) -> std::io::Result<()> + Send>;

/// Attribute bundle a runner hands to the command executor
#[derive(Default)]
pub struct CmdAttr {
    /// Working directory for the command
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub envs: Vec<(String, String)>,
    /// Additional stdout sinks
    pub sinks: Vec<Box<dyn AsyncWrite + Send + Unpin>>,
    /// Setup hook receiving the raw command object
    pub setup: Option<CmdSetup>,
}

impl CmdAttr {
    pub fn new() -> Self {
        CmdAttr::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        CmdAttr {
            cwd: Some(dir.into()),
            ..CmdAttr::default()
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn sink(mut self, sink: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        self.sinks.push(sink);
        self
    }
}

/// Engine-owned command spawner handed to runner phases
#[async_trait]
pub trait CmdExecutor: Send + Sync {
    async fn exec(&self, attr: CmdAttr, program: &str, args: &[String]) -> RuntimeResult;
}

/// Adapter from the four-phase execution model to a simulator toolchain
#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;
    async fn prepare_build(&self, build: &Build, exec: &dyn CmdExecutor) -> RuntimeResult;
    async fn build(&self, build: &Build, exec: &dyn CmdExecutor) -> RuntimeResult;
    async fn prepare_test(&self, test: &TestCase, exec: &dyn CmdExecutor) -> RuntimeResult;
    async fn run_test(&self, test: &TestCase, exec: &dyn CmdExecutor) -> RuntimeResult;
}

pub type DiscovererFactory = fn() -> Box<dyn TestDiscoverer>;
pub type CheckerFactory = fn() -> Box<dyn Checker>;

struct Registries {
    simulators: RwLock<HashMap<String, Arc<dyn Simulator>>>,
    runners: RwLock<HashMap<String, Arc<dyn Runner>>>,
    checkers: RwLock<HashMap<String, CheckerFactory>>,
    discoverers: RwLock<HashMap<String, DiscovererFactory>>,
    cur_simulator: RwLock<Option<String>>,
    cur_runner: RwLock<Option<String>>,
}

fn registries() -> &'static Registries {
    static REGISTRIES: OnceLock<Registries> = OnceLock::new();
    REGISTRIES.get_or_init(|| Registries {
        simulators: RwLock::new(HashMap::new()),
        runners: RwLock::new(HashMap::new()),
        checkers: RwLock::new(HashMap::new()),
        discoverers: RwLock::new(HashMap::new()),
        cur_simulator: RwLock::new(None),
        cur_runner: RwLock::new(None),
    })
}

pub fn register_simulator(sim: Arc<dyn Simulator>) {
    let mut map = registries().simulators.write().expect("registry poisoned");
    if map.insert(sim.name().to_string(), sim.clone()).is_some() {
        panic!("simulator {} has been registered!", sim.name());
    }
}

pub fn simulator(name: &str) -> Option<Arc<dyn Simulator>> {
    registries()
        .simulators
        .read()
        .expect("registry poisoned")
        .get(name)
        .cloned()
}

pub fn simulator_names() -> Vec<String> {
    let mut names: Vec<String> = registries()
        .simulators
        .read()
        .expect("registry poisoned")
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

/// Select the simulator used by parse, flatten and the runner
pub fn set_cur_simulator(name: &str) -> Result<()> {
    if simulator(name).is_none() {
        return Err(AstError::InvalidSimulator {
            name: name.to_string(),
            valid: simulator_names(),
        });
    }
    *registries().cur_simulator.write().expect("registry poisoned") = Some(name.to_string());
    Ok(())
}

/// The selected simulator, falling back to the default
pub fn cur_simulator() -> Result<Arc<dyn Simulator>> {
    let name = registries()
        .cur_simulator
        .read()
        .expect("registry poisoned")
        .clone()
        .unwrap_or_else(|| DEFAULT_SIMULATOR.to_string());
    simulator(&name).ok_or_else(|| AstError::InvalidSimulator {
        name,
        valid: simulator_names(),
    })
}

pub fn register_runner(runner: Arc<dyn Runner>) {
    let mut map = registries().runners.write().expect("registry poisoned");
    if map.insert(runner.name().to_string(), runner.clone()).is_some() {
        panic!("runner {} has been registered!", runner.name());
    }
}

pub fn runner(name: &str) -> Option<Arc<dyn Runner>> {
    registries()
        .runners
        .read()
        .expect("registry poisoned")
        .get(name)
        .cloned()
}

pub fn set_cur_runner(name: &str) -> Result<()> {
    if runner(name).is_none() {
        return Err(AstError::UnknownRunner(name.to_string()));
    }
    *registries().cur_runner.write().expect("registry poisoned") = Some(name.to_string());
    Ok(())
}

/// The selected runner, falling back to the default
pub fn cur_runner() -> Result<Arc<dyn Runner>> {
    let name = registries()
        .cur_runner
        .read()
        .expect("registry poisoned")
        .clone()
        .unwrap_or_else(|| DEFAULT_RUNNER.to_string());
    runner(&name).ok_or(AstError::UnknownRunner(name))
}

pub fn register_checker(factory: CheckerFactory) {
    let name = factory().name().to_string();
    let mut map = registries().checkers.write().expect("registry poisoned");
    if map.insert(name.clone(), factory).is_some() {
        panic!("checker {} has been registered!", name);
    }
}

/// Fresh checker instance by name
pub fn new_checker(name: &str) -> Result<Box<dyn Checker>> {
    registries()
        .checkers
        .read()
        .expect("registry poisoned")
        .get(name)
        .map(|f| f())
        .ok_or_else(|| AstError::UnknownChecker(name.to_string()))
}

pub fn register_test_discoverer(factory: DiscovererFactory) {
    let name = factory().name().to_string();
    let mut map = registries().discoverers.write().expect("registry poisoned");
    if map.insert(name.clone(), factory).is_some() {
        panic!("test discoverer {} has been registered!", name);
    }
}

/// Fresh, unconfigured discoverer instance by type name
pub fn new_test_discoverer(name: &str) -> Option<Box<dyn TestDiscoverer>> {
    registries()
        .discoverers
        .read()
        .expect("registry poisoned")
        .get(name)
        .map(|f| f())
}

pub fn test_discoverer_names() -> Vec<String> {
    let mut names: Vec<String> = registries()
        .discoverers
        .read()
        .expect("registry poisoned")
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}
