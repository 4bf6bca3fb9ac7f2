//! Errors surfaced by the plan compiler
//!
//! Parse and link failures carry enough context to point at the offending
//! entity: the keyword set a node accepts, the name that failed to resolve,
//! or the pair of groups forming an include loop.

use jarvism_config::ConfigError;
use thiserror::Error;

/// Result type for plan-compiler operations
pub type Result<T> = std::result::Result<T, AstError>;

#[derive(Debug, Error)]
pub enum AstError {
    /// Unknown key under a node; names the node and the legal set
    #[error("{tag}syntax error of {key}! expect {expect:?}")]
    Syntax {
        tag: String,
        key: String,
        expect: Vec<String>,
    },

    /// A required key is absent
    #[error("not define {0}!")]
    NotDefined(String),

    /// An option declared both action bodies
    #[error("on_action and with_value_action are both defined!")]
    BothActions,

    /// Queried an option name nobody registered
    #[error("option {0} is undef!")]
    UnknownOption(String),

    /// A value-form option was given without a value
    #[error("option {0} expects a value!")]
    MissingValue(String),

    /// An option rejected its value
    #[error("invalid value {value:?} for option {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// Two user options share a name
    #[error("option {0} is redefined!")]
    RedefinedOption(String),

    /// A build reference did not resolve
    #[error("build {build} of {item} is undef!")]
    UndefBuild { build: String, item: String },

    /// A test case resolved no build anywhere on its parent chain
    #[error("no build resolved for test {0}!")]
    NoBuild(String),

    /// A sub-group reference did not resolve
    #[error("sub group {sub} of group {group} is undef!")]
    UndefGroup { sub: String, group: String },

    /// A sub-group is listed twice in one group
    #[error("sub group {sub} is redefined in group {group}!")]
    RedefinedSubGroup { sub: String, group: String },

    /// The group graph contains a cycle
    #[error("Loop include: group {group} and group {ancestor}")]
    LoopInclude { group: String, ancestor: String },

    /// Looked up a group nobody defined
    #[error("group {0} is undef!")]
    UnknownGroup(String),

    #[error("simulator {name} is invalid! valid simulators are {valid:?}")]
    InvalidSimulator { name: String, valid: Vec<String> },

    #[error("test_discoverer type {name} is invalid! valid test_discoverers are {valid:?}")]
    InvalidDiscoverer { name: String, valid: Vec<String> },

    #[error("checker {0} is not registered!")]
    UnknownChecker(String),

    #[error("runner {0} is not registered!")]
    UnknownRunner(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Wraps an error with the entity it occurred in
    #[error("Error in {item}: {source}")]
    Context {
        item: String,
        #[source]
        source: Box<AstError>,
    },
}

impl AstError {
    /// Wrap `err` with the name of the entity being processed
    pub fn ctx(item: impl Into<String>, err: AstError) -> AstError {
        AstError::Context {
            item: item.into(),
            source: Box::new(err),
        }
    }
}

/// Extension adding `.ctx("item")` to plan-compiler results
pub trait ResultExt<T> {
    fn ctx(self, item: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn ctx(self, item: &str) -> Result<T> {
        self.map_err(|e| AstError::ctx(item, e))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ConfigError> {
    fn ctx(self, item: &str) -> Result<T> {
        self.map_err(|e| AstError::ctx(item, AstError::from(e)))
    }
}
