//! Error taxonomy for workflow discovery, argument parsing, and execution
//!
//! Every failure surfaces at the dispatcher as a `SnakeParseError`, which
//! renders as a single line and maps to a process exit code by category.

use std::path::PathBuf;

/// Process exit codes, one per error category
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Bad top-level usage or workflow selection
    pub const USAGE: i32 = 2;
    /// A workflow's parser could not be found or loaded
    pub const PARSER: i32 = 3;
    /// The execution engine could not be run
    pub const ENGINE: i32 = 4;
}

#[derive(Debug, thiserror::Error)]
pub enum SnakeParseError {
    #[error("No workflows found (searched: {})", .patterns.join(", "))]
    NoWorkflowsFound { patterns: Vec<String> },

    #[error(
        "Multiple workflows with name '{name}': {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateWorkflow {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Could not find a parser for workflow '{workflow}', tried: {}", .tried.join(", "))]
    MissingParser { workflow: String, tried: Vec<String> },

    #[error("Failed to load the parser for workflow '{workflow}': {source}")]
    ParserLoad {
        workflow: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Carries the host argument parser's error (or help request) unchanged
    #[error("Invalid arguments for workflow '{workflow}'")]
    WorkflowArgument {
        workflow: String,
        #[source]
        source: clap::Error,
    },

    /// Invalid snakeparse options, carried like `WorkflowArgument`
    #[error("Invalid snakeparse arguments")]
    TopLevelArgument(#[source] clap::Error),

    #[error("Unknown workflow '{name}', available workflows: {}", .available.join(", "))]
    UnknownWorkflow { name: String, available: Vec<String> },

    #[error("No workflow given, available workflows: {}", .available.join(", "))]
    NoWorkflowSelected { available: Vec<String> },

    #[error("Snakefile does not exist: {}", .0.display())]
    MissingSnakefile(PathBuf),

    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Failed to read base configuration {}: {message}", .path.display())]
    BaseConfig { path: PathBuf, message: String },

    #[error("Failed to run '{program}': {source}")]
    ExecutionEngine {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SnakeParseError {
    /// Exit code for this error's category
    pub fn exit_code(&self) -> i32 {
        match self {
            SnakeParseError::MissingParser { .. } | SnakeParseError::ParserLoad { .. } => {
                exit_codes::PARSER
            }
            SnakeParseError::WorkflowArgument { source, .. }
            | SnakeParseError::TopLevelArgument(source) => source.exit_code(),
            SnakeParseError::ExecutionEngine { .. } => exit_codes::ENGINE,
            _ => exit_codes::USAGE,
        }
    }

    /// The host argument parser's error, when this failure carries one
    pub fn clap_error(&self) -> Option<&clap::Error> {
        match self {
            SnakeParseError::WorkflowArgument { source, .. }
            | SnakeParseError::TopLevelArgument(source) => Some(source),
            _ => None,
        }
    }

    /// Whether the top-level usage should be shown alongside this error
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SnakeParseError::NoWorkflowsFound { .. }
                | SnakeParseError::UnknownWorkflow { .. }
                | SnakeParseError::NoWorkflowSelected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SnakeParseError>;
