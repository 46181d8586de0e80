pub mod builtin;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod naming;
pub mod parser;
pub mod types;
pub mod usage;
pub mod workflows;

// Re-export main types
pub use types::*;

pub use dispatcher::Dispatcher;
pub use engine::{ExecutionEngine, SnakemakeEngine};
pub use error::{Result, SnakeParseError};
pub use parser::{ArgumentParser, ParserRegistry, WorkflowParser};
pub use workflows::WorkflowRegistry;

/// Run with the process arguments and the bundled parsers, returning the exit code
///
/// Usage, listings and errors are written to stderr.
pub fn run_from_args(args: Vec<String>) -> i32 {
    let mut parsers = ParserRegistry::new();
    builtin::register(&mut parsers);
    Dispatcher::new(parsers).run(&args, &mut std::io::stderr())
}
