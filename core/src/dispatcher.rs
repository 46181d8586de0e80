//! Top-level orchestration
//!
//! One run goes through these steps:
//! 1. split the arguments and read snakeparse's own options;
//! 2. build the configuration and discover workflows;
//! 3. select a workflow (an explicit `--snakefile`, a name, or the only one);
//! 4. parse the workflow arguments with the workflow's parser, merged over
//!    the base configuration;
//! 5. hand the snakefile and configuration to the execution engine.
//!
//! Every failure is reported once on the output writer and becomes an exit
//! code; the engine's own status is returned unchanged.

use std::io::Write;

use tracing::{debug, info};

use crate::cli::{split_args, Cli, SplitArgs, SEPARATOR};
use crate::config::Config;
use crate::engine::{ExecutionEngine, SnakemakeEngine};
use crate::error::{exit_codes, Result, SnakeParseError};
use crate::parser::{ParserRegistry, ParserResolver};
use crate::types::WorkflowDescriptor;
use crate::usage;
use crate::workflows::WorkflowRegistry;

/// Name used when parsing snakeparse's own options
const BIN_NAME: &str = "snakeparse";

/// The workflow chosen for a run and the tokens meant for its parser
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub workflow: WorkflowDescriptor,
    pub workflow_args: Vec<String>,
}

pub struct Dispatcher {
    parsers: ParserRegistry,
    engine: Option<Box<dyn ExecutionEngine>>,
}

impl Dispatcher {
    /// Dispatcher running Snakemake from the configured executable
    pub fn new(parsers: ParserRegistry) -> Self {
        Self {
            parsers,
            engine: None,
        }
    }

    /// Use `engine` instead of Snakemake
    pub fn with_engine(mut self, engine: impl ExecutionEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Run with `args` (without the program name), reporting to `out`
    pub fn run(&self, args: &[String], out: &mut dyn Write) -> i32 {
        match self.try_run(args, out) {
            Ok(code) => code,
            Err(err) => {
                report(out, &err);
                err.exit_code()
            }
        }
    }

    fn try_run(&self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let mut split = split_args(args);
        let cli = Cli::parse_tokens(BIN_NAME, &split.top_level)?;
        let config = cli.config_builder().build()?;

        if cli.snakefile.is_none() && !config.has_workflow_sources() {
            write_usage(out, &config, None, None);
            return Ok(if cli.help {
                exit_codes::SUCCESS
            } else {
                exit_codes::USAGE
            });
        }

        let mut registry = WorkflowRegistry::from_config(&config)?;
        let explicit = match &cli.snakefile {
            Some(path) => Some(registry.add_snakefile(path)?),
            None => None,
        };
        if let Err(err) = registry.require_any() {
            return usage_error(out, &config, None, err);
        }

        // Without `--`, the first pass-through token naming a workflow starts
        // the workflow tokens
        if !split.has_separator {
            if let Some(index) = split.first_workflow_position(|token| registry.get(token).is_some()) {
                let mut reshaped = args[..index].to_vec();
                reshaped.push(SEPARATOR.to_string());
                reshaped.extend_from_slice(&args[index..]);

                if split.has_top_level_after(index) {
                    debug!("Options after the workflow name belong to the workflow");
                    return self.try_run(&reshaped, out);
                }
                split = split_args(&reshaped);
            }
        }

        let resolver = ParserResolver::new(&self.parsers, config.prog.clone())
            .with_parser_globs(&config.parser_globs)?;
        registry.annotate(|workflow| resolver.describe(workflow));

        if cli.help {
            write_usage(out, &config, Some(&registry), None);
            return Ok(exit_codes::SUCCESS);
        }

        let selection = match select(explicit, &split, &registry) {
            Ok(Some(selection)) => selection,
            Ok(None) => {
                write_usage(out, &config, Some(&registry), None);
                return Ok(exit_codes::SUCCESS);
            }
            Err(err) => return usage_error(out, &config, Some(&registry), err),
        };

        self.execute(&config, &resolver, selection, &split.passthrough)
    }

    fn execute(
        &self,
        config: &Config,
        resolver: &ParserResolver<'_>,
        selection: Selection,
        engine_args: &[String],
    ) -> Result<i32> {
        let Selection {
            workflow,
            workflow_args,
        } = selection;
        info!(workflow = %workflow.display_name, snakefile = %workflow.file_path.display(), "Selected workflow");

        let parser = resolver.resolve(&workflow)?;
        let base = config.load_base_config()?;
        let merged = parser.parse(&workflow_args, &base)?;
        debug!(workflow = %workflow.display_name, keys = merged.len(), "Parsed workflow arguments");

        match &self.engine {
            Some(engine) => engine.execute(&workflow.file_path, &merged, engine_args),
            None => SnakemakeEngine::new(&config.snakemake).execute(&workflow.file_path, &merged, engine_args),
        }
    }
}

/// Choose the workflow to run
///
/// Returns `None` when the workflow tokens only ask for help.
pub fn select(
    explicit: Option<WorkflowDescriptor>,
    split: &SplitArgs,
    registry: &WorkflowRegistry,
) -> Result<Option<Selection>> {
    let mut tokens = split.workflow.clone();

    if let Some(workflow) = explicit {
        if tokens.first() == Some(&workflow.display_name) {
            tokens.remove(0);
        }
        return Ok(Some(Selection {
            workflow,
            workflow_args: tokens,
        }));
    }

    if let Some(workflow) = tokens.first().and_then(|name| registry.get(name)).cloned() {
        tokens.remove(0);
        return Ok(Some(Selection {
            workflow,
            workflow_args: tokens,
        }));
    }

    if let Some(workflow) = registry.single() {
        return Ok(Some(Selection {
            workflow: workflow.clone(),
            workflow_args: tokens,
        }));
    }

    match tokens.first().map(String::as_str) {
        Some("-h") | Some("--help") => Ok(None),
        Some(name) => Err(SnakeParseError::UnknownWorkflow {
            name: name.to_string(),
            available: registry.names(),
        }),
        None => Err(SnakeParseError::NoWorkflowSelected {
            available: registry.names(),
        }),
    }
}

fn write_usage(out: &mut dyn Write, config: &Config, registry: Option<&WorkflowRegistry>, message: Option<&str>) {
    if let Err(e) = usage::write_usage(out, config, registry, message) {
        debug!("Failed to write usage: {}", e);
    }
}

/// Print the top-level usage ahead of a usage-category error
fn usage_error<T>(
    out: &mut dyn Write,
    config: &Config,
    registry: Option<&WorkflowRegistry>,
    err: SnakeParseError,
) -> Result<T> {
    if err.is_usage() {
        write_usage(out, config, registry, None);
    }
    Err(err)
}

/// One line per error; argument errors keep clap's own rendering
fn report(out: &mut dyn Write, err: &SnakeParseError) {
    let written = match err.clap_error() {
        Some(source) => write!(out, "{}", source.render()),
        None => writeln!(out, "error: {err}"),
    };
    if let Err(e) = written {
        debug!("Failed to report error: {}", e);
    }
}
