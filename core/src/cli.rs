use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser};

use crate::config::{Config, ConfigBuilder};
use crate::error::{Result, SnakeParseError};
use crate::naming::NameTransform;

/// Separates the selection and workflow arguments from everything before it
pub const SEPARATOR: &str = "--";

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "snakeparse", version)]
#[command(about = "Command-line arguments for Snakemake workflows", long_about = None)]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run this snakefile as the workflow
    #[arg(short = 's', long)]
    pub snakefile: Option<PathBuf>,

    /// Glob pattern used to discover snakefiles (repeatable, or comma separated)
    #[arg(long, action = ArgAction::Append, value_delimiter = ',')]
    pub snakefile_globs: Vec<String>,

    /// Glob pattern used to find parser definitions (repeatable, or comma separated)
    #[arg(long, action = ArgAction::Append, value_delimiter = ',')]
    pub snakeparse_globs: Vec<String>,

    /// Program name shown in usage lines
    #[arg(long)]
    pub prog: Option<String>,

    /// Path to the snakemake executable, otherwise it should be on the PATH
    #[arg(long)]
    pub snakemake: Option<PathBuf>,

    /// How snakefile names become workflow names: snake_to_camel, camel_to_snake, none
    #[arg(long)]
    pub name_transform: Option<NameTransform>,

    /// Group workflows by the directory containing their snakefile
    #[arg(long)]
    pub parent_dir_is_group_name: bool,

    /// JSON, YAML or TOML file with configuration values the workflow
    /// arguments are merged over
    #[arg(long)]
    pub base_config: Option<PathBuf>,

    /// Show snakefile and parser details in the workflow listing
    #[arg(long)]
    pub extra_help: bool,

    /// Print help and the available workflows
    #[arg(short = 'h', long, action = ArgAction::SetTrue)]
    pub help: bool,
}

impl Cli {
    /// Parse snakeparse's own options (no binary name)
    pub fn parse_tokens(prog: &str, tokens: &[String]) -> Result<Self> {
        Cli::try_parse_from(std::iter::once(prog.to_string()).chain(tokens.iter().cloned()))
            .map_err(SnakeParseError::TopLevelArgument)
    }

    /// Configuration builder carrying these options as overrides
    pub fn config_builder(&self) -> ConfigBuilder {
        Config::builder()
            .config_path(self.config.clone())
            .prog(self.prog.clone())
            .snakemake(self.snakemake.clone())
            .name_transform(self.name_transform)
            .parent_dir_is_group_name(self.parent_dir_is_group_name.then_some(true))
            .snakefile_globs(self.snakefile_globs.clone())
            .parser_globs(self.snakeparse_globs.clone())
            .base_config(self.base_config.clone())
            .extra_help(self.extra_help.then_some(true))
    }

    /// Rendered option help for the top-level usage
    pub fn option_help() -> String {
        let mut command = Cli::command();
        command.render_help().to_string()
    }
}

/// Command-line tokens split by who consumes them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitArgs {
    /// Snakeparse's own options with their values
    pub top_level: Vec<String>,
    /// Everything before the separator that snakeparse does not know,
    /// handed to Snakemake
    pub passthrough: Vec<String>,
    /// Tokens after the separator: an optional workflow name, then the
    /// workflow's own arguments
    pub workflow: Vec<String>,
    /// Whether a separator was present
    pub has_separator: bool,
    /// Position in the input of each pass-through token
    passthrough_at: Vec<usize>,
    /// Position in the input of the last snakeparse token
    last_top_level_at: Option<usize>,
}

impl SplitArgs {
    /// Input position of the first pass-through token matching `is_workflow`
    pub fn first_workflow_position<F>(&self, is_workflow: F) -> Option<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.passthrough
            .iter()
            .zip(&self.passthrough_at)
            .find(|(token, _)| is_workflow(token))
            .map(|(_, index)| *index)
    }

    /// Whether any snakeparse option appears after input position `index`
    pub fn has_top_level_after(&self, index: usize) -> bool {
        self.last_top_level_at.map(|last| last > index).unwrap_or(false)
    }
}

struct KnownOption {
    long: Option<String>,
    short: Option<char>,
    takes_value: bool,
}

fn known_options() -> Vec<KnownOption> {
    let mut command = Cli::command();
    command.build();
    command
        .get_arguments()
        .filter(|arg| !arg.is_positional())
        .map(|arg| KnownOption {
            long: arg.get_long().map(str::to_string),
            short: arg.get_short(),
            takes_value: arg.get_action().takes_values(),
        })
        .collect()
}

/// Split raw arguments (without the program name)
///
/// Tokens after the first `--` are workflow tokens. Before it, recognised
/// snakeparse options keep their values; everything else passes through to
/// Snakemake in order.
pub fn split_args(args: &[String]) -> SplitArgs {
    let known = known_options();
    let separator = args.iter().position(|a| a == SEPARATOR);
    let head_len = separator.unwrap_or(args.len());

    let mut split = SplitArgs {
        has_separator: separator.is_some(),
        workflow: separator
            .map(|i| args[i + 1..].to_vec())
            .unwrap_or_default(),
        ..SplitArgs::default()
    };

    let mut i = 0;
    while i < head_len {
        let token = &args[i];
        let option = lookup(&known, token);

        let Some((option, inline_value)) = option else {
            split.passthrough.push(token.clone());
            split.passthrough_at.push(i);
            i += 1;
            continue;
        };

        split.top_level.push(token.clone());
        split.last_top_level_at = Some(i);
        i += 1;

        if option.takes_value && !inline_value && i < head_len {
            split.top_level.push(args[i].clone());
            split.last_top_level_at = Some(i);
            i += 1;
        }
    }

    split
}

/// The option a token names, and whether it carries its value inline
fn lookup<'a>(known: &'a [KnownOption], token: &str) -> Option<(&'a KnownOption, bool)> {
    if let Some(long) = token.strip_prefix("--") {
        let (name, inline) = match long.split_once('=') {
            Some((name, _)) => (name, true),
            None => (long, false),
        };
        return known
            .iter()
            .find(|option| option.long.as_deref() == Some(name))
            .map(|option| (option, inline));
    }

    let short = token.strip_prefix('-')?;
    let mut chars = short.chars();
    let flag = chars.next()?;
    let rest = chars.as_str();
    let option = known.iter().find(|option| option.short == Some(flag))?;

    if rest.is_empty() {
        Some((option, false))
    } else if option.takes_value {
        // `-sfile.smk`
        Some((option, true))
    } else {
        None
    }
}
