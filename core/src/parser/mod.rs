//! Per-workflow argument parsing
//!
//! Each workflow has a companion parser that declares the options it accepts.
//! Parsers come in two authoring styles that share one contract,
//! [`WorkflowParser`]:
//!
//! - **Function style** ([`FunctionParser`]): a callable that receives the
//!   [`ParserOptions`] and returns a configured `clap::Command`. Declarative
//!   definition files are adapted through this style as well.
//! - **Type style** ([`TypeParser`]): a type implementing [`ArgumentParser`],
//!   which supplies the command and may override how matches become
//!   configuration values.
//!
//! ```rust
//! use clap::{Arg, Command};
//! use snakeparse_core::parser::{FunctionParser, ParserOptions, WorkflowParser};
//! use snakeparse_core::ParsedConfiguration;
//!
//! let parser = FunctionParser::new(
//!     |_opts: &ParserOptions| Command::new("write_message")
//!         .arg(Arg::new("message").long("message").required(true)),
//!     ParserOptions::new("snakeparse", "WriteMessage"),
//! );
//! let args = vec!["--message".to_string(), "Hello World!".to_string()];
//! let config = parser.parse(&args, &ParsedConfiguration::new()).unwrap();
//! assert_eq!(config.get("message").unwrap(), "Hello World!");
//! ```

pub mod definition;
pub mod registry;

#[cfg(test)]
mod tests;

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Once};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value as JsonValue;

use crate::error::{Result, SnakeParseError};
use crate::types::ParsedConfiguration;

pub use definition::{OptionDefinition, OptionType, ParserDefinition};
pub use registry::{ParserEntry, ParserInfo, ParserRegistry, ParserResolver};

/// Extra options applied to every workflow parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Name of the tool-chain, shown in usage lines
    pub prog: String,
    /// Display name of the workflow being parsed
    pub workflow: String,
}

impl ParserOptions {
    pub fn new(prog: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            prog: prog.into(),
            workflow: workflow.into(),
        }
    }

    pub fn bin_name(&self) -> String {
        format!("{} {}", self.prog, self.workflow)
    }

    /// Stamp the workflow name and usage onto a command
    fn apply(&self, command: Command) -> Command {
        command
            .name(self.workflow.clone())
            .bin_name(self.bin_name())
            .no_binary_name(true)
    }
}

/// Parses a workflow's command-line tokens into its configuration
pub trait WorkflowParser {
    /// Parse `args` and merge the result over `base`; parsed values win.
    ///
    /// Invalid input (and `-h`/`--help`) is reported as
    /// [`SnakeParseError::WorkflowArgument`] carrying the clap error unchanged.
    fn parse(&self, args: &[String], base: &ParsedConfiguration) -> Result<ParsedConfiguration>;
}

/// Type-style parser definition
///
/// ```rust
/// use clap::error::ErrorKind;
/// use clap::{Arg, ArgMatches, Command};
/// use snakeparse_core::parser::{values_from_matches, ArgumentParser, ParsedValues};
///
/// #[derive(Default)]
/// struct Trim;
///
/// impl ArgumentParser for Trim {
///     fn parser(&self) -> Command {
///         Command::new("trim")
///             .arg(Arg::new("min-length").long("min-length").value_parser(clap::value_parser!(i64)))
///             .arg(Arg::new("max-length").long("max-length").value_parser(clap::value_parser!(i64)))
///     }
///
///     fn parse_config(&self, command: &Command, matches: &ArgMatches) -> Result<ParsedValues, clap::Error> {
///         let min = matches.get_one::<i64>("min-length");
///         let max = matches.get_one::<i64>("max-length");
///         if let (Some(min), Some(max)) = (min, max) {
///             if min > max {
///                 return Err(command
///                     .clone()
///                     .error(ErrorKind::ArgumentConflict, "--min-length is larger than --max-length"));
///             }
///         }
///         Ok(values_from_matches(command, matches))
///     }
/// }
/// ```
pub trait ArgumentParser {
    /// The underlying clap command
    fn parser(&self) -> Command;

    /// Convert matches into configuration values
    ///
    /// The default keeps every argument that received a value, see
    /// [`values_from_matches`]. An error rejects the arguments and is
    /// reported like any other invalid workflow argument.
    fn parse_config(&self, command: &Command, matches: &ArgMatches) -> std::result::Result<ParsedValues, clap::Error> {
        Ok(values_from_matches(command, matches))
    }
}

/// Configuration values produced by a parser, split by where they came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedValues {
    /// Values given on the command line (or through an argument's env var)
    pub explicit: ParsedConfiguration,
    /// Values that only come from argument defaults
    pub defaults: ParsedConfiguration,
}

impl ParsedValues {
    /// Explicit values override `base`; defaults only fill missing keys
    pub fn merge_over(&self, base: &ParsedConfiguration) -> ParsedConfiguration {
        let mut merged = self.explicit.merged_over(base);
        for (key, value) in self.defaults.iter() {
            merged.insert_default(key.clone(), value.clone());
        }
        merged
    }
}

impl From<ParsedConfiguration> for ParsedValues {
    fn from(explicit: ParsedConfiguration) -> Self {
        Self {
            explicit,
            defaults: ParsedConfiguration::new(),
        }
    }
}

pub type CommandFactory = Arc<dyn Fn(&ParserOptions) -> Command + Send + Sync>;

/// Function-style adapter
#[derive(Clone)]
pub struct FunctionParser {
    factory: CommandFactory,
    options: ParserOptions,
}

impl FunctionParser {
    pub fn new<F>(factory: F, options: ParserOptions) -> Self
    where
        F: Fn(&ParserOptions) -> Command + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(factory), options)
    }

    pub fn from_factory(factory: CommandFactory, options: ParserOptions) -> Self {
        Self { factory, options }
    }

    /// Build the configured command
    pub fn build(&self, options: &ParserOptions) -> Result<Command> {
        build_command(options, || (self.factory)(options))
    }
}

impl WorkflowParser for FunctionParser {
    fn parse(&self, args: &[String], base: &ParsedConfiguration) -> Result<ParsedConfiguration> {
        let mut command = self.build(&self.options)?;
        let matches = match_args(&mut command, &self.options, args)?;
        Ok(values_from_matches(&command, &matches).merge_over(base))
    }
}

/// Type-style adapter around an [`ArgumentParser`] instance
pub struct TypeParser<T> {
    instance: T,
    options: ParserOptions,
}

impl<T: ArgumentParser> TypeParser<T> {
    pub fn new(instance: T, options: ParserOptions) -> Self {
        Self { instance, options }
    }

    /// Build the configured command
    pub fn build(&self, options: &ParserOptions) -> Result<Command> {
        build_command(options, || self.instance.parser())
    }

    pub fn instance(&self) -> &T {
        &self.instance
    }
}

impl<T: ArgumentParser> WorkflowParser for TypeParser<T> {
    fn parse(&self, args: &[String], base: &ParsedConfiguration) -> Result<ParsedConfiguration> {
        let mut command = self.build(&self.options)?;
        let matches = match_args(&mut command, &self.options, args)?;
        let values = guard_panic(&self.options.workflow, || self.instance.parse_config(&command, &matches))?
            .map_err(|source| SnakeParseError::WorkflowArgument {
                workflow: self.options.workflow.clone(),
                source,
            })?;
        Ok(values.merge_over(base))
    }
}

/// Run a command factory, turning panics (clap's debug assertions on a
/// malformed command) into `ParserLoad`
fn build_command<F>(options: &ParserOptions, factory: F) -> Result<Command>
where
    F: FnOnce() -> Command,
{
    guard_panic(&options.workflow, || {
        let mut command = options.apply(factory());
        command.build();
        command
    })
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Wrap the panic hook once so panics inside `guard_panic` print nothing
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Call `f`, reporting a panic as `ParserLoad` for `workflow`
pub(crate) fn guard_panic<T, F>(workflow: &str, f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    install_quiet_hook();
    let outer = QUIET_PANICS.with(|quiet| quiet.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    QUIET_PANICS.with(|quiet| quiet.set(outer));

    result.map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "parser definition panicked".to_string());
        SnakeParseError::ParserLoad {
            workflow: workflow.to_string(),
            source: message.into(),
        }
    })
}

fn match_args(command: &mut Command, options: &ParserOptions, args: &[String]) -> Result<ArgMatches> {
    command
        .try_get_matches_from_mut(args.iter().cloned())
        .map_err(|source| SnakeParseError::WorkflowArgument {
            workflow: options.workflow.clone(),
            source,
        })
}

/// Configuration key for an argument id: `output-dir` → `output_dir`
pub fn config_key(id: &str) -> String {
    id.replace('-', "_")
}

/// Convert every argument that received a value into a configuration entry
///
/// Flags become booleans, counts become numbers, typed values keep their
/// type, and multi-valued arguments become lists.
pub fn values_from_matches(command: &Command, matches: &ArgMatches) -> ParsedValues {
    let mut values = ParsedValues::default();

    for arg in command.get_arguments() {
        if matches!(
            arg.get_action(),
            ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
        ) {
            continue;
        }

        let id = arg.get_id().as_str();
        let Some(source) = matches.value_source(id) else {
            continue;
        };
        let Some(value) = arg_value(arg, matches) else {
            continue;
        };

        let key = config_key(id);
        match source {
            ValueSource::DefaultValue => {
                values.defaults.insert(key, value);
            }
            _ => {
                values.explicit.insert(key, value);
            }
        }
    }

    values
}

fn arg_value(arg: &Arg, matches: &ArgMatches) -> Option<JsonValue> {
    let id = arg.get_id().as_str();

    match arg.get_action() {
        ArgAction::SetTrue | ArgAction::SetFalse => matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .map(|b| JsonValue::Bool(*b)),
        ArgAction::Count => matches
            .try_get_one::<u8>(id)
            .ok()
            .flatten()
            .map(|n| JsonValue::from(*n)),
        _ => {
            let mut values = typed_values(matches, id)?;
            if is_multiple(arg) {
                Some(JsonValue::Array(values))
            } else if values.is_empty() {
                None
            } else {
                Some(values.swap_remove(0))
            }
        }
    }
}

fn is_multiple(arg: &Arg) -> bool {
    matches!(arg.get_action(), ArgAction::Append)
        || arg
            .get_num_args()
            .map(|range| range.max_values() > 1)
            .unwrap_or(false)
}

trait ToJsonValue {
    fn to_json_value(&self) -> JsonValue;
}

impl ToJsonValue for String {
    fn to_json_value(&self) -> JsonValue {
        JsonValue::String(self.clone())
    }
}

impl ToJsonValue for PathBuf {
    fn to_json_value(&self) -> JsonValue {
        JsonValue::String(self.to_string_lossy().into_owned())
    }
}

macro_rules! impl_to_json_value {
    ($($ty:ty),*) => {
        $(
            impl ToJsonValue for $ty {
                fn to_json_value(&self) -> JsonValue {
                    JsonValue::from(*self)
                }
            }
        )*
    };
}

impl_to_json_value!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

fn try_values<T>(matches: &ArgMatches, id: &str) -> Option<Vec<JsonValue>>
where
    T: ToJsonValue + Clone + Send + Sync + 'static,
{
    match matches.try_get_many::<T>(id) {
        Ok(values) => Some(
            values
                .map(|vals| vals.map(ToJsonValue::to_json_value).collect())
                .unwrap_or_default(),
        ),
        Err(_) => None,
    }
}

/// Values for `id` in whatever type its value parser produced
fn typed_values(matches: &ArgMatches, id: &str) -> Option<Vec<JsonValue>> {
    try_values::<String>(matches, id)
        .or_else(|| try_values::<PathBuf>(matches, id))
        .or_else(|| try_values::<i64>(matches, id))
        .or_else(|| try_values::<u64>(matches, id))
        .or_else(|| try_values::<f64>(matches, id))
        .or_else(|| try_values::<bool>(matches, id))
        .or_else(|| try_values::<i32>(matches, id))
        .or_else(|| try_values::<u32>(matches, id))
        .or_else(|| try_values::<usize>(matches, id))
        .or_else(|| try_values::<isize>(matches, id))
        .or_else(|| try_values::<i16>(matches, id))
        .or_else(|| try_values::<u16>(matches, id))
        .or_else(|| try_values::<i8>(matches, id))
        .or_else(|| try_values::<u8>(matches, id))
        .or_else(|| try_values::<f32>(matches, id))
        .or_else(|| {
            matches.get_raw(id).map(|raw| {
                raw.map(|v| JsonValue::String(v.to_string_lossy().into_owned()))
                    .collect()
            })
        })
}
