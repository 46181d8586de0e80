//! Tests for workflow parsers and parser resolution

use super::*;
use crate::error::SnakeParseError;
use crate::types::WorkflowDescriptor;
use clap::error::ErrorKind;
use clap::value_parser;
use maplit::btreemap;
use serde_json::json;
use std::fs;
use std::path::Path;

// ============================================================================
// Helper Functions
// ============================================================================

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

fn message_command(_opts: &ParserOptions) -> Command {
    Command::new("write_message")
        .about("Writes a message")
        .arg(Arg::new("message").long("message").required(true))
}

fn message_parser() -> FunctionParser {
    FunctionParser::new(message_command, ParserOptions::new("snakeparse", "WriteMessage"))
}

#[derive(Default)]
struct WriteLog;

impl ArgumentParser for WriteLog {
    fn parser(&self) -> Command {
        Command::new("write_log")
            .arg(Arg::new("message").long("message").required(true))
            .arg(
                Arg::new("log-level")
                    .long("log-level")
                    .default_value("info"),
            )
    }
}

#[derive(Default)]
struct Shouting;

impl ArgumentParser for Shouting {
    fn parser(&self) -> Command {
        Command::new("shouting").arg(Arg::new("message").long("message").required(true))
    }

    fn parse_config(&self, command: &Command, matches: &ArgMatches) -> std::result::Result<ParsedValues, clap::Error> {
        let mut values = values_from_matches(command, matches);
        if let Some(JsonValue::String(message)) = values.explicit.get("message").cloned() {
            values.explicit.insert("message", message.to_uppercase());
        }
        Ok(values)
    }
}

/// Rejects a range whose bounds are the wrong way round
#[derive(Default)]
struct LengthRange;

impl ArgumentParser for LengthRange {
    fn parser(&self) -> Command {
        Command::new("length_range")
            .arg(Arg::new("min").long("min").value_parser(value_parser!(i64)))
            .arg(Arg::new("max").long("max").value_parser(value_parser!(i64)))
    }

    fn parse_config(&self, command: &Command, matches: &ArgMatches) -> std::result::Result<ParsedValues, clap::Error> {
        if let (Some(min), Some(max)) = (matches.get_one::<i64>("min"), matches.get_one::<i64>("max")) {
            if min > max {
                return Err(command
                    .clone()
                    .error(ErrorKind::ArgumentConflict, "--min is larger than --max"));
            }
        }
        Ok(values_from_matches(command, matches))
    }
}

#[derive(Default)]
struct Exploding;

impl ArgumentParser for Exploding {
    fn parser(&self) -> Command {
        Command::new("exploding").arg(Arg::new("message").long("message"))
    }

    fn parse_config(&self, _command: &Command, _matches: &ArgMatches) -> std::result::Result<ParsedValues, clap::Error> {
        panic!("cannot convert matches")
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Function-style Parsers
// ============================================================================

#[test]
fn test_function_parser_round_trip() {
    let config = message_parser()
        .parse(&args(&["--message", "Hello World!"]), &ParsedConfiguration::new())
        .unwrap();

    assert_eq!(config.len(), 1);
    assert_eq!(config.get("message"), Some(&json!("Hello World!")));
}

#[test]
fn test_parse_preserves_base_keys() {
    let base = ParsedConfiguration::from(btreemap! {
        "message".to_string() => json!("from base"),
        "threads".to_string() => json!(8),
    });

    let config = message_parser()
        .parse(&args(&["--message", "from cli"]), &base)
        .unwrap();

    assert_eq!(config.get("message"), Some(&json!("from cli")));
    assert_eq!(config.get("threads"), Some(&json!(8)));
}

#[test]
fn test_missing_required_argument_is_workflow_error() {
    let err = message_parser()
        .parse(&[], &ParsedConfiguration::new())
        .unwrap_err();

    match err {
        SnakeParseError::WorkflowArgument { workflow, source } => {
            assert_eq!(workflow, "WriteMessage");
            assert_eq!(source.kind(), ErrorKind::MissingRequiredArgument);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_help_is_reported_through_clap() {
    let err = message_parser()
        .parse(&args(&["--help"]), &ParsedConfiguration::new())
        .unwrap_err();

    match err {
        SnakeParseError::WorkflowArgument { source, .. } => {
            assert_eq!(source.kind(), ErrorKind::DisplayHelp);
            assert_eq!(source.exit_code(), 0);
            let rendered = source.render().to_string();
            assert!(rendered.contains("snakeparse WriteMessage"));
            assert!(rendered.contains("--message"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_build_applies_options() {
    let parser = message_parser();
    let command = parser
        .build(&ParserOptions::new("pipeline", "WriteMessage"))
        .unwrap();

    assert_eq!(command.get_name(), "WriteMessage");
    assert_eq!(command.get_bin_name(), Some("pipeline WriteMessage"));
    assert!(command.is_no_binary_name_set());
}

// clap only checks command definitions in debug builds
#[cfg(debug_assertions)]
#[test]
fn test_malformed_command_is_parser_load() {
    let parser = FunctionParser::new(
        |_opts: &ParserOptions| {
            Command::new("broken")
                .arg(Arg::new("message").long("message"))
                .arg(Arg::new("message").long("other"))
        },
        ParserOptions::new("snakeparse", "Broken"),
    );

    let err = parser.parse(&[], &ParsedConfiguration::new()).unwrap_err();
    assert!(matches!(err, SnakeParseError::ParserLoad { ref workflow, .. } if workflow == "Broken"));
}

#[test]
fn test_panicking_factory_is_parser_load() {
    let parser = FunctionParser::new(
        |_opts: &ParserOptions| -> Command { panic!("factory failed") },
        ParserOptions::new("snakeparse", "Broken"),
    );

    match parser.parse(&[], &ParsedConfiguration::new()).unwrap_err() {
        SnakeParseError::ParserLoad { workflow, source } => {
            assert_eq!(workflow, "Broken");
            assert_eq!(source.to_string(), "factory failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Type-style Parsers
// ============================================================================

#[test]
fn test_type_parser_round_trip() {
    let parser = TypeParser::new(WriteLog, ParserOptions::new("snakeparse", "WriteLog"));
    let config = parser
        .parse(&args(&["--message", "Hello World!"]), &ParsedConfiguration::new())
        .unwrap();

    assert_eq!(config.get("message"), Some(&json!("Hello World!")));
    assert_eq!(config.get("log_level"), Some(&json!("info")));
}

#[test]
fn test_defaults_do_not_override_base() {
    let parser = TypeParser::new(WriteLog, ParserOptions::new("snakeparse", "WriteLog"));
    let base = ParsedConfiguration::from(btreemap! {
        "log_level".to_string() => json!("debug"),
    });

    let config = parser.parse(&args(&["--message", "hi"]), &base).unwrap();
    assert_eq!(config.get("log_level"), Some(&json!("debug")));

    let config = parser
        .parse(&args(&["--message", "hi", "--log-level", "warn"]), &base)
        .unwrap();
    assert_eq!(config.get("log_level"), Some(&json!("warn")));
}

#[test]
fn test_type_parser_custom_parse_config() {
    let parser = TypeParser::new(Shouting, ParserOptions::new("snakeparse", "Shouting"));
    let config = parser
        .parse(&args(&["--message", "quiet"]), &ParsedConfiguration::new())
        .unwrap();

    assert_eq!(config.get("message"), Some(&json!("QUIET")));
}

#[test]
fn test_type_parser_can_reject_arguments() {
    let parser = TypeParser::new(LengthRange, ParserOptions::new("snakeparse", "LengthRange"));

    let config = parser
        .parse(&args(&["--min", "1", "--max", "5"]), &ParsedConfiguration::new())
        .unwrap();
    assert_eq!(config.get("max"), Some(&json!(5)));

    let err = parser
        .parse(&args(&["--min", "9", "--max", "5"]), &ParsedConfiguration::new())
        .unwrap_err();
    match &err {
        SnakeParseError::WorkflowArgument { workflow, source } => {
            assert_eq!(workflow, "LengthRange");
            assert_eq!(source.kind(), ErrorKind::ArgumentConflict);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_panicking_parse_config_is_parser_load() {
    let parser = TypeParser::new(Exploding, ParserOptions::new("snakeparse", "Exploding"));
    let err = parser
        .parse(&args(&["--message", "hi"]), &ParsedConfiguration::new())
        .unwrap_err();

    assert!(matches!(err, SnakeParseError::ParserLoad { ref workflow, .. } if workflow == "Exploding"));
}

// ============================================================================
// Value Conversion
// ============================================================================

#[test]
fn test_values_keep_their_types() {
    let mut command = Command::new("typed")
        .no_binary_name(true)
        .arg(Arg::new("threads").long("threads").value_parser(value_parser!(i64)))
        .arg(Arg::new("ratio").long("ratio").value_parser(value_parser!(f64)))
        .arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue))
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(
            Arg::new("sample")
                .long("sample")
                .action(ArgAction::Append),
        )
        .arg(Arg::new("output").long("output").value_parser(value_parser!(PathBuf)));

    let matches = command
        .try_get_matches_from_mut([
            "--threads", "4", "--ratio", "0.5", "--dry-run", "-vv", "--sample", "a", "--sample",
            "b", "--output", "out/report.txt",
        ])
        .unwrap();
    let values = values_from_matches(&command, &matches);

    assert_eq!(values.explicit.get("threads"), Some(&json!(4)));
    assert_eq!(values.explicit.get("ratio"), Some(&json!(0.5)));
    assert_eq!(values.explicit.get("dry_run"), Some(&json!(true)));
    assert_eq!(values.explicit.get("verbose"), Some(&json!(2)));
    assert_eq!(values.explicit.get("sample"), Some(&json!(["a", "b"])));
    assert_eq!(values.explicit.get("output"), Some(&json!("out/report.txt")));
}

#[test]
fn test_unset_flags_are_defaults() {
    let mut command = Command::new("flags")
        .no_binary_name(true)
        .arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue))
        .arg(Arg::new("name").long("name"));

    let matches = command.try_get_matches_from_mut(Vec::<String>::new()).unwrap();
    let values = values_from_matches(&command, &matches);

    assert!(values.explicit.is_empty());
    assert_eq!(values.defaults.get("dry_run"), Some(&json!(false)));
    assert!(!values.defaults.contains_key("name"));
}

#[test]
fn test_config_key() {
    assert_eq!(config_key("output-dir"), "output_dir");
    assert_eq!(config_key("message"), "message");
}

// ============================================================================
// Declarative Definitions
// ============================================================================

const REPORT_DEFINITION: &str = r#"
description = "Writes a report"
group = "Reports"

[[options]]
name = "title"
help = "Report title"
short = "t"
required = true

[[options]]
name = "sections"
multiple = true
default = ["summary", "details"]

[[options]]
name = "pages"
type = "int"
default = 1

[[options]]
name = "format"
choices = ["md", "html"]
default = "md"

[[options]]
name = "draft"
type = "bool"
"#;

#[test]
fn test_definition_builds_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "write_report_snakeparser.toml", REPORT_DEFINITION);

    let definition = ParserDefinition::load(&path).unwrap();
    assert_eq!(definition.description.as_deref(), Some("Writes a report"));
    assert_eq!(definition.group.as_deref(), Some("Reports"));
    assert_eq!(definition.options.len(), 5);

    let parser = FunctionParser::new(
        move |opts: &ParserOptions| definition.to_command(opts),
        ParserOptions::new("snakeparse", "WriteReport"),
    );
    let config = parser
        .parse(&args(&["-t", "Q3", "--pages", "12", "--draft"]), &ParsedConfiguration::new())
        .unwrap();

    assert_eq!(config.get("title"), Some(&json!("Q3")));
    assert_eq!(config.get("pages"), Some(&json!(12)));
    assert_eq!(config.get("draft"), Some(&json!(true)));
    assert_eq!(config.get("sections"), Some(&json!(["summary", "details"])));
    assert_eq!(config.get("format"), Some(&json!("md")));
}

#[test]
fn test_definition_rejects_invalid_choice() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "report.toml", REPORT_DEFINITION);
    let definition = ParserDefinition::load(&path).unwrap();

    let parser = FunctionParser::new(
        move |opts: &ParserOptions| definition.to_command(opts),
        ParserOptions::new("snakeparse", "WriteReport"),
    );
    let err = parser
        .parse(&args(&["--title", "x", "--format", "pdf"]), &ParsedConfiguration::new())
        .unwrap_err();

    match err {
        SnakeParseError::WorkflowArgument { source, .. } => {
            assert_eq!(source.kind(), ErrorKind::InvalidValue);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_definition_validation() {
    let duplicate = ParserDefinition {
        options: vec![
            OptionDefinition {
                name: "message".to_string(),
                ..Default::default()
            },
            OptionDefinition {
                name: "message".to_string(),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    assert!(duplicate.validate().unwrap_err().contains("defined twice"));

    let bad_short = ParserDefinition {
        options: vec![OptionDefinition {
            name: "message".to_string(),
            short: Some("mm".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(bad_short.validate().is_err());

    let positional_flag = ParserDefinition {
        options: vec![OptionDefinition {
            name: "draft".to_string(),
            kind: OptionType::Bool,
            positional: true,
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(positional_flag.validate().is_err());
}

fn single(option: OptionDefinition) -> ParserDefinition {
    ParserDefinition {
        options: vec![option],
        ..Default::default()
    }
}

fn named(name: &str) -> OptionDefinition {
    OptionDefinition {
        name: name.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_definition_rejects_conflicting_flags() {
    let help_short = single(OptionDefinition {
        short: Some("h".to_string()),
        ..named("host")
    });
    assert!(help_short.validate().unwrap_err().contains("-h is reserved"));

    let reserved = single(named("version"));
    assert!(reserved.validate().unwrap_err().contains("reserved"));

    let shared_short = ParserDefinition {
        options: vec![
            OptionDefinition {
                short: Some("o".to_string()),
                ..named("output")
            },
            OptionDefinition {
                short: Some("o".to_string()),
                ..named("organism")
            },
        ],
        ..Default::default()
    };
    assert!(shared_short.validate().unwrap_err().contains("used twice"));

    let dashed = single(named("--message"));
    assert!(dashed.validate().is_err());
}

#[test]
fn test_definition_rejects_bad_defaults() {
    let outside_choices = single(OptionDefinition {
        choices: vec!["md".to_string(), "html".to_string()],
        default: Some(json!("pdf")),
        ..named("format")
    });
    assert!(outside_choices.validate().unwrap_err().contains("invalid default 'pdf'"));

    let flag_default = single(OptionDefinition {
        kind: OptionType::Bool,
        default: Some(json!(true)),
        ..named("draft")
    });
    assert!(flag_default.validate().unwrap_err().contains("take no default"));

    let count_default = single(OptionDefinition {
        kind: OptionType::Count,
        default: Some(json!(2)),
        ..named("verbose")
    });
    assert!(count_default.validate().is_err());

    let not_a_number = single(OptionDefinition {
        kind: OptionType::Int,
        default: Some(json!("many")),
        ..named("pages")
    });
    assert!(not_a_number.validate().is_err());

    let list_for_single = single(OptionDefinition {
        default: Some(json!(["a", "b"])),
        ..named("sample")
    });
    assert!(list_for_single.validate().is_err());

    let fine = single(OptionDefinition {
        kind: OptionType::Float,
        multiple: true,
        default: Some(json!([0.5, 1])),
        ..named("ratios")
    });
    assert!(fine.validate().is_ok());
}

#[test]
fn test_definition_positional_order() {
    let many_first = ParserDefinition {
        options: vec![
            OptionDefinition {
                positional: true,
                multiple: true,
                ..named("inputs")
            },
            OptionDefinition {
                positional: true,
                ..named("output")
            },
        ],
        ..Default::default()
    };
    assert!(many_first.validate().unwrap_err().contains("only the last positional"));

    let required_after_optional = ParserDefinition {
        options: vec![
            OptionDefinition {
                positional: true,
                ..named("reference")
            },
            OptionDefinition {
                positional: true,
                required: true,
                ..named("reads")
            },
        ],
        ..Default::default()
    };
    assert!(required_after_optional.validate().is_err());
}

#[test]
fn test_yaml_definition_with_positional() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "count_snakeparser.yaml",
        "options:\n  - name: inputs\n    type: path\n    positional: true\n    multiple: true\n    required: true\n",
    );

    let definition = ParserDefinition::load(&path).unwrap();
    let parser = FunctionParser::new(
        move |opts: &ParserOptions| definition.to_command(opts),
        ParserOptions::new("snakeparse", "Count"),
    );
    let config = parser
        .parse(&args(&["a.txt", "b.txt"]), &ParsedConfiguration::new())
        .unwrap();

    assert_eq!(config.get("inputs"), Some(&json!(["a.txt", "b.txt"])));
}

#[test]
fn test_bundled_report_definition() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/write_report_snakeparser.toml");
    let definition = ParserDefinition::load(&path).unwrap();
    assert_eq!(definition.group.as_deref(), Some("Reports"));

    let parser = FunctionParser::new(
        move |opts: &ParserOptions| definition.to_command(opts),
        ParserOptions::new("snakeparse", "WriteReport"),
    );
    let config = parser
        .parse(&args(&["--title", "Q3", "--sections", "summary", "details"]), &ParsedConfiguration::new())
        .unwrap();
    assert_eq!(config.get("sections"), Some(&json!(["summary", "details"])));
    assert_eq!(config.get("pages"), Some(&json!(1)));
}

// ============================================================================
// Registry and Resolution
// ============================================================================

fn registry() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry
        .register(
            "write_message_snakeparser",
            ParserEntry::function(message_command).description("Writes a message"),
        )
        .register_type::<WriteLog>("write_log_snakeparser");
    registry
}

#[test]
fn test_resolve_registered_parsers() {
    let registry = registry();
    let resolver = ParserResolver::new(&registry, "snakeparse");

    let message = WorkflowDescriptor::new("WriteMessage", "/nowhere/write_message.smk");
    let parser = resolver.resolve(&message).unwrap();
    let config = parser
        .parse(&args(&["--message", "Hello World!"]), &ParsedConfiguration::new())
        .unwrap();
    assert_eq!(config.get("message"), Some(&json!("Hello World!")));

    let log = WorkflowDescriptor::new("WriteLog", "/nowhere/write_log.smk");
    let parser = resolver.resolve(&log).unwrap();
    let config = parser
        .parse(&args(&["--message", "Hello World!"]), &ParsedConfiguration::new())
        .unwrap();
    assert_eq!(config.get("message"), Some(&json!("Hello World!")));
}

#[test]
fn test_resolve_sibling_definition() {
    let dir = tempfile::tempdir().unwrap();
    let snakefile = write(dir.path(), "write_report.smk", "rule all:\n    input: []\n");
    write(dir.path(), "write_report_snakeparser.toml", REPORT_DEFINITION);

    let registry = ParserRegistry::new();
    let resolver = ParserResolver::new(&registry, "snakeparse");
    let workflow = WorkflowDescriptor::new("WriteReport", &snakefile);

    let parser = resolver.resolve(&workflow).unwrap();
    let config = parser
        .parse(&args(&["--title", "Q3"]), &ParsedConfiguration::new())
        .unwrap();
    assert_eq!(config.get("title"), Some(&json!("Q3")));

    let info = resolver.describe(&workflow);
    assert_eq!(info.description.as_deref(), Some("Writes a report"));
    assert_eq!(info.group.as_deref(), Some("Reports"));
}

#[test]
fn test_resolve_through_parser_globs() {
    let workflows = tempfile::tempdir().unwrap();
    let parsers = tempfile::tempdir().unwrap();
    let snakefile = write(workflows.path(), "write_report.smk", "");
    write(parsers.path(), "write_report.toml", REPORT_DEFINITION);

    let registry = ParserRegistry::new();
    let pattern = format!("{}/*.toml", parsers.path().display());
    let resolver = ParserResolver::new(&registry, "snakeparse")
        .with_parser_globs(&[pattern])
        .unwrap();

    let workflow = WorkflowDescriptor::new("WriteReport", &snakefile);
    assert!(resolver.resolve(&workflow).is_ok());
}

#[test]
fn test_missing_parser_lists_what_was_tried() {
    let registry = registry();
    let resolver = ParserResolver::new(&registry, "snakeparse")
        .with_parser_globs(&["/nonexistent/parsers/*.toml".to_string()])
        .unwrap();
    let workflow = WorkflowDescriptor::new("Orphan", "/nowhere/orphan.smk");

    let err = resolver.resolve(&workflow).err().unwrap();
    match &err {
        SnakeParseError::MissingParser { workflow, tried } => {
            assert_eq!(workflow, "Orphan");
            assert!(tried.iter().any(|t| t.contains("orphan_snakeparser")));
            assert!(tried.iter().any(|t| t.contains("/nonexistent/parsers/*.toml")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), crate::error::exit_codes::PARSER);
    assert_eq!(resolver.describe(&workflow), ParserInfo::default());
}

#[test]
fn test_invalid_definition_is_parser_load() {
    let dir = tempfile::tempdir().unwrap();
    let snakefile = write(dir.path(), "broken.smk", "");
    write(
        dir.path(),
        "broken_snakeparser.toml",
        "[[options]]\nname = \"x\"\nshort = \"too-long\"\n",
    );

    let registry = ParserRegistry::new();
    let resolver = ParserResolver::new(&registry, "snakeparse");
    let workflow = WorkflowDescriptor::new("Broken", &snakefile);

    let err = resolver.resolve(&workflow).err().unwrap();
    assert!(matches!(err, SnakeParseError::ParserLoad { .. }));
}

#[test]
fn test_registered_parser_beats_definition_file() {
    let dir = tempfile::tempdir().unwrap();
    let snakefile = write(dir.path(), "write_message.smk", "");
    write(dir.path(), "write_message_snakeparser.toml", "[[options]]\nname = \"other\"\n");

    let registry = registry();
    let resolver = ParserResolver::new(&registry, "snakeparse");
    let workflow = WorkflowDescriptor::new("WriteMessage", &snakefile);

    assert_eq!(
        resolver.describe(&workflow).description.as_deref(),
        Some("Writes a message")
    );
    let parser = resolver.resolve(&workflow).unwrap();
    assert!(parser.parse(&args(&["--message", "hi"]), &ParsedConfiguration::new()).is_ok());
}
