//! Parsers for the bundled example workflows
//!
//! `write_message` is written in the function style and `write_log` in the
//! type style; both take a required `--message`.

use clap::{Arg, Command};

use crate::parser::{ArgumentParser, ParserEntry, ParserOptions, ParserRegistry};

pub const WRITE_MESSAGE_PARSER: &str = "write_message_snakeparser";
pub const WRITE_LOG_PARSER: &str = "write_log_snakeparser";

fn message_arg() -> Arg {
    Arg::new("message")
        .long("message")
        .help("The message.")
        .required(true)
}

/// Function-style parser for `write_message.smk`
pub fn write_message(_options: &ParserOptions) -> Command {
    Command::new("write_message")
        .about("Writes a message to a file")
        .arg(message_arg())
}

/// Type-style parser for `write_log.smk`
#[derive(Debug, Default)]
pub struct WriteLog;

impl ArgumentParser for WriteLog {
    fn parser(&self) -> Command {
        Command::new("write_log")
            .about("Writes a message to a log file")
            .arg(message_arg())
    }
}

/// Register the bundled parsers
pub fn register(registry: &mut ParserRegistry) {
    registry
        .register(
            WRITE_MESSAGE_PARSER,
            ParserEntry::function(write_message)
                .description("Writes a message to a file")
                .group("Examples"),
        )
        .register(
            WRITE_LOG_PARSER,
            ParserEntry::of_type::<WriteLog>()
                .description("Writes a message to a log file")
                .group("Examples"),
        );
}
