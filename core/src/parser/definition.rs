//! Declarative parser definitions
//!
//! A definition file sits next to a snakefile (or is found through the
//! parser globs) and lists the workflow's options. Any format the `config`
//! crate reads is accepted:
//!
//! ```toml
//! description = "Writes a report"
//! group = "Reports"
//!
//! [[options]]
//! name = "title"
//! help = "Report title"
//! required = true
//!
//! [[options]]
//! name = "sections"
//! type = "string"
//! multiple = true
//! default = ["summary"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, Command};
use ::config::File;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::ParserOptions;

/// Extensions recognised for definition files, in lookup order
pub const DEFINITION_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Flags every workflow command keeps for itself
const RESERVED_NAMES: &[&str] = &["help", "version"];
const RESERVED_SHORTS: &[char] = &['h', 'V'];

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserDefinition {
    pub description: Option<String>,
    pub group: Option<String>,
    pub options: Vec<OptionDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptionDefinition {
    pub name: String,
    pub help: Option<String>,
    pub short: Option<String>,
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub required: bool,
    pub multiple: bool,
    pub default: Option<JsonValue>,
    pub choices: Vec<String>,
    pub positional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    #[serde(alias = "str")]
    String,
    #[serde(alias = "integer")]
    Int,
    Float,
    #[serde(alias = "flag")]
    Bool,
    Path,
    Count,
}

impl ParserDefinition {
    /// Read and validate a definition file
    pub fn load(path: &Path) -> Result<Self, String> {
        let definition: ParserDefinition = ::config::Config::builder()
            .add_source(File::from(path).required(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| format!("{}: {}", path.display(), e))?;

        definition
            .validate()
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        Ok(definition)
    }

    /// Check the definition for anything that would make a broken command
    pub fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        for option in &self.options {
            if option.name.trim().is_empty() {
                return Err("option with an empty name".to_string());
            }
            if !names.insert(option.name.as_str()) {
                return Err(format!("option '{}' is defined twice", option.name));
            }
            option.validate()?;

            if RESERVED_NAMES.contains(&option.name.as_str()) {
                return Err(format!("option '{}': the name is reserved", option.name));
            }
            if let Some(short) = option.short_flag() {
                if RESERVED_SHORTS.contains(&short) {
                    return Err(format!("option '{}': -{} is reserved", option.name, short));
                }
                if !shorts.insert(short) {
                    return Err(format!("option '{}': short -{} is used twice", option.name, short));
                }
            }
        }
        self.validate_positionals()
    }

    /// Required positionals come first and only the last one takes many values
    fn validate_positionals(&self) -> Result<(), String> {
        let positionals: Vec<&OptionDefinition> = self.options.iter().filter(|o| o.positional).collect();
        let mut seen_optional = false;
        for (index, option) in positionals.iter().enumerate() {
            if option.multiple && index + 1 != positionals.len() {
                return Err(format!(
                    "option '{}': only the last positional option may take multiple values",
                    option.name
                ));
            }
            if option.required && seen_optional {
                return Err(format!(
                    "option '{}': required positional options must come before optional ones",
                    option.name
                ));
            }
            seen_optional |= !option.required;
        }
        Ok(())
    }

    /// Build the clap command described by this definition
    pub fn to_command(&self, options: &ParserOptions) -> Command {
        let mut command = Command::new(options.workflow.clone());
        if let Some(description) = &self.description {
            command = command.about(description.clone());
        }
        for option in &self.options {
            command = command.arg(option.to_arg());
        }
        command
    }
}

impl OptionDefinition {
    fn validate(&self) -> Result<(), String> {
        if self.name.starts_with('-') || self.name.chars().any(|c| c.is_whitespace() || c == '=') {
            return Err(format!("option '{}': invalid name", self.name));
        }
        if let Some(short) = &self.short {
            let mut chars = short.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c != '-' && !c.is_whitespace() => {}
                _ => {
                    return Err(format!(
                        "option '{}': short must be a single character, got '{}'",
                        self.name, short
                    ))
                }
            }
        }
        if self.positional && self.short.is_some() {
            return Err(format!("option '{}': positional options take no short flag", self.name));
        }
        if self.positional && matches!(self.kind, OptionType::Bool | OptionType::Count) {
            return Err(format!("option '{}': {:?} options cannot be positional", self.name, self.kind));
        }
        if !self.choices.is_empty() && self.kind != OptionType::String {
            return Err(format!("option '{}': choices are only allowed for string options", self.name));
        }
        self.validate_default()
    }

    fn validate_default(&self) -> Result<(), String> {
        let Some(default) = self.default.as_ref().filter(|d| !d.is_null()) else {
            return Ok(());
        };
        if matches!(self.kind, OptionType::Bool | OptionType::Count) {
            return Err(format!("option '{}': {:?} options take no default", self.name, self.kind));
        }
        if default.is_array() && !self.multiple {
            return Err(format!("option '{}': a list default needs `multiple = true`", self.name));
        }

        for value in default_strings(default) {
            let valid = match self.kind {
                OptionType::Int => value.parse::<i64>().is_ok(),
                OptionType::Float => value.parse::<f64>().is_ok(),
                _ => self.choices.is_empty() || self.choices.contains(&value),
            };
            if !valid {
                return Err(format!("option '{}': invalid default '{}'", self.name, value));
            }
        }
        Ok(())
    }

    fn short_flag(&self) -> Option<char> {
        self.short.as_ref().and_then(|s| s.chars().next())
    }

    pub fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone());
        if !self.positional {
            arg = arg.long(self.name.clone());
            if let Some(short) = self.short_flag() {
                arg = arg.short(short);
            }
        }
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }

        match self.kind {
            OptionType::Bool => return arg.action(ArgAction::SetTrue),
            OptionType::Count => return arg.action(ArgAction::Count),
            _ => {}
        }

        arg = if self.multiple {
            arg.action(ArgAction::Append).num_args(1..)
        } else {
            arg.action(ArgAction::Set)
        };

        arg = match self.kind {
            OptionType::Int => arg.value_parser(value_parser!(i64)),
            OptionType::Float => arg.value_parser(value_parser!(f64)),
            OptionType::Path => arg.value_parser(value_parser!(PathBuf)),
            _ if !self.choices.is_empty() => {
                arg.value_parser(PossibleValuesParser::new(self.choices.clone()))
            }
            _ => arg.value_parser(value_parser!(String)),
        };

        if let Some(default) = &self.default {
            arg = arg.default_values(default_strings(default));
        }

        arg.required(self.required)
    }
}

fn default_strings(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().flat_map(default_strings).collect(),
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}
