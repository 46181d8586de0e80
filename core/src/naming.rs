//! Display-name transforms applied to snakefile stems

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SnakeParseError;

/// How a snakefile's stem becomes the name shown on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameTransform {
    /// `write_log` → `WriteLog`
    #[default]
    SnakeToCamel,
    /// `WriteLog` → `write_log`
    CamelToSnake,
    /// Use the stem unchanged
    #[serde(alias = "none")]
    Identity,
}

impl NameTransform {
    pub fn apply(&self, stem: &str) -> String {
        match self {
            NameTransform::SnakeToCamel => snake_to_camel(stem),
            NameTransform::CamelToSnake => camel_to_snake(stem),
            NameTransform::Identity => stem.to_string(),
        }
    }
}

impl FromStr for NameTransform {
    type Err = SnakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snake_to_camel" => Ok(NameTransform::SnakeToCamel),
            "camel_to_snake" => Ok(NameTransform::CamelToSnake),
            "none" | "identity" => Ok(NameTransform::Identity),
            other => Err(SnakeParseError::Config(format!(
                "Unknown name transform '{}'. Must be one of: snake_to_camel, camel_to_snake, none",
                other
            ))),
        }
    }
}

impl fmt::Display for NameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTransform::SnakeToCamel => write!(f, "snake_to_camel"),
            NameTransform::CamelToSnake => write!(f, "camel_to_snake"),
            NameTransform::Identity => write!(f, "none"),
        }
    }
}

/// Title-cases each `_`-separated part and joins them
pub fn snake_to_camel(snake: &str) -> String {
    snake
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Lower-cases the first character and prefixes every later capital with `_`
pub fn camel_to_snake(camel: &str) -> String {
    let mut chars = camel.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut snake: String = first.to_lowercase().collect();
    for c in chars {
        if c.is_uppercase() {
            snake.push('_');
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}
