use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Suffix appended to a snakefile's stem to name its companion parser
pub const PARSER_SUFFIX: &str = "_snakeparser";

/// A workflow discovered on disk or configured explicitly
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDescriptor {
    /// Name used to select the workflow on the command line
    pub display_name: String,
    pub file_path: PathBuf,
    /// Key of the companion parser (`<stem>_snakeparser` unless configured)
    pub parser_reference: String,
    pub group: Option<String>,
    pub description: Option<String>,
}

impl WorkflowDescriptor {
    pub fn new(display_name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let parser_reference = default_parser_reference(&file_path);
        Self {
            display_name: display_name.into(),
            file_path,
            parser_reference,
            group: None,
            description: None,
        }
    }

    /// The snakefile name without its extension
    pub fn stem(&self) -> String {
        file_stem(&self.file_path)
    }
}

pub(crate) fn file_stem(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn default_parser_reference(snakefile: &std::path::Path) -> String {
    format!("{}{}", file_stem(snakefile), PARSER_SUFFIX)
}

/// Configuration mapping handed to the execution engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ParsedConfiguration(BTreeMap<String, JsonValue>);

impl ParsedConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Inserts only when the key is not already present
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns `base` overlaid with `self`; keys in `self` win
    pub fn merged_over(&self, base: &ParsedConfiguration) -> ParsedConfiguration {
        let mut merged = base.clone();
        for (key, value) in &self.0 {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, JsonValue> {
        self.0
    }
}

impl From<BTreeMap<String, JsonValue>> for ParsedConfiguration {
    fn from(map: BTreeMap<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, JsonValue)> for ParsedConfiguration {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
