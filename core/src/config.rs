//! Tool configuration
//!
//! Values are layered from lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. A configuration file (TOML, YAML or JSON): the explicit path, else
//!    `SNAKEPARSE_CONFIG_PATH`, else `snakeparse.*` in the working directory
//! 3. `SNAKEPARSE_*` environment variables
//! 4. Command-line values passed to the builder
//!
//! Glob lists are the exception to "highest wins": command-line patterns are
//! appended after the configured ones so every source contributes.
//!
//! # Example
//!
//! ```toml
//! prog = "workflows"
//! snakefile_globs = ["pipelines/*.smk"]
//! parser_globs = ["parsers/*"]
//! name_transform = "snake_to_camel"
//!
//! [[workflows]]
//! name = "Align"
//! snakefile = "legacy/align.smk"
//! group = "Alignment"
//!
//! [[groups]]
//! name = "Alignment"
//! description = "Read alignment pipelines"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use ::config::{Environment, File};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Result, SnakeParseError};
use crate::naming::NameTransform;
use crate::types::ParsedConfiguration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "SNAKEPARSE_CONFIG_PATH";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "SNAKEPARSE";

/// Base name searched for in the working directory when no path is given
const DEFAULT_CONFIG_NAME: &str = "snakeparse";

/// A workflow declared in the configuration file rather than discovered
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkflowEntry {
    pub name: String,
    pub snakefile: PathBuf,
    /// Parser reference, when it differs from `<stem>_snakeparser`
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program name shown in usage lines
    pub prog: String,
    /// Snakemake executable
    pub snakemake: PathBuf,
    pub name_transform: NameTransform,
    /// Group workflows by their snakefile's parent directory
    pub parent_dir_is_group_name: bool,
    pub snakefile_globs: Vec<String>,
    /// Where companion parser definitions live when not next to the snakefile
    #[serde(alias = "snakeparse_globs")]
    pub parser_globs: Vec<String>,
    pub workflows: Vec<WorkflowEntry>,
    pub groups: Vec<GroupEntry>,
    /// File holding the base configuration mapping
    pub base_config: Option<PathBuf>,
    /// Show snakefile and parser details in the workflow listing
    pub extra_help: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prog: "snakeparse".to_string(),
            snakemake: PathBuf::from("snakemake"),
            name_transform: NameTransform::default(),
            parent_dir_is_group_name: false,
            snakefile_globs: Vec::new(),
            parser_globs: Vec::new(),
            workflows: Vec::new(),
            groups: Vec::new(),
            base_config: None,
            extra_help: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default file and environment, without overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Check invariants that deserialization cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = self
            .snakefile_globs
            .iter()
            .chain(self.parser_globs.iter())
            .find(|p| p.trim().is_empty())
        {
            return Err(SnakeParseError::Config(format!(
                "Empty glob pattern '{}'",
                pattern
            )));
        }

        let mut names = HashSet::new();
        for workflow in &self.workflows {
            if workflow.name.trim().is_empty() {
                return Err(SnakeParseError::Config(format!(
                    "Workflow for snakefile {} has an empty name",
                    workflow.snakefile.display()
                )));
            }
            if !names.insert(workflow.name.as_str()) {
                return Err(SnakeParseError::Config(format!(
                    "Found multiple workflows with the same name '{}'",
                    workflow.name
                )));
            }
        }

        let mut groups = HashSet::new();
        for group in &self.groups {
            if !groups.insert(group.name.as_str()) {
                return Err(SnakeParseError::Config(format!(
                    "Group '{}' already defined",
                    group.name
                )));
            }
        }

        Ok(())
    }

    /// Whether anything would let discovery find a workflow
    pub fn has_workflow_sources(&self) -> bool {
        !self.snakefile_globs.is_empty() || !self.workflows.is_empty()
    }

    /// Description configured for a group, if any
    pub fn group_description(&self, group: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .and_then(|g| g.description.as_deref())
    }

    /// Load the base configuration mapping, or an empty one when not configured
    pub fn load_base_config(&self) -> Result<ParsedConfiguration> {
        match &self.base_config {
            Some(path) => load_base_config(path),
            None => Ok(ParsedConfiguration::new()),
        }
    }
}

/// Builder for [`Config`]; every setter is a command-line override
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    prog: Option<String>,
    snakemake: Option<PathBuf>,
    name_transform: Option<NameTransform>,
    parent_dir_is_group_name: Option<bool>,
    snakefile_globs: Vec<String>,
    parser_globs: Vec<String>,
    base_config: Option<PathBuf>,
    extra_help: Option<bool>,
}

impl ConfigBuilder {
    /// Configuration file (overrides `SNAKEPARSE_CONFIG_PATH` and the default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn prog(mut self, prog: Option<String>) -> Self {
        self.prog = prog;
        self
    }

    pub fn snakemake(mut self, snakemake: Option<PathBuf>) -> Self {
        self.snakemake = snakemake;
        self
    }

    pub fn name_transform(mut self, transform: Option<NameTransform>) -> Self {
        self.name_transform = transform;
        self
    }

    pub fn parent_dir_is_group_name(mut self, enabled: Option<bool>) -> Self {
        self.parent_dir_is_group_name = enabled;
        self
    }

    pub fn snakefile_globs(mut self, globs: Vec<String>) -> Self {
        self.snakefile_globs = globs;
        self
    }

    pub fn parser_globs(mut self, globs: Vec<String>) -> Self {
        self.parser_globs = globs;
        self
    }

    pub fn base_config(mut self, path: Option<PathBuf>) -> Self {
        self.base_config = path;
        self
    }

    pub fn extra_help(mut self, enabled: Option<bool>) -> Self {
        self.extra_help = enabled;
        self
    }

    pub fn build(self) -> Result<Config> {
        let config_path = self
            .config_path
            .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let file_source = match &config_path {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let loaded = ::config::Config::builder()
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("snakefile_globs")
                    .with_list_parse_key("parser_globs"),
            )
            .build()?;

        let mut config: Config = loaded.try_deserialize()?;
        if let Some(path) = &config_path {
            tracing::debug!("Loaded configuration from {}", path.display());
        }

        if let Some(prog) = self.prog {
            config.prog = prog;
        }
        if let Some(snakemake) = self.snakemake {
            config.snakemake = snakemake;
        }
        if let Some(transform) = self.name_transform {
            config.name_transform = transform;
        }
        if let Some(enabled) = self.parent_dir_is_group_name {
            config.parent_dir_is_group_name = enabled;
        }
        if let Some(path) = self.base_config {
            config.base_config = Some(path);
        }
        if let Some(enabled) = self.extra_help {
            config.extra_help = enabled;
        }
        config.snakefile_globs.extend(self.snakefile_globs);
        config.parser_globs.extend(self.parser_globs);

        config.validate()?;
        Ok(config)
    }
}

/// Read a JSON, YAML or TOML file whose top level is a mapping
pub fn load_base_config(path: &Path) -> Result<ParsedConfiguration> {
    let base_err = |message: String| SnakeParseError::BaseConfig {
        path: path.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(path).map_err(|e| base_err(e.to_string()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let map: BTreeMap<String, JsonValue> = match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| base_err(e.to_string()))?,
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| base_err(e.to_string()))?,
        "toml" => toml::from_str(&content).map_err(|e| base_err(e.to_string()))?,
        other => {
            return Err(base_err(format!(
                "Don't know how to read a '.{}' file, expected .json, .yaml, .yml or .toml",
                other
            )))
        }
    };

    Ok(ParsedConfiguration::from(map))
}
