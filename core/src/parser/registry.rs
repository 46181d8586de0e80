//! Parser lookup
//!
//! Parsers are looked up by a workflow's `parser_reference`, first in the
//! static [`ParserRegistry`], then as definition files next to the snakefile,
//! and finally among the files matched by the parser globs.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Command;
use tracing::debug;

use super::definition::{ParserDefinition, DEFINITION_EXTENSIONS};
use super::{guard_panic, ArgumentParser, CommandFactory, FunctionParser, ParserOptions, TypeParser, WorkflowParser};
use crate::error::{Result, SnakeParseError};
use crate::types::{file_stem, WorkflowDescriptor};

type TypeFactory = Arc<dyn Fn(&ParserOptions) -> Result<Box<dyn WorkflowParser>> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Function(CommandFactory),
    Type(TypeFactory),
}

/// A registered parser plus optional listing metadata
#[derive(Clone)]
pub struct ParserEntry {
    factory: Factory,
    description: Option<String>,
    group: Option<String>,
}

impl ParserEntry {
    /// Function-style entry
    pub fn function<F>(factory: F) -> Self
    where
        F: Fn(&ParserOptions) -> Command + Send + Sync + 'static,
    {
        Self::new(Factory::Function(Arc::new(factory)))
    }

    /// Type-style entry; a fresh `T` is created for every resolution
    pub fn of_type<T>() -> Self
    where
        T: ArgumentParser + Default + 'static,
    {
        Self::new(Factory::Type(Arc::new(|options: &ParserOptions| {
            let instance = guard_panic(&options.workflow, T::default)?;
            Ok(Box::new(TypeParser::new(instance, options.clone())) as Box<dyn WorkflowParser>)
        })))
    }

    fn new(factory: Factory) -> Self {
        Self {
            factory,
            description: None,
            group: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    fn instantiate(&self, options: ParserOptions) -> Result<Box<dyn WorkflowParser>> {
        match &self.factory {
            Factory::Function(factory) => Ok(Box::new(FunctionParser::from_factory(factory.clone(), options))),
            Factory::Type(factory) => factory(&options),
        }
    }
}

impl fmt::Debug for ParserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self.factory {
            Factory::Function(_) => "function",
            Factory::Type(_) => "type",
        };
        f.debug_struct("ParserEntry")
            .field("style", &style)
            .field("description", &self.description)
            .field("group", &self.group)
            .finish()
    }
}

/// Static parser registry keyed by parser reference
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    entries: HashMap<String, ParserEntry>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `reference`, replacing any previous entry
    pub fn register(&mut self, reference: impl Into<String>, entry: ParserEntry) -> &mut Self {
        self.entries.insert(reference.into(), entry);
        self
    }

    pub fn register_fn<F>(&mut self, reference: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ParserOptions) -> Command + Send + Sync + 'static,
    {
        self.register(reference, ParserEntry::function(factory))
    }

    pub fn register_type<T>(&mut self, reference: impl Into<String>) -> &mut Self
    where
        T: ArgumentParser + Default + 'static,
    {
        self.register(reference, ParserEntry::of_type::<T>())
    }

    pub fn get(&self, reference: &str) -> Option<&ParserEntry> {
        self.entries.get(reference)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Listing metadata a parser contributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserInfo {
    pub description: Option<String>,
    pub group: Option<String>,
}

enum Located<'a> {
    Registered(&'a ParserEntry),
    Definition(PathBuf),
}

/// Resolves a workflow descriptor to a ready-to-use parser
pub struct ParserResolver<'a> {
    registry: &'a ParserRegistry,
    prog: String,
    parser_globs: Vec<String>,
    definition_files: Vec<PathBuf>,
}

impl<'a> ParserResolver<'a> {
    pub fn new(registry: &'a ParserRegistry, prog: impl Into<String>) -> Self {
        Self {
            registry,
            prog: prog.into(),
            parser_globs: Vec::new(),
            definition_files: Vec::new(),
        }
    }

    /// Expand `patterns` into candidate definition files
    pub fn with_parser_globs(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let paths = glob::glob(pattern).map_err(|source| SnakeParseError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;

            for path in paths.flatten() {
                if path.is_file() && is_definition_file(&path) && !self.definition_files.contains(&path) {
                    self.definition_files.push(path);
                }
            }
            self.parser_globs.push(pattern.clone());
        }
        Ok(self)
    }

    /// Produce the parser for `workflow`
    ///
    /// Fails with `MissingParser` when nothing is found and `ParserLoad` when
    /// a definition file cannot be read.
    pub fn resolve(&self, workflow: &WorkflowDescriptor) -> Result<Box<dyn WorkflowParser>> {
        let options = ParserOptions::new(self.prog.clone(), workflow.display_name.clone());

        match self.locate(workflow) {
            Ok(Located::Registered(entry)) => {
                debug!(workflow = %workflow.display_name, reference = %workflow.parser_reference, "Using registered parser");
                entry.instantiate(options)
            }
            Ok(Located::Definition(path)) => {
                debug!(workflow = %workflow.display_name, path = %path.display(), "Loading parser definition");
                let definition = Arc::new(ParserDefinition::load(&path).map_err(|message| {
                    SnakeParseError::ParserLoad {
                        workflow: workflow.display_name.clone(),
                        source: message.into(),
                    }
                })?);
                Ok(Box::new(FunctionParser::new(
                    move |opts: &ParserOptions| definition.to_command(opts),
                    options,
                )))
            }
            Err(tried) => Err(SnakeParseError::MissingParser {
                workflow: workflow.display_name.clone(),
                tried,
            }),
        }
    }

    /// Best-effort description and group for listings
    pub fn describe(&self, workflow: &WorkflowDescriptor) -> ParserInfo {
        match self.locate(workflow) {
            Ok(Located::Registered(entry)) => ParserInfo {
                description: entry.description.clone(),
                group: entry.group.clone(),
            },
            Ok(Located::Definition(path)) => match ParserDefinition::load(&path) {
                Ok(definition) => ParserInfo {
                    description: definition.description,
                    group: definition.group,
                },
                Err(message) => {
                    debug!(workflow = %workflow.display_name, error = %message, "Could not describe workflow");
                    ParserInfo::default()
                }
            },
            Err(_) => ParserInfo::default(),
        }
    }

    /// Find where the parser lives, or report every place that was checked
    fn locate(&self, workflow: &WorkflowDescriptor) -> std::result::Result<Located<'a>, Vec<String>> {
        let reference = workflow.parser_reference.as_str();
        let mut tried = vec![format!("registered parser '{}'", reference)];

        if let Some(entry) = self.registry.get(reference) {
            return Ok(Located::Registered(entry));
        }

        for candidate in sibling_definitions(&workflow.file_path, reference) {
            if candidate.is_file() {
                return Ok(Located::Definition(candidate));
            }
            tried.push(candidate.display().to_string());
        }

        let stem = workflow.stem();
        if let Some(path) = self.definition_files.iter().find(|path| {
            let name = file_stem(path);
            name == reference || name == stem
        }) {
            return Ok(Located::Definition(path.clone()));
        }
        tried.extend(self.parser_globs.iter().map(|pattern| format!("parser glob '{}'", pattern)));

        Err(tried)
    }
}

fn sibling_definitions(snakefile: &Path, reference: &str) -> Vec<PathBuf> {
    DEFINITION_EXTENSIONS
        .iter()
        .map(|ext| snakefile.with_file_name(format!("{}.{}", reference, ext)))
        .collect()
}

fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DEFINITION_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
