//! Workflow registry
//!
//! Collects the workflows available to one invocation: snakefiles matched by
//! glob patterns, snakefiles configured explicitly, and the snakefile given on
//! the command line. Display names are unique within a registry.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, SnakeParseError};
use crate::naming::NameTransform;
use crate::parser::ParserInfo;
use crate::types::{file_stem, WorkflowDescriptor};

#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Vec<WorkflowDescriptor>,
    /// Canonical snakefile paths, parallel to `workflows`
    canonical: Vec<PathBuf>,
    name_transform: NameTransform,
    parent_dir_is_group_name: bool,
    /// Every glob pattern expanded so far, for error messages
    searched: Vec<String>,
}

impl WorkflowRegistry {
    pub fn new(name_transform: NameTransform, parent_dir_is_group_name: bool) -> Self {
        Self {
            name_transform,
            parent_dir_is_group_name,
            ..Self::default()
        }
    }

    /// Build the registry for a configuration: explicitly configured
    /// workflows first, then glob matches
    ///
    /// A configured workflow keeps its own name even when a glob also matches
    /// its snakefile.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new(config.name_transform, config.parent_dir_is_group_name);

        for entry in &config.workflows {
            let mut workflow = WorkflowDescriptor::new(&entry.name, &entry.snakefile);
            if let Some(parser) = &entry.parser {
                workflow.parser_reference = parser.clone();
            }
            workflow.group = entry.group.clone().or_else(|| registry.default_group(&entry.snakefile));
            workflow.description = entry.description.clone();
            registry.add_workflow(workflow)?;
        }

        registry.discover(&config.snakefile_globs)?;
        Ok(registry)
    }

    /// Expand each pattern in order and add every snakefile found
    ///
    /// Returns the descriptors for the matched files, in pattern order and
    /// then file-system match order. A file matched more than once is
    /// reported once.
    pub fn discover(&mut self, patterns: &[String]) -> Result<Vec<WorkflowDescriptor>> {
        let mut discovered: Vec<WorkflowDescriptor> = Vec::new();

        for pattern in patterns {
            self.searched.push(pattern.clone());

            let paths = glob::glob(pattern).map_err(|source| SnakeParseError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;

            let mut matched = 0;
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable glob match for '{}': {}", pattern, e);
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                matched += 1;

                let workflow = self.add_snakefile(&path)?;
                if !discovered.iter().any(|w| w.file_path == workflow.file_path) {
                    discovered.push(workflow);
                }
            }

            if matched == 0 {
                tracing::warn!("No snakefiles found from glob '{}'", pattern);
            } else {
                tracing::debug!("Glob '{}' matched {} snakefile(s)", pattern, matched);
            }
        }

        Ok(discovered)
    }

    /// Add a workflow for a snakefile, deriving its display name from the stem
    ///
    /// A snakefile that is already registered resolves to its existing entry.
    pub fn add_snakefile(&mut self, snakefile: &Path) -> Result<WorkflowDescriptor> {
        if !snakefile.is_file() {
            return Err(SnakeParseError::MissingSnakefile(snakefile.to_path_buf()));
        }

        let canonical = canonicalize(snakefile);
        if let Some(index) = self.canonical.iter().position(|c| *c == canonical) {
            tracing::debug!(
                "{} is already registered as '{}'",
                snakefile.display(),
                self.workflows[index].display_name
            );
            return Ok(self.workflows[index].clone());
        }

        let name = self.name_transform.apply(&file_stem(snakefile));
        let mut workflow = WorkflowDescriptor::new(name, snakefile);
        workflow.group = self.default_group(snakefile);
        self.add_workflow(workflow)
    }

    /// Add a fully described workflow
    ///
    /// Re-adding the same snakefile under the same name updates its metadata;
    /// a different snakefile under an existing name is an error. The same
    /// snakefile may be registered under several names.
    pub fn add_workflow(&mut self, workflow: WorkflowDescriptor) -> Result<WorkflowDescriptor> {
        if !workflow.file_path.is_file() {
            return Err(SnakeParseError::MissingSnakefile(workflow.file_path));
        }
        let canonical = canonicalize(&workflow.file_path);

        if let Some(index) = self
            .workflows
            .iter()
            .position(|w| w.display_name == workflow.display_name)
        {
            if self.canonical[index] != canonical {
                return Err(SnakeParseError::DuplicateWorkflow {
                    name: workflow.display_name,
                    first: self.workflows[index].file_path.clone(),
                    second: workflow.file_path,
                });
            }

            let existing = &mut self.workflows[index];
            existing.parser_reference = workflow.parser_reference;
            if workflow.group.is_some() {
                existing.group = workflow.group;
            }
            if workflow.description.is_some() {
                existing.description = workflow.description;
            }
            return Ok(existing.clone());
        }

        tracing::debug!(
            "Registered workflow '{}' from {}",
            workflow.display_name,
            workflow.file_path.display()
        );
        self.canonical.push(canonical);
        self.workflows.push(workflow.clone());
        Ok(workflow)
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDescriptor> {
        self.workflows.iter().find(|w| w.display_name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.workflows.iter().map(|w| w.display_name.clone()).collect()
    }

    pub fn workflows(&self) -> &[WorkflowDescriptor] {
        &self.workflows
    }

    /// The only workflow, when exactly one is registered
    pub fn single(&self) -> Option<&WorkflowDescriptor> {
        match self.workflows.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Fail with `NoWorkflowsFound` when nothing was registered
    pub fn require_any(&self) -> Result<()> {
        if self.workflows.is_empty() {
            return Err(SnakeParseError::NoWorkflowsFound {
                patterns: self.searched.clone(),
            });
        }
        Ok(())
    }

    /// Workflows grouped for listing, groups in first-seen order
    pub fn groups(&self) -> Vec<(Option<&str>, Vec<&WorkflowDescriptor>)> {
        let mut groups: Vec<(Option<&str>, Vec<&WorkflowDescriptor>)> = Vec::new();
        for workflow in &self.workflows {
            let group = workflow.group.as_deref();
            match groups.iter_mut().find(|(name, _)| *name == group) {
                Some((_, members)) => members.push(workflow),
                None => groups.push((group, vec![workflow])),
            }
        }
        groups
    }

    /// Fill in missing groups and descriptions from each workflow's parser
    pub fn annotate<F>(&mut self, describe: F)
    where
        F: Fn(&WorkflowDescriptor) -> ParserInfo,
    {
        for workflow in &mut self.workflows {
            if workflow.group.is_some() && workflow.description.is_some() {
                continue;
            }
            let info = describe(workflow);
            if workflow.group.is_none() {
                workflow.group = info.group;
            }
            if workflow.description.is_none() {
                workflow.description = info.description;
            }
        }
    }

    fn default_group(&self, snakefile: &Path) -> Option<String> {
        if !self.parent_dir_is_group_name {
            return None;
        }
        canonicalize(snakefile)
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

fn canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
