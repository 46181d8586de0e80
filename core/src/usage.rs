//! Top-level usage and the workflow listing

use std::io::{self, Write};

use crate::cli::Cli;
use crate::config::Config;
use crate::types::WorkflowDescriptor;
use crate::workflows::WorkflowRegistry;

const GROUP_COLUMNS: usize = 38;
const WORKFLOW_COLUMNS: usize = GROUP_COLUMNS - 3;
const UNGROUPED: &str = "Workflows";

/// One-line synopsis shown at the top of every usage message
pub fn synopsis(prog: &str) -> String {
    format!("{prog} [snakeparse options] [snakemake options] [workflow name] [workflow options]")
}

fn rule(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", "-".repeat(60))
}

/// Write the long usage: synopsis, version, options and available workflows
pub fn write_usage(
    out: &mut dyn Write,
    config: &Config,
    registry: Option<&WorkflowRegistry>,
    message: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "Usage: {}", synopsis(&config.prog))?;
    writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    write!(out, "{}", Cli::option_help())?;

    match registry {
        Some(registry) if !registry.is_empty() => {
            writeln!(out)?;
            writeln!(out, "Available Workflows:")?;
            rule(out)?;
            write_listing(out, config, registry)?;
        }
        _ => {
            writeln!(out)?;
            writeln!(out, "No workflows configured.")?;
            rule(out)?;
        }
    }

    if let Some(message) = message {
        writeln!(out)?;
        writeln!(out, "{message}")?;
    }
    Ok(())
}

/// Workflows grouped by group; configured groups first, in file order
fn write_listing(out: &mut dyn Write, config: &Config, registry: &WorkflowRegistry) -> io::Result<()> {
    let mut groups = registry.groups();
    groups.sort_by_key(|(name, _)| {
        name.and_then(|n| config.groups.iter().position(|g| g.name == n))
            .unwrap_or(usize::MAX)
    });

    for (group, workflows) in groups {
        let title = format!("{}:", group.unwrap_or(UNGROUPED));
        let description = group.and_then(|g| config.group_description(g)).unwrap_or("");
        writeln!(out, "{}", format!("{title:<GROUP_COLUMNS$}{description}").trim_end())?;

        for workflow in workflows {
            write_workflow(out, workflow, config.extra_help)?;
        }
        rule(out)?;
    }
    Ok(())
}

fn write_workflow(out: &mut dyn Write, workflow: &WorkflowDescriptor, extra_help: bool) -> io::Result<()> {
    let description = workflow
        .description
        .clone()
        .unwrap_or_else(|| workflow.file_path.display().to_string());
    writeln!(out, "    {:<WORKFLOW_COLUMNS$}{}", workflow.display_name, description)?;

    if extra_help {
        writeln!(out, "        snakefile:  {}", workflow.file_path.display())?;
        writeln!(out, "        snakeparse: {}", workflow.parser_reference)?;
    }
    Ok(())
}
