//! Execution engine collaborator
//!
//! The dispatcher hands the selected snakefile and the merged configuration
//! to an [`ExecutionEngine`]. [`SnakemakeEngine`] runs the Snakemake
//! executable; tests substitute a recording engine.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::{debug, info};

use crate::error::{Result, SnakeParseError};
use crate::types::ParsedConfiguration;

pub trait ExecutionEngine {
    /// Run `snakefile` with `config`, returning the process exit status
    ///
    /// `engine_args` are pass-through arguments for the engine itself.
    fn execute(&self, snakefile: &Path, config: &ParsedConfiguration, engine_args: &[String]) -> Result<i32>;
}

/// Runs the Snakemake executable as a child process
#[derive(Debug, Clone)]
pub struct SnakemakeEngine {
    executable: PathBuf,
}

impl SnakemakeEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The command line used for one run
    pub fn command(&self, snakefile: &Path, configfile: &Path, engine_args: &[String]) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(engine_args)
            .arg("--snakefile")
            .arg(snakefile)
            .arg("--configfile")
            .arg(configfile);
        command
    }

    fn engine_error(&self, source: io::Error) -> SnakeParseError {
        SnakeParseError::ExecutionEngine {
            program: self.executable.display().to_string(),
            source,
        }
    }
}

impl Default for SnakemakeEngine {
    fn default() -> Self {
        Self::new("snakemake")
    }
}

impl ExecutionEngine for SnakemakeEngine {
    fn execute(&self, snakefile: &Path, config: &ParsedConfiguration, engine_args: &[String]) -> Result<i32> {
        let snakefile = snakefile
            .canonicalize()
            .unwrap_or_else(|_| snakefile.to_path_buf());

        // Removed when dropped at the end of the run
        let mut configfile = tempfile::Builder::new()
            .prefix("snakeparse-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| self.engine_error(e))?;
        serde_json::to_writer_pretty(configfile.as_file_mut(), config)
            .map_err(|e| self.engine_error(e.into()))?;
        configfile.flush().map_err(|e| self.engine_error(e))?;
        debug!(path = %configfile.path().display(), keys = config.len(), "Wrote workflow configuration");

        let mut command = self.command(&snakefile, configfile.path(), engine_args);
        info!(
            program = %self.executable.display(),
            snakefile = %snakefile.display(),
            "Running workflow engine"
        );

        let status = command.status().map_err(|e| self.engine_error(e))?;
        let code = status_code(status);
        debug!(code, "Workflow engine finished");
        Ok(code)
    }
}

/// Exit status as a shell would report it
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
