//! Runs the analyzer-instrumented builds of the target and downstream
//! modules.
//!
//! Every build first rewrites the analyzer and scanner settings files of each
//! module so the tools serialize fresh reports into the module's output
//! directory, then runs the user's build command through a [`CommandRunner`].

mod command;
mod serialization;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use annotator_index::files;
use thiserror::Error;

pub use command::{CommandOutput, CommandRunner, DefaultCommandRunner, ShellCommand};
pub use serialization::{write_settings, CheckerSettings, ScannerSettings};

/// Bytes of build output kept in a [`BuildError::CommandFailed`].
const OUTPUT_LIMIT: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "build command `{command}` failed with exit code {code:?} (output_truncated={output_truncated})\nstdout:\n{stdout}\nstderr:\n{stderr}"
    )]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
        output_truncated: bool,
    },
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// One module the analyzer runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTarget {
    /// Where the analyzer writes its reports for this module.
    pub output_dir: PathBuf,
    pub checker_config: PathBuf,
    pub scanner_config: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub script: &'a str,
    pub modules: &'a [ModuleTarget],
    /// Ask the analyzer for `field_init.tsv`.
    pub field_init_info: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub builds: u32,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Builder {
    runner: Arc<dyn CommandRunner>,
    cwd: PathBuf,
    nullable_annotation: String,
    initializer_annotation: String,
    stats: BuildStats,
}

impl Builder {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cwd: impl Into<PathBuf>,
        nullable_annotation: impl Into<String>,
        initializer_annotation: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
            nullable_annotation: nullable_annotation.into(),
            initializer_annotation: initializer_annotation.into(),
            stats: BuildStats::default(),
        }
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Runs one analyzer build over `request.modules`.
    ///
    /// A non-zero exit is expected while the checker still reports errors, so
    /// it only fails the build when some module produced no error report.
    pub fn build(&mut self, request: &BuildRequest<'_>) -> Result<CommandOutput> {
        for module in request.modules {
            self.prepare(module, request.field_init_info)?;
        }

        let command = ShellCommand::new(&self.cwd, request.script);
        tracing::debug!(command = %command, modules = request.modules.len(), "running analyzer build");
        let start = Instant::now();
        let output = self.runner.run(&command);
        let elapsed = start.elapsed();
        self.stats.builds += 1;
        self.stats.elapsed += elapsed;

        for module in request.modules {
            let settings = ScannerSettings {
                active: false,
                output_dir: &module.output_dir,
            };
            write_settings(&module.scanner_config, &settings.to_xml())?;
        }

        let output = output.map_err(|source| BuildError::Spawn {
            command: request.script.to_string(),
            source,
        })?;
        let missing = request
            .modules
            .iter()
            .find(|module| !module.output_dir.join(files::ERRORS).exists());
        if !output.success() {
            if let Some(module) = missing {
                tracing::warn!(
                    code = ?output.code,
                    output_dir = %module.output_dir.display(),
                    "build failed without producing analyzer reports"
                );
                let (stdout, stdout_truncated) = tail(&output.stdout, OUTPUT_LIMIT);
                let (stderr, stderr_truncated) = tail(&output.stderr, OUTPUT_LIMIT);
                return Err(BuildError::CommandFailed {
                    command: request.script.to_string(),
                    code: output.code,
                    stdout,
                    stderr,
                    output_truncated: stdout_truncated || stderr_truncated,
                });
            }
        }
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, code = ?output.code, "analyzer build finished");
        Ok(output)
    }

    fn prepare(&self, module: &ModuleTarget, field_init_info: bool) -> Result<()> {
        create_dir(&module.output_dir)?;
        for name in files::ALL {
            remove_stale_report(&module.output_dir.join(name))?;
        }

        let checker = CheckerSettings {
            suggest: true,
            suggest_enclosing: true,
            field_init_info,
            nullable_annotation: &self.nullable_annotation,
            initializer_annotation: &self.initializer_annotation,
            output_dir: &module.output_dir,
        };
        write_settings(&module.checker_config, &checker.to_xml())?;
        let scanner = ScannerSettings {
            active: true,
            output_dir: &module.output_dir,
        };
        write_settings(&module.scanner_config, &scanner.to_xml())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_stale_report(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The last `limit` bytes of `text`, cut on a char boundary.
fn tail(text: &str, limit: usize) -> (String, bool) {
    if text.len() <= limit {
        return (text.to_string(), false);
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    (text[start..].to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_the_end_on_char_boundaries() {
        assert_eq!(tail("short", 10), ("short".to_string(), false));
        assert_eq!(tail("abcdef", 3), ("def".to_string(), true));
        let (kept, truncated) = tail("aé", 1);
        assert!(truncated);
        assert_eq!(kept, "");
    }
}
