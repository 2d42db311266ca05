use std::path::{Path, PathBuf};
use std::process::Command;

use stagehand_core::{BundlerOptions, SiteLayout};

/// A fully resolved bundler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (the project root)
    pub cwd: PathBuf,
}

impl BundleInvocation {
    /// `program args… --entry <entry> --output-path <out_dir>` followed by
    /// the optimizer or development arguments.
    pub fn new(options: &BundlerOptions, layout: &SiteLayout, project_dir: &Path) -> Self {
        let mut args = options.args.clone();
        args.push("--entry".to_owned());
        args.push(layout.entry.display().to_string());
        args.push("--output-path".to_owned());
        args.push(layout.out_dir.display().to_string());

        let mode_args = if options.optimize {
            &options.optimize_args
        } else {
            &options.dev_args
        };
        args.extend(mode_args.iter().cloned());

        Self {
            program: options.program.clone(),
            args,
            cwd: project_dir.to_path_buf(),
        }
    }
}

impl std::fmt::Display for BundleInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction over the external module bundler for testability.
///
/// Production code uses [`CommandRunner`]; tests substitute a fake that
/// writes bundles directly.
pub trait BundlerRunner {
    fn run(&self, invocation: &BundleInvocation) -> Result<(), BundleError>;
}

/// Spawns the configured bundler as a child process.
pub struct CommandRunner;

impl BundlerRunner for CommandRunner {
    fn run(&self, invocation: &BundleInvocation) -> Result<(), BundleError> {
        tracing::debug!(command = %invocation, "running bundler");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .output()
            .map_err(|e| BundleError::Spawn {
                program: invocation.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // webpack reports compilation errors on stdout
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_owned()
            } else {
                stderr.trim().to_owned()
            };
            return Err(BundleError::Failed {
                command: invocation.to_string(),
                status: output.status.to_string(),
                detail,
            });
        }

        Ok(())
    }
}

/// Run the bundler against the entry point and return the files it emitted,
/// relative to the output directory and sorted.
pub fn bundle<R: BundlerRunner>(
    runner: &R,
    options: &BundlerOptions,
    layout: &SiteLayout,
    project_dir: &Path,
) -> Result<Vec<PathBuf>, BundleError> {
    if !layout.entry.is_file() {
        return Err(BundleError::MissingEntry(layout.entry.clone()));
    }

    let invocation = BundleInvocation::new(options, layout, project_dir);
    runner.run(&invocation)?;

    let emitted = list_files(&layout.out_dir)?;
    if emitted.is_empty() {
        return Err(BundleError::NoOutput(layout.out_dir.clone()));
    }

    tracing::debug!(count = emitted.len(), "bundler output collected");
    Ok(emitted)
}

/// Every regular file under `dir`, relative to `dir`, in sorted order.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BundleError::Scan {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file()
            && let Ok(relative) = entry.path().strip_prefix(dir)
        {
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("entry point {0} does not exist")]
    MissingEntry(PathBuf),
    #[error("failed to start bundler `{program}`")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("bundler exited with {status}: {command}\n{detail}")]
    Failed {
        command: String,
        status: String,
        detail: String,
    },
    #[error("failed to scan bundler output in {path}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("bundler produced no files in {0}")]
    NoOutput(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SiteLayout {
        SiteLayout::default().rooted(Path::new("/site"))
    }

    #[test]
    fn invocation_dev_mode() {
        let inv = BundleInvocation::new(&BundlerOptions::default(), &layout(), Path::new("/site"));

        assert_eq!(inv.program, "npx");
        assert_eq!(
            inv.args,
            vec![
                "webpack",
                "--entry",
                "/site/src/js/index.js",
                "--output-path",
                "/site/dist",
                "--mode",
                "development",
            ]
        );
        assert_eq!(inv.cwd, PathBuf::from("/site"));
    }

    #[test]
    fn invocation_optimized_mode() {
        let options = BundlerOptions {
            optimize: true,
            ..Default::default()
        };
        let inv = BundleInvocation::new(&options, &layout(), Path::new("/site"));

        assert_eq!(
            &inv.args[inv.args.len() - 2..],
            &["--mode".to_owned(), "production".to_owned()]
        );
        assert!(!inv.args.contains(&"development".to_owned()));
    }

    #[test]
    fn invocation_display_joins_args() {
        let options = BundlerOptions {
            program: "webpack".to_owned(),
            args: vec![],
            dev_args: vec![],
            ..Default::default()
        };
        let inv = BundleInvocation::new(&options, &layout(), Path::new("/site"));
        assert_eq!(
            inv.to_string(),
            "webpack --entry /site/src/js/index.js --output-path /site/dist"
        );
    }

    #[test]
    fn spawn_failure_is_reported() {
        let inv = BundleInvocation {
            program: "stagehand-no-such-bundler".to_owned(),
            args: vec![],
            cwd: std::env::temp_dir(),
        };
        let err = CommandRunner.run(&inv).unwrap_err();
        assert!(matches!(err, BundleError::Spawn { .. }));
    }
}
