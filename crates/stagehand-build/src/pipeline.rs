use std::path::{Path, PathBuf};
use std::time::Instant;

use stagehand_core::{BuildConfig, BuildMode, SiteLayout};

use crate::bundle::{self, BundleError, BundlerRunner, CommandRunner};
use crate::clean::{self, CleanError};
use crate::css::{self, CssError};
use crate::fileset::FileSet;
use crate::fingerprint::ReferenceMap;
use crate::template::{self, TemplateError};

/// One step of the build sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Clean,
    Bundle,
    Css,
    Template,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Clean => "clean",
            Self::Bundle => "bundle",
            Self::Css => "css",
            Self::Template => "template",
        };
        f.write_str(name)
    }
}

/// Result of a completed build run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub mode: BuildMode,
    /// Every file written into the output directory, by owning stage
    pub files: FileSet,
    /// CSS renames applied to the HTML; empty unless fingerprinting ran
    pub references: ReferenceMap,
    /// The rendered page
    pub html: PathBuf,
}

/// Runs Clean → Bundle → CSS → Template against one project.
///
/// Stages run strictly in sequence and the first error aborts the run.
/// The base [`BuildConfig`] is never modified; production runs derive a
/// fresh config via [`BuildConfig::to_production`].
pub struct Pipeline<R = CommandRunner> {
    root: PathBuf,
    layout: SiteLayout,
    base: BuildConfig,
    runner: R,
}

impl Pipeline<CommandRunner> {
    pub fn new(root: &Path, layout: &SiteLayout, base: BuildConfig) -> Self {
        Self::with_runner(root, layout, base, CommandRunner)
    }
}

impl<R: BundlerRunner> Pipeline<R> {
    /// Create a pipeline with a custom bundler (used by tests).
    pub fn with_runner(root: &Path, layout: &SiteLayout, base: BuildConfig, runner: R) -> Self {
        Self {
            root: root.to_path_buf(),
            layout: layout.rooted(root),
            base,
            runner,
        }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn base(&self) -> &BuildConfig {
        &self.base
    }

    /// Unminified, unfingerprinted build.
    pub fn dev(&self) -> Result<BuildReport, PipelineError> {
        self.run(BuildMode::Development)
    }

    /// Minified, fingerprinted, optimized build.
    pub fn prod(&self) -> Result<BuildReport, PipelineError> {
        self.run(BuildMode::Production)
    }

    pub fn run(&self, mode: BuildMode) -> Result<BuildReport, PipelineError> {
        let config = self.base.for_mode(mode);
        self.run_with(mode, &config)
    }

    /// Run every stage with an explicit config.
    pub fn run_with(&self, mode: BuildMode, config: &BuildConfig) -> Result<BuildReport, PipelineError> {
        let started = Instant::now();
        let layout = &self.layout;
        let mut files = FileSet::new();
        tracing::info!(%mode, out_dir = %layout.out_dir.display(), "build started");

        tracing::info!(stage = %Stage::Clean, "running stage");
        clean::clean(&layout.out_dir, &self.root, &layout.src_dir).map_err(PipelineError::Clean)?;
        files.clear();

        tracing::info!(stage = %Stage::Bundle, command = %config.bundler.program, "running stage");
        let bundles = bundle::bundle(&self.runner, &config.bundler, layout, &self.root)
            .map_err(PipelineError::Bundle)?;
        for path in bundles {
            files.insert(path, Stage::Bundle);
        }

        let mut references = ReferenceMap::new();
        if config.css {
            tracing::info!(
                stage = %Stage::Css,
                fingerprint = config.fingerprint_css(),
                "running stage"
            );
            let output = css::process_css(&layout.src_dir, &layout.out_dir, config.fingerprint_css())
                .map_err(PipelineError::Css)?;
            for path in output.files {
                files.insert(path, Stage::Css);
            }
            for (original, fingerprinted) in output.references.iter() {
                if !files.rename(Path::new(original), fingerprinted) {
                    tracing::warn!(original, fingerprinted, "fingerprinted file was never recorded");
                }
            }
            references = output.references;
        } else {
            tracing::debug!(stage = %Stage::Css, "stage disabled");
        }

        tracing::info!(stage = %Stage::Template, minify = config.minimize_html, "running stage");
        let html = template::render_site(layout, config, &references).map_err(PipelineError::Template)?;
        if let Ok(relative) = html.strip_prefix(&layout.out_dir) {
            files.insert(relative.to_path_buf(), Stage::Template);
        }

        tracing::info!(
            %mode,
            files = files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );

        Ok(BuildReport {
            mode,
            files,
            references,
            html,
        })
    }
}

/// A stage failed; the run stopped there and the output directory was left as-is.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("clean stage failed")]
    Clean(#[source] CleanError),
    #[error("bundle stage failed")]
    Bundle(#[source] BundleError),
    #[error("css stage failed")]
    Css(#[source] CssError),
    #[error("template stage failed")]
    Template(#[source] TemplateError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Clean(_) => Stage::Clean,
            Self::Bundle(_) => Stage::Bundle,
            Self::Css(_) => Stage::Css,
            Self::Template(_) => Stage::Template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_lowercase() {
        let names: Vec<String> = [Stage::Clean, Stage::Bundle, Stage::Css, Stage::Template]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["clean", "bundle", "css", "template"]);
    }

    #[test]
    fn error_reports_its_stage() {
        let err = PipelineError::Bundle(BundleError::NoOutput(PathBuf::from("dist")));
        assert_eq!(err.stage(), Stage::Bundle);
        assert_eq!(err.to_string(), "bundle stage failed");
    }

    #[test]
    fn layout_is_rooted() {
        let pipeline = Pipeline::new(
            Path::new("/site"),
            &SiteLayout::default(),
            BuildConfig::default(),
        );
        assert_eq!(pipeline.layout().out_dir, PathBuf::from("/site/dist"));
        assert_eq!(pipeline.layout().entry, PathBuf::from("/site/src/js/index.js"));
    }
}
