use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "stagehand.toml";

/// Deploy identifiers that may be supplied through the environment.
const DEPLOY_ENV: &[(&str, &str)] = &[
    ("deploy.profile", "STAGEHAND_AWS_PROFILE"),
    ("deploy.region", "STAGEHAND_AWS_REGION"),
    ("deploy.bucket", "STAGEHAND_BUCKET"),
    ("deploy.distribution", "STAGEHAND_DISTRIBUTION"),
];

/// stagehand.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagehandConfig {
    #[serde(default)]
    pub site: SiteLayout,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Fixed site layout. Relative paths are resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLayout {
    /// Source tree scanned for CSS and watched in dev mode
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,
    /// Build output directory, owned entirely by the pipeline
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Single JS entry point handed to the bundler
    #[serde(default = "default_entry")]
    pub entry: PathBuf,
    /// Single HTML template
    #[serde(default = "default_template")]
    pub template: PathBuf,
}

/// Which of the two pipeline sequences to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Development,
    Production,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => f.write_str("dev"),
            Self::Production => f.write_str("prod"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Minify the rendered HTML
    #[serde(default)]
    pub minimize_html: bool,
    /// Fingerprint CSS files and rewrite HTML references to them
    #[serde(default)]
    pub minimize_css: bool,
    /// Run the CSS stage at all
    #[serde(default = "default_true")]
    pub css: bool,
    #[serde(default)]
    pub bundler: BundlerOptions,
    #[serde(default)]
    pub template: TemplateOptions,
    #[serde(default)]
    pub minifier: MinifierOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlerOptions {
    /// Bundler executable
    #[serde(default = "default_bundler_program")]
    pub program: String,
    /// Arguments placed before `--entry` / `--output-path`
    #[serde(default = "default_bundler_args")]
    pub args: Vec<String>,
    /// Arguments appended for unoptimized builds
    #[serde(default = "default_bundler_dev_args")]
    pub dev_args: Vec<String>,
    /// Arguments appended when `optimize` is set
    #[serde(default = "default_bundler_optimize_args")]
    pub optimize_args: Vec<String>,
    /// Enable the bundler's optimizer (minification, comment stripping)
    #[serde(default)]
    pub optimize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOptions {
    /// File-name pattern for bundles discovered directly under `out_dir`
    #[serde(default = "default_scripts_pattern")]
    pub scripts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifierOptions {
    #[serde(default = "default_true")]
    pub remove_comments: bool,
    /// Minify inline `<style>` blocks and `style` attributes
    #[serde(default = "default_true")]
    pub minify_css: bool,
    /// Minify inline `<script>` blocks
    #[serde(default = "default_true")]
    pub minify_js: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// AWS shared-credentials profile
    pub profile: Option<String>,
    /// AWS region of the bucket
    pub region: Option<String>,
    /// Target S3 bucket
    pub bucket: Option<String>,
    /// CloudFront distribution ID
    pub distribution: Option<String>,
    /// Publish cache file, relative to the project root
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    /// `Cache-Control` header sent with every object
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    /// Maximum concurrent uploads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Extra attempts per file after a failed upload
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Upper bound for a single cloud call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Also invalidate the directory path when an `index.html` changes
    #[serde(default)]
    pub index_root_path: bool,
}

/// Validated deployment identifiers. Only obtainable via [`DeployConfig::target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub profile: String,
    pub region: String,
    pub bucket: String,
    pub distribution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Quiet period before a burst of source changes triggers a rebuild
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            out_dir: default_out_dir(),
            entry: default_entry(),
            template: default_template(),
        }
    }
}

impl SiteLayout {
    /// Resolve every relative path against `root`.
    pub fn rooted(&self, root: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        Self {
            src_dir: join(&self.src_dir),
            out_dir: join(&self.out_dir),
            entry: join(&self.entry),
            template: join(&self.template),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            minimize_html: false,
            minimize_css: false,
            css: true,
            bundler: BundlerOptions::default(),
            template: TemplateOptions::default(),
            minifier: MinifierOptions::default(),
        }
    }
}

impl BuildConfig {
    /// Derive the production configuration: HTML minification, CSS
    /// fingerprinting and the bundler optimizer all switched on.
    ///
    /// Returns a new value; `self` is left untouched so a later
    /// development build never sees production flags.
    pub fn to_production(&self) -> Self {
        Self {
            minimize_html: true,
            minimize_css: true,
            bundler: BundlerOptions {
                optimize: true,
                ..self.bundler.clone()
            },
            ..self.clone()
        }
    }

    pub fn for_mode(&self, mode: BuildMode) -> Self {
        match mode {
            BuildMode::Development => self.clone(),
            BuildMode::Production => self.to_production(),
        }
    }

    /// Whether the CSS stage fingerprints and the template stage rewrites.
    pub fn fingerprint_css(&self) -> bool {
        self.css && self.minimize_css
    }
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            program: default_bundler_program(),
            args: default_bundler_args(),
            dev_args: default_bundler_dev_args(),
            optimize_args: default_bundler_optimize_args(),
            optimize: false,
        }
    }
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            scripts: default_scripts_pattern(),
        }
    }
}

impl Default for MinifierOptions {
    fn default() -> Self {
        Self {
            remove_comments: true,
            minify_css: true,
            minify_js: true,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            bucket: None,
            distribution: None,
            cache_file: default_cache_file(),
            cache_control: default_cache_control(),
            concurrency: default_concurrency(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            index_root_path: false,
        }
    }
}

impl DeployConfig {
    /// Check that every deployment identifier is present.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingDeploySetting`](crate::Error::MissingDeploySetting)
    ///   listing every absent (or blank) identifier
    /// - [`Error::InvalidSetting`](crate::Error::InvalidSetting) if
    ///   `concurrency` or `timeout_secs` is zero
    pub fn target(&self) -> crate::Result<DeployTarget> {
        let fields = [
            ("deploy.profile", &self.profile),
            ("deploy.region", &self.region),
            ("deploy.bucket", &self.bucket),
            ("deploy.distribution", &self.distribution),
        ];

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(crate::Error::MissingDeploySetting { missing });
        }

        if self.concurrency == 0 {
            return Err(crate::Error::InvalidSetting {
                key: "deploy.concurrency",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::InvalidSetting {
                key: "deploy.timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }

        let value = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_owned();
        Ok(DeployTarget {
            profile: value(&self.profile),
            region: value(&self.region),
            bucket: value(&self.bucket),
            distribution: value(&self.distribution),
        })
    }

    /// Override deploy identifiers from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, var) in DEPLOY_ENV {
            let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            tracing::debug!(key, var, "deploy setting overridden from environment");
            let slot = match *key {
                "deploy.profile" => &mut self.profile,
                "deploy.region" => &mut self.region,
                "deploy.bucket" => &mut self.bucket,
                _ => &mut self.distribution,
            };
            *slot = Some(value);
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl StagehandConfig {
    /// Load from stagehand.toml at the given path, or return defaults if not
    /// found. A `.env` file next to it is loaded first and the
    /// `STAGEHAND_*` variables override the `[deploy]` identifiers.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let dotenv_path = project_dir.join(".env");
        match dotenvy::from_path(&dotenv_path) {
            Ok(()) => tracing::debug!(path = %dotenv_path.display(), "loaded .env"),
            Err(e) if e.not_found() => tracing::debug!("no .env file"),
            Err(e) => tracing::warn!(path = %dotenv_path.display(), error = %e, "ignoring unreadable .env"),
        }

        let mut config = Self::load_file(project_dir)?;
        config.deploy.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Load stagehand.toml only, without consulting the environment.
    pub fn load_file(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

/// Environment variable that overrides the given `[deploy]` key.
pub(crate) fn env_var_for(key: &str) -> Option<&'static str> {
    DEPLOY_ENV
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, var)| *var)
}

fn default_true() -> bool {
    true
}

fn default_src_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_entry() -> PathBuf {
    PathBuf::from("src/js/index.js")
}

fn default_template() -> PathBuf {
    PathBuf::from("src/index.html")
}

fn default_bundler_program() -> String {
    "npx".to_owned()
}

fn default_bundler_args() -> Vec<String> {
    vec!["webpack".to_owned()]
}

fn default_bundler_dev_args() -> Vec<String> {
    vec!["--mode".to_owned(), "development".to_owned()]
}

fn default_bundler_optimize_args() -> Vec<String> {
    vec!["--mode".to_owned(), "production".to_owned()]
}

fn default_scripts_pattern() -> String {
    "*.js".to_owned()
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("publish.cache")
}

fn default_cache_control() -> String {
    "max-age=315360000, no-transform, public".to_owned()
}

fn default_concurrency() -> usize {
    8
}

fn default_retries() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_debounce_ms() -> u64 {
    150
}
