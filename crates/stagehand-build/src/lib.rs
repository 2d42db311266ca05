//! Build stages and the pipeline orchestrator for stagehand.
//!
//! # Pipeline
//!
//! ```text
//! stagehand build-dev | build-prod
//!   1. Clean     ── delete and recreate dist/
//!   2. Bundle    ── <bundler> --entry src/js/index.js --output-path dist/
//!   3. CSS       ── src/**/*.css → dist/ (fingerprinted in prod)
//!   4. Template  ── render src/index.html with the bundles found in dist/,
//!                   minify (prod), rewrite CSS references (prod)
//! ```
//!
//! Stages run strictly in order; each one reads what the previous one wrote.
//! The first failure aborts the run and leaves `dist/` as it is.
//!
//! # Fingerprinting
//!
//! A fingerprinted file is named `name.<hash>.ext`, where `<hash>` is derived
//! from the file's bytes only. Unchanged content keeps its name across builds,
//! so long-lived CDN caches stay valid; changed content gets a new name.

pub mod bundle;
pub mod clean;
pub mod css;
pub mod fileset;
pub mod fingerprint;
pub mod minify;
pub mod pipeline;
pub mod template;

pub use bundle::{BundleInvocation, BundlerRunner, CommandRunner};
pub use fileset::FileSet;
pub use fingerprint::ReferenceMap;
pub use pipeline::{BuildReport, Pipeline, PipelineError, Stage};
