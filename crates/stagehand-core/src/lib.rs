//! Core types and configuration for stagehand.
//!
//! This crate defines the `stagehand.toml` schema ([`StagehandConfig`]),
//! the per-mode build configuration ([`BuildConfig`], [`BuildMode`]), the
//! validated deployment target ([`DeployTarget`]) and shared error types.

pub mod config;
pub mod error;

pub use config::{
    BuildConfig, BuildMode, BundlerOptions, CONFIG_FILE, DeployConfig, DeployTarget,
    MinifierOptions, ServeConfig, SiteLayout, StagehandConfig, TemplateOptions,
};
pub use error::{Error, Result};
