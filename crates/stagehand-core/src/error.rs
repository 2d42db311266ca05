use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "missing deploy settings: {}; set them under [deploy] in stagehand.toml or via {}",
        missing.join(", "),
        format_env_vars(missing)
    )]
    MissingDeploySetting { missing: Vec<&'static str> },

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

fn format_env_vars(missing: &[&'static str]) -> String {
    missing
        .iter()
        .filter_map(|key| crate::config::env_var_for(key))
        .collect::<Vec<_>>()
        .join(", ")
}
