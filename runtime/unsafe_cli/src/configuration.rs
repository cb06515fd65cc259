use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use std::path::{Path, PathBuf};

/// The prefix of the environment variables that override configuration values.
pub const ENV_PREFIX: &str = "UNSAFE_";

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// The configuration of `unsafectl`.
pub struct Config {
    #[serde(default)]
    pub db: DatabaseConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// Where the databases live.
pub struct DatabaseConfig {
    /// The application database, holding the user table.
    #[serde(default = "default_app_db")]
    pub app: PathBuf,
    /// The session database.
    #[serde(default = "default_sessions_db")]
    pub sessions: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            app: default_app_db(),
            sessions: default_sessions_db(),
        }
    }
}

fn default_app_db() -> PathBuf {
    PathBuf::from("app.db")
}

fn default_sessions_db() -> PathBuf {
    PathBuf::from("sessions.db")
}

/// Load the configuration from an optional YAML file, then apply
/// the overrides set via environment variables.
///
/// An explicitly requested file must exist.
pub fn load(path: Option<&Path>) -> Result<Config, anyhow::Error> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        anyhow::ensure!(
            path.is_file(),
            "The configuration file `{}` doesn't exist",
            path.display()
        );
        figment = figment.merge(Yaml::file(path));
    }
    let _span = tracing::debug_span!("Loading configuration").entered();
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load hierarchical configuration")
}
