use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

/// `panel.toml` (or any format the config crate recognises under that stem).
pub const CONFIG_FILE: &str = "panel";
pub const ENV_PREFIX: &str = "PANEL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliSettings {
    pub server_url: String,
    pub kind: String,
}

pub fn load_settings() -> Result<CliSettings, ConfigError> {
    settings_from(
        File::with_name(CONFIG_FILE).required(false),
        Environment::with_prefix(ENV_PREFIX).separator("__"),
    )
}

/// Defaults, then `file`, then `env`; later sources win.
pub(crate) fn settings_from<F, E>(file: F, env: E) -> Result<CliSettings, ConfigError>
where
    F: Source + Send + Sync + 'static,
    E: Source + Send + Sync + 'static,
{
    Config::builder()
        .set_default("server_url", "http://127.0.0.1:8080")?
        .set_default("kind", "youtube")?
        .add_source(file)
        .add_source(env)
        .build()?
        .try_deserialize()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
