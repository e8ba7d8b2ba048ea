use crate::config_path;
use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(&config_path()).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend_url.is_empty() {
            return Err("backend_url is required".to_string());
        }
        if !self.backend_url.starts_with("http") {
            return Err("backend_url must be a valid HTTP(S) URL".to_string());
        }
        Ok(())
    }
}
