use crate::autosave::AutosaveTimer;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::time::Duration;

/// `[editor]` section of the shared config file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EditorSettings {
    #[serde(default = "default_autosave")]
    pub autosave: bool,
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
    #[serde(default = "default_autosave_quiet_secs")]
    pub autosave_quiet_secs: u64,
}

fn default_autosave() -> bool {
    true
}

fn default_autosave_interval_secs() -> u64 {
    30
}

fn default_autosave_quiet_secs() -> u64 {
    2
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            autosave: default_autosave(),
            autosave_interval_secs: default_autosave_interval_secs(),
            autosave_quiet_secs: default_autosave_quiet_secs(),
        }
    }
}

impl EditorSettings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(&tally_auth::config_path()).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        match settings.get::<EditorSettings>("editor") {
            Ok(editor) => Ok(editor),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.autosave && self.autosave_interval_secs == 0 {
            return Err("editor.autosave_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    pub fn autosave_timer(&self) -> Option<AutosaveTimer> {
        self.autosave.then(|| {
            AutosaveTimer::new(
                Duration::from_secs(self.autosave_interval_secs),
                Duration::from_secs(self.autosave_quiet_secs),
            )
        })
    }
}
