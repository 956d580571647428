use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::ApiClient;
use crate::chat::identity::Profile;
use crate::chat::realtime::RealtimeConfig;
use crate::error::{ApiError, ChannelError, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    /// 0 retries forever.
    pub max_attempts: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self { reconnect_base_ms: 1_000, reconnect_max_ms: 30_000, max_attempts: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub base_url: String,
    /// Overrides the socket endpoint derived from `base_url`.
    pub realtime_url: Option<String>,
    pub request_timeout_secs: u64,
    pub profile: Option<Profile>,
    pub realtime: RealtimeSettings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            realtime_url: None,
            request_timeout_secs: 15,
            profile: None,
            realtime: RealtimeSettings::default(),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the current format; a legacy JSON file is read once and rewritten as TOML.
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("school-messenger.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("org", "school", "SchoolMessenger")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::toml_path() else {
            return Self::new();
        };
        Self::load_from(&path, Self::legacy_json_path().as_deref())
    }

    /// Read `path`, falling back to (and migrating) `legacy` JSON. Anything unreadable yields defaults.
    pub fn load_from(path: &Path, legacy: Option<&Path>) -> Self {
        if let Ok(text) = fs::read_to_string(path) {
            match toml::from_str::<AppState>(&text) {
                Ok(state) => return state,
                Err(e) => log::warn!("ignoring unreadable config {}: {e}", path.display()),
            }
        }

        if let Some(legacy) = legacy {
            if let Ok(bytes) = fs::read(legacy) {
                if let Ok(state) = serde_json::from_slice::<AppState>(&bytes) {
                    if let Err(e) = state.save_to(path) {
                        log::warn!("could not migrate legacy config: {e}");
                    }
                    return state;
                }
            }
        }

        Self::new()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::toml_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && self.profile.is_some()
    }

    pub fn api_client(&self) -> Result<ApiClient, ApiError> {
        ApiClient::with_timeout(&self.base_url, Duration::from_secs(self.request_timeout_secs))
    }

    pub fn realtime_config(&self) -> Result<RealtimeConfig, ChannelError> {
        let mut config = match &self.realtime_url {
            Some(url) => RealtimeConfig { url: url.clone(), ..RealtimeConfig::default() },
            None => RealtimeConfig::from_base_url(&self.base_url)?,
        };
        config.reconnect_base = Duration::from_millis(self.realtime.reconnect_base_ms);
        config.reconnect_max = Duration::from_millis(self.realtime.reconnect_max_ms);
        config.max_attempts = self.realtime.max_attempts;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Role, Ward};

    fn guardian_state() -> AppState {
        let mut profile = Profile::new(Role::Guardian);
        profile.username = Some("jdoe".into());
        profile.students = vec![Ward { name: "Liya".into(), class: "7A".into() }];
        AppState { base_url: "https://school.test".into(), profile: Some(profile), ..AppState::new() }
    }

    #[test]
    fn toml_round_trip_keeps_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("school-messenger.toml");
        let state = guardian_state();
        state.save_to(&path).unwrap();
        assert_eq!(AppState::load_from(&path, None), state);
    }

    #[test]
    fn legacy_json_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("school-messenger.toml");
        let json_path = dir.path().join("state.json");
        fs::write(&json_path, r#"{"base_url":"https://old.test","profile":{"role":"teacher","global_staff_id":"42"}}"#).unwrap();

        let state = AppState::load_from(&toml_path, Some(&json_path));
        assert_eq!(state.base_url, "https://old.test");
        assert_eq!(state.request_timeout_secs, 15);
        assert!(toml_path.exists());
        assert_eq!(AppState::load_from(&toml_path, None), state);
    }

    #[test]
    fn missing_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load_from(&dir.path().join("none.toml"), Some(&dir.path().join("none.json")));
        assert_eq!(state, AppState::new());
        assert!(!state.is_configured());
    }

    #[test]
    fn realtime_settings_flow_into_channel_config() {
        let mut state = guardian_state();
        state.realtime = RealtimeSettings { reconnect_base_ms: 250, reconnect_max_ms: 4_000, max_attempts: 5 };
        let config = state.realtime_config().unwrap();
        assert_eq!(config.url, "wss://school.test/socket.io/?EIO=4&transport=websocket");
        assert_eq!(config.reconnect_base, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 5);

        state.realtime_url = Some("ws://127.0.0.1:9/socket.io/".into());
        assert_eq!(state.realtime_config().unwrap().url, "ws://127.0.0.1:9/socket.io/");
    }
}
