use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,
    #[serde(default = "default_weather_change_interval_minutes")]
    pub weather_change_interval_minutes: u32,
    #[serde(default = "default_weather_data_path")]
    pub weather_data_path: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
    #[serde(default = "default_websocket_bind")]
    pub websocket_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_tick_interval_ms() -> u32 {
    100
}
fn default_weather_change_interval_minutes() -> u32 {
    10
}
fn default_weather_data_path() -> String {
    "./weather.toml".to_string()
}
fn default_websocket_port() -> u16 {
    8119
}
fn default_websocket_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            tick_interval_ms: default_tick_interval_ms(),
            weather_change_interval_minutes: default_weather_change_interval_minutes(),
            weather_data_path: default_weather_data_path(),
            seed: 0,
            websocket_port: default_websocket_port(),
            websocket_bind: default_websocket_bind(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: ServerConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !(1..=60_000).contains(&self.tick_interval_ms) {
            errors.push(format!(
                "tick_interval_ms must be 1-60000, got {}. Example: tick_interval_ms = 100",
                self.tick_interval_ms
            ));
        }

        if self.weather_change_interval_minutes == 0 {
            errors.push(format!(
                "weather_change_interval_minutes must be > 0, got {}. Example: weather_change_interval_minutes = 10",
                self.weather_change_interval_minutes
            ));
        }

        if self.weather_data_path.trim().is_empty() {
            errors.push(
                "weather_data_path must not be empty. Example: weather_data_path = \"./weather.toml\""
                    .to_string(),
            );
        }

        if !(1024..=65535).contains(&self.websocket_port) {
            errors.push(format!(
                "websocket_port must be 1024-65535, got {}. Example: websocket_port = 8119",
                self.websocket_port
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
