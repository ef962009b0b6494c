use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Enums for Choices ---
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializerType {
    #[default]
    Json,
    Binary,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    #[default]
    Stdio,
    File,
    WebSocket,
}

// --- Configuration Sections ---

/// Pixel size of the drawing surface frames are produced for.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CanvasSettings {
    #[serde(default = "default_canvas_width")]
    pub width: f64,
    #[serde(default = "default_canvas_height")]
    pub height: f64,
}

fn default_canvas_width() -> f64 { 1000.0 }
fn default_canvas_height() -> f64 { 400.0 }

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SerializerConfig {
    #[serde(rename = "type")]
    pub serializer_type: SerializerType,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SenderConfig {
    #[serde(rename = "type")]
    pub sender_type: SenderType,
    pub options: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TransportConfig {
    #[serde(default)]
    pub serializer: SerializerConfig,
    #[serde(default)]
    pub sender: SenderConfig,
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    #[serde(default)]
    pub canvas: CanvasSettings,
    /// Seed for the simulation's random source; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    /// Stop after this many frames; run until quit when absent.
    pub max_frames: Option<u64>,
    #[serde(default)]
    pub start_paused: bool,
    /// Frames between progress log lines.
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_framerate() -> u32 { 60 }
fn default_log_interval() -> u64 { 600 }

impl Default for Config {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            canvas: CanvasSettings::default(),
            seed: None,
            max_frames: None,
            start_paused: false,
            log_interval: default_log_interval(),
            transport: TransportConfig::default(),
        }
    }
}

// --- Sender Options ---
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WebSocketOptions {
    #[serde(default = "default_ws_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub port: u16,
}

fn default_ws_host() -> String { "127.0.0.1".to_string() }
fn default_ws_port() -> u16 { 8080 }

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            host: default_ws_host(),
            port: default_ws_port(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FileOptions {
    pub path: PathBuf,
}

// --- Helper Methods ---

impl SenderConfig {
    pub fn get_websocket_options(&self) -> WebSocketOptions {
        if let Some(value) = &self.options {
            if let Ok(options) = serde_json::from_value(value.clone()) {
                return options;
            }
        }
        WebSocketOptions::default()
    }

    /// File sender options; the output path has no default.
    pub fn get_file_options(&self) -> Result<FileOptions, ConfigError> {
        let value = self.options.clone().ok_or_else(|| {
            ConfigError::Validation("The 'file' sender requires an output 'path' option.".to_string())
        })?;
        serde_json::from_value(value).map_err(ConfigError::from)
    }
}

// --- Loading Function ---

/// Reads and validates a config file. Files ending in `.toml` are parsed as
/// TOML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.framerate == 0 {
        return Err(ConfigError::Validation("Framerate cannot be zero.".to_string()));
    }

    let CanvasSettings { width, height } = config.canvas;
    if !(width > 0.0 && height > 0.0) {
        return Err(ConfigError::Validation(
            "Canvas dimensions must be positive.".to_string(),
        ));
    }

    if config.log_interval == 0 {
        return Err(ConfigError::Validation("Log interval cannot be zero.".to_string()));
    }

    if config.transport.sender.sender_type == SenderType::File {
        config.transport.sender.get_file_options()?;
    }

    Ok(())
}
