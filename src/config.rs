//! Configuration management for camwriter
//!
//! Loads and saves the video settings, output location and synthetic
//! capture parameters as TOML.

use crate::errors::RecorderError;
use crate::recording::VideoSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamWriterConfig {
    pub video: VideoSettings,
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
}

/// Where recordings are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the recording
    pub output_directory: String,
    /// File name reused by every recording cycle
    pub file_name: String,
}

impl StorageConfig {
    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.output_directory).join(&self.file_name)
    }
}

/// Synthetic capture source parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Sensor resolution [width, height] in landscape orientation
    pub native_resolution: [u32; 2],
    /// Frames per second delivered by the producer
    pub fps: f64,
}

impl Default for CamWriterConfig {
    fn default() -> Self {
        Self {
            video: VideoSettings::default(),
            storage: StorageConfig {
                output_directory: "./recordings".to_string(),
                file_name: "videoFile.mp4".to_string(),
            },
            capture: CaptureConfig {
                native_resolution: [1280, 720],
                fps: 30.0,
            },
        }
    }
}

impl CamWriterConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| RecorderError::Config(format!("Failed to read config file: {}", e)))?;

        let config: CamWriterConfig = toml::from_str(&contents)
            .map_err(|e| RecorderError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecorderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RecorderError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| RecorderError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camwriter.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err("Invalid output resolution".to_string());
        }
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err("Output resolution must be even for 4:2:0 encoding".to_string());
        }
        if self.video.average_bitrate == 0 {
            return Err("Average bitrate must be positive".to_string());
        }
        if !(self.video.fps > 0.0 && self.video.fps <= 240.0) {
            return Err("Invalid video FPS (must be in (0, 240])".to_string());
        }

        if self.storage.file_name.trim().is_empty() {
            return Err("Output file name must not be empty".to_string());
        }

        let [w, h] = self.capture.native_resolution;
        if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
            return Err("Capture resolution must be non-zero and even".to_string());
        }
        if !(self.capture.fps > 0.0 && self.capture.fps <= 240.0) {
            return Err("Invalid capture FPS (must be in (0, 240])".to_string());
        }

        Ok(())
    }
}
