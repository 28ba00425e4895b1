//! Configuration parsing and management for rigview

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, RigviewError};
use crate::gallery::Booth;
use crate::rig::RigOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub rig: RigConfig,
    pub preview: PreviewConfig,
    pub gallery: GalleryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RigviewError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, RigviewError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, RigviewError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RigviewError> {
        if !(self.storage.host.starts_with("http://") || self.storage.host.starts_with("https://")) {
            return Err(invalid("storage.host", "Host must be an http(s) URL"));
        }

        if self.storage.timeout_secs == 0 {
            return Err(invalid("storage.timeout_secs", "Timeout must be greater than 0"));
        }

        if self.http.port == 0 {
            return Err(invalid("http.port", "Port must be greater than 0"));
        }

        if !(1..=240).contains(&self.rig.frame_rate) {
            return Err(invalid("rig.frame_rate", "Frame rate must be between 1 and 240"));
        }

        if self.preview.waveform_bars == 0 {
            return Err(invalid("preview.waveform_bars", "Bar count must be greater than 0"));
        }

        if !(self.preview.camera_fov > 0.0 && self.preview.camera_fov < 180.0) {
            return Err(invalid(
                "preview.camera_fov",
                "Field of view must be between 0 and 180 degrees",
            ));
        }

        if self.gallery.page_size == 0 {
            return Err(invalid("gallery.page_size", "Page size must be greater than 0"));
        }

        for (i, booth) in self.gallery.catalog.iter().enumerate() {
            if booth.hash.is_empty() {
                return Err(invalid(
                    &format!("gallery.catalog[{}].hash", i),
                    "Hash must not be empty",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> RigviewError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Content-addressed storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage host; content resolves to `<host>/ipfs/<hash>`
    pub host: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "https://ipfs.io".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
        }
    }
}

/// Rig configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Enable finger tracking on rigs
    pub fingers: bool,
    /// Enable hair physics on rigs
    pub hair: bool,
    /// Enable viseme (lip sync) blendshapes on rigs
    pub visemes: bool,
    /// Render rigs as debug skeletons
    pub debug: bool,
    /// Avatar loaded into the local rig at startup
    pub avatar_url: Option<String>,
    /// Rig update rate in frames per second
    pub frame_rate: u32,
}

impl RigConfig {
    pub fn options(&self) -> RigOptions {
        RigOptions {
            fingers: self.fingers,
            hair: self.hair,
            visemes: self.visemes,
            debug: self.debug,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            fingers: true,
            hair: true,
            visemes: true,
            debug: false,
            avatar_url: None,
            frame_rate: 60,
        }
    }
}

/// Preview page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Number of bars drawn in the audio waveform
    pub waveform_bars: usize,
    /// Vertical field of view of the model viewer, in degrees
    pub camera_fov: f32,
    /// Model viewer camera position
    pub camera_position: [f32; 3],
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            waveform_bars: 256,
            camera_fov: 60.0,
            camera_position: [0.0, 2.0, -2.0],
        }
    }
}

/// Gallery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Cards per page
    pub page_size: usize,
    /// Content listed in the gallery
    pub catalog: Vec<Booth>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: 24,
            catalog: Vec::new(),
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("rigview");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/rigview");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/rigview");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("rigview");
        }
    }

    PathBuf::from(".")
}
