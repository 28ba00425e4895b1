//! Error types for rigview

use thiserror::Error;

/// Main error type for rigview
#[derive(Error, Debug)]
pub enum RigviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rig error: {0}")]
    Rig(#[from] RigError),

    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    #[error("Model load error: {0}")]
    Load(#[from] LoadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("Gallery error: {0}")]
    Gallery(#[from] GalleryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Rig registry errors
#[derive(Error, Debug)]
pub enum RigError {
    #[error("Unknown peer: {0}")]
    PeerNotFound(String),

    #[error("Peer already has a rig: {0}")]
    PeerExists(String),

    #[error("Peer was removed while its avatar was loading: {0}")]
    PeerRemoved(String),

    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Pose wire format errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("Malformed pose at {path}: expected {expected}")]
    Shape { path: String, expected: String },

    #[error("Pose value at {path} is not a number")]
    NotANumber { path: String },

    #[error("Pose value at {path} is not finite")]
    NonFinite { path: String },

    #[error("Peer pose is missing its floor height")]
    MissingFloorHeight,
}

/// Avatar model loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse model {name}: {message}")]
    Parse { name: String, message: String },

    #[error("Model at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("Avatar URL must be http(s): {0}")]
    UnsupportedUrl(String),
}

/// Content-addressed storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid content hash: {0:?}")]
    InvalidHash(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Preview switchboard errors
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("unknown extension: {0}")]
    UnsupportedType(String),

    #[error("Failed to load content: {0}")]
    Load(#[from] StorageError),

    #[error("Failed to load model: {0}")]
    Model(#[from] LoadError),
}

/// Gallery errors
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Invalid gallery page: {0}")]
    InvalidPage(u32),
}

/// Result type alias for rigview operations
pub type Result<T> = std::result::Result<T, RigviewError>;
