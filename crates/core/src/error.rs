//! Error types for yb-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Transport failures are kept distinct from "not found": a lookup that fails
//! on the wire is an `Err`, a missing resource is `Lookup::NotFound`.

use thiserror::Error;

/// Result type alias for yb-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for yb-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid local or remote path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// YAML backup list parsing error
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive could not be built
    #[error("Archive error: {0}")]
    Archive(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or remote API error
    #[error("Network error: {0}")]
    Network(String),

    /// The remote did not hand out a usable upload destination
    #[error("No upload target for {0}")]
    UploadTarget(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,                          // UsageError
            Error::Config(_) | Error::TomlParse(_) => 2,         // UsageError
            Error::YamlParse(_) => 2,                            // UsageError
            Error::Network(_) | Error::UploadTarget(_) => 3,     // NetworkError
            Error::Auth(_) => 4,                                 // AuthError
            Error::NotFound(_) => 5,                             // NotFound
            _ => 1,                                              // GeneralError
        }
    }
}
