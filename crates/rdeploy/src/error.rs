//! Error types for rdeploy

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for rdeploy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rdeploy
///
/// Every variant except `Io`, `TomlParse` and `Decoding` is a fatal
/// preparation error of a single deployment: when one of them is raised no
/// host has been contacted yet.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The file has no path relative to the deployment root
    #[error("Could not get relative path for '{file}' under '{root}'")]
    #[diagnostic(help("Only files inside the deployment root can be deployed"))]
    PathResolution { file: String, root: String },

    /// The relative path is empty once leading separators are stripped
    #[error("Relative path for '{file}' is empty")]
    #[diagnostic(help("Pass a file inside the deployment root, not the root itself"))]
    EmptyRelativePath { file: String },

    /// The file could not be read
    #[error("Failed to read '{file}': {source}")]
    FileRead {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The gzip encoder failed
    #[error("Compression error: {message}")]
    Compression { message: String, help: String },

    /// The record could not be encoded or framed
    #[error("Encoding error: {message}")]
    Encoding { message: String, help: String },

    /// A received frame could not be decoded
    #[error("Decoding error: {message}")]
    Decoding { message: String, help: String },
}

impl Error {
    /// Create a path resolution error
    pub fn path_resolution(file: impl Into<String>, root: impl Into<String>) -> Self {
        Self::PathResolution {
            file: file.into(),
            root: root.into(),
        }
    }

    /// Create an empty relative path error
    pub fn empty_relative_path(file: impl Into<String>) -> Self {
        Self::EmptyRelativePath { file: file.into() }
    }

    /// Create a file read error
    pub fn file_read(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileRead {
            file: file.into(),
            source,
        }
    }

    /// Create a compression error
    pub fn compression(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a decoding error
    pub fn decoding(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
            help: help.into(),
        }
    }
}
