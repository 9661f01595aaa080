//! Error types and handling for `SnapTrip`

use thiserror::Error;

/// Main error type for the `SnapTrip` application
#[derive(Error, Debug)]
pub enum SnapTripError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Embedding service errors
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Similarity search gateway errors
    #[error("Search error: {message}")]
    Search { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SnapTripError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new embedding error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a new search error
    pub fn search<S: Into<String>>(message: S) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SnapTripError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            SnapTripError::Embedding { .. } => {
                "The image could not be analyzed. Please try another photo.".to_string()
            }
            SnapTripError::Search { .. } => {
                "Place search is currently unavailable. Please try again later.".to_string()
            }
            SnapTripError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            SnapTripError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
