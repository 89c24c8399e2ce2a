//! Custom error types for the promo screen application
//!
//! This module defines the crate error type and implements the necessary traits
//! to propagate errors from configuration, networking, storage and rendering.

use std::fmt;

/// Main error type for the promo screen application
#[derive(Debug)]
pub enum PromoScreenError {
    /// Error occurred while parsing address
    AddressParse(std::net::AddrParseError),

    /// Error occurred while reading or writing a file, or binding a socket
    Io(std::io::Error),

    /// Error occurred while parsing configuration
    ConfigParse(json5::Error),

    /// Error occurred while encoding or decoding JSON
    Json(serde_json::Error),

    /// Error occurred while talking to a remote endpoint
    Http(reqwest::Error),

    /// Error occurred while watching the configuration file
    Watch(notify::Error),

    /// Error occurred while rendering a template
    Template(askama::Error),

    /// A sponsor payload had neither a `data` nor a `values` array
    UnrecognizedPayload,

    /// A sponsor payload decoded but contained no usable rows
    EmptyPayload,

    /// Generic error with a message
    Generic(String),
}

impl fmt::Display for PromoScreenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromoScreenError::AddressParse(e) => {
                write!(f, "Failed to parse network address: {e}")
            }
            PromoScreenError::Io(e) => write!(f, "I/O error: {e}"),
            PromoScreenError::ConfigParse(e) => {
                write!(f, "Failed to parse configuration: {e}")
            }
            PromoScreenError::Json(e) => write!(f, "JSON error: {e}"),
            PromoScreenError::Http(e) => write!(f, "HTTP error: {e}"),
            PromoScreenError::Watch(e) => write!(f, "File watch error: {e}"),
            PromoScreenError::Template(e) => write!(f, "Template rendering error: {e}"),
            PromoScreenError::UnrecognizedPayload => {
                f.write_str("Unrecognized sponsor payload: expected a `data` or `values` array")
            }
            PromoScreenError::EmptyPayload => {
                f.write_str("Sponsor payload contained no valid rows")
            }
            PromoScreenError::Generic(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl std::error::Error for PromoScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PromoScreenError::AddressParse(e) => Some(e),
            PromoScreenError::Io(e) => Some(e),
            PromoScreenError::ConfigParse(e) => Some(e),
            PromoScreenError::Json(e) => Some(e),
            PromoScreenError::Http(e) => Some(e),
            PromoScreenError::Watch(e) => Some(e),
            PromoScreenError::Template(e) => Some(e),
            PromoScreenError::UnrecognizedPayload
            | PromoScreenError::EmptyPayload
            | PromoScreenError::Generic(_) => None,
        }
    }
}

impl From<std::net::AddrParseError> for PromoScreenError {
    fn from(error: std::net::AddrParseError) -> Self {
        PromoScreenError::AddressParse(error)
    }
}

impl From<std::io::Error> for PromoScreenError {
    fn from(error: std::io::Error) -> Self {
        PromoScreenError::Io(error)
    }
}

impl From<json5::Error> for PromoScreenError {
    fn from(error: json5::Error) -> Self {
        PromoScreenError::ConfigParse(error)
    }
}

impl From<serde_json::Error> for PromoScreenError {
    fn from(error: serde_json::Error) -> Self {
        PromoScreenError::Json(error)
    }
}

impl From<reqwest::Error> for PromoScreenError {
    fn from(error: reqwest::Error) -> Self {
        PromoScreenError::Http(error)
    }
}

impl From<notify::Error> for PromoScreenError {
    fn from(error: notify::Error) -> Self {
        PromoScreenError::Watch(error)
    }
}

impl From<askama::Error> for PromoScreenError {
    fn from(error: askama::Error) -> Self {
        PromoScreenError::Template(error)
    }
}

impl From<&str> for PromoScreenError {
    fn from(message: &str) -> Self {
        PromoScreenError::Generic(message.to_string())
    }
}

impl From<String> for PromoScreenError {
    fn from(message: String) -> Self {
        PromoScreenError::Generic(message)
    }
}

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, PromoScreenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_generic_error_display() {
        let err = PromoScreenError::from("Window size must be at least 1");
        assert_eq!(err.to_string(), "Error: Window size must be at least 1");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_payload_errors_are_distinct() {
        let unrecognized = PromoScreenError::UnrecognizedPayload.to_string();
        let empty = PromoScreenError::EmptyPayload.to_string();
        assert_ne!(unrecognized, empty);
        assert!(unrecognized.contains("`data`"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = PromoScreenError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing"));
    }
}
