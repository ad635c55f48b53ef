//! Error handling for expiry checking operations.
//!
//! This module defines a single error type covering every way a run can fail,
//! from a WHOIS lookup that returns nothing useful to a configuration that
//! never lets the run start.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::time::Duration;

/// Main error type for expiry checking operations.
///
/// Probe-level variants (`LookupError`, `NotRegistered`, `ConnectionError`,
/// `Timeout`) are recovered per domain and reported as failures. The others
/// concern the run as a whole.
#[derive(Debug, Clone)]
pub enum ExpiryCheckError {
    /// The WHOIS collaborator failed or returned text we could not use
    LookupError { domain: String, message: String },

    /// The WHOIS text has no registry expiry field
    NotRegistered { domain: String },

    /// TLS connection or handshake failed
    ConnectionError { domain: String, message: String },

    /// Invalid settings; fatal before any domain is read
    ConfigError { message: String },

    /// An input line failed domain-syntax validation
    MalformedInput { line: usize, entry: String },

    /// A collaborator did not answer in time
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// File I/O errors when reading domain lists or config files
    FileError { path: String, message: String },

    /// Anything that doesn't fit the categories above
    Internal { message: String },
}

impl ExpiryCheckError {
    /// Create a new WHOIS lookup error.
    pub fn lookup<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::LookupError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new not-registered error.
    pub fn not_registered<D: Into<String>>(domain: D) -> Self {
        Self::NotRegistered {
            domain: domain.into(),
        }
    }

    /// Create a new TLS connection error.
    pub fn connection<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::ConnectionError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new malformed input error.
    pub fn malformed_input<E: Into<String>>(line: usize, entry: E) -> Self {
        Self::MalformedInput {
            line,
            entry: entry.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short machine-readable name of the variant, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LookupError { .. } => "lookup_error",
            Self::NotRegistered { .. } => "not_registered",
            Self::ConnectionError { .. } => "connection_error",
            Self::ConfigError { .. } => "config_error",
            Self::MalformedInput { .. } => "malformed_input",
            Self::Timeout { .. } => "timeout",
            Self::FileError { .. } => "file_error",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether this error belongs to a single probe rather than the whole run.
    pub fn is_probe_failure(&self) -> bool {
        matches!(
            self,
            Self::LookupError { .. }
                | Self::NotRegistered { .. }
                | Self::ConnectionError { .. }
                | Self::Timeout { .. }
                | Self::Internal { .. }
        )
    }
}

impl fmt::Display for ExpiryCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupError { domain, message } => {
                write!(f, "WHOIS lookup failed for '{}': {}", domain, message)
            }
            Self::NotRegistered { domain } => {
                write!(f, "Domain '{}' is not registered", domain)
            }
            Self::ConnectionError { domain, message } => {
                write!(f, "TLS connection to '{}' failed: {}", domain, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::MalformedInput { line, entry } => {
                write!(f, "Malformed domain on line {}: '{}'", line, entry)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ExpiryCheckError {}

impl Serialize for ExpiryCheckError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExpiryCheckError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<std::io::Error> for ExpiryCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
