//! Core data types for expiry checking.
//!
//! This module defines the result types handed to reporters, the process-wide
//! check mode, and the configuration the dispatcher and probes are built from.

use crate::dispatcher::InputPolicy;
use crate::error::ExpiryCheckError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which expiry a run measures.
///
/// Chosen once before dispatch begins and never changed during a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckMode {
    /// Expiry of the TLS certificate served on the HTTPS port
    #[serde(rename = "certificate")]
    Certificate,

    /// Expiry of the domain registration, read from WHOIS
    #[serde(rename = "registration")]
    Registration,
}

impl CheckMode {
    /// Resolve the mode from the two mutually exclusive selector flags.
    ///
    /// Exactly one flag must be set; neither or both is a configuration
    /// error and no run may start.
    pub fn from_flags(certificate: bool, registration: bool) -> Result<Self, ExpiryCheckError> {
        match (certificate, registration) {
            (true, false) => Ok(Self::Certificate),
            (false, true) => Ok(Self::Registration),
            (true, true) => Err(ExpiryCheckError::config(
                "Certificate and registration expiry cannot be checked in the same run",
            )),
            (false, false) => Err(ExpiryCheckError::config(
                "Choose one check mode: certificate (--ssl) or registration (--domain)",
            )),
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Whole days until expiry; negative when already expired
    Success { days_remaining: i64 },

    /// The probe could not produce a day count
    Failure { error: ExpiryCheckError },
}

impl ProbeOutcome {
    /// Days remaining, if the probe succeeded.
    pub fn days_remaining(&self) -> Option<i64> {
        match self {
            Self::Success { days_remaining } => Some(*days_remaining),
            Self::Failure { .. } => None,
        }
    }

    /// The failure cause, if the probe failed.
    pub fn error(&self) -> Option<&ExpiryCheckError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

impl From<Result<i64, ExpiryCheckError>> for ProbeOutcome {
    fn from(result: Result<i64, ExpiryCheckError>) -> Self {
        match result {
            Ok(days_remaining) => Self::Success { days_remaining },
            Err(error) => Self::Failure { error },
        }
    }
}

/// Result of checking one domain.
///
/// Always carries the domain exactly as it was read from the input.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    /// The input entry that was checked (e.g., "example.com")
    pub domain: String,

    /// Which probe produced this result
    pub mode: CheckMode,

    /// Success with a day count, or the failure cause
    #[serde(flatten)]
    pub outcome: ProbeOutcome,

    /// How long the probe took
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_duration: Option<Duration>,
}

/// Configuration options for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Maximum number of probes in flight at once
    /// Default: 1, must be at least 1
    pub threads: usize,

    /// Timeout covering TCP connect and TLS handshake
    /// Default: 5 seconds
    #[serde(skip)]
    pub tls_timeout: Duration,

    /// Timeout for one WHOIS lookup
    /// Default: 10 seconds
    #[serde(skip)]
    pub whois_timeout: Duration,

    /// Port the certificate probe connects to
    /// Default: 443
    pub port: u16,

    /// What the dispatcher does with blank or invalid input lines
    #[serde(skip)]
    pub input_policy: InputPolicy,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            tls_timeout: Duration::from_secs(5),
            whois_timeout: Duration::from_secs(10),
            port: 443,
            input_policy: InputPolicy::StopOnFirstAnomaly,
        }
    }
}

impl CheckConfig {
    /// Set the concurrency budget.
    ///
    /// A budget of 0 is raised to 1 so a run always has a worker.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the TLS connect + handshake timeout.
    pub fn with_tls_timeout(mut self, timeout: Duration) -> Self {
        self.tls_timeout = timeout;
        self
    }

    /// Set the WHOIS lookup timeout.
    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Set the port used by the certificate probe.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the input policy.
    pub fn with_input_policy(mut self, policy: InputPolicy) -> Self {
        self.input_policy = policy;
        self
    }
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckMode::Certificate => write!(f, "certificate"),
            CheckMode::Registration => write!(f, "registration"),
        }
    }
}
