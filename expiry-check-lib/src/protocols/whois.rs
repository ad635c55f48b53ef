//! WHOIS protocol client.
//!
//! WHOIS returns unstructured registry text. This module only fetches that
//! text; turning it into an expiry date is the registry probe's job.

use crate::error::ExpiryCheckError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Anything that can fetch raw WHOIS text for a domain.
#[async_trait]
pub trait WhoisLookup: Send + Sync {
    /// Return the registry's raw WHOIS response for `domain`.
    async fn lookup(&self, domain: &str) -> Result<String, ExpiryCheckError>;
}

/// WHOIS client backed by the system's `whois` command.
///
/// The command follows registry referrals itself, so the client does not
/// need to know which server is authoritative for a TLD.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    /// Timeout for one WHOIS query
    timeout: Duration,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Create a new WHOIS client with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute the system whois command and collect its output.
    async fn execute_whois_command(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        let output = Command::new("whois")
            .arg(domain)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExpiryCheckError::lookup(
                    domain,
                    format!(
                        "Failed to execute whois command: {}. Make sure 'whois' is installed.",
                        e
                    ),
                )
            })?;

        let text = whois_output_text(domain, &output.stdout, &output.stderr)?;
        debug!(domain, bytes = text.len(), "whois response received");
        Ok(text)
    }
}

/// Turn captured `whois` output into response text.
///
/// whois exits non-zero for "no match" answers on some systems, so the exit
/// status is ignored; only an empty stdout is a failure, described by stderr.
fn whois_output_text(
    domain: &str,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<String, ExpiryCheckError> {
    let text = String::from_utf8_lossy(stdout).into_owned();
    if !text.trim().is_empty() {
        return Ok(text);
    }

    let stderr = String::from_utf8_lossy(stderr);
    let message = if stderr.trim().is_empty() {
        "whois returned no data".to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(ExpiryCheckError::lookup(domain, message))
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisLookup for WhoisClient {
    async fn lookup(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        match tokio::time::timeout(self.timeout, self.execute_whois_command(domain)).await {
            Ok(result) => result,
            Err(_) => Err(ExpiryCheckError::timeout(
                format!("WHOIS query for {}", domain),
                self.timeout,
            )),
        }
    }
}
