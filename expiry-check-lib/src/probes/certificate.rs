//! TLS certificate expiry.
//!
//! The probe reports when the presented leaf certificate stops being valid,
//! whether or not the chain is trusted. An already-expired certificate is a
//! result (a negative day count), not an error.

use super::{days_until, ExpiryProbe};
use crate::error::ExpiryCheckError;
use crate::protocols::{RustlsHandshaker, TlsHandshake};
use crate::types::{CheckConfig, CheckMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls_pki_types::CertificateDer;
use std::time::Duration;
use tracing::instrument;
use x509_parser::prelude::*;

/// Standard HTTPS port.
pub const HTTPS_PORT: u16 = 443;

/// Probe measuring how long the certificate served by a domain has left.
#[derive(Debug, Clone)]
pub struct CertificateExpiryProbe<T = RustlsHandshaker> {
    handshaker: T,
    port: u16,
    timeout: Duration,
}

impl<T: TlsHandshake> CertificateExpiryProbe<T> {
    /// Probe on port 443 with a 5 second connection timeout.
    pub fn new(handshaker: T) -> Self {
        Self {
            handshaker,
            port: HTTPS_PORT,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CertificateExpiryProbe<RustlsHandshaker> {
    /// Probe backed by rustls.
    pub fn from_config(config: &CheckConfig) -> Self {
        Self::new(RustlsHandshaker::new())
            .with_port(config.port)
            .with_timeout(config.tls_timeout)
    }
}

#[async_trait]
impl<T: TlsHandshake> ExpiryProbe for CertificateExpiryProbe<T> {
    fn mode(&self) -> CheckMode {
        CheckMode::Certificate
    }

    #[instrument(skip(self), level = "debug")]
    async fn days_remaining(&self, domain: &str) -> Result<i64, ExpiryCheckError> {
        // chain validation skipped: the expiry is reported even for
        // untrusted or mismatched certificates
        let chain = self
            .handshaker
            .handshake(domain, self.port, self.timeout, true)
            .await
            .map_err(|e| match e {
                ExpiryCheckError::ConnectionError { .. } => e,
                other => ExpiryCheckError::connection(domain, other.to_string()),
            })?;

        certificate_expiry_days(domain, &chain, Utc::now())
    }
}

/// Read `NotAfter` from the leaf (first) certificate of `chain`.
pub fn leaf_not_after(
    domain: &str,
    chain: &[CertificateDer<'_>],
) -> Result<DateTime<Utc>, ExpiryCheckError> {
    let leaf = chain
        .first()
        .ok_or_else(|| ExpiryCheckError::connection(domain, "Server presented no certificate"))?;

    let (_, certificate) = X509Certificate::from_der(leaf.as_ref()).map_err(|e| {
        ExpiryCheckError::connection(domain, format!("Unparseable leaf certificate: {}", e))
    })?;

    let timestamp = certificate.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        ExpiryCheckError::connection(
            domain,
            format!("Certificate NotAfter out of range: {}", timestamp),
        )
    })
}

/// Days from `now` until the leaf certificate of `chain` expires.
pub fn certificate_expiry_days(
    domain: &str,
    chain: &[CertificateDer<'_>],
    now: DateTime<Utc>,
) -> Result<i64, ExpiryCheckError> {
    let not_after = leaf_not_after(domain, chain)?;
    Ok(days_until(not_after, now))
}
