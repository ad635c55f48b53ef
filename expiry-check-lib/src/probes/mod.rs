//! Expiry probes.
//!
//! A probe turns one domain into a day count. The dispatcher only sees the
//! [`ExpiryProbe`] trait, so the registration and certificate probes share a
//! single unit-of-work body.

pub mod certificate;
pub mod registry;

pub use certificate::{certificate_expiry_days, CertificateExpiryProbe};
pub use registry::{registry_expiry_days, RegistryExpiryProbe};

use crate::error::ExpiryCheckError;
use crate::types::{CheckConfig, CheckMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A check that reports how many days remain before something expires.
#[async_trait]
pub trait ExpiryProbe: Send + Sync {
    /// The mode this probe implements.
    fn mode(&self) -> CheckMode;

    /// Whole days until expiry for `domain`; negative once expired.
    async fn days_remaining(&self, domain: &str) -> Result<i64, ExpiryCheckError>;
}

/// Build the single probe used for a run.
pub fn build_probe(mode: CheckMode, config: &CheckConfig) -> Arc<dyn ExpiryProbe> {
    match mode {
        CheckMode::Certificate => Arc::new(CertificateExpiryProbe::from_config(config)),
        CheckMode::Registration => Arc::new(RegistryExpiryProbe::from_config(config)),
    }
}

/// Round a fractional day count half away from zero (10.5 -> 11, -10.5 -> -11).
pub fn round_days(raw_days: f64) -> i64 {
    raw_days.round() as i64
}

/// Days from `now` until `expiry`, computed from the fractional hour
/// difference and rounded with [`round_days`].
pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let hours = (expiry - now).num_milliseconds() as f64 / 3_600_000.0;
    round_days(hours / 24.0)
}
