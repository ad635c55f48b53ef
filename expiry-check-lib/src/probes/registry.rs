//! Registration expiry from WHOIS.

use super::{days_until, ExpiryProbe};
use crate::error::ExpiryCheckError;
use crate::protocols::{WhoisClient, WhoisLookup};
use crate::types::{CheckConfig, CheckMode};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::instrument;

/// Label of the WHOIS field carrying the registry expiry date.
pub const REGISTRY_EXPIRY_FIELD: &str = "Registry Expiry Date";

lazy_static::lazy_static! {
    static ref REGISTRY_EXPIRY_PATTERN: Regex =
        Regex::new(r"Registry Expiry Date:\s*(\d+-\d+-\d+)")
            .expect("registry expiry pattern is a valid regex");
}

/// Probe measuring how long a domain's registration has left.
#[derive(Debug, Clone)]
pub struct RegistryExpiryProbe<W = WhoisClient> {
    whois: W,
}

impl<W: WhoisLookup> RegistryExpiryProbe<W> {
    pub fn new(whois: W) -> Self {
        Self { whois }
    }
}

impl RegistryExpiryProbe<WhoisClient> {
    /// Probe backed by the system whois command.
    pub fn from_config(config: &CheckConfig) -> Self {
        Self::new(WhoisClient::with_timeout(config.whois_timeout))
    }
}

#[async_trait]
impl<W: WhoisLookup> ExpiryProbe for RegistryExpiryProbe<W> {
    fn mode(&self) -> CheckMode {
        CheckMode::Registration
    }

    #[instrument(skip(self), level = "debug")]
    async fn days_remaining(&self, domain: &str) -> Result<i64, ExpiryCheckError> {
        let text = self.whois.lookup(domain).await.map_err(|e| match e {
            ExpiryCheckError::LookupError { .. } => e,
            other => ExpiryCheckError::lookup(domain, other.to_string()),
        })?;

        registry_expiry_days(domain, &text, Utc::now())
    }
}

/// Extract the registry expiry date from WHOIS text and count the days
/// remaining from `now`.
///
/// Text without the expiry field means the domain is not registered. A field
/// whose value is not a `YYYY-MM-DD` date is a lookup error.
pub fn registry_expiry_days(
    domain: &str,
    whois_text: &str,
    now: DateTime<Utc>,
) -> Result<i64, ExpiryCheckError> {
    if !whois_text.contains(REGISTRY_EXPIRY_FIELD) {
        return Err(ExpiryCheckError::not_registered(domain));
    }

    let raw_date = REGISTRY_EXPIRY_PATTERN
        .captures(whois_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ExpiryCheckError::lookup(domain, "Registry expiry field has no YYYY-MM-DD value")
        })?;

    let expiry = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .map_err(|e| {
            ExpiryCheckError::lookup(
                domain,
                format!("Invalid registry expiry date '{}': {}", raw_date, e),
            )
        })?
        .and_time(NaiveTime::MIN)
        .and_utc();

    Ok(days_until(expiry, now))
}
