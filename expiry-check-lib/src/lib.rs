//! # Expiry Check Library
//!
//! Checks how many days remain before a domain's registration or its TLS
//! certificate expires, for a whole list of domains at once.
//!
//! A run picks one [`CheckMode`], builds the matching [`ExpiryProbe`], and
//! hands it to a [`WorkDispatcher`] together with a [`ResultReporter`] and an
//! input source. The dispatcher reads one domain per line and keeps at most
//! `threads` probes in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use expiry_check_lib::{build_probe, CheckConfig, CheckMode, CollectingReporter, WorkDispatcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckConfig::default().with_threads(4);
//!     let probe = build_probe(CheckMode::Certificate, &config);
//!     let reporter = Arc::new(CollectingReporter::new());
//!
//!     let input: &[u8] = b"example.com\nexample.org\n";
//!     WorkDispatcher::new(probe, reporter.clone(), config.threads)?
//!         .run(input)
//!         .await?;
//!
//!     for result in reporter.results() {
//!         println!("{}: {:?}", result.domain, result.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Registration expiry**: `Registry Expiry Date` read from WHOIS
//! - **Certificate expiry**: leaf `NotAfter` read from a TLS handshake
//! - **Bounded concurrency**: back-pressure on the reader, never on workers
//! - **Configurable**: TOML files and `EC_*` environment variables

// Re-export main public API types and functions
// This makes them available as expiry_check_lib::TypeName
pub use concurrent::{CompletionBarrier, ConcurrencyBudget};
pub use config::{
    load_env_config, parse_timeout_string, validate_threads, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig,
};
pub use dispatcher::{DispatchSummary, InputPolicy, StopReason, WorkDispatcher};
pub use error::ExpiryCheckError;
pub use probes::{build_probe, CertificateExpiryProbe, ExpiryProbe, RegistryExpiryProbe};
pub use protocols::{RustlsHandshaker, TlsHandshake, WhoisClient, WhoisLookup};
pub use reporter::{ChannelReporter, CollectingReporter, ResultReporter};
pub use types::{CheckConfig, CheckMode, ProbeOutcome, ProbeResult};
pub use validation::{is_valid_domain, probe_host};

pub mod concurrent;
pub mod dispatcher;
pub mod probes;
pub mod protocols;
pub mod reporter;
pub mod validation;

// Internal modules - their public items are re-exported above
mod config;
mod error;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ExpiryCheckError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
