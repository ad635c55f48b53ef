//! Protocol clients the probes are built on.
//!
//! Each client sits behind a small trait so the probes can be exercised with
//! canned responses instead of live registries and servers.

/// WHOIS protocol implementation
pub mod whois;

/// TLS handshake implementation
pub mod tls;

// Re-export commonly used functions and types
pub use tls::{RustlsHandshaker, TlsHandshake};
pub use whois::{WhoisClient, WhoisLookup};
