//! Domain name syntax checks.
//!
//! The dispatcher uses [`is_valid_domain`] to decide whether an input line is
//! something worth probing. No lookups happen here.

use regex::Regex;

lazy_static::lazy_static! {
    // optional scheme, dotted labels (1-63 chars, no edge hyphens),
    // 2-6 letter TLD, optional trailing slash
    static ref DOMAIN_PATTERN: Regex = Regex::new(
        r"^(?:https?://)?(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,6}/?$"
    )
    .expect("domain pattern is a valid regex");
}

/// Check whether a string is a plausible domain name.
///
/// Accepts `example.com`, `sub.example.co.uk`, `https://example.com` and
/// `example.com/`. Rejects empty strings, doubled schemes, labels longer than
/// 63 characters or starting/ending with a hyphen, and TLDs outside 2-6
/// letters.
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_PATTERN.is_match(domain)
}

/// Reduce a validated entry to the bare host the probes connect to.
///
/// Strips one leading `http://` or `https://` and a trailing `/`.
pub fn probe_host(entry: &str) -> &str {
    let host = entry
        .strip_prefix("https://")
        .or_else(|| entry.strip_prefix("http://"))
        .unwrap_or(entry);
    host.strip_suffix('/').unwrap_or(host)
}
