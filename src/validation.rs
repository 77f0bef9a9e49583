//! Callback URL validation for subscription endpoints.
//!
//! Validates remote callback URLs against:
//! - Syntax (absolute HTTP/HTTPS URL with a host)
//! - Private/internal destinations (loopback, RFC1918, link-local,
//!   cloud metadata endpoints)
//!
//! The domain blocklist is a separate, injected collaborator consulted by
//! the subscribe service after these checks pass.

use std::net::IpAddr;

use crate::error::SubscriptionError;

/// Validate a callback URL and return its host.
///
/// Checks, in order:
/// 1. URL parses as an absolute URL
/// 2. Scheme is HTTP or HTTPS
/// 3. URL has a host
/// 4. Host is not a private/internal address (unless `allow_internal`,
///    used by tests that point callbacks at local mock servers)
pub fn validate_callback_url(
    url: &str,
    allow_internal: bool,
) -> Result<String, SubscriptionError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| SubscriptionError::InvalidCallback(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(SubscriptionError::InvalidCallback(format!(
                "unsupported scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| SubscriptionError::InvalidCallback("URL has no host".to_string()))?;

    if !allow_internal {
        validate_host_not_internal(host)?;
    }

    Ok(host.to_string())
}

/// Validate that a host is not a private/internal address.
///
/// Blocks:
/// - Loopback addresses (127.0.0.0/8)
/// - Private networks (10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16)
/// - Link-local (169.254.0.0/16, covers cloud metadata endpoints)
/// - CGNAT (100.64.0.0/10)
/// - IPv6 loopback and unspecified
/// - Internal hostnames (localhost, *.internal, *.local)
pub fn validate_host_not_internal(host: &str) -> Result<(), SubscriptionError> {
    // Url keeps the brackets on IPv6 literals
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(SubscriptionError::InvalidCallback(format!(
                "host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(SubscriptionError::InvalidCallback(format!(
            "host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10 (CGNAT)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
