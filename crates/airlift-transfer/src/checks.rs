//! Departure-side connection checks.
//!
//! Two pipelines run before a push leaves the site. The authorization
//! pipeline decides whether the transfer may happen at all; if any of its
//! messages fails, the connection is refused. The warning pipeline compares
//! the two sites and annotates the transfer without blocking it.
//!
//! Both are staged: once a prerequisite fails there is no point probing
//! further, so the built-in stage stops early. Rules registered through the
//! checkpoint registry always run afterwards.

use semver::Version;
use serde_json::json;

use airlift_core::RuleMessage;

use crate::connection::http::HttpConnection;
use crate::connection::response::TransferResponse;
use crate::context::TransferContext;
use crate::protocol::{ServerInfo, VERSION};

/// Minimum runtime version the engine supports.
pub const MIN_RUNTIME_VERSION: &str = "8.0.0";
/// Minimum platform version the engine supports.
pub const MIN_PLATFORM_VERSION: &str = "5.0.0";

/// Runs the authorization pipeline for a connection.
///
/// The result always contains every rule that was evaluated, passed or
/// failed, so callers can render the whole checklist.
pub fn connection_allowed(
    connection: &HttpConnection,
    ctx: &TransferContext,
) -> Vec<RuleMessage> {
    let mut messages = Vec::new();
    built_in_allowed(connection, ctx, &mut messages);
    for rule in ctx.hooks.extra_allowed_rules() {
        rule(connection, ctx, &mut messages);
    }
    messages
}

/// Runs the warning pipeline for a connection.
pub fn connection_warnings(
    connection: &HttpConnection,
    ctx: &TransferContext,
) -> Vec<RuleMessage> {
    let mut messages = Vec::new();
    built_in_warnings(connection, ctx, &mut messages);
    for rule in ctx.hooks.extra_warning_rules() {
        rule(connection, ctx, &mut messages);
    }
    messages
}

fn built_in_allowed(
    connection: &HttpConnection,
    ctx: &TransferContext,
    messages: &mut Vec<RuleMessage>,
) {
    let privileged = ctx.privileged();
    messages.push(RuleMessage::new(
        "MISSING_PERMISSIONS",
        privileged,
        "User permission check passed.",
        "User must have the correct permissions.",
    ));
    if !privileged {
        return;
    }

    let parsed = reqwest::Url::parse(connection.address());
    let is_valid_url = parsed.is_ok();
    messages.push(RuleMessage::new(
        "URL_INVALID",
        is_valid_url,
        "Connection address is a valid URL.",
        "Connection address must be a valid URL.",
    ));
    let Ok(url) = parsed else {
        return;
    };

    if ctx.settings.require_https {
        let is_https = url.scheme() == "https";
        messages.push(RuleMessage::new(
            "URL_NOT_HTTPS",
            is_https,
            "Connection address is HTTPS.",
            "Connection address must be over HTTPS.",
        ));
        if !is_https {
            return;
        }
    }

    // An unreachable host reads like an empty non-JSON answer, the same
    // as a site with no transfer API.
    let response = connection
        .handshake()
        .unwrap_or_else(|_| TransferResponse::from_parts(0, ""));
    let data = json!({
        "status": response.status(),
        "body": response.body_json().unwrap_or_else(|| json!(response.body_preview())),
    });

    if response.ok() {
        messages.push(
            RuleMessage::new(
                "CONNECTION_REFUSED",
                true,
                "Connection established!",
                "",
            )
            .with_data(data),
        );
    } else {
        let cause = if !response.is_body_json() {
            "Transfer API not found. Check the address points to a site installation."
        } else if response.status() == 404 {
            "Airlift is either not installed or not active."
        } else if response
            .body_json()
            .map(|json| json.get("message").is_some())
            .unwrap_or(false)
        {
            "Authentication failed. Ensure arrivals are enabled and the password is correct."
        } else {
            "An unknown error occurred."
        };
        messages.push(RuleMessage::new("CONNECTION_REFUSED", false, "", cause).with_data(data));
    }
}

fn built_in_warnings(
    connection: &HttpConnection,
    ctx: &TransferContext,
    messages: &mut Vec<RuleMessage>,
) {
    let site = &ctx.settings.site;

    messages.push(RuleMessage::new(
        "RUNTIME_VERSION",
        meets_minimum(&site.runtime_version, MIN_RUNTIME_VERSION),
        "Your system meets the minimum required runtime version.",
        "Your system does not meet the minimum required runtime version.",
    ));

    messages.push(RuleMessage::new(
        "PLATFORM_VERSION",
        meets_minimum(&site.platform_version, MIN_PLATFORM_VERSION),
        "Your installation has the minimum required platform version.",
        "Your installation does not meet the minimum required platform version.",
    ));

    messages.push(RuleMessage::new(
        "LOCAL_MULTISITE",
        !site.is_multisite,
        "Multisite is not enabled.",
        "Multisite is not currently supported, you may experience unexpected behaviour.",
    ));

    let response = connection
        .handshake()
        .unwrap_or_else(|_| TransferResponse::from_parts(0, ""));
    if !response.ok() || !response.is_body_json() {
        messages.push(RuleMessage::new(
            "CONNECTION_FAILED",
            false,
            "",
            "Connection could not be established.",
        ));
        return;
    }

    let foreign: ServerInfo = serde_json::from_str(response.body()).unwrap_or_default();

    messages.push(RuleMessage::new(
        "TABLE_PREFIX_MATCH",
        site.table_prefix == foreign.table_prefix,
        "The table prefix matches across the sites.",
        "The table prefix is not the same on the arrival and departure sites.",
    ));

    messages.push(RuleMessage::new(
        "RUNTIME_VERSIONS_MATCH",
        site.runtime_version == foreign.runtime_version,
        "Runtime versions on the arrival and departure sites match.",
        "Runtime versions on the arrival and departure sites do not match.",
    ));

    messages.push(RuleMessage::new(
        "PLATFORM_VERSIONS_MATCH",
        site.platform_version == foreign.platform_version,
        "Platform versions on the arrival and departure sites match.",
        "Platform versions on the arrival and departure sites do not match.",
    ));

    messages.push(RuleMessage::new(
        "TOOL_VERSIONS_MATCH",
        VERSION == foreign.airlift_version,
        "Airlift versions on the arrival and departure sites match.",
        "Airlift versions on the arrival and departure sites do not match.",
    ));

    messages.push(RuleMessage::new(
        "REMOTE_MULTISITE",
        !foreign.is_multisite,
        "The arrival site does not use multisite.",
        "The arrival site uses multisite, which is not currently supported.",
    ));
}

/// Parses a version loosely: surplus text after the numeric core is cut,
/// missing components count as zero, so "8.1" compares like "8.1.0".
fn loose_version(value: &str) -> Option<Version> {
    let trimmed = value.trim();
    let numeric = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map_or(trimmed, |end| &trimmed[..end]);

    let mut parts = numeric.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

fn meets_minimum(version: &str, minimum: &str) -> bool {
    match (loose_version(version), loose_version(minimum)) {
        (Some(actual), Some(floor)) => actual >= floor,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_version_pads_and_trims() {
        assert_eq!(loose_version("8.1"), Some(Version::new(8, 1, 0)));
        assert_eq!(loose_version("8.1.27-dev"), Some(Version::new(8, 1, 27)));
        assert_eq!(loose_version(" 10 "), Some(Version::new(10, 0, 0)));
        assert_eq!(loose_version(""), None);
        assert_eq!(loose_version("dev"), None);
    }

    #[test]
    fn test_meets_minimum() {
        assert!(meets_minimum("8.0.0", MIN_RUNTIME_VERSION));
        assert!(meets_minimum("8.2", MIN_RUNTIME_VERSION));
        assert!(!meets_minimum("7.4.33", MIN_RUNTIME_VERSION));
        assert!(!meets_minimum("", MIN_RUNTIME_VERSION));
    }
}
