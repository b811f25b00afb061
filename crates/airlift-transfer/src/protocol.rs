//! Wire-level constants and payloads shared by both ends of a connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use airlift_core::{verify_shared_secret, TransferSettings};

use crate::context::TransferContext;
use crate::error::{Result, TransferError};

/// Version advertised in handshakes and user agents.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Route prefix appended to the arrival site's address.
pub const API_PREFIX: &str = "airlift/v1";

/// Handshake route, relative to [`API_PREFIX`].
pub const ROUTE_CONNECTION: &str = "connection";

/// Item transfer route, relative to [`API_PREFIX`].
pub const ROUTE_TRANSFER: &str = "transfer";

/// Upper bound on the duration of one transfer request.
pub const TRANSFER_TIME_LIMIT: Duration = Duration::from_secs(500);

pub const HEADER_PASSWORD: &str = "X-Airlift-Password";
pub const HEADER_CONNECTION_ID: &str = "X-Airlift-Connection";
pub const HEADER_ITEM_TYPE: &str = "X-Airlift-Item-Type";
pub const HEADER_METHOD_OVERRIDE: &str = "X-Airlift-Method-Override";
pub const HEADER_PATH: &str = "X-Airlift-Path";
pub const HEADER_TABLE: &str = "X-Airlift-Table";
pub const HEADER_PREFIX: &str = "X-Airlift-Prefix";

/// Handshake payload describing one side of a connection.
///
/// Unknown or missing fields deserialize to their defaults, so sites
/// running different versions can still compare what they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub runtime_version: String,
    pub platform_version: String,
    pub airlift_version: String,
    pub is_multisite: bool,
    pub table_prefix: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            runtime_version: String::new(),
            platform_version: String::new(),
            airlift_version: String::new(),
            is_multisite: false,
            table_prefix: String::new(),
        }
    }
}

impl ServerInfo {
    /// The payload this site serves from its handshake route.
    pub fn local(settings: &TransferSettings) -> Self {
        Self {
            runtime_version: settings.site.runtime_version.clone(),
            platform_version: settings.site.platform_version.clone(),
            airlift_version: VERSION.to_string(),
            is_multisite: settings.site.is_multisite,
            table_prefix: settings.site.table_prefix.clone(),
        }
    }
}

/// One incoming transfer request, decoupled from any HTTP server layer.
#[derive(Debug, Clone, Default)]
pub struct ArrivalRequest {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ArrivalRequest {
    pub fn new(headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn require_header(&self, name: &'static str) -> Result<&str> {
        self.header(name)
            .ok_or(TransferError::MissingHeader(name))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Gate for every incoming request: arrivals must be enabled here, and the
/// presented secret must verify against the stored hash.
pub fn authorize_arrival(request: &ArrivalRequest, ctx: &TransferContext) -> Result<()> {
    if !ctx.settings.allow_arrivals {
        return Err(TransferError::ArrivalsDisallowed);
    }

    let presented = request
        .header(HEADER_PASSWORD)
        .ok_or(TransferError::PasswordIncorrect)?;
    if !verify_shared_secret(presented, &ctx.settings.arrival_password_hash) {
        return Err(TransferError::PasswordIncorrect);
    }

    Ok(())
}
