//! HTTP push transport.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::Method;

use crate::connection::response::TransferResponse;
use crate::context::TransferContext;
use crate::error::Result;
use crate::item::ConnectionItem;
use crate::protocol::{
    ServerInfo, API_PREFIX, HEADER_CONNECTION_ID, HEADER_ITEM_TYPE, HEADER_METHOD_OVERRIDE,
    HEADER_PASSWORD, ROUTE_CONNECTION, ROUTE_TRANSFER, TRANSFER_TIME_LIMIT, VERSION,
};

/// Length of the per-connection correlation id.
const CONNECTION_ID_LEN: usize = 12;

/// Pushes items to a foreign site over its transfer API.
///
/// Every request carries the shared secret and a correlation id minted when
/// the connection is built, so both sites' logs can be joined afterwards.
pub struct HttpConnection {
    address: String,
    api_base: String,
    password: String,
    connection_id: String,
    compat_verbs: bool,
    client: Client,
}

impl HttpConnection {
    pub fn new(ctx: &TransferContext) -> Result<Self> {
        let address = ctx.settings.foreign_address.clone();
        let api_base = format!("{}/{}", address.trim_end_matches('/'), API_PREFIX);
        let client = Client::builder()
            .timeout(TRANSFER_TIME_LIMIT)
            .user_agent(format!("Airlift/{VERSION}"))
            .build()?;

        Ok(Self {
            address,
            api_base,
            password: ctx.settings.foreign_password.clone(),
            connection_id: new_connection_id(),
            compat_verbs: ctx.settings.compat_verbs,
            client,
        })
    }

    /// The foreign address exactly as configured, for address checks.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.api_base, route)
    }

    fn request(
        &self,
        method: Method,
        route: &str,
        headers: Vec<(&'static str, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<TransferResponse> {
        // Some servers strip non-standard verbs; the compat setting sends
        // POST plus an override header instead.
        let (wire_method, override_verb) = if self.compat_verbs && is_downgraded_verb(&method) {
            (Method::POST, Some(method.as_str().to_string()))
        } else {
            (method, None)
        };

        let mut request = self
            .client
            .request(wire_method, self.url(route))
            .header(HEADER_PASSWORD, &self.password)
            .header(HEADER_CONNECTION_ID, &self.connection_id);
        if let Some(verb) = override_verb {
            request = request.header(HEADER_METHOD_OVERRIDE, verb);
        }
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        TransferResponse::from_blocking(request.send()?)
    }

    /// Calls the foreign handshake route and hands back the raw answer.
    pub fn handshake(&self) -> Result<TransferResponse> {
        self.request(Method::POST, ROUTE_CONNECTION, Vec::new(), None)
    }

    /// The foreign site's handshake payload. Missing fields come back as
    /// their defaults.
    pub fn foreign_info(&self) -> Result<ServerInfo> {
        let response = self.handshake()?.into_result()?;
        Ok(serde_json::from_str(response.body())?)
    }

    /// Pushes one item to the foreign transfer route.
    pub fn send_item(&self, item: &ConnectionItem, ctx: &TransferContext) -> Result<()> {
        let mut headers = vec![(HEADER_ITEM_TYPE, item.item_type().to_string())];
        headers.extend(item.headers(ctx));
        let body = item.body(ctx)?;

        self.request(Method::PATCH, ROUTE_TRANSFER, headers, Some(body))?
            .into_result()
            .map(|_| ())
    }
}

fn is_downgraded_verb(method: &Method) -> bool {
    [Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS].contains(method)
}

fn new_connection_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONNECTION_ID_LEN)
        .map(char::from)
        .collect()
}
