//! Uniform view of what the arrival site answered.

use serde_json::Value;

use crate::error::{Result, TransferError};

/// Bytes of a foreign body kept for diagnostics and log lines.
const BODY_PREVIEW_LIMIT: usize = 1024;

/// Outcome of one request to the arrival site.
///
/// Rule pipelines inspect the status and body to phrase their verdicts;
/// transports use [`TransferResponse::into_result`] to turn error answers
/// into typed errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    status: u16,
    body: String,
}

impl TransferResponse {
    pub fn from_parts(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Drains a blocking response into status and body text.
    pub fn from_blocking(response: reqwest::blocking::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Self { status, body })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the answer counts as success. Only a plain 200 does.
    pub fn ok(&self) -> bool {
        self.status == 200
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_body_json(&self) -> bool {
        serde_json::from_str::<Value>(&self.body).is_ok()
    }

    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// The body clipped to a safe length for messages, on a character
    /// boundary.
    pub fn body_preview(&self) -> &str {
        if self.body.len() <= BODY_PREVIEW_LIMIT {
            return &self.body;
        }
        let mut end = BODY_PREVIEW_LIMIT;
        while !self.body.is_char_boundary(end) {
            end -= 1;
        }
        &self.body[..end]
    }

    /// Success, or the error this answer stands for.
    ///
    /// A non-success answer carrying a `{code, message}` envelope becomes
    /// that remote error; any other non-success answer becomes a response
    /// failure with the clipped body.
    pub fn into_result(self) -> Result<TransferResponse> {
        if self.ok() {
            return Ok(self);
        }

        if let Some(json) = self.body_json() {
            let code = json.get("code").and_then(Value::as_str);
            let message = json.get("message").and_then(Value::as_str);
            if let (Some(code), Some(message)) = (code, message) {
                return Err(TransferError::Remote {
                    code: code.to_string(),
                    message: message.to_string(),
                    status: self.status,
                });
            }
        }

        Err(TransferError::ResponseFailed {
            status: self.status,
            body: self.body_preview().to_string(),
        })
    }
}
