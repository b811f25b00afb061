use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Outcome of a single connection rule.
///
/// A rule reports a stable machine code, whether it passed, and a
/// human-readable message chosen at construction time from the pass/fail
/// templates. Evaluating a rule list never mutates its messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleMessage {
    code: String,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl RuleMessage {
    /// Creates a rule message, resolving the stored message from `success`.
    pub fn new(
        code: impl Into<String>,
        success: bool,
        pass_message: impl Into<String>,
        fail_message: impl Into<String>,
    ) -> Self {
        let message = if success {
            pass_message.into()
        } else {
            fail_message.into()
        };

        Self {
            code: code.into(),
            success,
            message,
            data: None,
        }
    }

    /// Attaches structured data to the message.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The stable machine code for this rule.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether the rule passed.
    pub fn passed(&self) -> bool {
        self.success
    }

    /// The resolved human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured data attached to the message, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

/// True when every message in the list passed. An empty list passes.
pub fn all(messages: &[RuleMessage]) -> bool {
    messages.iter().all(RuleMessage::passed)
}

/// True when at least one message in the list passed. An empty list fails.
pub fn any(messages: &[RuleMessage]) -> bool {
    messages.iter().any(RuleMessage::passed)
}

/// One failed rule inside a [`GateError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFailure {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Every failure from a rule pipeline, aggregated into one error.
#[derive(Debug, Clone, Error)]
#[error("{}", format_failures(failures))]
pub struct GateError {
    failures: Vec<RuleFailure>,
}

impl GateError {
    /// The individual rule failures, in pipeline order.
    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    /// The machine codes of the failed rules, in pipeline order.
    pub fn codes(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.code.as_str()).collect()
    }
}

fn format_failures(failures: &[RuleFailure]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|f| format!("{}: {}", f.code, f.message))
        .collect();
    parts.join("; ")
}

/// Collapses a rule list into `Ok(())` when everything passed, or a
/// [`GateError`] carrying every failed message.
pub fn failures_to_error(messages: &[RuleMessage]) -> std::result::Result<(), GateError> {
    let failures: Vec<RuleFailure> = messages
        .iter()
        .filter(|m| !m.passed())
        .map(|m| RuleFailure {
            code: m.code().to_string(),
            message: m.message().to_string(),
            data: m.data().cloned(),
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(GateError { failures })
    }
}
