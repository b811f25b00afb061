use airlift_core::{DbError, GateError};
use thiserror::Error;

/// Errors raised while preparing, sending or receiving transfer items.
///
/// Every variant maps onto a stable machine code via [`TransferError::code`],
/// which is what logs and wire error envelopes carry.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The connection's authorization gate rejected the transfer.
    #[error("connection not allowed: {0}")]
    Rejected(#[from] GateError),

    /// The arrival site answered with a structured error envelope.
    #[error("{message} (remote code {code}, HTTP {status})")]
    Remote {
        code: String,
        message: String,
        status: u16,
    },

    /// The arrival site answered with something other than an error
    /// envelope.
    #[error("unexpected response (HTTP {status})")]
    ResponseFailed { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No item type is registered under this tag.
    #[error("unknown connection item type: {0}")]
    UnknownItemType(String),

    /// A raw item descriptor did not have the shape its type requires.
    #[error("invalid item: {0}")]
    BadItem(String),

    /// The item exists but can not be sent, e.g. a missing file.
    #[error("item can not be sent: {0}")]
    NotSendable(String),

    /// An export filter removed the item.
    #[error("this item can not be exported")]
    ExportFiltered,

    /// An import filter removed the item.
    #[error("this item can not be imported")]
    ImportFiltered,

    /// This site does not accept incoming transfers.
    #[error("arrivals are not enabled on this site")]
    ArrivalsDisallowed,

    /// The presented shared secret did not verify.
    #[error("the password is incorrect")]
    PasswordIncorrect,

    /// A required wire header was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Writing an imported file failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Applying an imported SQL script failed.
    #[error("sql import failed: {0}")]
    Sql(String),

    /// The caller cancelled the transfer.
    #[error("transfer aborted")]
    Aborted,

    /// The dependency walk exceeded its item ceiling.
    #[error("transfer walk exceeded {0} items")]
    ItemLimit(usize),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] airlift_core::Error),
}

impl TransferError {
    /// The stable machine code for this error.
    pub fn code(&self) -> String {
        match self {
            TransferError::Rejected(_) => "NOT_ALLOWED".into(),
            TransferError::Remote { code, .. } => code.clone(),
            TransferError::ResponseFailed { .. } => "HTTP_RESPONSE_FAILED".into(),
            TransferError::Http(_) => "HTTP_REQUEST_FAILED".into(),
            TransferError::UnknownItemType(_) => "UNKNOWN_CONNECTION_TYPE".into(),
            TransferError::BadItem(_) => "INVALID_ITEM".into(),
            TransferError::NotSendable(_) => "CANNOT_SEND".into(),
            TransferError::ExportFiltered => "EXPORT_FILTERED_OUT".into(),
            TransferError::ImportFiltered => "IMPORT_FILTERED_OUT".into(),
            TransferError::ArrivalsDisallowed => "ARRIVALS_DISALLOWED".into(),
            TransferError::PasswordIncorrect => "PASSWORD_INCORRECT".into(),
            TransferError::MissingHeader(_) => "MISSING_HEADER".into(),
            TransferError::WriteFailed(_) => "WRITE_FAILED".into(),
            TransferError::Sql(_) => "SQL_FAILED".into(),
            TransferError::Aborted => "ABORTED".into(),
            TransferError::ItemLimit(_) => "ITEM_LIMIT".into(),
            TransferError::Db(_) => "DATABASE_FAILED".into(),
            TransferError::Zip(_) => "ZIP_FAILED".into(),
            TransferError::Io(_) => "IO_FAILED".into(),
            TransferError::Json(_) => "BAD_JSON".into(),
            TransferError::Core(airlift_core::Error::InvalidPath(_)) => "INVALID_PATH".into(),
            TransferError::Core(_) => "INTERNAL".into(),
        }
    }

    /// The `{code, message}` envelope the wire protocol uses for errors.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

/// Result type for airlift-transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
