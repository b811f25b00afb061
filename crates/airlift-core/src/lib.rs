//! # airlift-core
//!
//! Core primitives for the airlift site-to-site transfer engine.
//!
//! This crate provides:
//! - Rule messages and aggregate gate evaluation
//! - The NDJSON transfer log (live stream + persisted file, listing)
//! - Jailed access to the site content directory
//! - The table-source seam database items run against
//! - TOML settings, the persisted settings-store seam and secret hashing
//!
//! ## Example
//!
//! ```ignore
//! use airlift_core::{LogMeta, LogStatus, TransferLog};
//!
//! let mut log = TransferLog::new(TransferLog::departure_name("file"), LogMeta::new());
//! log.persist_to("airlift-logs".as_ref())?;
//! log.add("file", LogStatus::Success, serde_json::json!({"name": "a.txt"}));
//! ```

mod db;
mod error;
mod fs;
mod log;
mod rule;
mod settings;

pub use db::{DbError, DbResult, MemoryTables, TableRow, TableSnapshot, TableSource};
pub use error::{Error, Result};
pub use fs::ContentRoot;
pub use rule::{all, any, failures_to_error, GateError, RuleFailure, RuleMessage};
pub use settings::{
    hash_shared_secret, restore_settings, snapshot_settings, verify_shared_secret, MemorySettings,
    NotifyAudience, SettingsStore, SiteProfile, TransferSettings, ValueRewrite,
    SETTINGS_KEY_PREFIX,
};

pub use crate::log::{
    list_log_files, page_log_files, LogEntry, LogFileInfo, LogMeta, LogStatus, TransferLog,
};
