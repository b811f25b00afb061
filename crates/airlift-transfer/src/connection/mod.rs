//! Connections: where items go, and the walk that sends them.
//!
//! A connection either pushes items to a foreign site over HTTP or writes
//! them into a local zip bundle. Both modes share the same walk: top-level
//! items expand into dependencies, leaves get filtered and sent, and every
//! step lands in the transfer log.

pub mod http;
pub mod response;
pub mod zip;

pub use http::HttpConnection;
pub use response::TransferResponse;
pub use zip::ZipConnection;

use std::path::PathBuf;

use serde_json::json;

use airlift_core::{LogStatus, TransferLog};

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::hooks::Verdict;
use crate::item::ConnectionItem;

/// Ceiling on items visited in one walk; a symlink cycle or runaway tree
/// hits this instead of walking forever.
pub const MAX_WALK_ITEMS: usize = 100_000;

/// How items leave the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Push to a foreign site over HTTP.
    Push,
    /// Write a local zip bundle.
    Bundle,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Push => "push",
            ConnectionMode::Bundle => "bundle",
        }
    }
}

impl std::str::FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "push" => Ok(ConnectionMode::Push),
            "bundle" => Ok(ConnectionMode::Bundle),
            other => Err(format!("unknown connection mode: {other}")),
        }
    }
}

/// What closing a connection leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Pushes end without an artifact.
    None,
    /// The finished bundle.
    Archive(PathBuf),
}

/// Tally of one top-level item's walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub sent: usize,
    pub failed: usize,
    /// `CODE: message` of the first leaf failure, for the summary line.
    pub first_error: Option<String>,
}

impl TransferReport {
    fn record_failure(&mut self, err: &TransferError) {
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(format!("{}: {}", err.code(), err));
        }
    }
}

/// A live connection of either mode.
pub enum Connection {
    Http(HttpConnection),
    Zip(ZipConnection),
}

enum Step {
    Visit(ConnectionItem),
    Leave(ConnectionItem),
}

impl Connection {
    /// Opens a connection for the given mode.
    pub fn open(mode: ConnectionMode, ctx: &TransferContext, transfer_type: &str) -> Result<Self> {
        match mode {
            ConnectionMode::Push => Ok(Connection::Http(HttpConnection::new(ctx)?)),
            ConnectionMode::Bundle => Ok(Connection::Zip(ZipConnection::create(ctx, transfer_type)?)),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        match self {
            Connection::Http(_) => ConnectionMode::Push,
            Connection::Zip(_) => ConnectionMode::Bundle,
        }
    }

    /// The HTTP side, when this is a push connection.
    pub fn as_http(&self) -> Option<&HttpConnection> {
        match self {
            Connection::Http(http) => Some(http),
            Connection::Zip(_) => None,
        }
    }

    fn send(&mut self, item: &ConnectionItem, ctx: &TransferContext) -> Result<()> {
        match self {
            Connection::Http(http) => http.send_item(item, ctx),
            Connection::Zip(zip) => zip.add_item(item, ctx),
        }
    }

    fn record_empty_dir(&mut self, rel: &str) -> Result<()> {
        match self {
            // A push has nothing to record; the arrival tree grows from
            // the files themselves.
            Connection::Http(_) => Ok(()),
            Connection::Zip(zip) => zip.add_empty_dir(rel),
        }
    }

    /// Walks one top-level item and sends every leaf underneath it.
    ///
    /// Leaf failures are logged and tallied without stopping the walk.
    /// Cancellation and the item ceiling abort with an error; whatever was
    /// sent before stays sent.
    pub fn transfer(
        &mut self,
        item: ConnectionItem,
        ctx: &TransferContext,
        log: &mut TransferLog,
    ) -> Result<TransferReport> {
        let mut report = TransferReport::default();
        let mut walked = 0usize;
        let mut stack = vec![Step::Visit(item)];

        while let Some(step) = stack.pop() {
            if ctx.is_cancelled() {
                return Err(TransferError::Aborted);
            }

            match step {
                Step::Visit(item) => {
                    walked += 1;
                    if walked > MAX_WALK_ITEMS {
                        return Err(TransferError::ItemLimit(MAX_WALK_ITEMS));
                    }

                    match ctx.hooks.allow_export_item(&item, self.mode(), ctx) {
                        Verdict::Allow => {}
                        Verdict::Deny(denial) => {
                            let err = denial.unwrap_or(TransferError::ExportFiltered);
                            log.add(
                                leaf_entry_type(&item),
                                LogStatus::Failed,
                                json!({"target": item.label(), "code": err.code(), "message": err.to_string()}),
                            );
                            report.record_failure(&err);
                            continue;
                        }
                    }

                    if item.is_expandable(ctx) {
                        log.add("dir", LogStatus::Started, json!({"path": item.label()}));
                        let deps = item.dependencies(ctx)?;
                        if deps.is_empty() {
                            self.record_empty_dir(&item.label())?;
                            log.add("dir", LogStatus::Done, json!({"path": item.label()}));
                        } else {
                            stack.push(Step::Leave(item));
                            for dep in deps.into_iter().rev() {
                                stack.push(Step::Visit(dep));
                            }
                        }
                    } else {
                        self.send_leaf(item, ctx, log, &mut report);
                    }
                }
                Step::Leave(item) => {
                    log.add("dir", LogStatus::Done, json!({"path": item.label()}));
                }
            }
        }

        Ok(report)
    }

    fn send_leaf(
        &mut self,
        item: ConnectionItem,
        ctx: &TransferContext,
        log: &mut TransferLog,
        report: &mut TransferReport,
    ) {
        let entry_type = leaf_entry_type(&item);
        let label = item.label();

        if !item.can_send(ctx) {
            let err = TransferError::NotSendable(label.clone());
            log.add(
                entry_type,
                LogStatus::Failed,
                json!({"target": label, "code": err.code(), "message": err.to_string()}),
            );
            report.record_failure(&err);
            return;
        }

        match self.send(&item, ctx) {
            Ok(()) => {
                log.add(entry_type, LogStatus::Success, json!({"target": label}));
                report.sent += 1;
            }
            Err(err) => {
                log.add(
                    entry_type,
                    LogStatus::Failed,
                    json!({"target": label, "code": err.code(), "message": err.to_string()}),
                );
                report.record_failure(&err);
            }
        }
    }

    /// Closes the connection, finishing any bundle.
    pub fn close(&mut self) -> Result<CloseOutcome> {
        match self {
            Connection::Http(_) => Ok(CloseOutcome::None),
            Connection::Zip(zip) => Ok(CloseOutcome::Archive(zip.finish()?)),
        }
    }
}

fn leaf_entry_type(item: &ConnectionItem) -> &'static str {
    match item {
        ConnectionItem::File(_) => "file",
        ConnectionItem::Database(_) => "table",
    }
}
