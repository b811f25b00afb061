//! Checkpoint filters and extra connection rules.
//!
//! Each checkpoint is an ordered list of functions invoked in registration
//! order. Filters answer with a [`Verdict`]; the first deny wins. The
//! standard set keeps the engine's own files and settings rows from ever
//! leaving or being overwritten by a transfer.

use std::path::Path;

use airlift_core::{RuleMessage, TableRow, SETTINGS_KEY_PREFIX};

use crate::connection::http::HttpConnection;
use crate::connection::ConnectionMode;
use crate::context::TransferContext;
use crate::error::TransferError;
use crate::item::ConnectionItem;

/// Answer from a checkpoint filter.
#[derive(Debug)]
pub enum Verdict {
    Allow,
    /// Deny, optionally with a specific error instead of the checkpoint's
    /// generic filtered-out error.
    Deny(Option<TransferError>),
}

impl Verdict {
    pub fn allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

pub type ItemFilter =
    Box<dyn Fn(&ConnectionItem, ConnectionMode, &TransferContext) -> Verdict + Send + Sync>;
pub type RowFilter = Box<dyn Fn(&TableRow, &str, &TransferContext) -> bool + Send + Sync>;
pub type ImportFilter = Box<dyn Fn(&Path, &TransferContext) -> Verdict + Send + Sync>;
pub type ConnectionRule =
    Box<dyn Fn(&HttpConnection, &TransferContext, &mut Vec<RuleMessage>) + Send + Sync>;

/// The checkpoint registry a transfer runs with.
#[derive(Default)]
pub struct HookSet {
    export_item: Vec<ItemFilter>,
    export_row: Vec<RowFilter>,
    import_file: Vec<ImportFilter>,
    allowed_rules: Vec<ConnectionRule>,
    warning_rules: Vec<ConnectionRule>,
}

impl HookSet {
    /// A registry with no filters at all, for callers composing their own.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard registry: protects the logs directory and configured
    /// paths from export, the engine's own settings rows from leaving the
    /// site, and blocklisted directories from being written on import.
    pub fn standard() -> Self {
        let mut hooks = Self::default();
        hooks.push_export_item_filter(Box::new(protect_own_files_on_export));
        hooks.push_export_row_filter(Box::new(protect_own_settings_rows));
        hooks.push_import_file_filter(Box::new(protect_dirs_on_import));
        hooks
    }

    pub fn push_export_item_filter(&mut self, filter: ItemFilter) {
        self.export_item.push(filter);
    }

    pub fn push_export_row_filter(&mut self, filter: RowFilter) {
        self.export_row.push(filter);
    }

    pub fn push_import_file_filter(&mut self, filter: ImportFilter) {
        self.import_file.push(filter);
    }

    pub fn push_allowed_rule(&mut self, rule: ConnectionRule) {
        self.allowed_rules.push(rule);
    }

    pub fn push_warning_rule(&mut self, rule: ConnectionRule) {
        self.warning_rules.push(rule);
    }

    /// Runs the export item checkpoint; the first deny wins.
    pub fn allow_export_item(
        &self,
        item: &ConnectionItem,
        mode: ConnectionMode,
        ctx: &TransferContext,
    ) -> Verdict {
        for filter in &self.export_item {
            let verdict = filter(item, mode, ctx);
            if !verdict.allowed() {
                return verdict;
            }
        }
        Verdict::Allow
    }

    /// Runs the export row checkpoint. Vetoed rows are dropped silently.
    pub fn allow_export_row(&self, row: &TableRow, table: &str, ctx: &TransferContext) -> bool {
        self.export_row.iter().all(|filter| filter(row, table, ctx))
    }

    /// Runs the import file checkpoint; the first deny wins.
    pub fn allow_import_file(&self, path: &Path, ctx: &TransferContext) -> Verdict {
        for filter in &self.import_file {
            let verdict = filter(path, ctx);
            if !verdict.allowed() {
                return verdict;
            }
        }
        Verdict::Allow
    }

    pub(crate) fn extra_allowed_rules(&self) -> &[ConnectionRule] {
        &self.allowed_rules
    }

    pub(crate) fn extra_warning_rules(&self) -> &[ConnectionRule] {
        &self.warning_rules
    }
}

fn protect_own_files_on_export(
    item: &ConnectionItem,
    _mode: ConnectionMode,
    ctx: &TransferContext,
) -> Verdict {
    let ConnectionItem::File(file) = item else {
        return Verdict::Allow;
    };

    let abs = match ctx.root.resolve(file.rel_path()) {
        Ok(abs) => abs,
        Err(e) => return Verdict::Deny(Some(TransferError::Core(e))),
    };

    if abs.starts_with(&ctx.settings.logs_dir) {
        return Verdict::Deny(None);
    }
    for protected in &ctx.settings.protected_export_paths {
        if abs.starts_with(protected) {
            return Verdict::Deny(None);
        }
    }

    Verdict::Allow
}

fn protect_own_settings_rows(row: &TableRow, table: &str, ctx: &TransferContext) -> bool {
    let options_table = format!("{}options", ctx.settings.site.table_prefix);
    if table != options_table {
        return true;
    }

    match row.get("option_name") {
        Some(name) => !name.starts_with(SETTINGS_KEY_PREFIX),
        None => true,
    }
}

fn protect_dirs_on_import(path: &Path, ctx: &TransferContext) -> Verdict {
    if path.starts_with(&ctx.settings.logs_dir) {
        return Verdict::Deny(None);
    }
    for blocked in &ctx.settings.blocklist_import_dirs {
        if path.starts_with(blocked) {
            return Verdict::Deny(None);
        }
    }
    Verdict::Allow
}
