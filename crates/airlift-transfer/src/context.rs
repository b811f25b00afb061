use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use airlift_core::{ContentRoot, SettingsStore, TableSource, TransferSettings};

use crate::hooks::HookSet;

/// Shared flag a caller sets to abort an in-flight transfer.
///
/// Checked before every worklist step and every top-level item; work that
/// already completed is never rolled back.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a transfer needs from its surroundings, threaded explicitly
/// instead of living in globals.
pub struct TransferContext<'a> {
    pub root: &'a ContentRoot,
    pub tables: &'a dyn TableSource,
    pub settings: &'a TransferSettings,
    pub store: &'a dyn SettingsStore,
    pub hooks: &'a HookSet,
    cancel: CancelFlag,
    privileged: bool,
}

impl<'a> TransferContext<'a> {
    pub fn new(
        root: &'a ContentRoot,
        tables: &'a dyn TableSource,
        settings: &'a TransferSettings,
        store: &'a dyn SettingsStore,
        hooks: &'a HookSet,
    ) -> Self {
        Self {
            root,
            tables,
            settings,
            store,
            hooks,
            cancel: CancelFlag::new(),
            privileged: true,
        }
    }

    /// Marks whether the requesting operator may start transfers at all.
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
