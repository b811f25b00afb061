//! File items.

use serde_json::Value;

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::hooks::Verdict;
use crate::protocol::{ArrivalRequest, HEADER_PATH};

/// A file under the content root, addressed by forward-slash relative path.
///
/// The same type stands for directories; a directory can not be sent itself
/// but expands into child items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    rel: String,
}

impl FileItem {
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }

    pub(crate) fn from_raw(raw: &Value) -> Result<Self> {
        match raw {
            Value::String(rel) => Ok(Self::new(rel.clone())),
            _ => Err(TransferError::BadItem(
                "file item descriptor must be a relative path string".into(),
            )),
        }
    }

    pub fn rel_path(&self) -> &str {
        &self.rel
    }

    pub fn can_send(&self, ctx: &TransferContext) -> bool {
        ctx.root.exists(&self.rel) && !ctx.root.is_dir(&self.rel)
    }

    pub fn is_dir(&self, ctx: &TransferContext) -> bool {
        ctx.root.is_dir(&self.rel)
    }

    /// Direct children as file items, directories included.
    pub fn children(&self, ctx: &TransferContext) -> Result<Vec<FileItem>> {
        let rels = ctx.root.children(&self.rel)?;
        Ok(rels.into_iter().map(FileItem::new).collect())
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![(HEADER_PATH, self.rel.clone())]
    }

    pub fn body(&self, ctx: &TransferContext) -> Result<Vec<u8>> {
        Ok(ctx.root.read(&self.rel)?)
    }

    /// Arrival side: writes the transported bytes under the local content
    /// root, subject to the import checkpoint.
    pub fn import(request: &ArrivalRequest, ctx: &TransferContext) -> Result<()> {
        let rel = request.require_header(HEADER_PATH)?;
        let abs = ctx.root.resolve(rel)?;

        match ctx.hooks.allow_import_file(&abs, ctx) {
            Verdict::Allow => {}
            Verdict::Deny(Some(err)) => return Err(err),
            Verdict::Deny(None) => return Err(TransferError::ImportFiltered),
        }

        ctx.root
            .write_creating_parents(rel, request.body())
            .map_err(|e| TransferError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
