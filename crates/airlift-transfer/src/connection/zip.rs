//! Local bundle transport writing a zip archive instead of pushing.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::item::ConnectionItem;

/// Directory inside the archive holding table scripts.
const DATABASE_ENTRY_DIR: &str = "database";

/// Writes transfer items into a local zip archive.
///
/// File items keep their relative paths as entry names; table items land
/// under `database/<table>.sql`. Entries are stored uncompressed.
pub struct ZipConnection {
    path: PathBuf,
    writer: Option<ZipWriter<File>>,
}

impl ZipConnection {
    /// Creates the archive file up front so a bad bundle directory fails
    /// before any item work starts.
    pub fn create(ctx: &TransferContext, transfer_type: &str) -> Result<Self> {
        let name = format!(
            "airlift-bundle-{}-{}.zip",
            transfer_type,
            Utc::now().format("%Y-%m-%d-%H-%M-%S")
        );
        let path = ctx.settings.bundle_dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = ZipWriter::new(File::create(&path)?);

        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer_mut(&mut self) -> Result<&mut ZipWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| TransferError::WriteFailed("bundle is already closed".into()))
    }

    fn options() -> FileOptions<'static, ()> {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    }

    /// Adds one item's payload under its entry name.
    pub fn add_item(&mut self, item: &ConnectionItem, ctx: &TransferContext) -> Result<()> {
        let entry = entry_name(item);
        let body = item.body(ctx)?;

        let writer = self.writer_mut()?;
        writer.start_file(entry, Self::options())?;
        writer.write_all(&body)?;
        Ok(())
    }

    /// Records a childless directory as an explicit entry so the unpacked
    /// tree matches the source exactly.
    pub fn add_empty_dir(&mut self, rel: &str) -> Result<()> {
        self.writer_mut()?.add_directory(rel, Self::options())?;
        Ok(())
    }

    /// Finalizes the archive and hands back its path. Safe to call once;
    /// later writes fail.
    pub fn finish(&mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(self.path.clone())
    }
}

fn entry_name(item: &ConnectionItem) -> String {
    match item {
        ConnectionItem::File(f) => f.rel_path().to_string(),
        ConnectionItem::Database(d) => format!("{DATABASE_ENTRY_DIR}/{}.sql", d.table()),
    }
}
