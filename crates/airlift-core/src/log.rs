//! Request-scoped NDJSON transfer logs.
//!
//! Every transfer writes one log: a `meta` line capturing the request
//! context, then one `line` record per step. Output is dual: lines stream
//! to a live sink as they happen and append to a log file on disk. Both
//! writes are best-effort; logging never interrupts a transfer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

const SCHEMA_META: &str = "meta";
const SCHEMA_LINE: &str = "line";

/// Status vocabulary for transfer log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Started,
    Done,
    Success,
    Failed,
    Fatal,
    Recoverable,
    Unknown,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Started => "started",
            LogStatus::Done => "done",
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
            LogStatus::Fatal => "fatal",
            LogStatus::Recoverable => "recoverable",
            LogStatus::Unknown => "unknown",
        }
    }
}

/// Request context captured once when a log is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMeta {
    pub user: Option<String>,
    pub request: Option<String>,
    pub method: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl LogMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_request(mut self, request: impl Into<String>, method: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self.method = Some(method.into());
        self
    }

    pub fn with_client(
        mut self,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// One appended log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub status: LogStatus,
    pub data: Value,
}

/// A transfer log with buffered entries, optional file persistence and an
/// optional live stream sink.
pub struct TransferLog {
    name: String,
    created: DateTime<Utc>,
    meta: LogMeta,
    entries: Vec<LogEntry>,
    file: Option<File>,
    path: Option<PathBuf>,
    stream: Option<Box<dyn Write + Send>>,
}

impl TransferLog {
    pub fn new(name: impl Into<String>, meta: LogMeta) -> Self {
        Self {
            name: name.into(),
            created: Utc::now(),
            meta,
            entries: Vec::new(),
            file: None,
            path: None,
            stream: None,
        }
    }

    /// Log name for a transfer leaving this site.
    pub fn departure_name(item_type: &str) -> String {
        format!(
            "airlift-departure-{}-{}",
            item_type,
            Utc::now().format("%Y-%m-%d-%H-%M-%S")
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &LogMeta {
        &self.meta
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Where the log file lives, once persistence is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Enables file persistence under `dir` and writes the meta line, plus
    /// any lines already buffered. The file is opened append-only so
    /// concurrent writers of the same name never truncate each other.
    pub fn persist_to(&mut self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", self.name));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        write_line(&mut file, &self.meta_line());
        for entry in &self.entries {
            write_line(&mut file, &render_entry(entry));
        }

        self.file = Some(file);
        self.path = Some(path.clone());
        Ok(path)
    }

    /// Attaches a live sink that receives every subsequent line, flushed
    /// per line.
    pub fn stream_to(&mut self, sink: Box<dyn Write + Send>) {
        self.stream = Some(sink);
    }

    /// Appends one line. File and stream writes are best-effort.
    pub fn add(&mut self, entry_type: &str, status: LogStatus, data: Value) {
        let entry = LogEntry {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            entry_type: entry_type.to_string(),
            status,
            data,
        };
        let line = render_entry(&entry);

        if let Some(file) = self.file.as_mut() {
            write_line(file, &line);
        }
        if let Some(stream) = self.stream.as_mut() {
            write_line(stream, &line);
            if let Err(e) = stream.flush() {
                log::warn!("transfer log stream flush failed: {}", e);
            }
        }

        self.entries.push(entry);
    }

    fn meta_line(&self) -> String {
        json!({
            "schema": SCHEMA_META,
            "date": self.created.to_rfc3339_opts(SecondsFormat::Secs, true),
            "user": self.meta.user,
            "request": self.meta.request,
            "method": self.meta.method,
            "ip_address": self.meta.ip_address,
            "user_agent": self.meta.user_agent,
        })
        .to_string()
    }
}

fn render_entry(entry: &LogEntry) -> String {
    json!({
        "schema": SCHEMA_LINE,
        "time": entry.time,
        "type": entry.entry_type,
        "status": entry.status,
        "data": entry.data,
    })
    .to_string()
}

fn write_line(out: &mut dyn Write, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        log::warn!("transfer log write failed: {}", e);
    }
}

/// Summary of one persisted log file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFileInfo {
    pub name: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Lists `.log` files in a directory, newest first.
///
/// Log names embed their creation timestamp, so sorting by name descending
/// orders them newest first regardless of filesystem timestamps.
pub fn list_log_files(dir: &Path) -> Result<Vec<LogFileInfo>> {
    let mut infos = Vec::new();

    if !dir.is_dir() {
        return Ok(infos);
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let metadata = entry.metadata()?;
        infos.push(LogFileInfo {
            name: name.to_string(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            size: metadata.len(),
        });
    }

    infos.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(infos)
}

/// One page of [`list_log_files`], `page` starting at 1.
pub fn page_log_files(dir: &Path, page: usize, per_page: usize) -> Result<Vec<LogFileInfo>> {
    let infos = list_log_files(dir)?;
    let start = page.saturating_sub(1).saturating_mul(per_page);
    Ok(infos.into_iter().skip(start).take(per_page).collect())
}
