//! Departure orchestration: gate, sequential item loop, close, notify.

use std::io::Write;
use std::path::PathBuf;

use serde_json::{json, Value};

use airlift_core::{failures_to_error, LogMeta, LogStatus, NotifyAudience, RuleMessage, TransferLog};

use crate::checks::{connection_allowed, connection_warnings};
use crate::connection::{CloseOutcome, Connection, ConnectionMode};
use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::hooks::Verdict;
use crate::item::ItemFactory;

/// Receives the outcome of a finished departure.
///
/// Deployments wire this to whatever reaches their operators; the default
/// writes one structured line to the process log.
pub trait Notifier {
    fn transfer_complete(&self, audience: NotifyAudience, summary: &TransferSummary);
}

/// Default [`Notifier`].
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn transfer_complete(&self, audience: NotifyAudience, summary: &TransferSummary) {
        log::info!(
            "transfer complete: log={} succeeded={} failed={} notify={:?}",
            summary.log_name,
            summary.succeeded,
            summary.failed,
            audience
        );
    }
}

/// Outcome of one departure run.
#[derive(Debug)]
pub struct TransferSummary {
    pub log_name: String,
    pub log_path: Option<PathBuf>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `(item label, rendered error)` per failure.
    pub failures: Vec<(String, String)>,
    /// The finished bundle, for bundle departures.
    pub archive: Option<PathBuf>,
    /// Whether the run stopped on the cancel flag.
    pub aborted: bool,
}

impl TransferSummary {
    fn new(log: &TransferLog) -> Self {
        Self {
            log_name: log.name().to_string(),
            log_path: log.path().map(|p| p.to_path_buf()),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            archive: None,
            aborted: false,
        }
    }

    fn record_failure(&mut self, label: impl Into<String>, err: &TransferError) {
        self.failed += 1;
        self.failures
            .push((label.into(), format!("{}: {}", err.code(), err)));
    }
}

/// Runs one departure end to end.
///
/// Items go strictly one after another; a failed item is logged and the
/// loop moves on, while cancellation and the walk ceiling stop the run.
/// Whatever happens, the connection is closed and the notifier told.
pub struct Departure<'a> {
    ctx: &'a TransferContext<'a>,
    factory: ItemFactory,
    meta: LogMeta,
    stream: Option<Box<dyn Write + Send>>,
    notifier: Box<dyn Notifier>,
}

impl<'a> Departure<'a> {
    pub fn new(ctx: &'a TransferContext<'a>) -> Self {
        Self {
            ctx,
            factory: ItemFactory::standard(),
            meta: LogMeta::new(),
            stream: None,
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_factory(mut self, factory: ItemFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_meta(mut self, meta: LogMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Streams every log line to the sink as it is written.
    pub fn with_stream(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.stream = Some(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Transfers `descriptors` (all of one item type) over `mode`.
    ///
    /// Push departures run the authorization pipeline first and are
    /// rejected wholesale when it fails; nothing is sent and only the gate
    /// verdict is logged. Warning rules never block, they land in the log.
    pub fn run(
        mut self,
        mode: ConnectionMode,
        item_type: &str,
        descriptors: &[Value],
    ) -> Result<TransferSummary> {
        if descriptors.is_empty() {
            return Err(TransferError::BadItem(
                "a transfer needs at least one item".into(),
            ));
        }

        let mut log = TransferLog::new(TransferLog::departure_name(item_type), self.meta.clone());
        if let Err(e) = log.persist_to(&self.ctx.settings.logs_dir) {
            log::warn!("transfer log will not be persisted: {e}");
        }
        if let Some(sink) = self.stream.take() {
            log.stream_to(sink);
        }

        let mut connection = Connection::open(mode, self.ctx, item_type)?;
        log.add(
            "connection",
            LogStatus::Started,
            json!({"mode": mode.as_str(), "type": item_type}),
        );

        if let Some(http) = connection.as_http() {
            let allowed = connection_allowed(http, self.ctx);
            if let Err(gate) = failures_to_error(&allowed) {
                log.add(
                    "connection",
                    LogStatus::Failed,
                    json!({"code": "NOT_ALLOWED", "failures": gate.failures()}),
                );
                return Err(TransferError::Rejected(gate));
            }

            let warnings = connection_warnings(http, self.ctx);
            let flagged: Vec<&RuleMessage> =
                warnings.iter().filter(|w| !w.passed()).collect();
            if !flagged.is_empty() {
                log.add(
                    "connection",
                    LogStatus::Recoverable,
                    json!({"warnings": flagged}),
                );
            }
        }

        let mut summary = TransferSummary::new(&log);

        for descriptor in descriptors {
            if self.ctx.is_cancelled() {
                log.add(
                    "transfer",
                    LogStatus::Fatal,
                    json!({"code": "ABORTED", "message": "transfer aborted"}),
                );
                summary.aborted = true;
                break;
            }

            summary.attempted += 1;

            let item = match self.factory.make(item_type, descriptor, self.ctx) {
                Ok(item) => item,
                Err(err) => {
                    log.add(
                        "item",
                        LogStatus::Failed,
                        json!({
                            "descriptor": descriptor.clone(),
                            "code": err.code(),
                            "message": err.to_string(),
                        }),
                    );
                    summary.record_failure(descriptor.to_string(), &err);
                    continue;
                }
            };

            let label = item.label();
            log.add(
                "item",
                LogStatus::Started,
                json!({"type": item_type, "target": label.clone()}),
            );

            // Top-level veto gets its own log line; the walk re-checks
            // every leaf it reaches.
            if let Verdict::Deny(denial) = self.ctx.hooks.allow_export_item(&item, mode, self.ctx)
            {
                let err = denial.unwrap_or(TransferError::ExportFiltered);
                log.add(
                    "item",
                    LogStatus::Failed,
                    json!({"target": label.clone(), "code": err.code(), "message": err.to_string()}),
                );
                summary.record_failure(label, &err);
                continue;
            }

            match connection.transfer(item, self.ctx, &mut log) {
                Ok(report) if report.failed == 0 => {
                    log.add(
                        "item",
                        LogStatus::Success,
                        json!({"target": label.clone(), "sent": report.sent}),
                    );
                    summary.succeeded += 1;
                }
                Ok(report) => {
                    log.add(
                        "item",
                        LogStatus::Failed,
                        json!({
                            "target": label.clone(),
                            "sent": report.sent,
                            "failed": report.failed,
                            "first_error": report.first_error.clone(),
                        }),
                    );
                    summary.failed += 1;
                    summary.failures.push((
                        label,
                        report
                            .first_error
                            .unwrap_or_else(|| "unknown failure".into()),
                    ));
                }
                Err(err)
                    if matches!(err, TransferError::Aborted | TransferError::ItemLimit(_)) =>
                {
                    log.add(
                        "transfer",
                        LogStatus::Fatal,
                        json!({"target": label.clone(), "code": err.code(), "message": err.to_string()}),
                    );
                    summary.aborted = matches!(err, TransferError::Aborted);
                    summary.record_failure(label, &err);
                    break;
                }
                Err(err) => {
                    log.add(
                        "item",
                        LogStatus::Failed,
                        json!({"target": label.clone(), "code": err.code(), "message": err.to_string()}),
                    );
                    summary.record_failure(label, &err);
                }
            }
        }

        match connection.close() {
            Ok(CloseOutcome::None) => {
                log.add("connection", LogStatus::Done, json!({}));
            }
            Ok(CloseOutcome::Archive(path)) => {
                log.add(
                    "connection",
                    LogStatus::Done,
                    json!({"archive": path.display().to_string()}),
                );
                summary.archive = Some(path);
            }
            Err(err) => {
                log.add(
                    "connection",
                    LogStatus::Failed,
                    json!({"code": err.code(), "message": err.to_string()}),
                );
                summary.record_failure("close", &err);
            }
        }

        self.notifier
            .transfer_complete(self.ctx.settings.notify, &summary);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::sync::{Arc, Mutex};

    use airlift_core::{ContentRoot, MemorySettings, MemoryTables, TransferSettings};
    use tempfile::tempdir;

    use crate::hooks::HookSet;

    #[test]
    fn test_empty_item_list_is_refused() {
        let root = ContentRoot::new("/tmp");
        let tables = MemoryTables::new();
        let settings = TransferSettings::default();
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        let err = Departure::new(&ctx)
            .run(ConnectionMode::Bundle, "file", &[])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ITEM");
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Arc<Mutex<Vec<(NotifyAudience, usize, usize)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn transfer_complete(&self, audience: NotifyAudience, summary: &TransferSummary) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((audience, summary.succeeded, summary.failed));
            }
        }
    }

    #[test]
    fn test_bundle_run_reports_and_notifies() {
        let site = tempdir().unwrap();
        fs::write(site.path().join("a.txt"), b"a").unwrap();

        let out = tempdir().unwrap();
        let root = ContentRoot::new(site.path());
        let tables = MemoryTables::new();
        let mut settings = TransferSettings::default();
        settings.bundle_dir = out.path().join("bundles");
        settings.logs_dir = out.path().join("logs");
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        let notifier = RecordingNotifier::default();
        let seen = Arc::clone(&notifier.seen);

        let summary = Departure::new(&ctx)
            .with_notifier(Box::new(notifier))
            .run(
                ConnectionMode::Bundle,
                "file",
                &[json!("a.txt"), json!("missing.txt")],
            )
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.aborted);
        let archive = summary.archive.expect("bundle path");
        assert!(archive.exists());

        let log_path = summary.log_path.expect("log path");
        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.lines().count() >= 4);
        assert!(content.contains("\"CANNOT_SEND\""));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(NotifyAudience::Both, 1, 1)]);
    }

    #[test]
    fn test_cancelled_before_start_sends_nothing() {
        let site = tempdir().unwrap();
        fs::write(site.path().join("a.txt"), b"a").unwrap();

        let out = tempdir().unwrap();
        let root = ContentRoot::new(site.path());
        let tables = MemoryTables::new();
        let mut settings = TransferSettings::default();
        settings.bundle_dir = out.path().join("bundles");
        settings.logs_dir = out.path().join("logs");
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);
        ctx.cancel_flag().cancel();

        let summary = Departure::new(&ctx)
            .run(ConnectionMode::Bundle, "file", &[json!("a.txt")])
            .unwrap();

        assert!(summary.aborted);
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.succeeded, 0);
        // The bundle still closes into an archive, just an empty one.
        assert!(summary.archive.is_some());
    }
}
