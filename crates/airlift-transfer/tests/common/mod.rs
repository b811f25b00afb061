//! Shared fixtures: an owned site behind a `TransferContext`, a canned
//! HTTP server for scripted answers, and a real arrival site served over
//! loopback.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use airlift_core::{ContentRoot, MemorySettings, MemoryTables, TransferSettings};
use airlift_transfer::{
    authorize_arrival, receive_item, ArrivalRequest, HookSet, ServerInfo, TransferContext,
    TransferError,
};
use tempfile::TempDir;

/// One site's worth of owned state. Tests adjust the public fields, then
/// borrow everything at once through [`TestSite::ctx`].
pub struct TestSite {
    pub dir: TempDir,
    pub out: TempDir,
    pub root: ContentRoot,
    pub tables: MemoryTables,
    pub settings: TransferSettings,
    pub store: MemorySettings,
    pub hooks: HookSet,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let root = ContentRoot::new(dir.path());

        let mut settings = TransferSettings::default();
        settings.content_dir = dir.path().to_path_buf();
        settings.logs_dir = out.path().join("logs");
        settings.bundle_dir = out.path().join("bundles");

        Self {
            dir,
            out,
            root,
            tables: MemoryTables::new(),
            settings,
            store: MemorySettings::new(),
            hooks: HookSet::standard(),
        }
    }

    pub fn ctx(&self) -> TransferContext<'_> {
        TransferContext::new(
            &self.root,
            &self.tables,
            &self.settings,
            &self.store,
            &self.hooks,
        )
    }
}

/// One request as the server saw it on the wire.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Single-threaded HTTP server answering a fixed script of `(status, body)`
/// responses, one connection each, recording every request it was asked.
pub struct CannedServer {
    pub address: String,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl CannedServer {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                if let Some(request) = read_request(&stream) {
                    if let Ok(mut log) = seen.lock() {
                        log.push(request);
                    }
                }
                write_response(&stream, status, &body);
            }
        });

        Self {
            address,
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        match self.requests.lock() {
            Ok(seen) => seen.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Waits until the whole response script has been served.
    pub fn join(mut self) -> Vec<ReceivedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.requests()
    }
}

/// Serves `n` requests against a real arrival site rooted at `content_dir`,
/// wiring the arrival handlers the way a deployment's routes would. Returns
/// the bound address and a handle yielding the SQL scripts the site applied.
pub fn start_arrival_site(
    content_dir: PathBuf,
    settings: TransferSettings,
    n: usize,
) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let root = ContentRoot::new(&content_dir);
        let tables = MemoryTables::new();
        let store = MemorySettings::seeded_from(&settings);
        let hooks = HookSet::standard();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        for _ in 0..n {
            let Ok((stream, _)) = listener.accept() else {
                break;
            };
            let Some(request) = read_request(&stream) else {
                continue;
            };

            let arrival = ArrivalRequest::new(request.headers.clone(), request.body.clone());
            let (status, body) = route_arrival(&request.path, &arrival, &ctx);
            write_response(&stream, status, &body);
        }

        tables.applied_scripts()
    });

    (address, handle)
}

fn route_arrival(path: &str, request: &ArrivalRequest, ctx: &TransferContext) -> (u16, String) {
    if let Err(err) = authorize_arrival(request, ctx) {
        return (status_for(&err), err.to_envelope().to_string());
    }

    if path.ends_with("/connection") {
        let info = ServerInfo::local(ctx.settings);
        (200, serde_json::to_string(&info).unwrap())
    } else if path.ends_with("/transfer") {
        match receive_item(request, ctx) {
            Ok(()) => (200, "{}".to_string()),
            Err(err) => (status_for(&err), err.to_envelope().to_string()),
        }
    } else {
        (
            404,
            r#"{"code":"NOT_FOUND","message":"no such route"}"#.to_string(),
        )
    }
}

fn status_for(err: &TransferError) -> u16 {
    match err.code().as_str() {
        "PASSWORD_INCORRECT" => 401,
        "ARRIVALS_DISALLOWED" | "IMPORT_FILTERED_OUT" => 403,
        "UNKNOWN_CONNECTION_TYPE" | "INVALID_ITEM" | "MISSING_HEADER" | "INVALID_PATH" => 400,
        _ => 500,
    }
}

fn read_request(stream: &TcpStream) -> Option<ReceivedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            let name = name.trim().to_string();
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }

    Some(ReceivedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn write_response(stream: &TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut writer = stream;
    let _ = writer.write_all(response.as_bytes());
    let _ = writer.flush();
}
