//! airlift: operator CLI for site-to-site transfers.
//!
//! # Usage
//!
//! ```bash
//! # Verify the connection to the configured foreign site
//! airlift check --config airlift.toml
//!
//! # Push content and tables
//! airlift push --config airlift.toml uploads themes/flight --table wp_posts
//!
//! # Write a local bundle instead of pushing
//! airlift bundle --config airlift.toml uploads --table "wp_posts:1,2,3"
//!
//! # List transfer logs, newest first
//! airlift logs --config airlift.toml --page 1
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde_json::{json, Value};

use airlift_core::{
    page_log_files, ContentRoot, MemorySettings, MemoryTables, TransferSettings,
};
use airlift_transfer::{
    connection_allowed, connection_warnings, ConnectionMode, Departure, HookSet, HttpConnection,
    TransferContext, TransferSummary, ITEM_DATABASE, ITEM_FILE,
};

/// Transfer files and database tables between sites.
#[derive(Parser, Debug)]
#[command(name = "airlift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings TOML file
    #[arg(short, long, default_value = "airlift.toml", global = true)]
    config: PathBuf,

    /// JSON table snapshot backing database items
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    /// Log level filter
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the connection checks against the configured foreign site
    Check,
    /// Push items to the foreign site over HTTP
    Push {
        /// File or directory paths relative to the content root
        #[arg(value_name = "PATH")]
        paths: Vec<String>,

        /// Tables to send, as `name` or `name:key1,key2`
        #[arg(short, long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },
    /// Write items into a local zip bundle
    Bundle {
        /// File or directory paths relative to the content root
        #[arg(value_name = "PATH")]
        paths: Vec<String>,

        /// Tables to send, as `name` or `name:key1,key2`
        #[arg(short, long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },
    /// List transfer log files, newest first
    Logs {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str()))
        .format_timestamp_millis()
        .init();

    let settings = match TransferSettings::load(&args.config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load settings from {}: {}", args.config.display(), e);
            process::exit(1);
        }
    };

    let tables = match &args.tables {
        Some(path) => match MemoryTables::from_json_file(path) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to load table snapshot: {}", e);
                process::exit(1);
            }
        },
        None => MemoryTables::new(),
    };

    let root = ContentRoot::new(&settings.content_dir);
    let store = MemorySettings::seeded_from(&settings);
    let hooks = HookSet::standard();
    let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

    match args.command {
        Command::Check => check(&ctx),
        Command::Push { paths, tables } => transfer(&ctx, ConnectionMode::Push, &paths, &tables),
        Command::Bundle { paths, tables } => {
            transfer(&ctx, ConnectionMode::Bundle, &paths, &tables)
        }
        Command::Logs { page, per_page } => logs(&settings, page, per_page),
    }
}

fn check(ctx: &TransferContext) {
    let connection = match HttpConnection::new(ctx) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build connection: {}", e);
            process::exit(1);
        }
    };

    info!("Checking connection to {}", connection.address());

    let allowed = connection_allowed(&connection, ctx);
    for message in &allowed {
        let mark = if message.passed() { "PASS" } else { "FAIL" };
        println!("[{mark}] {:<26} {}", message.code(), message.message());
    }

    for message in connection_warnings(&connection, ctx) {
        let mark = if message.passed() { "PASS" } else { "WARN" };
        println!("[{mark}] {:<26} {}", message.code(), message.message());
    }

    if !airlift_core::all(&allowed) {
        process::exit(1);
    }
}

fn transfer(ctx: &TransferContext, mode: ConnectionMode, paths: &[String], tables: &[String]) {
    if paths.is_empty() && tables.is_empty() {
        error!("Nothing to transfer: give paths and/or --table arguments");
        process::exit(1);
    }

    let mut ok = true;

    // Files travel before tables, so transported content is in place when
    // the database arrives.
    if !paths.is_empty() {
        let descriptors: Vec<Value> = paths.iter().map(|p| json!(p)).collect();
        ok &= run_departure(ctx, mode, ITEM_FILE, &descriptors);
    }

    if !tables.is_empty() {
        let descriptors: Vec<Value> = tables.iter().map(|t| table_descriptor(t)).collect();
        ok &= run_departure(ctx, mode, ITEM_DATABASE, &descriptors);
    }

    if !ok {
        process::exit(1);
    }
}

fn run_departure(
    ctx: &TransferContext,
    mode: ConnectionMode,
    item_type: &str,
    descriptors: &[Value],
) -> bool {
    match Departure::new(ctx).run(mode, item_type, descriptors) {
        Ok(summary) => {
            report(&summary);
            summary.failed == 0 && !summary.aborted
        }
        Err(e) => {
            error!("Transfer rejected: {}", e);
            false
        }
    }
}

fn report(summary: &TransferSummary) {
    info!("Log: {}", summary.log_name);
    if let Some(path) = &summary.archive {
        info!("Bundle: {}", path.display());
    }
    info!(
        "Items: {} attempted, {} succeeded, {} failed",
        summary.attempted, summary.succeeded, summary.failed
    );
    for (label, err) in &summary.failures {
        error!("  {}: {}", label, err);
    }
    if summary.aborted {
        error!("Transfer aborted before completion");
    }
}

fn table_descriptor(raw: &str) -> Value {
    match raw.split_once(':') {
        Some((table, keys)) => {
            let keys: Vec<&str> = keys.split(',').filter(|k| !k.is_empty()).collect();
            json!({"table": table, "rows": keys})
        }
        None => json!(raw),
    }
}

fn logs(settings: &TransferSettings, page: usize, per_page: usize) {
    let files = match page_log_files(&settings.logs_dir, page, per_page) {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to list logs in {}: {}", settings.logs_dir.display(), e);
            process::exit(1);
        }
    };

    if files.is_empty() {
        info!("No transfer logs on page {}", page);
        return;
    }

    for file in files {
        let modified = file
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<52} {:>10}  {}", file.name, file.size, modified);
    }
}
