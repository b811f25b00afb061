//! # airlift-transfer
//!
//! Site-to-site transfer engine: connections, items, and the departure
//! orchestrator.
//!
//! This crate provides:
//! - Connection items for files (with directory expansion) and database
//!   tables (full or keyed-subset SQL dumps)
//! - An HTTP push connection and a local zip bundle connection sharing one
//!   dependency walk
//! - Authorization and warning rule pipelines run before a push departs
//! - Arrival-side authorization and item import handlers
//! - A departure orchestrator writing an NDJSON transfer log
//! - An operator CLI (optional, with the `cli` feature)
//!
//! ## Example
//!
//! ```ignore
//! use airlift_core::{ContentRoot, MemorySettings, MemoryTables, TransferSettings};
//! use airlift_transfer::{ConnectionMode, Departure, HookSet, TransferContext};
//! use serde_json::json;
//!
//! let root = ContentRoot::new("/var/www/site/wp-content");
//! let tables = MemoryTables::from_json_file("tables.json".as_ref())?;
//! let settings = TransferSettings::load("airlift.toml".as_ref())?;
//! let store = MemorySettings::seeded_from(&settings);
//! let hooks = HookSet::standard();
//! let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);
//!
//! let summary = Departure::new(&ctx).run(
//!     ConnectionMode::Push,
//!     "file",
//!     &[json!("uploads"), json!("themes/flight")],
//! )?;
//! println!("sent {} of {}", summary.succeeded, summary.attempted);
//! ```

pub mod checks;
pub mod connection;
pub mod context;
pub mod error;
pub mod hooks;
pub mod item;
pub mod orchestrator;
pub mod protocol;
pub mod sql;

pub use checks::{connection_allowed, connection_warnings};
pub use connection::{
    CloseOutcome, Connection, ConnectionMode, HttpConnection, TransferReport, TransferResponse,
    ZipConnection, MAX_WALK_ITEMS,
};
pub use context::{CancelFlag, TransferContext};
pub use error::{Result, TransferError};
pub use hooks::{HookSet, Verdict};
pub use item::{
    receive_item, ConnectionItem, DatabaseItem, FileItem, ItemFactory, RowSelector, ITEM_DATABASE,
    ITEM_FILE,
};
pub use orchestrator::{Departure, LogNotifier, Notifier, TransferSummary};
pub use protocol::{authorize_arrival, ArrivalRequest, ServerInfo};
