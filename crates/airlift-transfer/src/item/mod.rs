//! Connection items, the transferable units of a connection.
//!
//! An item is either a file under the content root or a database table.
//! Directories are file items too; they can not be sent themselves but
//! expand into their children during the walk. New item kinds plug in
//! through the [`ItemFactory`].

mod database;
mod file;

pub use database::{DatabaseItem, RowSelector};
pub use file::FileItem;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::protocol::{ArrivalRequest, HEADER_ITEM_TYPE};

/// Type tag for file items.
pub const ITEM_FILE: &str = "file";
/// Type tag for database table items.
pub const ITEM_DATABASE: &str = "database";

/// One transferable unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionItem {
    File(FileItem),
    Database(DatabaseItem),
}

impl ConnectionItem {
    /// The type tag sent on the wire with this item.
    pub fn item_type(&self) -> &'static str {
        match self {
            ConnectionItem::File(_) => ITEM_FILE,
            ConnectionItem::Database(_) => ITEM_DATABASE,
        }
    }

    /// Human-readable identity, used in log lines.
    pub fn label(&self) -> String {
        match self {
            ConnectionItem::File(f) => f.rel_path().to_string(),
            ConnectionItem::Database(d) => d.table().to_string(),
        }
    }

    /// Whether the item itself can travel. Directories and missing files
    /// can not.
    pub fn can_send(&self, ctx: &TransferContext) -> bool {
        match self {
            ConnectionItem::File(f) => f.can_send(ctx),
            ConnectionItem::Database(d) => d.can_send(ctx),
        }
    }

    /// Whether the item stands for other items instead of content of its
    /// own.
    pub fn is_expandable(&self, ctx: &TransferContext) -> bool {
        match self {
            ConnectionItem::File(f) => f.is_dir(ctx),
            ConnectionItem::Database(_) => false,
        }
    }

    /// The items this one expands into.
    pub fn dependencies(&self, ctx: &TransferContext) -> Result<Vec<ConnectionItem>> {
        match self {
            ConnectionItem::File(f) => Ok(f
                .children(ctx)?
                .into_iter()
                .map(ConnectionItem::File)
                .collect()),
            ConnectionItem::Database(_) => Ok(Vec::new()),
        }
    }

    /// Wire headers identifying this item to the arrival site.
    pub fn headers(&self, ctx: &TransferContext) -> Vec<(&'static str, String)> {
        match self {
            ConnectionItem::File(f) => f.headers(),
            ConnectionItem::Database(d) => d.headers(ctx),
        }
    }

    /// The transported payload.
    pub fn body(&self, ctx: &TransferContext) -> Result<Vec<u8>> {
        match self {
            ConnectionItem::File(f) => f.body(ctx),
            ConnectionItem::Database(d) => d.body(ctx),
        }
    }
}

type ItemConstructor = Box<dyn Fn(&Value, &TransferContext) -> Result<ConnectionItem> + Send + Sync>;

/// Registry turning `(type tag, raw descriptor)` pairs into items.
///
/// Callers describe what to transfer as JSON values; the factory owns the
/// mapping from tag to concrete item and rejects tags it does not know.
pub struct ItemFactory {
    constructors: BTreeMap<String, ItemConstructor>,
}

impl ItemFactory {
    /// A factory that knows the built-in item types.
    pub fn standard() -> Self {
        let mut factory = Self {
            constructors: BTreeMap::new(),
        };
        factory.register(ITEM_FILE, Box::new(|raw, _ctx| {
            Ok(ConnectionItem::File(FileItem::from_raw(raw)?))
        }));
        factory.register(ITEM_DATABASE, Box::new(|raw, _ctx| {
            Ok(ConnectionItem::Database(DatabaseItem::from_raw(raw)?))
        }));
        factory
    }

    /// Registers a constructor, replacing any previous one for the tag.
    pub fn register(&mut self, item_type: impl Into<String>, constructor: ItemConstructor) {
        self.constructors.insert(item_type.into(), constructor);
    }

    pub fn known_types(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Builds an item from its wire tag and raw descriptor.
    pub fn make(
        &self,
        item_type: &str,
        raw: &Value,
        ctx: &TransferContext,
    ) -> Result<ConnectionItem> {
        let constructor = self
            .constructors
            .get(item_type)
            .ok_or_else(|| TransferError::UnknownItemType(item_type.to_string()))?;
        constructor(raw, ctx)
    }
}

/// Arrival-side dispatch: hands an authorized transfer request to the item
/// type named in its headers.
pub fn receive_item(request: &ArrivalRequest, ctx: &TransferContext) -> Result<()> {
    let item_type = request.require_header(HEADER_ITEM_TYPE)?;
    if item_type.eq_ignore_ascii_case(ITEM_FILE) {
        FileItem::import(request, ctx)
    } else if item_type.eq_ignore_ascii_case(ITEM_DATABASE) {
        DatabaseItem::import(request, ctx)
    } else {
        Err(TransferError::UnknownItemType(item_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use airlift_core::{ContentRoot, MemorySettings, MemoryTables, TransferSettings};
    use serde_json::json;

    use crate::hooks::HookSet;

    #[test]
    fn test_factory_rejects_unknown_type() {
        let root = ContentRoot::new("/tmp");
        let tables = MemoryTables::new();
        let settings = TransferSettings::default();
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        let factory = ItemFactory::standard();
        let err = factory.make("blob", &json!("x"), &ctx).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CONNECTION_TYPE");
    }

    #[test]
    fn test_factory_builds_both_builtin_types() {
        let root = ContentRoot::new("/tmp");
        let tables = MemoryTables::new();
        let settings = TransferSettings::default();
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        let factory = ItemFactory::standard();
        assert_eq!(factory.known_types(), vec![ITEM_DATABASE, ITEM_FILE]);

        let file = factory
            .make(ITEM_FILE, &json!("uploads/a.txt"), &ctx)
            .unwrap();
        assert_eq!(file.item_type(), ITEM_FILE);
        assert_eq!(file.label(), "uploads/a.txt");

        let table = factory
            .make(ITEM_DATABASE, &json!({"table": "wp_posts", "rows": -1}), &ctx)
            .unwrap();
        assert_eq!(table.item_type(), ITEM_DATABASE);
        assert_eq!(table.label(), "wp_posts");
    }

    #[test]
    fn test_receive_rejects_unknown_item_type() {
        let root = ContentRoot::new("/tmp");
        let tables = MemoryTables::new();
        let settings = TransferSettings::default();
        let store = MemorySettings::new();
        let hooks = HookSet::empty();
        let ctx = TransferContext::new(&root, &tables, &settings, &store, &hooks);

        let request = ArrivalRequest::new(
            vec![(HEADER_ITEM_TYPE.to_string(), "blob".to_string())],
            Vec::new(),
        );
        let err = receive_item(&request, &ctx).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CONNECTION_TYPE");
    }
}
