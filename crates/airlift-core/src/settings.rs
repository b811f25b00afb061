use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key prefix for every setting this tool persists on a site.
pub const SETTINGS_KEY_PREFIX: &str = "airlift_";

/// Versions and identity of the local site a transfer runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub runtime_version: String,
    pub platform_version: String,
    pub table_prefix: String,
    pub is_multisite: bool,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            runtime_version: String::new(),
            platform_version: String::new(),
            table_prefix: "wp_".to_string(),
            is_multisite: false,
        }
    }
}

/// Who gets notified when a transfer finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAudience {
    User,
    Admin,
    Both,
}

impl Default for NotifyAudience {
    fn default() -> Self {
        NotifyAudience::Both
    }
}

/// Find/replace applied to cell values during database export, before SQL
/// escaping. Used to rewrite absolute URLs embedded in content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRewrite {
    pub find: String,
    pub replace: String,
}

/// Operator configuration for the engine, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Base URL of the arrival site.
    pub foreign_address: String,
    /// Shared secret sent with every outgoing request.
    pub foreign_password: String,
    /// Whether this site accepts incoming transfers at all.
    pub allow_arrivals: bool,
    /// Hex blake3 hash of the secret incoming requests must present.
    pub arrival_password_hash: String,
    /// Require https on the foreign address. Leave on outside development.
    pub require_https: bool,
    /// Send PUT/PATCH/DELETE/OPTIONS as POST plus an override header, for
    /// servers that strip non-standard verbs.
    pub compat_verbs: bool,
    pub content_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub bundle_dir: PathBuf,
    /// Paths never exported, in addition to the logs directory.
    pub protected_export_paths: Vec<PathBuf>,
    /// Directories incoming file items may never write into.
    pub blocklist_import_dirs: Vec<PathBuf>,
    pub rewrite: Option<ValueRewrite>,
    pub notify: NotifyAudience,
    pub site: SiteProfile,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            foreign_address: String::new(),
            foreign_password: String::new(),
            allow_arrivals: false,
            arrival_password_hash: String::new(),
            require_https: true,
            compat_verbs: false,
            content_dir: PathBuf::from("."),
            logs_dir: PathBuf::from("airlift-logs"),
            bundle_dir: std::env::temp_dir(),
            protected_export_paths: Vec::new(),
            blocklist_import_dirs: Vec::new(),
            rewrite: None,
            notify: NotifyAudience::default(),
            site: SiteProfile::default(),
        }
    }
}

impl TransferSettings {
    /// Parses settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Toml(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Toml(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Seeds a settings store with the persisted keys of this config.
    pub fn seed_store(&self, store: &dyn SettingsStore) {
        store.set("airlift_foreign_address", &self.foreign_address);
        store.set("airlift_foreign_password", &self.foreign_password);
        store.set(
            "airlift_allow_arrivals",
            if self.allow_arrivals { "1" } else { "0" },
        );
        store.set("airlift_arrival_password_hash", &self.arrival_password_hash);
    }
}

/// Persisted key/value settings on a site.
///
/// Table imports snapshot these keys before applying a script and restore
/// them afterwards, so an arriving dump can never overwrite the receiving
/// site's own connection settings.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-memory [`SettingsStore`].
#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded_from(settings: &TransferSettings) -> Self {
        let store = Self::new();
        settings.seed_store(&store);
        store
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn keys(&self) -> Vec<String> {
        match self.values.lock() {
            Ok(values) => values.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Captures every stored key/value pair, for restoring after an import.
pub fn snapshot_settings(store: &dyn SettingsStore) -> Vec<(String, String)> {
    store
        .keys()
        .into_iter()
        .filter_map(|key| store.get(&key).map(|value| (key, value)))
        .collect()
}

/// Writes a snapshot back, overwriting whatever an import left behind.
pub fn restore_settings(store: &dyn SettingsStore, snapshot: &[(String, String)]) {
    for (key, value) in snapshot {
        store.set(key, value);
    }
}

/// Hex blake3 hash for storing the arrival secret at rest.
pub fn hash_shared_secret(secret: &str) -> String {
    blake3::hash(secret.as_bytes()).to_hex().to_string()
}

/// Checks a presented secret against a stored hex hash. Hash comparison is
/// constant-time; a malformed stored hash never verifies.
pub fn verify_shared_secret(presented: &str, stored_hex: &str) -> bool {
    match blake3::Hash::from_hex(stored_hex) {
        Ok(stored) => blake3::hash(presented.as_bytes()) == stored,
        Err(_) => false,
    }
}
