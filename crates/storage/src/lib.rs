use anyhow::{Context, Result};
use async_trait::async_trait;
use consentry_core::ScanReport;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

/// Namespaced keys shared by every component
pub mod keys {
    pub const SESSION: &str = "scan/session";
    pub const ACTIVE_ID: &str = "scan/active_id";
    pub const LAST_ID: &str = "scan/last_id";
    pub const PROGRESS: &str = "scan/progress";
    pub const NOTICE: &str = "selection/notice";
    pub const ELEMENTS: &str = "selection/elements";
    pub const SECOND_LEVEL: &str = "selection/second_level";
    pub const INTERACTION: &str = "interaction/current";
    pub const COOKIE_PREFIX: &str = "cookies/";

    pub fn cookie(key: &str) -> String {
        format!("{}{}", COOKIE_PREFIX, key)
    }

    /// Per-session artifacts wiped when a new session begins.
    pub const ARTIFACTS: &[&str] = &[PROGRESS, NOTICE, ELEMENTS, SECOND_LEVEL, INTERACTION];
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed store file name '{0}'")]
    MalformedKey(String),
}

/// Persistent key-value store. Reads and writes are individual round trips;
/// there is no read-modify-write transaction.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ReportStorage: Send + Sync {
    async fn save_report(&self, report: &ScanReport) -> Result<PathBuf>;
}

pub async fn load<T: DeserializeOwned, S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn save<T: Serialize + Sync, S: KeyValueStore + ?Sized>(store: &S, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?).await
}

pub struct JsonFileStorage {
    pub folder: String,
}

impl JsonFileStorage {
    /// Creates the store folder if missing.
    pub fn new(folder: &str) -> Result<Self> {
        std::fs::create_dir_all(Path::new(folder).join("store"))
            .with_context(|| format!("creating store folder under '{}'", folder))?;
        Ok(Self { folder: folder.to_string() })
    }

    fn store_dir(&self) -> PathBuf {
        Path::new(&self.folder).join("store")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.store_dir().join(format!("{}.json", encode_key(key)))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(&tmp, data).await?;
        // rename keeps the stored value either fully old or fully new
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.store_dir()).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(encoded) = file_name.strip_suffix(".json") else {
                continue;
            };
            let key = decode_key(encoded)?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ReportStorage for JsonFileStorage {
    async fn save_report(&self, report: &ScanReport) -> Result<PathBuf> {
        let path = Path::new(&self.folder).join(format!("{}.json", report.report_id));
        let data = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, data).await?;
        tracing::info!(path = %path.display(), "report written");
        Ok(path)
    }
}

/// In-process store for ephemeral runs and tests
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Value>>,
    reports: RwLock<Vec<ScanReport>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<ScanReport> {
        self.reports.read().await.clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStorage for MemoryStorage {
    async fn save_report(&self, report: &ScanReport) -> Result<PathBuf> {
        self.reports.write().await.push(report.clone());
        Ok(PathBuf::from(format!("memory://{}", report.report_id)))
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Result<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded
                .get(i + 1..i + 3)
                .ok_or_else(|| StoreError::MalformedKey(encoded.to_string()))?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| StoreError::MalformedKey(encoded.to_string()))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(String::from_utf8(out).map_err(|_| StoreError::MalformedKey(encoded.to_string()))?)
}
