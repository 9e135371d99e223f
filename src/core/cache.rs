//! Content-hash keyed translation cache persisted across runs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::errors::{DocsError, Result};

/// Cache key: relative file path plus SHA-256 of the source content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source path relative to the content root
    pub path: String,
    /// Hex SHA-256 of the source content
    pub hash: String,
}

impl CacheKey {
    /// Key for `content` read from `path`
    pub fn new(path: impl Into<String>, content: &str) -> Self {
        Self {
            path: path.into(),
            hash: content_hash(content),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.hash)
    }
}

/// Hex SHA-256 digest of `content`
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    entries: Vec<(String, String)>,
    last_updated: chrono::DateTime<chrono::Utc>,
}

/// Translation cache shared by all tasks of a run
#[derive(Debug)]
pub struct TranslationCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    dirty: AtomicBool,
}

impl TranslationCache {
    /// Empty cache that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the cache file at `path`; a missing or unreadable file yields an empty cache
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(Some(entries)) => {
                info!("Loaded {} cached translations", entries.len());
                entries
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Failed to load translation cache {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    fn read_entries(path: &Path) -> Result<Option<HashMap<String, String>>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| DocsError::file(path, e))?;
        let file: CacheFile = serde_json::from_str(&content)?;
        Ok(Some(file.entries.into_iter().collect()))
    }

    /// Stored translation for `key`, if any
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.read().await.get(&key.to_string()).cloned()
    }

    /// Store a translation and mark the cache dirty
    pub async fn put(&self, key: &CacheKey, translation: String) {
        self.entries.write().await.insert(key.to_string(), translation);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Number of stored translations
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no translation is stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether entries were added since load or the last persist
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Write all entries to a temp file next to the cache file, then rename it
    /// over the old one
    pub async fn persist(&self) -> Result<()> {
        let mut entries: Vec<(String, String)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();

        let count = entries.len();
        let file = CacheFile {
            entries,
            last_updated: chrono::Utc::now(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes(), None))
            .await
            .map_err(|e| DocsError::file(&self.path, e))??;

        self.dirty.store(false, Ordering::SeqCst);
        debug!("Saved {} translations to {}", count, self.path.display());
        Ok(())
    }
}

/// Stage `bytes` in a temp file beside `path`, stamp it with `modified` if
/// given, then rename it over `path`. A crash at any point leaves either the
/// old file or the complete new one.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], modified: Option<SystemTime>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| DocsError::file(&dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| DocsError::file(&dir, e))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    // temp files are created owner-only
    match std::fs::metadata(path) {
        Ok(existing) => tmp.as_file().set_permissions(existing.permissions())?,
        Err(_) => set_default_permissions(tmp.as_file())?,
    }
    if let Some(modified) = modified {
        tmp.as_file().set_modified(modified)?;
    }

    tmp.persist(path).map_err(|e| DocsError::file(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
