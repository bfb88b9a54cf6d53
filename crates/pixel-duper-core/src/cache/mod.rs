//! Incremental per-file cache of content hashes and signatures.
//!
//! Staleness is decided on two levels. A file whose modification time still
//! matches the cached timestamp is not rehashed at all. A file that is
//! rehashed keeps its cached signature only when the new hash equals the
//! stored one.

pub mod store;

use crate::error::Error;
use crate::file_id::FileId;
use crate::hasher::HashDigest;
use crate::signature::Signature;
use ahash::AHashMap;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use store::{CacheDocument, CacheRecord, GridStamp};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: HashDigest,
    pub timestamp: String,
    /// Raw cell averages computed from the content identified by `hash`.
    pub signature: Option<Signature>,
}

/// Render a modification time with nanosecond precision so equal strings mean equal times.
pub fn format_timestamp(mtime: SystemTime) -> String {
    DateTime::<Utc>::from(mtime).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub struct SignatureCache {
    grid_width: u32,
    grid_height: u32,
    entries: RwLock<AHashMap<FileId, CacheEntry>>,
    recomputes: AtomicUsize,
}

impl SignatureCache {
    pub fn new(grid_width: u32, grid_height: u32) -> Self {
        Self {
            grid_width,
            grid_height,
            entries: RwLock::new(AHashMap::new()),
            recomputes: AtomicUsize::new(0),
        }
    }

    /// Load the cache document at `path`. A missing, unreadable or
    /// differently-gridded document yields an empty cache.
    pub fn load(path: &Path, grid_width: u32, grid_height: u32) -> Self {
        let cache = Self::new(grid_width, grid_height);
        let doc = match store::read_document(path) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!("No cache at '{}', starting cold", path.display());
                return cache;
            }
            Err(e) => {
                warn!("Ignoring unreadable cache '{}': {}", path.display(), e);
                return cache;
            }
        };

        if let Err(e) = doc.check_grid(grid_width, grid_height) {
            info!("Stale cache ignored: {}", e);
            return cache;
        }

        {
            let mut entries = cache.write();
            for (path, record) in doc.files {
                entries.insert(FileId::new(path), CacheEntry::from(record));
            }
            info!("Loaded {} cache entries", entries.len());
        }
        cache
    }

    /// Persist the cache if anything was recomputed this run. Returns whether a write happened.
    /// Paths that are not valid UTF-8 have no document key and are left out.
    pub fn save(&self, path: &Path) -> Result<bool, Error> {
        if self.recomputes() == 0 {
            debug!("Cache unchanged, not saving");
            return Ok(false);
        }
        let doc = {
            let entries = self.read();
            CacheDocument {
                grid: GridStamp {
                    x: self.grid_width,
                    y: self.grid_height,
                },
                files: entries
                    .iter()
                    .filter_map(|(id, entry)| match id.to_str() {
                        Some(key) => Some((key.to_string(), CacheRecord::from(entry))),
                        None => {
                            debug!("Not caching non-UTF-8 path {}", id);
                            None
                        }
                    })
                    .collect(),
            }
        };
        store::write_document(path, &doc)?;
        info!("Saved {} cache entries to '{}'", doc.files.len(), path.display());
        Ok(true)
    }

    pub fn is_fresh(&self, id: &FileId, timestamp: &str) -> bool {
        self.read()
            .get(id)
            .is_some_and(|entry| entry.timestamp == timestamp)
    }

    /// Record a freshly computed content hash. Returns true when the content
    /// differs from what was cached, in which case any cached signature is dropped.
    pub fn record_hash(&self, id: &FileId, timestamp: String, hash: HashDigest) -> bool {
        let mut entries = self.write();
        let entry = entries.entry(id.clone()).or_default();

        let changed = entry.hash.is_empty() || entry.hash != hash;
        if changed {
            trace!("Content changed for {}", id);
            *entry = CacheEntry {
                hash,
                ..CacheEntry::default()
            };
            self.recomputes.fetch_add(1, Ordering::Relaxed);
        }

        if entry.timestamp != timestamp {
            entry.timestamp = timestamp;
            self.recomputes.fetch_add(1, Ordering::Relaxed);
        }

        changed
    }

    pub fn has_signature(&self, id: &FileId) -> bool {
        self.read()
            .get(id)
            .and_then(|entry| entry.signature.as_ref())
            .is_some_and(|sig| !sig.is_empty())
    }

    /// Cached signature for `id`, or `None` if absent or no longer valid for the current grid.
    pub fn signature(&self, id: &FileId) -> Option<Signature> {
        let entries = self.read();
        let sig = entries.get(id)?.signature.as_ref()?;
        if sig.is_empty() || !sig.fits_grid(self.grid_width, self.grid_height) {
            warn!("Cached signature for {} is inconsistent, recomputing", id);
            return None;
        }
        Some(sig.clone())
    }

    /// Attach a signature to an existing entry. Files never hashed have no
    /// entry to attach to and are left uncached.
    pub fn store_signature(&self, id: &FileId, signature: Signature) {
        match self.write().get_mut(id) {
            Some(entry) => entry.signature = Some(signature),
            None => trace!("No cache entry for {}, signature not stored", id),
        }
    }

    pub fn remove_entry(&self, id: &FileId) {
        if self.write().remove(id).is_some() {
            self.recomputes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn entry(&self, id: &FileId) -> Option<CacheEntry> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Count a change that must be persisted; the cache is only saved when this is non-zero.
    pub fn mark_recompute(&self) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recomputes(&self) -> usize {
        self.recomputes.load(Ordering::Relaxed)
    }

    fn read(&self) -> RwLockReadGuard<'_, AHashMap<FileId, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AHashMap<FileId, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Color, GridPoint};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    fn sample_signature() -> Signature {
        (0..3)
            .flat_map(|x| (0..3).map(move |y| (GridPoint::new(x, y), Color::gray(40))))
            .collect()
    }

    #[test]
    fn test_timestamp_keeps_subsecond_precision() {
        let a = UNIX_EPOCH + Duration::new(1_700_000_000, 1);
        let b = UNIX_EPOCH + Duration::new(1_700_000_000, 2);
        assert_ne!(format_timestamp(a), format_timestamp(b));
        assert_eq!(format_timestamp(a), format_timestamp(a));
    }

    #[test]
    fn test_freshness_round_trip() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/a.png");
        assert!(!cache.is_fresh(&id, "T1"));
        cache.record_hash(&id, "T1".into(), "h1".into());
        assert!(cache.is_fresh(&id, "T1"));
        assert!(!cache.is_fresh(&id, "T2"));
    }

    #[test]
    fn test_new_file_counts_as_changed() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/a.png");
        assert!(cache.record_hash(&id, "T1".into(), "h1".into()));
        // content change plus timestamp change
        assert_eq!(cache.recomputes(), 2);
        assert!(!cache.record_hash(&id, "T1".into(), "h1".into()));
        assert_eq!(cache.recomputes(), 2);
    }

    #[test]
    fn test_hash_change_invalidates_signature() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/a.png");
        cache.record_hash(&id, "T1".into(), "h1".into());
        cache.store_signature(&id, sample_signature());
        assert!(cache.has_signature(&id));

        let before = cache.recomputes();
        assert!(cache.record_hash(&id, "T1".into(), "h2".into()));
        assert!(!cache.has_signature(&id));
        assert!(cache.recomputes() > before);
    }

    #[test]
    fn test_touch_without_content_change_keeps_signature() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/a.png");
        cache.record_hash(&id, "T1".into(), "h1".into());
        cache.store_signature(&id, sample_signature());

        let before = cache.recomputes();
        assert!(!cache.record_hash(&id, "T2".into(), "h1".into()));
        assert!(cache.has_signature(&id));
        assert_eq!(cache.recomputes(), before + 1);
        assert!(cache.is_fresh(&id, "T2"));
    }

    #[test]
    fn test_signature_outside_grid_treated_as_miss() {
        let cache = SignatureCache::new(2, 2);
        let id = FileId::new("/a.png");
        cache.record_hash(&id, "T1".into(), "h1".into());
        cache.store_signature(&id, sample_signature());
        assert!(cache.has_signature(&id));
        assert!(cache.signature(&id).is_none());
    }

    #[test]
    fn test_store_signature_needs_entry() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/never-hashed.png");
        cache.store_signature(&id, sample_signature());
        assert!(!cache.contains(&id));
    }

    #[test]
    fn test_remove_entry() {
        let cache = SignatureCache::new(3, 3);
        let id = FileId::new("/a.png");
        cache.record_hash(&id, "T1".into(), "h1".into());
        cache.remove_entry(&id);
        assert!(!cache.contains(&id));
        assert!(!cache.is_fresh(&id, "T1"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let id = FileId::new("/a.png");

        let cache = SignatureCache::new(3, 3);
        cache.record_hash(&id, "T1".into(), "h1".into());
        cache.store_signature(&id, sample_signature());
        assert!(cache.save(&path).unwrap());

        let loaded = SignatureCache::load(&path, 3, 3);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.is_fresh(&id, "T1"));
        assert_eq!(loaded.signature(&id), Some(sample_signature()));
        assert_eq!(loaded.recomputes(), 0);
    }

    #[test]
    fn test_unchanged_cache_not_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = SignatureCache::new(3, 3);
        assert!(!cache.save(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_grid_mismatch_discards_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = SignatureCache::new(3, 3);
        cache.record_hash(&FileId::new("/a.png"), "T1".into(), "h1".into());
        cache.save(&path).unwrap();

        assert!(SignatureCache::load(&path, 4, 4).is_empty());
    }

    #[test]
    fn test_corrupt_cache_is_cold_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(SignatureCache::load(&path, 3, 3).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_left_out_of_document() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let plain = FileId::new("/a.png");
        let odd = FileId::new(OsStr::from_bytes(b"/x\xff.png"));

        let cache = SignatureCache::new(3, 3);
        cache.record_hash(&plain, "T1".into(), "h1".into());
        cache.record_hash(&odd, "T1".into(), "h2".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.save(&path).unwrap());

        let loaded = SignatureCache::load(&path, 3, 3);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains(&plain));
    }
}
