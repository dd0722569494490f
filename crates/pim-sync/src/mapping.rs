//! Identity mapping store: local product code -> remote product id, and local
//! collection path -> remote collection id.
//!
//! Remote ids are permanent once assigned. A `record_*` call for a key that
//! is already mapped never overwrites it; a conflicting id is logged and
//! refused. The store is a cache of the remote catalog, not the source of
//! truth, so an unreadable file degrades to an empty map instead of failing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::properties;

/// Durable local <-> remote identity mapping.
///
/// Implementations are not internally synchronized; the orchestrator holds
/// the single writer.
pub trait IdentityStore: Send {
    fn product_id(&self, code: &str) -> Option<u64>;

    /// Records `code -> id`. Returns `true` when a new entry was written.
    fn record_product(&mut self, code: &str, id: u64) -> bool;

    fn collection_id(&self, path: &str) -> Option<u64>;

    /// Records `path -> id`. Returns `true` when a new entry was written.
    fn record_collection(&mut self, path: &str, id: u64) -> bool;

    /// Captures the current state as a write that can run off the async
    /// executor. `None` when everything recorded so far is already durable.
    fn flush_job(&self) -> Option<FlushJob>;

    /// Marks the state captured by `job` as durable.
    fn mark_flushed(&mut self, job: &FlushJob);

    /// Flushes pending entries to durable storage on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] when the backing storage cannot be written.
    fn persist(&mut self) -> Result<(), SyncError> {
        if let Some(job) = self.flush_job() {
            job.write()?;
            self.mark_flushed(&job);
        }
        Ok(())
    }
}

/// Rendered mapping files, detached from the store that produced them.
#[derive(Debug, Clone)]
pub struct FlushJob {
    generation: u64,
    files: Vec<(PathBuf, String)>,
}

impl FlushJob {
    /// Writes every file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] for the first file that cannot be written.
    pub fn write(&self) -> Result<(), SyncError> {
        for (path, contents) in &self.files {
            properties::write_atomic(path, contents).map_err(|e| SyncError::io(path, e))?;
        }
        Ok(())
    }
}

/// Counts accepted inserts against the last durable point.
#[derive(Debug, Clone, Copy, Default)]
struct Generations {
    current: u64,
    flushed: u64,
}

impl Generations {
    fn bump(&mut self, inserted: bool) -> bool {
        if inserted {
            self.current += 1;
        }
        inserted
    }

    fn is_clean(self) -> bool {
        self.current == self.flushed
    }

    fn mark(&mut self, job: &FlushJob) {
        self.flushed = self.flushed.max(job.generation);
    }
}

/// Insert-only map shared by both store implementations.
#[derive(Debug, Clone)]
struct IdMap {
    label: &'static str,
    entries: BTreeMap<String, u64>,
}

impl IdMap {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: BTreeMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    fn insert_new(&mut self, key: &str, id: u64) -> bool {
        match self.entries.get(key) {
            Some(existing) if *existing == id => false,
            Some(existing) => {
                tracing::warn!(
                    mapping = self.label,
                    key,
                    existing = *existing,
                    refused = id,
                    "refusing to overwrite an assigned remote id"
                );
                false
            }
            None => {
                self.entries.insert(key.to_owned(), id);
                true
            }
        }
    }

    fn render(&self) -> String {
        properties::render(
            "local key -> remote id",
            self.entries.iter().map(|(k, v)| (k.as_str(), v.to_string())),
        )
    }

    /// Loads a mapping file. A missing file is an empty map; an unreadable
    /// file or a malformed entry is logged and skipped.
    fn load(label: &'static str, path: &Path) -> Self {
        let mut map = Self::new(label);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return map,
            Err(e) => {
                let err = SyncError::MappingCorruption {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "starting with an empty mapping");
                return map;
            }
        };

        for (key, value) in properties::parse(&text) {
            match value.parse::<u64>() {
                Ok(id) if !key.is_empty() => {
                    map.insert_new(&key, id);
                }
                _ => {
                    tracing::warn!(
                        path = %path.display(),
                        key = %key,
                        value = %value,
                        "skipping malformed mapping entry"
                    );
                }
            }
        }
        map
    }
}

/// Reads one id from a shared `key=value` file, such as the per-source
/// default collection file. A missing file, key or malformed value is `None`.
#[must_use]
pub fn lookup_id(path: &Path, key: &str) -> Option<u64> {
    IdMap::load("lookup", path).get(key)
}

/// Mapping store backed by two `key=value` files in the export directory.
#[derive(Debug)]
pub struct FileIdentityStore {
    product_file: PathBuf,
    collection_file: PathBuf,
    products: IdMap,
    collections: IdMap,
    generations: Generations,
}

impl FileIdentityStore {
    /// Loads both mapping files, treating missing or unreadable files as empty.
    #[must_use]
    pub fn load(product_file: impl Into<PathBuf>, collection_file: impl Into<PathBuf>) -> Self {
        let product_file = product_file.into();
        let collection_file = collection_file.into();
        let products = IdMap::load("product", &product_file);
        let collections = IdMap::load("collection", &collection_file);
        tracing::debug!(
            products = products.entries.len(),
            collections = collections.entries.len(),
            "identity mappings loaded"
        );
        Self {
            product_file,
            collection_file,
            products,
            collections,
            generations: Generations::default(),
        }
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.entries.len()
    }

    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.collections.entries.len()
    }
}

impl IdentityStore for FileIdentityStore {
    fn product_id(&self, code: &str) -> Option<u64> {
        self.products.get(code)
    }

    fn record_product(&mut self, code: &str, id: u64) -> bool {
        let inserted = self.products.insert_new(code, id);
        self.generations.bump(inserted)
    }

    fn collection_id(&self, path: &str) -> Option<u64> {
        self.collections.get(path)
    }

    fn record_collection(&mut self, path: &str, id: u64) -> bool {
        let inserted = self.collections.insert_new(path, id);
        self.generations.bump(inserted)
    }

    fn flush_job(&self) -> Option<FlushJob> {
        if self.generations.is_clean() {
            return None;
        }
        Some(FlushJob {
            generation: self.generations.current,
            files: vec![
                (self.product_file.clone(), self.products.render()),
                (self.collection_file.clone(), self.collections.render()),
            ],
        })
    }

    fn mark_flushed(&mut self, job: &FlushJob) {
        self.generations.mark(job);
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MemoryIdentityStore {
    products: IdMap,
    collections: IdMap,
    generations: Generations,
    persist_count: usize,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self {
            products: IdMap::new("product"),
            collections: IdMap::new("collection"),
            generations: Generations::default(),
            persist_count: 0,
        }
    }
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushes that had something to write.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.entries.len()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn product_id(&self, code: &str) -> Option<u64> {
        self.products.get(code)
    }

    fn record_product(&mut self, code: &str, id: u64) -> bool {
        let inserted = self.products.insert_new(code, id);
        self.generations.bump(inserted)
    }

    fn collection_id(&self, path: &str) -> Option<u64> {
        self.collections.get(path)
    }

    fn record_collection(&mut self, path: &str, id: u64) -> bool {
        let inserted = self.collections.insert_new(path, id);
        self.generations.bump(inserted)
    }

    fn flush_job(&self) -> Option<FlushJob> {
        (!self.generations.is_clean()).then(|| FlushJob {
            generation: self.generations.current,
            files: Vec::new(),
        })
    }

    fn mark_flushed(&mut self, job: &FlushJob) {
        self.generations.mark(job);
        self.persist_count += 1;
    }
}
