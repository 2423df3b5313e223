//! # RocksDB Storage Adapter
//!
//! Durable implementations of `LogRepository` and `MappingRepository`.
//!
//! ## Column Families
//!
//! - `communication_logs` - log entries and the parent/child index
//! - `mappings` - identifier mappings and recorded conflicts
//! - `metadata` - id counters
//!
//! ## Key Layout
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `L` | `L` + id (u64 BE) | `CommunicationLog` JSON |
//! | `C` | `C` + parent (u64 BE) + child (u64 BE) | empty |
//! | `M` | `M` + institution + `0x00` + external id | `IdentifierMapping` JSON |
//! | `X` | `X` + sequence (u64 BE) | `MappingConflict` JSON |
//!
//! Big-endian ids keep iteration in id order.

use fg_01_communication_log::{CommunicationLog, LogError, LogId, LogRepository};
use fg_02_identifier_mapping::{
    IdentifierMapping, InsertOutcome, MappingConflict, MappingError, MappingKey, MappingRepository,
};
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::InstitutionId;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Column family names
pub const CF_COMMUNICATION_LOGS: &str = "communication_logs";
pub const CF_MAPPINGS: &str = "mappings";
pub const CF_METADATA: &str = "metadata";

/// All column families used by the gateway
pub const COLUMN_FAMILIES: &[&str] = &[CF_COMMUNICATION_LOGS, CF_MAPPINGS, CF_METADATA];

const LOG_PREFIX: u8 = b'L';
const CHILD_PREFIX: u8 = b'C';
const MAPPING_PREFIX: u8 = b'M';
const CONFLICT_PREFIX: u8 = b'X';

const LOG_SEQUENCE: &[u8] = b"log_sequence";
const CONFLICT_SEQUENCE: &[u8] = b"conflict_sequence";

/// Low-level storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The database could not be opened.
    #[error("Failed to open RocksDB: {0}")]
    Open(String),

    /// A read or write failed.
    #[error("RocksDB operation failed: {0}")]
    Io(String),

    /// A stored value does not decode.
    #[error("Corrupt stored value: {0}")]
    Codec(String),

    /// A column family is missing from the opened database.
    #[error("Missing column family: {0}")]
    MissingColumnFamily(&'static str),
}

impl From<StorageError> for LogError {
    fn from(e: StorageError) -> Self {
        LogError::Storage(e.to_string())
    }
}

impl From<StorageError> for MappingError {
    fn from(e: StorageError) -> Self {
        MappingError::Storage(e.to_string())
    }
}

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 32MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/rocksdb".to_string(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }

    /// Default tuning rooted at `data_dir/rocksdb`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("rocksdb").to_string_lossy().to_string(),
            ..Default::default()
        }
    }
}

/// Shared handle on the gateway database.
pub struct RocksDbStore {
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database with all column families.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn get(&self, cf: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let db = self.db.read();
        let handle = db.cf_handle(cf).ok_or(StorageError::MissingColumnFamily(cf))?;
        db.get_cf(handle, key)
            .map_err(|e| StorageError::Io(format!("get failed: {e}")))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf: &'static str,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        self.get(cf, key)?.map(|bytes| decode(&bytes)).transpose()
    }

    /// Apply `(column family, key, value)` puts atomically.
    fn put_all(&self, puts: Vec<(&'static str, Vec<u8>, Vec<u8>)>) -> Result<(), StorageError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        for (cf, key, value) in puts {
            let handle = db.cf_handle(cf).ok_or(StorageError::MissingColumnFamily(cf))?;
            batch.put_cf(handle, key, value);
        }
        db.write_opt(batch, &self.write_options())
            .map_err(|e| StorageError::Io(format!("batch write failed: {e}")))
    }

    /// Every `(key, value)` whose key starts with `prefix`, in key order.
    fn scan_prefix(
        &self,
        cf: &'static str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let db = self.db.read();
        let handle = db.cf_handle(cf).ok_or(StorageError::MissingColumnFamily(cf))?;
        let mut entries = Vec::new();
        for item in db.iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::Io(format!("scan failed: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    /// Increment and return a counter kept in `metadata`.
    ///
    /// Callers serialize access with their own lock.
    fn next_sequence(&self, name: &[u8]) -> Result<u64, StorageError> {
        let current = match self.get(CF_METADATA, name)? {
            Some(bytes) => u64_from(&bytes)?,
            None => 0,
        };
        let next = current + 1;
        self.put_all(vec![(CF_METADATA, name.to_vec(), next.to_be_bytes().to_vec())])?;
        Ok(next)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Codec(e.to_string()))
}

fn u64_from(bytes: &[u8]) -> Result<u64, StorageError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Codec(format!("expected 8 bytes, found {}", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

fn log_key(id: LogId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(LOG_PREFIX);
    key.extend_from_slice(&id.0.to_be_bytes());
    key
}

fn child_prefix(parent: LogId) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(CHILD_PREFIX);
    key.extend_from_slice(&parent.0.to_be_bytes());
    key
}

fn child_key(parent: LogId, child: LogId) -> Vec<u8> {
    let mut key = child_prefix(parent);
    key.extend_from_slice(&child.0.to_be_bytes());
    key
}

fn institution_prefix(institution: &InstitutionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(institution.as_str().len() + 2);
    key.push(MAPPING_PREFIX);
    key.extend_from_slice(institution.as_str().as_bytes());
    key.push(0);
    key
}

fn mapping_key(key: &MappingKey) -> Vec<u8> {
    let mut bytes = institution_prefix(&key.institution_id);
    bytes.extend_from_slice(key.external_id.as_bytes());
    bytes
}

// =============================================================================
// Communication Log Repository
// =============================================================================

/// `LogRepository` over RocksDB.
pub struct RocksDbLogRepository {
    store: Arc<RocksDbStore>,
    sequence: Mutex<()>,
}

impl RocksDbLogRepository {
    /// Repository on an opened store.
    pub fn new(store: Arc<RocksDbStore>) -> Self {
        Self {
            store,
            sequence: Mutex::new(()),
        }
    }
}

impl LogRepository for RocksDbLogRepository {
    fn next_id(&self) -> Result<LogId, LogError> {
        let _guard = self.sequence.lock();
        Ok(LogId(self.store.next_sequence(LOG_SEQUENCE)?))
    }

    fn insert(&self, log: CommunicationLog) -> Result<(), LogError> {
        let mut puts = vec![(CF_COMMUNICATION_LOGS, log_key(log.id), encode(&log)?)];
        if let Some(parent) = log.parent_id {
            puts.push((CF_COMMUNICATION_LOGS, child_key(parent, log.id), Vec::new()));
        }
        Ok(self.store.put_all(puts)?)
    }

    fn update(&self, log: CommunicationLog) -> Result<(), LogError> {
        let key = log_key(log.id);
        if self.store.get(CF_COMMUNICATION_LOGS, &key)?.is_none() {
            return Err(LogError::NotFound(log.id));
        }
        Ok(self.store.put_all(vec![(CF_COMMUNICATION_LOGS, key, encode(&log)?)])?)
    }

    fn get(&self, id: LogId) -> Result<Option<CommunicationLog>, LogError> {
        Ok(self.store.get_json(CF_COMMUNICATION_LOGS, &log_key(id))?)
    }

    fn children_of(&self, id: LogId) -> Result<Vec<CommunicationLog>, LogError> {
        let prefix = child_prefix(id);
        let mut children = Vec::new();
        for (key, _) in self.store.scan_prefix(CF_COMMUNICATION_LOGS, &prefix)? {
            let child = LogId(u64_from(&key[prefix.len()..])?);
            if let Some(log) = self.get(child)? {
                children.push(log);
            }
        }
        Ok(children)
    }

    fn scan(&self) -> Result<Vec<CommunicationLog>, LogError> {
        self.store
            .scan_prefix(CF_COMMUNICATION_LOGS, &[LOG_PREFIX])?
            .into_iter()
            .map(|(_, value)| decode(&value).map_err(LogError::from))
            .collect()
    }
}

// =============================================================================
// Identifier Mapping Repository
// =============================================================================

/// `MappingRepository` over RocksDB.
///
/// Unique inserts and conflict sequencing run under one writer lock.
pub struct RocksDbMappingRepository {
    store: Arc<RocksDbStore>,
    writer: Mutex<()>,
}

impl RocksDbMappingRepository {
    /// Repository on an opened store.
    pub fn new(store: Arc<RocksDbStore>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }
}

impl MappingRepository for RocksDbMappingRepository {
    fn get(&self, key: &MappingKey) -> Result<Option<IdentifierMapping>, MappingError> {
        Ok(self.store.get_json(CF_MAPPINGS, &mapping_key(key))?)
    }

    fn insert_unique(&self, mapping: IdentifierMapping) -> Result<InsertOutcome, MappingError> {
        let _guard = self.writer.lock();
        let key = mapping_key(&mapping.key);
        if let Some(existing) = self.store.get_json(CF_MAPPINGS, &key)? {
            return Ok(InsertOutcome::Duplicate(existing));
        }
        self.store.put_all(vec![(CF_MAPPINGS, key, encode(&mapping)?)])?;
        Ok(InsertOutcome::Inserted)
    }

    fn list_by_institution(
        &self,
        institution: &InstitutionId,
    ) -> Result<Vec<IdentifierMapping>, MappingError> {
        self.store
            .scan_prefix(CF_MAPPINGS, &institution_prefix(institution))?
            .into_iter()
            .map(|(_, value)| decode(&value).map_err(MappingError::from))
            .collect()
    }

    fn record_conflict(&self, conflict: MappingConflict) -> Result<(), MappingError> {
        let _guard = self.writer.lock();
        let sequence = self.store.next_sequence(CONFLICT_SEQUENCE)?;
        let mut key = vec![CONFLICT_PREFIX];
        key.extend_from_slice(&sequence.to_be_bytes());
        Ok(self.store.put_all(vec![(CF_MAPPINGS, key, encode(&conflict)?)])?)
    }

    fn conflicts(&self) -> Result<Vec<MappingConflict>, MappingError> {
        self.store
            .scan_prefix(CF_MAPPINGS, &[CONFLICT_PREFIX])?
            .into_iter()
            .map(|(_, value)| decode(&value).map_err(MappingError::from))
            .collect()
    }
}
