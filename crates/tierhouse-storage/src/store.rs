//! Tier Stores
//!
//! Per-tier persistence behind the [`TierStore`] trait. The file-backed
//! implementation keeps one payload file per record inside the tier's
//! directory and an in-memory index (identifier -> metadata) rebuilt by a
//! single directory scan when the store is opened.
//!
//! ## File Layout
//!
//! ```text
//! data/cool/
//!   BILL-00001.5.json.gz     gzip payload written at level 5
//!   BILL-00002.json          uncompressed payload
//!   BILL-00003.9.json.gz.tmp in-progress write, ignored and removed on open
//! ```
//!
//! The compression level is part of the file name so it survives restarts
//! without a side-car metadata file. Identifiers never contain dots, which
//! keeps the name unambiguous.
//!
//! ## Atomicity
//!
//! Every write goes to a `.tmp` file first and is then renamed into place, so
//! a write that fails partway never leaves a readable partial payload.
//! Callers serialize operations on a single identifier with [`crate::KeyLocks`];
//! the store itself only guards its index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tierhouse_core::{CompressionLevel, Record, RecordId, TierLocation};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};

const PLAIN_SUFFIX: &str = ".json";
const GZIP_SUFFIX: &str = ".json.gz";
const TMP_SUFFIX: &str = ".tmp";

/// Store-side metadata for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// gzip level the payload was written with, `None` when uncompressed
    pub compression: Option<CompressionLevel>,

    /// Payload size on disk
    pub size_bytes: u64,
}

impl EntryMeta {
    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }
}

/// Raw payload bytes as stored, before decoding.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    pub id: RecordId,
    pub tier: TierLocation,
    pub meta: EntryMeta,
    pub data: Bytes,
}

/// A decoded record together with where and how it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: Record,
    pub tier: TierLocation,
    pub meta: EntryMeta,
}

impl StoredRecord {
    pub fn is_compressed(&self) -> bool {
        self.meta.is_compressed()
    }
}

/// Persistence contract for one tier.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Location this store represents.
    fn tier(&self) -> TierLocation;

    /// Snapshot of every entry with its metadata. Order is unspecified.
    async fn entries(&self) -> Vec<(RecordId, EntryMeta)>;

    /// Metadata for a single entry, if present.
    async fn metadata(&self, id: &RecordId) -> Option<EntryMeta>;

    /// Read the stored bytes without decoding them.
    ///
    /// Fails with [`Error::MissingFromTier`] when the identifier is absent.
    async fn read_payload(&self, id: &RecordId) -> Result<StoredPayload>;

    /// Encode `record` with the given compression and persist it, replacing
    /// any previous entry for the same identifier.
    async fn write(&self, record: &Record, compression: Option<CompressionLevel>)
        -> Result<EntryMeta>;

    /// Remove an entry. Fails with [`Error::MissingFromTier`] when absent.
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Identifiers currently present. Advisory snapshot.
    async fn list_ids(&self) -> Vec<RecordId> {
        self.entries().await.into_iter().map(|(id, _)| id).collect()
    }

    async fn exists(&self, id: &RecordId) -> bool {
        self.metadata(id).await.is_some()
    }

    /// Read and decode an entry.
    ///
    /// A payload that does not decode is reported as [`Error::CorruptRecord`].
    async fn read(&self, id: &RecordId) -> Result<StoredRecord> {
        let payload = self.read_payload(id).await?;
        let record = codec::decode(&payload.data, payload.meta.is_compressed())
            .map_err(|e| Error::corrupt(id, payload.tier, e))?;
        if &record.id != id {
            return Err(Error::corrupt(
                id,
                payload.tier,
                format!("payload carries identifier {}", record.id),
            ));
        }
        Ok(StoredRecord {
            record,
            tier: payload.tier,
            meta: payload.meta,
        })
    }
}

/// The three lifecycle stores, addressable by location.
#[derive(Clone)]
pub struct TierSet {
    hot: Arc<dyn TierStore>,
    cool: Arc<dyn TierStore>,
    archive: Arc<dyn TierStore>,
}

impl TierSet {
    pub fn new(
        hot: Arc<dyn TierStore>,
        cool: Arc<dyn TierStore>,
        archive: Arc<dyn TierStore>,
    ) -> Self {
        Self { hot, cool, archive }
    }

    /// Open file-backed stores for every lifecycle tier under `data_dir`.
    pub async fn open_files(data_dir: &Path) -> Result<Self> {
        let open = |tier: TierLocation| FileTierStore::open(data_dir.join(tier.dir_name()), tier);
        Ok(Self::new(
            Arc::new(open(TierLocation::Hot).await?),
            Arc::new(open(TierLocation::Cool).await?),
            Arc::new(open(TierLocation::Archive).await?),
        ))
    }

    /// Store for a lifecycle tier. The rehydrated cache is not part of the set.
    pub fn get(&self, tier: TierLocation) -> Option<&Arc<dyn TierStore>> {
        match tier {
            TierLocation::Hot => Some(&self.hot),
            TierLocation::Cool => Some(&self.cool),
            TierLocation::Archive => Some(&self.archive),
            TierLocation::RehydratedCache => None,
        }
    }

    /// Stores in probe order: Hot, Cool, Archive.
    pub fn iter(&self) -> impl Iterator<Item = (TierLocation, &Arc<dyn TierStore>)> {
        [
            (TierLocation::Hot, &self.hot),
            (TierLocation::Cool, &self.cool),
            (TierLocation::Archive, &self.archive),
        ]
        .into_iter()
    }

    /// Lifecycle tiers currently holding `id`.
    pub async fn locate(&self, id: &RecordId) -> Vec<TierLocation> {
        let mut found = Vec::new();
        for (tier, store) in self.iter() {
            if store.exists(id).await {
                found.push(tier);
            }
        }
        found
    }
}

/// A [`TierStore`] that keeps one file per record in a directory.
pub struct FileTierStore {
    tier: TierLocation,
    directory: PathBuf,
    index: RwLock<HashMap<RecordId, EntryMeta>>,
}

impl FileTierStore {
    /// Open (creating if needed) the store rooted at `directory` and rebuild
    /// its index from the files present.
    pub async fn open(directory: impl AsRef<Path>, tier: TierLocation) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory).await?;

        let index = scan(&directory, tier).await?;
        debug!(
            tier = %tier,
            directory = %directory.display(),
            entries = index.len(),
            "Opened tier store"
        );

        Ok(Self {
            tier,
            directory,
            index: RwLock::new(index),
        })
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    fn payload_path(&self, id: &RecordId, compression: Option<CompressionLevel>) -> PathBuf {
        self.directory.join(file_name(id, compression))
    }
}

#[async_trait]
impl TierStore for FileTierStore {
    fn tier(&self) -> TierLocation {
        self.tier
    }

    async fn entries(&self) -> Vec<(RecordId, EntryMeta)> {
        self.index
            .read()
            .await
            .iter()
            .map(|(id, meta)| (id.clone(), *meta))
            .collect()
    }

    async fn metadata(&self, id: &RecordId) -> Option<EntryMeta> {
        self.index.read().await.get(id).copied()
    }

    async fn read_payload(&self, id: &RecordId) -> Result<StoredPayload> {
        let meta = self.metadata(id).await.ok_or_else(|| Error::MissingFromTier {
            id: id.clone(),
            tier: self.tier,
        })?;

        let path = self.payload_path(id, meta.compression);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(StoredPayload {
                id: id.clone(),
                tier: self.tier,
                meta,
                data: Bytes::from(data),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The file was removed behind our back; drop the stale entry.
                self.index.write().await.remove(id);
                warn!(record_id = %id, tier = %self.tier, "Indexed payload missing on disk");
                Err(Error::MissingFromTier {
                    id: id.clone(),
                    tier: self.tier,
                })
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn write(
        &self,
        record: &Record,
        compression: Option<CompressionLevel>,
    ) -> Result<EntryMeta> {
        let id = &record.id;
        let data = codec::encode(record, compression)?;

        let final_path = self.payload_path(id, compression);
        let tmp = tmp_path(&final_path);

        // Write to temporary file first
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(e));
        }

        // Atomic rename
        if let Err(e) = tokio::fs::rename(&tmp, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(e));
        }

        let meta = EntryMeta {
            compression,
            size_bytes: data.len() as u64,
        };
        let previous = self.index.write().await.insert(id.clone(), meta);

        // A rewrite at a different level lands under a different name.
        if let Some(previous) = previous {
            if previous.compression != compression {
                let stale = self.payload_path(id, previous.compression);
                if let Err(e) = tokio::fs::remove_file(&stale).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            record_id = %id,
                            tier = %self.tier,
                            error = %e,
                            "Failed to remove superseded payload"
                        );
                    }
                }
            }
        }

        debug!(
            record_id = %id,
            tier = %self.tier,
            bytes = data.len(),
            compression = ?compression.map(|l| l.get()),
            "Wrote record"
        );
        Ok(meta)
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let meta = self.metadata(id).await.ok_or_else(|| Error::MissingFromTier {
            id: id.clone(),
            tier: self.tier,
        })?;

        let path = self.payload_path(id, meta.compression);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(record_id = %id, tier = %self.tier, "Payload already gone on delete");
            }
            Err(e) => return Err(Error::Io(e)),
        }

        self.index.write().await.remove(id);
        debug!(record_id = %id, tier = %self.tier, "Deleted record");
        Ok(())
    }
}

/// File name for an entry: `{id}.json` or `{id}.{level}.json.gz`.
pub(crate) fn file_name(id: &RecordId, compression: Option<CompressionLevel>) -> String {
    match compression {
        None => format!("{}{}", id, PLAIN_SUFFIX),
        Some(level) => format!("{}.{}{}", id, level, GZIP_SUFFIX),
    }
}

/// Inverse of [`file_name`]. Returns `None` for names this store did not write.
pub(crate) fn parse_file_name(name: &str) -> Option<(RecordId, Option<CompressionLevel>)> {
    if let Some(stem) = name.strip_suffix(GZIP_SUFFIX) {
        let (id, level) = stem.rsplit_once('.')?;
        let level = CompressionLevel::new(level.parse().ok()?).ok()?;
        return Some((RecordId::new(id).ok()?, Some(level)));
    }
    let stem = name.strip_suffix(PLAIN_SUFFIX)?;
    Some((RecordId::new(stem).ok()?, None))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

async fn scan(directory: &Path, tier: TierLocation) -> Result<HashMap<RecordId, EntryMeta>> {
    let mut found: HashMap<RecordId, (EntryMeta, SystemTime)> = HashMap::new();
    let mut dir = tokio::fs::read_dir(directory).await?;

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();

        if name.ends_with(TMP_SUFFIX) {
            debug!(tier = %tier, file = %name, "Removing abandoned temporary file");
            let _ = tokio::fs::remove_file(entry.path()).await;
            continue;
        }

        let Some((id, compression)) = parse_file_name(&name) else {
            debug!(tier = %tier, file = %name, "Ignoring unrecognised file");
            continue;
        };

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let meta = EntryMeta {
            compression,
            size_bytes: metadata.len(),
        };

        // Two names for one id means a rewrite stopped before the old file
        // was removed. The newer file wins.
        let previous = found
            .get(&id)
            .map(|(existing, existing_modified)| (existing.compression, *existing_modified));
        match previous {
            Some((_, existing_modified)) if existing_modified > modified => {
                let _ = tokio::fs::remove_file(entry.path()).await;
                debug!(record_id = %id, tier = %tier, file = %name, "Removed superseded payload");
            }
            Some((existing_compression, _)) => {
                let stale = directory.join(file_name(&id, existing_compression));
                let _ = tokio::fs::remove_file(stale).await;
                found.insert(id, (meta, modified));
            }
            None => {
                found.insert(id, (meta, modified));
            }
        }
    }

    Ok(found.into_iter().map(|(id, (meta, _))| (id, meta)).collect())
}
