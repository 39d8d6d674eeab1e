use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::models::{ChunkRecord, FileRecord, FileState, ThumbnailRecord};

/// abstract row store for file/chunk/thumbnail metadata. every method is a
/// single transaction; conditional updates report whether they changed a row
/// so callers can implement compare-and-swap style logic on top.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// insert a registered upload. fails with Conflict when an
    /// already-finished file carries the same declared hash.
    async fn insert_file(&self, file: FileRecord) -> Result<()>;

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>>;

    /// commit a chunk row. the (file_id, position) slot must be empty.
    async fn insert_chunk(&self, chunk: ChunkRecord) -> Result<()>;

    async fn chunk_exists(&self, file_id: Uuid, position: u32) -> Result<bool>;

    async fn count_chunks(&self, file_id: Uuid) -> Result<usize>;

    /// committed chunks in ascending position order
    async fn chunks_for_file(&self, file_id: Uuid) -> Result<Vec<ChunkRecord>>;

    /// conditional Incomplete -> Processing. returns true only for the one
    /// caller whose update changed the row; concurrent losers get false.
    async fn try_begin_processing(&self, file_id: Uuid) -> Result<bool>;

    /// conditional Processing -> Finished
    async fn mark_finished(&self, file_id: Uuid) -> Result<bool>;

    /// conditional Processing -> Incomplete, used by explicit re-processing
    async fn revert_processing(&self, file_id: Uuid) -> Result<bool>;

    /// drop any prior thumbnail row for the file and insert the new one,
    /// returning the displaced row if there was one
    async fn replace_thumbnail(&self, thumb: ThumbnailRecord) -> Result<Option<ThumbnailRecord>>;

    async fn thumbnail_for_file(&self, file_id: Uuid) -> Result<Option<ThumbnailRecord>>;

    /// remove and return all chunk rows for a file
    async fn delete_chunks(&self, file_id: Uuid) -> Result<Vec<ChunkRecord>>;

    /// does any live chunk row still reference this content hash
    async fn chunk_hash_referenced(&self, hash: &str) -> Result<bool>;

    /// does any live thumbnail row still reference this content hash
    async fn thumbnail_hash_referenced(&self, hash: &str) -> Result<bool>;

    /// does any live file row declare this content hash as its canonical bytes
    async fn file_hash_referenced(&self, hash: &str) -> Result<bool>;

    /// is this content hash reachable from any live row at all. blobs share
    /// one namespace across chunks, canonical files and thumbnails, so a
    /// removal decision has to clear every axis.
    async fn blob_referenced(&self, hash: &str) -> Result<bool> {
        Ok(self.chunk_hash_referenced(hash).await?
            || self.thumbnail_hash_referenced(hash).await?
            || self.file_hash_referenced(hash).await?)
    }

    /// cascading delete: file row plus its chunks and thumbnail. returns the
    /// removed rows so the caller can clean up blobs.
    #[allow(clippy::type_complexity)]
    async fn delete_file(
        &self,
        id: Uuid,
    ) -> Result<Option<(FileRecord, Vec<ChunkRecord>, Option<ThumbnailRecord>)>>;
}

/// in-memory store over sharded concurrent maps. conditional updates run
/// under the shard write lock, which is what makes try_begin_processing a
/// real compare-and-swap rather than a racy read-then-write.
pub struct MemoryStore {
    files: DashMap<Uuid, FileRecord>,
    chunks: DashMap<Uuid, Vec<ChunkRecord>>,
    thumbnails: DashMap<Uuid, ThumbnailRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            chunks: DashMap::new(),
            thumbnails: DashMap::new(),
        }
    }

    fn transition(&self, id: Uuid, from: FileState, to: FileState) -> Result<bool> {
        match self.files.get_mut(&id) {
            Some(mut file) if file.state == from => {
                file.state = to;
                file.updated_at = chrono::Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(IngestError::NotFound(format!("file {} does not exist", id))),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert_file(&self, file: FileRecord) -> Result<()> {
        let duplicate = self
            .files
            .iter()
            .any(|f| f.hash == file.hash && f.state == FileState::Finished);
        if duplicate {
            return Err(IngestError::Conflict(format!(
                "a finished file with hash {} already exists",
                file.hash
            )));
        }
        self.files.insert(file.id, file);
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self.files.get(&id).map(|f| f.clone()))
    }

    async fn insert_chunk(&self, chunk: ChunkRecord) -> Result<()> {
        if !self.files.contains_key(&chunk.file_id) {
            return Err(IngestError::NotFound(format!(
                "file {} does not exist",
                chunk.file_id
            )));
        }

        match self.chunks.entry(chunk.file_id) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if entry.get().iter().any(|c| c.position == chunk.position) {
                    return Err(IngestError::Conflict(format!(
                        "chunk {} for file {} already committed",
                        chunk.position, chunk.file_id
                    )));
                }
                entry.get_mut().push(chunk);
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(vec![chunk]);
            }
        }
        Ok(())
    }

    async fn chunk_exists(&self, file_id: Uuid, position: u32) -> Result<bool> {
        Ok(self
            .chunks
            .get(&file_id)
            .map(|v| v.iter().any(|c| c.position == position))
            .unwrap_or(false))
    }

    async fn count_chunks(&self, file_id: Uuid) -> Result<usize> {
        Ok(self.chunks.get(&file_id).map(|v| v.len()).unwrap_or(0))
    }

    async fn chunks_for_file(&self, file_id: Uuid) -> Result<Vec<ChunkRecord>> {
        let mut rows = self
            .chunks
            .get(&file_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        rows.sort_by_key(|c| c.position);
        Ok(rows)
    }

    async fn try_begin_processing(&self, file_id: Uuid) -> Result<bool> {
        self.transition(file_id, FileState::Incomplete, FileState::Processing)
    }

    async fn mark_finished(&self, file_id: Uuid) -> Result<bool> {
        self.transition(file_id, FileState::Processing, FileState::Finished)
    }

    async fn revert_processing(&self, file_id: Uuid) -> Result<bool> {
        self.transition(file_id, FileState::Processing, FileState::Incomplete)
    }

    async fn replace_thumbnail(&self, thumb: ThumbnailRecord) -> Result<Option<ThumbnailRecord>> {
        if !self.files.contains_key(&thumb.file_id) {
            return Err(IngestError::NotFound(format!(
                "file {} does not exist",
                thumb.file_id
            )));
        }
        Ok(self.thumbnails.insert(thumb.file_id, thumb))
    }

    async fn thumbnail_for_file(&self, file_id: Uuid) -> Result<Option<ThumbnailRecord>> {
        Ok(self.thumbnails.get(&file_id).map(|t| t.clone()))
    }

    async fn delete_chunks(&self, file_id: Uuid) -> Result<Vec<ChunkRecord>> {
        Ok(self
            .chunks
            .remove(&file_id)
            .map(|(_, rows)| rows)
            .unwrap_or_default())
    }

    async fn chunk_hash_referenced(&self, hash: &str) -> Result<bool> {
        Ok(self
            .chunks
            .iter()
            .any(|rows| rows.iter().any(|c| c.hash == hash)))
    }

    async fn thumbnail_hash_referenced(&self, hash: &str) -> Result<bool> {
        Ok(self.thumbnails.iter().any(|t| t.hash == hash))
    }

    async fn file_hash_referenced(&self, hash: &str) -> Result<bool> {
        Ok(self.files.iter().any(|f| f.hash == hash))
    }

    async fn delete_file(
        &self,
        id: Uuid,
    ) -> Result<Option<(FileRecord, Vec<ChunkRecord>, Option<ThumbnailRecord>)>> {
        let Some((_, file)) = self.files.remove(&id) else {
            return Ok(None);
        };
        let chunks = self
            .chunks
            .remove(&id)
            .map(|(_, rows)| rows)
            .unwrap_or_default();
        let thumbnail = self.thumbnails.remove(&id).map(|(_, t)| t);
        Ok(Some((file, chunks, thumbnail)))
    }
}
