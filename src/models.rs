use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// upload lifecycle: forward-only in the happy path, a failed processing
// attempt stays in Processing until an explicit re-process
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Incomplete,
    Processing,
    Finished,
}

// a registered upload
#[derive(Serialize, Debug, Clone)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub mime_type: String,
    /// declared sha1 of the fully assembled content
    pub hash: String,
    pub size: u64,
    pub num_chunks: u32,
    pub state: FileState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(name: String, slug: String, mime_type: String, hash: String, size: u64, num_chunks: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            mime_type,
            hash,
            size,
            num_chunks,
            state: FileState::Incomplete,
            created_at: now,
            updated_at: now,
        }
    }
}

// one committed chunk, immutable after insert
#[derive(Serialize, Debug, Clone)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub position: u32,
    pub size: u64,
    /// sha1 of the stored bytes
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn new(file_id: Uuid, position: u32, size: u64, hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            position,
            size,
            hash,
            created_at: Utc::now(),
        }
    }
}

// at most one live thumbnail per file
#[derive(Serialize, Debug, Clone)]
pub struct ThumbnailRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    /// sha1 of the encoded thumbnail, independent of the source file
    pub hash: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl ThumbnailRecord {
    pub fn new(file_id: Uuid, hash: String, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            hash,
            size,
            created_at: Utc::now(),
        }
    }
}

// request to register an upload
#[derive(Deserialize, Debug)]
pub struct RegisterFileRequest {
    pub name: String,
    pub hash: String,
    pub size: u64,
    pub num_chunks: u32,
    pub mime_type: Option<String>,
}

// query parameters accompanying a raw chunk body; everything optional so
// missing fields surface as typed validation errors, not extractor rejects
#[derive(Deserialize, Debug, Default)]
pub struct ChunkUploadParams {
    pub file_id: Option<String>,
    pub position: Option<i64>,
    pub hash: Option<String>,
    pub size: Option<u64>,
    pub session: Option<String>,
}

// response for the chunk upload endpoint
#[derive(Serialize, Debug)]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub file_id: Uuid,
    pub position: u32,
    pub hash: String,
    pub received_chunks: usize,
    pub total_chunks: u32,
}

// response for the file status endpoint
#[derive(Serialize, Debug)]
pub struct FileStatusResponse {
    pub id: Uuid,
    pub state: FileState,
    /// hashes of committed chunks, populated while the upload is incomplete
    pub received_chunks: Vec<String>,
    pub chunks_needed: u32,
}

// response for file deletion
#[derive(Serialize, Debug)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: Uuid,
}

// broadcast payload for dashboard listeners
#[derive(Serialize, Debug)]
pub struct DashboardEntry {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub mime_type: String,
    pub size: u64,
    pub thumbnail: Option<String>,
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
