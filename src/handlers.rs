use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::hub::OUTBOUND_BUFFER;
use crate::models::{
    ChunkRecord, ChunkUploadParams, ChunkUploadResponse, DeleteResponse, FileRecord,
    FileState, FileStatusResponse, RegisterFileRequest,
};
use crate::pipeline;
use crate::state::AppState;
use crate::utils::{sha1_hex, slugify};

// register an upload: creates the file row in Incomplete state
pub async fn register_file(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterFileRequest>,
) -> Result<Json<FileRecord>> {
    tracing::debug!("Registering upload: {}", payload.name);

    if payload.name.trim().is_empty() {
        tracing::warn!("Registration with empty name rejected");
        return Err(IngestError::Validation("file name is empty".to_string()));
    }
    if payload.hash.trim().is_empty() {
        tracing::warn!("Registration without declared hash rejected");
        return Err(IngestError::Validation("declared hash is empty".to_string()));
    }
    if payload.size == 0 {
        return Err(IngestError::Validation("declared size is zero".to_string()));
    }
    if payload.num_chunks == 0 {
        return Err(IngestError::Validation("chunk count is zero".to_string()));
    }

    let file = FileRecord::new(
        payload.name.clone(),
        slugify(&payload.name),
        payload
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        payload.hash,
        payload.size,
        payload.num_chunks,
    );

    state.store.insert_file(file.clone()).await.map_err(|e| {
        tracing::warn!("Registration rejected for {}: {}", payload.name, e);
        e
    })?;

    tracing::info!(
        "📥 Registered upload: {} ({} chunks, {} bytes)",
        file.name,
        file.num_chunks,
        file.size
    );

    Ok(Json(file))
}

// ingest one chunk: validate, dedup, verify, store durably, commit the row,
// then kick the completion check off in the background
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChunkUploadParams>,
    body: Bytes,
) -> Result<Json<ChunkUploadResponse>> {
    // fail fast, in a fixed order, each with its own error kind
    if body.is_empty() {
        tracing::warn!("Chunk upload with empty payload rejected");
        return Err(IngestError::Validation("chunk payload is empty".to_string()));
    }
    if body.len() > state.max_chunk_size {
        tracing::warn!(
            "Chunk upload of {} bytes rejected (max {})",
            body.len(),
            state.max_chunk_size
        );
        return Err(IngestError::PayloadTooLarge {
            size: body.len(),
            max: state.max_chunk_size,
        });
    }

    let file_id = match params.file_id.as_deref() {
        None => {
            return Err(IngestError::Validation("missing file_id".to_string()));
        }
        Some(raw) => Uuid::parse_str(raw).map_err(|_| {
            tracing::warn!("Chunk upload with malformed file_id: {}", raw);
            IngestError::Validation("file_id is not a valid uuid".to_string())
        })?,
    };

    let position = match params.position {
        None => {
            return Err(IngestError::Validation("missing chunk position".to_string()));
        }
        Some(p) if p < 0 => {
            tracing::warn!("Negative chunk position {} for file {}", p, file_id);
            return Err(IngestError::Validation(
                "chunk position cannot be negative".to_string(),
            ));
        }
        // a cast would wrap oversized positions into low slots
        Some(p) => u32::try_from(p).map_err(|_| {
            tracing::warn!("Oversized chunk position {} for file {}", p, file_id);
            IngestError::Validation(format!("chunk position {} is out of range", p))
        })?,
    };

    let declared_hash = match params.hash.as_deref() {
        None | Some("") => {
            return Err(IngestError::Validation("chunk hash is empty".to_string()));
        }
        Some(h) => h.to_string(),
    };

    let declared_size = params
        .size
        .ok_or_else(|| IngestError::Validation("missing declared chunk size".to_string()))?;

    // the file must be registered before chunks arrive
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Chunk for unknown file {}", file_id);
            IngestError::NotFound(format!("file {} does not exist", file_id))
        })?;

    if position >= file.num_chunks {
        return Err(IngestError::Validation(format!(
            "chunk position {} is out of range for {} chunks",
            position, file.num_chunks
        )));
    }

    // duplicate slots conflict before any hashing or disk work
    if state.store.chunk_exists(file_id, position).await? {
        tracing::debug!("Duplicate chunk {} for file {}", position, file_id);
        return Err(IngestError::Conflict(format!(
            "chunk {} for file {} already committed",
            position, file_id
        )));
    }

    // integrity: the bytes must be exactly what the uploader declared
    let computed_hash = sha1_hex(&body);
    if computed_hash != declared_hash {
        tracing::warn!(
            "Chunk hash mismatch for file {} position {}: declared {}, computed {}",
            file_id,
            position,
            declared_hash,
            computed_hash
        );
        return Err(IngestError::Integrity(format!(
            "chunk hash mismatch: declared {}, computed {}",
            declared_hash, computed_hash
        )));
    }
    if body.len() as u64 != declared_size {
        tracing::warn!(
            "Chunk size mismatch for file {} position {}: declared {}, received {}",
            file_id,
            position,
            declared_size,
            body.len()
        );
        return Err(IngestError::Integrity(format!(
            "chunk size mismatch: declared {}, received {}",
            declared_size,
            body.len()
        )));
    }

    // bytes must be durable before the row commit makes them discoverable
    state.content.write(&computed_hash, &body).await.map_err(|e| {
        tracing::error!("Failed to store chunk {} for {}: {}", position, file_id, e);
        e
    })?;

    state
        .store
        .insert_chunk(ChunkRecord::new(
            file_id,
            position,
            body.len() as u64,
            computed_hash.clone(),
        ))
        .await?;

    // remember which websocket client wants the completion event
    if let Some(token) = params.session.as_deref() {
        match Uuid::parse_str(token) {
            Ok(client_id) => {
                state.sessions.insert(file_id, client_id);
                tracing::trace!("Session {} registered for file {}", client_id, file_id);
            }
            Err(_) => {
                tracing::warn!("Ignoring malformed session token for file {}", file_id);
            }
        }
    }

    let received = state.store.count_chunks(file_id).await?;
    tracing::debug!(
        "📦 Received chunk {}/{} for file {}",
        received,
        file.num_chunks,
        file_id
    );

    // completion runs in the background; the uploader gets its answer now
    tokio::spawn(pipeline::check_completion(state.clone(), file_id));

    Ok(Json(ChunkUploadResponse {
        success: true,
        file_id,
        position,
        hash: computed_hash,
        received_chunks: received,
        total_chunks: file.num_chunks,
    }))
}

// report upload progress for a file
pub async fn file_status(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<FileStatusResponse>> {
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| IngestError::NotFound(format!("file {} does not exist", file_id)))?;

    let chunks = state.store.chunks_for_file(file_id).await?;

    // chunk detail is only interesting while the uploader still has work to
    // do; afterwards the rows are gone anyway
    let (received_chunks, chunks_needed) = if file.state == FileState::Incomplete {
        let received = chunks.len() as u32;
        (
            chunks.into_iter().map(|c| c.hash).collect(),
            file.num_chunks.saturating_sub(received),
        )
    } else {
        (Vec::new(), 0)
    };

    Ok(Json(FileStatusResponse {
        id: file.id,
        state: file.state,
        received_chunks,
        chunks_needed,
    }))
}

// explicit recovery for a file stuck in Processing after a failed attempt
pub async fn reprocess_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| IngestError::NotFound(format!("file {} does not exist", file_id)))?;

    match file.state {
        FileState::Finished => {
            return Err(IngestError::Conflict(format!(
                "file {} is already finished",
                file_id
            )));
        }
        FileState::Processing => {
            if state.store.revert_processing(file_id).await? {
                tracing::info!("♻️  Re-processing file {} after stuck attempt", file_id);
            }
        }
        FileState::Incomplete => {
            tracing::debug!("Re-running completion check for {}", file_id);
        }
    }

    tokio::spawn(pipeline::check_completion(state.clone(), file_id));

    Ok(Json(serde_json::json!({
        "success": true,
        "id": file_id,
    })))
}

// delete a file and everything hanging off it
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    tracing::debug!("Request to delete file {}", file_id);

    let (file, chunks, thumbnail) = state
        .store
        .delete_file(file_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("File not found for deletion: {}", file_id);
            IngestError::NotFound(format!("file {} does not exist", file_id))
        })?;

    // nobody is waiting on this upload anymore
    state.sessions.take(file_id);

    // blobs live in one shared namespace and can back other files' rows:
    // the canonical blob here may be someone else's committed chunk, and a
    // chunk blob may be someone else's canonical content. remove each one
    // only when no live row of any kind references it anymore.
    let mut doomed: Vec<String> = Vec::with_capacity(chunks.len() + 2);
    doomed.push(file.hash.clone());
    doomed.extend(chunks.iter().map(|c| c.hash.clone()));
    if let Some(thumb) = thumbnail {
        doomed.push(thumb.hash);
    }
    for hash in doomed {
        match state.store.blob_referenced(&hash).await {
            Ok(false) => {
                if let Err(e) = state.content.remove(&hash).await {
                    tracing::warn!("Could not remove blob {}: {}", hash, e);
                }
            }
            Ok(true) => {}
            Err(e) => tracing::warn!("Reference probe failed for {}: {}", hash, e),
        }
    }

    tracing::info!("🗑️  Deleted file: {} ({})", file.name, file_id);

    Ok(Json(DeleteResponse {
        success: true,
        id: file_id,
    }))
}

// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mosaic",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// websocket endpoint: every connection becomes a hub client
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_connection(socket, state))
}

async fn client_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    if let Err(e) = state.hub.register(client_id, tx).await {
        tracing::error!("Could not register ws client {}: {}", client_id, e);
        return;
    }
    tracing::info!("🔌 Websocket client connected: {}", client_id);

    let (mut sink, mut stream) = socket.split();

    // the write half drains the hub's outbound buffer onto the wire
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // clients never speak first; drain until the connection goes away
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    if let Err(e) = state.hub.unregister(client_id).await {
        tracing::debug!("Unregister for {} failed: {}", client_id, e);
    }
    writer.abort();
    tracing::info!("🔌 Websocket client disconnected: {}", client_id);
}
