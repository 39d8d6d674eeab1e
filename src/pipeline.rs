use std::sync::Arc;

use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::content_store::ContentStore;
use crate::error::{IngestError, Result};
use crate::hub::{Event, EVENT_FILE_ADDED, EVENT_FILE_COMPLETED};
use crate::models::{ChunkRecord, DashboardEntry, FileRecord, ThumbnailRecord};
use crate::state::AppState;
use crate::thumbs;
use crate::utils::sha1_hex;

/// decide whether a file just became complete and, if this caller wins the
/// race, drive the whole completion pipeline. spawned after every chunk
/// commit; safe to call any number of times for the same file.
pub async fn check_completion(state: Arc<AppState>, file_id: Uuid) {
    let count = match state.store.count_chunks(file_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Chunk count failed for {}: {}", file_id, e);
            return;
        }
    };

    let file = match state.store.get_file(file_id).await {
        Ok(Some(file)) => file,
        // deleted while chunks were in flight, nothing to do
        Ok(None) => return,
        Err(e) => {
            tracing::error!("File lookup failed for {}: {}", file_id, e);
            return;
        }
    };

    if (count as u32) < file.num_chunks {
        tracing::trace!(
            "File {} has {}/{} chunks, waiting",
            file_id,
            count,
            file.num_chunks
        );
        return;
    }

    // the conditional update is the whole exactly-once guarantee: of all the
    // concurrent callers that observed count == num_chunks, only the one
    // whose update actually flipped the row proceeds
    match state.store.try_begin_processing(file_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("Completion for {} already claimed elsewhere", file_id);
            return;
        }
        Err(e) => {
            tracing::error!("State transition failed for {}: {}", file_id, e);
            return;
        }
    }

    tracing::info!(
        "🧩 All {} chunks received for {}, assembling",
        file.num_chunks,
        file.name
    );

    if let Err(e) = run_completion(&state, file_id).await {
        // no automatic retry: the file stays in Processing until an explicit
        // re-process request
        tracing::error!(
            "Completion pipeline failed for {}: {} (file left in Processing)",
            file_id,
            e
        );
    }
}

async fn run_completion(state: &Arc<AppState>, file_id: Uuid) -> Result<()> {
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| IngestError::NotFound(format!("file {} does not exist", file_id)))?;
    let chunks = state.store.chunks_for_file(file_id).await?;

    let assembled = assemble_file(&state.content, &file, &chunks).await?;
    generate_thumbnail(state, &file, assembled).await?;

    if !state.store.mark_finished(file_id).await? {
        // the claim was lost mid-attempt, e.g. a concurrent re-process
        // reverted the state; the chunks now belong to whoever holds the file
        tracing::warn!(
            "File {} left Processing during completion, skipping cleanup",
            file_id
        );
        return Ok(());
    }

    cleanup_chunks(state, &file, &chunks).await;
    notify(state, file_id).await;
    Ok(())
}

/// concatenate a file's chunks in position order into the canonical blob.
///
/// the assembled bytes are hashed while copying and must match the declared
/// file hash and size before anything lands in the content store, so a bad
/// upload can never produce a partial or wrong canonical blob.
pub async fn assemble_file(
    content: &ContentStore,
    file: &FileRecord,
    chunks: &[ChunkRecord],
) -> Result<Vec<u8>> {
    if chunks.len() as u32 != file.num_chunks {
        return Err(IngestError::Storage(format!(
            "file {} has {} committed chunks, expected {}",
            file.id,
            chunks.len(),
            file.num_chunks
        )));
    }

    let mut ordered: Vec<&ChunkRecord> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.position);

    // every blob must be present before we copy a single byte
    for chunk in &ordered {
        if !content.contains(&chunk.hash).await {
            return Err(IngestError::MissingChunk {
                file_id: file.id,
                position: chunk.position,
            });
        }
    }

    // chunk sizes were verified against the stored bytes at upload time; the
    // declared total has to agree with their sum before any buffer is sized
    // from it
    let total: u64 = ordered.iter().map(|c| c.size).sum();
    if total != file.size {
        return Err(IngestError::Integrity(format!(
            "committed chunks sum to {} bytes, declared size is {}",
            total, file.size
        )));
    }

    let mut hasher = Sha1::new();
    let mut assembled = Vec::with_capacity(total as usize);

    for chunk in &ordered {
        let bytes = content.read(&chunk.hash).await?;
        hasher.update(&bytes);
        assembled.extend_from_slice(&bytes);
    }

    let computed = hex::encode(hasher.finalize());
    if computed != file.hash {
        return Err(IngestError::Integrity(format!(
            "assembled hash {} does not match declared hash {}",
            computed, file.hash
        )));
    }

    content.write(&file.hash, &assembled).await?;
    tracing::debug!(
        "Assembled {} bytes for {} from {} chunks",
        assembled.len(),
        file.id,
        ordered.len()
    );

    Ok(assembled)
}

// decode and resize on the blocking pool, then store the thumbnail
// content-addressed and swap the row
async fn generate_thumbnail(state: &Arc<AppState>, file: &FileRecord, bytes: Vec<u8>) -> Result<()> {
    let rendered = tokio::task::spawn_blocking(move || thumbs::render_thumbnail(&bytes))
        .await
        .map_err(|e| IngestError::Storage(format!("thumbnail task failed: {}", e)))??;

    let Some(encoded) = rendered else {
        tracing::debug!("File {} is not a supported image, skipping thumbnail", file.id);
        return Ok(());
    };

    let hash = sha1_hex(&encoded);
    let size = encoded.len() as u64;
    state.content.write(&hash, &encoded).await?;

    let displaced = state
        .store
        .replace_thumbnail(ThumbnailRecord::new(file.id, hash.clone(), size))
        .await?;

    // a replaced thumbnail blob may still back other rows
    if let Some(old) = displaced {
        if old.hash != hash && !state.store.blob_referenced(&old.hash).await? {
            let _ = state.content.remove(&old.hash).await;
        }
    }

    tracing::info!("🖼️  Stored thumbnail for {} ({} bytes)", file.name, size);
    Ok(())
}

// advisory cleanup: chunk rows and blobs are no longer needed once the
// canonical blob exists. must be idempotent and must never take the pipeline
// down, so every failure just logs.
async fn cleanup_chunks(state: &Arc<AppState>, file: &FileRecord, chunks: &[ChunkRecord]) {
    if let Err(e) = state.store.delete_chunks(file.id).await {
        tracing::warn!("Chunk row cleanup failed for {}: {}", file.id, e);
        return;
    }

    let mut removed = 0usize;
    for chunk in chunks {
        // a single-chunk file's only chunk IS the canonical blob
        if chunk.hash == file.hash {
            continue;
        }
        // the blob may double as another file's chunk, canonical content or
        // thumbnail; content addressing keeps them all in one namespace
        match state.store.blob_referenced(&chunk.hash).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Reference probe failed for blob {}: {}", chunk.hash, e);
                continue;
            }
        }
        match state.content.remove(&chunk.hash).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove chunk blob {}: {}", chunk.hash, e),
        }
    }

    tracing::debug!("🧹 Cleaned up {} chunk blobs for {}", removed, file.id);
}

// push the completion event to the uploader (if a session was registered)
// and the dashboard broadcast to everyone. delivery is best-effort: a client
// that disconnected simply misses the event.
async fn notify(state: &Arc<AppState>, file_id: Uuid) {
    let file = match state.store.get_file(file_id).await {
        Ok(Some(file)) => file,
        _ => return,
    };

    if let Some(client_id) = state.sessions.take(file_id) {
        let event = Event::new(EVENT_FILE_COMPLETED, &file);
        if let Err(e) = state.hub.unicast(client_id, event).await {
            tracing::warn!(
                "Completion event for {} not delivered to {}: {}",
                file_id,
                client_id,
                e
            );
        }
    }

    let thumbnail = state
        .store
        .thumbnail_for_file(file_id)
        .await
        .ok()
        .flatten()
        .map(|t| t.hash);
    let entry = DashboardEntry {
        id: file.id,
        name: file.name.clone(),
        slug: file.slug.clone(),
        mime_type: file.mime_type.clone(),
        size: file.size,
        thumbnail,
    };
    if let Err(e) = state.hub.broadcast(Event::new(EVENT_FILE_ADDED, entry)).await {
        tracing::warn!("Broadcast for {} failed: {}", file_id, e);
    }

    tracing::info!("✅ File finished: {} ({})", file.name, file.id);
}
