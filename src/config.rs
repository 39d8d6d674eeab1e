use std::path::PathBuf;

/// hard cap on a single chunk payload, matches the uploader contract
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// root directory for blobs (chunks, assembled files, thumbnails)
    pub data_dir: PathBuf,
    /// api server address
    pub host: String,
    /// api server port
    pub port: u16,
    /// maximum accepted chunk payload in bytes
    pub max_chunk_size: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            host: std::env::var("HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4860),
            max_chunk_size: std::env::var("MAX_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CHUNK_SIZE),
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(8),
        }
    }
}
