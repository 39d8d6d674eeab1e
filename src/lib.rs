pub mod config;
pub mod content_store;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod sessions;
pub mod state;
pub mod store;
pub mod thumbs;
pub mod utils;
