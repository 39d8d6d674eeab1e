use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use mosaic::config::Config;
use mosaic::content_store::ContentStore;
use mosaic::hub::NotificationHub;
use mosaic::server::{build_router, print_startup_banner, start_server};
use mosaic::state::AppState;
use mosaic::store::MemoryStore;

// use mimalloc as the global allocator
// 10-20% faster than system allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // load configuration from environment variables
    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        // initialize tracing for performance monitoring
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        // blob storage lives under the data directory
        let content = ContentStore::open(config.data_dir.join("blobs"))
            .expect("Failed to create blob directory");

        // wire up shared state
        let store = Arc::new(MemoryStore::new());
        let hub = NotificationHub::spawn();
        let state = Arc::new(AppState::new(store, content, hub, config.max_chunk_size));

        // build router
        let app = build_router(state, &config);

        // define address from config
        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port
        ));

        // print startup information
        print_startup_banner(&config);

        // run the server
        start_server(app, addr).await;
    });
}
