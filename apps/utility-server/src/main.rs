//! Utility Server
//!
//! A small file-utility service. Provides REST endpoints for:
//!
//! - Image compression and format conversion
//! - QR code generation (PNG / SVG)
//! - PDF compress, merge, split, extract, rotate and signature stamping
//! - PDF <-> Word conversion (office suite when installed, library otherwise)
//!
//! Every request carries its own upload, runs one tool and answers with a
//! download. Nothing is kept between requests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use doc_convert::Converter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod upload;
#[cfg(test)]
mod tests;

use api::{
    handle_compress_image, handle_compress_pdf, handle_convert_image, handle_extract_pages,
    handle_generate_qr, handle_health, handle_list_tools, handle_merge_pdf, handle_pdf_to_word,
    handle_rotate_pdf, handle_sign_pdf, handle_split_pdf, handle_word_to_pdf,
};
use config::{Args, Config};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub converter: Converter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            converter: Converter::new(config.office.clone()),
            config: Arc::new(config),
        }
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Health and discovery
        .route("/health", get(handle_health))
        .route("/api/tools", get(handle_list_tools))
        // Image tools
        .route("/compress", post(handle_compress_image))
        .route("/convert", post(handle_convert_image))
        .route("/qr", post(handle_generate_qr))
        // PDF tools
        .route("/pdf/compress", post(handle_compress_pdf))
        .route("/pdf/merge", post(handle_merge_pdf))
        .route("/pdf/split", post(handle_split_pdf))
        .route("/pdf/extract", post(handle_extract_pages))
        .route("/pdf/rotate", post(handle_rotate_pdf))
        .route("/pdf/sign", post(handle_sign_pdf))
        // Document conversion
        .route("/pdf/to-word", post(handle_pdf_to_word))
        .route("/word/to-pdf", post(handle_word_to_pdf))
        // Apply middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so it can supply flag values
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_args(&args)?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let state = AppState::new(config);
    let config = Arc::clone(&state.config);

    info!("Starting utility server on {}:{}", args.host, args.port);
    info!("Scratch directory: {}", config.upload_dir.display());
    info!("Upload limit: {} bytes", config.max_upload_bytes);
    info!(
        "Document conversion strategy: {}",
        state.converter.strategy().name()
    );

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
