//! whisperd - HTTP transcription server over the native Whisper library

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whisperd_native::Session;
use whisperd_server::api;
use whisperd_server::args::Args;
use whisperd_server::resources;
use whisperd_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "whisperd_server=debug,whisperd_native=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting whisperd");

    // Library load, model download, and model load all block; a failure here
    // aborts startup instead of serving requests that can never succeed.
    let session = {
        let args = args.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Session> {
            resources::ensure_model(&args.model)?;
            let model = args.model.to_string_lossy();
            let session = Session::initialize_with(&model, &args.language, args.library.as_deref())?;
            Ok(session)
        })
        .await??
    };
    info!("Transcription session ready");

    let state = AppState::new(session);
    let app = api::create_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    server.await?;

    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
