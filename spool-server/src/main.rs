use anyhow::Context;
use spool_server::{AppState, Config, PrintQueue, PrintWorker, PrinterLink, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    spool_server::init_logger();

    tracing::info!("ESC/POS print spooler starting");

    let config = Config::from_env();

    // Queue load failure is fatal: starting with partial state could drop
    // or duplicate queued work
    let queue = Arc::new(
        PrintQueue::open(&config.queue_dir)
            .with_context(|| format!("failed to load queue state from {}", config.queue_dir.display()))?,
    );
    let link = Arc::new(PrinterLink::from_config(&config).context("invalid printer configuration")?);

    let state = AppState::new(queue.clone(), link.clone(), config.clone());

    let shutdown = CancellationToken::new();
    let worker = PrintWorker::new(queue, link, config.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    let app = routes::router(state);
    let signal = {
        let token = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            token.cancel();
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await
    .context("HTTP server error")?;

    // Let the worker finish its current job before exiting
    shutdown.cancel();
    let _ = worker_handle.await;

    tracing::info!("print spooler stopped");
    Ok(())
}
