//! BLE Notify Bridge - Main Entry Point

use std::sync::Arc;

use ble_notify_bridge::{
    BleSession, BridgeService,
    backend::BluerCentral,
    config::{CliArgs, Settings},
    core::forwarder::NotificationForwarder,
    display::{DisplayLog, run_console},
    sink::DocumentStoreSink,
    transport::unix_socket::UnixSocketServer,
};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ble_notify_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting BLE notify bridge");
    let settings = Settings::from(args);

    // Open the Bluetooth adapter; the only fatal start-up failure
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let adapter = match BluerCentral::new(settings.adapter.as_deref(), events_tx).await {
        Ok(adapter) => Arc::new(adapter),
        Err(e) => {
            error!("Failed to open Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    let sink = Arc::new(DocumentStoreSink::spawn(
        settings.store_dir.clone(),
        &settings.collection,
    ));
    let forwarder = NotificationForwarder::new(DisplayLog::default(), sink.clone());
    let session = BleSession::new(settings.session_config());
    info!(
        target_name = %settings.target_name,
        characteristic = %settings.characteristic_uuid,
        "Session configured"
    );

    let (service, handle) = BridgeService::new(
        adapter.clone(),
        session,
        forwarder,
        events_rx,
        settings.auto_scan,
    );

    // Presenters subscribe before the first event is processed
    let mut tasks = Vec::new();

    if settings.console {
        let updates = handle.subscribe_display();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = run_console(updates, tokio::io::stdout()).await {
                error!("Console presenter error: {}", e);
            }
        }));
    }

    if settings.enable_unix_socket {
        info!("Starting Unix socket transport on {}", settings.socket_path);

        let server = UnixSocketServer::new(
            settings.socket_path.clone(),
            settings.socket_mode,
            handle.clone(),
        );
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Unix socket server error: {}", e);
            }
        }));
    }

    let service_task = tokio::spawn(service.run());
    adapter.start().await?;

    info!("Service started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }

    info!("Shutting down...");
    adapter.shutdown().await;

    for task in tasks {
        task.abort();
    }
    service_task.abort();
    let _ = service_task.await;
    drop(handle);

    match Arc::try_unwrap(sink) {
        Ok(sink) => sink.flush().await,
        Err(_) => warn!("Document store still in use, pending records may be lost"),
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
