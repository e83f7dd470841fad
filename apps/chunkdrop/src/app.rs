//! Application orchestrator: wires the upload directory, the WebSocket
//! server and the landing page together.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chunkdrop_transfer::{TransferRegistry, UploadDir};
use chunkdrop_upload_server::UploadServer;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::web;

/// Runs the service until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    run_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
        }
        tracing::info!("SIGINT received, shutting down");
    })
    .await
}

/// Runs the service until `shutdown` resolves.
pub async fn run_until(
    config: Config,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // -- Storage --
    let dir = UploadDir::create(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;
    let registry = Arc::new(TransferRegistry::new(dir));

    // -- WS server --
    let server = UploadServer::new(config.server_config(), Arc::clone(&registry));
    let server_run = Arc::clone(&server);
    let ws_task = tokio::spawn(async move {
        if let Err(e) = server_run.run().await {
            tracing::error!("upload server error: {e}");
        }
    });

    // Wait for the server to bind.
    let ws_port = loop {
        let p = server.port().await;
        if p > 0 {
            break p;
        }
        if ws_task.is_finished() {
            anyhow::bail!("upload server failed to start");
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    };

    // -- Landing page --
    let http_addr = SocketAddr::new(config.host, config.http_port);
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding landing page on {http_addr}"))?;
    tracing::info!("landing page on http://{}", listener.local_addr()?);

    let page_cancel = cancel.clone();
    let http_task = tokio::spawn(async move {
        let app = web::router(ws_port, &config.ws_path);
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(page_cancel.cancelled_owned())
            .await
        {
            tracing::error!("landing page error: {e}");
        }
    });

    tracing::info!("chunkdrop ready");

    shutdown.await;

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    cancel.cancel();
    server.shutdown();
    let _ = ws_task.await;
    let _ = http_task.await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkdrop_transfer::CleanupScope;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_config(upload_dir: std::path::PathBuf) -> Config {
        Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: 0,
            ws_port: 0,
            upload_dir,
            cleanup_scope: CleanupScope::Connection,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn creates_upload_dir_and_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("uploads");

        run_until(test_config(dir.clone()), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        })
        .await
        .unwrap();

        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn fails_when_upload_dir_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, b"x").unwrap();

        let err = run_until(test_config(file), async {}).await.unwrap_err();
        assert!(err.to_string().contains("creating upload directory"));
    }
}
