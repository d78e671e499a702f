//! gRPC server setup with health check and reflection.

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tonic_reflection::server::Builder as ReflectionBuilder;
use tracing::info;

use retrievo_storage::Storage;

use crate::grpc::RetrievoServiceImpl;
use crate::pb::{retrievo_service_server::RetrievoServiceServer, FILE_DESCRIPTOR_SET};
use crate::retrieval::RetrievalService;

/// Run the gRPC server with health check and reflection.
pub async fn run_server(
    addr: SocketAddr,
    retrieval: Arc<RetrievalService>,
    storage: Arc<Storage>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_server_with_shutdown(addr, retrieval, storage, std::future::pending()).await
}

/// Run the gRPC server with graceful shutdown support.
///
/// Accepts a shutdown signal future that, when resolved, triggers graceful shutdown.
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    retrieval: Arc<RetrievalService>,
    storage: Arc<Storage>,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("Starting gRPC server on {}", addr);

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<RetrievoServiceServer<RetrievoServiceImpl>>()
        .await;

    let reflection_service = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let status = retrieval.status().await;
    let service = RetrievoServiceImpl::new(retrieval, storage);

    info!(
        vectors = status.count,
        dimension = status.dimension,
        "gRPC server ready on {}",
        addr
    );

    Server::builder()
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(RetrievoServiceServer::new(service))
        .serve_with_shutdown(addr, shutdown_signal)
        .await?;

    info!("gRPC server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RetrievalConfig;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_server_starts_and_shuts_down() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(&temp_dir.path().join("db")).unwrap());
        let config = RetrievalConfig::new(4, temp_dir.path().join("index"));
        let retrieval = Arc::new(RetrievalService::open(config, storage.clone()).unwrap());

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server_handle = tokio::spawn(async move {
            run_server_with_shutdown(addr, retrieval, storage, async {
                rx.await.ok();
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(()).ok();

        let result = timeout(Duration::from_secs(5), server_handle).await;
        assert!(result.is_ok());
    }
}
