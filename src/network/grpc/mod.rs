//! gRPC transport for the device plugin over a Unix domain socket.
//!
//! The plugin service is served next to a `grpc.health.v1` service whose
//! status is used by the startup liveness probe.

mod device_plugin_service;
pub use device_plugin_service::*;


//-------------------------------------------------------------------------------
// Start RPC Server
use std::path::Path;

use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::proto::v1beta1::device_plugin_server::DevicePluginServer;
use crate::utils::file_io::remove_stale_socket;
use crate::Result;
use crate::SystemError;

/// Binds the plugin socket, removing a stale socket file first.
pub(crate) fn bind_plugin_socket(socket_path: &Path) -> Result<UnixListener> {
    remove_stale_socket(socket_path)?;
    let listener = UnixListener::bind(socket_path).map_err(|source| SystemError::SocketBind {
        path: socket_path.to_path_buf(),
        source,
    })?;
    info!("plugin socket bound at {}", socket_path.display());
    Ok(listener)
}

/// Serves the device plugin on `listener` until `shutdown` is cancelled.
///
/// Returns `Ok` on graceful shutdown and an error if the transport fails.
pub(crate) async fn start_rpc_server(
    service: DevicePluginService,
    listener: UnixListener,
    shutdown: CancellationToken,
) -> Result<()> {
    // Create a HealthReporter to manage the health status
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<DevicePluginServer<DevicePluginService>>()
        .await;

    let incoming = UnixListenerStream::new(listener);

    tonic::transport::Server::builder()
        .add_service(health_service)
        .add_service(DevicePluginServer::new(service))
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.cancelled().await;
            warn!("Stopping device plugin RPC server.");
        })
        .await
        .map_err(|e| SystemError::Transport(Box::new(e)))?;

    debug!("rpc service finished!");
    Ok(())
}
