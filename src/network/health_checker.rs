use std::path::Path;
use std::time::Duration;

use tokio::time::timeout;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::error;

use super::uds::connect_unix;
use crate::Result;
use crate::SystemError;

/// Dials the socket at `socket_path` and asks its health service whether
/// `service` is serving.
///
/// The whole probe, dial included, is bounded by `probe_timeout`.
pub(crate) async fn check_service_is_serving(
    socket_path: &Path,
    service: &str,
    probe_timeout: Duration,
) -> Result<()> {
    timeout(probe_timeout, probe(socket_path, service, probe_timeout))
        .await
        .map_err(|_| SystemError::DialTimeout {
            path: socket_path.to_path_buf(),
            duration: probe_timeout,
        })?
}

async fn probe(
    socket_path: &Path,
    service: &str,
    dial_timeout: Duration,
) -> Result<()> {
    let channel = connect_unix(socket_path, dial_timeout).await?;
    let mut client = HealthClient::new(channel);

    let request = tonic::Request::new(HealthCheckRequest {
        service: service.to_string(),
    });

    let response = client
        .check(request)
        .await
        .map_err(|status| {
            error!("health check on {} failed: {}", socket_path.display(), status);
            SystemError::Status(Box::new(status))
        })?
        .into_inner();

    if response.status == ServingStatus::Serving as i32 {
        Ok(())
    } else {
        Err(SystemError::ServiceUnavailable(format!("{service} is not serving yet")).into())
    }
}
