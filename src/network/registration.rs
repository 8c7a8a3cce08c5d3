//! One-shot registration handshake with the kubelet.

use tonic::Request;
use tracing::info;

use super::uds::connect_unix;
use crate::constants::DEVICE_PLUGIN_API_VERSION;
use crate::proto::v1beta1::registration_client::RegistrationClient;
use crate::proto::v1beta1::RegisterRequest;
use crate::DevicePluginService;
use crate::PluginSettings;
use crate::RegistrationError;
use crate::Result;

pub(crate) fn register_request(settings: &PluginSettings) -> RegisterRequest {
    RegisterRequest {
        version: DEVICE_PLUGIN_API_VERSION.to_string(),
        endpoint: settings.plugin_socket.clone(),
        resource_name: settings.resource_name.clone(),
        options: Some(DevicePluginService::options()),
    }
}

/// Announces this plugin's endpoint and resource name on the kubelet
/// registration socket.
///
/// # Errors
/// Returns `Error::Registration` when the socket cannot be reached or the
/// kubelet rejects the request. The running plugin is not affected.
pub async fn register_with_kubelet(settings: &PluginSettings) -> Result<()> {
    let kubelet_socket = settings.kubelet_socket_path();

    let channel = connect_unix(&kubelet_socket, settings.dial_timeout())
        .await
        .map_err(|e| RegistrationError::Unreachable {
            path: kubelet_socket.clone(),
            source: Box::new(e),
        })?;

    let request = register_request(settings);
    info!("Register to kubelet with endpoint {}", request.endpoint);

    RegistrationClient::new(channel)
        .register(Request::new(request))
        .await
        .map_err(|status| RegistrationError::Rejected {
            resource_name: settings.resource_name.clone(),
            status: Box::new(status),
        })?;

    info!("registered {} with kubelet", settings.resource_name);
    Ok(())
}
