use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use nic_device_plugin::proto::v1beta1::device_plugin_client::DevicePluginClient;
use nic_device_plugin::proto::v1beta1::registration_server::Registration;
use nic_device_plugin::proto::v1beta1::registration_server::RegistrationServer;
use nic_device_plugin::proto::v1beta1::Empty;
use nic_device_plugin::proto::v1beta1::RegisterRequest;
use nic_device_plugin::uds::connect_unix;
use nic_device_plugin::PluginConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::Request;
use tonic::Response;
use tonic::Status;

pub const WAIT_FOR_UPDATE_IN_SEC: u64 = 5;

/// Plugin configuration rooted at `root` with `in_use` entries already in the
/// device directory.
pub fn prepare_plugin_layout(
    root: &Path,
    in_use: usize,
) -> PluginConfig {
    let mut config = PluginConfig::default();
    config.plugin.device_dir = root.join("devices");
    config.plugin.plugin_dir = root.join("device-plugins");
    config.plugin.dial_timeout_in_ms = 2000;
    config.supervisor.max_restarts = 2;

    std::fs::create_dir_all(&config.plugin.device_dir).unwrap();
    std::fs::create_dir_all(&config.plugin.plugin_dir).unwrap();
    for i in 0..in_use {
        std::fs::write(config.plugin.device_dir.join(format!("pod-{i}")), b"").unwrap();
    }
    config.validate().unwrap()
}

pub async fn plugin_client(socket_path: &Path) -> DevicePluginClient<Channel> {
    let channel = connect_unix(socket_path, Duration::from_secs(2)).await.unwrap();
    DevicePluginClient::new(channel)
}

struct RecordingKubelet {
    requests: mpsc::UnboundedSender<RegisterRequest>,
}

#[tonic::async_trait]
impl Registration for RecordingKubelet {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<Empty>, Status> {
        let _ = self.requests.send(request.into_inner());
        Ok(Response::new(Empty {}))
    }
}

pub struct FakeKubelet {
    pub requests: mpsc::UnboundedReceiver<RegisterRequest>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<()>,
}

/// Serves a kubelet registration endpoint that accepts and records every
/// request.
pub fn start_fake_kubelet(socket_path: PathBuf) -> FakeKubelet {
    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(RegistrationServer::new(RecordingKubelet { requests: tx }))
            .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
                server_shutdown.cancelled().await
            })
            .await
            .unwrap();
    });

    FakeKubelet {
        requests: rx,
        shutdown,
        handle,
    }
}
