//! Helpers shared by the unit tests: logger setup, temporary plugin layouts
//! and a fake kubelet registration endpoint.

use std::path::Path;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::Response;
use tonic::Status;

use crate::proto::v1beta1::registration_server::Registration;
use crate::proto::v1beta1::registration_server::RegistrationServer;
use crate::proto::v1beta1::Empty;
use crate::proto::v1beta1::RegisterRequest;
use crate::PluginConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Default configuration with the device and plugin directories moved under
/// `root`. Both directories are created.
pub fn test_config(root: &Path) -> PluginConfig {
    let mut config = PluginConfig::default();
    config.plugin.device_dir = root.join("devices");
    config.plugin.plugin_dir = root.join("plugins");
    config.plugin.dial_timeout_in_ms = 2000;
    std::fs::create_dir_all(&config.plugin.device_dir).unwrap();
    std::fs::create_dir_all(&config.plugin.plugin_dir).unwrap();
    config
}

/// Registration endpoint that records every request and answers with
/// `reject` if set.
pub struct FakeKubelet {
    requests: mpsc::UnboundedSender<RegisterRequest>,
    reject: Option<Status>,
}

#[tonic::async_trait]
impl Registration for FakeKubelet {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> std::result::Result<Response<Empty>, Status> {
        let _ = self.requests.send(request.into_inner());
        match &self.reject {
            Some(status) => Err(status.clone()),
            None => Ok(Response::new(Empty {})),
        }
    }
}

pub struct FakeKubeletHandle {
    pub requests: mpsc::UnboundedReceiver<RegisterRequest>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<()>,
}

/// Serves a [`FakeKubelet`] on `socket_path`. Must be called inside a
/// runtime.
pub fn spawn_fake_kubelet(
    socket_path: PathBuf,
    reject: Option<Status>,
) -> FakeKubeletHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();
    let kubelet = FakeKubelet { requests: tx, reject };

    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(RegistrationServer::new(kubelet))
            .serve_with_incoming_shutdown(
                UnixListenerStream::new(listener),
                async move { server_shutdown.cancelled().await },
            )
            .await
            .unwrap();
    });

    FakeKubeletHandle {
        requests: rx,
        shutdown,
        handle,
    }
}
