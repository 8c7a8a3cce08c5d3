//! Lifecycle of the device plugin process.
//!
//! ## Startup order
//! 1. Build the registry from the device directory (fatal on failure)
//! 2. Spawn the device watcher
//! 3. Bind the plugin socket, removing a stale socket file
//! 4. Spawn the serve loop guarded by [`CrashLoopGuard`]
//! 5. Probe the socket until the plugin service reports serving
//! 6. (caller) [`RunningPlugin::register`] with the kubelet
//!
//! ## Example
//! ```ignore
//! let shutdown = CancellationToken::new();
//! let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await?;
//! if let Err(e) = plugin.register().await {
//!     error!("register to kubelet failed: {:?}", e);
//! }
//! plugin.wait().await?;
//! ```

use std::path::PathBuf;
use std::time::Instant;

use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::CrashLoopGuard;
use super::CrashVerdict;
use crate::constants::DEVICE_PLUGIN_SERVICE_NAME;
use crate::network::grpc::bind_plugin_socket;
use crate::network::grpc::start_rpc_server;
use crate::network::health_checker::check_service_is_serving;
use crate::metrics::SERVER_RESTARTS;
use crate::register_with_kubelet;
use crate::ChangeNotifier;
use crate::DevicePluginService;
use crate::DeviceRegistry;
use crate::DeviceWatcher;
use crate::Error;
use crate::PluginConfig;
use crate::Result;
use crate::SystemError;

pub struct PluginSupervisor {
    config: PluginConfig,
    shutdown: CancellationToken,
}

/// Handle on a started plugin
pub struct RunningPlugin {
    pub(super) config: PluginConfig,
    pub(super) shutdown: CancellationToken,
    pub(super) serve_handle: JoinHandle<Result<()>>,
    pub(super) watch_handle: JoinHandle<()>,
}

impl PluginSupervisor {
    pub fn new(
        config: PluginConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self { config, shutdown }
    }

    /// Brings the plugin up and waits until it accepts connections.
    ///
    /// # Errors
    /// - `SystemError::DeviceDirUnreadable` if the inventory cannot be built
    /// - socket cleanup or bind failures
    /// - probe failures if the server does not come up within the dial
    ///   timeout
    pub async fn start(self) -> Result<RunningPlugin> {
        let settings = &self.config.plugin;

        // 1. Discover local devices
        let registry = DeviceRegistry::from_dir(&settings.device_dir, settings.total_devices)?;
        let reader = registry.reader();
        let notifier = ChangeNotifier::new();

        // 2. Watch the device directory
        let watcher = DeviceWatcher::new(registry, notifier.clone(), settings.device_dir.clone());
        let watch_shutdown = self.shutdown.clone();
        let watch_handle = tokio::spawn(async move {
            if let Err(e) = watcher.run(watch_shutdown).await {
                error!("watch devices error: {:?}", e);
            }
        });

        // 3. Bind the plugin socket
        let socket_path = settings.plugin_socket_path();
        let listener = match bind_plugin_socket(&socket_path) {
            Ok(listener) => listener,
            Err(e) => {
                watch_handle.abort();
                return Err(e);
            }
        };

        // 4. Serve with crash-loop protection
        let service = DevicePluginService::new(
            reader,
            notifier,
            self.shutdown.clone(),
            settings.allocation_env.clone(),
        );
        let guard = CrashLoopGuard::new(
            Instant::now(),
            self.config.supervisor.restart_window(),
            self.config.supervisor.max_restarts,
        );
        let serve_handle = tokio::spawn(serve_with_restarts(
            service,
            Some(listener),
            socket_path.clone(),
            settings.resource_name.clone(),
            guard,
            self.shutdown.clone(),
        ));

        // 5. Wait for the server to start by probing it
        if let Err(e) =
            check_service_is_serving(&socket_path, DEVICE_PLUGIN_SERVICE_NAME, settings.dial_timeout()).await
        {
            error!("device plugin at {} is not serving: {:?}", socket_path.display(), e);
            serve_handle.abort();
            watch_handle.abort();
            return Err(e);
        }
        info!(
            "device plugin for '{}' serving at {}",
            settings.resource_name,
            socket_path.display()
        );

        Ok(RunningPlugin {
            config: self.config,
            shutdown: self.shutdown,
            serve_handle,
            watch_handle,
        })
    }
}

impl RunningPlugin {
    pub fn socket_path(&self) -> PathBuf {
        self.config.plugin.plugin_socket_path()
    }

    /// Registers the plugin with the kubelet.
    ///
    /// Failure is reported to the caller only; the plugin keeps serving.
    pub async fn register(&self) -> Result<()> {
        register_with_kubelet(&self.config.plugin).await
    }

    /// Waits for the serve loop to end.
    ///
    /// Returns `Ok` after a graceful shutdown and `Error::Fatal` when the
    /// crash-loop protection gave up. Once the serve loop has failed, every
    /// other task is cancelled so the caller can exit.
    pub async fn wait(self) -> Result<()> {
        let result = match self.serve_handle.await {
            Ok(result) => result,
            Err(e) => Err(SystemError::TaskFailed(e).into()),
        };
        if result.is_err() {
            self.shutdown.cancel();
        }
        if let Err(e) = self.watch_handle.await {
            warn!("device watcher task ended abnormally: {:?}", e);
        }
        result
    }
}

/// Serves until shutdown, re-binding the socket after every failure.
///
/// Without an initial `listener` the first round binds as well.
pub(super) async fn serve_with_restarts(
    service: DevicePluginService,
    mut listener: Option<UnixListener>,
    socket_path: PathBuf,
    resource_name: String,
    mut guard: CrashLoopGuard,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let served = match listener.take().map_or_else(|| bind_plugin_socket(&socket_path), Ok) {
            Ok(listener) => serve_once(&service, listener, &resource_name, &shutdown).await,
            Err(e) => Err(e),
        };

        match served {
            Ok(()) => {
                info!("gRPC server for '{}' stopped", resource_name);
                return Ok(());
            }
            Err(e) => {
                error!("gRPC server for '{}' crashed with error: {:?}", resource_name, e);
                if shutdown.is_cancelled() {
                    return Ok(());
                }
                SERVER_RESTARTS.inc();
                match guard.record_crash(Instant::now()) {
                    CrashVerdict::Restart { attempt } => {
                        warn!("restarting gRPC server for '{}' (attempt {})", resource_name, attempt);
                    }
                    CrashVerdict::GiveUp { attempts } => {
                        error!(
                            "gRPC server for '{}' has repeatedly crashed recently. Quitting",
                            resource_name
                        );
                        return Err(Error::Fatal(format!(
                            "gRPC server for '{resource_name}' crashed {attempts} times within the restart window"
                        )));
                    }
                }
            }
        }
    }
}

async fn serve_once(
    service: &DevicePluginService,
    listener: UnixListener,
    resource_name: &str,
    shutdown: &CancellationToken,
) -> Result<()> {
    info!("start gRPC server for '{}'", resource_name);
    start_rpc_server(service.clone(), listener, shutdown.clone()).await
}
