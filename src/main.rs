use std::path::Path;

use nic_device_plugin::metrics;
use nic_device_plugin::utils::file_io;
use nic_device_plugin::PluginConfig;
use nic_device_plugin::PluginSupervisor;
use nic_device_plugin::Result;
use nic_device_plugin::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = PluginConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(config.log.log_dir.as_deref())?;

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();

    if config.monitoring.prometheus_enabled {
        let port = config.monitoring.prometheus_port;
        let metrics_shutdown = shutdown.clone();
        tokio::spawn(async move {
            metrics::start_server(port, metrics_shutdown).await;
        });
    }

    // Device directory failures end the process here.
    let plugin = match PluginSupervisor::new(config, shutdown.clone()).start().await {
        Ok(plugin) => plugin,
        Err(e) => {
            error!("start device plugin failed: {:?}", e);
            return Err(e);
        }
    };

    if let Err(e) = plugin.register().await {
        error!("register to kubelet failed: {:?}", e);
    }

    info!("Device plugin started. Waiting for shutdown signal...");
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(shutdown).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = plugin.wait().await {
        error!("device plugin stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| SystemError::SignalHandler(e.to_string()))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| SystemError::SignalHandler(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    info!("Shutdown server..");
    shutdown.cancel();
    Ok(())
}

pub fn init_observability(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let (non_blocking, guard) = match log_dir {
        Some(dir) => {
            let log_file = file_io::open_file_for_append(dir.join("nic-device-plugin.log"))?;
            tracing_appender::non_blocking(log_file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
