use std::time::Duration;

use nic_device_plugin::proto::v1beta1::AllocateRequest;
use nic_device_plugin::proto::v1beta1::ContainerAllocateRequest;
use nic_device_plugin::proto::v1beta1::Empty;
use nic_device_plugin::proto::v1beta1::ListAndWatchResponse;
use nic_device_plugin::Error;
use nic_device_plugin::PluginSupervisor;
use nic_device_plugin::RegistrationError;
use nic_device_plugin::SystemError;
use tempfile::tempdir;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::Request;

use crate::common::plugin_client;
use crate::common::prepare_plugin_layout;
use crate::common::start_fake_kubelet;
use crate::common::WAIT_FOR_UPDATE_IN_SEC;
use crate::enable_logger;

fn unhealthy_count(response: &ListAndWatchResponse) -> usize {
    response.devices.iter().filter(|d| d.health == "Unhealthy").count()
}

/// # Case: plugin started with 2 entries, a third entry appears
#[tokio::test]
async fn test_plugin_streams_directory_changes() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = prepare_plugin_layout(dir.path(), 2);
    let device_dir = config.plugin.device_dir.clone();
    let shutdown = CancellationToken::new();

    let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await.unwrap();
    let mut client = plugin_client(&plugin.socket_path()).await;

    let mut stream = client.list_and_watch(Request::new(Empty {})).await.unwrap().into_inner();
    let first = stream.message().await.unwrap().unwrap();
    assert_eq!(first.devices.len(), 40);
    assert_eq!(unhealthy_count(&first), 2);
    assert_eq!(first.devices[1].health, "Unhealthy");
    assert_eq!(first.devices[2].health, "Healthy");

    // The watcher attaches asynchronously after startup.
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(device_dir.join("pod-new"), b"").unwrap();

    let update = timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(update.devices.len(), 40);
    assert_eq!(unhealthy_count(&update), 3);
    assert_eq!(update.devices[2].health, "Unhealthy");

    drop(stream);
    drop(client);
    shutdown.cancel();
    timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), plugin.wait())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_allocate_over_socket() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = prepare_plugin_layout(dir.path(), 0);
    let shutdown = CancellationToken::new();

    let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await.unwrap();
    let mut client = plugin_client(&plugin.socket_path()).await;

    let options = client
        .get_device_plugin_options(Request::new(Empty {}))
        .await
        .unwrap()
        .into_inner();
    assert!(options.pre_start_required);

    let response = client
        .allocate(Request::new(AllocateRequest {
            container_requests: vec![ContainerAllocateRequest {
                devices_ids: vec!["3".into(), "7".into()],
            }],
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.container_responses[0].envs["MULTUS_NICS"], "3,7");

    drop(client);
    shutdown.cancel();
    timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), plugin.wait())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = prepare_plugin_layout(dir.path(), 0);
    std::fs::write(config.plugin.plugin_socket_path(), b"stale").unwrap();
    let shutdown = CancellationToken::new();

    let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await.unwrap();
    let mut client = plugin_client(&plugin.socket_path()).await;
    assert!(client.list_and_watch(Request::new(Empty {})).await.is_ok());

    drop(client);
    shutdown.cancel();
    timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), plugin.wait())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_missing_device_dir_fails_startup() {
    enable_logger();
    let dir = tempdir().unwrap();
    let mut config = prepare_plugin_layout(dir.path(), 0);
    config.plugin.device_dir = dir.path().join("absent");

    let result = PluginSupervisor::new(config, CancellationToken::new()).start().await;

    assert!(matches!(
        result,
        Err(Error::System(SystemError::DeviceDirUnreadable { .. }))
    ));
}

#[tokio::test]
async fn test_registers_with_kubelet() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = prepare_plugin_layout(dir.path(), 0);
    let mut kubelet = start_fake_kubelet(config.plugin.kubelet_socket_path());
    let shutdown = CancellationToken::new();

    let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await.unwrap();
    plugin.register().await.unwrap();

    let request = timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), kubelet.requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.version, "v1beta1");
    assert_eq!(request.endpoint, "multus-nic.sock");
    assert_eq!(
        request.resource_name,
        "multus.network.dataworkbench.io/multus-nic-device"
    );

    kubelet.shutdown.cancel();
    shutdown.cancel();
    timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), plugin.wait())
        .await
        .unwrap()
        .unwrap();
}

/// Registration failure is reported but the plugin keeps serving.
#[tokio::test]
async fn test_registration_failure_keeps_plugin_serving() {
    enable_logger();
    let dir = tempdir().unwrap();
    let mut config = prepare_plugin_layout(dir.path(), 1);
    config.plugin.dial_timeout_in_ms = 500;
    let shutdown = CancellationToken::new();

    let plugin = PluginSupervisor::new(config, shutdown.clone()).start().await.unwrap();
    let result = plugin.register().await;
    assert!(matches!(
        result,
        Err(Error::Registration(RegistrationError::Unreachable { .. }))
    ));

    let mut client = plugin_client(&plugin.socket_path()).await;
    let mut stream = client.list_and_watch(Request::new(Empty {})).await.unwrap().into_inner();
    let first = stream.message().await.unwrap().unwrap();
    assert_eq!(unhealthy_count(&first), 1);

    drop(stream);
    drop(client);
    shutdown.cancel();
    timeout(Duration::from_secs(WAIT_FOR_UPDATE_IN_SEC), plugin.wait())
        .await
        .unwrap()
        .unwrap();
}
