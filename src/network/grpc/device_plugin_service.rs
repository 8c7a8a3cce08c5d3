//! Kubelet-facing device plugin service.
//!
//! Synchronous calls are answered from the registry or from static data.
//! `ListAndWatch` runs one session task per client: it sends a full snapshot
//! on start and again after every change signal until the process shuts down
//! or the client goes away. Partial updates are never sent.

use std::collections::HashMap;

use tokio::select;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::device::ChangeNotifier;
use crate::device::ChangeSubscriber;
use crate::device::DeviceSnapshot;
use crate::device::RegistryReader;
use crate::metrics::LIST_AND_WATCH_PUSHES;
use crate::metrics::RPC_REQUESTS;
use crate::proto::v1beta1::device_plugin_server::DevicePlugin;
use crate::proto::v1beta1::AllocateRequest;
use crate::proto::v1beta1::AllocateResponse;
use crate::proto::v1beta1::ContainerAllocateResponse;
use crate::proto::v1beta1::DevicePluginOptions;
use crate::proto::v1beta1::Empty;
use crate::proto::v1beta1::ListAndWatchResponse;
use crate::proto::v1beta1::PreStartContainerRequest;
use crate::proto::v1beta1::PreStartContainerResponse;
use crate::proto::v1beta1::PreferredAllocationRequest;
use crate::proto::v1beta1::PreferredAllocationResponse;

/// Buffered snapshots per session before the session task waits on the client
const SESSION_BUFFER: usize = 4;

/// Shared context handed to every RPC handler.
///
/// Holds read-only access to the registry; the watcher remains its only
/// writer.
#[derive(Clone)]
pub struct DevicePluginService {
    reader: RegistryReader,
    notifier: ChangeNotifier,
    shutdown: CancellationToken,
    allocation_env: String,
}

impl DevicePluginService {
    pub fn new(
        reader: RegistryReader,
        notifier: ChangeNotifier,
        shutdown: CancellationToken,
        allocation_env: String,
    ) -> Self {
        Self {
            reader,
            notifier,
            shutdown,
            allocation_env,
        }
    }

    /// Options reported both by `GetDevicePluginOptions` and in the
    /// registration request.
    pub fn options() -> DevicePluginOptions {
        DevicePluginOptions {
            pre_start_required: true,
            get_preferred_allocation_available: false,
        }
    }
}

fn snapshot_response(snapshot: &DeviceSnapshot) -> ListAndWatchResponse {
    ListAndWatchResponse {
        devices: snapshot.iter().map(Into::into).collect(),
    }
}

/// One `ListAndWatch` subscription.
struct ListAndWatchSession {
    reader: RegistryReader,
    subscriber: ChangeSubscriber,
    shutdown: CancellationToken,
    tx: mpsc::Sender<Result<ListAndWatchResponse, Status>>,
}

impl ListAndWatchSession {
    async fn push(&self) -> bool {
        let response = snapshot_response(&self.reader.snapshot());
        if let Err(e) = self.tx.send(Ok(response)).await {
            error!("ListAndWatch send device error: {}", e);
            return false;
        }
        LIST_AND_WATCH_PUSHES.inc();
        true
    }

    async fn run(mut self) {
        loop {
            debug!("waiting for device change");
            select! {
                _ = self.shutdown.cancelled() => {
                    info!("ListAndWatch exit");
                    return;
                }
                _ = self.tx.closed() => {
                    info!("ListAndWatch client went away");
                    return;
                }
                changed = self.subscriber.changed() => {
                    if !changed {
                        info!("device notifier closed, ListAndWatch exit");
                        return;
                    }
                    info!("device updated");
                    if !self.push().await {
                        return;
                    }
                }
            }
        }
    }
}

#[tonic::async_trait]
impl DevicePlugin for DevicePluginService {
    type ListAndWatchStream = ReceiverStream<Result<ListAndWatchResponse, Status>>;

    async fn get_device_plugin_options(
        &self,
        _request: Request<Empty>,
    ) -> std::result::Result<Response<DevicePluginOptions>, Status> {
        info!("GetDevicePluginOptions called");
        RPC_REQUESTS.with_label_values(&["get_device_plugin_options"]).inc();
        Ok(Response::new(Self::options()))
    }

    async fn list_and_watch(
        &self,
        _request: Request<Empty>,
    ) -> std::result::Result<Response<Self::ListAndWatchStream>, Status> {
        info!("ListAndWatch called");
        RPC_REQUESTS.with_label_values(&["list_and_watch"]).inc();

        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let session = ListAndWatchSession {
            reader: self.reader.clone(),
            // Subscribe before the first read so no change can slip in between.
            subscriber: self.notifier.subscribe(),
            shutdown: self.shutdown.clone(),
            tx,
        };

        if !session.push().await {
            return Err(Status::internal("failed to send initial device list"));
        }
        tokio::spawn(session.run());

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get_preferred_allocation(
        &self,
        _request: Request<PreferredAllocationRequest>,
    ) -> std::result::Result<Response<PreferredAllocationResponse>, Status> {
        info!("GetPreferredAllocation called");
        RPC_REQUESTS.with_label_values(&["get_preferred_allocation"]).inc();
        Ok(Response::new(PreferredAllocationResponse::default()))
    }

    /// Exposes the allocated device IDs to each container as a single
    /// comma-joined environment variable. The registry is not touched:
    /// availability only follows the device directory.
    async fn allocate(
        &self,
        request: Request<AllocateRequest>,
    ) -> std::result::Result<Response<AllocateResponse>, Status> {
        info!("Allocate called");
        RPC_REQUESTS.with_label_values(&["allocate"]).inc();

        let container_responses = request
            .into_inner()
            .container_requests
            .into_iter()
            .map(|req| {
                let ids = req.devices_ids.join(",");
                info!("received request: {}", ids);
                ContainerAllocateResponse {
                    envs: HashMap::from([(self.allocation_env.clone(), ids)]),
                    ..Default::default()
                }
            })
            .collect();

        Ok(Response::new(AllocateResponse { container_responses }))
    }

    async fn pre_start_container(
        &self,
        _request: Request<PreStartContainerRequest>,
    ) -> std::result::Result<Response<PreStartContainerResponse>, Status> {
        info!("PreStartContainer called");
        RPC_REQUESTS.with_label_values(&["pre_start_container"]).inc();
        Ok(Response::new(PreStartContainerResponse {}))
    }
}
