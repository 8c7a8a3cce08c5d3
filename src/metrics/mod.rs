use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref DEVICES_IN_USE: IntGauge =
        IntGauge::new("devices_in_use", "Devices currently consumed, i.e. the watermark")
            .expect("metric can not be created");

    pub static ref DEVICES_AVAILABLE: IntGauge =
        IntGauge::new("devices_available", "Devices currently advertised as Healthy")
            .expect("metric can not be created");

    pub static ref RPC_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("rpc_requests_total", "Device plugin RPC calls by method"),
        &["method"]
    )
    .expect("metric can not be created");

    pub static ref LIST_AND_WATCH_PUSHES: IntCounter = IntCounter::new(
        "list_and_watch_pushes_total",
        "Device snapshots pushed to ListAndWatch sessions"
    )
    .expect("metric can not be created");

    pub static ref SERVER_RESTARTS: IntCounter = IntCounter::new(
        "server_restarts_total",
        "gRPC serve loop failures"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DEVICES_IN_USE.clone()),
        Box::new(DEVICES_AVAILABLE.clone()),
        Box::new(RPC_REQUESTS.clone()),
        Box::new(LIST_AND_WATCH_PUSHES.clone()),
        Box::new(SERVER_RESTARTS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `GET /metrics` until `shutdown` is cancelled.
pub async fn start_server(
    port: u16,
    shutdown: CancellationToken,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("metrics server listening on 0.0.0.0:{}", port);
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        shutdown.cancelled().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(encode_metrics(&REGISTRY))
}

pub(crate) fn encode_metrics(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
