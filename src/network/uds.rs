//! Client channels over Unix domain sockets.

use std::path::Path;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tokio::time::sleep;
use tokio::time::timeout;
use tonic::transport::Channel;
use tonic::transport::Endpoint;
use tonic::transport::Uri;
use tower::service_fn;
use tracing::debug;

use crate::constants::DIAL_RETRY_INTERVAL;
use crate::constants::UDS_PLACEHOLDER_URI;
use crate::Result;
use crate::SystemError;

/// Connects a gRPC channel to the socket at `socket_path`.
///
/// Keeps retrying until a connection is established or `dial_timeout`
/// elapses, so a server that is still starting up can be waited for.
pub async fn connect_unix(
    socket_path: &Path,
    dial_timeout: Duration,
) -> Result<Channel> {
    let path = socket_path.to_path_buf();
    let attempt = async {
        loop {
            match dial_once(&path, dial_timeout).await {
                Ok(channel) => return channel,
                Err(e) => {
                    debug!("dial {} failed: {}, retrying", path.display(), e);
                    sleep(DIAL_RETRY_INTERVAL).await;
                }
            }
        }
    };

    timeout(dial_timeout, attempt).await.map_err(|_| {
        SystemError::DialTimeout {
            path: socket_path.to_path_buf(),
            duration: dial_timeout,
        }
        .into()
    })
}

async fn dial_once(
    socket_path: &Path,
    dial_timeout: Duration,
) -> std::result::Result<Channel, tonic::transport::Error> {
    let path = socket_path.to_path_buf();
    Endpoint::from_static(UDS_PLACEHOLDER_URI)
        .connect_timeout(dial_timeout)
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
        }))
        .await
}
