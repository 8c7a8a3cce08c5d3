//! Device Plugin Error Hierarchy
//!
//! Errors are grouped by the component boundary where they occur. Only
//! [`Error::Fatal`] and device inventory failures at startup are allowed to
//! terminate the process; everything else is contained by the caller.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (filesystem, sockets, transport)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Handshake with the kubelet failed
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// The directory backing the device inventory cannot be listed
    #[error("Device directory {path} is unreadable")]
    DeviceDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem event source failures (watcher creation or attachment)
    #[error("Device watch on {path} failed")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A stale socket file exists and cannot be removed
    #[error("Failed to remove stale socket {path}")]
    SocketCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plugin socket cannot be bound
    #[error("Failed to bind socket {path}")]
    SocketBind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dial did not complete within the allowed duration
    #[error("Dial {path} timed out after {duration:?}")]
    DialTimeout { path: PathBuf, duration: Duration },

    /// gRPC transport layer errors
    #[error(transparent)]
    Transport(#[from] Box<tonic::transport::Error>),

    /// gRPC status code errors
    #[error(transparent)]
    Status(#[from] Box<tonic::Status>),

    /// Endpoint answered but does not report itself as serving
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Log file or directory could not be prepared
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The kubelet registration socket could not be reached
    #[error("Kubelet registration socket {path} is unreachable")]
    Unreachable {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The kubelet refused the registration request
    #[error("Kubelet rejected registration of {resource_name}: {status}")]
    Rejected {
        resource_name: String,
        status: Box<tonic::Status>,
    },
}
