pub mod grpc;
pub(crate) mod health_checker;
mod registration;
pub mod uds;

pub use grpc::DevicePluginService;
pub use registration::*;
