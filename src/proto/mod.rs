//! Protocol Buffer definitions and generated code for the kubelet device
//! plugin API.
//!
//! The types are generated by [`tonic-build`] from
//! `proto/deviceplugin.proto` at build time.

pub mod v1beta1 {
    tonic::include_proto!("v1beta1");
}
