//! Domain layer
//!
//! Resource identity and the domain resources flowing through the control
//! plane. Nothing here depends on sources, channels or Envoy types.
//!
//! ## Module Organization
//!
//! - `id`: type-safe identifiers (`SourceName`, `ResourceRef`)
//! - `resource`: the `Resource` trait, `Metadata` and `DynamicResource`
//! - `upstream`: upstream destinations, including function-hosting upstreams

pub mod id;
pub mod resource;
pub mod upstream;

pub use id::{ProxyId, ResourceRef, SourceName};
pub use resource::{DynamicResource, Metadata, Resource};
pub use upstream::{
    AwsUpstream, HostAddress, LambdaFunction, StaticUpstream, Upstream, UpstreamSpec,
};
