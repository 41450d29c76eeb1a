//! Envoy type URLs and `Any` packing for the resources the control plane serves.

use envoy_types::pb::google::protobuf::Any;
use prost::Message;

pub const ENDPOINT_TYPE_URL: &str = "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";

pub const HTTP_CONNECTION_MANAGER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
pub const ROUTER_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";

/// Type URLs in the order Envoy expects updates to be applied.
pub const TYPE_URLS: [&str; 4] =
    [CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL];

/// Wrapper for a built Envoy resource along with its name.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

impl BuiltResource {
    pub fn from_message<M: Message>(name: impl Into<String>, type_url: &str, message: &M) -> Self {
        Self { name: name.into(), resource: any_from_message(type_url, message) }
    }

    pub fn into_any(self) -> Any {
        self.resource
    }

    pub fn type_url(&self) -> &str {
        &self.resource.type_url
    }
}

/// Pack a protobuf message into an `Any`.
pub fn any_from_message<M: Message>(type_url: impl Into<String>, message: &M) -> Any {
    Any { type_url: type_url.into(), value: message.encode_to_vec() }
}
