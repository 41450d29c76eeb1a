//! The canned "always answer with a fixed response" listener and cluster.
//!
//! The fallback cluster points at the fallback listener on the proxy's own
//! loopback address; the listener answers every request with a direct
//! response. Routes redirected to the cluster therefore end up served by
//! the listener without any real upstream.

use envoy_types::pb::envoy::config::cluster::v3::cluster::{ClusterDiscoveryType, DiscoveryType};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::{
    address, data_source, socket_address, Address, DataSource, SocketAddress,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::config::listener::v3::{filter, Filter, FilterChain, Listener};
use envoy_types::pb::envoy::config::route::v3::{
    route, route_match::PathSpecifier, DirectResponseAction, Route, RouteConfiguration,
    RouteMatch, VirtualHost,
};
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router as RouterFilter;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{CodecType, RouteSpecifier},
    http_filter::ConfigType as HttpFilterConfigType,
    HttpConnectionManager, HttpFilter,
};
use envoy_types::pb::google::protobuf::Duration;
use prost::Message;

use super::resources::{any_from_message, HTTP_CONNECTION_MANAGER_TYPE_URL, ROUTER_TYPE_URL};
use crate::config::SanitizerConfig;

const ROUTER_FILTER_NAME: &str = "envoy.filters.http.router";
const HCM_FILTER_NAME: &str = "envoy.filters.network.http_connection_manager";

/// Fallback listener and cluster, built once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResources {
    listener: Listener,
    cluster: Cluster,
}

impl FallbackResources {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self { listener: fallback_listener(config), cluster: fallback_cluster(config) }
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn listener_name(&self) -> &str {
        &self.listener.name
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster.name
    }
}

fn socket_address(config: &SanitizerConfig) -> Address {
    Address {
        address: Some(address::Address::SocketAddress(SocketAddress {
            address: config.fallback_bind_address.clone(),
            port_specifier: Some(socket_address::PortSpecifier::PortValue(
                config.fallback_port.into(),
            )),
            ..Default::default()
        })),
    }
}

fn fallback_listener(config: &SanitizerConfig) -> Listener {
    let direct_response = Route {
        name: format!("{}_route", config.fallback_listener_name),
        r#match: Some(RouteMatch {
            path_specifier: Some(PathSpecifier::Prefix("/".to_string())),
            ..Default::default()
        }),
        action: Some(route::Action::DirectResponse(DirectResponseAction {
            status: config.fallback_status_code,
            body: Some(DataSource {
                specifier: Some(data_source::Specifier::InlineString(config.fallback_body.clone())),
                watched_directory: None,
            }),
            ..Default::default()
        })),
        ..Default::default()
    };

    let route_config = RouteConfiguration {
        name: config.fallback_listener_name.clone(),
        virtual_hosts: vec![VirtualHost {
            name: "fallback".to_string(),
            domains: vec!["*".to_string()],
            routes: vec![direct_response],
            ..Default::default()
        }],
        ..Default::default()
    };

    let hcm = HttpConnectionManager {
        codec_type: CodecType::Auto as i32,
        stat_prefix: "fallback_http".to_string(),
        route_specifier: Some(RouteSpecifier::RouteConfig(route_config)),
        http_filters: vec![HttpFilter {
            name: ROUTER_FILTER_NAME.to_string(),
            is_optional: false,
            disabled: false,
            config_type: Some(HttpFilterConfigType::TypedConfig(any_from_message(
                ROUTER_TYPE_URL,
                &RouterFilter::default(),
            ))),
        }],
        ..Default::default()
    };

    Listener {
        name: config.fallback_listener_name.clone(),
        address: Some(socket_address(config)),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HCM_FILTER_NAME.to_string(),
                config_type: Some(filter::ConfigType::TypedConfig(any_from_message(
                    HTTP_CONNECTION_MANAGER_TYPE_URL,
                    &hcm,
                ))),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn fallback_cluster(config: &SanitizerConfig) -> Cluster {
    Cluster {
        name: config.fallback_cluster_name.clone(),
        connect_timeout: Some(Duration { seconds: 5, nanos: 0 }),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Static as i32)),
        load_assignment: Some(ClusterLoadAssignment {
            cluster_name: config.fallback_cluster_name.clone(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![LbEndpoint {
                    host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
                        address: Some(socket_address(config)),
                        ..Default::default()
                    })),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Status and body served by a fallback listener, if it is one.
pub fn direct_response_of(listener: &Listener) -> Option<(u32, String)> {
    let filter = listener.filter_chains.first()?.filters.first()?;
    let Some(filter::ConfigType::TypedConfig(any)) = filter.config_type.as_ref() else {
        return None;
    };
    let hcm = HttpConnectionManager::decode(any.value.as_slice()).ok()?;
    let Some(RouteSpecifier::RouteConfig(route_config)) = hcm.route_specifier else {
        return None;
    };
    let route = route_config.virtual_hosts.first()?.routes.first()?;
    match route.action.as_ref()? {
        route::Action::DirectResponse(response) => {
            let body = match response.body.as_ref()?.specifier.as_ref()? {
                data_source::Specifier::InlineString(body) => body.clone(),
                _ => return None,
            };
            Some((response.status, body))
        }
        _ => None,
    }
}
