//! Upstream resources: the destinations routes point at.
//!
//! `UpstreamSpec` is a closed set of variants. Only the `Aws` variant carries
//! discoverable functions, which the function discovery poller keeps fresh.

use serde::{Deserialize, Serialize};

use super::resource::{Metadata, Resource};

/// A routable destination backed by one of several upstream kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub metadata: Metadata,
    pub spec: UpstreamSpec,
}

impl Upstream {
    pub fn new(metadata: Metadata, spec: UpstreamSpec) -> Self {
        Self { metadata, spec }
    }

    /// Name of the Envoy cluster translated from this upstream
    pub fn cluster_name(&self) -> String {
        format!("{}_{}", self.metadata.name, self.metadata.namespace)
    }
}

impl Resource for Upstream {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamSpec {
    Static(StaticUpstream),
    Aws(AwsUpstream),
}

impl UpstreamSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamSpec::Static(_) => "static",
            UpstreamSpec::Aws(_) => "aws",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticUpstream {
    pub hosts: Vec<HostAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAddress {
    pub address: String,
    pub port: u16,
}

/// Function-hosting upstream. `functions` is `None` until the first
/// successful discovery pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsUpstream {
    pub region: String,
    #[serde(default)]
    pub functions: Option<Vec<LambdaFunction>>,
}

/// A remotely discovered function. `logical_name` is the stable sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaFunction {
    pub logical_name: String,
    pub function_name: String,
    #[serde(default)]
    pub qualifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upstream_spec_is_tagged() {
        let upstream: Upstream = serde_json::from_value(json!({
            "metadata": { "name": "lambdas", "namespace": "gloo-system" },
            "spec": { "type": "aws", "region": "us-east-1" }
        }))
        .unwrap();

        match &upstream.spec {
            UpstreamSpec::Aws(aws) => {
                assert_eq!(aws.region, "us-east-1");
                assert!(aws.functions.is_none());
            }
            other => panic!("unexpected variant {}", other.kind()),
        }
        assert_eq!(upstream.cluster_name(), "lambdas_gloo-system");
    }
}
