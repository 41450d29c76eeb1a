//! Function discovery for function-hosting upstreams.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::poller::{DiscoveryPoller, DiscoverySource};
use crate::config::DiscoveryConfig;
use crate::domain::{LambdaFunction, Resource, ResourceRef, Upstream, UpstreamSpec};
use crate::errors::{Result, SwitchyardError};
use crate::sources::ResourceStore;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Lists the functions deployed in one region.
#[async_trait]
pub trait FunctionFetcher: Send + Sync {
    async fn list_functions(&self, region: &str) -> Result<Vec<LambdaFunction>>;
}

/// Fetches `GET {base_url}/regions/{region}/functions`.
#[derive(Debug, Clone)]
pub struct HttpFunctionFetcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FunctionListing {
    functions: Vec<LambdaFunction>,
}

impl HttpFunctionFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SwitchyardError::from(e).context("build function discovery client"))?;
        Ok(Self { client, base_url: base_url.into() })
    }
}

#[async_trait]
impl FunctionFetcher for HttpFunctionFetcher {
    async fn list_functions(&self, region: &str) -> Result<Vec<LambdaFunction>> {
        let url = format!("{}/regions/{}/functions", self.base_url.trim_end_matches('/'), region);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SwitchyardError::from(e).context(format!("GET {}", url)))?;

        let listing: FunctionListing = response
            .json()
            .await
            .map_err(|e| SwitchyardError::from(e).context(format!("decode {}", url)))?;
        debug!(region, count = listing.functions.len(), "Fetched function listing");
        Ok(listing.functions)
    }
}

/// Fixed listing, for wiring without a remote service.
#[derive(Debug, Clone, Default)]
pub struct StaticFunctionFetcher {
    functions: Vec<LambdaFunction>,
}

impl StaticFunctionFetcher {
    pub fn new(functions: Vec<LambdaFunction>) -> Self {
        Self { functions }
    }
}

#[async_trait]
impl FunctionFetcher for StaticFunctionFetcher {
    async fn list_functions(&self, _region: &str) -> Result<Vec<LambdaFunction>> {
        Ok(self.functions.clone())
    }
}

/// Discovery source reading the region off an `aws` upstream.
#[derive(Debug, Clone)]
pub struct FunctionDiscovery<F> {
    fetcher: F,
}

impl<F: FunctionFetcher> FunctionDiscovery<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<F: FunctionFetcher> DiscoverySource<Upstream> for FunctionDiscovery<F> {
    type Item = LambdaFunction;

    async fn fetch(&self, target: &Upstream) -> Result<Vec<LambdaFunction>> {
        match &target.spec {
            UpstreamSpec::Aws(aws) => self.fetcher.list_functions(&aws.region).await,
            other => Err(wrong_variant(target.resource_ref(), other)),
        }
    }

    fn sort_key(item: &LambdaFunction) -> &str {
        &item.logical_name
    }
}

/// Mutator installing discovered functions on an `aws` upstream.
pub fn install_functions(upstream: &mut Upstream, functions: Vec<LambdaFunction>) -> Result<()> {
    let id = upstream.resource_ref();
    match &mut upstream.spec {
        UpstreamSpec::Aws(aws) => {
            aws.functions = Some(functions);
            Ok(())
        }
        other => Err(wrong_variant(id, other)),
    }
}

fn wrong_variant(id: ResourceRef, spec: &UpstreamSpec) -> SwitchyardError {
    SwitchyardError::discovery(format!("upstream {} is a {} upstream, expected aws", id, spec.kind()))
}

/// Poller keeping `target`'s function list in sync with `fetcher`.
pub fn function_poller<F: FunctionFetcher + 'static>(
    target: ResourceRef,
    store: Arc<dyn ResourceStore<Upstream>>,
    fetcher: F,
    config: &DiscoveryConfig,
) -> DiscoveryPoller<Upstream, FunctionDiscovery<F>> {
    DiscoveryPoller::new(
        target,
        store,
        FunctionDiscovery::new(fetcher),
        Box::new(install_functions),
        config,
    )
}
