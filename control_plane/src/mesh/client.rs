//! The one real `MeshClient`, talking to the mesh control plane's HTTP
//! config-entries, catalog, and discovery-chain endpoints. Blocking reads
//! follow the index/`X-Consul-Index` convention: a `wait_index` of 0 returns
//! immediately, anything else blocks server-side until the entry changes or
//! the server's own wait bound elapses.

use crate::mesh::{DiscoveryChain, MeshClient, MeshServiceInstance};
use crate::model::identity::NamespaceName;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const INDEX_HEADER: &str = "X-Consul-Index";
const BLOCKING_WAIT: &str = "5m";

pub struct HttpMeshClient {
    http: Client,
    base_url: Url,
}

impl HttpMeshClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url,
        })
    }

    fn config_entry_url(&self, kind: &str, name: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/v1/config-entries/{kind}/{name}"));
        url
    }
}

#[derive(Deserialize)]
struct ConfigEntryEnvelope {
    #[serde(rename = "ModifyIndex", default)]
    modify_index: u64,
    #[serde(flatten)]
    rest: Value,
}

#[derive(Deserialize)]
struct CatalogServiceInstance {
    #[serde(rename = "ServiceName")]
    service_name: String,
    #[serde(rename = "Namespace", default)]
    namespace: String,
}

#[derive(Deserialize, Default)]
struct DiscoveryChainResponse {
    #[serde(default)]
    targets: Vec<DiscoveryChainTarget>,
}

#[derive(Deserialize)]
struct DiscoveryChainTarget {
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Namespace", default)]
    namespace: String,
}

#[async_trait]
impl MeshClient for HttpMeshClient {
    async fn get_config_entry(&self, kind: &str, name: &str) -> anyhow::Result<Option<(Value, u64)>> {
        let response = self.http.get(self.config_entry_url(kind, name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ConfigEntryEnvelope = response.error_for_status()?.json().await?;
        Ok(Some((envelope.rest, envelope.modify_index)))
    }

    async fn set_config_entry(&self, kind: &str, name: &str, value: Value) -> anyhow::Result<()> {
        self.http
            .put(self.config_entry_url(kind, name))
            .json(&value)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn cas_config_entry(&self, kind: &str, name: &str, value: Value, modify_index: u64) -> anyhow::Result<bool> {
        let mut url = self.config_entry_url(kind, name);
        url.query_pairs_mut().append_pair("cas", &modify_index.to_string());
        let response = self.http.put(url).json(&value).send().await?.error_for_status()?;
        Ok(response.json::<bool>().await.unwrap_or(false))
    }

    async fn delete_config_entry(&self, kind: &str, name: &str) -> anyhow::Result<()> {
        let response = self.http.delete(self.config_entry_url(kind, name)).send().await?;
        if response.status() != StatusCode::NOT_FOUND {
            response.error_for_status()?;
        }
        Ok(())
    }

    async fn services_with_filter(&self, filter: &str) -> anyhow::Result<Vec<MeshServiceInstance>> {
        let mut url = self.base_url.clone();
        url.set_path("/v1/catalog/services");
        url.query_pairs_mut().append_pair("filter", filter);

        let response = self.http.get(url).send().await?.error_for_status()?;
        let instances: Vec<CatalogServiceInstance> = response.json().await?;
        Ok(instances
            .into_iter()
            .map(|i| MeshServiceInstance {
                service_name: i.service_name,
                namespace: i.namespace,
            })
            .collect())
    }

    async fn discovery_chain(&self, service: &str, namespace: &str, wait_index: u64) -> anyhow::Result<DiscoveryChain> {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/v1/discovery-chain/{service}"));
        url.query_pairs_mut().append_pair("namespace", namespace);
        if wait_index > 0 {
            url.query_pairs_mut()
                .append_pair("index", &wait_index.to_string())
                .append_pair("wait", BLOCKING_WAIT);
        }

        let response = self.http.get(url).send().await?.error_for_status()?;
        let next_index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(wait_index);
        let chain: DiscoveryChainResponse = response.json().await?;

        Ok(DiscoveryChain {
            wait_index: next_index,
            targets: chain
                .targets
                .into_iter()
                .map(|t| NamespaceName::new(t.namespace, t.service))
                .collect(),
        })
    }
}
