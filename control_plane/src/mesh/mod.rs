pub mod client;
pub mod config_entries;

use crate::model::identity::NamespaceName;
use async_trait::async_trait;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshServiceInstance {
    pub service_name: String,
    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscoveryChain {
    pub wait_index: u64,
    pub targets: Vec<NamespaceName>,
}

/// The mesh control plane, kept external per the out-of-scope boundary:
/// HTTP/RPC transport and credentials are an external collaborator's
/// concern. `cas_config_entry` returns `Ok(false)` on an index mismatch so
/// callers can retry without treating a conflict as a transport error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeshClient: Send + Sync {
    async fn get_config_entry(
        &self,
        kind: &str,
        name: &str,
    ) -> anyhow::Result<Option<(serde_json::Value, u64)>>;

    async fn set_config_entry(&self, kind: &str, name: &str, value: serde_json::Value) -> anyhow::Result<()>;

    async fn cas_config_entry(
        &self,
        kind: &str,
        name: &str,
        value: serde_json::Value,
        modify_index: u64,
    ) -> anyhow::Result<bool>;

    async fn delete_config_entry(&self, kind: &str, name: &str) -> anyhow::Result<()>;

    async fn services_with_filter(&self, filter: &str) -> anyhow::Result<Vec<MeshServiceInstance>>;

    /// Blocking query: returns once the chain changes or the server's own
    /// long-poll bound elapses. `wait_index` of 0 returns immediately.
    async fn discovery_chain(&self, service: &str, namespace: &str, wait_index: u64) -> anyhow::Result<DiscoveryChain>;
}
