use crate::model::identity::NamespaceName;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service};
use meshgate_api::v1alpha1::{GatewayClassConfig, MeshServiceSpec};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct MeshServiceOverride {
    pub mesh_service_name: String,
    pub mesh_namespace: Option<String>,
}

impl From<MeshServiceSpec> for MeshServiceOverride {
    fn from(spec: MeshServiceSpec) -> Self {
        Self {
            mesh_service_name: spec.mesh_service_name,
            mesh_namespace: spec.mesh_namespace,
        }
    }
}

/// The Kubernetes API surface the engine consumes, kept behind a trait so
/// the Validator, Resolver, and Status engine can be exercised against a
/// mock instead of a live cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KubernetesClient: Send + Sync {
    async fn get_secret(&self, id: &NamespaceName) -> anyhow::Result<Option<Secret>>;

    async fn get_service(&self, id: &NamespaceName) -> anyhow::Result<Option<Service>>;

    async fn get_namespace_labels(&self, namespace: &str) -> anyhow::Result<BTreeMap<String, String>>;

    async fn get_mesh_service(&self, id: &NamespaceName) -> anyhow::Result<Option<MeshServiceOverride>>;

    async fn get_gateway_class_config(&self, name: &str) -> anyhow::Result<Option<GatewayClassConfig>>;

    async fn is_reference_grant_permitted(
        &self,
        from_namespace: &str,
        to: &NamespaceName,
        to_kind: &str,
    ) -> anyhow::Result<bool>;

    async fn pods_with_labels(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> anyhow::Result<Vec<Pod>>;

    async fn update_gateway_status(&self, id: &NamespaceName, patch: serde_json::Value) -> anyhow::Result<()>;

    async fn update_route_status(
        &self,
        id: &NamespaceName,
        kind: &str,
        patch: serde_json::Value,
    ) -> anyhow::Result<()>;

    async fn update_gateway_class_status(&self, name: &str, patch: serde_json::Value) -> anyhow::Result<()>;
}

const FIELD_MANAGER: &str = "meshgate.io/gateway-controller";

/// The one real `KubernetesClient`, backed by a live `kube::Client`. Status
/// writes use a server-side `Patch::Merge` under our own field manager
/// rather than fetch-then-`replace_status`: the patches the Status engine
/// computes are already partial merge documents, so there is nothing to
/// fetch first.
pub struct KubeApiClient {
    client: kube::Client,
}

impl KubeApiClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubernetesClient for KubeApiClient {
    async fn get_secret(&self, id: &NamespaceName) -> anyhow::Result<Option<Secret>> {
        let api: kube::Api<Secret> = kube::Api::namespaced(self.client.clone(), &id.namespace);
        match api.get_opt(&id.name).await {
            Ok(secret) => Ok(secret),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_service(&self, id: &NamespaceName) -> anyhow::Result<Option<Service>> {
        let api: kube::Api<Service> = kube::Api::namespaced(self.client.clone(), &id.namespace);
        Ok(api.get_opt(&id.name).await?)
    }

    async fn get_namespace_labels(&self, namespace: &str) -> anyhow::Result<BTreeMap<String, String>> {
        let api: kube::Api<Namespace> = kube::Api::all(self.client.clone());
        let ns = api.get(namespace).await?;
        Ok(ns.metadata.labels.unwrap_or_default().into_iter().collect())
    }

    async fn get_mesh_service(&self, id: &NamespaceName) -> anyhow::Result<Option<MeshServiceOverride>> {
        let api: kube::Api<meshgate_api::v1alpha1::MeshService> =
            kube::Api::namespaced(self.client.clone(), &id.namespace);
        let found = api.get_opt(&id.name).await?;
        Ok(found.map(|m| MeshServiceOverride::from(m.spec)))
    }

    async fn get_gateway_class_config(&self, name: &str) -> anyhow::Result<Option<GatewayClassConfig>> {
        let api: kube::Api<GatewayClassConfig> = kube::Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    /// ReferenceGrant is namespace-scoped in the target namespace and grants
    /// are additive: any single matching grant permits the reference.
    async fn is_reference_grant_permitted(
        &self,
        from_namespace: &str,
        to: &NamespaceName,
        to_kind: &str,
    ) -> anyhow::Result<bool> {
        let api: kube::Api<gateway_api::apis::standard::referencegrants::ReferenceGrant> =
            kube::Api::namespaced(self.client.clone(), &to.namespace);
        let grants = api.list(&kube::api::ListParams::default()).await?;

        Ok(grants.items.iter().any(|grant| {
            grant.spec.from.iter().any(|f| f.namespace == from_namespace)
                && grant.spec.to.iter().any(|t| {
                    t.kind == to_kind && t.name.as_deref().is_none_or(|n| n == to.name)
                })
        }))
    }

    async fn pods_with_labels(&self, namespace: &str, labels: &BTreeMap<String, String>) -> anyhow::Result<Vec<Pod>> {
        let api: kube::Api<Pod> = kube::Api::namespaced(self.client.clone(), namespace);
        let selector = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        let params = kube::api::ListParams::default().labels(&selector);
        Ok(api.list(&params).await?.items)
    }

    async fn update_gateway_status(&self, id: &NamespaceName, patch: serde_json::Value) -> anyhow::Result<()> {
        let api: kube::Api<gateway_api::apis::standard::gateways::Gateway> =
            kube::Api::namespaced(self.client.clone(), &id.namespace);
        api.patch_status(
            &id.name,
            &kube::api::PatchParams::apply(FIELD_MANAGER),
            &kube::api::Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    async fn update_route_status(&self, id: &NamespaceName, kind: &str, patch: serde_json::Value) -> anyhow::Result<()> {
        let params = kube::api::PatchParams::apply(FIELD_MANAGER);
        let body = kube::api::Patch::Merge(&patch);

        match kind {
            "HTTPRoute" => {
                let api: kube::Api<gateway_api::apis::standard::httproutes::HTTPRoute> =
                    kube::Api::namespaced(self.client.clone(), &id.namespace);
                api.patch_status(&id.name, &params, &body).await?;
            }
            "TCPRoute" => {
                let api: kube::Api<meshgate_api::routes::TCPRoute> =
                    kube::Api::namespaced(self.client.clone(), &id.namespace);
                api.patch_status(&id.name, &params, &body).await?;
            }
            other => anyhow::bail!("status updates are not supported for route kind {other}"),
        }
        Ok(())
    }

    async fn update_gateway_class_status(&self, name: &str, patch: serde_json::Value) -> anyhow::Result<()> {
        let api: kube::Api<gateway_api::apis::standard::gatewayclasses::GatewayClass> =
            kube::Api::all(self.client.clone());
        api.patch_status(
            name,
            &kube::api::PatchParams::apply(FIELD_MANAGER),
            &kube::api::Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}
