use k8s_openapi::api::core::v1::ServiceSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// The `GatewayClass.spec.parametersRef` target. Cluster-scoped: one config can be
/// shared by every `Gateway` that selects the `GatewayClass` referencing it.
///
/// A `GatewayClass` is *admitted* iff this resource exists and its GVK matches what
/// `parametersRef` names; otherwise the class is rejected with reason `InvalidParameters`.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "GatewayClassConfig",
    group = "meshgate.io",
    version = "v1alpha1",
    singular = "gateway-class-config",
    plural = "gateway-class-configs"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct GatewayClassConfigSpec {
    /// Overrides for the managed proxy Deployment created per Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<ManagedProxyDeployment>,

    /// Overrides for the managed proxy Service created per Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ManagedProxyService>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProxyDeployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<ImagePullPolicy>,
}

#[derive(Default, Deserialize, Serialize, Copy, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub enum ImagePullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProxyService {
    /// Drives the validator's address-selection order for the Gateway.
    #[serde(default)]
    pub service_type: ManagedProxyServiceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub spec_overrides: Option<ServiceSpec>,
}

#[derive(
    Default, Deserialize, Serialize, Copy, Clone, Debug, JsonSchema, PartialEq, IntoStaticStr,
)]
#[serde(rename_all = "PascalCase")]
#[strum(serialize_all = "PascalCase")]
pub enum ManagedProxyServiceType {
    #[default]
    ClusterIP,
    LoadBalancer,
    NodePort,
}

/// The custom backend kind the resolver can target besides `(core, Service)`.
/// Carries an explicit override for the mesh-side service identity, for
/// services registered under a different name/namespace than their
/// Kubernetes counterpart.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "MeshService",
    group = "meshgate.io",
    version = "v1alpha1",
    namespaced,
    singular = "mesh-service",
    plural = "mesh-services"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct MeshServiceSpec {
    pub mesh_service_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_namespace: Option<String>,
}
