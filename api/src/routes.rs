//! Local CRDs for the non-HTTP Gateway-API route kinds.
//!
//! The `gateway-api` crate this implementation is built on only vendors the
//! standard channel (`GatewayClass`, `Gateway`, `HTTPRoute`). `TCPRoute` is
//! resolved by this engine the same way `HTTPRoute` is, so it is defined here
//! under our own group with the same `kube::CustomResource` shape the
//! standard channel uses. `TLSRoute`/`UDPRoute` are recognised only for
//! identity and never resolved or converted, so they carry no routing fields
//! at all.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteParentRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteBackendRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TCPRouteRule {
    pub backend_refs: Vec<RouteBackendRef>,
}

/// Mirrors the standard channel's `HTTPRoute` shape for the subset this engine
/// needs: parent refs for binding and a rule list constrained to exactly one
/// rule with exactly one backend ref.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "TCPRoute",
    group = "meshgate.io",
    version = "v1alpha2",
    namespaced,
    singular = "tcproute",
    plural = "tcproutes",
    status = "TCPRouteStatus"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct TCPRouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<RouteParentRef>,
    #[serde(default)]
    pub rules: Vec<TCPRouteRule>,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TCPRouteParentStatus {
    pub parent_ref: RouteParentRef,
    pub controller_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TCPRouteStatus {
    #[serde(default)]
    pub parents: Vec<TCPRouteParentStatus>,
}

/// Identity-only: never resolved, bound, or converted.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "TLSRoute",
    group = "meshgate.io",
    version = "v1alpha2",
    namespaced,
    singular = "tlsroute",
    plural = "tlsroutes"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct TLSRouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<RouteParentRef>,
}

/// Identity-only: never resolved, bound, or converted.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "UDPRoute",
    group = "meshgate.io",
    version = "v1alpha2",
    namespaced,
    singular = "udproute",
    plural = "udproutes"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct UDPRouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<RouteParentRef>,
}
