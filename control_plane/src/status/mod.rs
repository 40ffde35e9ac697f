use crate::kubernetes::client::KubernetesClient;
use crate::model::gateway::Gateway;
use crate::model::route::Route;
use crate::model::status::{GatewayClassStatus, RouteParentStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::error;

/// Identifies conditions this engine owns among a resource's published set,
/// so foreign controllers' entries on a shared Route survive a merge.
pub const CONTROLLER_NAME: &str = "meshgate.io/gateway-controller";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: &'static str,
    pub status: bool,
    pub reason: &'static str,
    pub observed_generation: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRefJson {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub section_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedParentStatus {
    pub controller_name: String,
    pub parent_ref: ParentRefJson,
    pub conditions: Vec<Condition>,
}

/// Gateway's three top-level conditions, each reduced from its underlying
/// error struct: first non-nil error wins, otherwise the positive reason.
pub fn gateway_conditions(gateway: &Gateway) -> Vec<Condition> {
    let generation = gateway.status.observed_generation;

    let scheduled = match &gateway.status.scheduled {
        Some(kind) => Condition {
            r#type: "Scheduled",
            status: false,
            reason: kind.reason(),
            observed_generation: generation,
        },
        None => Condition {
            r#type: "Scheduled",
            status: true,
            reason: "Scheduled",
            observed_generation: generation,
        },
    };

    let ready = Condition {
        r#type: "Ready",
        status: gateway.status.is_ready(),
        reason: if gateway.status.is_ready() { "Ready" } else { "ListenersNotReady" },
        observed_generation: generation,
    };

    let in_sync = Condition {
        r#type: "InSync",
        status: gateway.status.is_in_sync(),
        reason: if gateway.status.is_in_sync() { "InSync" } else { "SyncError" },
        observed_generation: generation,
    };

    vec![scheduled, ready, in_sync]
}

pub fn gateway_class_conditions(status: &GatewayClassStatus) -> Vec<Condition> {
    match status.rejected_reason {
        Some(reason) => vec![Condition {
            r#type: "Accepted",
            status: false,
            reason,
            observed_generation: status.observed_generation,
        }],
        None => vec![Condition {
            r#type: "Accepted",
            status: true,
            reason: "Accepted",
            observed_generation: status.observed_generation,
        }],
    }
}

fn to_published(status: &RouteParentStatus) -> PublishedParentStatus {
    let accepted = match &status.accepted {
        Ok(()) => Condition {
            r#type: "Accepted",
            status: true,
            reason: "Accepted",
            observed_generation: status.observed_generation,
        },
        Err(e) => Condition {
            r#type: "Accepted",
            status: false,
            reason: e.reason(),
            observed_generation: status.observed_generation,
        },
    };

    let resolved_refs = match status.resolved_refs.first() {
        Some(e) => Condition {
            r#type: "ResolvedRefs",
            status: false,
            reason: e.reason(),
            observed_generation: status.observed_generation,
        },
        None => Condition {
            r#type: "ResolvedRefs",
            status: true,
            reason: "ResolvedRefs",
            observed_generation: status.observed_generation,
        },
    };

    PublishedParentStatus {
        controller_name: CONTROLLER_NAME.to_string(),
        parent_ref: ParentRefJson {
            group: status.parent_ref.group.clone(),
            kind: status.parent_ref.kind.clone(),
            namespace: status.parent_ref.namespace.clone(),
            name: status.parent_ref.name.clone(),
            section_name: status.parent_ref.section_name.clone(),
        },
        conditions: vec![accepted, resolved_refs],
    }
}

fn flatten_route_parent_statuses(route: &Route) -> Vec<RouteParentStatus> {
    route
        .state()
        .map(|s| s.parent_statuses.values().flatten().cloned().collect())
        .unwrap_or_default()
}

/// Gateway status has exactly one writer (this engine owns the whole
/// resource), so the merge degenerates to a straight replace; only the
/// Route parent list genuinely needs the partition-by-controller algebra,
/// since more than one Gateway controller may publish parent statuses onto
/// the same shared Route.
pub fn sync_gateway_status(gateway: &Gateway, published: Option<&serde_json::Value>) -> Option<serde_json::Value> {
    let computed = gateway_conditions(gateway);
    let computed_json = serde_json::to_value(&computed).ok()?;

    let unchanged = published
        .and_then(|p| p.get("conditions"))
        .is_some_and(|c| *c == computed_json);

    if unchanged {
        None
    } else {
        Some(json!({ "status": { "conditions": computed_json } }))
    }
}

pub fn sync_gateway_class_status(
    status: &GatewayClassStatus,
    published: Option<&serde_json::Value>,
) -> Option<serde_json::Value> {
    let computed = gateway_class_conditions(status);
    let computed_json = serde_json::to_value(&computed).ok()?;

    let unchanged = published
        .and_then(|p| p.get("conditions"))
        .is_some_and(|c| *c == computed_json);

    if unchanged {
        None
    } else {
        Some(json!({ "status": { "conditions": computed_json } }))
    }
}

/// Partitions the published `parents` list by controller identity, replaces
/// this controller's entries with the freshly computed ones, sorts by the
/// stable parentRef key, and returns a patch only if the merged result
/// differs from what is already published.
pub fn sync_route_parent_statuses(route: &Route, published: Option<&serde_json::Value>) -> Option<serde_json::Value> {
    let computed: Vec<PublishedParentStatus> = flatten_route_parent_statuses(route).iter().map(to_published).collect();

    let existing: Vec<PublishedParentStatus> = published
        .and_then(|p| p.get("parents"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    let mut merged: BTreeMap<ParentRefJson, PublishedParentStatus> = existing
        .into_iter()
        .filter(|p| p.controller_name != CONTROLLER_NAME)
        .map(|p| (p.parent_ref.clone(), p))
        .collect();

    for p in computed {
        merged.insert(p.parent_ref.clone(), p);
    }

    let result: Vec<PublishedParentStatus> = merged.into_values().collect();
    let result_json = serde_json::to_value(&result).ok()?;

    let unchanged = published.and_then(|p| p.get("parents")).is_some_and(|v| *v == result_json);

    if unchanged {
        None
    } else {
        Some(json!({ "status": { "parents": result_json } }))
    }
}

/// Writes the computed Gateway status if it differs from what is published.
/// Leaves the in-memory status untouched either way; on a write failure the
/// caller's next reconcile simply recomputes and retries.
pub async fn write_gateway_status(
    kube: &dyn KubernetesClient,
    gateway: &Gateway,
    published: Option<&serde_json::Value>,
) -> bool {
    let Some(patch) = sync_gateway_status(gateway, published) else {
        return true;
    };

    match kube.update_gateway_status(&gateway.id, patch).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, gateway = %gateway.id, "gateway status write failed, will retry next reconcile");
            false
        }
    }
}

/// Writes the computed GatewayClass status if it differs from what is
/// published. Mirrors `write_gateway_status`, but keyed by class name since
/// GatewayClass is cluster-scoped.
pub async fn write_gateway_class_status(
    kube: &dyn KubernetesClient,
    name: &str,
    status: &GatewayClassStatus,
    published: Option<&serde_json::Value>,
) -> bool {
    let Some(patch) = sync_gateway_class_status(status, published) else {
        return true;
    };

    match kube.update_gateway_class_status(name, patch).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, class = name, "gateway class status write failed, will retry next reconcile");
            false
        }
    }
}

pub async fn write_route_status(
    kube: &dyn KubernetesClient,
    route: &Route,
    kind: &str,
    published: Option<&serde_json::Value>,
) -> bool {
    let Some(patch) = sync_route_parent_statuses(route, published) else {
        return true;
    };

    match kube.update_route_status(route.id().namespace_name(), kind, patch).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, route = %route.id(), "route status write failed, will retry next reconcile");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gateway::Gateway;
    use crate::model::identity::NamespaceName;
    use crate::model::status::{GatewayStatus, ScheduledErrorKind};

    fn gateway_with_status(status: GatewayStatus) -> Gateway {
        Gateway {
            id: NamespaceName::new("default", "gw"),
            gateway_class_name: "default".to_string(),
            generation: 1,
            resource_version: Some(1),
            listeners: Vec::new(),
            desired_addresses: Vec::new(),
            addresses: Vec::new(),
            status,
        }
    }

    #[test]
    fn unready_gateway_reports_scheduled_error_reason() {
        let gw = gateway_with_status(GatewayStatus {
            scheduled: Some(ScheduledErrorKind::PodFailed),
            ..Default::default()
        });
        let conditions = gateway_conditions(&gw);
        let scheduled = conditions.iter().find(|c| c.r#type == "Scheduled").unwrap();
        assert!(!scheduled.status);
        assert_eq!(scheduled.reason, "PodFailed");
    }

    #[test]
    fn identical_published_status_produces_no_patch() {
        let gw = gateway_with_status(GatewayStatus::default());
        let computed = serde_json::to_value(gateway_conditions(&gw)).unwrap();
        let published = json!({ "conditions": computed });

        assert!(sync_gateway_status(&gw, Some(&published)).is_none());
    }

    #[test]
    fn changed_status_produces_a_patch() {
        let gw = gateway_with_status(GatewayStatus::default());
        let published = json!({ "conditions": [] });

        assert!(sync_gateway_status(&gw, Some(&published)).is_some());
    }

    #[test]
    fn foreign_controller_parent_entries_survive_merge() {
        use crate::model::route::{HttpRoute, RouteState};
        use crate::model::status::ParentRefKey;

        let foreign = json!({
            "parents": [
                {
                    "controllerName": "other.io/controller",
                    "parentRef": { "group": "g", "kind": "Gateway", "namespace": "default", "name": "other-gw", "sectionName": null },
                    "conditions": [],
                }
            ]
        });

        let mut state = RouteState::default();
        state.parent_statuses.insert(
            NamespaceName::new("default", "gw"),
            vec![RouteParentStatus::accepted(
                ParentRefKey {
                    group: "gateway.networking.k8s.io".to_string(),
                    kind: "Gateway".to_string(),
                    namespace: "default".to_string(),
                    name: "gw".to_string(),
                    section_name: None,
                },
                1,
            )],
        );
        let route = Route::Http(HttpRoute {
            id: NamespaceName::new("default", "r"),
            generation: 1,
            parent_refs: Vec::new(),
            hostnames: Vec::new(),
            rules: Vec::new(),
            state,
        });

        let patch = sync_route_parent_statuses(&route, Some(&foreign)).expect("differs from published");
        let parents = patch["status"]["parents"].as_array().unwrap();
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().any(|p| p["controllerName"] == "other.io/controller"));
        assert!(parents.iter().any(|p| p["controllerName"] == CONTROLLER_NAME));
    }
}
