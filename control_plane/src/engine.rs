//! Wires the Store, Validator, Binder, Resolver/Converter, Sync and Status
//! engines into the end-to-end reconcile: the
//! event router (`controllers`) only ever calls into the `Store` and the two
//! entry points here, `reconcile_gateway_class` and `reconcile_gateway`.
//! Route backend resolution also lives here (`validate_route`) since it must
//! run once per Route upsert, before the Route is stored, while binding runs
//! once per (Gateway, Route) pair, after.

use crate::binder::bind;
use crate::converter::convert;
use crate::instrumentation::{
    GATEWAYS_MANAGED, ROUTES_BOUND_TOTAL, SYNC_FAILURE_TOTAL, SYNC_SUCCESS_TOTAL,
};
use crate::kubernetes::client::KubernetesClient;
use crate::mesh::MeshClient;
use crate::model::gateway::Gateway;
use crate::model::identity::{GatewayId, RouteId};
use crate::model::route::Route;
use crate::model::status::GatewayClassStatus;
use crate::options::Options;
use crate::resolver::Resolver;
use crate::status;
use crate::store::Store;
use crate::sync::sync as apply_mesh_sync;
use crate::validator::{GatewayValidator, RouteValidator, ServiceAddressMode};
use meshgate_api::constants::{
    GATEWAY_CLASS_CONFIG_CRD_KIND, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
};
use meshgate_api::v1alpha1::ManagedProxyServiceType;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Label selector for a Gateway's managed proxy Pods. The Deployment that
/// carries these labels is templated and created by an external
/// collaborator; this engine only ever reads Pods/Service
/// matching them.
pub fn proxy_labels(gateway_id: &GatewayId) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels.insert("meshgate.io/gateway".to_string(), gateway_id.name.clone());
    labels
}

fn address_mode(service_type: ManagedProxyServiceType) -> ServiceAddressMode {
    match service_type {
        ManagedProxyServiceType::ClusterIP => ServiceAddressMode::ClusterIp,
        ManagedProxyServiceType::LoadBalancer => ServiceAddressMode::LoadBalancer,
        ManagedProxyServiceType::NodePort => ServiceAddressMode::NodePort,
    }
}

/// A GatewayClass is admitted iff the `parametersRef` target exists
/// and is of the expected kind/group.
#[instrument(skip(kube, store))]
pub async fn reconcile_gateway_class(
    kube: &dyn KubernetesClient,
    store: &Store,
    name: &str,
    parameters_ref: Option<(&str, &str, &str)>,
    generation: i64,
) -> GatewayClassStatus {
    let status = match parameters_ref {
        None => GatewayClassStatus {
            rejected_reason: None,
            observed_generation: generation,
        },
        Some((group, kind, ref_name)) => {
            if group != meshgate_api::constants::GROUP || kind != GATEWAY_CLASS_CONFIG_CRD_KIND {
                GatewayClassStatus {
                    rejected_reason: Some("InvalidParameters"),
                    observed_generation: generation,
                }
            } else {
                match kube.get_gateway_class_config(ref_name).await {
                    Ok(Some(_)) => GatewayClassStatus {
                        rejected_reason: None,
                        observed_generation: generation,
                    },
                    Ok(None) => GatewayClassStatus {
                        rejected_reason: Some("InvalidParameters"),
                        observed_generation: generation,
                    },
                    Err(e) => {
                        warn!(error = %e, class = name, "GatewayClassConfig lookup failed");
                        GatewayClassStatus {
                            rejected_reason: Some("InvalidParameters"),
                            observed_generation: generation,
                        }
                    }
                }
            }
        }
    };

    store.upsert_gateway_class(name.to_string(), status.clone()).await;
    if !status::write_gateway_class_status(kube, name, &status, None).await {
        warn!(class = name, "gateway class status write failed");
    }
    status
}

/// Resolves an HTTPRoute's backend references in place. Runs once per Route
/// upsert, before the Route lands in the Store — binding only reads
/// `RouteState::is_valid_for_binding`, it never re-resolves.
pub async fn validate_route(kube: &dyn KubernetesClient, mesh: &dyn MeshClient, options: &Options, route: &mut Route) {
    let resolver = Resolver::new(
        kube,
        mesh,
        options.backend_resolve_retry_count(),
        options.backend_resolve_retry_interval(),
    );
    let validator = RouteValidator::new(kube, resolver);

    match route {
        Route::Http(r) => validator.validate_http(r).await,
        Route::Tcp(r) => validator.validate_tcp(r).await,
        Route::Tls(_) | Route::Udp(_) => {}
    }
}

/// Runs the Binder for every stored Route against `gateway`, rebuilding each
/// Listener's route map from scratch (idempotent: re-running without an
/// intervening change reproduces the same membership). Returns the
/// Routes whose per-gateway parent status changed along with the new
/// status, so the caller can write them back, plus the set of Route ids
/// newly bound/unbound for the route-count telemetry.
async fn bind_all_routes(
    kube: &dyn KubernetesClient,
    gateway: &mut Gateway,
    routes: &[Arc<Route>],
) -> (Vec<Arc<Route>>, HashSet<RouteId>, HashSet<RouteId>) {
    let previously_bound: HashSet<RouteId> = gateway
        .listeners
        .iter()
        .flat_map(|l| l.routes.keys().cloned())
        .collect();

    for listener in &mut gateway.listeners {
        listener.routes.clear();
    }

    let mut namespace_labels_cache: std::collections::HashMap<String, BTreeMap<String, String>> =
        std::collections::HashMap::new();
    let mut changed_routes = Vec::new();

    for route in routes {
        let route_namespace = route.id().namespace_name().namespace.clone();
        let labels = match namespace_labels_cache.get(&route_namespace) {
            Some(l) => l.clone(),
            None => {
                let l = kube.get_namespace_labels(&route_namespace).await.unwrap_or_default();
                namespace_labels_cache.insert(route_namespace.clone(), l.clone());
                l
            }
        };

        let outcome = bind(gateway, route, &labels);

        for name in &outcome.bound_listener_names {
            if let Some(listener) = gateway.listeners.iter_mut().find(|l| l.name == *name) {
                listener.routes.insert(route.id(), route.clone());
            }
        }

        if outcome.parent_statuses.is_empty() {
            // No parentRef on this Route targets this Gateway at all.
            continue;
        }

        let mut new_route = (**route).clone();
        if let Some(state) = new_route.state_mut() {
            state.parent_statuses.insert(gateway.id.clone(), outcome.parent_statuses);
        }
        changed_routes.push(Arc::new(new_route));
    }

    let now_bound: HashSet<RouteId> = gateway
        .listeners
        .iter()
        .flat_map(|l| l.routes.keys().cloned())
        .collect();
    let newly_bound: HashSet<RouteId> = now_bound.difference(&previously_bound).cloned().collect();
    let newly_unbound: HashSet<RouteId> = previously_bound.difference(&now_bound).cloned().collect();

    (changed_routes, newly_bound, newly_unbound)
}

fn route_kind_str(route: &Route) -> &'static str {
    match route {
        Route::Http(_) => "HTTPRoute",
        Route::Tcp(_) => "TCPRoute",
        Route::Tls(_) => "TLSRoute",
        Route::Udp(_) => "UDPRoute",
    }
}

/// The full per-Gateway reconcile: validate, bind every stored Route,
/// convert to mesh config, sync, and write back Gateway + Route status.
/// Holds the Gateway's write lock for the whole sequence: the Sync
/// engine must hold it across the ordered apply so the applied-index update
/// is consistent with what was actually applied).
#[instrument(skip(kube, mesh, options, store), fields(gateway = %gateway_id))]
pub async fn reconcile_gateway(
    kube: &dyn KubernetesClient,
    mesh: &dyn MeshClient,
    options: &Options,
    store: &Store,
    gateway_id: &GatewayId,
) -> anyhow::Result<()> {
    let Some(handle) = store.gateway_handle(gateway_id) else {
        return Ok(());
    };
    let mut entry = handle.write().await;

    let gateway_class_config = kube
        .get_gateway_class_config(&entry.gateway.gateway_class_name)
        .await
        .ok()
        .flatten();
    let service_type = gateway_class_config
        .as_ref()
        .and_then(|c| c.spec.service.as_ref())
        .map(|s| s.service_type)
        .unwrap_or_default();
    let mode = address_mode(service_type);
    let labels = proxy_labels(gateway_id);

    GatewayValidator::new(kube).validate(&mut entry.gateway, &labels, mode).await;

    let routes = store.routes();
    let (changed_routes, newly_bound, newly_unbound) =
        bind_all_routes(kube, &mut entry.gateway, &routes).await;

    ROUTES_BOUND_TOTAL.inc_by(newly_bound.len() as u64);
    for _ in &newly_bound {
        Store::increment_route_count(&entry);
    }
    for _ in &newly_unbound {
        Store::decrement_route_count(&entry);
    }
    if !newly_bound.is_empty() || !newly_unbound.is_empty() {
        info!(
            gateway = %gateway_id,
            bound = newly_bound.len(),
            unbound = newly_unbound.len(),
            "route binding changed"
        );
    }

    let computed = convert(&entry.gateway);
    match apply_mesh_sync(mesh, &computed, &entry.applied_index).await {
        Ok(new_index) => {
            entry.applied_index = new_index;
            entry.gateway.status.in_sync_error = None;
            SYNC_SUCCESS_TOTAL.inc();
        }
        Err(e) => {
            error!(error = %e, gateway = %gateway_id, "mesh sync failed, will retry next reconcile");
            entry.gateway.status.in_sync_error = Some(e.to_string());
            SYNC_FAILURE_TOTAL.inc();
        }
    }

    entry.gateway.status.observed_generation = entry.gateway.generation;
    if !status::write_gateway_status(kube, &entry.gateway, None).await {
        warn!(gateway = %gateway_id, "gateway status write failed");
    }

    for route in changed_routes {
        let kind = route_kind_str(&route);
        if !status::write_route_status(kube, &route, kind, None).await {
            warn!(route = %route.id(), "route status write failed");
        }
        store.replace_route((*route).clone());
    }

    GATEWAYS_MANAGED.set(store.gateway_ids().len() as i64);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::client::MockKubernetesClient;
    use crate::mesh::MockMeshClient;
    use crate::model::identity::NamespaceName;
    use tokio_test::block_on;

    #[test]
    fn reconcile_gateway_is_a_no_op_for_unknown_gateway() {
        block_on(async {
            let kube = MockKubernetesClient::new();
            let mesh = MockMeshClient::new();
            let options = Options::default();
            let store = Store::new();

            let result = reconcile_gateway(&kube, &mesh, &options, &store, &NamespaceName::new("default", "missing")).await;
            assert!(result.is_ok());
        });
    }

    #[test]
    fn gateway_class_without_parameters_ref_is_admitted() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_update_gateway_class_status().returning(|_, _| Ok(()));
            let store = Store::new();
            let status = reconcile_gateway_class(&kube, &store, "default", None, 1).await;
            assert!(status.is_admitted());
        });
    }

    #[test]
    fn gateway_class_with_mismatched_group_is_rejected() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_update_gateway_class_status().returning(|_, _| Ok(()));
            let store = Store::new();
            let status = reconcile_gateway_class(
                &kube,
                &store,
                "default",
                Some(("other.io", "GatewayClassConfig", "cfg")),
                1,
            )
            .await;
            assert!(!status.is_admitted());
        });
    }

    #[test]
    fn gateway_class_with_missing_config_is_rejected() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_get_gateway_class_config().returning(|_| Ok(None));
            kube.expect_update_gateway_class_status().returning(|_, _| Ok(()));
            let store = Store::new();
            let status = reconcile_gateway_class(
                &kube,
                &store,
                "default",
                Some(("meshgate.io", "GatewayClassConfig", "cfg")),
                1,
            )
            .await;
            assert!(!status.is_admitted());
        });
    }
}
