//! Persists Gateway/Route state across restarts. Snapshots are a stable
//! JSON projection of the engine's model rather than a serde derive over
//! the model types themselves, so an internal model change never forces a
//! wire-format migration.

use crate::model::gateway::{Gateway, Listener, Protocol};
use crate::model::identity::NamespaceName;
use crate::model::route::{HttpRoute, IdentityRoute, Route, RouteState, TcpRoute};
use crate::model::status::{GatewayStatus, ResolutionError, ResolutionErrorKind};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

fn protocol_str(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Http => "HTTP",
        Protocol::Https => "HTTPS",
        Protocol::Tcp => "TCP",
    }
}

fn protocol_from_str(s: &str) -> Protocol {
    match s {
        "HTTPS" => Protocol::Https,
        "TCP" => Protocol::Tcp,
        _ => Protocol::Http,
    }
}

fn resolution_error_kind_from_reason(reason: &str) -> ResolutionErrorKind {
    match reason {
        "ServiceNotFound" => ResolutionErrorKind::K8sService,
        "ConsulServiceNotFound" => ResolutionErrorKind::ConsulService,
        "RefNotPermitted" => ResolutionErrorKind::RefNotPermitted,
        "InvalidKind" => ResolutionErrorKind::InvalidKind,
        "BackendNotFound" => ResolutionErrorKind::BackendNotFound,
        _ => ResolutionErrorKind::Generic,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ListenerSnapshot {
    name: String,
    protocol: String,
    port: u16,
    hostname: Option<String>,
}

/// Gateway spec snapshot plus the minimal `GatewayState` summary:
/// bound-route membership and computed status are left for the Validator
/// and Binder to recompute on the first post-restart reconcile, so only the
/// fields that drive `Gateway::compare` and listener identity are kept.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewaySnapshot {
    namespace: String,
    name: String,
    gateway_class_name: String,
    generation: i64,
    resource_version: Option<u64>,
    listeners: Vec<ListenerSnapshot>,
    desired_addresses: Vec<String>,
    addresses: Vec<String>,
}

pub fn marshal_gateway(gateway: &Gateway) -> GatewaySnapshot {
    GatewaySnapshot {
        namespace: gateway.id.namespace.clone(),
        name: gateway.id.name.clone(),
        gateway_class_name: gateway.gateway_class_name.clone(),
        generation: gateway.generation,
        resource_version: gateway.resource_version,
        listeners: gateway
            .listeners
            .iter()
            .map(|l| ListenerSnapshot {
                name: l.name.clone(),
                protocol: protocol_str(l.protocol).to_string(),
                port: u16::from(l.port),
                hostname: l.hostname.clone(),
            })
            .collect(),
        desired_addresses: gateway.desired_addresses.clone(),
        addresses: gateway.addresses.clone(),
    }
}

pub fn unmarshal_gateway(snapshot: &GatewaySnapshot) -> Gateway {
    let listeners = snapshot
        .listeners
        .iter()
        .map(|l| Listener {
            name: l.name.clone(),
            protocol: protocol_from_str(&l.protocol),
            port: l.port.into(),
            hostname: l.hostname.clone(),
            tls: None,
            allowed_routes: Default::default(),
            status: Default::default(),
            routes: Default::default(),
        })
        .collect();

    Gateway {
        id: NamespaceName::new(snapshot.namespace.clone(), snapshot.name.clone()),
        gateway_class_name: snapshot.gateway_class_name.clone(),
        generation: snapshot.generation,
        resource_version: snapshot.resource_version,
        listeners,
        desired_addresses: snapshot.desired_addresses.clone(),
        addresses: snapshot.addresses.clone(),
        status: GatewayStatus::default(),
    }
}

/// Route's GVK tag and `RouteState` summary. The raw API object
/// bytes are not kept here: the live watch's first `InitApply` for this
/// Route lands before any reconcile can run against it, so the full spec
/// is always refreshed rather than read back from a stale snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteSnapshot {
    kind: String,
    namespace: String,
    name: String,
    generation: i64,
    resolution_error_reasons: Vec<String>,
}

fn route_kind_tag(route: &Route) -> &'static str {
    match route {
        Route::Http(_) => "HTTPRoute",
        Route::Tcp(_) => "TCPRoute",
        Route::Tls(_) => "TLSRoute",
        Route::Udp(_) => "UDPRoute",
    }
}

pub fn marshal_route(route: &Route) -> RouteSnapshot {
    let id = route.id();
    let nn = id.namespace_name();
    RouteSnapshot {
        kind: route_kind_tag(route).to_string(),
        namespace: nn.namespace.clone(),
        name: nn.name.clone(),
        generation: route.generation(),
        resolution_error_reasons: route
            .state()
            .map(|s| s.resolution_errors.iter().map(|e| e.reason().to_string()).collect())
            .unwrap_or_default(),
    }
}

/// Rebuilds a Route in the shape the first post-restart watch `Apply` will
/// refresh: identity, generation, and the resolution-error reasons needed
/// to keep status stable across the restart gap. Rules/backends are never
/// reconstructed from the snapshot (see `RouteSnapshot`'s doc comment) — the
/// live object always supplies those before any reconcile runs against it.
pub fn unmarshal_route(snapshot: &RouteSnapshot) -> Route {
    let id = NamespaceName::new(snapshot.namespace.clone(), snapshot.name.clone());
    let state = RouteState {
        resolution_errors: snapshot
            .resolution_error_reasons
            .iter()
            .map(|r| ResolutionError::new(resolution_error_kind_from_reason(r)))
            .collect(),
        parent_statuses: Default::default(),
    };

    match snapshot.kind.as_str() {
        "TCPRoute" => Route::Tcp(TcpRoute {
            id,
            generation: snapshot.generation,
            parent_refs: Vec::new(),
            backend: None,
            state,
        }),
        "TLSRoute" => Route::Tls(IdentityRoute {
            id,
            generation: snapshot.generation,
            parent_refs: Vec::new(),
        }),
        "UDPRoute" => Route::Udp(IdentityRoute {
            id,
            generation: snapshot.generation,
            parent_refs: Vec::new(),
        }),
        _ => Route::Http(HttpRoute {
            id,
            generation: snapshot.generation,
            parent_refs: Vec::new(),
            hostnames: Vec::new(),
            rules: Vec::new(),
            state,
        }),
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    gateways: Vec<GatewaySnapshot>,
    routes: Vec<RouteSnapshot>,
}

/// Marshals every Gateway and Route currently held by the store.
pub async fn marshal_store(store: &Store) -> StoreSnapshot {
    let mut gateways = Vec::new();
    for id in store.gateway_ids() {
        if let Some(handle) = store.gateway_handle(&id) {
            gateways.push(marshal_gateway(&handle.read().await.gateway));
        }
    }
    let routes = store.routes().iter().map(|r| marshal_route(r)).collect();
    StoreSnapshot { gateways, routes }
}

/// Writes the current store state to `path` as JSON. Intended to run
/// periodically or on graceful shutdown; a failed write is logged and
/// never fatal, since the previous snapshot on disk is still usable.
pub async fn save(store: &Store, path: &Path) -> anyhow::Result<()> {
    let snapshot = marshal_store(store).await;
    let bytes = serde_json::to_vec_pretty(&snapshot)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Loads a persisted snapshot into `store` if one exists at `path`. Must
/// run before the event router starts delivering live watch events, so the
/// first live apply is diffed against rehydrated state instead of every
/// Gateway looking brand new and forcing a redundant full mesh resync.
pub async fn rehydrate(store: &Store, path: &Path) -> anyhow::Result<()> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no persisted snapshot, starting cold");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot: StoreSnapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "snapshot is corrupt, starting cold");
            return Ok(());
        }
    };

    let gateway_count = snapshot.gateways.len();
    for gateway_snapshot in &snapshot.gateways {
        store.upsert_gateway(unmarshal_gateway(gateway_snapshot)).await;
    }

    let route_count = snapshot.routes.len();
    for route_snapshot in &snapshot.routes {
        store.upsert_route(unmarshal_route(route_snapshot));
    }

    info!(gateways = gateway_count, routes = route_count, "rehydrated store from snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gateway::{AllowedRoutes, ListenerStatus};
    use tokio_test::block_on;

    fn gateway() -> Gateway {
        Gateway {
            id: NamespaceName::new("default", "gw"),
            gateway_class_name: "default".to_string(),
            generation: 3,
            resource_version: Some(42),
            listeners: vec![Listener {
                name: "http".to_string(),
                protocol: Protocol::Http,
                port: 80u16.into(),
                hostname: None,
                tls: None,
                allowed_routes: AllowedRoutes::default(),
                status: ListenerStatus::default(),
                routes: Default::default(),
            }],
            desired_addresses: Vec::new(),
            addresses: Vec::new(),
            status: GatewayStatus::default(),
        }
    }

    #[test]
    fn marshal_unmarshal_gateway_round_trips_spec_fields() {
        let original = gateway();
        let snapshot = marshal_gateway(&original);
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let decoded: GatewaySnapshot = serde_json::from_slice(&bytes).unwrap();
        let restored = unmarshal_gateway(&decoded);

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.generation, original.generation);
        assert_eq!(restored.resource_version, original.resource_version);
        assert_eq!(restored.listeners.len(), original.listeners.len());
        assert_eq!(restored.listeners[0].name, original.listeners[0].name);
    }

    fn tcp_route() -> Route {
        Route::Tcp(crate::model::route::TcpRoute {
            id: NamespaceName::new("default", "tcp-route"),
            generation: 2,
            parent_refs: Vec::new(),
            backend: None,
            state: crate::model::route::RouteState {
                resolution_errors: vec![ResolutionError::new(ResolutionErrorKind::BackendNotFound)],
                parent_statuses: Default::default(),
            },
        })
    }

    #[test]
    fn marshal_unmarshal_route_round_trips_identity_and_errors() {
        let original = tcp_route();
        let snapshot = marshal_route(&original);
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let decoded: RouteSnapshot = serde_json::from_slice(&bytes).unwrap();
        let restored = unmarshal_route(&decoded);

        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.generation(), original.generation());
        assert_eq!(
            restored.state().unwrap().resolution_errors[0].kind,
            ResolutionErrorKind::BackendNotFound
        );
    }

    #[test]
    fn rehydrate_is_a_no_op_when_no_snapshot_exists() {
        block_on(async {
            let store = Store::new();
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("missing.json");

            rehydrate(&store, &path).await.unwrap();
            assert!(store.gateway_ids().is_empty());
        });
    }

    #[test]
    fn save_then_rehydrate_restores_gateways() {
        block_on(async {
            let store = Store::new();
            store.upsert_gateway(gateway()).await;

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            save(&store, &path).await.unwrap();

            let restored_store = Store::new();
            rehydrate(&restored_store, &path).await.unwrap();

            assert_eq!(restored_store.gateway_ids().len(), 1);
        });
    }

    #[test]
    fn save_then_rehydrate_restores_routes() {
        block_on(async {
            let store = Store::new();
            store.upsert_route(tcp_route());

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            save(&store, &path).await.unwrap();

            let restored_store = Store::new();
            rehydrate(&restored_store, &path).await.unwrap();

            let routes = restored_store.routes();
            assert_eq!(routes.len(), 1);
            assert_eq!(routes[0].id(), tcp_route().id());
        });
    }
}
