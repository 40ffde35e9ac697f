use crate::model::gateway::{Comparison, Gateway};
use crate::model::identity::{GatewayClassId, GatewayId, RouteId};
use crate::model::route::Route;
use crate::model::status::GatewayClassStatus;
use crate::sync::AppliedMeshIndex;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::warn;

pub struct GatewayEntry {
    pub gateway: Gateway,
    pub applied_index: AppliedMeshIndex,
    pub route_count: AtomicU64,
}

impl GatewayEntry {
    fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            applied_index: AppliedMeshIndex::default(),
            route_count: AtomicU64::new(0),
        }
    }
}

/// Owns canonical in-memory state of Gateways and Routes. Every Gateway gets
/// its own read-write lock: readers overlap, writers
/// on the same Gateway serialise against each other, and there is no
/// ordering guarantee across distinct Gateways.
#[derive(Default)]
pub struct Store {
    gateways: DashMap<GatewayId, Arc<RwLock<GatewayEntry>>>,
    routes: DashMap<RouteId, Arc<Route>>,
    gateway_classes: RwLock<HashMap<GatewayClassId, GatewayClassStatus>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_gateway_class(&self, id: GatewayClassId, status: GatewayClassStatus) {
        self.gateway_classes.write().await.insert(id, status);
    }

    pub async fn delete_gateway_class(&self, id: &GatewayClassId) {
        self.gateway_classes.write().await.remove(id);
    }

    pub async fn gateway_class(&self, id: &GatewayClassId) -> Option<GatewayClassStatus> {
        self.gateway_classes.read().await.get(id).cloned()
    }

    /// Returns `true` iff the incoming Gateway replaced the stored instance
    /// and a sync is now owed. `Equal` is a no-op; `Newer` means the event
    /// carries a stale resource version and is skipped.
    pub async fn upsert_gateway(&self, incoming: Gateway) -> bool {
        let handle = self
            .gateways
            .entry(incoming.id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(GatewayEntry::new(incoming.clone()))))
            .clone();

        let mut entry = handle.write().await;
        match entry.gateway.compare(&incoming) {
            Comparison::Equal => false,
            Comparison::Newer => {
                warn!(gateway = %incoming.id, "stale Gateway update, skipping");
                false
            }
            Comparison::NotEqual => {
                entry.gateway = incoming;
                true
            }
        }
    }

    /// Removes the Gateway and returns the ids of every Route that had a
    /// parent-status entry for it, so the caller can fire `OnGatewayRemoved`
    /// and drop those entries.
    pub fn delete_gateway(&self, id: &GatewayId) -> Vec<RouteId> {
        self.gateways.remove(id);
        self.routes
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .state()
                    .is_some_and(|state| state.parent_statuses.contains_key(id))
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drops the parent-status entry for `gateway_id` from the named Route,
    /// if present. Part of `OnGatewayRemoved`.
    pub fn remove_parent_status(&self, route_id: &RouteId, gateway_id: &GatewayId) {
        if let Some(mut entry) = self.routes.get_mut(route_id) {
            let mut route = (**entry.value()).clone();
            if let Some(state) = route.state_mut() {
                state.parent_statuses.remove(gateway_id);
            }
            *entry.value_mut() = Arc::new(route);
        }
    }

    pub fn gateway_handle(&self, id: &GatewayId) -> Option<Arc<RwLock<GatewayEntry>>> {
        self.gateways.get(id).map(|e| e.clone())
    }

    pub fn gateway_ids(&self) -> Vec<GatewayId> {
        self.gateways.iter().map(|e| e.key().clone()).collect()
    }

    /// Stores the Route and returns every known Gateway id, so the caller
    /// can run the Binder against each and trigger sync where binding
    /// changed.
    pub fn upsert_route(&self, route: Route) -> Vec<GatewayId> {
        self.routes.insert(route.id(), Arc::new(route));
        self.gateway_ids()
    }

    pub fn delete_route(&self, id: &RouteId) -> Vec<GatewayId> {
        self.routes.remove(id);
        self.gateway_ids()
    }

    pub fn route(&self, id: &RouteId) -> Option<Arc<Route>> {
        self.routes.get(id).map(|e| e.clone())
    }

    pub fn replace_route(&self, route: Route) {
        self.routes.insert(route.id(), Arc::new(route));
    }

    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.routes.iter().map(|e| e.clone()).collect()
    }

    pub fn increment_route_count(entry: &GatewayEntry) {
        entry.route_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_route_count(entry: &GatewayEntry) {
        entry.route_count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::NamespaceName;
    use crate::model::status::GatewayStatus;
    use tokio_test::block_on;

    fn gw(id: &str) -> Gateway {
        Gateway {
            id: NamespaceName::new("default", id),
            gateway_class_name: "default".to_string(),
            generation: 1,
            resource_version: Some(1),
            listeners: Vec::new(),
            desired_addresses: Vec::new(),
            addresses: Vec::new(),
            status: GatewayStatus::default(),
        }
    }

    #[test]
    fn upsert_gateway_no_ops_on_equal() {
        block_on(async {
            let store = Store::new();
            assert!(store.upsert_gateway(gw("gw")).await);
            assert!(!store.upsert_gateway(gw("gw")).await);
        });
    }

    #[test]
    fn upsert_gateway_skips_stale_resource_version() {
        block_on(async {
            let store = Store::new();
            let mut newer = gw("gw");
            newer.resource_version = Some(10);
            assert!(store.upsert_gateway(newer).await);

            let mut stale = gw("gw");
            stale.resource_version = Some(5);
            stale.generation = 2;
            assert!(!store.upsert_gateway(stale).await);
        });
    }

    #[test]
    fn delete_gateway_removes_entry() {
        block_on(async {
            let store = Store::new();
            store.upsert_gateway(gw("gw")).await;
            store.delete_gateway(&NamespaceName::new("default", "gw"));
            assert!(store.gateway_handle(&NamespaceName::new("default", "gw")).is_none());
        });
    }
}
