use crate::mesh::MeshClient;
use crate::mesh::config_entries::{
    ConfigEntryIndex, ConfigEntryKey, IngressGatewayConfigEntry, ServiceDefaultsEntry,
    ServiceRouterEntry, ServiceSplitterEntry,
};
use thiserror::Error;
use tracing::{error, info};

#[derive(Clone, Debug, Default)]
pub struct AppliedMeshIndex {
    pub routers: ConfigEntryIndex<ServiceRouterEntry>,
    pub splitters: ConfigEntryIndex<ServiceSplitterEntry>,
    pub defaults: ConfigEntryIndex<ServiceDefaultsEntry>,
}

/// What the Converter produced for a Gateway's current set of listeners.
/// `ingress` is `None` when every listener is empty (no service attached) —
/// the mesh requires a target, so an empty ingress is simply not emitted.
#[derive(Clone, Debug, Default)]
pub struct ComputedMeshConfig {
    pub routers: ConfigEntryIndex<ServiceRouterEntry>,
    pub splitters: ConfigEntryIndex<ServiceSplitterEntry>,
    pub defaults: ConfigEntryIndex<ServiceDefaultsEntry>,
    pub ingress: Option<IngressGatewayConfigEntry>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to apply {kind} {name}: {source}")]
    Apply {
        kind: &'static str,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Applies a computed mesh configuration in the fixed order that minimises
/// data-plane disruption (defaults, routers, splitters, ingress, then
/// deletes in reverse dependency order). On any failure in the additive
/// steps, returns the error without advancing the applied index so the next
/// sync retries the same diff. Delete failures are logged and best-effort:
/// the applied index still advances for the additions that did succeed.
pub async fn sync(
    mesh: &dyn MeshClient,
    computed: &ComputedMeshConfig,
    applied: &AppliedMeshIndex,
) -> Result<AppliedMeshIndex, SyncError> {
    for (key, entry) in computed.defaults.to_array() {
        apply(mesh, "service-defaults", &key, &entry).await?;
    }
    for (key, entry) in computed.routers.to_array() {
        apply(mesh, "service-router", &key, &entry).await?;
    }
    for (key, entry) in computed.splitters.to_array() {
        apply(mesh, "service-splitter", &key, &entry).await?;
    }
    if let Some(ingress) = &computed.ingress {
        let key = ConfigEntryKey::new("ingress-gateway", ingress.name.clone());
        apply(mesh, "ingress-gateway", &key, ingress).await?;
    }

    let removed_routers = applied.routers.difference(&computed.routers);
    let removed_splitters = applied.splitters.difference(&computed.splitters);
    let removed_defaults = applied.defaults.difference(&computed.defaults);

    let mut delete_failures = 0u32;
    for (key, _) in &removed_routers {
        delete_failures += delete(mesh, "service-router", key).await;
    }
    for (key, _) in &removed_splitters {
        delete_failures += delete(mesh, "service-splitter", key).await;
    }
    for (key, _) in &removed_defaults {
        delete_failures += delete(mesh, "service-defaults", key).await;
    }

    if delete_failures > 0 {
        info!(
            delete_failures,
            "sync applied additions; some deletes failed and will retry next cycle"
        );
    }

    Ok(AppliedMeshIndex {
        routers: computed.routers.clone(),
        splitters: computed.splitters.clone(),
        defaults: computed.defaults.clone(),
    })
}

async fn apply<T: serde::Serialize>(
    mesh: &dyn MeshClient,
    kind: &'static str,
    key: &ConfigEntryKey,
    entry: &T,
) -> Result<(), SyncError> {
    let value = serde_json::to_value(entry).map_err(|e| SyncError::Apply {
        kind,
        name: key.name.clone(),
        source: e.into(),
    })?;
    mesh.set_config_entry(kind, &key.name, value)
        .await
        .map_err(|source| SyncError::Apply {
            kind,
            name: key.name.clone(),
            source,
        })
}

async fn delete(mesh: &dyn MeshClient, kind: &'static str, key: &ConfigEntryKey) -> u32 {
    match mesh.delete_config_entry(kind, &key.name).await {
        Ok(()) => 0,
        Err(e) => {
            error!(kind, entry = %key.name, error = %e, "failed to delete config entry");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MockMeshClient;
    use crate::mesh::config_entries::EntryMeta;
    use tokio_test::block_on;

    fn meta() -> EntryMeta {
        EntryMeta {
            external_source: "meshgate".to_string(),
            gateway_name: "gw".to_string(),
            gateway_namespace: "default".to_string(),
            route_name: None,
            route_namespace: None,
        }
    }

    #[test]
    fn sync_advances_applied_index_on_success() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_set_config_entry().returning(|_, _, _| Ok(()));
            mesh.expect_delete_config_entry().returning(|_, _| Ok(()));

            let mut computed = ComputedMeshConfig::default();
            computed.defaults.add(
                ConfigEntryKey::new("service-defaults", "svc"),
                ServiceDefaultsEntry {
                    name: "svc".to_string(),
                    protocol: "http".to_string(),
                    meta: meta(),
                },
            );

            let applied = AppliedMeshIndex::default();
            let result = sync(&mesh, &computed, &applied).await.unwrap();
            assert_eq!(result.defaults.len(), 1);
        });
    }

    #[test]
    fn sync_does_not_advance_on_additive_failure() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_set_config_entry()
                .returning(|_, _, _| Err(anyhow::anyhow!("transport error")));

            let mut computed = ComputedMeshConfig::default();
            computed.defaults.add(
                ConfigEntryKey::new("service-defaults", "svc"),
                ServiceDefaultsEntry {
                    name: "svc".to_string(),
                    protocol: "http".to_string(),
                    meta: meta(),
                },
            );

            let applied = AppliedMeshIndex::default();
            assert!(sync(&mesh, &computed, &applied).await.is_err());
        });
    }
}
