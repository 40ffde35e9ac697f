use crate::instrumentation::INTENTION_RECONCILE_CYCLES_TOTAL;
use crate::mesh::MeshClient;
use crate::mesh::config_entries::{IntentionAction, IntentionSource, ServiceIntentionsEntry};
use crate::model::identity::NamespaceName;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

const SERVICE_INTENTIONS_KIND: &str = "service-intentions";

#[derive(Clone, Debug, Default)]
struct IntentionTargetIndex {
    targets: HashSet<NamespaceName>,
}

/// One instance runs as a long-lived per-Gateway task. Tracks the gateway's
/// last-applied discovery-chain target set and the tombstone set of targets
/// whose removal is still owed to the mesh.
pub struct IntentionReconciler<'a> {
    gateway_name: String,
    gateway_namespace: String,
    mesh: &'a dyn MeshClient,
    cas_retry_count: u32,
    cas_retry_interval: Duration,
    applied: IntentionTargetIndex,
    tombstones: HashSet<NamespaceName>,
}

impl<'a> IntentionReconciler<'a> {
    pub fn new(
        gateway_name: impl Into<String>,
        gateway_namespace: impl Into<String>,
        mesh: &'a dyn MeshClient,
        cas_retry_count: u32,
        cas_retry_interval: Duration,
    ) -> Self {
        Self {
            gateway_name: gateway_name.into(),
            gateway_namespace: gateway_namespace.into(),
            mesh,
            cas_retry_count,
            cas_retry_interval,
            applied: IntentionTargetIndex::default(),
            tombstones: HashSet::new(),
        }
    }

    /// Diffs a freshly observed discovery-chain target set against the last
    /// applied index and applies the delta: adds first, then removes.
    pub async fn reconcile(&mut self, targets: HashSet<NamespaceName>) {
        let added: Vec<_> = targets.difference(&self.applied.targets).cloned().collect();
        let removed: Vec<_> = self.applied.targets.difference(&targets).cloned().collect();

        for target in added {
            if self.upsert_source(&target).await {
                self.tombstones.remove(&target);
            } else {
                self.tombstones.insert(target);
            }
        }
        for target in &removed {
            if !self.remove_source(target).await {
                self.tombstones.insert(target.clone());
            }
        }

        self.applied.targets = targets;
    }

    /// Re-applies sources for all live targets and re-attempts all
    /// tombstones, as defence against writes lost to exhausted per-update
    /// retries.
    pub async fn sweep(&mut self) {
        let live: Vec<_> = self.applied.targets.iter().cloned().collect();
        for target in live {
            self.upsert_source(&target).await;
        }

        let pending: Vec<_> = self.tombstones.iter().cloned().collect();
        for target in pending {
            if self.remove_source(&target).await {
                self.tombstones.remove(&target);
            }
        }
    }

    #[cfg(test)]
    fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    async fn upsert_source(&self, target: &NamespaceName) -> bool {
        for attempt in 0..self.cas_retry_count {
            match self.try_upsert_source(target).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!(error = %e, target = %target, "intention upsert failed, retrying"),
            }
            if attempt + 1 < self.cas_retry_count {
                tokio::time::sleep(self.cas_retry_interval).await;
            }
        }
        error!(target = %target, "intention upsert exhausted retries, deferring to periodic sweep");
        false
    }

    async fn try_upsert_source(&self, target: &NamespaceName) -> anyhow::Result<bool> {
        let entry_name = target.name.clone();
        let existing = self.mesh.get_config_entry(SERVICE_INTENTIONS_KIND, &entry_name).await?;

        let (mut entry, modify_index) = match existing {
            Some((value, index)) => (serde_json::from_value::<ServiceIntentionsEntry>(value)?, index),
            None => (
                ServiceIntentionsEntry {
                    name: entry_name.clone(),
                    sources: Vec::new(),
                    modify_index: 0,
                },
                0,
            ),
        };

        let source = IntentionSource {
            name: self.gateway_name.clone(),
            namespace: self.gateway_namespace.clone(),
            action: IntentionAction::Allow,
        };
        if !entry.sources.iter().any(|s| *s == source) {
            entry.sources.push(source);
        }

        let value = serde_json::to_value(&entry)?;
        if modify_index == 0 {
            self.mesh.set_config_entry(SERVICE_INTENTIONS_KIND, &entry_name, value).await?;
            Ok(true)
        } else {
            self.mesh
                .cas_config_entry(SERVICE_INTENTIONS_KIND, &entry_name, value, modify_index)
                .await
        }
    }

    async fn remove_source(&self, target: &NamespaceName) -> bool {
        for attempt in 0..self.cas_retry_count {
            match self.try_remove_source(target).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!(error = %e, target = %target, "intention removal failed, retrying"),
            }
            if attempt + 1 < self.cas_retry_count {
                tokio::time::sleep(self.cas_retry_interval).await;
            }
        }
        error!(target = %target, "intention removal exhausted retries, deferring to periodic sweep");
        false
    }

    async fn try_remove_source(&self, target: &NamespaceName) -> anyhow::Result<bool> {
        let entry_name = target.name.clone();
        let Some((value, modify_index)) = self.mesh.get_config_entry(SERVICE_INTENTIONS_KIND, &entry_name).await? else {
            return Ok(true);
        };

        let mut entry: ServiceIntentionsEntry = serde_json::from_value(value)?;
        entry
            .sources
            .retain(|s| !(s.name == self.gateway_name && s.namespace == self.gateway_namespace));

        if entry.sources.is_empty() {
            self.mesh.delete_config_entry(SERVICE_INTENTIONS_KIND, &entry_name).await?;
            Ok(true)
        } else {
            let value = serde_json::to_value(&entry)?;
            self.mesh
                .cas_config_entry(SERVICE_INTENTIONS_KIND, &entry_name, value, modify_index)
                .await
        }
    }
}

/// Runs the watch/diff/retry loop for one Gateway until `shutdown` fires.
/// The discovery-chain query blocks server-side on the wait-index, so the
/// loop otherwise only wakes on a chain change or the periodic sweep tick.
pub async fn run(
    gateway_name: String,
    gateway_namespace: String,
    mesh: &dyn MeshClient,
    cas_retry_count: u32,
    cas_retry_interval: Duration,
    sweep_interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut reconciler = IntentionReconciler::new(
        gateway_name.clone(),
        gateway_namespace.clone(),
        mesh,
        cas_retry_count,
        cas_retry_interval,
    );
    let mut wait_index = 0u64;
    let mut sweep = tokio::time::interval(sweep_interval);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(gateway = %gateway_name, "intention reconciler shutting down");
                    return;
                }
            }
            _ = sweep.tick() => {
                reconciler.sweep().await;
                INTENTION_RECONCILE_CYCLES_TOTAL.inc();
            }
            result = mesh.discovery_chain(&gateway_name, &gateway_namespace, wait_index) => {
                match result {
                    Ok(chain) => {
                        wait_index = chain.wait_index;
                        let targets: HashSet<NamespaceName> = chain.targets.into_iter().collect();
                        reconciler.reconcile(targets).await;
                        INTENTION_RECONCILE_CYCLES_TOTAL.inc();
                    }
                    Err(e) => {
                        warn!(error = %e, gateway = %gateway_name, "discovery chain watch failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MockMeshClient;
    use tokio_test::block_on;

    fn target(name: &str) -> NamespaceName {
        NamespaceName::new("default", name)
    }

    #[test]
    fn new_target_creates_intentions_entry() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_get_config_entry().returning(|_, _| Ok(None));
            mesh.expect_set_config_entry().returning(|_, _, _| Ok(()));

            let mut reconciler = IntentionReconciler::new("gw", "default", &mesh, 3, Duration::from_millis(1));
            let mut targets = HashSet::new();
            targets.insert(target("svc-a"));
            reconciler.reconcile(targets).await;

            assert_eq!(reconciler.tombstone_count(), 0);
        });
    }

    #[test]
    fn removed_target_deletes_entry_when_sources_empty() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_get_config_entry().returning(|_, name| {
                let entry = ServiceIntentionsEntry {
                    name: name.to_string(),
                    sources: vec![IntentionSource {
                        name: "gw".to_string(),
                        namespace: "default".to_string(),
                        action: IntentionAction::Allow,
                    }],
                    modify_index: 5,
                };
                Ok(Some((serde_json::to_value(entry).unwrap(), 5)))
            });
            mesh.expect_delete_config_entry().returning(|_, _| Ok(()));

            let mut reconciler = IntentionReconciler::new("gw", "default", &mesh, 3, Duration::from_millis(1));
            let mut first = HashSet::new();
            first.insert(target("svc-a"));
            reconciler.applied.targets = first;

            reconciler.reconcile(HashSet::new()).await;
            assert_eq!(reconciler.tombstone_count(), 0);
        });
    }

    #[test]
    fn exhausted_retries_add_target_to_tombstones() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_get_config_entry()
                .returning(|_, _| Err(anyhow::anyhow!("transport error")));

            let mut reconciler = IntentionReconciler::new("gw", "default", &mesh, 2, Duration::from_millis(1));
            let mut first = HashSet::new();
            first.insert(target("svc-a"));
            reconciler.applied.targets = first;

            reconciler.reconcile(HashSet::new()).await;
            assert_eq!(reconciler.tombstone_count(), 1);
        });
    }

    #[test]
    fn sweep_clears_tombstone_once_removal_succeeds() {
        block_on(async {
            let mut mesh = MockMeshClient::new();
            mesh.expect_get_config_entry().returning(|_, _| Ok(None));
            mesh.expect_delete_config_entry().returning(|_, _| Ok(()));

            let mut reconciler = IntentionReconciler::new("gw", "default", &mesh, 2, Duration::from_millis(1));
            reconciler.tombstones.insert(target("svc-a"));

            reconciler.sweep().await;
            assert_eq!(reconciler.tombstone_count(), 0);
        });
    }
}
