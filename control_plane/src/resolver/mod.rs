use crate::kubernetes::client::KubernetesClient;
use crate::mesh::MeshClient;
use crate::mesh::MeshServiceInstance;
use crate::model::identity::NamespaceName;
use crate::model::route::{BackendRef, ResolvedReference};
use crate::model::status::{ResolutionError, ResolutionErrorKind};
use std::time::Duration;
use tracing::warn;

pub struct Resolver<'a> {
    kube: &'a dyn KubernetesClient,
    mesh: &'a dyn MeshClient,
    retry_count: u32,
    retry_interval: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(
        kube: &'a dyn KubernetesClient,
        mesh: &'a dyn MeshClient,
        retry_count: u32,
        retry_interval: Duration,
    ) -> Self {
        Self {
            kube,
            mesh,
            retry_count,
            retry_interval,
        }
    }

    /// Resolves a backend reference to a concrete mesh target. Default
    /// group/kind is `(core, Service)`; namespace defaults to the route's
    /// own namespace.
    pub async fn resolve(
        &self,
        route_namespace: &str,
        backend_ref: &BackendRef,
    ) -> Result<ResolvedReference, ResolutionError> {
        let group = backend_ref.group.clone().unwrap_or_default();
        let kind = backend_ref
            .kind
            .clone()
            .unwrap_or_else(|| "Service".to_string());
        let namespace = backend_ref
            .namespace
            .clone()
            .unwrap_or_else(|| route_namespace.to_string());
        let id = NamespaceName::new(namespace, backend_ref.name.clone());

        match (group.as_str(), kind.as_str()) {
            ("", "Service") => self.resolve_k8s_service(&id, backend_ref).await,
            ("meshgate.io", "MeshService") => self.resolve_mesh_service(&id, backend_ref).await,
            _ => Err(ResolutionError::new(ResolutionErrorKind::InvalidKind)),
        }
    }

    async fn resolve_k8s_service(
        &self,
        id: &NamespaceName,
        backend_ref: &BackendRef,
    ) -> Result<ResolvedReference, ResolutionError> {
        match self.kube.get_service(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ResolutionError::new(ResolutionErrorKind::K8sService)),
            Err(e) => {
                return Err(ResolutionError::with_message(
                    ResolutionErrorKind::Generic,
                    e.to_string(),
                ));
            }
        }

        let filter = format!(
            "kube-service-name=={} and kube-namespace=={} and kind!=connect-proxy",
            id.name, id.namespace
        );
        self.query_mesh_with_retry(&filter, backend_ref).await
    }

    async fn resolve_mesh_service(
        &self,
        id: &NamespaceName,
        backend_ref: &BackendRef,
    ) -> Result<ResolvedReference, ResolutionError> {
        let override_ = match self.kube.get_mesh_service(id).await {
            Ok(Some(o)) => o,
            Ok(None) => return Err(ResolutionError::new(ResolutionErrorKind::K8sService)),
            Err(e) => {
                return Err(ResolutionError::with_message(
                    ResolutionErrorKind::Generic,
                    e.to_string(),
                ));
            }
        };
        let namespace = override_.mesh_namespace.unwrap_or_else(|| id.namespace.clone());
        let filter = format!(
            "service-name=={} and service-namespace=={}",
            override_.mesh_service_name, namespace
        );
        self.query_mesh_with_retry(&filter, backend_ref).await
    }

    /// Bounded constant backoff (30 attempts x 1s by default) to absorb mesh
    /// registration lag before giving up.
    async fn query_mesh_with_retry(
        &self,
        filter: &str,
        backend_ref: &BackendRef,
    ) -> Result<ResolvedReference, ResolutionError> {
        for attempt in 0..self.retry_count {
            match self.mesh.services_with_filter(filter).await {
                Ok(instances) if !instances.is_empty() => {
                    return reconcile_instances(instances, backend_ref);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, filter, "mesh service lookup failed, retrying"),
            }

            if attempt + 1 < self.retry_count {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        Err(ResolutionError::new(ResolutionErrorKind::ConsulService))
    }
}

fn reconcile_instances(
    instances: Vec<MeshServiceInstance>,
    backend_ref: &BackendRef,
) -> Result<ResolvedReference, ResolutionError> {
    let first = &instances[0];
    let inconsistent = instances
        .iter()
        .any(|i| i.service_name != first.service_name || i.namespace != first.namespace);

    if inconsistent {
        let tuples: Vec<String> = instances
            .iter()
            .map(|i| format!("({}, {})", i.service_name, i.namespace))
            .collect();
        return Err(ResolutionError::with_message(
            ResolutionErrorKind::Generic,
            format!("inconsistent mesh service instances: {}", tuples.join(", ")),
        ));
    }

    Ok(ResolvedReference {
        mesh_service_name: first.service_name.clone(),
        mesh_namespace: first.namespace.clone(),
        backend_ref: backend_ref.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::client::MockKubernetesClient;
    use crate::mesh::MockMeshClient;
    use tokio_test::block_on;

    fn backend_ref(name: &str) -> BackendRef {
        BackendRef {
            group: None,
            kind: None,
            namespace: None,
            name: name.to_string(),
            port: None,
            weight: None,
        }
    }

    #[test]
    fn resolves_k8s_service_on_first_match() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_get_service()
                .returning(|_| Ok(Some(k8s_openapi::api::core::v1::Service::default())));

            let mut mesh = MockMeshClient::new();
            mesh.expect_services_with_filter().returning(|_| {
                Ok(vec![MeshServiceInstance {
                    service_name: "svc".to_string(),
                    namespace: "default".to_string(),
                }])
            });

            let resolver = Resolver::new(&kube, &mesh, 30, Duration::from_millis(1));
            let resolved = resolver.resolve("default", &backend_ref("svc")).await.unwrap();
            assert_eq!(resolved.mesh_service_name, "svc");
        });
    }

    #[test]
    fn missing_k8s_service_fails_without_querying_mesh() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_get_service().returning(|_| Ok(None));
            let mesh = MockMeshClient::new();

            let resolver = Resolver::new(&kube, &mesh, 30, Duration::from_millis(1));
            let err = resolver.resolve("default", &backend_ref("svc")).await.unwrap_err();
            assert_eq!(err.kind, ResolutionErrorKind::K8sService);
        });
    }

    #[test]
    fn exhausting_retries_yields_consul_not_resolved() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_get_service()
                .returning(|_| Ok(Some(k8s_openapi::api::core::v1::Service::default())));

            let mut mesh = MockMeshClient::new();
            mesh.expect_services_with_filter().returning(|_| Ok(vec![]));

            let resolver = Resolver::new(&kube, &mesh, 2, Duration::from_millis(1));
            let err = resolver.resolve("default", &backend_ref("svc")).await.unwrap_err();
            assert_eq!(err.kind, ResolutionErrorKind::ConsulService);
        });
    }

    #[test]
    fn unsupported_group_kind_fails_fast() {
        block_on(async {
            let kube = MockKubernetesClient::new();
            let mesh = MockMeshClient::new();
            let mut backend = backend_ref("svc");
            backend.group = Some("unknown.io".to_string());
            backend.kind = Some("Widget".to_string());

            let resolver = Resolver::new(&kube, &mesh, 1, Duration::from_millis(1));
            let err = resolver.resolve("default", &backend).await.unwrap_err();
            assert_eq!(err.kind, ResolutionErrorKind::InvalidKind);
        });
    }
}
