use crate::kubernetes::client::KubernetesClient;
use crate::model::gateway::{Gateway, TlsMode};
use crate::model::route::{BackendRef, HttpBackend, HttpRoute, TcpRoute};
use crate::model::status::{
    CertificateResolutionError, CertificateResolutionErrorKind, ListenerConflictKind,
    ResolutionError, ResolutionErrorKind, ScheduledErrorKind,
};
use crate::resolver::Resolver;
use k8s_openapi::api::core::v1::{Pod, Service};
use std::collections::HashMap;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceAddressMode {
    ClusterIp,
    LoadBalancer,
    NodePort,
    PodIp,
}

pub struct GatewayValidator<'a> {
    kube: &'a dyn KubernetesClient,
}

impl<'a> GatewayValidator<'a> {
    pub fn new(kube: &'a dyn KubernetesClient) -> Self {
        Self { kube }
    }

    pub async fn validate(
        &self,
        gateway: &mut Gateway,
        proxy_labels: &std::collections::BTreeMap<String, String>,
        address_mode: ServiceAddressMode,
    ) {
        self.detect_conflicts(gateway);
        self.resolve_certificates(gateway).await;
        self.compute_scheduled(gateway, proxy_labels).await;
        self.compute_addresses(gateway, proxy_labels, address_mode).await;
        gateway.status.listeners_ready = gateway.listeners.iter().all(|l| l.status.is_ready());
    }

    /// Group by port, compare protocol and hostname.
    fn detect_conflicts(&self, gateway: &mut Gateway) {
        let mut by_port: HashMap<u16, Vec<usize>> = HashMap::new();
        for (i, listener) in gateway.listeners.iter().enumerate() {
            by_port.entry(u16::from(listener.port)).or_default().push(i);
        }

        for indices in by_port.values() {
            if indices.len() < 2 {
                continue;
            }

            let first = indices[0];
            let protocol_conflict = indices
                .iter()
                .any(|&i| gateway.listeners[i].protocol != gateway.listeners[first].protocol);
            let hostname_conflict = !protocol_conflict
                && indices
                    .iter()
                    .any(|&i| gateway.listeners[i].hostname != gateway.listeners[first].hostname);

            for &i in indices {
                gateway.listeners[i].status.conflicted = if protocol_conflict {
                    Some(ListenerConflictKind::ProtocolConflict)
                } else if hostname_conflict {
                    Some(ListenerConflictKind::HostnameConflict)
                } else {
                    None
                };
            }
        }
    }

    /// Resolve TLS certificate refs; passthrough is unsupported.
    async fn resolve_certificates(&self, gateway: &mut Gateway) {
        for listener in &mut gateway.listeners {
            let Some(tls) = listener.tls.clone() else {
                continue;
            };

            if tls.mode == TlsMode::Passthrough {
                listener.status.detached = Some("UnsupportedProtocol");
                continue;
            }

            for cert_ref in &tls.cert_refs {
                match self.kube.get_secret(cert_ref).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        listener.status.resolved_refs_error = Some(CertificateResolutionError::new(
                            CertificateResolutionErrorKind::NotFound,
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "secret lookup failed");
                        listener.status.resolved_refs_error = Some(CertificateResolutionError::with_message(
                            CertificateResolutionErrorKind::NotFound,
                            e.to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// The managed proxy's pods drive the Scheduled status.
    async fn compute_scheduled(
        &self,
        gateway: &mut Gateway,
        proxy_labels: &std::collections::BTreeMap<String, String>,
    ) {
        match self.kube.pods_with_labels(&gateway.id.namespace, proxy_labels).await {
            Ok(pods) if pods.is_empty() => {
                gateway.status.scheduled = Some(ScheduledErrorKind::NotReconciled);
                gateway.status.pod_ready = false;
            }
            Ok(pods) => {
                let failed = pods.iter().any(|p| {
                    p.status
                        .as_ref()
                        .and_then(|s| s.phase.as_deref())
                        .is_some_and(|phase| phase == "Failed")
                });
                let unschedulable = pods.iter().any(|p| {
                    p.status
                        .as_ref()
                        .and_then(|s| s.conditions.as_ref())
                        .is_some_and(|conditions| {
                            conditions.iter().any(|c| {
                                c.type_ == "PodScheduled"
                                    && c.status == "False"
                                    && c.reason.as_deref() == Some("Unschedulable")
                            })
                        })
                });
                let scheduled_unknown = pods.iter().any(|p| {
                    p.status
                        .as_ref()
                        .map(|s| s.conditions.is_none())
                        .unwrap_or(true)
                });

                gateway.status.scheduled = if failed {
                    Some(ScheduledErrorKind::PodFailed)
                } else if unschedulable {
                    Some(ScheduledErrorKind::NoResources)
                } else if scheduled_unknown {
                    Some(ScheduledErrorKind::Unknown)
                } else {
                    None
                };
                gateway.status.pod_ready = !failed && !unschedulable;
            }
            Err(e) => {
                warn!(error = %e, "pod lookup failed");
                gateway.status.scheduled = Some(ScheduledErrorKind::Unknown);
                gateway.status.pod_ready = false;
            }
        }
    }

    /// Address-selection order depends on the configured
    /// service type.
    async fn compute_addresses(
        &self,
        gateway: &mut Gateway,
        proxy_labels: &std::collections::BTreeMap<String, String>,
        mode: ServiceAddressMode,
    ) {
        let addresses = match mode {
            ServiceAddressMode::ClusterIp => match self.kube.get_service(&gateway.id).await {
                Ok(Some(svc)) => cluster_ip(&svc),
                _ => Vec::new(),
            },
            ServiceAddressMode::LoadBalancer => match self.kube.get_service(&gateway.id).await {
                Ok(Some(svc)) => load_balancer_addresses(&svc),
                _ => Vec::new(),
            },
            ServiceAddressMode::NodePort => {
                pod_addresses(self.kube, gateway, proxy_labels, |p| host_ip(p)).await
            }
            ServiceAddressMode::PodIp => {
                pod_addresses(self.kube, gateway, proxy_labels, |p| pod_ip(p)).await
            }
        };

        gateway.status.service_ready = !addresses.is_empty();
        gateway.addresses = addresses;
        gateway.status.addresses_assigned = !gateway.addresses.is_empty();
    }
}

fn cluster_ip(svc: &Service) -> Vec<String> {
    svc.spec
        .as_ref()
        .and_then(|s| s.cluster_ip.clone())
        .into_iter()
        .collect()
}

fn load_balancer_addresses(svc: &Service) -> Vec<String> {
    let Some(ingress) = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
    else {
        return Vec::new();
    };

    let mut ips: Vec<String> = ingress.iter().filter_map(|i| i.ip.clone()).collect();
    ips.extend(ingress.iter().filter_map(|i| i.hostname.clone()));
    ips
}

fn host_ip(pod: &Pod) -> Option<String> {
    pod.status.as_ref().and_then(|s| s.host_ip.clone())
}

fn pod_ip(pod: &Pod) -> Option<String> {
    pod.status.as_ref().and_then(|s| s.pod_ip.clone())
}

async fn pod_addresses(
    kube: &dyn KubernetesClient,
    gateway: &Gateway,
    proxy_labels: &std::collections::BTreeMap<String, String>,
    extract: impl Fn(&Pod) -> Option<String>,
) -> Vec<String> {
    match kube.pods_with_labels(&gateway.id.namespace, proxy_labels).await {
        Ok(pods) => pods.iter().filter_map(extract).collect(),
        Err(e) => {
            warn!(error = %e, "pod lookup failed while selecting addresses");
            Vec::new()
        }
    }
}

pub struct RouteValidator<'a> {
    kube: &'a dyn KubernetesClient,
    resolver: Resolver<'a>,
}

impl<'a> RouteValidator<'a> {
    pub fn new(kube: &'a dyn KubernetesClient, resolver: Resolver<'a>) -> Self {
        Self { kube, resolver }
    }

    /// HTTPRoute path: iterate rules x backendRefs,
    /// checking cross-namespace permission then resolving, continuing past
    /// per-ref failures.
    pub async fn validate_http(&self, route: &mut HttpRoute) {
        let namespace = route.id.namespace.clone();
        let mut errors = Vec::new();

        for rule in &mut route.rules {
            for backend in &mut rule.backend_refs {
                match self.check_and_resolve(&namespace, &backend.backend_ref).await {
                    Ok(resolved) => backend.resolved = Some(resolved),
                    Err(error) => {
                        backend.resolved = None;
                        errors.push(error);
                    }
                }
            }
        }

        route.state.resolution_errors = errors;
    }

    /// A TCPRoute carries exactly one rule with one backendRef.
    pub async fn validate_tcp(&self, route: &mut TcpRoute) {
        let Some(backend) = route.backend.as_mut() else {
            route.state.resolution_errors =
                vec![ResolutionError::new(ResolutionErrorKind::BackendNotFound)];
            return;
        };

        let namespace = route.id.namespace.clone();
        match self.check_and_resolve(&namespace, &backend.backend_ref).await {
            Ok(resolved) => {
                backend.resolved = Some(resolved);
                route.state.resolution_errors.clear();
            }
            Err(error) => {
                backend.resolved = None;
                route.state.resolution_errors = vec![error];
            }
        }
    }

    async fn check_and_resolve(
        &self,
        route_namespace: &str,
        backend_ref: &BackendRef,
    ) -> Result<crate::model::route::ResolvedReference, ResolutionError> {
        if let Some(target_namespace) = &backend_ref.namespace {
            if target_namespace != route_namespace {
                let kind = backend_ref.kind.as_deref().unwrap_or("Service");
                let target = crate::model::identity::NamespaceName::new(
                    target_namespace.clone(),
                    backend_ref.name.clone(),
                );
                let permitted = self
                    .kube
                    .is_reference_grant_permitted(route_namespace, &target, kind)
                    .await
                    .unwrap_or(false);
                if !permitted {
                    return Err(ResolutionError::new(ResolutionErrorKind::RefNotPermitted));
                }
            }
        }

        self.resolver.resolve(route_namespace, backend_ref).await
    }
}

/// Satisfies the `HttpBackend`/`BackendRef` field access used above without
/// pulling a separate import cycle.
impl HttpBackend {
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::client::MockKubernetesClient;
    use crate::mesh::MockMeshClient;
    use crate::model::gateway::{AllowedRoutes, FromNamespaces, Listener, Protocol};
    use crate::model::identity::NamespaceName;
    use crate::model::route::{HttpRouteRule, RouteState};
    use crate::model::status::{GatewayStatus, ListenerStatus};
    use meshgate_core::net::Port;
    use std::time::Duration;
    use tokio_test::block_on;

    fn listener(name: &str, protocol: Protocol, port: u16, hostname: Option<&str>) -> Listener {
        Listener {
            name: name.to_string(),
            protocol,
            port: Port::new(port),
            hostname: hostname.map(str::to_string),
            tls: None,
            allowed_routes: AllowedRoutes {
                kinds: None,
                namespaces: FromNamespaces::Same,
            },
            status: ListenerStatus::default(),
            routes: std::collections::HashMap::new(),
        }
    }

    fn gateway(listeners: Vec<Listener>) -> Gateway {
        Gateway {
            id: NamespaceName::new("default", "gw"),
            gateway_class_name: "default".to_string(),
            generation: 1,
            resource_version: Some(1),
            listeners,
            desired_addresses: Vec::new(),
            addresses: Vec::new(),
            status: GatewayStatus::default(),
        }
    }

    #[test]
    fn protocol_conflict_marks_both_listeners() {
        let kube = MockKubernetesClient::new();
        let validator = GatewayValidator::new(&kube);
        let mut gw = gateway(vec![
            listener("l1", Protocol::Http, 8080, None),
            listener("l2", Protocol::Tcp, 8080, None),
        ]);
        validator.detect_conflicts(&mut gw);

        assert_eq!(
            gw.listeners[0].status.conflicted,
            Some(ListenerConflictKind::ProtocolConflict)
        );
        assert_eq!(
            gw.listeners[1].status.conflicted,
            Some(ListenerConflictKind::ProtocolConflict)
        );
    }

    #[test]
    fn hostname_conflict_on_matching_protocol_distinct_hostname() {
        let kube = MockKubernetesClient::new();
        let validator = GatewayValidator::new(&kube);
        let mut gw = gateway(vec![
            listener("l1", Protocol::Http, 8080, Some("a.com")),
            listener("l2", Protocol::Http, 8080, Some("b.com")),
        ]);
        validator.detect_conflicts(&mut gw);

        assert_eq!(
            gw.listeners[0].status.conflicted,
            Some(ListenerConflictKind::HostnameConflict)
        );
    }

    #[test]
    fn distinct_ports_never_conflict() {
        let kube = MockKubernetesClient::new();
        let validator = GatewayValidator::new(&kube);
        let mut gw = gateway(vec![
            listener("l1", Protocol::Http, 8080, None),
            listener("l2", Protocol::Tcp, 9090, None),
        ]);
        validator.detect_conflicts(&mut gw);

        assert!(gw.listeners[0].status.conflicted.is_none());
        assert!(gw.listeners[1].status.conflicted.is_none());
    }

    #[test]
    fn route_validator_continues_past_per_ref_failure() {
        block_on(async {
            let mut kube = MockKubernetesClient::new();
            kube.expect_get_service().returning(|id| {
                if id.name == "good" {
                    Ok(Some(Service::default()))
                } else {
                    Ok(None)
                }
            });

            let mut mesh = MockMeshClient::new();
            mesh.expect_services_with_filter().returning(|_| {
                Ok(vec![crate::mesh::MeshServiceInstance {
                    service_name: "good".to_string(),
                    namespace: "default".to_string(),
                }])
            });

            let resolver = Resolver::new(&kube, &mesh, 1, Duration::from_millis(1));
            let validator = RouteValidator::new(&kube, resolver);

            let mut route = HttpRoute {
                id: NamespaceName::new("default", "r"),
                generation: 1,
                parent_refs: Vec::new(),
                hostnames: Vec::new(),
                rules: vec![HttpRouteRule {
                    matches: Vec::new(),
                    filters: Vec::new(),
                    backend_refs: vec![
                        HttpBackend {
                            backend_ref: BackendRef {
                                group: None,
                                kind: None,
                                namespace: None,
                                name: "good".to_string(),
                                port: None,
                                weight: None,
                            },
                            resolved: None,
                        },
                        HttpBackend {
                            backend_ref: BackendRef {
                                group: None,
                                kind: None,
                                namespace: None,
                                name: "missing".to_string(),
                                port: None,
                                weight: None,
                            },
                            resolved: None,
                        },
                    ],
                }],
                state: RouteState::default(),
            };

            validator.validate_http(&mut route).await;

            assert!(route.rules[0].backend_refs[0].is_resolved());
            assert!(!route.rules[0].backend_refs[1].is_resolved());
            assert_eq!(route.state.resolution_errors.len(), 1);
        });
    }
}
