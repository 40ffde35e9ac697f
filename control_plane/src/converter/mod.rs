use crate::mesh::config_entries::{
    ConfigEntryKey, EntryMeta, IngressGatewayConfigEntry, IngressListenerEntry,
    IngressListenerService, RouterDestination, RouterMatch, ServiceDefaultsEntry,
    ServiceRouterEntry, ServiceRouterRoute, ServiceSplitterEntry, SplitterSplit,
};
use crate::model::gateway::{Gateway, Listener, Protocol};
use crate::model::hostname::intersect;
use crate::model::identity::NamespaceName;
use crate::model::route::{HttpRoute, HttpRouteFilter, Route, TcpRoute};
use crate::sync::ComputedMeshConfig;

/// Transforms a Gateway's bound routes into the mesh primitives the Sync
/// engine applies. Listeners that are not Ready are skipped entirely; routes
/// still carrying resolution errors are skipped per-route.
pub fn convert(gateway: &Gateway) -> ComputedMeshConfig {
    let mut config = ComputedMeshConfig::default();
    let mut ingress_listeners = Vec::new();

    for listener in &gateway.listeners {
        if !listener.status.is_ready() {
            continue;
        }

        let mut services = Vec::new();

        for route in listener.routes.values() {
            match route.as_ref() {
                Route::Http(http) => convert_http_route(gateway, listener, http, &mut config, &mut services),
                Route::Tcp(tcp) => convert_tcp_route(tcp, &mut services),
                Route::Tls(_) | Route::Udp(_) => {}
            }
        }

        if !services.is_empty() {
            ingress_listeners.push(IngressListenerEntry {
                port: u16::from(listener.port),
                protocol: protocol_name(listener.protocol).to_string(),
                services,
            });
        }
    }

    if !ingress_listeners.is_empty() {
        config.ingress = Some(IngressGatewayConfigEntry {
            name: gateway.id.name.clone(),
            listeners: ingress_listeners,
            meta: meta(gateway, None),
        });
    }

    config
}

fn meta(gateway: &Gateway, route: Option<&NamespaceName>) -> EntryMeta {
    EntryMeta {
        external_source: "consul-api-gateway".to_string(),
        gateway_name: gateway.id.name.clone(),
        gateway_namespace: gateway.id.namespace.clone(),
        route_name: route.map(|r| r.name.clone()),
        route_namespace: route.map(|r| r.namespace.clone()),
    }
}

fn protocol_name(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Http | Protocol::Https => "http",
        Protocol::Tcp => "tcp",
    }
}

fn route_hostnames(listener: &Listener, route: &HttpRoute) -> Vec<String> {
    if route.hostnames.is_empty() {
        return listener.hostname.clone().into_iter().collect();
    }

    route
        .hostnames
        .iter()
        .filter_map(|h| intersect(listener.hostname.as_deref(), Some(h.as_str())).map(str::to_string))
        .collect()
}

/// HTTPRoute → ServiceRouter (+ optional ServiceSplitter + ServiceDefaults).
fn convert_http_route(
    gateway: &Gateway,
    listener: &Listener,
    route: &HttpRoute,
    config: &mut ComputedMeshConfig,
    services: &mut Vec<IngressListenerService>,
) {
    if !route.state.is_valid_for_binding() {
        return;
    }

    let hostnames = route_hostnames(listener, route);

    for (idx, rule) in route.rules.iter().enumerate() {
        let resolved: Vec<_> = rule
            .backend_refs
            .iter()
            .filter_map(|b| b.resolved.as_ref().map(|r| (b, r)))
            .collect();
        if resolved.is_empty() {
            continue;
        }

        let name = format!("{}_{}_{idx}", gateway.id.name, route.id.name);

        let prefix_rewrite = rule.filters.iter().find_map(|f| match f {
            HttpRouteFilter::UrlRewritePath(p) => Some(p.clone()),
            HttpRouteFilter::RequestHeaderModifier { .. } => None,
        });
        let request_headers_add: Vec<(String, String)> = rule
            .filters
            .iter()
            .flat_map(|f| match f {
                HttpRouteFilter::RequestHeaderModifier { add } => add.clone(),
                HttpRouteFilter::UrlRewritePath(_) => Vec::new(),
            })
            .collect();

        let destination_service = if resolved.len() == 1 {
            resolved[0].1.mesh_service_name.clone()
        } else {
            let total_weight: i32 = resolved.iter().map(|(b, _)| b.backend_ref.weight.unwrap_or(1)).sum();
            let splits = resolved
                .iter()
                .map(|(b, r)| SplitterSplit {
                    weight: if total_weight == 0 {
                        0.0
                    } else {
                        (b.backend_ref.weight.unwrap_or(1) as f32 / total_weight as f32) * 100.0
                    },
                    service: r.mesh_service_name.clone(),
                })
                .collect();
            config.splitters.add(
                ConfigEntryKey::new("service-splitter", name.clone()),
                ServiceSplitterEntry {
                    name: name.clone(),
                    splits,
                    meta: meta(gateway, Some(&route.id)),
                },
            );
            name.clone()
        };

        let destination = RouterDestination {
            service: destination_service,
            prefix_rewrite,
            request_headers_add,
        };

        let router_routes = if rule.matches.is_empty() {
            vec![ServiceRouterRoute {
                r#match: None,
                destination,
            }]
        } else {
            rule.matches
                .iter()
                .map(|m| ServiceRouterRoute {
                    r#match: Some(RouterMatch {
                        path_prefix: m.path.clone(),
                        headers: m.headers.clone(),
                        methods: m.method.clone().into_iter().collect(),
                    }),
                    destination: destination.clone(),
                })
                .collect()
        };

        config.routers.add(
            ConfigEntryKey::new("service-router", name.clone()),
            ServiceRouterEntry {
                name: name.clone(),
                routes: router_routes,
                meta: meta(gateway, Some(&route.id)),
            },
        );

        for (_, resolved_ref) in &resolved {
            config.defaults.add(
                ConfigEntryKey::new("service-defaults", resolved_ref.mesh_service_name.clone()),
                ServiceDefaultsEntry {
                    name: resolved_ref.mesh_service_name.clone(),
                    protocol: "http".to_string(),
                    meta: meta(gateway, Some(&route.id)),
                },
            );
        }

        services.push(IngressListenerService {
            name,
            hosts: hostnames.clone(),
        });
    }
}

/// TCPRoute → IngressService: no router or splitter, the listener
/// points directly at the single resolved backend.
fn convert_tcp_route(route: &TcpRoute, services: &mut Vec<IngressListenerService>) {
    if !route.state.is_valid_for_binding() {
        return;
    }
    let Some(resolved) = route.backend.as_ref().and_then(|b| b.resolved.as_ref()) else {
        return;
    };

    services.push(IngressListenerService {
        name: resolved.mesh_service_name.clone(),
        hosts: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gateway::{AllowedRoutes, FromNamespaces};
    use crate::model::identity::RouteId;
    use crate::model::route::{BackendRef, HttpBackend, HttpRouteRule, ResolvedReference, RouteState};
    use crate::model::status::{GatewayStatus, ListenerStatus};
    use meshgate_core::net::Port;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn resolved(service: &str) -> ResolvedReference {
        ResolvedReference {
            mesh_service_name: service.to_string(),
            mesh_namespace: "default".to_string(),
            backend_ref: BackendRef {
                group: None,
                kind: None,
                namespace: None,
                name: service.to_string(),
                port: None,
                weight: None,
            },
        }
    }

    fn listener(name: &str, routes: HashMap<RouteId, Arc<Route>>) -> Listener {
        Listener {
            name: name.to_string(),
            protocol: Protocol::Http,
            port: Port::new(80),
            hostname: None,
            tls: None,
            allowed_routes: AllowedRoutes {
                kinds: None,
                namespaces: FromNamespaces::Same,
            },
            status: ListenerStatus::default(),
            routes,
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
    fn single_backend_routes_directly_without_splitter() {
        let backend = HttpBackend {
            backend_ref: BackendRef {
                group: None,
                kind: None,
                namespace: None,
                name: "svc".to_string(),
                port: None,
                weight: None,
            },
            resolved: Some(resolved("svc")),
        };

        let route = HttpRoute {
            id: NamespaceName::new("default", "r"),
            generation: 1,
            parent_refs: Vec::new(),
            hostnames: Vec::new(),
            rules: vec![HttpRouteRule {
                matches: Vec::new(),
                filters: Vec::new(),
                backend_refs: vec![backend],
            }],
            state: RouteState::default(),
        };

        let mut routes = HashMap::new();
        routes.insert(RouteId::Http(route.id.clone()), Arc::new(Route::Http(route)));
        let mut l = listener("l1", routes);
        l.status.observed_generation = 1;
        let gw = gateway(vec![l]);

        let config = convert(&gw);
        assert_eq!(config.routers.len(), 1);
        assert!(config.splitters.is_empty());
        assert_eq!(config.defaults.len(), 1);
        assert!(config.ingress.is_some());
    }

    #[test]
    fn multiple_backends_emit_normalised_splitter() {
        let backend_a = HttpBackend {
            backend_ref: BackendRef {
                group: None,
                kind: None,
                namespace: None,
                name: "a".to_string(),
                port: None,
                weight: Some(1),
            },
            resolved: Some(resolved("a")),
        };
        let backend_b = HttpBackend {
            backend_ref: BackendRef {
                group: None,
                kind: None,
                namespace: None,
                name: "b".to_string(),
                port: None,
                weight: Some(3),
            },
            resolved: Some(resolved("b")),
        };

        let route = HttpRoute {
            id: NamespaceName::new("default", "r"),
            generation: 1,
            parent_refs: Vec::new(),
            hostnames: Vec::new(),
            rules: vec![HttpRouteRule {
                matches: Vec::new(),
                filters: Vec::new(),
                backend_refs: vec![backend_a, backend_b],
            }],
            state: RouteState::default(),
        };

        let mut routes = HashMap::new();
        routes.insert(RouteId::Http(route.id.clone()), Arc::new(Route::Http(route)));
        let gw = gateway(vec![listener("l1", routes)]);

        let config = convert(&gw);
        assert_eq!(config.splitters.len(), 1);
        let (_, splitter) = &config.splitters.to_array()[0];
        let total: f32 = splitter.splits.iter().map(|s| s.weight).sum();
        assert!((total - 100.0).abs() < 0.01);
    }

    #[test]
    fn tcp_route_emits_ingress_service_without_router() {
        let route = TcpRoute {
            id: NamespaceName::new("default", "tcp"),
            generation: 1,
            parent_refs: Vec::new(),
            backend: Some(HttpBackend {
                backend_ref: BackendRef {
                    group: None,
                    kind: None,
                    namespace: None,
                    name: "svc".to_string(),
                    port: None,
                    weight: None,
                },
                resolved: Some(resolved("svc")),
            }),
            state: RouteState::default(),
        };

        let mut routes = HashMap::new();
        routes.insert(RouteId::Tcp(route.id.clone()), Arc::new(Route::Tcp(route)));
        let gw = gateway(vec![listener("l1", routes)]);

        let config = convert(&gw);
        assert!(config.routers.is_empty());
        assert!(config.ingress.is_some());
    }

    #[test]
    fn unready_listener_is_skipped_entirely() {
        let mut l = listener("l1", HashMap::new());
        l.status.conflicted = Some(crate::model::status::ListenerConflictKind::ProtocolConflict);
        let gw = gateway(vec![l]);

        let config = convert(&gw);
        assert!(config.ingress.is_none());
    }
}
