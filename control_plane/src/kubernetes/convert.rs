//! Translates external Gateway-API / Kubernetes resources into the engine's
//! own model. This is the boundary the event router sits on: nothing
//! past this module ever touches a `gateway_api` or `meshgate_api` type
//! directly.

use crate::model::gateway::{
    AllowedRoutes, FromNamespaces, Gateway, Listener, ListenerTls, Protocol, TlsMode,
};
use crate::model::identity::NamespaceName;
use crate::model::route::{
    BackendRef, HttpBackend, HttpRoute, HttpRouteFilter, HttpRouteMatch, HttpRouteRule,
    ParentReference, RouteState, TcpRoute,
};
use crate::model::status::GatewayStatus;
use gateway_api::apis::standard::gateways::{
    Gateway as GatewayCrd, GatewayListeners, GatewayListenersAllowedRoutesNamespacesFrom,
    GatewayListenersTlsMode,
};
use gateway_api::apis::standard::httproutes::{HTTPRoute as HTTPRouteCrd, HTTPRouteRulesFilters};
use kube::ResourceExt;
use meshgate_api::routes::TCPRoute as TCPRouteCrd;
use std::collections::HashMap;

fn protocol_from_str(protocol: &str) -> Option<Protocol> {
    match protocol {
        "HTTP" => Some(Protocol::Http),
        "HTTPS" => Some(Protocol::Https),
        "TCP" => Some(Protocol::Tcp),
        _ => None,
    }
}

fn convert_listener(listener: &GatewayListeners) -> Option<Listener> {
    let protocol = protocol_from_str(&listener.protocol)?;
    let port = u16::try_from(listener.port).ok()?;

    let tls = listener.tls.as_ref().map(|tls| {
        let mode = match tls.mode {
            Some(GatewayListenersTlsMode::Passthrough) => TlsMode::Passthrough,
            _ => TlsMode::Terminate,
        };
        let cert_refs = tls
            .certificate_refs
            .iter()
            .flatten()
            .map(|r| NamespaceName::new(r.namespace.clone().unwrap_or_default(), r.name.clone()))
            .collect();
        ListenerTls { mode, cert_refs }
    });

    let allowed_routes = listener
        .allowed_routes
        .as_ref()
        .map(|allowed| {
            let namespaces = match allowed.namespaces.as_ref().and_then(|n| n.from.as_ref()) {
                Some(GatewayListenersAllowedRoutesNamespacesFrom::All) => FromNamespaces::All,
                Some(GatewayListenersAllowedRoutesNamespacesFrom::Selector) => {
                    let labels = allowed
                        .namespaces
                        .as_ref()
                        .and_then(|n| n.selector.as_ref())
                        .and_then(|s| s.match_labels.clone())
                        .unwrap_or_default();
                    FromNamespaces::Selector(labels.into_iter().collect())
                }
                _ => FromNamespaces::Same,
            };

            AllowedRoutes {
                kinds: None,
                namespaces,
            }
        })
        .unwrap_or_default();

    Some(Listener {
        name: listener.name.clone(),
        protocol,
        port: port.into(),
        hostname: listener.hostname.clone(),
        tls,
        allowed_routes,
        status: Default::default(),
        routes: HashMap::new(),
    })
}

/// Builds the engine's `Gateway` from the freshly observed spec. Computed
/// fields (listener statuses, addresses, readiness) default to their empty
/// state — the Validator fills them in on the same upsert cycle, and the
/// Store's `compare` only looks at spec-derived fields so this never looks
/// like spurious churn.
pub fn convert_gateway(crd: &GatewayCrd) -> Gateway {
    let id = NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any());
    let listeners = crd.spec.listeners.iter().filter_map(convert_listener).collect();
    let desired_addresses = crd
        .spec
        .addresses
        .iter()
        .flatten()
        .map(|a| a.value.clone())
        .collect();

    Gateway {
        id,
        gateway_class_name: crd.spec.gateway_class_name.clone(),
        generation: crd.metadata.generation.unwrap_or_default(),
        resource_version: crd
            .resource_version()
            .and_then(|v| v.parse::<u64>().ok()),
        listeners,
        desired_addresses,
        addresses: Vec::new(),
        status: GatewayStatus::default(),
    }
}

fn convert_http_filters(filters: &[HTTPRouteRulesFilters]) -> Vec<HttpRouteFilter> {
    filters
        .iter()
        .filter_map(|f| {
            if let Some(rewrite) = &f.url_rewrite {
                rewrite
                    .path
                    .as_ref()
                    .and_then(|p| p.replace_full_path.clone())
                    .map(HttpRouteFilter::UrlRewritePath)
            } else {
                f.request_header_modifier.as_ref().map(|modifier| {
                    let add = modifier
                        .add
                        .iter()
                        .flatten()
                        .map(|h| (h.name.clone(), h.value.clone()))
                        .collect();
                    HttpRouteFilter::RequestHeaderModifier { add }
                })
            }
        })
        .collect()
}

fn convert_backend_ref(
    group: Option<String>,
    kind: Option<String>,
    namespace: Option<String>,
    name: String,
    port: Option<i32>,
    weight: Option<i32>,
) -> BackendRef {
    BackendRef {
        group,
        kind,
        namespace,
        name,
        port: port.and_then(|p| u16::try_from(p).ok()),
        weight,
    }
}

/// Builds the engine's `HttpRoute`. Resolution and parent statuses are left
/// empty — the Route/Gateway Validator and Binder populate them as part of
/// the same upsert cycle.
pub fn convert_http_route(crd: &HTTPRouteCrd) -> HttpRoute {
    let id = NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any());

    let parent_refs = crd
        .spec
        .parent_refs
        .iter()
        .flatten()
        .map(|p| ParentReference {
            group: p.group.clone(),
            kind: p.kind.clone(),
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            section_name: p.section_name.clone(),
        })
        .collect();

    let rules = crd
        .spec
        .rules
        .iter()
        .flatten()
        .map(|rule| {
            let matches = rule
                .matches
                .iter()
                .flatten()
                .map(|m| HttpRouteMatch {
                    path: m.path.as_ref().and_then(|p| p.value.clone()),
                    headers: m
                        .headers
                        .iter()
                        .flatten()
                        .map(|h| (h.name.clone(), h.value.clone()))
                        .collect(),
                    method: m.method.as_ref().map(|method| format!("{method:?}")),
                })
                .collect();

            let filters = rule
                .filters
                .as_ref()
                .map(|f| convert_http_filters(f))
                .unwrap_or_default();

            let backend_refs = rule
                .backend_refs
                .iter()
                .flatten()
                .map(|b| HttpBackend {
                    backend_ref: convert_backend_ref(
                        b.group.clone(),
                        b.kind.clone(),
                        b.namespace.clone(),
                        b.name.clone(),
                        b.port,
                        b.weight,
                    ),
                    resolved: None,
                })
                .collect();

            HttpRouteRule {
                matches,
                filters,
                backend_refs,
            }
        })
        .collect();

    HttpRoute {
        id,
        generation: crd.metadata.generation.unwrap_or_default(),
        parent_refs,
        hostnames: crd.spec.hostnames.clone().unwrap_or_default(),
        rules,
        state: RouteState::default(),
    }
}

/// Only the first rule's first backendRef is
/// kept; the Route Validator records a resolution error if the spec carries
/// more than that, so the invariant is visible on the Route's published
/// status rather than silently enforced here.
pub fn convert_tcp_route(crd: &TCPRouteCrd) -> TcpRoute {
    let id = NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any());

    let parent_refs = crd
        .spec
        .parent_refs
        .iter()
        .map(|p| ParentReference {
            group: p.group.clone(),
            kind: p.kind.clone(),
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            section_name: p.section_name.clone(),
        })
        .collect();

    let backend = if crd.spec.rules.len() == 1 && crd.spec.rules[0].backend_refs.len() == 1 {
        let b = &crd.spec.rules[0].backend_refs[0];
        Some(HttpBackend {
            backend_ref: convert_backend_ref(
                b.group.clone(),
                b.kind.clone(),
                b.namespace.clone(),
                b.name.clone(),
                b.port,
                b.weight,
            ),
            resolved: None,
        })
    } else {
        None
    };

    TcpRoute {
        id,
        generation: crd.metadata.generation.unwrap_or_default(),
        parent_refs,
        backend,
        state: RouteState::default(),
    }
}

pub fn http_route_id(crd: &HTTPRouteCrd) -> NamespaceName {
    NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any())
}

pub fn tcp_route_id(crd: &TCPRouteCrd) -> NamespaceName {
    NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any())
}

pub fn gateway_id(crd: &GatewayCrd) -> NamespaceName {
    NamespaceName::new(crd.namespace().unwrap_or_default(), crd.name_any())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_protocol_drops_the_listener_rather_than_panicking() {
        assert_eq!(protocol_from_str("SCTP"), None);
        assert_eq!(protocol_from_str("HTTP"), Some(Protocol::Http));
    }
}
