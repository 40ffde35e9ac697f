use crate::model::gateway::{FromNamespaces, Gateway, Listener, RouteGroupKind};
use crate::model::hostname::hostnames_match;
use crate::model::route::{ParentReference, Route, RouteState};
use crate::model::status::{BindError, BindErrorKind, ParentRefKey, RouteParentStatus};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct BindOutcome {
    /// Listener names this route is now bound to, across every parentRef
    /// targeting this Gateway. Empty when no parentRef targets it at all —
    /// the caller then unbinds the route from every listener (reparenting).
    pub bound_listener_names: Vec<String>,
    /// One status per parentRef that targets this Gateway.
    pub parent_statuses: Vec<RouteParentStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Kind,
    Namespace,
    Hostname,
    Validity,
}

enum Outcome {
    Bound,
    Skip,
    Fail(Stage, BindError),
}

/// A route's parentRefs are evaluated independently; when more than one
/// listener matches an unqualified (no sectionName) parentRef, the route
/// binds to the union of every listener that accepts it, and the recorded
/// failure reason (if none accept) is the one reached furthest through the
/// per-listener test chain — a listener that failed hostname matching is a
/// more specific diagnosis than one rejected on kind alone.
pub fn bind(gateway: &Gateway, route: &Route, route_namespace_labels: &BTreeMap<String, String>) -> BindOutcome {
    let route_namespace = route.id().namespace_name().namespace.clone();
    let mut bound_listener_names = Vec::new();
    let mut parent_statuses = Vec::new();

    for parent_ref in route.parents() {
        if !parent_ref.targets(&gateway.id, &route_namespace) {
            continue;
        }

        let mut any_bound = false;
        let mut best_failure: Option<(Stage, BindError)> = None;

        for listener in &gateway.listeners {
            match evaluate(gateway, listener, parent_ref, route, &route_namespace, route_namespace_labels) {
                Outcome::Bound => {
                    any_bound = true;
                    bound_listener_names.push(listener.name.clone());
                }
                Outcome::Skip => {}
                Outcome::Fail(stage, err) => {
                    let replace = match &best_failure {
                        None => true,
                        Some((best_stage, _)) => stage > *best_stage,
                    };
                    if replace {
                        best_failure = Some((stage, err));
                    }
                }
            }
        }

        let key = parent_ref_key(parent_ref, &route_namespace);
        let generation = route.generation();
        let status = if any_bound {
            RouteParentStatus::accepted(key, generation)
        } else {
            let (_, err) = best_failure.unwrap_or_else(|| (Stage::Kind, BindError::new(BindErrorKind::RouteInvalid)));
            let resolved_refs = route.state().map(|s| s.resolution_errors.clone()).unwrap_or_default();
            RouteParentStatus::rejected(key, err, resolved_refs, generation)
        };
        parent_statuses.push(status);
    }

    bound_listener_names.sort();
    bound_listener_names.dedup();

    BindOutcome {
        bound_listener_names,
        parent_statuses,
    }
}

fn parent_ref_key(parent_ref: &ParentReference, route_namespace: &str) -> ParentRefKey {
    ParentRefKey {
        group: parent_ref
            .group
            .clone()
            .unwrap_or_else(|| "gateway.networking.k8s.io".to_string()),
        kind: parent_ref.kind.clone().unwrap_or_else(|| "Gateway".to_string()),
        namespace: parent_ref
            .namespace
            .clone()
            .unwrap_or_else(|| route_namespace.to_string()),
        name: parent_ref.name.clone(),
        section_name: parent_ref.section_name.clone(),
    }
}

fn route_group_kind(route: &Route) -> RouteGroupKind {
    match route {
        Route::Http(_) => RouteGroupKind::new("gateway.networking.k8s.io", "HTTPRoute"),
        Route::Tcp(_) => RouteGroupKind::new("meshgate.io", "TCPRoute"),
        Route::Tls(_) => RouteGroupKind::new("meshgate.io", "TLSRoute"),
        Route::Udp(_) => RouteGroupKind::new("meshgate.io", "UDPRoute"),
    }
}

fn namespace_allowed(
    gateway: &Gateway,
    listener: &Listener,
    route_namespace: &str,
    route_namespace_labels: &BTreeMap<String, String>,
) -> bool {
    match &listener.allowed_routes.namespaces {
        FromNamespaces::Same => route_namespace == gateway.id.namespace,
        FromNamespaces::All => true,
        FromNamespaces::Selector(selector) => selector.iter().all(|(key, value)| {
            if key == "kubernetes.io/metadata.name" && !route_namespace_labels.contains_key(key) {
                route_namespace == value
            } else {
                route_namespace_labels.get(key) == Some(value)
            }
        }),
    }
}

fn hostnames_allowed(listener: &Listener, route: &Route) -> bool {
    let route_hostnames = route.hostnames();
    if route_hostnames.is_empty() {
        return true;
    }
    let Some(listener_hostname) = &listener.hostname else {
        return true;
    };
    route_hostnames.iter().any(|h| hostnames_match(listener_hostname, h))
}

fn fail_or_skip(must: bool, stage: Stage, kind: BindErrorKind) -> Outcome {
    if must {
        Outcome::Fail(stage, BindError::new(kind))
    } else {
        Outcome::Skip
    }
}

fn evaluate(
    gateway: &Gateway,
    listener: &Listener,
    parent_ref: &ParentReference,
    route: &Route,
    route_namespace: &str,
    route_namespace_labels: &BTreeMap<String, String>,
) -> Outcome {
    let must = match &parent_ref.section_name {
        None => false,
        Some(section) => {
            if *section != listener.name {
                return Outcome::Skip;
            }
            true
        }
    };

    if !listener.status.is_ready() {
        return Outcome::Skip;
    }

    if !listener.allowed_kinds().contains(&route_group_kind(route)) {
        return fail_or_skip(must, Stage::Kind, BindErrorKind::RouteKind);
    }

    if !namespace_allowed(gateway, listener, route_namespace, route_namespace_labels) {
        return fail_or_skip(must, Stage::Namespace, BindErrorKind::ListenerNamespacePolicy);
    }

    if !hostnames_allowed(listener, route) {
        return fail_or_skip(must, Stage::Hostname, BindErrorKind::HostnameMismatch);
    }

    let valid = route.state().map(RouteState::is_valid_for_binding).unwrap_or(true);
    if !valid {
        return fail_or_skip(must, Stage::Validity, BindErrorKind::RouteInvalid);
    }

    Outcome::Bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gateway::{AllowedRoutes, Protocol};
    use crate::model::identity::NamespaceName;
    use crate::model::route::HttpRoute;
    use crate::model::status::{GatewayStatus, ListenerStatus};
    use meshgate_core::net::Port;
    use std::collections::HashMap;

    fn listener(name: &str, hostname: Option<&str>) -> Listener {
        Listener {
            name: name.to_string(),
            protocol: Protocol::Http,
            port: Port::new(80),
            hostname: hostname.map(str::to_string),
            tls: None,
            allowed_routes: AllowedRoutes::default(),
            status: ListenerStatus::default(),
            routes: HashMap::new(),
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

    fn http_route(parent: &str, section_name: Option<&str>, hostnames: Vec<&str>) -> Route {
        Route::Http(HttpRoute {
            id: NamespaceName::new("default", "r"),
            generation: 1,
            parent_refs: vec![ParentReference {
                group: None,
                kind: None,
                namespace: None,
                name: parent.to_string(),
                section_name: section_name.map(str::to_string),
            }],
            hostnames: hostnames.into_iter().map(str::to_string).collect(),
            rules: Vec::new(),
            state: RouteState::default(),
        })
    }

    #[test]
    fn unqualified_parent_ref_binds_to_every_matching_listener() {
        let gw = gateway(vec![listener("l1", None), listener("l2", None)]);
        let route = http_route("gw", None, Vec::new());
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert_eq!(outcome.bound_listener_names, vec!["l1".to_string(), "l2".to_string()]);
        assert_eq!(outcome.parent_statuses.len(), 1);
        assert!(outcome.parent_statuses[0].accepted.is_ok());
    }

    #[test]
    fn section_name_pins_to_single_listener() {
        let gw = gateway(vec![listener("l1", None), listener("l2", None)]);
        let route = http_route("gw", Some("l2"), Vec::new());
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert_eq!(outcome.bound_listener_names, vec!["l2".to_string()]);
    }

    #[test]
    fn hostname_mismatch_is_recorded_when_section_name_forces_must() {
        let gw = gateway(vec![listener("l1", Some("example.com"))]);
        let route = http_route("gw", Some("l1"), vec!["other.com"]);
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert!(outcome.bound_listener_names.is_empty());
        let status = &outcome.parent_statuses[0];
        assert_eq!(status.accepted.as_ref().unwrap_err().kind, BindErrorKind::HostnameMismatch);
    }

    #[test]
    fn hostname_mismatch_without_section_name_is_silently_skipped() {
        // No sectionName means `must=false`: the failing listener is simply
        // skipped rather than recording a HostnameMismatch, so with no other
        // listener to try, the parent status falls back to the generic
        // RouteInvalid reason rather than pointing at a specific test.
        let gw = gateway(vec![listener("l1", Some("example.com"))]);
        let route = http_route("gw", None, vec!["other.com"]);
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert!(outcome.bound_listener_names.is_empty());
        let status = &outcome.parent_statuses[0];
        assert_eq!(status.accepted.as_ref().unwrap_err().kind, BindErrorKind::RouteInvalid);
    }

    #[test]
    fn parent_ref_targeting_another_gateway_produces_no_status() {
        let gw = gateway(vec![listener("l1", None)]);
        let route = http_route("other-gw", None, Vec::new());
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert!(outcome.bound_listener_names.is_empty());
        assert!(outcome.parent_statuses.is_empty());
    }

    #[test]
    fn resolution_errors_leave_route_unbound_with_resolved_refs_populated() {
        let gw = gateway(vec![listener("l1", None)]);
        let mut route = http_route("gw", None, Vec::new());
        if let Route::Http(r) = &mut route {
            r.state.resolution_errors.push(crate::model::status::ResolutionError::new(
                crate::model::status::ResolutionErrorKind::BackendNotFound,
            ));
        }
        let outcome = bind(&gw, &route, &BTreeMap::new());

        assert!(outcome.bound_listener_names.is_empty());
        let status = &outcome.parent_statuses[0];
        assert_eq!(status.accepted.as_ref().unwrap_err().kind, BindErrorKind::RouteInvalid);
        assert_eq!(status.resolved_refs.len(), 1);
    }
}
