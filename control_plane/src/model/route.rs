use crate::model::identity::{GatewayId, NamespaceName, RouteId};
use crate::model::status::{ResolutionError, RouteParentStatus};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct ParentReference {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub section_name: Option<String>,
}

impl ParentReference {
    /// Whether this reference targets the given Gateway at all, ignoring
    /// section name (used to decide reparenting).
    pub fn targets(&self, gateway: &GatewayId, route_namespace: &str) -> bool {
        let namespace = self.namespace.as_deref().unwrap_or(route_namespace);
        namespace == gateway.namespace && self.name == gateway.name
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendRef {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub port: Option<u16>,
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedReference {
    pub mesh_service_name: String,
    pub mesh_namespace: String,
    pub backend_ref: BackendRef,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpRouteMatch {
    pub path: Option<String>,
    pub headers: Vec<(String, String)>,
    pub method: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HttpRouteFilter {
    UrlRewritePath(String),
    RequestHeaderModifier { add: Vec<(String, String)> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpBackend {
    pub backend_ref: BackendRef,
    pub resolved: Option<ResolvedReference>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpRouteRule {
    pub matches: Vec<HttpRouteMatch>,
    pub filters: Vec<HttpRouteFilter>,
    pub backend_refs: Vec<HttpBackend>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteState {
    pub resolution_errors: Vec<ResolutionError>,
    pub parent_statuses: BTreeMap<GatewayId, Vec<RouteParentStatus>>,
}

impl RouteState {
    /// Valid for binding iff no resolution errors.
    pub fn is_valid_for_binding(&self) -> bool {
        self.resolution_errors.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRoute {
    pub id: NamespaceName,
    pub generation: i64,
    pub parent_refs: Vec<ParentReference>,
    pub hostnames: Vec<String>,
    pub rules: Vec<HttpRouteRule>,
    pub state: RouteState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcpRoute {
    pub id: NamespaceName,
    pub generation: i64,
    pub parent_refs: Vec<ParentReference>,
    /// Exactly one rule with exactly one backend
    /// ref, or a resolution error is recorded and this stays `None`.
    pub backend: Option<HttpBackend>,
    pub state: RouteState,
}

/// TLSRoute/UDPRoute: recognised for identity only, never resolved or
/// converted.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityRoute {
    pub id: NamespaceName,
    pub generation: i64,
    pub parent_refs: Vec<ParentReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Http(HttpRoute),
    Tcp(TcpRoute),
    Tls(IdentityRoute),
    Udp(IdentityRoute),
}

impl Route {
    pub fn id(&self) -> RouteId {
        match self {
            Route::Http(r) => RouteId::Http(r.id.clone()),
            Route::Tcp(r) => RouteId::Tcp(r.id.clone()),
            Route::Tls(r) => RouteId::Tls(r.id.clone()),
            Route::Udp(r) => RouteId::Udp(r.id.clone()),
        }
    }

    pub fn generation(&self) -> i64 {
        match self {
            Route::Http(r) => r.generation,
            Route::Tcp(r) => r.generation,
            Route::Tls(r) => r.generation,
            Route::Udp(r) => r.generation,
        }
    }

    pub fn parents(&self) -> &[ParentReference] {
        match self {
            Route::Http(r) => &r.parent_refs,
            Route::Tcp(r) => &r.parent_refs,
            Route::Tls(r) => &r.parent_refs,
            Route::Udp(r) => &r.parent_refs,
        }
    }

    /// `None` for TLSRoute/UDPRoute — they carry no bindable state.
    pub fn state(&self) -> Option<&RouteState> {
        match self {
            Route::Http(r) => Some(&r.state),
            Route::Tcp(r) => Some(&r.state),
            Route::Tls(_) | Route::Udp(_) => None,
        }
    }

    pub fn state_mut(&mut self) -> Option<&mut RouteState> {
        match self {
            Route::Http(r) => Some(&mut r.state),
            Route::Tcp(r) => Some(&mut r.state),
            Route::Tls(_) | Route::Udp(_) => None,
        }
    }

    pub fn hostnames(&self) -> &[String] {
        match self {
            Route::Http(r) => &r.hostnames,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::NamespaceName;

    #[test]
    fn distinct_route_kinds_yield_distinct_ids() {
        let nn = NamespaceName::new("default", "r");
        let http = Route::Http(HttpRoute {
            id: nn.clone(),
            generation: 1,
            parent_refs: Vec::new(),
            hostnames: Vec::new(),
            rules: Vec::new(),
            state: RouteState::default(),
        });
        let tcp = Route::Tcp(TcpRoute {
            id: nn,
            generation: 1,
            parent_refs: Vec::new(),
            backend: None,
            state: RouteState::default(),
        });
        assert_ne!(http.id(), tcp.id());
    }

    #[test]
    fn valid_for_binding_iff_no_resolution_errors() {
        let mut state = RouteState::default();
        assert!(state.is_valid_for_binding());
        state.resolution_errors.push(ResolutionError::new(
            crate::model::status::ResolutionErrorKind::BackendNotFound,
        ));
        assert!(!state.is_valid_for_binding());
    }

    #[test]
    fn parent_reference_targets_resolves_implicit_namespace() {
        let parent = ParentReference {
            group: None,
            kind: None,
            namespace: None,
            name: "gw".to_string(),
            section_name: None,
        };
        let gateway_id = NamespaceName::new("default", "gw");
        assert!(parent.targets(&gateway_id, "default"));
        assert!(!parent.targets(&gateway_id, "other"));
    }
}
