use crate::model::identity::{GatewayClassId, GatewayId, RouteId};
use crate::model::route::Route;
use crate::model::status::{GatewayStatus, ListenerConflictKind, ListenerStatus};
use meshgate_core::net::Port;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
    Tcp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteGroupKind {
    pub group: String,
    pub kind: String,
}

impl RouteGroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FromNamespaces {
    Same,
    All,
    Selector(BTreeMap<String, String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedRoutes {
    /// `None` means unconstrained: the protocol's default kind set applies.
    pub kinds: Option<Vec<RouteGroupKind>>,
    pub namespaces: FromNamespaces,
}

impl Default for AllowedRoutes {
    fn default() -> Self {
        Self {
            kinds: None,
            namespaces: FromNamespaces::Same,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    Terminate,
    Passthrough,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerTls {
    pub mode: TlsMode,
    pub cert_refs: Vec<crate::model::identity::NamespaceName>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Listener {
    pub name: String,
    pub protocol: Protocol,
    pub port: Port,
    pub hostname: Option<String>,
    pub tls: Option<ListenerTls>,
    pub allowed_routes: AllowedRoutes,
    pub status: ListenerStatus,
    pub routes: HashMap<RouteId, Arc<Route>>,
}

impl Listener {
    /// The protocol's default `RouteGroupKind` set, narrowed by the
    /// listener's own `allowedRoutes.kinds` if it sets one.
    pub fn allowed_kinds(&self) -> Vec<RouteGroupKind> {
        let default = match self.protocol {
            Protocol::Http | Protocol::Https => vec![RouteGroupKind::new(
                "gateway.networking.k8s.io",
                "HTTPRoute",
            )],
            Protocol::Tcp => vec![RouteGroupKind::new("meshgate.io", "TCPRoute")],
        };

        match &self.allowed_routes.kinds {
            Some(kinds) => default.into_iter().filter(|k| kinds.contains(k)).collect(),
            None => default,
        }
    }

    pub fn conflicted(&self) -> Option<ListenerConflictKind> {
        self.status.conflicted
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gateway {
    pub id: GatewayId,
    pub gateway_class_name: GatewayClassId,
    pub generation: i64,
    pub resource_version: Option<u64>,
    pub listeners: Vec<Listener>,
    pub desired_addresses: Vec<String>,
    pub addresses: Vec<String>,
    pub status: GatewayStatus,
}

/// Three-valued comparator the Store uses to decide whether an incoming
/// `UpsertGateway` replaces the stored instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Newer,
    Equal,
    NotEqual,
}

impl Gateway {
    /// Resource-version-first comparison, falling back to a structural
    /// comparison of spec plus materialised listener fields. Bound routes
    /// and computed status are excluded: those are populated by the Binder
    /// and Validator, never present on an incoming event-router upsert, and
    /// comparing them would make every upsert look like a change.
    pub fn compare(&self, incoming: &Gateway) -> Comparison {
        match (self.resource_version, incoming.resource_version) {
            (Some(current), Some(next)) if next < current => return Comparison::Newer,
            _ => {}
        }

        let listener_specs = |listeners: &[Listener]| -> Vec<_> {
            listeners
                .iter()
                .map(|l| {
                    (
                        l.name.clone(),
                        l.protocol,
                        l.port,
                        l.hostname.clone(),
                        l.tls.clone(),
                        l.allowed_routes.clone(),
                    )
                })
                .collect::<Vec<_>>()
        };

        if self.generation == incoming.generation
            && listener_specs(&self.listeners) == listener_specs(&incoming.listeners)
            && self.desired_addresses == incoming.desired_addresses
            && self.addresses == incoming.addresses
        {
            Comparison::Equal
        } else {
            Comparison::NotEqual
        }
    }

    pub fn listener_by_name(&self, name: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::NamespaceName;

    fn gw(generation: i64, resource_version: Option<u64>) -> Gateway {
        Gateway {
            id: NamespaceName::new("default", "gw"),
            gateway_class_name: "default".to_string(),
            generation,
            resource_version,
            listeners: Vec::new(),
            desired_addresses: Vec::new(),
            addresses: Vec::new(),
            status: GatewayStatus::default(),
        }
    }

    #[test]
    fn equal_specs_compare_equal() {
        assert_eq!(gw(1, Some(10)).compare(&gw(1, Some(11))), Comparison::Equal);
    }

    #[test]
    fn stale_resource_version_is_newer() {
        assert_eq!(gw(1, Some(10)).compare(&gw(1, Some(5))), Comparison::Newer);
    }

    #[test]
    fn changed_generation_is_not_equal() {
        assert_eq!(gw(1, Some(10)).compare(&gw(2, Some(11))), Comparison::NotEqual);
    }
}
