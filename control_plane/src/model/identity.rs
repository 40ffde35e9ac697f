use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceName {
    pub namespace: String,
    pub name: String,
}

impl NamespaceName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub type GatewayId = NamespaceName;

/// GatewayClass is cluster-scoped; its identity is just its name.
pub type GatewayClassId = String;

/// Prefix-typed so `http-ns/name` and `tcp-ns/name` never collide even when
/// an HTTPRoute and a TCPRoute share a namespace/name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteId {
    Http(NamespaceName),
    Tcp(NamespaceName),
    Tls(NamespaceName),
    Udp(NamespaceName),
}

impl RouteId {
    pub fn namespace_name(&self) -> &NamespaceName {
        match self {
            RouteId::Http(nn) | RouteId::Tcp(nn) | RouteId::Tls(nn) | RouteId::Udp(nn) => nn,
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteId::Http(nn) => write!(f, "http-{nn}"),
            RouteId::Tcp(nn) => write!(f, "tcp-{nn}"),
            RouteId::Tls(nn) => write!(f, "tls-{nn}"),
            RouteId::Udp(nn) => write!(f, "udp-{nn}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_id_display_is_prefix_typed() {
        let nn = NamespaceName::new("default", "r");
        assert_eq!(RouteId::Http(nn.clone()).to_string(), "http-default/r");
        assert_eq!(RouteId::Tcp(nn).to_string(), "tcp-default/r");
    }

    #[test]
    fn distinct_kinds_with_same_name_are_distinct_ids() {
        let nn = NamespaceName::new("default", "r");
        assert_ne!(RouteId::Http(nn.clone()), RouteId::Tcp(nn));
    }
}
