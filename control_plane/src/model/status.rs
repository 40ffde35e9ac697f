use meshgate_macros::define_condition_reasons;

define_condition_reasons! {
    pub enum BindErrorKind {
        RouteKind => "InvalidRouteKind",
        ListenerNamespacePolicy => "ListenerNamespacePolicy",
        HostnameMismatch => "ListenerHostnameMismatch",
        RouteInvalid => "BindError",
    }
}

define_condition_reasons! {
    pub enum ResolutionErrorKind {
        Generic => "Errors",
        K8sService => "ServiceNotFound",
        ConsulService => "ConsulServiceNotFound",
        RefNotPermitted => "RefNotPermitted",
        InvalidKind => "InvalidKind",
        BackendNotFound => "BackendNotFound",
    }
}

define_condition_reasons! {
    pub enum CertificateResolutionErrorKind {
        NotFound => "InvalidCertificateRef",
        NotPermitted => "RefNotPermitted",
        Unsupported => "UnsupportedProtocol",
    }
}

define_condition_reasons! {
    pub enum ScheduledErrorKind {
        PodFailed => "PodFailed",
        NoResources => "NoResources",
        Unknown => "Unknown",
        NotReconciled => "NotReconciled",
    }
}

define_condition_reasons! {
    pub enum ListenerConflictKind {
        ProtocolConflict => "ProtocolConflict",
        HostnameConflict => "HostnameConflict",
    }
}

macro_rules! typed_error {
    ($name:ident, $kind:ty) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub kind: $kind,
            pub message: Option<String>,
        }

        impl $name {
            pub fn new(kind: $kind) -> Self {
                Self {
                    kind,
                    message: None,
                }
            }

            pub fn with_message(kind: $kind, message: impl Into<String>) -> Self {
                Self {
                    kind,
                    message: Some(message.into()),
                }
            }

            pub fn reason(&self) -> &'static str {
                self.kind.reason()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match &self.message {
                    Some(message) => write!(f, "{}: {message}", self.kind),
                    None => write!(f, "{}", self.kind),
                }
            }
        }
    };
}

typed_error!(BindError, BindErrorKind);
typed_error!(ResolutionError, ResolutionErrorKind);
typed_error!(CertificateResolutionError, CertificateResolutionErrorKind);

/// Stable sort key for per-parent status entries (group, kind, namespace,
/// name, sectionName), so merged status equality is order-independent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParentRefKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub section_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteParentStatus {
    pub parent_ref: ParentRefKey,
    pub accepted: Result<(), BindError>,
    pub resolved_refs: Vec<ResolutionError>,
    pub observed_generation: i64,
}

impl RouteParentStatus {
    pub fn accepted(parent_ref: ParentRefKey, observed_generation: i64) -> Self {
        Self {
            parent_ref,
            accepted: Ok(()),
            resolved_refs: Vec::new(),
            observed_generation,
        }
    }

    pub fn rejected(
        parent_ref: ParentRefKey,
        error: BindError,
        resolved_refs: Vec<ResolutionError>,
        observed_generation: i64,
    ) -> Self {
        Self {
            parent_ref,
            accepted: Err(error),
            resolved_refs,
            observed_generation,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListenerStatus {
    pub conflicted: Option<ListenerConflictKind>,
    pub detached: Option<&'static str>,
    pub resolved_refs_error: Option<CertificateResolutionError>,
    pub observed_generation: i64,
}

impl ListenerStatus {
    /// Valid iff Conflicted, Detached, and ResolvedRefs
    /// all carry no error.
    pub fn is_valid(&self) -> bool {
        self.conflicted.is_none() && self.detached.is_none() && self.resolved_refs_error.is_none()
    }

    pub fn is_ready(&self) -> bool {
        self.is_valid()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatewayStatus {
    pub scheduled: Option<ScheduledErrorKind>,
    pub listeners_ready: bool,
    pub pod_ready: bool,
    pub service_ready: bool,
    pub addresses_assigned: bool,
    pub in_sync_error: Option<String>,
    pub observed_generation: i64,
}

impl GatewayStatus {
    /// Ready iff every Listener is Ready, pod and
    /// service backing are ready, and addresses are assigned.
    pub fn is_ready(&self) -> bool {
        self.scheduled.is_none()
            && self.listeners_ready
            && self.pod_ready
            && self.service_ready
            && self.addresses_assigned
    }

    pub fn is_in_sync(&self) -> bool {
        self.in_sync_error.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatewayClassStatus {
    pub rejected_reason: Option<&'static str>,
    pub observed_generation: i64,
}

impl GatewayClassStatus {
    pub fn is_admitted(&self) -> bool {
        self.rejected_reason.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_reason_is_stable() {
        let err = BindError::new(BindErrorKind::HostnameMismatch);
        assert_eq!(err.reason(), "ListenerHostnameMismatch");
    }

    #[test]
    fn gateway_ready_requires_every_dimension() {
        let mut status = GatewayStatus {
            listeners_ready: true,
            pod_ready: true,
            service_ready: true,
            addresses_assigned: true,
            ..Default::default()
        };
        assert!(status.is_ready());

        status.addresses_assigned = false;
        assert!(!status.is_ready());
    }

    #[test]
    fn listener_valid_iff_no_sub_status_errors() {
        let mut status = ListenerStatus::default();
        assert!(status.is_valid());

        status.conflicted = Some(ListenerConflictKind::ProtocolConflict);
        assert!(!status.is_valid());
    }
}
