pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "meshgate-control-plane";
pub const MANAGED_BY_LABEL_QUERY: &str = "app.kubernetes.io/managed-by=meshgate-control-plane";

pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";

pub const GROUP: &str = "meshgate.io";
pub const GATEWAY_CLASS_CONFIG_CRD_KIND: &str = "GatewayClassConfig";
pub const MESH_SERVICE_CRD_KIND: &str = "MeshService";

pub const GATEWAY_CLASS_CONTROLLER_NAME: &str = "meshgate.io/control-plane";

/// Metadata key mesh config entries carry so sync can recognise entries it owns.
pub const EXTERNAL_SOURCE_KEY: &str = "external-source";
pub const EXTERNAL_SOURCE_VALUE: &str = "meshgate";
pub const MANAGED_BY_META_KEY: &str = "managed_by";
pub const GATEWAY_NAME_META_KEY: &str = "meshgate.io/gateway-name";
pub const GATEWAY_NAMESPACE_META_KEY: &str = "meshgate.io/gateway-namespace";
pub const ROUTE_NAME_META_KEY: &str = "meshgate.io/route-name";
pub const ROUTE_NAMESPACE_META_KEY: &str = "meshgate.io/route-namespace";

/// Metadata keys the resolver filters mesh service instances by.
pub const KUBE_SERVICE_NAME_META_KEY: &str = "kube-service-name";
pub const KUBE_NAMESPACE_META_KEY: &str = "kube-namespace";
pub const CONNECT_PROXY_KIND: &str = "connect-proxy";
