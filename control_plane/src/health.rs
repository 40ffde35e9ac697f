use async_trait::async_trait;
use axum_health::{HealthDetail, HealthIndicator};
use kube::Api;
use kube::api::ListParams;
use meshgate_api::v1alpha1::GatewayClassConfig;

pub struct KubernetesApiHealthIndicator(kube::Client);

impl KubernetesApiHealthIndicator {
    pub fn new(kube_client: kube::Client) -> Self {
        Self(kube_client)
    }
}

#[async_trait]
impl HealthIndicator for KubernetesApiHealthIndicator {
    fn name(&self) -> String {
        "KubernetesAPI".to_string()
    }

    async fn details(&self) -> HealthDetail {
        let api = Api::<GatewayClassConfig>::all(self.0.clone());

        match api.list(&ListParams::default()).await {
            Ok(_) => HealthDetail::up(),
            Err(e) => {
                let mut health = HealthDetail::down();
                health.with_detail("error".to_string(), e.to_string());
                health
            }
        }
    }
}
