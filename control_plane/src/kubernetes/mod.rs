use kube::Client;

pub mod client;
pub mod convert;

pub async fn start_kubernetes_client() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;
    Ok(client)
}
