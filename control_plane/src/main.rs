#![warn(
    clippy::pedantic,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::needless_pass_by_value,
    clippy::needless_continue,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::struct_field_names
)]

mod binder;
mod cli;
mod controllers;
mod converter;
mod engine;
mod health;
mod instrumentation;
mod intention;
pub mod kubernetes;
mod marshal;
mod mesh;
mod model;
mod options;
mod resolver;
mod status;
mod store;
mod sync;
mod validator;

use crate::controllers::{Context, spawn_controllers};
use crate::health::KubernetesApiHealthIndicator;
use crate::kubernetes::client::KubeApiClient;
use crate::kubernetes::start_kubernetes_client;
use crate::mesh::client::HttpMeshClient;
use crate::options::Options;
use crate::store::Store;
use axum::extract::State;
use axum::routing::get;
use axum_health::HealthIndicator;
use clap::Parser;
use cli::Cli;
use meshgate_core::crypto::init_crypto;
use meshgate_core::instrumentation::init_instrumentation;
use meshgate_core::task::Builder as TaskBuilder;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum MainError {
    #[error("failed to connect to the Kubernetes API: {0}")]
    KubernetesClient(#[source] anyhow::Error),
    #[error("failed to build the mesh control plane client: {0}")]
    MeshClient(#[source] anyhow::Error),
}

#[derive(Clone)]
struct ApiState {
    health: Arc<KubernetesApiHealthIndicator>,
}

async fn healthz(State(state): State<ApiState>) -> String {
    let detail = state.health.details().await;
    format!("{detail:?}")
}

async fn metrics() -> String {
    let families = instrumentation::REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Periodically snapshots the store to disk so a restart rehydrates instead
/// of starting cold. Runs until the shared shutdown signal fires, at which
/// point it takes one last snapshot before exiting.
async fn run_snapshotter(store: Arc<Store>, path: std::path::PathBuf, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = marshal::save(&store, &path).await {
            error!(error = %e, path = %path.display(), "failed to snapshot store");
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
#[allow(clippy::expect_used)] // fail fast if the arguments are invalid
async fn main() -> Result<(), MainError> {
    let args = Cli::parse();
    let options = Options::default();
    let snapshot_interval = options.controller_requeue_duration();

    init_crypto();
    init_instrumentation();
    instrumentation::init_metrics();

    let task_builder = TaskBuilder::default();

    let kube_client = start_kubernetes_client()
        .await
        .map_err(MainError::KubernetesClient)?;
    let kube: Arc<dyn kubernetes::client::KubernetesClient> =
        Arc::new(KubeApiClient::new(kube_client.clone()));
    let mesh: Arc<dyn mesh::MeshClient> =
        Arc::new(HttpMeshClient::new(args.mesh_addr().clone()).map_err(MainError::MeshClient)?);

    let store = Arc::new(Store::new());
    if let Err(e) = marshal::rehydrate(&store, args.snapshot_path()).await {
        error!(error = %e, "failed to rehydrate store from snapshot, starting cold");
    }

    let health_indicator = Arc::new(KubernetesApiHealthIndicator::new(kube_client.clone()));
    let api_state = ApiState { health: health_indicator };
    let router = axum::Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(api_state);

    let port = args.port();
    task_builder.new_task("http-server").spawn(async move {
        let addr = format!("0.0.0.0:{}", u16::from(port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!(addr = %addr, "serving health and metrics endpoints");
                if let Err(e) = axum::serve(listener, router).await {
                    error!(error = %e, "http server exited");
                }
            }
            Err(e) => error!(error = %e, addr = %addr, "failed to bind http server"),
        }
    });

    task_builder.new_task("store-snapshotter").spawn(run_snapshotter(
        store.clone(),
        args.snapshot_path().clone(),
        snapshot_interval,
    ));

    let ctx = Arc::new(Context::new(kube, mesh, options, store));
    spawn_controllers(&task_builder, kube_client, ctx);

    task_builder.join_all().await;

    Ok(())
}
