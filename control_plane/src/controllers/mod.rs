//! The event router: turns live Kubernetes watch streams into `Store`
//! mutations and drives the engine off them. Grounded on the raw
//! `kube::runtime::watcher` event stream rather than `kube::runtime::Controller`
//! (see `examples/daniel-white-kubera/controller/src/controllers/gateway.rs`
//! for the latter) because the Store's interface is already expressed as
//! discrete upserts/deletes, and the watcher's `Event::Apply`/`Event::Delete`
//! map onto it directly without needing a finalizer to observe deletion.

use crate::engine;
use crate::intention;
use crate::kubernetes::client::KubernetesClient;
use crate::kubernetes::convert::{
    convert_gateway, convert_http_route, convert_tcp_route, gateway_id, http_route_id, tcp_route_id,
};
use crate::mesh::MeshClient;
use crate::model::identity::{GatewayId, RouteId};
use crate::model::route::Route;
use crate::options::Options;
use crate::store::Store;
use futures::StreamExt;
use gateway_api::apis::standard::gatewayclasses::GatewayClass;
use gateway_api::apis::standard::gateways::Gateway as GatewayCrd;
use gateway_api::apis::standard::httproutes::HTTPRoute as HTTPRouteCrd;
use kube::runtime::watcher::{self, Config, Event};
use kube::{Api, Client, ResourceExt};
use meshgate_api::routes::TCPRoute as TCPRouteCrd;
use meshgate_core::task::Builder as TaskBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

/// Per-Gateway shutdown handles for the background intention reconciler
/// task. Spawned on first sight of a Gateway, torn down when
/// it is deleted, so the watch loop never leaks a task across a Gateway's
/// lifetime.
#[derive(Default)]
struct IntentionTasks {
    handles: Mutex<HashMap<GatewayId, watch::Sender<bool>>>,
}

impl IntentionTasks {
    async fn ensure_running(&self, gateway_id: &GatewayId, mesh: Arc<dyn MeshClient>, options: &Options) {
        let mut handles = self.handles.lock().await;
        if handles.contains_key(gateway_id) {
            return;
        }

        let (tx, rx) = watch::channel(false);
        handles.insert(gateway_id.clone(), tx);

        let name = gateway_id.name.clone();
        let namespace = gateway_id.namespace.clone();
        let cas_retry_count = options.intention_cas_retry_count();
        let cas_retry_interval = options.intention_cas_retry_interval();
        let sweep_interval = options.intention_sweep_interval();

        tokio::spawn(async move {
            intention::run(
                name,
                namespace,
                mesh.as_ref(),
                cas_retry_count,
                cas_retry_interval,
                sweep_interval,
                rx,
            )
            .await;
        });
    }

    async fn stop(&self, gateway_id: &GatewayId) {
        if let Some(tx) = self.handles.lock().await.remove(gateway_id) {
            let _ = tx.send(true);
        }
    }
}

pub struct Context {
    pub kube: Arc<dyn KubernetesClient>,
    pub mesh: Arc<dyn MeshClient>,
    pub options: Options,
    pub store: Arc<Store>,
    intention_tasks: IntentionTasks,
}

impl Context {
    pub fn new(kube: Arc<dyn KubernetesClient>, mesh: Arc<dyn MeshClient>, options: Options, store: Arc<Store>) -> Self {
        Self {
            kube,
            mesh,
            options,
            store,
            intention_tasks: IntentionTasks::default(),
        }
    }
}

fn parameters_ref(class: &GatewayClass) -> Option<(String, String, String)> {
    class
        .spec
        .parameters_ref
        .as_ref()
        .map(|p| (p.group.clone(), p.kind.clone(), p.name.clone()))
}

async fn reconcile_gateway_class_event(ctx: &Context, name: &str, generation: i64, parameters: Option<(String, String, String)>) {
    let parameters = parameters
        .as_ref()
        .map(|(group, kind, name)| (group.as_str(), kind.as_str(), name.as_str()));
    engine::reconcile_gateway_class(ctx.kube.as_ref(), &ctx.store, name, parameters, generation).await;
}

async fn reconcile_affected_gateway(ctx: &Context, gateway_id: &GatewayId) {
    if let Err(e) = engine::reconcile_gateway(ctx.kube.as_ref(), ctx.mesh.as_ref(), &ctx.options, &ctx.store, gateway_id).await {
        error!(error = %e, gateway = %gateway_id, "gateway reconcile failed");
    }
}

async fn handle_gateway_apply(ctx: &Context, crd: &GatewayCrd) {
    let gateway = convert_gateway(crd);
    let id = gateway.id.clone();
    if ctx.store.upsert_gateway(gateway).await {
        ctx.intention_tasks.ensure_running(&id, ctx.mesh.clone(), &ctx.options).await;
        reconcile_affected_gateway(ctx, &id).await;
    }
}

async fn handle_gateway_delete(ctx: &Context, crd: &GatewayCrd) {
    let id = gateway_id(crd);
    let orphaned_routes = ctx.store.delete_gateway(&id);
    ctx.intention_tasks.stop(&id).await;
    for route_id in orphaned_routes {
        ctx.store.remove_parent_status(&route_id, &id);
    }
    info!(gateway = %id, "gateway removed");
}

async fn handle_http_route_upsert(ctx: &Context, crd: &HTTPRouteCrd) {
    let mut route = Route::Http(convert_http_route(crd));
    engine::validate_route(ctx.kube.as_ref(), ctx.mesh.as_ref(), &ctx.options, &mut route).await;
    let affected = ctx.store.upsert_route(route);
    for gateway_id in affected {
        reconcile_affected_gateway(ctx, &gateway_id).await;
    }
}

async fn handle_http_route_delete(ctx: &Context, crd: &HTTPRouteCrd) {
    let id = RouteId::Http(http_route_id(crd));
    let affected = ctx.store.delete_route(&id);
    for gateway_id in affected {
        reconcile_affected_gateway(ctx, &gateway_id).await;
    }
}

async fn handle_tcp_route_upsert(ctx: &Context, crd: &TCPRouteCrd) {
    let mut route = Route::Tcp(convert_tcp_route(crd));
    engine::validate_route(ctx.kube.as_ref(), ctx.mesh.as_ref(), &ctx.options, &mut route).await;
    let affected = ctx.store.upsert_route(route);
    for gateway_id in affected {
        reconcile_affected_gateway(ctx, &gateway_id).await;
    }
}

async fn handle_tcp_route_delete(ctx: &Context, crd: &TCPRouteCrd) {
    let id = RouteId::Tcp(tcp_route_id(crd));
    let affected = ctx.store.delete_route(&id);
    for gateway_id in affected {
        reconcile_affected_gateway(ctx, &gateway_id).await;
    }
}

/// Runs a single kind's watch loop to completion. `watcher` auto-retries on
/// transport errors with backoff, so a stream error is logged and the loop
/// simply keeps polling rather than terminating the task.
async fn watch_gateway_classes(client: Client, ctx: Arc<Context>) {
    let api: Api<GatewayClass> = Api::all(client);
    let mut stream = watcher::watcher(api, Config::default()).boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(class) | Event::InitApply(class)) => {
                let generation = class.metadata.generation.unwrap_or_default();
                reconcile_gateway_class_event(&ctx, &class.name_any(), generation, parameters_ref(&class)).await;
            }
            Ok(Event::Delete(class)) => {
                ctx.store.delete_gateway_class(&class.name_any()).await;
            }
            Ok(Event::Init | Event::InitDone) => {}
            Err(e) => warn!(error = %e, "GatewayClass watch error"),
        }
    }
}

async fn watch_gateways(client: Client, ctx: Arc<Context>) {
    let api: Api<GatewayCrd> = Api::all(client);
    let mut stream = watcher::watcher(api, Config::default()).boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(gw) | Event::InitApply(gw)) => handle_gateway_apply(&ctx, &gw).await,
            Ok(Event::Delete(gw)) => handle_gateway_delete(&ctx, &gw).await,
            Ok(Event::Init | Event::InitDone) => {}
            Err(e) => warn!(error = %e, "Gateway watch error"),
        }
    }
}

async fn watch_http_routes(client: Client, ctx: Arc<Context>) {
    let api: Api<HTTPRouteCrd> = Api::all(client);
    let mut stream = watcher::watcher(api, Config::default()).boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(route) | Event::InitApply(route)) => handle_http_route_upsert(&ctx, &route).await,
            Ok(Event::Delete(route)) => handle_http_route_delete(&ctx, &route).await,
            Ok(Event::Init | Event::InitDone) => {}
            Err(e) => warn!(error = %e, "HTTPRoute watch error"),
        }
    }
}

async fn watch_tcp_routes(client: Client, ctx: Arc<Context>) {
    let api: Api<TCPRouteCrd> = Api::all(client);
    let mut stream = watcher::watcher(api, Config::default()).boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(route) | Event::InitApply(route)) => handle_tcp_route_upsert(&ctx, &route).await,
            Ok(Event::Delete(route)) => handle_tcp_route_delete(&ctx, &route).await,
            Ok(Event::Init | Event::InitDone) => {}
            Err(e) => warn!(error = %e, "TCPRoute watch error"),
        }
    }
}

/// Spawns one watch loop per watched kind onto the shared task builder. All
/// four run for the life of the process; `task_builder.join_all()` blocks
/// until every one of them (and everything else spawned through the same
/// builder) exits, which only happens on shutdown signal.
pub fn spawn_controllers(task_builder: &TaskBuilder, client: Client, ctx: Arc<Context>) {
    task_builder
        .new_task("watch-gateway-classes")
        .spawn(watch_gateway_classes(client.clone(), ctx.clone()));
    task_builder
        .new_task("watch-gateways")
        .spawn(watch_gateways(client.clone(), ctx.clone()));
    task_builder
        .new_task("watch-http-routes")
        .spawn(watch_http_routes(client.clone(), ctx.clone()));
    task_builder
        .new_task("watch-tcp-routes")
        .spawn(watch_tcp_routes(client, ctx));
}
