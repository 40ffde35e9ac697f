use anyhow::Result;
use clap::Parser;
use getset::{CopyGetters, Getters};
use meshgate_core::net::Port;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Getters, CopyGetters)]
#[command(about = "A Gateway-API control plane for a service mesh", long_about = None)]
pub struct Cli {
    #[getset(get_copy = "pub")]
    #[arg(default_value = "8080",
          env = "PORT",
          long = "port",
          value_parser = parse_port,
    )]
    port: Port,

    #[getset(get = "pub")]
    #[arg(env = "POD_NAMESPACE", long = "namespace")]
    pod_namespace: String,

    #[getset(get = "pub")]
    #[arg(
        default_value = "http://localhost:8500",
        env = "MESH_ADDR",
        long = "mesh-addr"
    )]
    mesh_addr: Url,

    /// Where the store is snapshotted to and rehydrated from across restarts.
    #[getset(get = "pub")]
    #[arg(
        default_value = "/var/run/meshgate/store.json",
        env = "SNAPSHOT_PATH",
        long = "snapshot-path"
    )]
    snapshot_path: PathBuf,
}

fn parse_port(arg: &str) -> Result<Port> {
    let port: u16 = arg.parse()?;
    Ok(Port::new(port))
}
