//! Cluster bootstrap CLI (spec §6.2).
//!
//! Process supervision and per-node database provisioning are external
//! collaborators this specification treats as opaque (spec §1); this
//! binary owns only the interface it must present to the core: writing
//! `known_servers.txt`/`known_proxies.txt` in the `name:port` shape every
//! server/proxy/client reads at boot, and driving the `REMOVE_SERVER`
//! handshake of §4.4.7 directly over the wire.

use clap::{Parser, Subcommand};
use shoplist_admin::topology;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shoplist-admin", about = "Shopping-list mesh bootstrap tool")]
struct Args {
    /// Path to the server topology file this tool reads and rewrites.
    #[arg(long, global = true, default_value = "known_servers.txt")]
    servers: PathBuf,

    /// Path to the proxy topology file this tool reads and rewrites.
    #[arg(long, global = true, default_value = "known_proxies.txt")]
    proxies: PathBuf,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Generates `Server_1..5`/`Proxy_1..2` topology files for a fresh
    /// cluster. Starting the corresponding processes is left to whatever
    /// external supervisor this deployment uses.
    InitialSetup,

    /// Appends the next `Server_N` entry to the server topology file.
    AddServer,

    /// Sends `REMOVE_SERVER` to the named server and, once acknowledged,
    /// drops its entry from the topology file.
    RemoveServer {
        #[arg(long)]
        server_name: String,
    },

    /// Reserved for the out-of-scope per-node database provisioning step
    /// (spec §1); accepted here only so the CLI surface matches §6.2.
    SetupDb {
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.action {
        Action::InitialSetup => {
            let servers = topology::initial_servers(topology::INITIAL_SERVER_COUNT);
            let proxies = topology::initial_proxies(topology::INITIAL_PROXY_COUNT);
            topology::write_peers(&args.servers, &servers)?;
            topology::write_peers(&args.proxies, &proxies)?;
            println!(
                "wrote {} servers to {} and {} proxies to {}",
                servers.len(),
                args.servers.display(),
                proxies.len(),
                args.proxies.display()
            );
        }

        Action::AddServer => {
            let existing = topology::read_peers(&args.servers)?;
            let added = topology::next_server(&existing);
            topology::append_peer(&args.servers, &added)?;
            println!("added {}:{} to {}", added.name, added.port, args.servers.display());
        }

        Action::RemoveServer { server_name } => {
            let target_port = topology::find_port_by_name(&args.servers, &server_name)?;
            shoplist_admin::remove_server(target_port).await?;
            topology::remove_peer_by_name(&args.servers, &server_name)?;
            println!("removed {server_name} (port {target_port}) from {}", args.servers.display());
        }

        Action::SetupDb { user_id } => {
            anyhow::bail!(
                "setup-db for user {user_id:?} is handled by this deployment's external \
                 database-provisioning tool (spec §1); shoplist-admin only writes topology \
                 files and drives REMOVE_SERVER"
            );
        }
    }

    Ok(())
}
