//! Ring-partitioned storage node binary.
//!
//! Boots with `--port`, an optional `--servers`/`--proxies` known-peer
//! file pair (spec §6.2) and an optional `--config cluster.toml`, then
//! runs four concurrent loops until Ctrl-C: the request router, the
//! gossip tick, and the hinted-handoff repair tick.

use anyhow::Context;
use clap::Parser;
use shoplist_membership::MembershipView;
use shoplist_net::{RouterServer, TcpGossipTransport};
use shoplist_server::{config, ClusterConfig, ServerArgs, ServerHandler, ServerState};
use shoplist_storage::ShoppingListStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(feature = "persistent-storage")]
fn open_store(args: &ServerArgs) -> anyhow::Result<Arc<dyn ShoppingListStore>> {
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    let store = shoplist_storage::SledStore::open(&args.data_dir)
        .with_context(|| format!("opening sled store at {}", args.data_dir.display()))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "persistent-storage"))]
fn open_store(_args: &ServerArgs) -> anyhow::Result<Arc<dyn ShoppingListStore>> {
    Ok(Arc::new(shoplist_storage::MemoryStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = ServerArgs::parse();
    args.cluster = match &args.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::default(),
    };

    let storage = open_store(&args)?;
    let state = ServerState::new(args.port, storage, args.cluster.clone());

    {
        let mut view = state.membership.write().await;
        *view = MembershipView::with_self_server(args.port);
        if let Some(path) = &args.servers {
            for peer in config::load_known_peers(path)? {
                view.servers
                    .insert(shoplist_membership::ServerEntry::new(peer.port));
            }
        }
        if let Some(path) = &args.proxies {
            for peer in config::load_known_peers(path)? {
                view.proxies.insert(peer.port);
            }
        }
    }

    info!(port = args.port, "starting shoplist-server");

    let shutdown = CancellationToken::new();
    let router = RouterServer::bind(shoplist_net::bind_addr(args.port), 8).await?;
    let handler = Arc::new(ServerHandler {
        state: state.clone(),
    });

    let router_shutdown = shutdown.clone();
    let router_task = tokio::spawn(async move {
        router.serve(handler, router_shutdown).await;
    });

    let (gossip_shutdown_tx, gossip_shutdown_rx) = tokio::sync::oneshot::channel();
    let gossip_view = state.membership.clone();
    let gossip_port = state.port;
    let gossip_task = tokio::spawn(async move {
        shoplist_membership::run_gossip_loop(
            gossip_view,
            gossip_port,
            Arc::new(TcpGossipTransport::new("server")),
            gossip_shutdown_rx,
        )
        .await;
    });

    let repair_shutdown = shutdown.clone();
    let repair_state = state.clone();
    let repair_task = tokio::spawn(async move {
        shoplist_server::run_repair_loop(repair_state, repair_shutdown).await;
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining loops");
    shutdown.cancel();
    gossip_shutdown_tx.send(()).ok();

    let _ = tokio::join!(router_task, gossip_task, repair_task);
    Ok(())
}
