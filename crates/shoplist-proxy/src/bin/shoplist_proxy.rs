//! Stateless ring router binary.
//!
//! Binds a ROUTER socket on `--port` for client/dealer traffic and a PUB
//! socket on `port + 1` for `LIST_UPDATE` fanout (spec §6.1), then runs
//! the router and gossip loops until Ctrl-C.

use clap::Parser;
use shoplist_membership::MembershipView;
use shoplist_net::{PublisherServer, RouterServer, TcpGossipTransport};
use shoplist_proxy::{config, ClusterConfig, ProxyArgs, ProxyHandler, ProxyState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = ProxyArgs::parse();
    args.cluster = match &args.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::default(),
    };

    let shutdown = CancellationToken::new();
    let (publisher, _pub_addr, pub_task) =
        PublisherServer::bind(shoplist_net::bind_addr(shoplist_net::pub_port(args.port)), shutdown.clone())
            .await?;

    let state = ProxyState::new(args.port, Arc::new(publisher), args.cluster.clone());

    {
        let mut view = state.membership.write().await;
        *view = MembershipView::with_self_proxy(args.port);
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

    info!(port = args.port, "starting shoplist-proxy");

    let router = RouterServer::bind(shoplist_net::bind_addr(args.port), 8).await?;
    let handler = Arc::new(ProxyHandler {
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
            Arc::new(TcpGossipTransport::new("proxy")),
            gossip_shutdown_rx,
        )
        .await;
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining loops");
    shutdown.cancel();
    gossip_shutdown_tx.send(()).ok();

    let _ = tokio::join!(router_task, gossip_task, pub_task);
    Ok(())
}
