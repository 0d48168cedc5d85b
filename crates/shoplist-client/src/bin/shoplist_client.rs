//! Background sync daemon for an offline-capable client device.
//!
//! Runs a subscriber per known proxy (spec §4.4.6) and the not-sent
//! retry heartbeat until Ctrl-C. The interactive list editor is a
//! separate, external collaborator that talks to the local store
//! directly; this binary only keeps that store converging with the
//! mesh.

use anyhow::Context;
use clap::Parser;
use shoplist_client::{config, ClientArgs};
use shoplist_storage::ShoppingListStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(feature = "persistent-storage")]
fn open_store(args: &ClientArgs) -> anyhow::Result<Arc<dyn ShoppingListStore>> {
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    let store = shoplist_storage::SledStore::open(&args.data_dir)
        .with_context(|| format!("opening sled store at {}", args.data_dir.display()))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "persistent-storage"))]
fn open_store(_args: &ClientArgs) -> anyhow::Result<Arc<dyn ShoppingListStore>> {
    Ok(Arc::new(shoplist_storage::MemoryStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = ClientArgs::parse();
    let storage = open_store(&args)?;
    let proxies = config::load_known_ports(&args.proxies)?;

    info!(
        actor_id = %args.actor_id,
        proxy_count = proxies.len(),
        "starting shoplist-client sync daemon"
    );

    let communicator = shoplist_client::Communicator::new(proxies.clone(), storage.clone());

    let shutdown = CancellationToken::new();
    let mut subscriber_tasks = Vec::new();
    for proxy_port in proxies {
        let sub_storage = storage.clone();
        let sub_shutdown = shutdown.clone();
        subscriber_tasks.push(tokio::spawn(async move {
            shoplist_client::run_subscriber(proxy_port, sub_storage, sub_shutdown).await;
        }));
    }

    let heartbeat_shutdown = shutdown.clone();
    let heartbeat_task = tokio::spawn(async move {
        shoplist_client::run_heartbeat(communicator, heartbeat_shutdown).await;
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining loops");
    shutdown.cancel();

    for task in subscriber_tasks {
        let _ = task.await;
    }
    let _ = heartbeat_task.await;
    Ok(())
}
