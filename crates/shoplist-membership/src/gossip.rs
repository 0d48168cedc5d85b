use crate::view::{reconcile, MembershipView};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

pub const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
pub const GOSSIP_FANOUT: usize = 2;

/// Decouples the gossip tick from the wire layer: `shoplist-net` (or a
/// test double) implements this to actually deliver a payload to a peer.
#[async_trait]
pub trait GossipTransport: Send + Sync {
    async fn send_gossip(&self, peer_port: u16, view: &MembershipView, is_introduction: bool);
}

fn pick_fanout(candidates: &[u16], fanout: usize) -> Vec<u16> {
    let mut rng = rand::thread_rng();
    let mut pool: Vec<u16> = candidates.to_vec();
    pool.shuffle(&mut rng);
    pool.into_iter().take(fanout).collect()
}

/// One gossip tick: picks up to `GOSSIP_FANOUT` servers and `GOSSIP_FANOUT`
/// proxies from the current view (excluding `self_port`) and sends each a
/// copy of the local view. The very first tick a node ever runs uses the
/// `GOSSIP_INTRODUCTION` framing, which receivers treat as an unconditional
/// union (spec §4.3).
pub async fn gossip_tick(
    view: &Arc<RwLock<MembershipView>>,
    self_port: u16,
    transport: &dyn GossipTransport,
) {
    let snapshot = view.read().await.clone();
    let is_introduction = snapshot.version == 1;

    let server_candidates: Vec<u16> = snapshot
        .servers
        .iter()
        .map(|s| s.port)
        .filter(|&p| p != self_port)
        .collect();
    let proxy_candidates: Vec<u16> = snapshot.proxies.iter().copied().collect();

    let targets: Vec<u16> = pick_fanout(&server_candidates, GOSSIP_FANOUT)
        .into_iter()
        .chain(pick_fanout(&proxy_candidates, GOSSIP_FANOUT))
        .collect();

    trace!(?targets, version = snapshot.version, "gossip tick fanning out");
    for target in targets {
        transport.send_gossip(target, &snapshot, is_introduction).await;
    }
}

/// Apply a received `GOSSIP`/`GOSSIP_INTRODUCTION` payload to the shared
/// view. `GOSSIP_INTRODUCTION` is just a `GOSSIP` whose sender has never
/// gossiped before; reconciliation treats both identically since an
/// introduction's low version number already makes its additions win
/// under the equal/lower-version rules.
pub async fn handle_incoming_gossip(
    view: &Arc<RwLock<MembershipView>>,
    self_port: u16,
    incoming: &MembershipView,
) {
    let mut guard = view.write().await;
    let outcome = reconcile(&mut guard, incoming, self_port);
    debug!(?outcome, "reconciled incoming gossip");
}

/// Runs `gossip_tick` every `GOSSIP_INTERVAL` until `shutdown` resolves.
/// Intended to be spawned as its own background task per spec §5's
/// "background tasks: gossip tick (500ms)".
pub async fn run_gossip_loop(
    view: Arc<RwLock<MembershipView>>,
    self_port: u16,
    transport: Arc<dyn GossipTransport>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(GOSSIP_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                gossip_tick(&view, self_port, transport.as_ref()).await;
            }
            _ = &mut shutdown => {
                debug!("gossip loop shutting down");
                break;
            }
        }
    }
}
