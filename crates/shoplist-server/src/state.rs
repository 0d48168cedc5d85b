use crate::config::ClusterConfig;
use shoplist_membership::MembershipView;
use shoplist_storage::ShoppingListStore;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state every request handler and background task on this node
/// reads or mutates. `storage` is internally synchronized (spec §4.2's
/// read-write lock contract); `membership` is synchronized here because
/// the gossip tick is the only writer and every handler is a reader.
#[derive(Clone)]
pub struct ServerState {
    pub port: u16,
    pub storage: Arc<dyn ShoppingListStore>,
    pub membership: Arc<RwLock<MembershipView>>,
    pub cluster: ClusterConfig,
}

impl ServerState {
    pub fn new(port: u16, storage: Arc<dyn ShoppingListStore>, cluster: ClusterConfig) -> Self {
        Self {
            port,
            storage,
            membership: Arc::new(RwLock::new(MembershipView::with_self_server(port))),
            cluster,
        }
    }
}
