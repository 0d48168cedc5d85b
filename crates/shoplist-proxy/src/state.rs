use crate::config::ClusterConfig;
use shoplist_membership::MembershipView;
use shoplist_net::PublisherServer;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state every request handler and background task on this proxy
/// reads or mutates. The proxy is otherwise stateless (spec §2): it keeps
/// no list data, only the membership view needed for ring placement and
/// the publisher used to fan `LIST_UPDATE`s out to subscribed clients.
#[derive(Clone)]
pub struct ProxyState {
    pub port: u16,
    pub membership: Arc<RwLock<MembershipView>>,
    pub publisher: Arc<PublisherServer>,
    pub cluster: ClusterConfig,
}

impl ProxyState {
    pub fn new(port: u16, publisher: Arc<PublisherServer>, cluster: ClusterConfig) -> Self {
        Self {
            port,
            membership: Arc::new(RwLock::new(MembershipView::with_self_proxy(port))),
            publisher,
            cluster,
        }
    }
}
