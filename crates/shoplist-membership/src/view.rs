use crate::ring::ServerEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The gossiped state every proxy and server maintains: the server set
/// (with precomputed ring hashes), the proxy port set, and a monotonic
/// version used to order reconciliation (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipView {
    pub servers: BTreeSet<ServerEntry>,
    pub proxies: BTreeSet<u16>,
    pub version: u64,
}

impl Default for MembershipView {
    fn default() -> Self {
        Self {
            servers: BTreeSet::new(),
            proxies: BTreeSet::new(),
            version: 1,
        }
    }
}

impl MembershipView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_self_server(self_port: u16) -> Self {
        let mut view = Self::new();
        view.servers.insert(ServerEntry::new(self_port));
        view
    }

    pub fn with_self_proxy(self_port: u16) -> Self {
        let mut view = Self::new();
        view.proxies.insert(self_port);
        view
    }
}

/// What a reconciliation pass actually changed, surfaced purely for
/// logging at the call site; the mutation itself happens on the view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub added_servers: Vec<u16>,
    pub removed_servers: Vec<u16>,
    pub added_proxies: Vec<u16>,
    pub removed_proxies: Vec<u16>,
    pub version_bumped: bool,
    pub adopted_incoming_version: bool,
}

impl ReconcileOutcome {
    fn is_noop(&self) -> bool {
        self.added_servers.is_empty()
            && self.removed_servers.is_empty()
            && self.added_proxies.is_empty()
            && self.removed_proxies.is_empty()
            && !self.version_bumped
            && !self.adopted_incoming_version
    }
}

/// Pure reconciliation per the four-case table in spec §4.3. `self_port`
/// is never removed from either set even if a stale/adopted incoming
/// view omits it — a node (server or proxy) never forgets itself.
///
/// This function has no I/O and no randomness: given the same `local`,
/// `incoming` and `self_port` it always produces the same resulting view,
/// which is what makes membership law 8 (eventual agreement) testable as
/// a pure property.
pub fn reconcile(
    local: &mut MembershipView,
    incoming: &MembershipView,
    self_port: u16,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    if incoming.version < local.version {
        return outcome;
    }

    if incoming.version == local.version {
        if incoming.servers == local.servers && incoming.proxies == local.proxies {
            return outcome;
        }

        for server in &incoming.servers {
            if local.servers.insert(server.clone()) {
                outcome.added_servers.push(server.port);
            }
        }
        for &proxy in &incoming.proxies {
            if local.proxies.insert(proxy) {
                outcome.added_proxies.push(proxy);
            }
        }
        local.version += 1;
        outcome.version_bumped = true;
        return outcome;
    }

    // incoming.version > local.version: adopt it as authoritative.
    local.version = incoming.version;
    outcome.adopted_incoming_version = true;

    let stale_servers: Vec<ServerEntry> = local
        .servers
        .iter()
        .filter(|s| s.port != self_port && !incoming.servers.contains(*s))
        .cloned()
        .collect();
    for server in stale_servers {
        local.servers.remove(&server);
        outcome.removed_servers.push(server.port);
    }

    let stale_proxies: Vec<u16> = local
        .proxies
        .iter()
        .filter(|&&p| p != self_port && !incoming.proxies.contains(&p))
        .copied()
        .collect();
    for proxy in stale_proxies {
        local.proxies.remove(&proxy);
        outcome.removed_proxies.push(proxy);
    }

    for server in &incoming.servers {
        if local.servers.insert(server.clone()) {
            outcome.added_servers.push(server.port);
        }
    }
    for &proxy in &incoming.proxies {
        if local.proxies.insert(proxy) {
            outcome.added_proxies.push(proxy);
        }
    }

    outcome
}
