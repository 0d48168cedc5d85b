use std::net::SocketAddr;

/// Address this node's ROUTER (or PUB, at `port+1`) socket binds to: every
/// interface, since nodes are addressed by port alone in this mesh.
pub fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Address used to dial a peer by port. The mesh is single-host-per-port
/// in this spec's deployment model (spec §6.2's `name:port` peer files),
/// so every outbound dial targets loopback.
pub fn loopback_addr(port: u16) -> String {
    format!("127.0.0.1:{port}")
}

/// Port convention from spec §6.1: a node's PUB socket is its DEALER
/// port plus one.
pub fn pub_port(router_port: u16) -> u16 {
    router_port + 1
}
