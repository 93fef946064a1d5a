use anyhow::Result;

use crate::{
    peer::{
        builder::PeerBuilder,
        peer::{
            Peer,
            PeerConfig,
        },
    },
    transport::web_socket_transport::{
        WebSocketConfig,
        WebSocketTransport,
    },
};

impl PeerBuilder {
    /// Builds a peer that connects to the router over WebSocket.
    pub fn build_web_socket(self, web_socket: WebSocketConfig) -> Result<Peer> {
        self.build(Box::new(WebSocketTransport::new(web_socket)?))
    }
}

/// Creates a new [`Peer`] that connects to the router over WebSocket.
pub fn new_web_socket_peer(config: PeerConfig, web_socket: WebSocketConfig) -> Result<Peer> {
    PeerBuilder::new(config).build_web_socket(web_socket)
}
