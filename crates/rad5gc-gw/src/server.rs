//! RADIUS UDP Server
//!
//! Receives datagrams and hands each one to an independent handler task;
//! handlers only share the session table and the logger. A successful
//! reply write commits the pending EAP-Id binding; every discard is
//! logged and nothing is sent back.

use crate::handler::Gateway;
use rad5gc_proto::{Packet, PacketError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

/// UDP front end of the gateway
pub struct GatewayServer {
    gateway: Arc<Gateway>,
    socket: Arc<UdpSocket>,
}

impl GatewayServer {
    pub async fn bind(addr: SocketAddr, gateway: Arc<Gateway>) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("RADIUS server listening on {}", addr);

        Ok(GatewayServer {
            gateway,
            socket: Arc::new(socket),
        })
    }

    /// The bound address; useful when binding to port 0 in tests
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.socket.local_addr().map_err(ServerError::from)
    }

    /// Receive loop; returns only on an unrecoverable socket error.
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; Packet::MAX_PACKET_SIZE];

        loop {
            let (len, addr) = self.socket.recv_from(&mut buf).await?;
            let data = buf[..len].to_vec();

            let gateway = Arc::clone(&self.gateway);
            let socket = Arc::clone(&self.socket);

            tokio::spawn(async move {
                Self::handle_datagram(data, addr, gateway, socket).await;
            });
        }
    }

    async fn handle_datagram(
        data: Vec<u8>,
        addr: SocketAddr,
        gateway: Arc<Gateway>,
        socket: Arc<UdpSocket>,
    ) {
        let request = match Packet::decode(&data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("[RADIUS] undecodable datagram from {}: {}", addr, e);
                return;
            }
        };

        info!(
            "[RADIUS] {:?} (ID: 0x{:02X}) received from {}",
            request.code, request.identifier, addr
        );

        match gateway.handle(&request, addr).await {
            Ok((reply, binding)) => {
                let bytes = match reply.encode() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("[RADIUS] Failed to encode reply packet: {}", e);
                        return;
                    }
                };
                match socket.send_to(&bytes, addr).await {
                    Ok(_) => {
                        info!(
                            "[RADIUS] {:?} (ID: 0x{:02X}) sent to {}",
                            reply.code, reply.identifier, addr
                        );
                        // Binding commit happens only after the challenge
                        // actually reached the client.
                        if let Some(binding) = binding {
                            gateway.sessions().store(binding.eap_id, &binding.uri);
                        }
                    }
                    Err(e) => warn!("[RADIUS] Failed to send reply packet: {}", e),
                }
            }
            Err(discard) => {
                info!(
                    "[RADIUS] {:?} (ID: 0x{:02X}) from {} silently discarded: {}",
                    request.code, request.identifier, addr, discard
                );
            }
        }
    }
}
