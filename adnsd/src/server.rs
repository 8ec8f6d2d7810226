//! The transport adapter: receives UDP datagrams, hands parsed
//! queries to the response composer, and sends the replies.
//!
//! Unparseable frames are dropped silently; errors sending an
//! individual reply are logged and otherwise ignored, since one bad
//! client must not affect any other.  A bind failure is fatal, since
//! the server cannot do anything useful without its socket.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use dns_resolver::compose_response;
use dns_types::protocol::types::Message;
use dns_types::zones::types::ZoneStore;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

/// Datagrams larger than this are never sent by a well-behaved peer;
/// anything bigger is not a DNS query.
const MAX_DATAGRAM_OCTETS: usize = 4096;

pub async fn listen(
    interface: IpAddr,
    port: u16,
    store: Arc<RwLock<Arc<ZoneStore>>>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = SocketAddr::from((interface, port));
    let socket = UdpSocket::bind(addr).await?;
    tracing::info!(%addr, "listening for DNS queries");

    let mut buf = [0u8; MAX_DATAGRAM_OCTETS];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, peer) = match result {
                    Ok(v) => v,
                    Err(error) => {
                        tracing::warn!(%error, "error receiving datagram");
                        continue;
                    }
                };
                handle_datagram(&socket, &store, &buf[..len], peer).await;
            }
            _ = shutdown.recv() => {
                tracing::info!("transport shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    store: &RwLock<Arc<ZoneStore>>,
    datagram: &[u8],
    peer: SocketAddr,
) {
    let query = match Message::from_octets(datagram) {
        Ok(query) => query,
        Err(error) => {
            tracing::debug!(%peer, ?error, "dropping unparseable datagram");
            return;
        }
    };

    let snapshot = Arc::clone(&*store.read().await);
    let response = compose_response(&query, &snapshot);

    let octets = match response.serialise() {
        Ok(octets) => octets,
        Err(error) => {
            tracing::warn!(%peer, ?error, "failed to serialise response");
            return;
        }
    };

    if let Err(error) = socket.send_to(&octets, peer).await {
        tracing::warn!(%peer, %error, "failed to send response");
    }
}
