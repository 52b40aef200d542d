use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{self, Instant};
use tracing::trace;

/// Well-known echo service port targeted by the reachability probe.
pub const ECHO_PORT: u16 = 7;

/// Fixed connect bound for a single TCP port probe, independent of the scan timeout.
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Probe whether `addr` is up by sending an empty UDP datagram to port 7.
///
/// Any datagram received before `timeout` counts as a response and the
/// elapsed time is returned. Timeouts and socket errors both yield `None`:
/// no response is not proof that the host is down. Many hosts silently drop
/// unsolicited UDP, and on most platforms an ICMP port-unreachable reply is
/// not delivered to an unconnected socket, so this under-reports live hosts.
pub async fn probe_reachability(addr: Ipv4Addr, timeout: Duration) -> Option<Duration> {
    probe_udp(SocketAddrV4::new(addr, ECHO_PORT).into(), timeout).await
}

/// Send an empty datagram to `target` and wait for any datagram in return.
pub async fn probe_udp(target: SocketAddr, timeout: Duration) -> Option<Duration> {
    let start = Instant::now();
    let attempt = async {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.send_to(&[], target).await?;
        let mut buf = [0u8; 512];
        socket.recv_from(&mut buf).await?;
        Ok::<_, std::io::Error>(())
    };

    match time::timeout(timeout, attempt).await {
        Ok(Ok(())) => Some(start.elapsed()),
        Ok(Err(e)) => {
            trace!(%target, "udp probe error: {e}");
            None
        }
        Err(_) => None,
    }
}

/// Whether a TCP connection to `addr:port` can be established within one second.
pub async fn probe_port(addr: Ipv4Addr, port: u16) -> bool {
    probe_port_within(addr, port, PORT_PROBE_TIMEOUT).await
}

/// TCP connect check with an explicit bound. The connection is closed as soon
/// as it is established.
pub async fn probe_port_within(addr: Ipv4Addr, port: u16, limit: Duration) -> bool {
    match time::timeout(limit, TcpStream::connect((addr, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            trace!(%addr, port, "connect failed: {e}");
            false
        }
        Err(_) => false,
    }
}

/// Probe `ports` on one host one after another and return the open ones in
/// probe order.
pub async fn scan_host_ports(addr: Ipv4Addr, ports: &[u16]) -> Vec<u16> {
    let mut open = Vec::new();
    for &port in ports {
        if probe_port(addr, port).await {
            open.push(port);
        }
    }
    open
}
