use async_trait::async_trait;
use dotrelay_application::ports::{ReachabilityProbe, UNREACHABLE_MS};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use super::scatter::scatter_gather;

pub const PROBE_PORTS: [u16; 2] = [80, 443];
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP connect latency to a candidate answer address.
pub struct TcpReachability {
    ports: Vec<u16>,
    connect_timeout: Duration,
}

impl TcpReachability {
    pub fn new() -> Self {
        Self {
            ports: PROBE_PORTS.to_vec(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_ports(ports: Vec<u16>, connect_timeout: Duration) -> Self {
        Self {
            ports,
            connect_timeout,
        }
    }
}

impl Default for TcpReachability {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect_ms(addr: SocketAddr, connect_timeout: Duration) -> u32 {
    let start = Instant::now();
    match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed().as_millis();
            drop(stream);
            u32::try_from(elapsed).unwrap_or(UNREACHABLE_MS - 1)
        }
        _ => UNREACHABLE_MS,
    }
}

#[async_trait]
impl ReachabilityProbe for TcpReachability {
    async fn latency_ms(&self, ip: IpAddr) -> u32 {
        let connect_timeout = self.connect_timeout;
        let attempts = self
            .ports
            .iter()
            .map(|&port| connect_ms(SocketAddr::new(ip, port), connect_timeout));

        scatter_gather(attempts)
            .await
            .into_iter()
            .map(|(_, ms)| ms)
            .min()
            .unwrap_or(UNREACHABLE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        let probe = TcpReachability::with_ports(vec![port], Duration::from_millis(500));
        let latency = probe.latency_ms("127.0.0.1".parse().unwrap()).await;

        assert!(latency < UNREACHABLE_MS);
    }

    #[tokio::test]
    async fn test_closed_ports_are_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpReachability::with_ports(vec![port, port], Duration::from_millis(200));
        let latency = probe.latency_ms("127.0.0.1".parse().unwrap()).await;

        assert_eq!(latency, UNREACHABLE_MS);
    }
}
