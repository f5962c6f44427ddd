use crate::config::ProbeConfig;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub ip_address: Option<String>,
}

impl ProbeResult {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ip_address: None,
        }
    }
}

/// Single-attempt network checks. Neither method retries or returns an error:
/// an unanswered check is simply reported as failed.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self, fqdn: &str) -> ProbeResult;

    fn check_management_channel(&self, short_name: &str) -> bool;
}

/// TCP connect based probe. Reachability is one connect to the
/// reachability port; the channel check is one connect to the
/// management (WinRM) port. Both are bounded by the configured timeout.
pub struct TcpProbe {
    reachability_port: u16,
    management_port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            reachability_port: config.reachability_port,
            management_port: config.management_port,
            timeout: config.timeout(),
        }
    }

    /// Lookup and connect share one deadline.
    fn connect(&self, host: &str, port: u16) -> Option<IpAddr> {
        let deadline = Instant::now() + self.timeout;

        let target = host.to_string();
        let looked_up = within(self.timeout, move || {
            (target.as_str(), port)
                .to_socket_addrs()
                .map(|addrs| prefer_ipv4(addrs.collect()))
        });
        let candidates = match looked_up {
            Some(Ok(addrs)) => addrs,
            Some(Err(e)) => {
                trace!("Cannot resolve {}: {}", host, e);
                return None;
            }
            None => {
                trace!("Lookup of {} timed out", host);
                return None;
            }
        };

        // one connect to the preferred address; no retry across candidates
        let addr = candidates.first()?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            trace!("No time left to connect to {}", host);
            return None;
        }
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(stream) => stream.peer_addr().ok().map(|peer| peer.ip()),
            Err(e) => {
                trace!("Connect to {} ({}) failed: {}", host, addr, e);
                None
            }
        }
    }
}

/// Run a blocking call on its own thread, giving up after `budget`.
/// A call that overruns is left to finish in the background.
fn within<T, F>(budget: Duration, call: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(call());
    });
    rx.recv_timeout(budget).ok()
}

impl ReachabilityProbe for TcpProbe {
    fn probe(&self, fqdn: &str) -> ProbeResult {
        match self.connect(fqdn, self.reachability_port) {
            Some(ip) => ProbeResult {
                reachable: true,
                ip_address: Some(ip.to_string()),
            },
            None => ProbeResult::unreachable(),
        }
    }

    fn check_management_channel(&self, short_name: &str) -> bool {
        self.connect(short_name, self.management_port).is_some()
    }
}

fn prefer_ipv4(mut addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    addrs.sort_by_key(|addr| !addr.is_ipv4());
    addrs
}
