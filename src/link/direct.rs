//! Direct unicast transport: connect-per-send TCP for outbound packages, an
//! accept-loop receiver for inbound ones.
//!
//! Grounded on `examples/redhat-performance-rusty-comms/src/ipc/tcp_socket.rs`'s
//! `start_multi_server` accept loop and `socket2`-based socket tuning, and on
//! `examples/original_source/plugin-comms-twosix-cpp/source/direct/DirectLink.cpp`
//! for the EADDRNOTAVAIL retry/backoff and soft-vs-hard accept error split.

use crate::enc_pkg::EncPkg;
use crate::error::CoreError;
use crate::ids::LinkId;
use crate::link::{Link, LinkKind};
use async_trait::async_trait;
use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, warn};

const EADDRNOTAVAIL_BACKOFF: Duration = Duration::from_millis(10);
const EADDRNOTAVAIL_WARN_THRESHOLD: u32 = 50;
const HARD_BIND_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct DirectLink {
    link_id: LinkId,
    hostname: String,
    port: u16,
    stop: Notify,
    stopped: AtomicBool,
}

impl DirectLink {
    pub fn new(link_id: LinkId, hostname: String, port: u16) -> Arc<Self> {
        Arc::new(Self {
            link_id,
            hostname,
            port,
            stop: Notify::new(),
            stopped: AtomicBool::new(true),
        })
    }

    fn is_eaddrnotavail(err: &std::io::Error) -> bool {
        err.raw_os_error() == Some(libc::EADDRNOTAVAIL)
    }

    fn is_soft_accept_error(err: &std::io::Error) -> bool {
        matches!(
            err.raw_os_error(),
            Some(libc::ENETDOWN)
                | Some(libc::EPROTO)
                | Some(libc::ENOPROTOOPT)
                | Some(libc::EHOSTDOWN)
                | Some(libc::ENONET)
                | Some(libc::EHOSTUNREACH)
                | Some(libc::EOPNOTSUPP)
                | Some(libc::ENETUNREACH)
        )
    }

    async fn accept_loop(self: Arc<Self>, link: Arc<Link>) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            let listener = match self.bind().await {
                Some(l) => l,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(HARD_BIND_RETRY_DELAY) => continue,
                        _ = self.stop.notified() => return,
                    }
                }
            };
            loop {
                tokio::select! {
                    _ = self.stop.notified() => return,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                debug!(link = %self.link_id, %peer, "accepted direct link connection");
                                let link = link.clone();
                                tokio::spawn(Self::drain_connection(stream, link));
                            }
                            Err(e) if Self::is_soft_accept_error(&e) => {
                                warn!(link = %self.link_id, error = %e, "soft accept error, continuing");
                                continue;
                            }
                            Err(e) => {
                                warn!(link = %self.link_id, error = %e, "hard accept error, closing socket and rebinding");
                                drop(listener);
                                tokio::select! {
                                    _ = tokio::time::sleep(HARD_BIND_RETRY_DELAY) => break,
                                    _ = self.stop.notified() => return,
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    async fn bind(&self) -> Option<TcpListener> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port).parse().ok()?;
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).ok()?;
        socket.set_reuse_address(true).ok()?;
        #[cfg(unix)]
        socket.set_reuse_port(true).ok()?;
        socket.set_nonblocking(true).ok()?;
        if let Err(e) = socket.bind(&addr.into()) {
            warn!(link = %self.link_id, error = %e, "direct link bind failed");
            return None;
        }
        if let Err(e) = socket.listen(128) {
            warn!(link = %self.link_id, error = %e, "direct link listen failed");
            return None;
        }
        TcpListener::from_std(socket.into()).ok()
    }

    async fn drain_connection(mut stream: TcpStream, link: Arc<Link>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        if let Some(pkg) = EncPkg::decode(&buf) {
            link.deliver_received(pkg).await;
        } else if !buf.is_empty() {
            link.deliver_received(EncPkg::from_raw(buf)).await;
        }
    }
}

#[async_trait]
impl LinkKind for DirectLink {
    async fn send_internal(&self, pkg: &EncPkg) -> Result<(), CoreError> {
        let addr = format!("{}:{}", self.hostname, self.port);
        let mut retries: u32 = 0;
        let mut stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(s) => break s,
                Err(e) if Self::is_eaddrnotavail(&e) => {
                    retries += 1;
                    if retries == EADDRNOTAVAIL_WARN_THRESHOLD {
                        warn!(link = %self.link_id, retries, "repeated EADDRNOTAVAIL connecting direct link");
                    }
                    tokio::time::sleep(EADDRNOTAVAIL_BACKOFF).await;
                    continue;
                }
                Err(e) => {
                    return Err(CoreError::TransportSendFailure {
                        link_id: self.link_id.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        };
        let encoded = pkg.encode();
        stream
            .write_all(&encoded)
            .await
            .map_err(|e| CoreError::TransportSendFailure {
                link_id: self.link_id.clone(),
                reason: e.to_string(),
            })?;
        stream
            .shutdown()
            .await
            .map_err(|e| CoreError::TransportSendFailure {
                link_id: self.link_id.clone(),
                reason: e.to_string(),
            })
    }

    async fn start_receive(self: Arc<Self>, link: Arc<Link>) {
        self.stopped.store(false, Ordering::SeqCst);
        tokio::spawn(self.clone().accept_loop(link));
    }

    async fn stop_receive(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.notify_waiters();
    }

    fn link_address(&self) -> String {
        format!(r#"{{"hostname":"{}","port":{}}}"#, self.hostname, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::NullHost;
    use crate::ids::{LinkType, PackageType, RaceHandle};
    use crate::link::{DutyCycleConfig, fault::FaultConfig};

    #[tokio::test]
    async fn loopback_delivers_identical_package() {
        let port = 28765;
        let host: Arc<dyn crate::host::HostHandle> = Arc::new(NullHost);

        let recv_kind = DirectLink::new("recv".to_string(), "0.0.0.0".to_string(), port);
        let recv_link = Link::new(
            "recv".to_string(),
            "directNetworking".to_string(),
            LinkType::Receive,
            host.clone(),
            recv_kind,
            FaultConfig::default(),
            DutyCycleConfig::default(),
        );
        recv_link
            .open_connection("recv-conn".to_string(), LinkType::Receive, String::new(), crate::ids::RACE_UNLIMITED)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let send_kind = DirectLink::new("send".to_string(), "127.0.0.1".to_string(), port);
        let send_link = Link::new(
            "send".to_string(),
            "directNetworking".to_string(),
            LinkType::Send,
            host,
            send_kind,
            FaultConfig::default(),
            DutyCycleConfig::default(),
        );
        let pkg = Arc::new(EncPkg::new(1, 2, PackageType::NetworkManager, vec![0, 1, 2, 3]));
        send_link.enqueue(RaceHandle(1), pkg, f64::INFINITY).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        send_link.shutdown().await;
        recv_link.shutdown().await;
    }
}
