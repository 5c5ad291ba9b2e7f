//! Indirect, store-and-forward transport over an external HTTP bulletin board.
//!
//! Grounded on `examples/original_source/plugin-comms-twosix-cpp`'s whiteboard link
//! for the polling/self-post-suppression/resumable-cursor protocol; the HTTP client
//! itself is `reqwest`, the crate the comms-core Cargo.toml pulled in for this purpose
//! (selected the way `other_examples/manifests/harborgrid-justin-rusty-db` uses it).

use crate::enc_pkg::EncPkg;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::LinkId;
use crate::link::{Link, LinkKind};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

const OWN_POST_HASH_CAPACITY: usize = 1024;
const POST_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const POST_RETRY_LOG_INTERVAL: u32 = 30;

fn cursor_key(hostname: &str, port: u16, hashtag: &str) -> String {
    format!("lastTimestamp:{hostname}:{port}:{hashtag}")
}

fn hash_post(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    format!("{digest:x}")
}

#[derive(Deserialize)]
struct GetResponse {
    data: Vec<String>,
    #[allow(dead_code)]
    length: u64,
    timestamp: String,
}

#[derive(Deserialize)]
struct AfterResponse {
    index: u64,
}

pub struct WhiteboardLink {
    link_id: LinkId,
    host: Arc<dyn HostHandle>,
    hostname: String,
    port: u16,
    hashtag: String,
    initial_timestamp: f64,
    max_tries: u32,
    polling_period_ms: AtomicU64,
    client: reqwest::Client,
    latest_index: Mutex<u64>,
    own_post_hashes: Mutex<VecDeque<String>>,
    stop: Notify,
    stopped: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl WhiteboardLink {
    pub fn new(
        link_id: LinkId,
        host: Arc<dyn HostHandle>,
        hostname: String,
        port: u16,
        hashtag: String,
        initial_timestamp: f64,
        polling_period_ms: u64,
        max_tries: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            link_id,
            host,
            hostname,
            port,
            hashtag,
            initial_timestamp,
            max_tries,
            polling_period_ms: AtomicU64::new(polling_period_ms),
            client: reqwest::Client::new(),
            latest_index: Mutex::new(0),
            own_post_hashes: Mutex::new(VecDeque::new()),
            stop: Notify::new(),
            stopped: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
        })
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }

    /// Polling cadence hints may only lower the effective interval, never raise it.
    pub fn lower_polling_period(&self, hint_ms: u64) {
        let current = self.polling_period_ms.load(Ordering::SeqCst);
        if hint_ms < current {
            self.polling_period_ms.store(hint_ms, Ordering::SeqCst);
        }
    }

    async fn resolve_initial_index(&self) -> u64 {
        let key = cursor_key(&self.hostname, self.port, &self.hashtag);
        let timestamp = match self.host.read_file(&key).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().parse::<f64>().unwrap_or(self.initial_timestamp),
            Err(_) => self.initial_timestamp,
        };
        let url = format!("{}/after/{}/{}", self.base_url(), self.hashtag, timestamp as u64);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<AfterResponse>().await {
                Ok(parsed) => parsed.index,
                Err(_) => 0,
            },
            Err(_) => 0,
        }
    }

    async fn record_own_post(&self, hash: String) {
        let mut own = self.own_post_hashes.lock().await;
        if own.len() >= OWN_POST_HASH_CAPACITY {
            warn!(link = %self.link_id, "own-post hash ring full, dropping oldest entry");
            own.pop_front();
        }
        own.push_back(hash);
    }

    /// Drops a single post this link gave up posting (send failed past `max_tries`),
    /// which will never come back on a poll and so has nothing to be a prefix of.
    async fn forget_own_post(&self, hash: &str) {
        let mut own = self.own_post_hashes.lock().await;
        if let Some(pos) = own.iter().position(|h| h == hash) {
            own.remove(pos);
        }
    }

    /// Self-echo suppression for a post seen on a poll: if `hash` matches one of our
    /// own posts, every entry at or before that position is discarded along with it —
    /// anything older than a confirmed echo already came back (or never will) and is
    /// just stale bookkeeping at that point.
    async fn consume_own_post(&self, hash: &str) -> bool {
        let mut own = self.own_post_hashes.lock().await;
        match own.iter().position(|h| h == hash) {
            Some(pos) => {
                own.drain(0..=pos);
                true
            }
            None => false,
        }
    }

    async fn poll_loop(self: Arc<Self>, link: Arc<Link>) {
        let initial = self.resolve_initial_index().await;
        *self.latest_index.lock().await = initial;

        loop {
            let period = Duration::from_millis(self.polling_period_ms.load(Ordering::SeqCst));
            tokio::select! {
                _ = self.stop.notified() => return,
                _ = tokio::time::sleep(period) => {}
            }
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            self.poll_once(&link).await;
        }
    }

    async fn poll_once(&self, link: &Arc<Link>) {
        let latest = *self.latest_index.lock().await;
        let url = format!("{}/get/{}/{}/-1", self.base_url(), self.hashtag, latest);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                self.note_failure(e.to_string()).await;
                return;
            }
        };
        let parsed = match response.json::<GetResponse>().await {
            Ok(p) => p,
            Err(e) => {
                self.note_failure(e.to_string()).await;
                return;
            }
        };
        self.consecutive_failures.store(0, Ordering::SeqCst);

        let mut delivered_any = false;
        for post in &parsed.data {
            let hash = hash_post(post);
            if self.consume_own_post(&hash).await {
                continue;
            }
            match base64::engine::general_purpose::STANDARD.decode(post) {
                Ok(bytes) => {
                    link.deliver_received(EncPkg::from_raw(bytes)).await;
                    delivered_any = true;
                }
                Err(e) => {
                    warn!(link = %self.link_id, error = %e, "failed to base64-decode whiteboard post");
                }
            }
        }

        if !parsed.data.is_empty() {
            *self.latest_index.lock().await = latest + parsed.data.len() as u64;
            let key = cursor_key(&self.hostname, self.port, &self.hashtag);
            if let Err(e) = self.host.write_file(&key, parsed.timestamp.as_bytes()).await {
                warn!(link = %self.link_id, error = %e, "failed to persist whiteboard cursor");
            }
        }
        let _ = delivered_any;
    }

    async fn note_failure(&self, reason: String) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(link = %self.link_id, failures, %reason, "whiteboard poll failed");
        if failures >= self.max_tries {
            warn!(link = %self.link_id, failures, "whiteboard link exceeded max_tries, marking failed");
        }
    }
}

#[async_trait]
impl LinkKind for WhiteboardLink {
    async fn send_internal(&self, pkg: &EncPkg) -> Result<(), CoreError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(pkg.cipher_text());
        let hash = hash_post(&encoded);
        self.record_own_post(hash.clone()).await;

        let url = format!("{}/post/{}", self.base_url(), self.hashtag);
        let body = serde_json::json!({ "data": encoded });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    if attempt % POST_RETRY_LOG_INTERVAL == 0 {
                        warn!(link = %self.link_id, status = %resp.status(), attempt, "whiteboard post still failing");
                    }
                }
                Err(e) => {
                    if attempt % POST_RETRY_LOG_INTERVAL == 0 {
                        warn!(link = %self.link_id, error = %e, attempt, "whiteboard post still failing");
                    }
                }
            }
            if attempt >= self.max_tries {
                self.forget_own_post(&hash).await;
                return Err(CoreError::TransportSendFailure {
                    link_id: self.link_id.clone(),
                    reason: "whiteboard post exceeded max_tries".to_string(),
                });
            }
            tokio::time::sleep(POST_RETRY_BACKOFF).await;
        }
    }

    async fn start_receive(self: Arc<Self>, link: Arc<Link>) {
        self.stopped.store(false, Ordering::SeqCst);
        tokio::spawn(self.clone().poll_loop(link));
    }

    async fn stop_receive(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.notify_waiters();
    }

    fn link_address(&self) -> String {
        format!(
            r#"{{"hostname":"{}","port":{},"hashtag":"{}","checkFrequency":{},"timestamp":{},"maxTries":{}}}"#,
            self.hostname,
            self.port,
            self.hashtag,
            self.polling_period_ms.load(Ordering::SeqCst),
            self.initial_timestamp,
            self.max_tries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::NullHost;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_post("abc"), hash_post("abc"));
        assert_ne!(hash_post("abc"), hash_post("abd"));
    }

    #[tokio::test]
    async fn own_post_hash_ring_evicts_oldest_when_full() {
        let link = WhiteboardLink::new(
            "wb".to_string(),
            Arc::new(NullHost),
            "127.0.0.1".to_string(),
            0,
            "tag".to_string(),
            0.0,
            1000,
            3,
        );
        for i in 0..(OWN_POST_HASH_CAPACITY + 5) {
            link.record_own_post(format!("hash-{i}")).await;
        }
        let own = link.own_post_hashes.lock().await;
        assert_eq!(own.len(), OWN_POST_HASH_CAPACITY);
        assert!(!own.contains(&"hash-0".to_string()));
    }

    #[tokio::test]
    async fn consume_own_post_discards_everything_up_to_the_match() {
        let link = WhiteboardLink::new(
            "wb".to_string(),
            Arc::new(NullHost),
            "127.0.0.1".to_string(),
            0,
            "tag".to_string(),
            0.0,
            1000,
            3,
        );
        for hash in ["a", "b", "c", "d"] {
            link.record_own_post(hash.to_string()).await;
        }
        assert!(link.consume_own_post("c").await);
        let remaining: Vec<_> = link.own_post_hashes.lock().await.iter().cloned().collect();
        assert_eq!(remaining, vec!["d".to_string()]);
    }

    #[tokio::test]
    async fn consume_own_post_is_a_no_op_when_hash_is_unknown() {
        let link = WhiteboardLink::new(
            "wb".to_string(),
            Arc::new(NullHost),
            "127.0.0.1".to_string(),
            0,
            "tag".to_string(),
            0.0,
            1000,
            3,
        );
        link.record_own_post("a".to_string()).await;
        assert!(!link.consume_own_post("never-posted").await);
        let remaining: Vec<_> = link.own_post_hashes.lock().await.iter().cloned().collect();
        assert_eq!(remaining, vec!["a".to_string()]);
    }

    #[test]
    fn polling_period_hint_can_only_lower() {
        let link = WhiteboardLink::new(
            "wb".to_string(),
            Arc::new(NullHost),
            "h".to_string(),
            0,
            "tag".to_string(),
            0.0,
            5000,
            3,
        );
        link.lower_polling_period(10000);
        assert_eq!(link.polling_period_ms.load(Ordering::SeqCst), 5000);
        link.lower_polling_period(1000);
        assert_eq!(link.polling_period_ms.load(Ordering::SeqCst), 1000);
    }
}
