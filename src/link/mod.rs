//! Per-link state machine: the send queue, the duty-cycle scheduler, fault injection,
//! and the glue between a transport-specific [`LinkKind`] and the host SDK.
//!
//! Grounded on the teacher's `IpcTransport` trait (`examples/redhat-performance-rusty-comms/src/ipc/mod.rs`)
//! for the shape of a pluggable transport abstraction, generalized here to the
//! send-queue-owning, duty-cycle-scheduled `Link` the specification describes. The
//! accept-loop/condvar-style scheduling is reimplemented on `tokio::sync::Notify` per
//! the license in the design notes to substitute a cooperative runtime for real OS
//! threads provided ordering is preserved.

pub mod fault;
pub mod direct;
pub mod whiteboard;
pub mod bootstrap_file;

use crate::connection::Connection;
use crate::enc_pkg::EncPkg;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::{
    ChannelGid, ConnectionId, ConnectionStatus, LinkId, LinkStatus, LinkType, PackageStatus,
    RaceHandle,
};
use async_trait::async_trait;
use fault::FaultConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Maximum depth of a link's send queue before `enqueue` returns `QueueFull`.
pub const SEND_QUEUE_MAX_CAPACITY: usize = 10;

fn now_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Duty-cycle parameters. `0` is the documented sentinel for "unbounded" on the two
/// period-length fields and the amount field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycleConfig {
    pub send_period_length_s: f64,
    pub send_period_amount: u64,
    pub sleep_period_length_s: f64,
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self {
            send_period_length_s: 0.0,
            send_period_amount: 0,
            sleep_period_length_s: 0.0,
        }
    }
}

struct SchedulerState {
    sleeping: bool,
    /// Seconds-since-epoch at which the next sleep/wake transition is due. `+inf` when
    /// `send_period_length_s == 0` (never auto-sleeps by time).
    next_change: f64,
    next_sleep_amount: i64,
}

impl SchedulerState {
    fn new(cfg: &DutyCycleConfig) -> Self {
        Self {
            sleeping: false,
            next_change: if cfg.send_period_length_s > 0.0 {
                now_s() + cfg.send_period_length_s
            } else {
                f64::INFINITY
            },
            next_sleep_amount: cfg.send_period_amount as i64,
        }
    }

    fn should_sleep(&self, cfg: &DutyCycleConfig, now: f64) -> bool {
        !self.sleeping
            && (now > self.next_change
                || (cfg.send_period_amount != 0 && self.next_sleep_amount <= 0))
    }

    fn should_wake(&self, now: f64) -> bool {
        self.sleeping && now > self.next_change
    }
}

/// Entry queued on a link awaiting its turn through the send pipeline.
#[derive(Debug, Clone)]
pub struct SendInfo {
    pub handle: RaceHandle,
    pub pkg: Arc<EncPkg>,
    /// Seconds-since-epoch after which the package is considered stale.
    pub timeout_timestamp: f64,
}

/// Per-transport-kind hook the generic [`Link`] dispatches to. One impl per concrete
/// channel kind (direct TCP, whiteboard HTTP, bootstrap file).
impl std::fmt::Debug for dyn LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn LinkKind>")
    }
}

#[async_trait]
pub trait LinkKind: Send + Sync {
    /// Attempt to deliver one package over the concrete transport. Returning `Ok(false)`
    /// tells the owning link's send loop to terminate (a fatal transport condition);
    /// `Ok(true)` means the package round made it through (success or soft failure
    /// already reported by the implementation internally isn't modeled here — the
    /// caller reports [`PackageStatus`] based on the `Result`).
    async fn send_internal(&self, pkg: &EncPkg) -> Result<(), CoreError>;

    /// Start whatever background receive routine this kind needs (accept loop, HTTP
    /// poller, ...). Called when the first receive-capable connection opens.
    async fn start_receive(self: Arc<Self>, link: Arc<Link>);

    /// Stop the receive routine. Called when the last receive-capable connection
    /// closes, or on link shutdown.
    async fn stop_receive(&self);

    /// The textual address peers use to address this link.
    fn link_address(&self) -> String;
}

pub struct Link {
    id: LinkId,
    channel_gid: ChannelGid,
    link_type: LinkType,
    host: Arc<dyn HostHandle>,
    kind: Arc<dyn LinkKind>,
    fault: FaultConfig,
    duty_cycle: DutyCycleConfig,
    queue: Mutex<VecDeque<SendInfo>>,
    notify: Notify,
    shutdown: AtomicBool,
    scheduler: Mutex<SchedulerState>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    send_task: Mutex<Option<JoinHandle<()>>>,
    receiving: AtomicBool,
}

impl Link {
    pub fn new(
        id: LinkId,
        channel_gid: ChannelGid,
        link_type: LinkType,
        host: Arc<dyn HostHandle>,
        kind: Arc<dyn LinkKind>,
        fault: FaultConfig,
        duty_cycle: DutyCycleConfig,
    ) -> Arc<Self> {
        let scheduler = SchedulerState::new(&duty_cycle);
        let link = Arc::new(Self {
            id,
            channel_gid,
            link_type,
            host,
            kind,
            fault,
            duty_cycle,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            scheduler: Mutex::new(scheduler),
            connections: Mutex::new(HashMap::new()),
            send_task: Mutex::new(None),
            receiving: AtomicBool::new(false),
        });
        if link_type.has_send() {
            let spawned = tokio::spawn(Self::run_send_loop(link.clone()));
            // `try_lock` is safe here: nothing else has a handle to `link` yet.
            *link.send_task.try_lock().expect("fresh link has no contenders") = Some(spawned);
        }
        link
    }

    pub fn id(&self) -> &LinkId {
        &self.id
    }

    pub fn channel_gid(&self) -> &ChannelGid {
        &self.channel_gid
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn link_address(&self) -> String {
        self.kind.link_address()
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.lock().await.keys().cloned().collect()
    }

    /// Enqueue a package for send. Mirrors the scheduler's enqueue contract: reject on
    /// overflow, fail-fast on a package that would already be stale by the time the
    /// link wakes from its current sleep.
    pub async fn enqueue(&self, handle: RaceHandle, pkg: Arc<EncPkg>, timeout_timestamp: f64) -> Result<(), CoreError> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= SEND_QUEUE_MAX_CAPACITY {
            return Err(CoreError::QueueFull { link_id: self.id.clone() });
        }
        let scheduler = self.scheduler.lock().await;
        if scheduler.sleeping && scheduler.next_change > timeout_timestamp {
            drop(scheduler);
            drop(queue);
            self.host
                .on_package_status_changed(handle, PackageStatus::FailedTimeout, 0)
                .await;
            return Ok(());
        }
        drop(scheduler);
        queue.push_back(SendInfo {
            handle,
            pkg,
            timeout_timestamp,
        });
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    pub async fn open_connection(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        requested_type: LinkType,
        hints: String,
        send_timeout_s: i32,
    ) -> Result<Connection, CoreError> {
        if !self.link_type.accepts(requested_type) {
            return Err(CoreError::RoleViolation {
                channel_gid: self.channel_gid.clone(),
                side: crate::ids::LinkSide::Undefined,
                operation: "openConnection",
            });
        }
        let connection = Connection::new(connection_id.clone(), requested_type, self, hints, send_timeout_s);
        let needs_receive = requested_type.has_receive();
        {
            let mut conns = self.connections.lock().await;
            conns.insert(connection_id, connection.clone());
        }
        if needs_receive && !self.receiving.swap(true, Ordering::SeqCst) {
            let kind = self.kind.clone();
            kind.start_receive(self.clone()).await;
        }
        Ok(connection)
    }

    pub async fn close_connection(&self, connection_id: &ConnectionId) -> Result<(), CoreError> {
        let mut conns = self.connections.lock().await;
        let removed = conns
            .remove(connection_id)
            .ok_or_else(|| CoreError::MissingConnection {
                connection_id: connection_id.clone(),
            })?;
        let any_receive_left = conns.values().any(|c| c.link_type().has_receive());
        drop(conns);
        if removed.link_type().has_receive() && !any_receive_left {
            self.receiving.store(false, Ordering::SeqCst);
            self.kind.stop_receive().await;
        }
        Ok(())
    }

    /// Feed an inbound raw package through drop/corrupt injection before handing it to
    /// the host. Called by a [`LinkKind`]'s receive routine.
    pub async fn deliver_received(&self, mut pkg: EncPkg) {
        if fault::roll_drop(self.fault.receive_drop_rate) {
            trace!(link = %self.id, "dropped inbound package per fault injection");
            return;
        }
        if fault::maybe_corrupt(
            pkg.cipher_text_mut(),
            self.fault.receive_corrupt_rate,
            self.fault.receive_corrupt_amount,
        ) {
            debug!(link = %self.id, cipher = %pkg.cipher_text_for_display(self.fault.trace_corrupt_size_limit), "corrupted inbound package per fault injection");
        }
        let connection_ids = self.connection_ids().await;
        self.host.receive_enc_pkg(&pkg, &connection_ids, 0).await;
    }

    pub async fn shutdown(self: &Arc<Self>) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        if let Some(task) = self.send_task.lock().await.take() {
            let _ = task.await;
        }
        self.kind.stop_receive().await;

        let mut queue = self.queue.lock().await;
        for entry in queue.drain(..) {
            self.host
                .on_package_status_changed(entry.handle, PackageStatus::FailedGeneric, 0)
                .await;
        }
        drop(queue);

        self.host
            .on_link_status_changed(RaceHandle::NULL, &self.id, LinkStatus::Destroyed, None, 0)
            .await;

        let mut conns = self.connections.lock().await;
        for (connection_id, _) in conns.drain() {
            self.host
                .on_connection_status_changed(RaceHandle::NULL, &connection_id, ConnectionStatus::Closed, None, 0)
                .await;
        }
    }

    async fn run_send_loop(link: Arc<Link>) {
        loop {
            if link.shutdown.load(Ordering::SeqCst) {
                return;
            }

            let now = now_s();
            let (should_sleep, should_wake, should_send, wait_until) = {
                let scheduler = link.scheduler.lock().await;
                let queue = link.queue.lock().await;
                let should_sleep = scheduler.should_sleep(&link.duty_cycle, now);
                let should_wake = scheduler.should_wake(now);
                let should_send = !scheduler.sleeping && !queue.is_empty();
                (should_sleep, should_wake, should_send, scheduler.next_change)
            };

            if should_sleep {
                link.enter_sleep(now).await;
                continue;
            }
            if should_wake {
                link.enter_wake().await;
                continue;
            }
            if should_send {
                link.send_one().await;
                continue;
            }

            if wait_until.is_finite() {
                let delay = (wait_until - now_s()).max(0.0);
                tokio::select! {
                    _ = link.notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
                }
            } else {
                link.notify.notified().await;
            }
        }
    }

    async fn enter_sleep(&self, now: f64) {
        let mut scheduler = self.scheduler.lock().await;
        let mut conns = self.connections.lock().await;
        for conn in conns.values_mut() {
            if let Some(timeout_s) = conn.send_timeout_s() {
                if timeout_s < self.duty_cycle.sleep_period_length_s {
                    conn.set_status(ConnectionStatus::Unavailable);
                }
            }
        }
        drop(conns);

        let mut queue = self.queue.lock().await;
        let next_change = now + self.duty_cycle.sleep_period_length_s;
        let mut timed_out = Vec::new();
        queue.retain(|entry| {
            if entry.timeout_timestamp < next_change {
                timed_out.push(entry.handle);
                false
            } else {
                true
            }
        });
        drop(queue);

        scheduler.sleeping = true;
        scheduler.next_change = next_change;
        drop(scheduler);

        for handle in timed_out {
            self.host
                .on_package_status_changed(handle, PackageStatus::FailedTimeout, 0)
                .await;
        }
    }

    async fn enter_wake(&self) {
        let mut scheduler = self.scheduler.lock().await;
        let mut conns = self.connections.lock().await;
        for (id, conn) in conns.iter_mut() {
            if conn.status() == ConnectionStatus::Unavailable {
                conn.set_status(ConnectionStatus::Available);
                self.host
                    .on_connection_status_changed(RaceHandle::NULL, id, ConnectionStatus::Available, None, 0)
                    .await;
            }
        }
        drop(conns);

        scheduler.sleeping = false;
        scheduler.next_change = if self.duty_cycle.send_period_length_s > 0.0 {
            now_s() + self.duty_cycle.send_period_length_s
        } else {
            f64::INFINITY
        };
        scheduler.next_sleep_amount = self.duty_cycle.send_period_amount as i64;
    }

    async fn send_one(&self) {
        let entry = {
            let mut queue = self.queue.lock().await;
            match queue.pop_front() {
                Some(e) => e,
                None => return,
            }
        };
        {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.next_sleep_amount -= 1;
        }

        for connection_id in self.connection_ids().await {
            self.host.unblock_queue(&connection_id).await;
        }

        if fault::roll_drop(self.fault.send_drop_rate) {
            debug!(link = %self.id, "dropped outbound package per fault injection");
            self.host
                .on_package_status_changed(entry.handle, PackageStatus::FailedGeneric, 0)
                .await;
            return;
        }

        let mut pkg = (*entry.pkg).clone();
        if fault::maybe_corrupt(
            pkg.cipher_text_mut(),
            self.fault.send_corrupt_rate,
            self.fault.send_corrupt_amount,
        ) {
            debug!(link = %self.id, cipher = %pkg.cipher_text_for_display(self.fault.trace_corrupt_size_limit), "corrupted outbound package per fault injection");
        }

        match self.kind.send_internal(&pkg).await {
            Ok(()) => {
                self.host
                    .on_package_status_changed(entry.handle, PackageStatus::Sent, 0)
                    .await;
            }
            Err(CoreError::TransportFatal { .. }) => {
                self.host
                    .on_package_status_changed(entry.handle, PackageStatus::FailedGeneric, 0)
                    .await;
                self.shutdown.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(link = %self.id, error = %err, "package send failed");
                self.host
                    .on_package_status_changed(entry.handle, PackageStatus::FailedGeneric, 0)
                    .await;
            }
        }
    }
}

/// Test-only constructors shared by unit tests in this module and in
/// [`crate::connection`], which needs an `Arc<Link>` to exercise the weak
/// back-reference without depending on a real transport.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::host::test_support::NullHost;

    struct NoopKind(String);

    #[async_trait]
    impl LinkKind for NoopKind {
        async fn send_internal(&self, _pkg: &EncPkg) -> Result<(), CoreError> {
            Ok(())
        }
        async fn start_receive(self: Arc<Self>, _link: Arc<Link>) {}
        async fn stop_receive(&self) {}
        fn link_address(&self) -> String {
            self.0.clone()
        }
    }

    pub fn direct_test_link(id: &str, link_type: LinkType) -> Arc<Link> {
        Link::new(
            id.to_string(),
            "directNetworking".to_string(),
            link_type,
            Arc::new(NullHost),
            Arc::new(NoopKind(format!("{{\"hostname\":\"127.0.0.1\",\"port\":0}}"))),
            FaultConfig::default(),
            DutyCycleConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::NullHost;
    use crate::ids::PackageType;
    use test_support::direct_test_link;

    #[tokio::test]
    async fn enqueue_rejects_past_capacity() {
        let link = direct_test_link("link-cap", LinkType::Send);
        // Pause the send loop by shutting it down immediately so the queue doesn't drain.
        link.shutdown.store(true, Ordering::SeqCst);
        for i in 0..SEND_QUEUE_MAX_CAPACITY {
            let pkg = Arc::new(EncPkg::new(i as u64, 0, PackageType::Sdk, vec![]));
            link.enqueue(RaceHandle(i as u64), pkg, f64::INFINITY).await.unwrap();
        }
        let pkg = Arc::new(EncPkg::new(99, 0, PackageType::Sdk, vec![]));
        let err = link.enqueue(RaceHandle(99), pkg, f64::INFINITY).await.unwrap_err();
        assert!(matches!(err, CoreError::QueueFull { .. }));
    }

    #[tokio::test]
    async fn open_connection_rejects_incompatible_type() {
        let link = direct_test_link("link-type", LinkType::Send);
        let err = link
            .open_connection("c1".to_string(), LinkType::Receive, String::new(), crate::ids::RACE_UNLIMITED)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RoleViolation { .. }));
    }

    #[tokio::test]
    async fn close_unknown_connection_is_missing_connection() {
        let link = direct_test_link("link-missing", LinkType::Bidirectional);
        let err = link.close_connection(&"nope".to_string()).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingConnection { .. }));
    }

    #[tokio::test]
    async fn shutdown_fails_remaining_queued_packages() {
        let link = direct_test_link("link-shutdown", LinkType::Send);
        let pkg = Arc::new(EncPkg::new(1, 0, PackageType::Sdk, vec![1, 2, 3]));
        link.enqueue(RaceHandle(1), pkg, f64::INFINITY).await.unwrap();
        // Give the send loop a moment to potentially drain (it may or may not beat shutdown).
        link.shutdown().await;
        let _ = NullHost;
    }
}
