//! End-to-end exercise of the public `CommsCore` façade against the direct TCP
//! channel: activate, create a link, open bidirectional connections on both ends,
//! send a package, and see it delivered.

use overlay_comms_core::channel_properties::ChannelProperties;
use overlay_comms_core::comms_core::CommsCore;
use overlay_comms_core::enc_pkg::EncPkg;
use overlay_comms_core::host::HostHandle;
use overlay_comms_core::ids::{
    ChannelGid, ConnectionId, LinkId, LinkType, PackageType, PluginResponse, RaceHandle,
    RACE_UNLIMITED,
};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct RecordingHost {
    received: Mutex<Vec<EncPkg>>,
    notify: Notify,
    next: std::sync::atomic::AtomicU64,
}

impl RecordingHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            received: Mutex::new(Vec::new()),
            notify: Notify::new(),
            next: std::sync::atomic::AtomicU64::new(0),
        })
    }
}

#[async_trait::async_trait]
impl HostHandle for RecordingHost {
    async fn generate_link_id(&self, channel_gid: &ChannelGid) -> LinkId {
        let n = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("{channel_gid}/link-{n}")
    }
    async fn generate_connection_id(&self, link_id: &LinkId) -> ConnectionId {
        format!("{link_id}/conn")
    }
    async fn get_active_persona(&self) -> String {
        "it".to_string()
    }
    async fn get_channel_properties(&self, _channel_gid: &ChannelGid) -> Option<ChannelProperties> {
        None
    }
    async fn update_link_properties(&self, _link_id: &LinkId, _properties: &overlay_comms_core::link_properties::LinkProperties, _timeout_ms: i32) {}
    async fn on_link_status_changed(
        &self,
        _handle: RaceHandle,
        _link_id: &LinkId,
        _status: overlay_comms_core::ids::LinkStatus,
        _properties: Option<&overlay_comms_core::link_properties::LinkProperties>,
        _timeout_ms: i32,
    ) {
    }
    async fn on_connection_status_changed(
        &self,
        _handle: RaceHandle,
        _connection_id: &ConnectionId,
        _status: overlay_comms_core::ids::ConnectionStatus,
        _properties: Option<&overlay_comms_core::link_properties::LinkProperties>,
        _timeout_ms: i32,
    ) {
    }
    async fn on_channel_status_changed(
        &self,
        _handle: RaceHandle,
        _channel_gid: &ChannelGid,
        _status: overlay_comms_core::ids::ChannelStatus,
        _properties: Option<&ChannelProperties>,
        _timeout_ms: i32,
    ) {
    }
    async fn on_package_status_changed(&self, _handle: RaceHandle, _status: overlay_comms_core::ids::PackageStatus, _timeout_ms: i32) {}
    async fn receive_enc_pkg(&self, pkg: &EncPkg, _connection_ids: &[ConnectionId], _timeout_ms: i32) {
        self.received.lock().unwrap().push(pkg.clone());
        self.notify.notify_one();
    }
    async fn unblock_queue(&self, _connection_id: &ConnectionId) {}
    async fn read_file(&self, _path: &str) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }
    async fn write_file(&self, _path: &str, _contents: &[u8]) -> io::Result<()> {
        Ok(())
    }
    async fn append_file(&self, _path: &str, _contents: &[u8]) -> io::Result<()> {
        Ok(())
    }
    async fn list_dir(&self, _path: &str) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn make_dir(&self, _path: &str) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn package_sent_on_one_link_is_received_on_the_peer() {
    let host = RecordingHost::new();
    let core = CommsCore::new(host.clone());

    core.register_direct_channel("directNetworking".to_string(), "127.0.0.1".to_string(), 29500, 29600)
        .await
        .unwrap();
    let activate = core.activate_channel(RaceHandle(1), &"directNetworking".to_string(), "default").await;
    assert_eq!(activate, PluginResponse::Ok);

    // The receiving link allocates the channel's first port from its own pool.
    let create_a = core.create_link(RaceHandle(2), &"directNetworking".to_string()).await;
    assert_eq!(create_a, PluginResponse::Ok);
    let link_a = "directNetworking/link-0".to_string();

    core.open_connection(&link_a, "conn-a".to_string(), LinkType::Receive, String::new(), RACE_UNLIMITED)
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The sending link is addressed explicitly at the receiver's port instead of
    // allocating its own, since this test plays both peers.
    let address = r#"{"hostname":"127.0.0.1","port":29500}"#.to_string();
    let create_from_address = core
        .create_link_from_address(RaceHandle(4), &"directNetworking".to_string(), &address)
        .await;
    assert_eq!(create_from_address, PluginResponse::Ok);
    let link_c = "directNetworking/link-1".to_string();

    core.open_connection(&link_c, "conn-c".to_string(), LinkType::Send, String::new(), RACE_UNLIMITED)
        .await;

    let pkg = EncPkg::new(7, 8, PackageType::TestHarness, vec![9, 9, 9]);
    let send_response = core.send_package(RaceHandle(5), &link_c, pkg.clone(), f64::INFINITY).await;
    assert_eq!(send_response, PluginResponse::Ok);

    tokio::select! {
        _ = host.notify.notified() => {}
        _ = tokio::time::sleep(std::time::Duration::from_secs(2)) => panic!("package was not delivered in time"),
    }

    let received = host.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].cipher_text(), pkg.cipher_text());

    drop(received);
    core.shutdown().await;
}
