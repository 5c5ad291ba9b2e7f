//! The host SDK surface the core calls outward on. Everything the host owns —
//! persona lookup, file storage, id generation, status callbacks — is modeled as one
//! async trait so `CommsCore`, `Channel`, and `Link` can all be exercised against an
//! in-memory fake in tests without a real SDK process on the other end.

use crate::channel_properties::ChannelProperties;
use crate::enc_pkg::EncPkg;
use crate::ids::{
    ChannelGid, ChannelStatus, ConnectionId, ConnectionStatus, LinkId, LinkStatus, PackageStatus,
    RaceHandle,
};
use crate::link_properties::LinkProperties;
use async_trait::async_trait;
use std::io;

/// Outbound operations the core invokes on the hosting SDK.
///
/// Implementors must never be called while the core holds an internal lock — see
/// the concurrency notes on [`crate::comms_core::CommsCore`] and [`crate::link::Link`].
#[async_trait]
pub trait HostHandle: Send + Sync {
    async fn generate_link_id(&self, channel_gid: &ChannelGid) -> LinkId;
    async fn generate_connection_id(&self, link_id: &LinkId) -> ConnectionId;
    async fn get_active_persona(&self) -> String;
    async fn get_channel_properties(&self, channel_gid: &ChannelGid) -> Option<ChannelProperties>;

    async fn update_link_properties(
        &self,
        link_id: &LinkId,
        properties: &LinkProperties,
        timeout_ms: i32,
    );

    async fn on_link_status_changed(
        &self,
        handle: RaceHandle,
        link_id: &LinkId,
        status: LinkStatus,
        properties: Option<&LinkProperties>,
        timeout_ms: i32,
    );

    async fn on_connection_status_changed(
        &self,
        handle: RaceHandle,
        connection_id: &ConnectionId,
        status: ConnectionStatus,
        properties: Option<&LinkProperties>,
        timeout_ms: i32,
    );

    async fn on_channel_status_changed(
        &self,
        handle: RaceHandle,
        channel_gid: &ChannelGid,
        status: ChannelStatus,
        properties: Option<&ChannelProperties>,
        timeout_ms: i32,
    );

    async fn on_package_status_changed(&self, handle: RaceHandle, status: PackageStatus, timeout_ms: i32);

    async fn receive_enc_pkg(&self, pkg: &EncPkg, connection_ids: &[ConnectionId], timeout_ms: i32);

    async fn unblock_queue(&self, connection_id: &ConnectionId);

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    async fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()>;
    async fn append_file(&self, path: &str, contents: &[u8]) -> io::Result<()>;
    async fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;
    async fn make_dir(&self, path: &str) -> io::Result<()>;
}

/// A `HostHandle` that does nothing, for exercising `Link`/`Channel` logic in
/// isolation from a real host SDK.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;

    pub struct NullHost;

    #[async_trait]
    impl HostHandle for NullHost {
        async fn generate_link_id(&self, channel_gid: &ChannelGid) -> LinkId {
            format!("{channel_gid}/link")
        }
        async fn generate_connection_id(&self, link_id: &LinkId) -> ConnectionId {
            format!("{link_id}/conn")
        }
        async fn get_active_persona(&self) -> String {
            "test-persona".to_string()
        }
        async fn get_channel_properties(&self, _channel_gid: &ChannelGid) -> Option<ChannelProperties> {
            None
        }
        async fn update_link_properties(&self, _link_id: &LinkId, _properties: &LinkProperties, _timeout_ms: i32) {}
        async fn on_link_status_changed(
            &self,
            _handle: RaceHandle,
            _link_id: &LinkId,
            _status: LinkStatus,
            _properties: Option<&LinkProperties>,
            _timeout_ms: i32,
        ) {
        }
        async fn on_connection_status_changed(
            &self,
            _handle: RaceHandle,
            _connection_id: &ConnectionId,
            _status: ConnectionStatus,
            _properties: Option<&LinkProperties>,
            _timeout_ms: i32,
        ) {
        }
        async fn on_channel_status_changed(
            &self,
            _handle: RaceHandle,
            _channel_gid: &ChannelGid,
            _status: ChannelStatus,
            _properties: Option<&ChannelProperties>,
            _timeout_ms: i32,
        ) {
        }
        async fn on_package_status_changed(&self, _handle: RaceHandle, _status: PackageStatus, _timeout_ms: i32) {}
        async fn receive_enc_pkg(&self, _pkg: &EncPkg, _connection_ids: &[ConnectionId], _timeout_ms: i32) {}
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
}
