//! Inbound-facing façade. Every operation the host SDK invokes on the plugin funnels
//! through one of these methods; this is the single place a [`CoreError`] is mapped
//! onto the [`PluginResponse`] the host actually sees.
//!
//! Grounded on the teacher's benchmark orchestrator (`examples/redhat-performance-rusty-comms/src/lib.rs`)
//! for the shape of a top-level façade owning a registry of workers behind separate
//! locks; generalized here to channels and links, which is why two `RwLock`-guarded
//! maps exist side by side instead of one.

use crate::channel::bootstrap_file_channel::BootstrapFileChannel;
use crate::channel::direct_channel::DirectChannel;
use crate::channel::whiteboard_channel::WhiteboardChannel;
use crate::channel::{Channel, ChannelKind};
use crate::enc_pkg::EncPkg;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::{ChannelGid, ConnectionId, LinkId, LinkType, PluginResponse, RaceHandle};
use crate::link::Link;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Owns the channel and link tables behind independent locks so that, say, iterating
/// channels for `deactivateChannel` never blocks a concurrent `sendPackage` looking up
/// an unrelated link. Connections live inside their owning [`Link`], one lock deeper
/// still, for the same reason.
pub struct CommsCore {
    host: Arc<dyn HostHandle>,
    channels: RwLock<HashMap<ChannelGid, Arc<Channel>>>,
    links: RwLock<HashMap<LinkId, Arc<Link>>>,
}

impl CommsCore {
    pub fn new(host: Arc<dyn HostHandle>) -> Arc<Self> {
        Arc::new(Self {
            host,
            channels: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
        })
    }

    /// Register the built-in channel kinds. A real host would drive this from plugin
    /// manifests; the demo harness calls it directly with fixed parameters.
    pub async fn register_direct_channel(&self, channel_gid: ChannelGid, hostname: String, port_min: u16, port_max: u16) -> Result<(), CoreError> {
        let kind = DirectChannel::new(channel_gid.clone(), hostname, port_min, port_max)?;
        self.register(channel_gid, kind).await;
        Ok(())
    }

    pub async fn register_whiteboard_channel(
        &self,
        channel_gid: ChannelGid,
        default_polling_period_ms: u64,
        default_max_tries: u32,
    ) {
        let kind = WhiteboardChannel::new(channel_gid.clone(), self.host.clone(), default_polling_period_ms, default_max_tries);
        self.register(channel_gid, kind).await;
    }

    pub async fn register_bootstrap_file_channel(&self, channel_gid: ChannelGid, aux_data_directory: String) {
        let kind = BootstrapFileChannel::new(channel_gid.clone(), self.host.clone(), aux_data_directory);
        self.register(channel_gid, kind).await;
    }

    async fn register(&self, channel_gid: ChannelGid, kind: Arc<dyn ChannelKind>) {
        let channel = Channel::new(channel_gid.clone(), kind, self.host.clone());
        self.channels.write().await.insert(channel_gid, channel);
    }

    async fn channel(&self, channel_gid: &ChannelGid) -> Result<Arc<Channel>, CoreError> {
        self.channels
            .read()
            .await
            .get(channel_gid)
            .cloned()
            .ok_or_else(|| CoreError::ChannelUnavailable {
                channel_gid: channel_gid.clone(),
            })
    }

    async fn link(&self, link_id: &LinkId) -> Result<Arc<Link>, CoreError> {
        self.links
            .read()
            .await
            .get(link_id)
            .cloned()
            .ok_or_else(|| CoreError::TransportFatal {
                link_id: link_id.clone(),
                reason: "no such link".to_string(),
            })
    }

    async fn insert_link(
        &self,
        channel_gid: &ChannelGid,
        link_id: LinkId,
        link_kind: Arc<dyn crate::link::LinkKind>,
        link_type: LinkType,
    ) -> LinkId {
        let link = Link::new(
            link_id.clone(),
            channel_gid.clone(),
            link_type,
            self.host.clone(),
            link_kind,
            crate::link::fault::FaultConfig::default(),
            crate::link::DutyCycleConfig::default(),
        );
        self.links.write().await.insert(link_id.clone(), link);
        link_id
    }

    pub async fn activate_channel(&self, handle: RaceHandle, channel_gid: &ChannelGid, role_name: &str) -> PluginResponse {
        match self.channel(channel_gid).await {
            Ok(channel) => {
                channel.activate(handle, role_name).await;
                PluginResponse::Ok
            }
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn deactivate_channel(&self, handle: RaceHandle, channel_gid: &ChannelGid) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        let owned: Vec<LinkId> = self
            .links
            .read()
            .await
            .values()
            .filter(|link| link.channel_gid() == channel_gid)
            .map(|link| link.id().clone())
            .collect();
        for link_id in owned {
            self.destroy_link(&link_id).await;
        }
        channel.deactivate(handle).await;
        PluginResponse::Ok
    }

    pub async fn create_link(&self, handle: RaceHandle, channel_gid: &ChannelGid) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        match channel.create_link(handle).await {
            Ok((link_id, link_kind, link_type)) => {
                self.insert_link(channel_gid, link_id, link_kind, link_type).await;
                PluginResponse::Ok
            }
            Err(e) => {
                warn!(channel = %channel_gid, error = %e, "createLink failed");
                e.plugin_response()
            }
        }
    }

    pub async fn create_link_from_address(&self, handle: RaceHandle, channel_gid: &ChannelGid, address: &str) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        match channel.create_link_from_address(handle, address).await {
            Ok((link_id, link_kind, link_type)) => {
                self.insert_link(channel_gid, link_id, link_kind, link_type).await;
                PluginResponse::Ok
            }
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn load_link_address(&self, handle: RaceHandle, channel_gid: &ChannelGid, address: &str) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        match channel.load_link_address(handle, address).await {
            Ok((link_id, link_kind, link_type)) => {
                self.insert_link(channel_gid, link_id, link_kind, link_type).await;
                PluginResponse::Ok
            }
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn load_link_addresses(&self, handle: RaceHandle, channel_gid: &ChannelGid, addresses: &[String]) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        match channel.load_link_addresses(handle, addresses).await {
            Ok(created) => {
                for (link_id, link_kind, link_type) in created {
                    self.insert_link(channel_gid, link_id, link_kind, link_type).await;
                }
                PluginResponse::Ok
            }
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn create_bootstrap_link(&self, handle: RaceHandle, channel_gid: &ChannelGid, passphrase: &str) -> PluginResponse {
        let channel = match self.channel(channel_gid).await {
            Ok(c) => c,
            Err(e) => return e.plugin_response(),
        };
        match channel.create_bootstrap_link(handle, passphrase).await {
            Ok((link_id, link_kind, link_type)) => {
                self.insert_link(channel_gid, link_id, link_kind, link_type).await;
                PluginResponse::Ok
            }
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn destroy_link(&self, link_id: &LinkId) -> PluginResponse {
        let Some(link) = self.links.write().await.remove(link_id) else {
            // Destroying an already-destroyed link is a benign race, not an error.
            return PluginResponse::Ok;
        };
        let channel_gid = link.channel_gid().clone();
        link.shutdown().await;
        if let Ok(channel) = self.channel(&channel_gid).await {
            channel.on_link_destroyed(link_id);
        }
        PluginResponse::Ok
    }

    pub async fn open_connection(
        &self,
        link_id: &LinkId,
        connection_id: ConnectionId,
        requested_type: LinkType,
        hints: String,
        send_timeout_s: i32,
    ) -> PluginResponse {
        let link = match self.link(link_id).await {
            Ok(l) => l,
            Err(e) => return e.plugin_response(),
        };
        match link.open_connection(connection_id, requested_type, hints, send_timeout_s).await {
            Ok(_) => PluginResponse::Ok,
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn close_connection(&self, link_id: &LinkId, connection_id: &ConnectionId) -> PluginResponse {
        let link = match self.link(link_id).await {
            Ok(l) => l,
            Err(e) => return e.plugin_response(),
        };
        match link.close_connection(connection_id).await {
            Ok(()) => PluginResponse::Ok,
            Err(e) => e.plugin_response(),
        }
    }

    pub async fn send_package(&self, handle: RaceHandle, link_id: &LinkId, pkg: EncPkg, timeout_timestamp: f64) -> PluginResponse {
        let link = match self.link(link_id).await {
            Ok(l) => l,
            Err(e) => return e.plugin_response(),
        };
        match link.enqueue(handle, Arc::new(pkg), timeout_timestamp).await {
            Ok(()) => PluginResponse::Ok,
            Err(e) => e.plugin_response(),
        }
    }

    /// `flushChannel` has no queued-batch semantics in this design (every link
    /// schedules its own sends); it is accepted and acknowledged so hosts that always
    /// call it don't see a spurious failure.
    pub async fn flush_channel(&self, channel_gid: &ChannelGid) -> PluginResponse {
        match self.channel(channel_gid).await {
            Ok(_) => PluginResponse::Ok,
            Err(e) => e.plugin_response(),
        }
    }

    /// Lists `path`'s contents through the host filesystem, unbundled — no archive is
    /// built (see the bootstrap-artifact-packaging non-goal).
    pub async fn serve_files(&self, link_id: &LinkId, path: &str) -> PluginResponse {
        if let Err(e) = self.link(link_id).await {
            return e.plugin_response();
        }
        match self.host.list_dir(path).await {
            Ok(files) => {
                info!(link = %link_id, path, count = files.len(), "serveFiles listed directory");
                PluginResponse::Ok
            }
            Err(e) => CoreError::Io(e).plugin_response(),
        }
    }

    pub async fn shutdown(&self) {
        let links: Vec<Arc<Link>> = self.links.write().await.drain().map(|(_, l)| l).collect();
        for link in links {
            link.shutdown().await;
        }
    }
}
