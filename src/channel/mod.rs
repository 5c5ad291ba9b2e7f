//! Channel lifecycle: activation, link-count bookkeeping, role validation, and the
//! create/load/bootstrap gate every concrete channel kind funnels through.

pub mod bootstrap_file_channel;
pub mod direct_channel;
pub mod whiteboard_channel;

use crate::channel_properties::{ChannelProperties, ChannelRole};
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::{ChannelGid, ChannelStatus, LinkId, LinkSide, LinkStatus, LinkType, RaceHandle};
use crate::link::LinkKind;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which side of a create/load operation the active role must NOT be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateOp {
    Create,
    Load,
    Bootstrap,
}

impl GateOp {
    fn invalid_side(self) -> LinkSide {
        match self {
            GateOp::Create => LinkSide::Loader,
            GateOp::Load => LinkSide::Creator,
            GateOp::Bootstrap => LinkSide::Undefined,
        }
    }

    fn name(self) -> &'static str {
        match self {
            GateOp::Create => "createLink",
            GateOp::Load => "loadLinkAddress",
            GateOp::Bootstrap => "createBootstrapLink",
        }
    }
}

/// Per-kind factory the generic [`Channel`] dispatches create/load/bootstrap calls to.
#[async_trait]
pub trait ChannelKind: Send + Sync {
    async fn activate(&self, role_name: &str) -> Result<(), CoreError>;
    async fn deactivate(&self);

    async fn create_link(&self, link_id: &LinkId) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError>;
    async fn create_link_from_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError>;
    async fn load_link_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError>;
    async fn create_bootstrap_link(
        &self,
        link_id: &LinkId,
        passphrase: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError>;

    fn multi_addressable(&self) -> bool;
    fn max_links(&self) -> usize;
    fn roles(&self) -> Vec<ChannelRole>;

    /// Release whatever per-link resource a kind tracked outside the link itself (a
    /// direct channel's allocated port, say). Most kinds have nothing to release.
    fn release_link(&self, _link_id: &LinkId) {}
}

pub struct Channel {
    channel_gid: ChannelGid,
    kind: Arc<dyn ChannelKind>,
    host: Arc<dyn HostHandle>,
    status: RwLock<ChannelStatus>,
    current_role: RwLock<Option<String>>,
    num_links: AtomicUsize,
}

impl Channel {
    pub fn new(channel_gid: ChannelGid, kind: Arc<dyn ChannelKind>, host: Arc<dyn HostHandle>) -> Arc<Self> {
        Arc::new(Self {
            channel_gid,
            kind,
            host,
            status: RwLock::new(ChannelStatus::Unavailable),
            current_role: RwLock::new(None),
            num_links: AtomicUsize::new(0),
        })
    }

    pub fn channel_gid(&self) -> &ChannelGid {
        &self.channel_gid
    }

    pub async fn status(&self) -> ChannelStatus {
        *self.status.read().await
    }

    pub fn num_links(&self) -> usize {
        self.num_links.load(Ordering::SeqCst)
    }

    pub async fn activate(self: &Arc<Self>, handle: RaceHandle, role_name: &str) {
        *self.status.write().await = ChannelStatus::Starting;
        match self.kind.activate(role_name).await {
            Ok(()) => {
                *self.current_role.write().await = Some(role_name.to_string());
                *self.status.write().await = ChannelStatus::Available;
            }
            Err(_) => {
                *self.status.write().await = ChannelStatus::Failed;
            }
        }
        self.host
            .on_channel_status_changed(handle, &self.channel_gid, self.status().await, None, 0)
            .await;
    }

    pub async fn deactivate(self: &Arc<Self>, handle: RaceHandle) {
        self.kind.deactivate().await;
        *self.status.write().await = ChannelStatus::Unavailable;
        self.num_links.store(0, Ordering::SeqCst);
        self.host
            .on_channel_status_changed(handle, &self.channel_gid, ChannelStatus::Unavailable, None, 0)
            .await;
    }

    async fn current_role_side(&self) -> LinkSide {
        let name = self.current_role.read().await.clone();
        let Some(name) = name else {
            return LinkSide::Undefined;
        };
        self.kind
            .roles()
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.link_side)
            .unwrap_or(LinkSide::Undefined)
    }

    async fn gate(&self, op: GateOp) -> Result<(), CoreError> {
        if self.status().await != ChannelStatus::Available {
            return Err(CoreError::ChannelUnavailable {
                channel_gid: self.channel_gid.clone(),
            });
        }
        if self.num_links() >= self.kind.max_links() {
            return Err(CoreError::LinkCountExceeded {
                channel_gid: self.channel_gid.clone(),
                max_links: self.kind.max_links(),
            });
        }
        let side = self.current_role_side().await;
        if side == LinkSide::Undefined || side == op.invalid_side() {
            return Err(CoreError::RoleViolation {
                channel_gid: self.channel_gid.clone(),
                side,
                operation: op.name(),
            });
        }
        Ok(())
    }

    async fn finish(&self, handle: RaceHandle, link_id: &LinkId, status: LinkStatus, ok: bool) {
        if ok {
            self.num_links.fetch_add(1, Ordering::SeqCst);
        }
        self.host
            .on_link_status_changed(handle, link_id, status, None, 0)
            .await;
    }

    pub async fn create_link(self: &Arc<Self>, handle: RaceHandle) -> Result<(LinkId, Arc<dyn LinkKind>, LinkType), CoreError> {
        let link_id = self.host.generate_link_id(&self.channel_gid).await;
        if let Err(e) = self.gate(GateOp::Create).await {
            self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
            return Err(e);
        }
        match self.kind.create_link(&link_id).await {
            Ok((link_kind, link_type)) => {
                self.finish(handle, &link_id, LinkStatus::Created, true).await;
                Ok((link_id, link_kind, link_type))
            }
            Err(e) => {
                self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
                Err(e)
            }
        }
    }

    pub async fn create_link_from_address(
        self: &Arc<Self>,
        handle: RaceHandle,
        address: &str,
    ) -> Result<(LinkId, Arc<dyn LinkKind>, LinkType), CoreError> {
        let link_id = self.host.generate_link_id(&self.channel_gid).await;
        if let Err(e) = self.gate(GateOp::Create).await {
            self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
            return Err(e);
        }
        match self.kind.create_link_from_address(&link_id, address).await {
            Ok((link_kind, link_type)) => {
                self.finish(handle, &link_id, LinkStatus::Created, true).await;
                Ok((link_id, link_kind, link_type))
            }
            Err(e) => {
                self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
                Err(e)
            }
        }
    }

    pub async fn load_link_address(
        self: &Arc<Self>,
        handle: RaceHandle,
        address: &str,
    ) -> Result<(LinkId, Arc<dyn LinkKind>, LinkType), CoreError> {
        let link_id = self.host.generate_link_id(&self.channel_gid).await;
        if let Err(e) = self.gate(GateOp::Load).await {
            self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
            return Err(e);
        }
        match self.kind.load_link_address(&link_id, address).await {
            Ok((link_kind, link_type)) => {
                self.finish(handle, &link_id, LinkStatus::Loaded, true).await;
                Ok((link_id, link_kind, link_type))
            }
            Err(e) => {
                self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
                Err(e)
            }
        }
    }

    /// Plural form, permitted only when the channel is `multiAddressable`.
    pub async fn load_link_addresses(
        self: &Arc<Self>,
        handle: RaceHandle,
        addresses: &[String],
    ) -> Result<Vec<(LinkId, Arc<dyn LinkKind>, LinkType)>, CoreError> {
        if !self.kind.multi_addressable() {
            let link_id = self.host.generate_link_id(&self.channel_gid).await;
            self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
            return Err(CoreError::RoleViolation {
                channel_gid: self.channel_gid.clone(),
                side: LinkSide::Undefined,
                operation: "loadLinkAddresses",
            });
        }
        let mut results = Vec::with_capacity(addresses.len());
        for address in addresses {
            results.push(self.load_link_address(handle, address).await?);
        }
        Ok(results)
    }

    pub async fn create_bootstrap_link(
        self: &Arc<Self>,
        handle: RaceHandle,
        passphrase: &str,
    ) -> Result<(LinkId, Arc<dyn LinkKind>, LinkType), CoreError> {
        let link_id = self.host.generate_link_id(&self.channel_gid).await;
        if let Err(e) = self.gate(GateOp::Bootstrap).await {
            self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
            return Err(e);
        }
        match self.kind.create_bootstrap_link(&link_id, passphrase).await {
            Ok((link_kind, link_type)) => {
                self.finish(handle, &link_id, LinkStatus::Created, true).await;
                Ok((link_id, link_kind, link_type))
            }
            Err(e) => {
                self.finish(handle, &link_id, LinkStatus::Destroyed, false).await;
                Err(e)
            }
        }
    }

    pub fn on_link_destroyed(&self, link_id: &LinkId) {
        self.num_links.fetch_sub(1, Ordering::SeqCst);
        self.kind.release_link(link_id);
    }
}
