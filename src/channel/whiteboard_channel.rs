//! Multicast, indirect channel backed by an external HTTP bulletin board.

use crate::channel::ChannelKind;
use crate::channel_properties::ChannelRole;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::{ChannelGid, LinkId, LinkSide, LinkType};
use crate::link::whiteboard::WhiteboardLink;
use crate::link::LinkKind;
use crate::link_address::LinkAddress;
use async_trait::async_trait;
use std::sync::Arc;

pub struct WhiteboardChannel {
    channel_gid: ChannelGid,
    host: Arc<dyn HostHandle>,
    default_polling_period_ms: u64,
    default_max_tries: u32,
}

impl WhiteboardChannel {
    pub fn new(
        channel_gid: ChannelGid,
        host: Arc<dyn HostHandle>,
        default_polling_period_ms: u64,
        default_max_tries: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel_gid,
            host,
            default_polling_period_ms,
            default_max_tries,
        })
    }
}

#[async_trait]
impl ChannelKind for WhiteboardChannel {
    async fn activate(&self, _role_name: &str) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deactivate(&self) {}

    async fn create_link(&self, _link_id: &LinkId) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        Err(CoreError::InvalidAddress {
            channel_gid: self.channel_gid.clone(),
            reason: "whiteboard links require an explicit address (hostname/port/hashtag)".to_string(),
        })
    }

    async fn create_link_from_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        self.load_link_address(link_id, address).await
    }

    async fn load_link_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let parsed = LinkAddress::parse_whiteboard(&self.channel_gid, address)?;
        let LinkAddress::Whiteboard(addr) = parsed else {
            unreachable!("parse_whiteboard always returns LinkAddress::Whiteboard");
        };
        // `WhiteboardAddress` already fills in the original protocol's own defaults
        // (1000ms/120 tries) for a field the peer left out entirely; an address that
        // explicitly sends `0` is asking this side to use its own configured default
        // instead, which is a separate knob from "the peer said nothing at all".
        let polling_period_ms = if addr.check_frequency_ms > 0 {
            addr.check_frequency_ms
        } else {
            self.default_polling_period_ms
        };
        let max_tries = if addr.max_tries > 0 { addr.max_tries } else { self.default_max_tries };
        Ok((
            WhiteboardLink::new(
                link_id.clone(),
                self.host.clone(),
                addr.hostname,
                addr.port,
                addr.hashtag,
                addr.timestamp,
                polling_period_ms,
                max_tries,
            ),
            LinkType::Bidirectional,
        ))
    }

    async fn create_bootstrap_link(&self, _link_id: &LinkId, _passphrase: &str) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        Err(CoreError::RoleViolation {
            channel_gid: self.channel_gid.clone(),
            side: LinkSide::Undefined,
            operation: "createBootstrapLink",
        })
    }

    fn multi_addressable(&self) -> bool {
        true
    }

    fn max_links(&self) -> usize {
        usize::MAX
    }

    fn roles(&self) -> Vec<ChannelRole> {
        vec![ChannelRole {
            name: "default".to_string(),
            mechanical_tags: vec!["whiteboard".to_string()],
            behavioral_tags: vec![],
            link_side: LinkSide::Loader,
        }]
    }
}
