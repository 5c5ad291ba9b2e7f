//! Direct unicast channel: allocates ports for links it creates itself, and parses
//! whatever peer-supplied address it is asked to load.

use crate::channel::ChannelKind;
use crate::channel_properties::ChannelRole;
use crate::error::CoreError;
use crate::ids::{ChannelGid, LinkId, LinkSide, LinkType};
use crate::link::direct::DirectLink;
use crate::link::LinkKind;
use crate::link_address::LinkAddress;
use crate::port_allocator::PortAllocator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct DirectChannel {
    channel_gid: ChannelGid,
    hostname: String,
    ports: PortAllocator,
    /// Ports this channel allocated itself, keyed by link so `release_link` can hand
    /// them back; ports a peer-supplied address merely `mark`ed are not tracked here —
    /// they were never ours to free.
    owned_ports: Mutex<HashMap<LinkId, u16>>,
}

impl DirectChannel {
    pub fn new(channel_gid: ChannelGid, hostname: String, port_min: u16, port_max: u16) -> Result<Arc<Self>, CoreError> {
        let ports = PortAllocator::new(port_min, port_max).map_err(|e| CoreError::InvalidAddress {
            channel_gid: channel_gid.clone(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(Self {
            channel_gid,
            hostname,
            ports,
            owned_ports: Mutex::new(HashMap::new()),
        }))
    }
}

#[async_trait]
impl ChannelKind for DirectChannel {
    async fn activate(&self, _role_name: &str) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deactivate(&self) {}

    async fn create_link(&self, link_id: &LinkId) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let port = self.ports.acquire().map_err(|e| CoreError::TransportFatal {
            link_id: link_id.clone(),
            reason: e.to_string(),
        })?;
        self.owned_ports
            .lock()
            .expect("owned-ports mutex poisoned")
            .insert(link_id.clone(), port);
        Ok((
            DirectLink::new(link_id.clone(), self.hostname.clone(), port),
            LinkType::Bidirectional,
        ))
    }

    async fn create_link_from_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let parsed = LinkAddress::parse_direct(&self.channel_gid, address)?;
        let LinkAddress::Direct(addr) = parsed else {
            unreachable!("parse_direct always returns LinkAddress::Direct");
        };
        self.ports.mark(addr.port);
        Ok((
            DirectLink::new(link_id.clone(), addr.hostname, addr.port),
            LinkType::Bidirectional,
        ))
    }

    async fn load_link_address(
        &self,
        link_id: &LinkId,
        address: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let parsed = LinkAddress::parse_direct(&self.channel_gid, address)?;
        let LinkAddress::Direct(addr) = parsed else {
            unreachable!("parse_direct always returns LinkAddress::Direct");
        };
        Ok((
            DirectLink::new(link_id.clone(), addr.hostname, addr.port),
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
        false
    }

    fn max_links(&self) -> usize {
        usize::MAX
    }

    fn roles(&self) -> Vec<ChannelRole> {
        vec![ChannelRole {
            name: "default".to_string(),
            mechanical_tags: vec!["direct".to_string()],
            behavioral_tags: vec![],
            link_side: LinkSide::Both,
        }]
    }

    fn release_link(&self, link_id: &LinkId) {
        if let Some(port) = self.owned_ports.lock().expect("owned-ports mutex poisoned").remove(link_id) {
            self.ports.release(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn destroying_a_link_frees_its_allocated_port_for_reuse() {
        let channel = DirectChannel::new("directNetworking".to_string(), "127.0.0.1".to_string(), 9000, 9001).unwrap();
        let (kind_a, _) = channel.create_link(&"link-a".to_string()).await.unwrap();
        assert_eq!(kind_a.link_address(), r#"{"hostname":"127.0.0.1","port":9000}"#);
        assert!(channel.create_link(&"link-b".to_string()).await.is_err());

        channel.release_link(&"link-a".to_string());
        let (kind_c, _) = channel.create_link(&"link-c".to_string()).await.unwrap();
        assert_eq!(kind_c.link_address(), r#"{"hostname":"127.0.0.1","port":9000}"#);
    }

    #[tokio::test]
    async fn releasing_a_peer_addressed_link_does_not_touch_the_pool() {
        let channel = DirectChannel::new("directNetworking".to_string(), "127.0.0.1".to_string(), 9000, 9001).unwrap();
        let address = r#"{"hostname":"10.0.0.5","port":9000}"#;
        channel.create_link_from_address(&"link-peer".to_string(), address).await.unwrap();
        // The channel's own pool is untouched by a peer address landing on the same
        // number, so its single local port is still considered in use.
        assert!(channel.create_link(&"link-local".to_string()).await.is_err());
        channel.release_link(&"link-peer".to_string());
        // Releasing a link this channel never allocated a port for is a no-op, not a
        // spurious free of the peer's port number back into the local pool.
        assert!(channel.create_link(&"link-local".to_string()).await.is_err());
    }
}
