//! Static and dynamic properties describing a channel kind.

use crate::ids::ChannelStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionType {
    Unicast,
    Multicast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    Direct,
    Indirect,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendType {
    StoredAsync,
    EphemeralSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelFlags {
    pub reliable: bool,
    pub multi_addressable: bool,
    pub bootstrap_capable: bool,
    pub flushable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRole {
    pub name: String,
    pub mechanical_tags: Vec<String>,
    pub behavioral_tags: Vec<String>,
    pub link_side: crate::ids::LinkSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProperties {
    pub channel_gid: String,
    pub transmission_type: TransmissionType,
    pub connection_type: ConnectionType,
    pub send_type: SendType,
    pub flags: ChannelFlags,
    pub duration_s: Option<f64>,
    pub period_s: Option<f64>,
    pub mtu: i64,
    pub max_links: usize,
    pub roles: Vec<ChannelRole>,
    pub current_role: Option<String>,

    pub channel_status: ChannelStatus,
    pub interval_end_time: f64,
    pub sends_remaining_in_interval: Option<u64>,
}

impl ChannelProperties {
    pub fn current_role(&self) -> Option<&ChannelRole> {
        let name = self.current_role.as_ref()?;
        self.roles.iter().find(|r| &r.name == name)
    }
}
