//! Per-link static/negotiated properties exchanged with the host SDK.

use crate::ids::{ChannelGid, LinkType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkPropertySet {
    /// Bits per second, `-1.0` if unknown.
    pub bandwidth_bps: f64,
    /// Seconds, `-1.0` if unknown.
    pub latency_s: f64,
    /// Fractional loss rate in `[0,1]`, `-1.0` if unknown.
    pub loss: f64,
}

impl LinkPropertySet {
    pub const UNKNOWN: LinkPropertySet = LinkPropertySet {
        bandwidth_bps: -1.0,
        latency_s: -1.0,
        loss: -1.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkPropertyPair {
    pub send: LinkPropertySet,
    pub receive: LinkPropertySet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkProperties {
    pub link_type: LinkType,
    pub channel_gid: ChannelGid,
    pub link_address: String,
    pub mtu: i64,
    pub reliable: bool,
    pub duration_s: Option<f64>,
    pub period_s: Option<f64>,
    pub worst: LinkPropertyPair,
    pub expected: LinkPropertyPair,
    pub best: LinkPropertyPair,
}
