//! Identifiers and small enums shared across the channel/link/connection state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique name of a channel kind, e.g. `"directNetworking"` or `"whiteboardTwoSix"`.
pub type ChannelGid = String;

/// Host-allocated identifier for one instantiated link of a channel.
pub type LinkId = String;

/// Host-allocated identifier for a logical connection multiplexed onto a link.
pub type ConnectionId = String;

/// Opaque correlation token the host uses to match an asynchronous call with its
/// eventual status callback. `RaceHandle(0)` is reserved as the "no handle" sentinel
/// used for unsolicited notifications (link/channel status changes the core raises on
/// its own, not in response to a specific host request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceHandle(pub u64);

impl RaceHandle {
    /// Sentinel used for status callbacks the core raises without a corresponding
    /// inbound request.
    pub const NULL: RaceHandle = RaceHandle(0);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for RaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Sentinel timeout value meaning "block the caller until the operation settles".
pub const RACE_BLOCKING: i32 = i32::MIN;

/// Sentinel per-connection send-timeout value meaning "never time out".
pub const RACE_UNLIMITED: i32 = i32::MIN;

/// Directionality of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Send,
    Receive,
    Bidirectional,
}

impl LinkType {
    /// Whether a connection of `requested` type may be opened on a link of this type.
    pub fn accepts(self, requested: LinkType) -> bool {
        match self {
            LinkType::Bidirectional => true,
            other => other == requested,
        }
    }

    pub fn has_send(self) -> bool {
        matches!(self, LinkType::Send | LinkType::Bidirectional)
    }

    pub fn has_receive(self) -> bool {
        matches!(self, LinkType::Receive | LinkType::Bidirectional)
    }
}

/// Classification of the payload riding inside an `EncPkg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PackageType {
    Undefined = 0,
    NetworkManager = 1,
    TestHarness = 2,
    Sdk = 3,
}

impl PackageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PackageType::Undefined),
            1 => Some(PackageType::NetworkManager),
            2 => Some(PackageType::TestHarness),
            3 => Some(PackageType::Sdk),
            _ => None,
        }
    }
}

/// Side of a create/load operation a channel role is permitted to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkSide {
    Creator,
    Loader,
    Both,
    Undefined,
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Undefined,
    Starting,
    Available,
    Unavailable,
    Enabled,
    Disabled,
    Failed,
    Unsupported,
}

/// Lifecycle status of a link, reported to the host via `onLinkStatusChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Created,
    Loaded,
    Destroyed,
}

/// Lifecycle status of a connection, reported via `onConnectionStatusChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Open,
    Available,
    Unavailable,
    Closed,
}

/// Per-package delivery outcome reported via `onPackageStatusChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    Sent,
    FailedGeneric,
    FailedTimeout,
}

/// Synchronous response every inbound host operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginResponse {
    Ok,
    TempError,
    Error,
    Fatal,
}
