//! Error taxonomy for the comms core, and its mapping onto the host-facing
//! [`PluginResponse`] / status-callback contract.

use crate::ids::{ChannelGid, ConnectionId, LinkId, LinkSide, PluginResponse};
use thiserror::Error;

/// Every fallible operation inside the core returns one of these. Library code never
/// constructs a `PluginResponse` directly; the façade in [`crate::comms_core`] is the
/// single place that maps a `CoreError` onto the host-visible response and status
/// callback, per the table this enum mirrors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid link address for channel {channel_gid}: {reason}")]
    InvalidAddress {
        channel_gid: ChannelGid,
        reason: String,
    },

    #[error("send queue full on link {link_id}")]
    QueueFull { link_id: LinkId },

    #[error("package on link {link_id} timed out before it could be sent")]
    Timeout { link_id: LinkId },

    #[error("transport send failed on link {link_id}: {reason}")]
    TransportSendFailure { link_id: LinkId, reason: String },

    #[error("transport on link {link_id} failed permanently: {reason}")]
    TransportFatal { link_id: LinkId, reason: String },

    #[error("unknown connection {connection_id}")]
    MissingConnection { connection_id: ConnectionId },

    #[error("channel {channel_gid} role does not permit this operation (role side {side:?})")]
    RoleViolation {
        channel_gid: ChannelGid,
        side: LinkSide,
        operation: &'static str,
    },

    #[error("channel {channel_gid} is not available")]
    ChannelUnavailable { channel_gid: ChannelGid },

    #[error("channel {channel_gid} has reached its link limit ({max_links})")]
    LinkCountExceeded { channel_gid: ChannelGid, max_links: usize },

    #[error("storage passphrase does not match the persisted key derivation")]
    InvalidPassphrase,

    #[error("link {link_id} no longer exists")]
    LinkLost { link_id: LinkId },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// The synchronous response the host-facing façade returns for this error, per the
    /// error-handling table: most kinds surface as `ERROR`, a full queue is transient
    /// (`TEMP_ERROR`), and a benign close-after-close race is tolerated as `OK`.
    pub fn plugin_response(&self) -> PluginResponse {
        match self {
            CoreError::QueueFull { .. } => PluginResponse::TempError,
            CoreError::MissingConnection { .. } => PluginResponse::Ok,
            CoreError::TransportFatal { .. } => PluginResponse::Fatal,
            _ => PluginResponse::Error,
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
