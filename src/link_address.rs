//! Channel-specific link address codec. Each channel kind defines a concrete shape;
//! all of them serialize as JSON documents, matching the wire formats peers exchange
//! to bring a link up on the opposite side.

use crate::error::CoreError;
use crate::ids::ChannelGid;
use serde::{Deserialize, Serialize};

/// A parsed, validated link address. The variant corresponds 1:1 to a channel kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkAddress {
    Direct(DirectAddress),
    Whiteboard(WhiteboardAddress),
    BootstrapFile(BootstrapFileAddress),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectAddress {
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardAddress {
    pub hostname: String,
    pub port: u16,
    pub hashtag: String,
    #[serde(rename = "checkFrequency", default = "default_check_frequency_ms")]
    pub check_frequency_ms: u64,
    #[serde(default = "default_timestamp")]
    pub timestamp: f64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
}

fn default_check_frequency_ms() -> u64 {
    1000
}

fn default_timestamp() -> f64 {
    -1.0
}

fn default_max_tries() -> u32 {
    120
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapFileAddress {
    pub directory: Option<String>,
}

/// Characters the whiteboard hashtag is restricted to; anything else is stripped with
/// a logged warning rather than rejected outright, matching the permissive address
/// handling the rest of the codec applies.
fn sanitize_hashtag(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if sanitized != raw {
        tracing::warn!(original = raw, sanitized = %sanitized, "stripped invalid characters from whiteboard hashtag");
    }
    sanitized
}

impl LinkAddress {
    pub fn parse_direct(channel_gid: &ChannelGid, text: &str) -> Result<Self, CoreError> {
        let addr: DirectAddress = serde_json::from_str(text).map_err(|e| CoreError::InvalidAddress {
            channel_gid: channel_gid.clone(),
            reason: e.to_string(),
        })?;
        Ok(LinkAddress::Direct(addr))
    }

    pub fn parse_whiteboard(channel_gid: &ChannelGid, text: &str) -> Result<Self, CoreError> {
        let mut addr: WhiteboardAddress =
            serde_json::from_str(text).map_err(|e| CoreError::InvalidAddress {
                channel_gid: channel_gid.clone(),
                reason: e.to_string(),
            })?;
        addr.hashtag = sanitize_hashtag(&addr.hashtag);
        Ok(LinkAddress::Whiteboard(addr))
    }

    pub fn parse_bootstrap_file(channel_gid: &ChannelGid, text: &str) -> Result<Self, CoreError> {
        let addr: BootstrapFileAddress =
            serde_json::from_str(text).map_err(|e| CoreError::InvalidAddress {
                channel_gid: channel_gid.clone(),
                reason: e.to_string(),
            })?;
        Ok(LinkAddress::BootstrapFile(addr))
    }

    /// Deterministic, lossless emission of the address back to its wire document.
    pub fn emit(&self) -> String {
        match self {
            LinkAddress::Direct(a) => serde_json::to_string(a),
            LinkAddress::Whiteboard(a) => serde_json::to_string(a),
            LinkAddress::BootstrapFile(a) => serde_json::to_string(a),
        }
        .expect("link address types are always representable as JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_address_round_trips() {
        let gid = "directNetworking".to_string();
        let text = r#"{"hostname":"10.0.0.5","port":12345}"#;
        let parsed = LinkAddress::parse_direct(&gid, text).unwrap();
        assert_eq!(
            parsed,
            LinkAddress::Direct(DirectAddress {
                hostname: "10.0.0.5".into(),
                port: 12345
            })
        );
        assert_eq!(parsed.emit(), r#"{"hostname":"10.0.0.5","port":12345}"#);
    }

    #[test]
    fn whiteboard_hashtag_is_sanitized() {
        let gid = "whiteboardTwoSix".to_string();
        let text = r#"{"hostname":"h","port":1,"hashtag":"ab!@# c_d-1","checkFrequency":1000,"timestamp":0.0,"max_tries":5}"#;
        let parsed = LinkAddress::parse_whiteboard(&gid, text).unwrap();
        match parsed {
            LinkAddress::Whiteboard(a) => assert_eq!(a.hashtag, "abc_d-1"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn whiteboard_address_omitted_fields_fall_back_to_original_defaults() {
        let gid = "whiteboardTwoSix".to_string();
        let text = r#"{"hostname":"h","port":1,"hashtag":"demo"}"#;
        let parsed = LinkAddress::parse_whiteboard(&gid, text).unwrap();
        match parsed {
            LinkAddress::Whiteboard(a) => {
                assert_eq!(a.check_frequency_ms, 1000);
                assert_eq!(a.timestamp, -1.0);
                assert_eq!(a.max_tries, 120);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn invalid_json_surfaces_invalid_address() {
        let gid = "directNetworking".to_string();
        let err = LinkAddress::parse_direct(&gid, "not json").unwrap_err();
        assert!(matches!(err, CoreError::InvalidAddress { .. }));
    }

    #[test]
    fn bootstrap_address_directory_is_optional() {
        let gid = "bootstrapFile".to_string();
        let parsed = LinkAddress::parse_bootstrap_file(&gid, "{}").unwrap();
        assert_eq!(parsed, LinkAddress::BootstrapFile(BootstrapFileAddress { directory: None }));
    }
}
