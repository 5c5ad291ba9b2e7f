//! Logical, directed data path multiplexed onto a link.
//!
//! A connection's reference back to its owning link is non-owning: dropping the last
//! `Arc<Link>` must not be blocked by a connection still holding on to it, and using a
//! connection after its link is gone must fail cleanly rather than panic. This is the
//! "cyclic ownership" design note resolved with [`std::sync::Weak`].

use crate::error::CoreError;
use crate::ids::{ConnectionId, ConnectionStatus, LinkId, LinkType, RACE_UNLIMITED};
use crate::link::Link;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    link_type: LinkType,
    link: Weak<Link>,
    link_id: LinkId,
    hints: String,
    send_timeout_s: Option<f64>,
    status: ConnectionStatus,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        link_type: LinkType,
        link: &Arc<Link>,
        hints: String,
        send_timeout_s: i32,
    ) -> Self {
        Self {
            id,
            link_type,
            link: Arc::downgrade(link),
            link_id: link.id().to_string(),
            hints,
            send_timeout_s: if send_timeout_s == RACE_UNLIMITED {
                None
            } else {
                Some(send_timeout_s as f64)
            },
            status: ConnectionStatus::Open,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn hints(&self) -> &str {
        &self.hints
    }

    pub fn send_timeout_s(&self) -> Option<f64> {
        self.send_timeout_s
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Upgrade the weak back-reference, failing with `LinkLost` if the link has
    /// already been destroyed — e.g. a racing `destroyLink` beat a queued send.
    pub fn link(&self) -> Result<Arc<Link>, CoreError> {
        self.link.upgrade().ok_or_else(|| CoreError::LinkLost {
            link_id: self.link_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::test_support::direct_test_link;

    #[tokio::test]
    async fn dereferencing_after_link_drop_yields_link_lost() {
        let link = direct_test_link("link-1", LinkType::Bidirectional);
        let conn = Connection::new(
            "conn-1".to_string(),
            LinkType::Bidirectional,
            &link,
            String::new(),
            RACE_UNLIMITED,
        );
        assert!(conn.link().is_ok());
        drop(link);
        assert!(matches!(conn.link(), Err(CoreError::LinkLost { .. })));
    }

    #[tokio::test]
    async fn send_timeout_unlimited_sentinel_is_none() {
        let link = direct_test_link("link-2", LinkType::Send);
        let conn = Connection::new(
            "conn-2".to_string(),
            LinkType::Send,
            &link,
            String::new(),
            RACE_UNLIMITED,
        );
        assert_eq!(conn.send_timeout_s(), None);
    }
}
