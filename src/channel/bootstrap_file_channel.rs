//! Bootstrap-capable filesystem channel: directories of per-package files, keyed by
//! passphrase so repeated bootstraps with the same passphrase land in the same place.

use crate::channel::ChannelKind;
use crate::channel_properties::ChannelRole;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::{ChannelGid, LinkId, LinkSide, LinkType};
use crate::link::bootstrap_file::BootstrapFileLink;
use crate::link::LinkKind;
use crate::link_address::LinkAddress;
use crate::storage_encryption::StorageEncryption;
use async_trait::async_trait;
use std::sync::Arc;

pub struct BootstrapFileChannel {
    channel_gid: ChannelGid,
    host: Arc<dyn HostHandle>,
    aux_data_directory: String,
}

impl BootstrapFileChannel {
    pub fn new(channel_gid: ChannelGid, host: Arc<dyn HostHandle>, aux_data_directory: String) -> Arc<Self> {
        Arc::new(Self {
            channel_gid,
            host,
            aux_data_directory,
        })
    }
}

#[async_trait]
impl ChannelKind for BootstrapFileChannel {
    async fn activate(&self, _role_name: &str) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deactivate(&self) {}

    async fn create_link(&self, link_id: &LinkId) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let directory = format!("{}/{}", self.aux_data_directory, link_id);
        self.host.make_dir(&directory).await.map_err(CoreError::Io)?;
        Ok((
            BootstrapFileLink::new(link_id.clone(), self.host.clone(), directory),
            LinkType::Send,
        ))
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
        let parsed = LinkAddress::parse_bootstrap_file(&self.channel_gid, address)?;
        let LinkAddress::BootstrapFile(addr) = parsed else {
            unreachable!("parse_bootstrap_file always returns LinkAddress::BootstrapFile");
        };
        let directory = addr
            .directory
            .unwrap_or_else(|| format!("{}/{}", self.aux_data_directory, link_id));
        Ok((
            BootstrapFileLink::new(link_id.clone(), self.host.clone(), directory),
            LinkType::Send,
        ))
    }

    async fn create_bootstrap_link(
        &self,
        link_id: &LinkId,
        passphrase: &str,
    ) -> Result<(Arc<dyn LinkKind>, LinkType), CoreError> {
        let key_hex = StorageEncryption::derive_directory_name(passphrase);
        let directory = format!("{}/bootstrap-{}", self.aux_data_directory, key_hex);
        self.host.make_dir(&directory).await.map_err(CoreError::Io)?;
        Ok((
            BootstrapFileLink::new(link_id.clone(), self.host.clone(), directory),
            LinkType::Send,
        ))
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
            mechanical_tags: vec!["bootstrap".to_string()],
            behavioral_tags: vec![],
            link_side: LinkSide::Both,
        }]
    }
}
