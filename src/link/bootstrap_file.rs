//! Degenerate send-only link that drops each package into a directory as a file,
//! supplementing the distilled specification with the bootstrap-capable filesystem
//! channel `original_source/`'s `bootstrap-file/BootstrapFileLink.*` carries alongside
//! direct and whiteboard. No receive routine runs here: the watcher that turns files
//! back into packages is a separate component the network manager drives directly,
//! out of scope for this core (see the channel-level non-goal on artifact packaging).

use crate::enc_pkg::EncPkg;
use crate::error::CoreError;
use crate::host::HostHandle;
use crate::ids::LinkId;
use crate::link::{Link, LinkKind};
use async_trait::async_trait;
use std::sync::Arc;

pub struct BootstrapFileLink {
    link_id: LinkId,
    host: Arc<dyn HostHandle>,
    directory: String,
}

impl BootstrapFileLink {
    pub fn new(link_id: LinkId, host: Arc<dyn HostHandle>, directory: String) -> Arc<Self> {
        Arc::new(Self {
            link_id,
            host,
            directory,
        })
    }

    pub async fn serve_files(&self) -> Result<Vec<String>, CoreError> {
        self.host
            .list_dir(&self.directory)
            .await
            .map_err(CoreError::Io)
    }
}

#[async_trait]
impl LinkKind for BootstrapFileLink {
    async fn send_internal(&self, pkg: &EncPkg) -> Result<(), CoreError> {
        let filename = format!("{}/{}-{}.bin", self.directory, pkg.trace_id(), pkg.span_id());
        self.host
            .write_file(&filename, &pkg.encode())
            .await
            .map_err(|e| CoreError::TransportSendFailure {
                link_id: self.link_id.clone(),
                reason: e.to_string(),
            })
    }

    async fn start_receive(self: Arc<Self>, _link: Arc<Link>) {
        // Bootstrap file links never run a receive routine; `LinkType::Send` prevents
        // `Link::open_connection` from ever requesting one.
    }

    async fn stop_receive(&self) {}

    fn link_address(&self) -> String {
        format!(r#"{{"directory":"{}"}}"#, self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PackageType;
    use std::sync::Mutex;

    struct RecordingHost {
        writes: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl HostHandle for RecordingHost {
        async fn generate_link_id(&self, _: &crate::ids::ChannelGid) -> LinkId {
            "x".to_string()
        }
        async fn generate_connection_id(&self, _: &LinkId) -> crate::ids::ConnectionId {
            "x".to_string()
        }
        async fn get_active_persona(&self) -> String {
            "p".to_string()
        }
        async fn get_channel_properties(&self, _: &crate::ids::ChannelGid) -> Option<crate::channel_properties::ChannelProperties> {
            None
        }
        async fn update_link_properties(&self, _: &LinkId, _: &crate::link_properties::LinkProperties, _: i32) {}
        async fn on_link_status_changed(
            &self,
            _: crate::ids::RaceHandle,
            _: &LinkId,
            _: crate::ids::LinkStatus,
            _: Option<&crate::link_properties::LinkProperties>,
            _: i32,
        ) {
        }
        async fn on_connection_status_changed(
            &self,
            _: crate::ids::RaceHandle,
            _: &crate::ids::ConnectionId,
            _: crate::ids::ConnectionStatus,
            _: Option<&crate::link_properties::LinkProperties>,
            _: i32,
        ) {
        }
        async fn on_channel_status_changed(
            &self,
            _: crate::ids::RaceHandle,
            _: &crate::ids::ChannelGid,
            _: crate::ids::ChannelStatus,
            _: Option<&crate::channel_properties::ChannelProperties>,
            _: i32,
        ) {
        }
        async fn on_package_status_changed(&self, _: crate::ids::RaceHandle, _: crate::ids::PackageStatus, _: i32) {}
        async fn receive_enc_pkg(&self, _: &EncPkg, _: &[crate::ids::ConnectionId], _: i32) {}
        async fn unblock_queue(&self, _: &crate::ids::ConnectionId) {}
        async fn read_file(&self, _: &str) -> std::io::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn write_file(&self, path: &str, contents: &[u8]) -> std::io::Result<()> {
            self.writes.lock().unwrap().push((path.to_string(), contents.to_vec()));
            Ok(())
        }
        async fn append_file(&self, _: &str, _: &[u8]) -> std::io::Result<()> {
            Ok(())
        }
        async fn list_dir(&self, _: &str) -> std::io::Result<Vec<String>> {
            Ok(vec!["1-2.bin".to_string()])
        }
        async fn make_dir(&self, _: &str) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_internal_writes_one_file_per_package() {
        let host = Arc::new(RecordingHost { writes: Mutex::new(Vec::new()) });
        let kind = BootstrapFileLink::new("bf".to_string(), host.clone(), "/tmp/bootstrap".to_string());
        let pkg = EncPkg::new(1, 2, PackageType::Sdk, vec![9, 9]);
        kind.send_internal(&pkg).await.unwrap();
        let writes = host.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "/tmp/bootstrap/1-2.bin");
    }

    #[tokio::test]
    async fn serve_files_lists_directory_without_bundling() {
        let host = Arc::new(RecordingHost { writes: Mutex::new(Vec::new()) });
        let kind = BootstrapFileLink::new("bf".to_string(), host, "/tmp/bootstrap".to_string());
        let files = kind.serve_files().await.unwrap();
        assert_eq!(files, vec!["1-2.bin".to_string()]);
    }
}
