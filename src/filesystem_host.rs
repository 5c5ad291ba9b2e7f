//! A real, if minimal, [`HostHandle`]: persists state under an [`InitConfig`]'s
//! directories and logs status callbacks instead of forwarding them to a network
//! manager. Used by the demo binary in place of an actual host SDK process.

use crate::channel_properties::ChannelProperties;
use crate::config::InitConfig;
use crate::enc_pkg::EncPkg;
use crate::host::HostHandle;
use crate::ids::{
    ChannelGid, ChannelStatus, ConnectionId, ConnectionStatus, LinkId, LinkStatus, PackageStatus,
    RaceHandle,
};
use crate::link_properties::LinkProperties;
use crate::storage_encryption::{is_exempt, StorageEncryption};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub struct FilesystemHost {
    config: InitConfig,
    persona: String,
    storage: StorageEncryption,
    next_link: AtomicU64,
    next_connection: AtomicU64,
}

impl FilesystemHost {
    pub fn new(config: InitConfig, persona: String, storage: StorageEncryption) -> Self {
        Self {
            config,
            persona,
            storage,
            next_link: AtomicU64::new(0),
            next_connection: AtomicU64::new(0),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.config.aux_data_directory).join(p)
        }
    }
}

#[async_trait]
impl HostHandle for FilesystemHost {
    async fn generate_link_id(&self, channel_gid: &ChannelGid) -> LinkId {
        let n = self.next_link.fetch_add(1, Ordering::SeqCst);
        format!("{channel_gid}/link-{n}")
    }

    async fn generate_connection_id(&self, link_id: &LinkId) -> ConnectionId {
        let n = self.next_connection.fetch_add(1, Ordering::SeqCst);
        format!("{link_id}/conn-{n}")
    }

    async fn get_active_persona(&self) -> String {
        self.persona.clone()
    }

    async fn get_channel_properties(&self, _channel_gid: &ChannelGid) -> Option<ChannelProperties> {
        None
    }

    async fn update_link_properties(&self, link_id: &LinkId, properties: &LinkProperties, _timeout_ms: i32) {
        info!(link = %link_id, ?properties, "link properties updated");
    }

    async fn on_link_status_changed(
        &self,
        handle: RaceHandle,
        link_id: &LinkId,
        status: LinkStatus,
        _properties: Option<&LinkProperties>,
        _timeout_ms: i32,
    ) {
        info!(%handle, link = %link_id, ?status, "link status changed");
    }

    async fn on_connection_status_changed(
        &self,
        handle: RaceHandle,
        connection_id: &ConnectionId,
        status: ConnectionStatus,
        _properties: Option<&LinkProperties>,
        _timeout_ms: i32,
    ) {
        info!(%handle, connection = %connection_id, ?status, "connection status changed");
    }

    async fn on_channel_status_changed(
        &self,
        handle: RaceHandle,
        channel_gid: &ChannelGid,
        status: ChannelStatus,
        _properties: Option<&ChannelProperties>,
        _timeout_ms: i32,
    ) {
        info!(%handle, channel = %channel_gid, ?status, "channel status changed");
    }

    async fn on_package_status_changed(&self, handle: RaceHandle, status: PackageStatus, _timeout_ms: i32) {
        info!(%handle, ?status, "package status changed");
    }

    async fn receive_enc_pkg(&self, pkg: &EncPkg, connection_ids: &[ConnectionId], _timeout_ms: i32) {
        info!(
            trace_id = pkg.trace_id(),
            span_id = pkg.span_id(),
            connections = connection_ids.len(),
            "received package"
        );
    }

    async fn unblock_queue(&self, _connection_id: &ConnectionId) {}

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let raw = tokio::fs::read(self.resolve(path)).await?;
        if is_exempt(path) {
            return Ok(raw);
        }
        self.storage
            .decrypt(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let on_disk = if is_exempt(path) {
            contents.to_vec()
        } else {
            self.storage.encrypt(contents)
        };
        tokio::fs::write(resolved, on_disk).await
    }

    async fn append_file(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if is_exempt(path) {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(resolved)
                .await?;
            return file.write_all(contents).await;
        }
        // Envelope encryption has no append-in-place form (a fresh IV covers the
        // whole ciphertext), so appending means decrypt-existing, extend, re-encrypt.
        let mut plaintext = match tokio::fs::read(&resolved).await {
            Ok(existing) => self
                .storage
                .decrypt(&existing)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        plaintext.extend_from_slice(contents);
        tokio::fs::write(resolved, self.storage.encrypt(&plaintext)).await
    }

    async fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.resolve(path)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn make_dir(&self, path: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_through_aux_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let config = InitConfig::rooted_at(tmp.path());
        let storage = StorageEncryption::derive("test-passphrase", b"test-salt");
        let host = FilesystemHost::new(config, "test-persona".to_string(), storage);
        host.write_file("checkpoint.bin", b"cursor-state").await.unwrap();
        let read_back = host.read_file("checkpoint.bin").await.unwrap();
        assert_eq!(read_back, b"cursor-state");
    }

    #[tokio::test]
    async fn make_dir_then_list_dir_sees_created_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = InitConfig::rooted_at(tmp.path());
        let storage = StorageEncryption::derive("test-passphrase", b"test-salt");
        let host = FilesystemHost::new(config, "test-persona".to_string(), storage);
        host.make_dir("bootstrap-dir").await.unwrap();
        host.write_file("bootstrap-dir/1-2.bin", b"payload").await.unwrap();
        let names = host.list_dir("bootstrap-dir").await.unwrap();
        assert_eq!(names, vec!["1-2.bin".to_string()]);
    }
}
