//! # overlay-comms-core demo harness — entry point
//!
//! ## Architecture Overview
//!
//! 1. **Initialize logging**: dual-layer tracing, a rotated file sink plus an optional
//!    colorized stdout sink.
//! 2. **Parse arguments**: which channel kind to exercise and how.
//! 3. **Stand up a [`FilesystemHost`]**: the five host directories live under
//!    `--data-dir`.
//! 4. **Register and activate the chosen channel**, create a link on it, open a
//!    bidirectional connection, and send `--package-count` packages through it.
//! 5. **Tear everything down** via `CommsCore::shutdown`.

use anyhow::Result;
use clap::Parser;
use overlay_comms_core::cli::{Args, ChannelKind as CliChannelKind};
use overlay_comms_core::comms_core::CommsCore;
use overlay_comms_core::config::InitConfig;
use overlay_comms_core::enc_pkg::EncPkg;
use overlay_comms_core::filesystem_host::FilesystemHost;
use overlay_comms_core::ids::{PackageType, RaceHandle, RACE_UNLIMITED};
use overlay_comms_core::storage_encryption::{StorageEncryption, INSTALL_SALT};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

mod logging;
use logging::ColorizedFormatter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let config = InitConfig::rooted_at(&args.data_dir);
    std::fs::create_dir_all(&config.logging_directory)?;

    let file_appender = tracing_appender::rolling::daily(&config.logging_directory, "overlay-comms-core.log");
    let (non_blocking_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    let detailed_log_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_filter(log_level)
        .boxed();

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(detailed_log_layer)
        .with(stdout_log)
        .init();

    info!(channel = %args.channel, data_dir = ?args.data_dir, "starting overlay-comms-core demo");

    let storage = StorageEncryption::derive(&args.storage_passphrase, INSTALL_SALT);
    let host = Arc::new(FilesystemHost::new(config, args.persona.clone(), storage));
    let core = CommsCore::new(host.clone());

    let (channel_gid, explicit_address) = match args.channel {
        CliChannelKind::Direct => {
            let gid = "directNetworking".to_string();
            core.register_direct_channel(gid.clone(), args.direct_host.clone(), args.direct_port_min, args.direct_port_max)
                .await?;
            (gid, None)
        }
        CliChannelKind::Whiteboard => {
            let gid = "whiteboardTwoSix".to_string();
            core.register_whiteboard_channel(gid.clone(), args.whiteboard_polling_period_ms, 10)
                .await;
            let address = format!(
                r#"{{"hostname":"{}","port":{},"hashtag":"demo","checkFrequency":0,"timestamp":0.0,"max_tries":0}}"#,
                args.whiteboard_host, args.whiteboard_port
            );
            (gid, Some(address))
        }
        CliChannelKind::BootstrapFile => {
            let gid = "bootstrapFile".to_string();
            core.register_bootstrap_file_channel(gid.clone(), "bootstrap".to_string()).await;
            (gid, None)
        }
    };

    let handle = RaceHandle(1);
    let response = core.activate_channel(handle, &channel_gid, "default").await;
    info!(?response, channel = %channel_gid, "activated channel");

    let create_response = match &explicit_address {
        Some(address) => core.create_link_from_address(RaceHandle(2), &channel_gid, address).await,
        None => core.create_link(RaceHandle(2), &channel_gid).await,
    };
    info!(?create_response, "created link");

    // The harness plays both host and caller, so it knows the id the filesystem host
    // just minted for the channel's first link without waiting on a callback.
    let link_id = format!("{channel_gid}/link-0");
    let connection_id = format!("{link_id}/conn-0");
    let requested_type = match args.channel {
        CliChannelKind::BootstrapFile => overlay_comms_core::ids::LinkType::Send,
        _ => overlay_comms_core::ids::LinkType::Bidirectional,
    };
    let open_response = core
        .open_connection(&link_id, connection_id.clone(), requested_type, String::new(), RACE_UNLIMITED)
        .await;
    info!(?open_response, connection = %connection_id, "opened connection");

    info!(packages = args.package_count, "sending demo traffic");
    for i in 0..args.package_count {
        let pkg = EncPkg::new(i as u64, 0, PackageType::TestHarness, format!("demo-package-{i}").into_bytes());
        let send_response = core.send_package(RaceHandle(3 + i as u64), &link_id, pkg, f64::INFINITY).await;
        info!(?send_response, index = i, "enqueued demo package");
    }

    core.close_connection(&link_id, &connection_id).await;
    core.shutdown().await;
    info!("overlay-comms-core demo finished");

    if let Err(e) = std::io::Write::flush(&mut std::io::stdout()) {
        error!(error = %e, "failed to flush stdout");
    }

    Ok(())
}
