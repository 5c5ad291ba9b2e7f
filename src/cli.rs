//! # Command-Line Interface Module
//!
//! Argument parsing for the demo harness binary, which exercises a channel/link pair
//! end to end (activate a channel, create or load a link, open a connection, send a
//! handful of packages) against the filesystem-backed host.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Exercise the direct TCP channel as both sides on localhost
//! overlay-comms-core --channel direct --role both
//!
//! # Exercise the whiteboard channel against a running bulletin board
//! overlay-comms-core --channel whiteboard --whiteboard-host board.example --whiteboard-port 8080
//! ```

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser, ValueEnum,
};
use std::path::PathBuf;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// overlay-comms-core demo harness
///
/// Activates one channel, creates a link on it, and sends a small burst of packages
/// through the resulting connection, logging every status callback the host would
/// otherwise receive.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Which built-in channel kind to exercise
    #[arg(long, value_enum, default_value_t = ChannelKind::Direct, help_heading = "Core Options")]
    pub channel: ChannelKind,

    /// Base directory for the five host filesystem roots (etc/logs/aux/tmp/plugin)
    #[arg(long, default_value = "./overlay-comms-core-data", help_heading = "Core Options")]
    pub data_dir: PathBuf,

    /// Persona name reported to `getActivePersona`
    #[arg(long, default_value = "demo-persona", help_heading = "Core Options")]
    pub persona: String,

    /// Hostname the direct channel binds / connects to
    #[arg(long, default_value = "127.0.0.1", help_heading = "Direct Channel")]
    pub direct_host: String,

    /// Lower bound (inclusive) of the direct channel's port allocation range
    #[arg(long, default_value_t = 9000, help_heading = "Direct Channel")]
    pub direct_port_min: u16,

    /// Upper bound (exclusive) of the direct channel's port allocation range
    #[arg(long, default_value_t = 9100, help_heading = "Direct Channel")]
    pub direct_port_max: u16,

    /// Whiteboard bulletin-board hostname
    #[arg(long, default_value = "127.0.0.1", help_heading = "Whiteboard Channel")]
    pub whiteboard_host: String,

    /// Whiteboard bulletin-board port
    #[arg(long, default_value_t = 8080, help_heading = "Whiteboard Channel")]
    pub whiteboard_port: u16,

    /// Default polling period for whiteboard links without an explicit hint, in ms
    #[arg(long, default_value_t = 1000, help_heading = "Whiteboard Channel")]
    pub whiteboard_polling_period_ms: u64,

    /// Number of packages to send through the demo connection
    #[arg(short = 'n', long, default_value_t = 5, help_heading = "Demo Traffic")]
    pub package_count: usize,

    /// Passphrase used to derive the key that encrypts persisted host files (whiteboard
    /// polling checkpoints, bootstrap directories)
    #[arg(long, default_value = "overlay-comms-core-demo-passphrase", help_heading = "Core Options")]
    pub storage_passphrase: String,

    /// Silence all user-facing informational output on stdout
    ///
    /// When this flag is present, only diagnostic logs on stderr will be shown.
    #[arg(short = 'q', long, help_heading = "Output and Logging")]
    pub quiet: bool,

    /// Increase diagnostic log verbosity on stderr.
    ///
    /// Can be used multiple times to increase detail:
    ///  -v: info
    ///  -vv: debug
    ///  -vvv: trace
    /// By default, only WARNING and ERROR messages are shown.
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    pub verbose: u8,
}

/// Built-in channel kinds the demo harness can exercise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChannelKind {
    /// Direct TCP unicast channel
    Direct,
    /// HTTP bulletin-board channel
    Whiteboard,
    /// Degenerate bootstrap-file sender
    BootstrapFile,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Direct => write!(f, "direct"),
            ChannelKind::Whiteboard => write!(f, "whiteboard"),
            ChannelKind::BootstrapFile => write!(f, "bootstrap-file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_parse_with_no_arguments() {
        let args = Args::parse_from(["overlay-comms-core"]);
        assert_eq!(args.channel, ChannelKind::Direct);
        assert_eq!(args.package_count, 5);
        assert!(!args.quiet);
    }

    #[test]
    fn channel_flag_selects_whiteboard() {
        let args = Args::parse_from(["overlay-comms-core", "--channel", "whiteboard"]);
        assert_eq!(args.channel, ChannelKind::Whiteboard);
    }

    #[test]
    fn channel_kind_display_matches_value_enum_names() {
        assert_eq!(ChannelKind::Direct.to_string(), "direct");
        assert_eq!(ChannelKind::BootstrapFile.to_string(), "bootstrap-file");
    }
}
