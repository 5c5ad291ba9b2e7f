//! Filesystem layout the demo harness and a real host SDK agree on: where plugin
//! state, logs, and scratch files live.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The five filesystem roots a host hands a plugin at init time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub etc_directory: String,
    pub logging_directory: String,
    pub aux_data_directory: String,
    pub tmp_directory: String,
    pub plugin_directory: String,
}

impl InitConfig {
    /// A layout rooted at a single base directory, handy for the demo binary and for
    /// tests that want real files on disk without five separate `--flag`s.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let join = |leaf: &str| base.join(leaf).to_string_lossy().into_owned();
        Self {
            etc_directory: join("etc"),
            logging_directory: join("logs"),
            aux_data_directory: join("aux"),
            tmp_directory: join("tmp"),
            plugin_directory: join("plugin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_at_prefixes_every_directory() {
        let cfg = InitConfig::rooted_at("/var/race");
        assert_eq!(cfg.etc_directory, "/var/race/etc");
        assert_eq!(cfg.aux_data_directory, "/var/race/aux");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let cfg = InitConfig::rooted_at("/var/race");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"auxDataDirectory\""));
        assert!(json.contains("\"pluginDirectory\""));
    }
}
