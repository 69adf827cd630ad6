use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cowfs_journal::{JournalConfig, JournalLog};
use cowfs_store::{BlockStore, StoreConfig};
use cowfs_types::{BlockAddress, SyncMode};
use serde::{Deserialize, Serialize};

/// Name of the layer descriptor inside a filesystem root.
pub const CONFIG_FILE: &str = "cowfs.toml";

/// Describes one overlay layer on disk.
///
/// Relative directories are resolved against the filesystem root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Where block and attribute files live.
    pub data_dir: PathBuf,
    /// Where the journal lives.
    pub log_dir: PathBuf,
    /// Address of the root inode block, once the inode layer has written one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_inode: Option<BlockAddress>,
    /// Fixed block size in bytes.
    pub block_size: u64,
    #[serde(default)]
    pub sync_mode: SyncMode,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("blocks"),
            log_dir: PathBuf::from("journal"),
            root_inode: None,
            block_size: 4096,
            sync_mode: SyncMode::default(),
        }
    }
}

impl LayerConfig {
    /// Load the descriptor from `<root>/cowfs.toml`.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(CONFIG_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Write the descriptor to `<root>/cowfs.toml`.
    pub fn save(&self, root: &Path) -> anyhow::Result<()> {
        let path = root.join(CONFIG_FILE);
        let text = toml::to_string_pretty(self).context("serializing layer config")?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
    }

    pub fn data_path(&self, root: &Path) -> PathBuf {
        root.join(&self.data_dir)
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        root.join(&self.log_dir)
    }

    /// Open the layer's block store.
    pub fn open_store(&self, root: &Path) -> anyhow::Result<BlockStore> {
        let config = StoreConfig {
            sync_mode: self.sync_mode,
        };
        let path = self.data_path(root);
        BlockStore::open_with_config(&path, self.block_size, config)
            .with_context(|| format!("opening block store at {}", path.display()))
    }

    /// Open the layer's journal.
    pub fn open_journal(&self, root: &Path) -> anyhow::Result<JournalLog> {
        let config = JournalConfig {
            sync_mode: self.sync_mode,
        };
        let path = self.log_path(root);
        JournalLog::open_with_config(&path, config)
            .with_context(|| format!("opening journal at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LayerConfig::default();
        assert_eq!(c.block_size, 4096);
        assert_eq!(c.data_dir, PathBuf::from("blocks"));
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert!(c.root_inode.is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = LayerConfig {
            block_size: 512,
            root_inode: Some(BlockAddress::from_digest(77)),
            sync_mode: SyncMode::EveryWrite,
            ..LayerConfig::default()
        };
        config.save(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(text.contains("sync_mode = \"every-write\""));
        assert_eq!(LayerConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "data_dir = \"d\"\nlog_dir = \"l\"\nblock_size = 64\n",
        )
        .unwrap();
        let config = LayerConfig::load(dir.path()).unwrap();
        assert_eq!(config.block_size, 64);
        assert_eq!(config.sync_mode, SyncMode::OsDefault);
        assert_eq!(config.data_path(dir.path()), dir.path().join("d"));
    }

    #[test]
    fn absolute_dirs_are_kept() {
        let config = LayerConfig {
            data_dir: PathBuf::from("/srv/blocks"),
            ..LayerConfig::default()
        };
        assert_eq!(config.data_path(Path::new("/fs")), PathBuf::from("/srv/blocks"));
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LayerConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
