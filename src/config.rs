//! Configuration management for the mixing node daemon.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::network_type::NetworkType;

/// Get the platform-specific data directory.
pub fn get_data_dir() -> PathBuf {
    if cfg!(windows) {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anonpool")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".anonpool")
    }
}

/// Get the network-specific subdirectory (mainnet or testnet).
pub fn get_network_data_dir(network: &NetworkType) -> PathBuf {
    let base = get_data_dir();
    match network {
        NetworkType::Mainnet => base,
        NetworkType::Testnet => base.join("testnet"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub inode: InodeConfig,
    pub mixing: MixingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub version: String,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_network() -> String {
    "testnet".to_string()
}

impl NodeConfig {
    pub fn network_type(&self) -> NetworkType {
        match self.network.to_lowercase().as_str() {
            "mainnet" => NetworkType::Mainnet,
            _ => NetworkType::Testnet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_address: String,
    pub external_address: Option<String>,
    pub max_peers: u32,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl NetworkConfig {
    pub fn full_listen_address(&self, network_type: &NetworkType) -> String {
        if self.listen_address.contains(':') {
            self.listen_address.clone()
        } else {
            format!(
                "{}:{}",
                self.listen_address,
                network_type.default_p2p_port()
            )
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub data_dir: String,
    pub cache_size_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub file_path: String,
}

/// Configuration for running this node as an INODE (mixing coordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InodeConfig {
    pub enabled: bool,
    pub collateral_txid: String,
    /// Hex-encoded ed25519 signing key used to sign queue advertisements and
    /// final transactions. Never logged, never serialized in responses.
    #[serde(default)]
    pub signing_key_hex: String,
}

/// Client-side auto-denomination driver configuration. Mirrors the knobs the
/// original mixing wallet exposed: how much to keep anonymized, how many
/// rounds to mix through, and whether to act as a liquidity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixingConfig {
    #[serde(default = "default_false")]
    pub enable_mixing: bool,
    /// Target balance (in satoshis) to keep denominated/anonymized.
    #[serde(default = "default_target_amount")]
    pub target_anon_amount: u64,
    /// Number of mixing rounds per output before it's considered anonymized.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Liquidity providers mix smaller, more frequent amounts to help the pool.
    #[serde(default = "default_false")]
    pub liquidity_provider: bool,
    /// Lite mode skips background auto-denomination; mixing only runs when
    /// explicitly requested.
    #[serde(default = "default_false")]
    pub lite_mode: bool,
}

fn default_false() -> bool {
    false
}

fn default_target_amount() -> u64 {
    1000 * crate::types::SATOSHIS_PER_TIME
}

fn default_rounds() -> u32 {
    2
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            enable_mixing: false,
            target_anon_amount: default_target_amount(),
            rounds: default_rounds(),
            liquidity_provider: false,
            lite_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub enable_message_signing: bool,
    #[serde(default = "default_message_max_age")]
    pub message_max_age_seconds: i64,
}

fn default_true() -> bool {
    true
}

fn default_message_max_age() -> i64 {
    300
}

impl Config {
    pub fn get_data_directory(network: &NetworkType) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let data_dir = get_network_data_dir(network);
        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "anonpool node".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                network: "testnet".to_string(),
            },
            network: NetworkConfig {
                listen_address: "0.0.0.0".to_string(),
                external_address: None,
                max_peers: 50,
                bootstrap_peers: vec![],
            },
            storage: StorageConfig {
                backend: "sled".to_string(),
                data_dir: String::new(),
                cache_size_mb: 256,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                output: "stdout".to_string(),
                file_path: "./logs/anonpool.log".to_string(),
            },
            inode: InodeConfig {
                enabled: false,
                collateral_txid: String::new(),
                signing_key_hex: String::new(),
            },
            mixing: MixingConfig::default(),
            security: SecurityConfig {
                enable_message_signing: true,
                message_max_age_seconds: 300,
            },
        }
    }

    pub fn load_or_create(
        path: &str,
        network_type: &NetworkType,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = get_network_data_dir(network_type);
        fs::create_dir_all(&data_dir)?;

        if fs::metadata(path).is_ok() {
            let contents = fs::read_to_string(path)?;
            let mut config: Config = toml::from_str(&contents)?;
            if config.storage.data_dir.is_empty() || config.storage.data_dir.starts_with("./") {
                config.storage.data_dir = data_dir.to_string_lossy().to_string();
            }
            Ok(config)
        } else {
            let mut config = Config::default();
            config.node.network = match network_type {
                NetworkType::Mainnet => "mainnet".to_string(),
                NetworkType::Testnet => "testnet".to_string(),
            };
            config.storage.data_dir = data_dir.to_string_lossy().to_string();
            config.save_to_file(path)?;
            Ok(config)
        }
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_mixing_disabled() {
        let config = Config::default();
        assert!(!config.mixing.enable_mixing);
        assert_eq!(config.mixing.rounds, 2);
    }

    #[test]
    fn load_or_create_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        let created = Config::load_or_create(path_str, &NetworkType::Testnet).unwrap();
        let loaded = Config::load_or_create(path_str, &NetworkType::Testnet).unwrap();
        assert_eq!(created.node.network, loaded.node.network);
    }
}
