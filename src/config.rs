use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    pub rpc: RpcConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Enables EIP-155 replay protection when set
    #[serde(default)]
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Applied to each remote round-trip individually
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allow_write_operations: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "ethereum".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: Some(1),
            },
        );

        networks.insert(
            "sepolia".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-sepolia.g.alchemy.com/v2/demo".to_string(),
                chain_id: Some(11155111),
            },
        );

        networks.insert(
            "polygon".to_string(),
            NetworkConfig {
                rpc_url: "https://polygon-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: Some(137),
            },
        );

        networks.insert(
            "arbitrum".to_string(),
            NetworkConfig {
                rpc_url: "https://arb-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: Some(42161),
            },
        );

        networks.insert(
            "local".to_string(),
            NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: Some(31337),
            },
        );

        Self {
            networks,
            default_network: "ethereum".to_string(),
            rpc: RpcConfig { timeout_secs: 30 },
            security: SecurityConfig {
                allow_write_operations: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    fn validate(&self) -> Result<()> {
        if !self.networks.contains_key(&self.default_network) {
            return Err(anyhow!(
                "Default network '{}' is not configured",
                self.default_network
            ));
        }

        if self.rpc.timeout_secs == 0 {
            return Err(anyhow!("rpc.timeout_secs must be greater than zero"));
        }

        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    /// Apply environment variable substitutions to configuration
    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("ALCHEMY_API_KEY") {
            tracing::info!("Using ALCHEMY_API_KEY environment variable for RPC URLs");
            self.substitute_api_key(&api_key);
        } else {
            for (network_name, network_config) in &self.networks {
                if network_config.rpc_url.contains("/demo") {
                    tracing::warn!("Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability", network_name);
                }
            }
        }
    }

    fn substitute_api_key(&mut self, api_key: &str) {
        for (network_name, network_config) in &mut self.networks {
            if network_config.rpc_url.contains("alchemy.com/v2/demo") {
                network_config.rpc_url = network_config
                    .rpc_url
                    .replace("/demo", &format!("/{}", api_key));
                tracing::debug!("Updated {} RPC URL with API key", network_name);
            } else if network_config.rpc_url.contains("YOUR_API_KEY_HERE") {
                network_config.rpc_url = network_config
                    .rpc_url
                    .replace("YOUR_API_KEY_HERE", api_key);
                tracing::debug!("Updated {} RPC URL with API key", network_name);
            }
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("contract-caller").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Contract Caller Configuration File
# Networks are used when a request names a network instead of a provider URL

# Default network to use when none is specified
default_network = "ethereum"

[networks.ethereum]
rpc_url = "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 1

[networks.sepolia]
rpc_url = "https://eth-sepolia.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 11155111

[networks.polygon]
rpc_url = "https://polygon-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 137

[networks.arbitrum]
rpc_url = "https://arb-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 42161

# Local development node (anvil, hardhat). Omit chain_id to sign without
# replay protection.
[networks.local]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337

# Timeout applied to every remote round-trip (nonce, gas price, gas estimate,
# broadcast, call)
[rpc]
timeout_secs = 30

# Security settings
[security]
allow_write_operations = false

# Environment variables that can be used:
# ALCHEMY_API_KEY - Your Alchemy API key (replace YOUR_API_KEY_HERE above)
"#;
        sample_config.to_string()
    }
}
