use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use web3::types::Address;

pub const DEFAULT_CONFIG_PATH: &str = "feed.yaml";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A price feed proxy to monitor and the name it is logged under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedDescriptor {
    #[serde(alias = "tokens")]
    pub label: String,
    pub address: Address,
}

impl FeedDescriptor {
    pub fn new(label: &str, address: &str) -> Result<Self> {
        let address = Address::from_str(address.trim_start_matches("0x"))
            .with_context(|| format!("invalid feed address {address}"))?;
        Ok(Self {
            label: label.to_string(),
            address,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
    pub feeds: Vec<FeedDescriptor>,
}

impl FeedConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed opening config file {}", path.display()))?;
        Self::from_yaml(&raw)
            .with_context(|| format!("failed decoding feed info from file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        if config.query_timeout_secs == Some(0) {
            bail!("query_timeout_secs must be positive");
        }
        Ok(config)
    }

    /// Mainnet feeds monitored when no config file is present.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            query_timeout_secs: None,
            feeds: vec![
                FeedDescriptor::new("ETH / USD", "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419")?,
                FeedDescriptor::new("LINK / ETH", "0xdc530d9457755926550b59e8eccdae7624181557")?,
                FeedDescriptor::new("USDT / ETH", "0xee9f2375b4bdf6387aa8265dd4fb8f16512a1d46")?,
            ],
        })
    }

    /// Loads `explicit` if given, otherwise `FEED_CONFIG` or `feed.yaml`, falling
    /// back to the built-in feeds only when the default file does not exist.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let requested = explicit
            .map(str::to_string)
            .or_else(|| std::env::var("FEED_CONFIG").ok());

        match requested {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::warn!(
                    path = DEFAULT_CONFIG_PATH,
                    "Feed config not found, using built-in feeds"
                );
                Self::builtin()
            }
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT)
    }
}

/// Node endpoint from the command line, `NODE_URL` or `ALCHEMY_URL`.
pub fn node_url(explicit: Option<String>) -> Result<String> {
    explicit
        .or_else(|| std::env::var("NODE_URL").ok())
        .or_else(|| std::env::var("ALCHEMY_URL").ok())
        .filter(|url| !url.is_empty())
        .context("NODE_URL must be set in the environment or .env file")
}
