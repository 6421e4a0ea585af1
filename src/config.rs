use crate::error::ConfigError;
use std::net::SocketAddr;
use url::Url;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_WALLET_URL: &str = "http://localhost:8545";
const DEFAULT_CHAINS: &str = "1,10,56,137,8453,42161,11155111";
const DEFAULT_SIGNATURE_URL: &str = "https://api.openchain.xyz";
const DEFAULT_ABI_URL: &str = "https://sourcify.dev/server";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    /// Base that relative redirect targets resolve against.
    pub origin: Url,
    pub wallet_url: String,
    pub supported_chains: Vec<u64>,
    pub signature_url: String,
    pub abi_url: String,
    /// Skip signature and ABI lookups entirely.
    pub offline: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let listen = get("RPC_LINK_LISTEN", DEFAULT_LISTEN)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "RPC_LINK_LISTEN",
                reason: e.to_string(),
            })?;

        let origin = Url::parse(&get("RPC_LINK_ORIGIN", DEFAULT_ORIGIN)).map_err(|e| {
            ConfigError::Invalid {
                key: "RPC_LINK_ORIGIN",
                reason: e.to_string(),
            }
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "RPC_LINK_ORIGIN",
                reason: format!("expected an http(s) url, got {origin}"),
            });
        }

        let supported_chains = parse_chain_list(&get("RPC_LINK_CHAINS", DEFAULT_CHAINS))?;

        let offline = matches!(
            get("RPC_LINK_OFFLINE", "false").to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        Ok(Self {
            listen,
            origin,
            wallet_url: get("RPC_LINK_WALLET_URL", DEFAULT_WALLET_URL),
            supported_chains,
            signature_url: get("RPC_LINK_SIGNATURE_URL", DEFAULT_SIGNATURE_URL),
            abi_url: get("RPC_LINK_ABI_URL", DEFAULT_ABI_URL),
            offline,
        })
    }
}

fn parse_chain_list(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| match id.parse::<u64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ConfigError::Invalid {
                key: "RPC_LINK_CHAINS",
                reason: format!("bad chain id {id:?}"),
            }),
        })
        .collect()
}
