use anyhow::{Context, Result};
use serde::Serialize;

use crate::hints::DEFAULT_SAMPLE_SIZE;
use crate::liquity::{LIQUIDATABLE_TROVES_BLOCK_NUMBER, MAX_GAS};

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Node the fixtures talk to (a hardhat/anvil fork).
    pub fork_rpc_url: String,
    /// Archive node the fork is reset against.
    pub upstream_rpc_url: Option<String>,
    pub fork_block_number: u64,
    pub max_gas: u64,
    pub hint_sample_size: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let fork_rpc_url = env_or("FORK_RPC_URL", "http://127.0.0.1:8545");
        url::Url::parse(&fork_rpc_url).with_context(|| format!("invalid FORK_RPC_URL: {fork_rpc_url}"))?;

        let upstream_rpc_url = std::env::var("UPSTREAM_RPC_URL").ok().filter(|s| !s.is_empty());
        if let Some(upstream) = &upstream_rpc_url {
            url::Url::parse(upstream).with_context(|| format!("invalid UPSTREAM_RPC_URL: {upstream}"))?;
        }

        Ok(Self {
            fork_rpc_url,
            upstream_rpc_url,
            fork_block_number: parse_env("FORK_BLOCK_NUMBER", LIQUIDATABLE_TROVES_BLOCK_NUMBER)?,
            max_gas: parse_env("MAX_GAS", MAX_GAS)?,
            hint_sample_size: parse_env("HINT_SAMPLE_SIZE", DEFAULT_SAMPLE_SIZE)?,
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .replace('_', "")
            .parse()
            .with_context(|| format!("invalid integer for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
