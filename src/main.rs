use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ethers::types::{Address, U256};

use dsa_spells::config::Config;
use dsa_spells::liquity::{LiquityAddresses, RpcHintOracle};
use dsa_spells::{encode_cast, encode_spells, fork, HintResolver, InterfaceRegistry, SpellRequest};

const USAGE: &str = "usage:
  dsa-spells encode <spells.json|->
  dsa-spells cast <spells.json|-> <origin>
  dsa-spells trove-hints <deposit_wei> <borrow_wei>
  dsa-spells redemption-hints <lusd_wei>
  dsa-spells reset-fork";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.parse().unwrap_or_default()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["encode", path] => {
            let spells = read_spells(path)?;
            let encoded = encode_spells(InterfaceRegistry::builtin()?, &spells)?;
            println!("{}", serde_json::to_string_pretty(&encoded)?);
        }
        ["cast", path, origin] => {
            let origin: Address = origin.parse().with_context(|| format!("invalid origin {origin}"))?;
            let spells = read_spells(path)?;
            let encoded = encode_spells(InterfaceRegistry::builtin()?, &spells)?;
            println!("{}", encode_cast(&encoded, origin));
        }
        ["trove-hints", deposit, borrow] => {
            let mut resolver = resolver(&config)?;
            let hint = resolver
                .trove_insertion_hints(parse_wei(deposit)?, parse_wei(borrow)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&hint)?);
        }
        ["redemption-hints", amount] => {
            let mut resolver = resolver(&config)?;
            let hints = resolver.redemption_hints(parse_wei(amount)?).await?;
            println!("{}", serde_json::to_string_pretty(&hints)?);
        }
        ["reset-fork"] => {
            let Some(upstream) = config.upstream_rpc_url.as_deref() else {
                bail!("UPSTREAM_RPC_URL is required to reset the fork");
            };
            let provider = fork::provider(&config)?;
            fork::reset_fork(&provider, upstream, config.fork_block_number).await?;
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}

fn resolver(config: &Config) -> Result<HintResolver<RpcHintOracle<ethers::providers::Provider<ethers::providers::Http>>>> {
    let provider = Arc::new(fork::provider(config)?);
    let oracle = RpcHintOracle::new(provider, &LiquityAddresses::mainnet()?, config.max_gas)?;
    tracing::info!(rpc = %config.fork_rpc_url, "querying liquity hint helpers");
    Ok(HintResolver::new(oracle).with_sample_size(config.hint_sample_size))
}

fn read_spells(path: &str) -> Result<Vec<SpellRequest>> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parsing spells from {path}"))
}

fn parse_wei(raw: &str) -> Result<U256> {
    U256::from_dec_str(raw).map_err(|e| anyhow::anyhow!("invalid amount {raw}: {e}"))
}
