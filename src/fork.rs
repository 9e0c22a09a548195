//! Forked-node helpers for hardhat-compatible dev nodes.

use anyhow::{Context, Result};
use ethers::abi::{self, Token};
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use ethers::utils::keccak256;
use serde_json::json;

use crate::config::Config;

pub fn provider(config: &Config) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(config.fork_rpc_url.as_str())
        .with_context(|| format!("invalid rpc url {}", config.fork_rpc_url))
}

/// Re-fork `upstream_url` at `block`, dropping all local state.
pub async fn reset_fork<P: JsonRpcClient>(provider: &Provider<P>, upstream_url: &str, block: u64) -> Result<()> {
    let params = [json!({
        "forking": {
            "jsonRpcUrl": upstream_url,
            "blockNumber": block,
        }
    })];
    provider
        .request::<_, serde_json::Value>("hardhat_reset", params)
        .await
        .with_context(|| format!("hardhat_reset to block {block}"))?;
    tracing::info!(block, "fork reset");
    Ok(())
}

pub async fn impersonate<P: JsonRpcClient>(provider: &Provider<P>, account: Address) -> Result<()> {
    provider
        .request::<_, serde_json::Value>("hardhat_impersonateAccount", [account])
        .await
        .with_context(|| format!("impersonating {account:#x}"))?;
    tracing::debug!(account = %format!("{account:#x}"), "impersonating account");
    Ok(())
}

pub(crate) fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    let selector = &keccak256(b"transfer(address,uint256)")[..4];
    let encoded = abi::encode(&[Token::Address(to), Token::Uint(amount)]);
    let mut data = selector.to_vec();
    data.extend_from_slice(&encoded);
    Bytes::from(data)
}

/// Move `amount` of an ERC20 from `from` (impersonated) to `to`, at zero gas price.
pub async fn send_token<P: JsonRpcClient>(
    provider: &Provider<P>,
    token: Address,
    amount: U256,
    from: Address,
    to: Address,
) -> Result<H256> {
    impersonate(provider, from).await?;

    let tx = TransactionRequest::new()
        .from(from)
        .to(token)
        .data(transfer_calldata(to, amount))
        .gas_price(0u64);

    tracing::info!(
        token = %format!("{token:#x}"),
        from = %format!("{from:#x}"),
        to = %format!("{to:#x}"),
        %amount,
        "sending token from impersonated holder"
    );
    let pending = provider.send_transaction(tx, None).await?;
    let receipt = pending.await?
        .ok_or_else(|| anyhow::anyhow!("token transfer tx dropped"))?;
    tracing::info!(tx = %format!("{:#x}", receipt.transaction_hash), "token transfer confirmed");
    Ok(receipt.transaction_hash)
}
