use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ethers::abi::{self, parse_abi, Token};
use ethers::contract::Contract;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;

use crate::hints::TroveHintOracle;
use crate::registry::InterfaceRegistry;
use crate::spells::{encode_cast, encode_spells};
use crate::types::{ApproxHint, InsertionHint, RedemptionHint, RedemptionHints, SpellArg, SpellRequest};

pub const LIQUITY_CONNECTOR: &str = "LIQUITY-v1-TEST";
pub const INSTADAPP_BASIC_V1_CONNECTOR: &str = "Basic-v1";

/// Block at which the fork holds liquidatable troves. Fixtures depend on the
/// exact state at this height.
pub const LIQUIDATABLE_TROVES_BLOCK_NUMBER: u64 = 12_723_709;
pub const MAX_GAS: u64 = 12_000_000;

/// LQTY whale.
pub const JUSTIN_SUN_ADDRESS: &str = "0x903d12bf2c57a29f32365917c706ce0e1a84cce3";
/// Liquidatable at `LIQUIDATABLE_TROVES_BLOCK_NUMBER`.
pub const LIQUIDATABLE_TROVE_ADDRESS: &str = "0xafbeb4cb97f3b08ec2fe07ef0dac15d37013a347";
/// Placeholder address DSA connectors use for native ETH.
pub const ETH_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";
pub const DAI_ADDRESS: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

const TROVE_MANAGER: &str = "0xA39739EF8b0231DbFA0DcdA07d7e29faAbCf4bb2";
const BORROWER_OPERATIONS: &str = "0x24179CD81c9e782A4096035f7eC97fB8B783e007";
const STABILITY_POOL: &str = "0x66017D22b0f8556afDd19FC67041899Eb65a21bb";
const LUSD_TOKEN: &str = "0x5f98805A4E8be255a32880FDeC7F6728C6568bA0";
const LQTY_TOKEN: &str = "0x6DEA81C8171D0bA574754EF6F8b412F2Ed88c54D";
const ACTIVE_POOL: &str = "0xDf9Eb223bAFBE5c5271415C75aeCD68C21fE3D7F";
const PRICE_FEED: &str = "0x4c517D4e2C851CA76d7eC94B805269Df0f2201De";
const HINT_HELPERS: &str = "0xE84251b93D9524E0d2e621Ba7dc7cb3579F997C0";
const SORTED_TROVES: &str = "0x8FdD3fbFEb32b28fb73555518f8b361bCeA741A6";
const STAKING: &str = "0x4f9Fbb3f1E99B56e0Fe2892e623Ed36A76Fc605d";
const COLL_SURPLUS_POOL: &str = "0x3D32e8b97Ed5881324241Cf03b2DA5E2EBcE5521";

/// 200 LUSD, repaid to the borrower when a trove is closed.
pub fn lusd_gas_compensation() -> U256 {
    U256::from(200) * U256::exp10(18)
}

/// Max borrowing/redemption fee passed to `open` and `redeemCollateral`,
/// 0.5 as an 18-decimal fraction. Must stay above Liquity's 0.5% fee floor.
pub fn default_max_fee_percentage() -> U256 {
    U256::from(5) * U256::exp10(17)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquityAddresses {
    pub trove_manager: Address,
    pub borrower_operations: Address,
    pub stability_pool: Address,
    pub lusd_token: Address,
    pub lqty_token: Address,
    pub active_pool: Address,
    pub price_feed: Address,
    pub hint_helpers: Address,
    pub sorted_troves: Address,
    pub staking: Address,
    pub coll_surplus_pool: Address,
}

impl LiquityAddresses {
    pub fn mainnet() -> Result<Self> {
        Ok(Self {
            trove_manager: TROVE_MANAGER.parse()?,
            borrower_operations: BORROWER_OPERATIONS.parse()?,
            stability_pool: STABILITY_POOL.parse()?,
            lusd_token: LUSD_TOKEN.parse()?,
            lqty_token: LQTY_TOKEN.parse()?,
            active_pool: ACTIVE_POOL.parse()?,
            price_feed: PRICE_FEED.parse()?,
            hint_helpers: HINT_HELPERS.parse()?,
            sorted_troves: SORTED_TROVES.parse()?,
            staking: STAKING.parse()?,
            coll_surplus_pool: COLL_SURPLUS_POOL.parse()?,
        })
    }
}

/// `TroveHintOracle` backed by the deployed Liquity contracts.
pub struct RpcHintOracle<M> {
    hint_helpers: Contract<M>,
    sorted_troves: Contract<M>,
    price_feed: Contract<M>,
    gas_limit: U256,
}

impl<M: Middleware + 'static> RpcHintOracle<M> {
    pub fn new(client: Arc<M>, addresses: &LiquityAddresses, gas_limit: u64) -> Result<Self> {
        let hint_helpers = parse_abi(&[
            "function computeNominalCR(uint256 _coll, uint256 _debt) external pure returns (uint256)",
            "function getApproxHint(uint256 _CR, uint256 _numTrials, uint256 _inputRandomSeed) external view returns (address hintAddress, uint256 diff, uint256 latestRandomSeed)",
            "function getRedemptionHints(uint256 _LUSDamount, uint256 _price, uint256 _maxIterations) external view returns (address firstRedemptionHint, uint256 partialRedemptionHintNICR, uint256 truncatedLUSDamount)",
        ])?;
        let sorted_troves = parse_abi(&[
            "function findInsertPosition(uint256 _NICR, address _prevId, address _nextId) external view returns (address, address)",
        ])?;
        let price_feed = parse_abi(&["function fetchPrice() external returns (uint256)"])?;

        Ok(Self {
            hint_helpers: Contract::new(addresses.hint_helpers, hint_helpers, client.clone()),
            sorted_troves: Contract::new(addresses.sorted_troves, sorted_troves, client.clone()),
            price_feed: Contract::new(addresses.price_feed, price_feed, client),
            gas_limit: U256::from(gas_limit),
        })
    }
}

#[async_trait]
impl<M: Middleware + 'static> TroveHintOracle for RpcHintOracle<M> {
    async fn compute_nominal_cr(&self, coll: U256, debt: U256) -> Result<U256> {
        let nicr = self
            .hint_helpers
            .method::<_, U256>("computeNominalCR", (coll, debt))?
            .call()
            .await?;
        Ok(nicr)
    }

    async fn get_approx_hint(&self, cr: U256, num_trials: U256, random_seed: U256) -> Result<ApproxHint> {
        let (hint_address, diff, latest_random_seed) = self
            .hint_helpers
            .method::<_, (Address, U256, U256)>("getApproxHint", (cr, num_trials, random_seed))?
            .gas(self.gas_limit)
            .call()
            .await?;
        Ok(ApproxHint {
            hint_address,
            diff,
            latest_random_seed,
        })
    }

    async fn find_insert_position(&self, nicr: U256, prev_id: Address, next_id: Address) -> Result<(Address, Address)> {
        let neighbours = self
            .sorted_troves
            .method::<_, (Address, Address)>("findInsertPosition", (nicr, prev_id, next_id))?
            .gas(self.gas_limit)
            .call()
            .await?;
        Ok(neighbours)
    }

    async fn fetch_price(&self) -> Result<U256> {
        // state-changing on chain; eth_call gives the price without a tx
        let price = self.price_feed.method::<_, U256>("fetchPrice", ())?.call().await?;
        Ok(price)
    }

    async fn get_redemption_hints(&self, lusd_amount: U256, price: U256, max_iterations: U256) -> Result<RedemptionHint> {
        let (first_redemption_hint, partial_redemption_hint_nicr, truncated_amount) = self
            .hint_helpers
            .method::<_, (Address, U256, U256)>("getRedemptionHints", (lusd_amount, price, max_iterations))?
            .call()
            .await?;
        Ok(RedemptionHint {
            first_redemption_hint,
            partial_redemption_hint_nicr,
            truncated_amount,
        })
    }
}

/// Spell opening a trove through the Liquity connector.
pub fn open_trove_spell(deposit: U256, borrow: U256, hint: InsertionHint, max_fee_percentage: U256) -> SpellRequest {
    let no_ids = || Token::Array(vec![Token::Uint(U256::zero()), Token::Uint(U256::zero())]);
    SpellRequest::new(
        LIQUITY_CONNECTOR,
        "open",
        vec![
            Token::Uint(deposit),
            Token::Uint(max_fee_percentage),
            Token::Uint(borrow),
            Token::Address(hint.upper_hint),
            Token::Address(hint.lower_hint),
            no_ids(),
            no_ids(),
        ]
        .into_iter()
        .map(SpellArg::from)
        .collect(),
    )
}

/// `cast` calldata opening a trove for `origin`. The transaction must carry
/// `deposit` wei as value.
pub fn open_trove_cast(
    registry: &InterfaceRegistry,
    deposit: U256,
    borrow: U256,
    hint: InsertionHint,
    max_fee_percentage: U256,
    origin: Address,
) -> crate::error::Result<Bytes> {
    let spells = encode_spells(registry, &[open_trove_spell(deposit, borrow, hint, max_fee_percentage)])?;
    Ok(encode_cast(&spells, origin))
}

/// Calldata for `TroveManager.redeemCollateral`.
pub fn redeem_collateral_calldata(amount: U256, hints: &RedemptionHints, max_fee_percentage: U256) -> Bytes {
    let selector =
        &keccak256(b"redeemCollateral(uint256,address,address,address,uint256,uint256,uint256)")[..4];
    let encoded = abi::encode(&[
        Token::Uint(amount),
        Token::Address(hints.first_redemption_hint),
        Token::Address(hints.upper_hint),
        Token::Address(hints.lower_hint),
        Token::Uint(hints.partial_redemption_hint_nicr),
        Token::Uint(U256::zero()),
        Token::Uint(max_fee_percentage),
    ]);
    let mut data = selector.to_vec();
    data.extend_from_slice(&encoded);
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn mainnet_addresses() {
        let addrs = LiquityAddresses::mainnet().unwrap();
        assert_eq!(addrs.trove_manager, addr("0xa39739ef8b0231dbfa0dcda07d7e29faabcf4bb2"));
        assert_eq!(addrs.borrower_operations, addr("0x24179cd81c9e782a4096035f7ec97fb8b783e007"));
        assert_eq!(addrs.stability_pool, addr("0x66017d22b0f8556afdd19fc67041899eb65a21bb"));
        assert_eq!(addrs.lusd_token, addr("0x5f98805a4e8be255a32880fdec7f6728c6568ba0"));
        assert_eq!(addrs.lqty_token, addr("0x6dea81c8171d0ba574754ef6f8b412f2ed88c54d"));
        assert_eq!(addrs.active_pool, addr("0xdf9eb223bafbe5c5271415c75aecd68c21fe3d7f"));
        assert_eq!(addrs.price_feed, addr("0x4c517d4e2c851ca76d7ec94b805269df0f2201de"));
        assert_eq!(addrs.hint_helpers, addr("0xe84251b93d9524e0d2e621ba7dc7cb3579f997c0"));
        assert_eq!(addrs.sorted_troves, addr("0x8fdd3fbfeb32b28fb73555518f8b361bcea741a6"));
        assert_eq!(addrs.staking, addr("0x4f9fbb3f1e99b56e0fe2892e623ed36a76fc605d"));
        assert_eq!(addrs.coll_surplus_pool, addr("0x3d32e8b97ed5881324241cf03b2da5e2ebce5521"));
    }

    #[test]
    fn max_fee_is_half_in_wad() {
        assert_eq!(default_max_fee_percentage(), U256::from(500_000_000_000_000_000u64));
    }

    #[test]
    fn redeem_calldata_layout() {
        let hints = RedemptionHints {
            partial_redemption_hint_nicr: U256::from(7),
            first_redemption_hint: Address::repeat_byte(1),
            upper_hint: Address::repeat_byte(2),
            lower_hint: Address::repeat_byte(3),
        };
        let data = redeem_collateral_calldata(U256::from(1000), &hints, default_max_fee_percentage());
        // selector + seven static words
        assert_eq!(data.len(), 4 + 7 * 32);
        assert_eq!(data[4 + 31], 0xe8);
        assert_eq!(&data[4 + 32 + 12..4 + 64], Address::repeat_byte(1).as_bytes());
    }
}
