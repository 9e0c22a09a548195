//! Insertion hints for Liquity's sorted trove list.
//!
//! The list lives on chain and is never read in full. A position is found in
//! two remote steps: `HintHelpers.getApproxHint` samples random troves and
//! returns one whose nominal CR is close to the target, then
//! `SortedTroves.findInsertPosition` walks from that trove to the exact
//! neighbours. Each step depends on the previous one's output so the calls
//! run strictly in sequence.

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::error::{Result, SpellError};
use crate::types::{ApproxHint, HintQuery, InsertionHint, RedemptionHint, RedemptionHints};

/// Seed of the first approximate-hint query of a resolver.
pub const DEFAULT_RANDOM_SEED: u64 = 4223;
/// Seed used for trove-opening hints.
pub const TROVE_HINT_SEED: u64 = 1_298_379;
/// Number of troves `getApproxHint` samples.
pub const DEFAULT_SAMPLE_SIZE: u64 = 50;

/// Read-only Liquity queries the resolver depends on.
///
/// Implementations report transport failures and reverts as errors; the
/// resolver passes them on without retrying.
#[async_trait]
pub trait TroveHintOracle: Send + Sync {
    async fn compute_nominal_cr(&self, coll: U256, debt: U256) -> anyhow::Result<U256>;

    async fn get_approx_hint(
        &self,
        cr: U256,
        num_trials: U256,
        random_seed: U256,
    ) -> anyhow::Result<ApproxHint>;

    /// Returns `(upper, lower)` neighbours for `nicr`, starting the walk at
    /// `prev_id` / `next_id`.
    async fn find_insert_position(
        &self,
        nicr: U256,
        prev_id: Address,
        next_id: Address,
    ) -> anyhow::Result<(Address, Address)>;

    async fn fetch_price(&self) -> anyhow::Result<U256>;

    async fn get_redemption_hints(
        &self,
        lusd_amount: U256,
        price: U256,
        max_iterations: U256,
    ) -> anyhow::Result<RedemptionHint>;
}

/// Computes insertion hints and carries the random seed from one
/// approximate-hint query to the next.
///
/// The seed belongs to the resolver, and every query takes `&mut self`, so
/// callers that want independent seed sequences use separate resolvers.
#[derive(Debug)]
pub struct HintResolver<O> {
    oracle: O,
    seed: U256,
    sample_size: U256,
}

impl<O: TroveHintOracle> HintResolver<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            seed: U256::from(DEFAULT_RANDOM_SEED),
            sample_size: U256::from(DEFAULT_SAMPLE_SIZE),
        }
    }

    pub fn with_seed(mut self, seed: U256) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sample_size(mut self, sample_size: u64) -> Self {
        self.sample_size = U256::from(sample_size);
        self
    }

    /// Seed the next query without an explicit seed will use.
    pub fn seed(&self) -> U256 {
        self.seed
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Find the neighbours of `query.sort_key` in the sorted trove list.
    pub async fn resolve(&mut self, query: HintQuery) -> Result<InsertionHint> {
        let seed = query.seed.unwrap_or(self.seed);

        let approx = self
            .oracle
            .get_approx_hint(query.sort_key, self.sample_size, seed)
            .await
            .map_err(SpellError::remote("getApproxHint"))?;
        self.seed = approx.latest_random_seed;

        tracing::debug!(
            sort_key = %query.sort_key,
            seed = %seed,
            hint = %format!("{:#x}", approx.hint_address),
            next_seed = %approx.latest_random_seed,
            "approximate hint"
        );

        // a single candidate bounds the walk from both sides
        let (upper_hint, lower_hint) = self
            .oracle
            .find_insert_position(query.sort_key, approx.hint_address, approx.hint_address)
            .await
            .map_err(SpellError::remote("findInsertPosition"))?;

        Ok(InsertionHint {
            upper_hint,
            lower_hint,
        })
    }

    /// Hints for opening a trove with `deposit` collateral and `borrow` debt.
    pub async fn trove_insertion_hints(&mut self, deposit: U256, borrow: U256) -> Result<InsertionHint> {
        let nominal_cr = self
            .oracle
            .compute_nominal_cr(deposit, borrow)
            .await
            .map_err(SpellError::remote("computeNominalCR"))?;

        let hint = self
            .resolve(HintQuery::with_seed(nominal_cr, U256::from(TROVE_HINT_SEED)))
            .await?;
        tracing::info!(
            %deposit,
            %borrow,
            %nominal_cr,
            upper = %format!("{:#x}", hint.upper_hint),
            lower = %format!("{:#x}", hint.lower_hint),
            "trove insertion hints"
        );
        Ok(hint)
    }

    /// Hints for redeeming `amount` LUSD against the riskiest troves.
    pub async fn redemption_hints(&mut self, amount: U256) -> Result<RedemptionHints> {
        let price = self
            .oracle
            .fetch_price()
            .await
            .map_err(SpellError::remote("fetchPrice"))?;

        let redemption = self
            .oracle
            .get_redemption_hints(amount, price, U256::zero())
            .await
            .map_err(SpellError::remote("getRedemptionHints"))?;

        let hint = self
            .resolve(HintQuery::new(redemption.partial_redemption_hint_nicr))
            .await?;

        tracing::info!(
            %amount,
            %price,
            nicr = %redemption.partial_redemption_hint_nicr,
            first = %format!("{:#x}", redemption.first_redemption_hint),
            "redemption hints"
        );

        Ok(RedemptionHints {
            partial_redemption_hint_nicr: redemption.partial_redemption_hint_nicr,
            first_redemption_hint: redemption.first_redemption_hint,
            upper_hint: hint.upper_hint,
            lower_hint: hint.lower_hint,
        })
    }
}
