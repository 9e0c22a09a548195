use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One argument of a spell.
///
/// `Typed` values must already match the declared parameter type. `Raw`
/// values come from JSON spell files and are coerced by the declared type at
/// encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum SpellArg {
    Typed(Token),
    Raw(serde_json::Value),
}

impl From<Token> for SpellArg {
    fn from(token: Token) -> Self {
        Self::Typed(token)
    }
}

impl From<serde_json::Value> for SpellArg {
    fn from(value: serde_json::Value) -> Self {
        Self::Raw(value)
    }
}

impl From<Address> for SpellArg {
    fn from(addr: Address) -> Self {
        Self::Typed(Token::Address(addr))
    }
}

impl From<U256> for SpellArg {
    fn from(value: U256) -> Self {
        Self::Typed(Token::Uint(value))
    }
}

impl From<u64> for SpellArg {
    fn from(value: u64) -> Self {
        Self::Typed(Token::Uint(U256::from(value)))
    }
}

/// A single `{connector, method, args}` call request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSpell")]
pub struct SpellRequest {
    pub connector: String,
    pub method: String,
    pub args: Vec<SpellArg>,
}

impl SpellRequest {
    pub fn new(
        connector: impl Into<String>,
        method: impl Into<String>,
        args: Vec<SpellArg>,
    ) -> Self {
        Self {
            connector: connector.into(),
            method: method.into(),
            args,
        }
    }
}

#[derive(Deserialize)]
struct RawSpell {
    connector: String,
    method: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

impl From<RawSpell> for SpellRequest {
    fn from(raw: RawSpell) -> Self {
        Self {
            connector: raw.connector,
            method: raw.method,
            args: raw.args.into_iter().map(SpellArg::Raw).collect(),
        }
    }
}

/// One encoded spell: the connector name it targets and its calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub target: String,
    pub payload: Bytes,
}

/// Encoded batch, laid out as the two parallel arrays `cast` expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodedSpells {
    pub targets: Vec<String>,
    pub calldatas: Vec<Bytes>,
}

impl EncodedSpells {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub(crate) fn push(&mut self, call: EncodedCall) {
        self.targets.push(call.target);
        self.calldatas.push(call.payload);
    }

    pub fn calls(&self) -> impl Iterator<Item = EncodedCall> + '_ {
        self.targets
            .iter()
            .zip(&self.calldatas)
            .map(|(target, payload)| EncodedCall {
                target: target.clone(),
                payload: payload.clone(),
            })
    }
}

/// A position to look up in the sorted trove list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintQuery {
    /// Nominal collateral ratio of the entry being inserted.
    pub sort_key: U256,
    /// Seed override; `None` continues the resolver's running seed.
    pub seed: Option<U256>,
}

impl HintQuery {
    pub fn new(sort_key: U256) -> Self {
        Self { sort_key, seed: None }
    }

    pub fn with_seed(sort_key: U256, seed: U256) -> Self {
        Self {
            sort_key,
            seed: Some(seed),
        }
    }
}

/// Result of `HintHelpers.getApproxHint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproxHint {
    pub hint_address: Address,
    pub diff: U256,
    pub latest_random_seed: U256,
}

/// Adjacent troves between which a new entry belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionHint {
    pub upper_hint: Address,
    pub lower_hint: Address,
}

/// Result of `HintHelpers.getRedemptionHints`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionHint {
    pub first_redemption_hint: Address,
    pub partial_redemption_hint_nicr: U256,
    pub truncated_amount: U256,
}

/// Everything `TroveManager.redeemCollateral` needs besides amount and fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionHints {
    pub partial_redemption_hint_nicr: U256,
    pub first_redemption_hint: Address,
    pub upper_hint: Address,
    pub lower_hint: Address,
}
