use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{self, Function, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;
use serde_json::Value;

use crate::error::{Result, SpellError};
use crate::registry::InterfaceRegistry;
use crate::types::{EncodedCall, EncodedSpells, SpellArg, SpellRequest};

/// Encode a batch of spells into the `(targets, calldatas)` pair taken by
/// `cast`. Order is preserved. The first failing spell aborts the batch.
pub fn encode_spells(registry: &InterfaceRegistry, spells: &[SpellRequest]) -> Result<EncodedSpells> {
    let mut encoded = EncodedSpells::default();
    for (index, spell) in spells.iter().enumerate() {
        let call = encode_spell(registry, spell).map_err(|e| SpellError::Spell {
            index,
            source: Box::new(e),
        })?;
        encoded.push(call);
    }
    tracing::debug!(spells = encoded.len(), "encoded spell batch");
    Ok(encoded)
}

pub fn encode_spell(registry: &InterfaceRegistry, spell: &SpellRequest) -> Result<EncodedCall> {
    let function = registry.lookup(&spell.connector, &spell.method)?;
    let tokens = tokenize_args(function, spell)?;
    let payload = function.encode_input(&tokens)?;

    tracing::debug!(
        connector = %spell.connector,
        method = %spell.method,
        selector = %hex::encode(&payload[..4]),
        "encoded spell"
    );

    Ok(EncodedCall {
        target: spell.connector.clone(),
        payload: Bytes::from(payload),
    })
}

/// Calldata for the account's `cast(string[],bytes[],address)` entry point.
pub fn encode_cast(spells: &EncodedSpells, origin: Address) -> Bytes {
    let selector = &keccak256(b"cast(string[],bytes[],address)")[..4];
    let encoded = abi::encode(&[
        Token::Array(spells.targets.iter().cloned().map(Token::String).collect()),
        Token::Array(
            spells
                .calldatas
                .iter()
                .map(|data| Token::Bytes(data.to_vec()))
                .collect(),
        ),
        Token::Address(origin),
    ]);
    let mut data = selector.to_vec();
    data.extend_from_slice(&encoded);
    Bytes::from(data)
}

fn tokenize_args(function: &Function, spell: &SpellRequest) -> Result<Vec<Token>> {
    if function.inputs.len() != spell.args.len() {
        return Err(SpellError::ArgumentCountMismatch {
            connector: spell.connector.clone(),
            method: spell.method.clone(),
            expected: function.inputs.len(),
            got: spell.args.len(),
        });
    }

    function
        .inputs
        .iter()
        .zip(&spell.args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let token = match arg {
                SpellArg::Typed(token) => Some(token.clone()).filter(|t| t.type_check(&param.kind)),
                SpellArg::Raw(value) => coerce(&param.kind, value),
            };
            token.filter(|t| fits_width(t, &param.kind)).ok_or_else(|| SpellError::ArgumentTypeMismatch {
                connector: spell.connector.clone(),
                method: spell.method.clone(),
                index,
                expected: param.kind.to_string(),
            })
        })
        .collect()
}

/// Convert a JSON value into a token of the declared type.
///
/// Integers accept JSON numbers, decimal strings (with optional `ether`/`gwei`
/// units) and `0x` hex strings. Values above `u64::MAX` must be strings.
pub(crate) fn coerce(kind: &ParamType, value: &Value) -> Option<Token> {
    match (kind, value) {
        (ParamType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|v| coerce(inner, v))
            .collect::<Option<Vec<_>>>()
            .map(Token::Array),
        (ParamType::FixedArray(inner, len), Value::Array(items)) if items.len() == *len => items
            .iter()
            .map(|v| coerce(inner, v))
            .collect::<Option<Vec<_>>>()
            .map(Token::FixedArray),
        (ParamType::Tuple(kinds), Value::Array(items)) if items.len() == kinds.len() => kinds
            .iter()
            .zip(items)
            .map(|(k, v)| coerce(k, v))
            .collect::<Option<Vec<_>>>()
            .map(Token::Tuple),
        (ParamType::Uint(_), Value::String(s)) if s.starts_with("0x") => {
            let digits = &s[2..];
            if digits.is_empty() {
                return None;
            }
            let n = U256::from_str_radix(digits, 16).ok()?;
            Some(Token::Uint(n))
        }
        (ParamType::Array(_) | ParamType::FixedArray(..) | ParamType::Tuple(_), _) => None,
        (_, Value::String(s)) => LenientTokenizer::tokenize(kind, s).ok(),
        (ParamType::Uint(_) | ParamType::Int(_), Value::Number(n)) if n.is_u64() || n.is_i64() => {
            LenientTokenizer::tokenize(kind, &n.to_string()).ok()
        }
        (ParamType::Bool, Value::Bool(b)) => Some(Token::Bool(*b)),
        _ => None,
    }
}

/// Whether integer tokens fit the declared bit width. `Int` values are
/// two's complement in 256 bits, so every bit above the sign bit must copy it.
fn fits_width(token: &Token, kind: &ParamType) -> bool {
    match (token, kind) {
        (Token::Uint(n), ParamType::Uint(bits)) => n.bits() <= *bits,
        (Token::Int(n), ParamType::Int(bits)) => {
            if *bits >= 256 {
                return true;
            }
            let high = *n >> (*bits - 1);
            high.is_zero() || high == U256::MAX >> (*bits - 1)
        }
        (Token::Array(items) | Token::FixedArray(items), ParamType::Array(inner) | ParamType::FixedArray(inner, _)) => {
            items.iter().all(|t| fits_width(t, inner))
        }
        (Token::Tuple(items), ParamType::Tuple(kinds)) => {
            items.iter().zip(kinds).all(|(t, k)| fits_width(t, k))
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_accepts_decimal_and_hex_uints() {
        let kind = ParamType::Uint(256);
        assert_eq!(coerce(&kind, &json!(42)), Some(Token::Uint(U256::from(42))));
        assert_eq!(coerce(&kind, &json!("42")), Some(Token::Uint(U256::from(42))));
        assert_eq!(coerce(&kind, &json!("0x2a")), Some(Token::Uint(U256::from(42))));
    }

    #[test]
    fn coerce_rejects_bare_hex_prefix() {
        assert_eq!(coerce(&ParamType::Uint(256), &json!("0x")), None);
        assert_eq!(coerce(&ParamType::Uint(8), &json!("0x")), None);
    }

    #[test]
    fn width_check_uint_bounds() {
        let kind = ParamType::Uint(8);
        assert!(fits_width(&Token::Uint(U256::from(255)), &kind));
        assert!(!fits_width(&Token::Uint(U256::from(256)), &kind));
        assert!(fits_width(&Token::Uint(U256::MAX), &ParamType::Uint(256)));
    }

    #[test]
    fn width_check_int_sign_extension() {
        use ethers::types::I256;
        let kind = ParamType::Int(8);
        let int = |v: i64| Token::Int(I256::from(v).into_raw());
        assert!(fits_width(&int(127), &kind));
        assert!(fits_width(&int(-128), &kind));
        assert!(!fits_width(&int(128), &kind));
        assert!(!fits_width(&int(-129), &kind));
    }

    #[test]
    fn width_check_nested_arrays() {
        let kind = ParamType::Array(Box::new(ParamType::Uint(8)));
        let ok = Token::Array(vec![Token::Uint(U256::from(1)), Token::Uint(U256::from(2))]);
        let bad = Token::Array(vec![Token::Uint(U256::from(1)), Token::Uint(U256::from(300))]);
        assert!(fits_width(&ok, &kind));
        assert!(!fits_width(&bad, &kind));
    }

    #[test]
    fn coerce_rejects_fractional_numbers() {
        assert_eq!(coerce(&ParamType::Uint(256), &json!(1.5)), None);
    }

    #[test]
    fn coerce_arrays_element_wise() {
        let kind = ParamType::Array(Box::new(ParamType::Uint(256)));
        assert_eq!(
            coerce(&kind, &json!([0, "7"])),
            Some(Token::Array(vec![Token::Uint(U256::zero()), Token::Uint(U256::from(7))]))
        );
        assert_eq!(coerce(&kind, &json!([0, "nope"])), None);
        assert_eq!(coerce(&kind, &json!(0)), None);
    }

    #[test]
    fn coerce_address_with_prefix() {
        let addr: Address = "0x6b175474e89094c44da98b954eedeac495271d0f".parse().unwrap();
        assert_eq!(
            coerce(&ParamType::Address, &json!("0x6b175474e89094c44da98b954eedeac495271d0f")),
            Some(Token::Address(addr))
        );
        assert_eq!(coerce(&ParamType::Address, &json!(12)), None);
    }

    #[test]
    fn cast_calldata_has_cast_selector() {
        let spells = EncodedSpells {
            targets: vec!["basic".to_string()],
            calldatas: vec![Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])],
        };
        let data = encode_cast(&spells, Address::zero());
        assert_eq!(&data[..4], &keccak256(b"cast(string[],bytes[],address)")[..4]);
    }
}
