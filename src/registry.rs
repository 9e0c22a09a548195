use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use ethers::abi::{AbiParser, Function};

use crate::error::{Result, SpellError};

/// Function descriptors of one connector, in declared order.
#[derive(Debug, Clone, Default)]
pub struct ConnectorInterface {
    functions: Vec<Function>,
    by_name: HashMap<String, usize>,
}

impl ConnectorInterface {
    pub fn new(functions: Vec<Function>) -> Self {
        let mut by_name = HashMap::with_capacity(functions.len());
        for (i, f) in functions.iter().enumerate() {
            // first declaration of a name wins
            by_name.entry(f.name.clone()).or_insert(i);
        }
        Self { functions, by_name }
    }

    /// Parse a JSON ABI array, keeping only `function` entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let items: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| SpellError::InvalidInterface(e.to_string()))?;

        let mut functions = Vec::new();
        for item in items {
            if item.get("type").and_then(|t| t.as_str()) != Some("function") {
                continue;
            }
            let function: Function = serde_json::from_value(item)
                .map_err(|e| SpellError::InvalidInterface(e.to_string()))?;
            functions.push(function);
        }
        Ok(Self::new(functions))
    }

    /// Build from human-readable signatures such as
    /// `"function deposit(address token, uint256 amt)"`.
    pub fn from_signatures(signatures: &[&str]) -> Result<Self> {
        let mut parser = AbiParser::default();
        let functions = signatures
            .iter()
            .map(|sig| {
                let sig = sig.trim();
                let sig = sig.strip_prefix("function ").unwrap_or(sig);
                parser
                    .parse_function(sig)
                    .map_err(|e| SpellError::InvalidInterface(format!("{sig}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(functions))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).map(|&i| &self.functions[i])
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }
}

/// Connector name to interface table. Aliases share one interface.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    connectors: HashMap<String, Arc<ConnectorInterface>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connector: impl Into<String>, interface: ConnectorInterface) -> &mut Self {
        self.connectors.insert(connector.into(), Arc::new(interface));
        self
    }

    /// Make `alias` resolve to the interface already registered as `connector`.
    pub fn alias(&mut self, alias: impl Into<String>, connector: &str) -> Result<&mut Self> {
        let interface = self.interface(connector)?.clone();
        self.connectors.insert(alias.into(), interface);
        Ok(self)
    }

    pub fn from_json<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut registry = Self::new();
        for (connector, json) in entries {
            registry.register(connector, ConnectorInterface::from_json(json)?);
        }
        Ok(registry)
    }

    pub fn interface(&self, connector: &str) -> Result<&Arc<ConnectorInterface>> {
        self.connectors
            .get(connector)
            .ok_or_else(|| SpellError::InterfaceNotFound {
                connector: connector.to_string(),
            })
    }

    pub fn lookup(&self, connector: &str, method: &str) -> Result<&Function> {
        self.interface(connector)?
            .function(method)
            .ok_or_else(|| SpellError::FunctionNotFound {
                connector: connector.to_string(),
                method: method.to_string(),
            })
    }

    pub fn contains(&self, connector: &str) -> bool {
        self.connectors.contains_key(connector)
    }

    pub fn connector_names(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    /// Registry of the connectors shipped with the crate. A bundled ABI that
    /// fails to load stays an error on every call.
    pub fn builtin() -> Result<&'static InterfaceRegistry> {
        static BUILTIN: OnceLock<std::result::Result<InterfaceRegistry, String>> = OnceLock::new();
        load_once(&BUILTIN, load_builtin)
    }
}

fn load_once(
    cell: &'static OnceLock<std::result::Result<InterfaceRegistry, String>>,
    load: impl FnOnce() -> Result<InterfaceRegistry>,
) -> Result<&'static InterfaceRegistry> {
    cell.get_or_init(|| load().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| SpellError::InvalidInterface(e.clone()))
}

const BASIC_ABI: &str = include_str!("../abi/connectors/basic.json");
const AUTH_ABI: &str = include_str!("../abi/connectors/auth.json");
const INSTAPOOL_ABI: &str = include_str!("../abi/connectors/instapool.json");
const ONE_INCH_ABI: &str = include_str!("../abi/connectors/one-inch.json");
const MAKER_ABI: &str = include_str!("../abi/connectors/maker.json");
const ONE_PROTO_ABI: &str = include_str!("../abi/connectors/one-proto.json");
const LIQUITY_ABI: &str = include_str!("../abi/connectors/liquity.json");

fn load_builtin() -> Result<InterfaceRegistry> {
    let mut registry = InterfaceRegistry::from_json([
        ("Basic-v1", BASIC_ABI),
        ("auth", AUTH_ABI),
        ("INSTAPOOL-A", INSTAPOOL_ABI),
        ("1INCH-A", ONE_INCH_ABI),
        ("1INCH-B", ONE_PROTO_ABI),
        ("MAKERDAO-A", MAKER_ABI),
        ("LIQUITY-v1", LIQUITY_ABI),
    ])?;
    registry.alias("basic", "Basic-v1")?;
    registry.alias(crate::liquity::LIQUITY_CONNECTOR, "LIQUITY-v1")?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_abis_parse() {
        assert!(load_builtin().is_ok());
    }

    #[test]
    fn non_function_entries_are_skipped() {
        let json = r#"[
            {"type":"event","name":"LogDeposit","anonymous":false,"inputs":[]},
            {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"}
        ]"#;
        let iface = ConnectorInterface::from_json(json).unwrap();
        assert_eq!(iface.functions().len(), 1);
        assert!(iface.function("name").is_some());
        assert!(iface.function("LogDeposit").is_none());
    }

    #[test]
    fn failed_load_is_kept_as_error() {
        static CELL: OnceLock<std::result::Result<InterfaceRegistry, String>> = OnceLock::new();
        let first = load_once(&CELL, || ConnectorInterface::from_json("[").map(|_| InterfaceRegistry::new()));
        assert!(matches!(first, Err(SpellError::InvalidInterface(_))));

        // the loader never runs again and the error does not turn into an empty registry
        let second = load_once(&CELL, || Ok(InterfaceRegistry::new()));
        assert!(matches!(second, Err(SpellError::InvalidInterface(_))));
    }

    #[test]
    fn builtin_loads() {
        let registry = InterfaceRegistry::builtin().unwrap();
        assert!(registry.contains("Basic-v1"));
    }

    #[test]
    fn malformed_json_is_invalid_interface() {
        let err = ConnectorInterface::from_json("{not json").unwrap_err();
        assert!(matches!(err, SpellError::InvalidInterface(_)));
    }
}
