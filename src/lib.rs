pub mod config;
pub mod error;
pub mod fork;
pub mod hints;
pub mod liquity;
pub mod registry;
pub mod spells;
pub mod types;

pub use error::{Result, SpellError};
pub use hints::{HintResolver, TroveHintOracle};
pub use registry::{ConnectorInterface, InterfaceRegistry};
pub use spells::{encode_cast, encode_spell, encode_spells};
pub use types::{EncodedCall, EncodedSpells, HintQuery, InsertionHint, RedemptionHints, SpellArg, SpellRequest};
