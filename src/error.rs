use thiserror::Error;

pub type Result<T, E = SpellError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SpellError {
    #[error("no interface registered for connector {connector:?}")]
    InterfaceNotFound { connector: String },

    #[error("connector {connector:?} has no function named {method:?}")]
    FunctionNotFound { connector: String, method: String },

    #[error("{connector}.{method} takes {expected} arguments, got {got}")]
    ArgumentCountMismatch {
        connector: String,
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("{connector}.{method} argument {index} is not a valid {expected}")]
    ArgumentTypeMismatch {
        connector: String,
        method: String,
        index: usize,
        expected: String,
    },

    /// Failure of a single request inside a batch; `index` is its position.
    #[error("spell {index} failed: {source}")]
    Spell {
        index: usize,
        #[source]
        source: Box<SpellError>,
    },

    #[error("abi encoding failed: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("invalid interface definition: {0}")]
    InvalidInterface(String),

    /// Failure reported by a remote query, passed through untouched.
    #[error("remote call {step} failed: {source}")]
    RemoteCall {
        step: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SpellError {
    pub(crate) fn remote(step: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::RemoteCall {
            step,
            source: source.into(),
        }
    }

    /// The error behind any batch-position wrapper.
    pub fn root(&self) -> &SpellError {
        match self {
            Self::Spell { source, .. } => source.root(),
            other => other,
        }
    }
}
