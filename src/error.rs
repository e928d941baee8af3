use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Storage initialization error: {0}")]
    StorageInit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Mixing error: {0}")]
    Mixing(#[from] MixingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to open {name} database: {source}")]
    DatabaseOpen {
        name: String,
        #[source]
        source: sled::Error,
    },

    #[error("Database operation failed: {0}")]
    DatabaseOp(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error taxonomy for the mixing protocol core, per the protocol-level error
/// design: these never crash the node, they produce a rejection response
/// and/or a log line, always leaving the session in a well-defined state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixingError {
    #[error("peer protocol version {found} below minimum {required}")]
    VersionIncompatible { found: u32, required: u32 },

    #[error("vin is not a registered INODE")]
    NotInode,

    #[error("vin not present in the INODE registry")]
    NotInRegistry,

    #[error("queue advertisement rate limited")]
    RateLimited,

    #[error("not compatible with existing transactions.")]
    IncompatibleDenomination,

    #[error("incompatible session state for admission")]
    IncompatibleSessionState,

    #[error("session is full")]
    SessionFull,

    #[error("entry contains a null outpoint")]
    NullOutpoint,

    #[error("entry amount is negative")]
    NegativeAmount,

    #[error("collateral transaction not valid")]
    CollateralInvalid,

    #[error("input already used in this session")]
    DuplicateInput,

    #[error("output is not a standard payment script")]
    NonStandardOutput,

    #[error("entry total exceeds the pool maximum")]
    PoolMaxExceeded,

    #[error("fees are too high")]
    FeesTooHigh,

    #[error("missing input transaction")]
    MissingInput,

    #[error("transaction rejected by mempool policy")]
    MempoolRejected,

    #[error("client refuses to sign: final transaction does not match submitted entry")]
    SignatureRefused,

    #[error("{0}")]
    Timeout(String),

    #[error("internal failure: {0}")]
    FatalInternal(String),
}

impl MixingError {
    /// Human-readable text suitable for a `dssu`/`dsc` wire message.
    pub fn wire_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_denomination_matches_canonical_wire_text() {
        let err = MixingError::IncompatibleDenomination;
        assert_eq!(err.wire_message(), "not compatible with existing transactions.");
    }
}
