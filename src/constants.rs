//! Protocol constants for the mixing subsystem.
//!
//! Several of these (pool size, fee, collateral) are economic parameters the
//! original implementation defined in a header outside the distilled source;
//! the values below are this implementation's chosen parameters, not a
//! decoded original. See DESIGN.md for the reasoning.

pub mod denomination {
    use crate::types::SATOSHIS_PER_TIME;

    /// Fixed ladder of allowed output values, largest first. Bit 0 (LSB) of
    /// a denomination bitmask corresponds to the largest denomination here.
    pub const LADDER: [u64; 7] = [
        1000 * SATOSHIS_PER_TIME,
        100 * SATOSHIS_PER_TIME,
        10 * SATOSHIS_PER_TIME,
        SATOSHIS_PER_TIME,
        SATOSHIS_PER_TIME / 10,
        SATOSHIS_PER_TIME / 100,
        SATOSHIS_PER_TIME / 1000,
    ];

    /// Bit 7 is reserved and always marks "a non-denominated value was
    /// present"; it is never set by `denom_bitmask` for a clean output set.
    pub const NON_DENOM_BIT: u8 = 1 << 7;
}

pub mod pool {
    use crate::types::SATOSHIS_PER_TIME;

    /// Largest denomination times 1001, mirroring the canonical
    /// `ANONSEND_POOL_MAX = 1001 * denom_unit` ceiling on total session value.
    pub const POOL_MAX: u64 = 1001 * 1000 * SATOSHIS_PER_TIME;

    /// Maximum number of entries (participants) admitted into one session.
    pub const POOL_MAX_TRANSACTIONS: usize = 3;

    /// Miner-fee slack tolerated between an entry's input sum and output sum,
    /// expressed as input_sum / FEE_SLACK_DIVISOR (i.e. 1%).
    pub const FEE_SLACK_DIVISOR: u64 = 100;
}

pub mod fees {
    use crate::types::SATOSHIS_PER_TIME;

    /// Fee deducted from a denominated output; also the sentinel value that
    /// marks a collateral-only change output (round-tracking sentinel -3).
    pub const ANON_FEE: u64 = SATOSHIS_PER_TIME / 10_000;

    /// Minimum (input - output) a collateral transaction must pay out.
    pub const COLLATERAL_FEE: u64 = SATOSHIS_PER_TIME / 10_000;

    /// Stake value the INODE registry expects collateral-bearing outputs to
    /// match when associating a vin with a registered pubkey.
    pub const COLLATERAL_STAKE: u64 = 100_000;
}

pub mod timing {
    /// How long a `DSQueue` advertisement remains valid after issuance.
    pub const QUEUE_TIMEOUT_SECS: i64 = 30;

    /// How long an entry may sit without all signatures before it's dropped.
    pub const ENTRY_TIMEOUT_SECS: i64 = 30;

    /// How long the `Signing` state may run before the session times out.
    pub const SIGNING_TIMEOUT_SECS: i64 = 30;

    /// Extra grace period clients (but not INODEs) give before declaring a
    /// timeout locally, covering one extra network round trip.
    pub const CLIENT_LAG_MS: i64 = 5_000;

    /// How long a terminal session (`Success`/`Error`) lingers before reset,
    /// so late-arriving protocol messages can be discarded deterministically.
    pub const TERMINAL_LINGER_MS: i64 = 10_000;

    /// Scheduler tick period driving timeouts, queue cleanup and liveness.
    pub const TICK_PERIOD_MS: u64 = 2_500;

    /// Minimum peer protocol version required to participate.
    pub const MIN_PEER_PROTO_VERSION: u32 = 70_015;

    /// Minimum blocks between successive automatic denomination runs.
    pub const MIN_BLOCK_SPACING: u64 = 1;

    /// Interval between INODE liveness pings.
    pub const INODE_PING_SECS: u64 = 60;
}

pub mod rounds {
    /// Maximum recursion depth `rounds()` will walk before giving up.
    pub const ROUND_CAP: u32 = 16;

    /// Sentinel returned when an output is not denominated at depth 0.
    pub const NOT_DENOMINATED: i32 = -2;

    /// Sentinel returned when an output's value equals `ANON_FEE`.
    pub const IS_ANON_FEE: i32 = -3;

    /// Sentinel returned on a bounds violation while walking ancestry.
    pub const BOUNDS_VIOLATION: i32 = -4;
}

/// Wire-level acceptance codes carried by `dssu`. Matches the canonical
/// three-value encoding from the source protocol bit-for-bit.
pub mod accepted {
    pub const INODE_REJECTED: i32 = 0;
    pub const INODE_ACCEPTED: i32 = 1;
    pub const INODE_RESET: i32 = -1;
}

pub mod network {
    /// Default buffer cap for a single framed message.
    pub const MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

    /// Bound on the INODE's broadcast-transaction record cache. The source
    /// protocol never evicts this set; we cap it with an LRU policy instead.
    pub const BROADCAST_TX_CACHE_SIZE: usize = 500;
}
