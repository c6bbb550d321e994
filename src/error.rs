use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while validating inputs or persisting calibration constants.
///
/// Propagation rounds never fail: every variant is detected before a round runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `bit_budget / register_width` is not a power of two
    #[error("registers per node must be a power of two, got {registers} ({bits} bits / {width} bits per register)")]
    RegistersNotPowerOfTwo {
        bits: usize,
        width: u32,
        registers: usize,
    },

    #[error("bit budget {bits} is not a multiple of register width {width}")]
    BitBudgetNotDivisible { bits: usize, width: u32 },

    #[error("register width must be in [1..16] range, got {0}")]
    RegisterWidthOutOfRange(u32),

    #[error("expected {nodes} resource flags, got {flags}")]
    ResourceFlagsLength { nodes: usize, flags: usize },

    /// A [`RankSampler`](crate::sampler::RankSampler) returned an index outside the node's registers
    #[error("sampled register index {idx} for node {node} out of range for {registers} registers")]
    SampledIndexOutOfRange {
        node: usize,
        idx: usize,
        registers: usize,
    },

    #[error("resource probability must be in [0, 1], got {0}")]
    ResourceProbability(f64),

    #[error("configured {configured} nodes but topology has {topology}")]
    NodeCountMismatch { configured: usize, topology: usize },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Calibration constant requested for an empty register set
    #[error("register count must be positive, got {0}")]
    InvalidRegisterCount(usize),

    #[error("ground-truth radius must be non-negative, got {0}")]
    NegativeRadius(i64),

    #[error("estimate and truth vectors differ in length: {estimates} vs {truth}")]
    LengthMismatch { estimates: usize, truth: usize },

    #[error("calibration cache I/O: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("calibration cache format: {0}")]
    CacheFormat(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error rejects a network or simulation configuration
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            Error::RegistersNotPowerOfTwo { .. }
                | Error::BitBudgetNotDivisible { .. }
                | Error::RegisterWidthOutOfRange(_)
                | Error::ResourceFlagsLength { .. }
                | Error::SampledIndexOutOfRange { .. }
                | Error::ResourceProbability(_)
                | Error::NodeCountMismatch { .. }
                | Error::InvalidTopology(_)
        )
    }

    /// Whether the error rejects an argument of a single operation
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Error::InvalidRegisterCount(_)
                | Error::NegativeRadius(_)
                | Error::LengthMismatch { .. }
        )
    }
}
