//! Error type shared by the Hamiltonian pipeline and the decay-channel
//! extender.

use thiserror::Error;

/// Result alias over [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions raised while constructing a rotating-frame Hamiltonian or
/// extending a decay model.
///
/// No operation in this crate returns partial output alongside an error.
#[derive(Debug, Error)]
pub enum Error {
    /// An upper-triangular coupling entry must hold exactly one oscillation
    /// frequency symbol.
    #[error("coupling entry ({row}, {col}) holds {} oscillation frequencies: [{}]", .found.len(), .found.join(", "))]
    FrequencyCount { row: usize, col: usize, found: Vec<String> },

    /// The phase-rate equations `ω = a_i - a_j` have no solution.
    #[error("phase-rate equations are inconsistent: 0 = {residual}")]
    InconsistentFrame { residual: String },

    /// A symbol appearing in a phase exponent was replaced by something that
    /// is not an integer combination of symbols.
    #[error("cannot substitute non-integer-linear expression for {symbol} inside a phase factor")]
    NonIntegerPhase { symbol: String },

    /// A coupling's main matrix element is zero, so Rabi amplitudes cannot be
    /// normalized against it.
    #[error("coupling {coupling} has a zero main coupling element")]
    ZeroMainCoupling { coupling: usize },

    #[error("no value bound for symbol {symbol}")]
    UnboundSymbol { symbol: String },

    #[error("length mismatch in {what}: expected {expected}, found {found}")]
    LengthMismatch { what: &'static str, expected: usize, found: usize },

    /// A coupling field matrix is not equal to its own conjugate transpose.
    #[error("field {field} of coupling {coupling} is not hermitian")]
    NonHermitianField { coupling: usize, field: usize },

    #[error("state {state} is not present in the basis")]
    MissingState { state: String },

    #[error("shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch { what: &'static str, expected: Vec<usize>, found: Vec<usize> },

    /// A decay channel's excited-state selector matched nothing.
    #[error("decay channel {channel} selects no excited states")]
    UnmatchedSelector { channel: usize },

    #[error("decay channel {channel} has branching {branching}, outside (0, 1]")]
    InvalidBranching { channel: usize, branching: f64 },

    #[error("total decay rate must be positive and finite, got {gamma}")]
    InvalidDecayRate { gamma: f64 },

    /// Added branching fractions into one excited level exceed unity.
    #[error("added branching into excited index {excited} totals {total} > 1")]
    BranchingOverflow { excited: usize, total: f64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
