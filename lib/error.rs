//! Error type shared by all simulation components.

use thiserror::Error;
use crate::axy::Harmonic;

/// Failure modes of operator manipulation, clustering, and propagator
/// construction.
///
/// Precondition violations (bad operator shapes, bad qubit indices,
/// out-of-domain Fourier weights) abort the computation that raised them.
/// [`Self::IllConditioned`] and [`Self::CalibrationDiverged`] flag results
/// that could be computed only approximately, if at all.
#[derive(Debug, Error)]
pub enum NvError {
    #[error("operator must be square; got {0}×{1}")]
    NonSquare(usize, usize),

    #[error("operator dimension {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("operator of dimension {dim} cannot act on {qubits} qubit(s)")]
    QubitMismatch { dim: usize, qubits: usize },

    #[error("qubit index {0} out of range for a {1}-qubit system")]
    QubitOutOfRange(usize, usize),

    #[error("qubit index {0} appears more than once")]
    DuplicateQubit(usize),

    #[error(
        "Fourier weight {f} outside the domain |f| < {max} of the {harmonic} \
        harmonic"
    )]
    FourierWeight { harmonic: Harmonic, f: f64, max: f64 },

    #[error("no AXY harmonic k = {0}; expected 1 or 3")]
    BadHarmonic(u32),

    #[error("nucleus {0} does not belong to any cluster")]
    NotClustered(usize),

    #[error("clusters do not partition {0} nuclei")]
    BadPartition(usize),

    #[error("coupling calibration did not settle after {0} iterations")]
    CalibrationDiverged(usize),

    #[error("sub-block extraction is ill-conditioned (norm {0:e})")]
    IllConditioned(f64),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NvResult<T> = Result<T, NvError>;
