use crate::events::BatchState;
use vector::BoostError;

#[derive(Debug, thiserror::Error)]
pub enum PhaseSpaceError {
    #[error("decay is kinematically forbidden: {0}")]
    KinematicallyForbidden(String),

    #[error("invalid mass: {0}")]
    InvalidMass(String),

    #[error("{0} daughters requested, at most {1} are supported")]
    TooManyDaughters(usize, usize),

    #[error("invalid boost velocity |beta| = {0}, it must be below 1")]
    InvalidBoostVelocity(f64),

    #[error("degenerate event: {0}")]
    DegenerateEvent(&'static str),

    #[error("cannot unweight with maximum weight {0}")]
    Unweightable(f64),

    #[error("batch holds {found} daughters per event, the decay has {expected}")]
    BatchShapeMismatch { expected: usize, found: usize },

    #[error("{mothers} mothers given for a batch of {events} events")]
    BatchSizeMismatch { mothers: usize, events: usize },

    #[error("batch was already generated (state {0:?})")]
    BatchAlreadyGenerated(BatchState),

    #[error("batch is not complete (state {0:?})")]
    BatchNotComplete(BatchState),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read run card: {0}")]
    RunCard(#[from] serde_yaml::Error),
}

impl From<BoostError> for PhaseSpaceError {
    fn from(e: BoostError) -> PhaseSpaceError {
        match e {
            BoostError::InvalidBoostVelocity { beta } => PhaseSpaceError::InvalidBoostVelocity(beta),
        }
    }
}
