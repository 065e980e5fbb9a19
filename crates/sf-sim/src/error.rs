use sf_fleet::FleetError;
use sf_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("no saved state under key {0:?}")]
    MissingState(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error("state blob could not be (de)serialized: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type SimResult<T> = Result<T, SimError>;
