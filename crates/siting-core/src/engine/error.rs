use super::config::ConfigError;
use crate::core::models::candidate::CandidateError;
use crate::core::models::ids::CandidateId;
use crate::core::models::raster::{Layer, RasterError};
use crate::core::spatial::adjacency::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Candidate {0} has no rasters in the layer store")]
    UnknownIdentifier(CandidateId),

    #[error("Candidate {id} is missing its {layer} layer")]
    MissingLayer { id: CandidateId, layer: Layer },

    #[error("Invalid candidate set: {source}")]
    Candidate {
        #[from]
        source: CandidateError,
    },

    #[error("Adjacency graph error: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Raster error: {source}")]
    Raster {
        #[from]
        source: RasterError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}
