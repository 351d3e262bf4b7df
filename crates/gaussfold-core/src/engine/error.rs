use thiserror::Error;

use super::config::ConfigError;
use crate::core::alignment::AlignError;
use crate::core::graph::GraphError;
use crate::core::restraints::{ModelError, RestraintTableError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Contact graph construction failed: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Restraint model error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Failed to load restraint table: {source}")]
    RestraintTable {
        #[from]
        source: RestraintTableError,
    },

    #[error("Structural alignment failed: {source}")]
    Alignment {
        #[from]
        source: AlignError,
    },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}
