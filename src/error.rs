//! Error types for kinship-graph

use thiserror::Error;

use crate::graph::validation::Rejection;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Traversal timeout: {0}")]
    Timeout(String),

    #[error("Traversal cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraphError {
    /// The structural rejection carried by this error, if any
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GraphError::Rejected(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound(_))
    }
}
