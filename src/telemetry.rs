//! Tracing setup for embedding processes and tests

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::error::GraphError;

/// Filter applied on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVE: &str = "kinship_graph=info";

/// Install a fmt subscriber filtered by `RUST_LOG` plus [`DEFAULT_DIRECTIVE`].
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing() -> Result<(), GraphError> {
    let directive: Directive = DEFAULT_DIRECTIVE
        .parse()
        .map_err(|e| GraphError::Config(format!("Invalid log directive: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .try_init()
        .map_err(|e| GraphError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
