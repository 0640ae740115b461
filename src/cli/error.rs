//! CLI error types and conversions

use crate::dispatcher::TransportError;
use crate::fetcher::FetcherError;
use crate::identifier::IdentifierError;
use crate::output::OutputError;
use crate::resolver::ResolveError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Leaderboard URL rejected
    #[error("{0}")]
    IdentifierError(#[from] IdentifierError),

    /// Leaderboard could not be resolved
    #[error("resolve error: {0}")]
    ResolveError(#[from] ResolveError),

    /// Traversal failed
    #[error("fetch error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output could not be written
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// HTTP client could not be built
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
