//! Error taxonomy for the IRC core.
//!
//! Parser and dispatcher errors are pure values (no I/O happened to produce
//! them); `CoreError` covers the I/O boundary crossed by the pump, the
//! scheduler, and the facade.

use thiserror::Error;

/// The only way the line parser can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid IRC line")]
    InvalidLine,
}

/// Error surface exposed by the I/O-touching parts of the core: the
/// transport, the auth provider, and the facade that wires them together.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("cancelled")]
    Cancelled,
}
