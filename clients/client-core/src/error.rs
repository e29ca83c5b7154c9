//! Client-side error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client runtime errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket operations before `connect` or after `disconnect`
    #[error("Not connected")]
    NotConnected,

    /// REST call failed
    #[error("API error: {0}")]
    Api(String),
}
