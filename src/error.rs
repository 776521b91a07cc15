use crate::domain::Selector;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Raised synchronously when an operation requires a capability the selector's variant
    /// does not have, before any network call is made.
    #[error("selector '{0}' is not acceptable for this operation")]
    UnacceptableSelector(Selector),
    /// The remote service could not be reached or the request failed in transit. Opaque to
    /// the core beyond "the operation failed".
    #[error("remote service request failed: {0}")]
    Transport(String),
    #[error("remote service returned a malformed payload: {0}")]
    InvalidPayload(String),
    #[error("remote service rejected the access token (HTTP {0})")]
    Unauthorized(u16),
    #[error("remote service is rate limiting requests")]
    RateLimited,
    #[error("remote service answered with unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    /// The client this light target was created from has been dropped.
    #[error("the client behind this light target no longer exists")]
    ClientGone,
}
