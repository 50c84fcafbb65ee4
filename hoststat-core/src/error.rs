use thiserror::Error;

use crate::bus::SubscriptionId;

/// Errors raised while turning a snapshot into bytes or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed snapshot payload: {0}")]
    Decode(String),
    #[error("{field} reading {value} is outside 0..=100")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

/// Errors raised by a bus backend.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("subscription {0} is not active")]
    UnknownSubscription(SubscriptionId),
}

/// A host record or topic namespace that cannot be accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("invalid topic namespace `{0}`")]
    InvalidNamespace(String),
}
