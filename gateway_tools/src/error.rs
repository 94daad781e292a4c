use thiserror::Error;

/// Errors from the gateway adapters. Every variant is recoverable from the pipeline's point of
/// view: the payment stays pending and the caller is free to verify again later. A charge the
/// gateway definitively declined is not an error; it comes back as
/// [`crate::VerificationOutcome::Declined`].
#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the gateway: {0}")]
    Transport(String),
    #[error("Could not deserialize the gateway response: {0}")]
    JsonError(String),
    #[error("Gateway call failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway response is missing a required field: {0}")]
    MissingField(String),
    #[error("The webhook signature is invalid: {0}")]
    InvalidSignature(String),
}
