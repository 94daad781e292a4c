use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fulfillment_engine::traits::FulfillmentError;
use gateway_tools::GatewayApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Caller identity headers are missing or malformed. {0}")]
    MissingIdentity(String),
    #[error("The payment gateway could not be reached or gave an unusable answer. {0}")]
    GatewayUnavailable(String),
    #[error("The gateway declined the charge: {0}")]
    PaymentDeclined(String),
    #[error(
        "The payment is successful but the order could not be created. Reference {0}. Support has been alerted."
    )]
    FulfillmentInconsistency(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::FulfillmentInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<FulfillmentError> for ServerError {
    fn from(e: FulfillmentError) -> Self {
        match e {
            FulfillmentError::PaymentNotFound(_)
            | FulfillmentError::OrderNotFound(_)
            | FulfillmentError::BuyerNotFound(_)
            | FulfillmentError::NoOpenBasket(_)
            | FulfillmentError::BasketNotFound(_) => Self::NoRecordFound(e.to_string()),
            FulfillmentError::EmptyBasket(_) | FulfillmentError::DeliveryAddressMissing(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            FulfillmentError::OrderCreationFailed { ref reference, .. } => {
                Self::FulfillmentInconsistency(reference.clone())
            },
            FulfillmentError::DatabaseError(ref msg) => Self::BackendError(msg.clone()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<GatewayApiError> for ServerError {
    fn from(e: GatewayApiError) -> Self {
        Self::GatewayUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fulfillment_errors_map_to_the_right_status_codes() {
        let e: ServerError = FulfillmentError::PaymentNotFound("MPS-X".into()).into();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        let e: ServerError = FulfillmentError::OrderCreationFailed {
            reference: "MPS-X".into(),
            payment_id: 1,
            reason: "stock".into(),
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let e: ServerError = GatewayApiError::Transport("timeout".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
    }
}
