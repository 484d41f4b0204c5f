use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by `/predict`. Every variant is turned into a JSON
/// `{"error": ...}` body at the request boundary.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The artifact failed to load at startup; permanent until restart.
    #[error("Model is not loaded properly.")]
    ModelUnavailable,
    #[error("Missing key in request: '{0}'")]
    MissingField(String),
    #[error("Prediction error: {0}")]
    PredictionFailure(String),
    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
}

impl PredictError {
    pub fn inference(err: anyhow::Error) -> Self {
        PredictError::PredictionFailure(format!("{:#}", err))
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::ModelUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::MissingField(_) => StatusCode::BAD_REQUEST,
            PredictError::PredictionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
