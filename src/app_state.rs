use crate::error::PredictError;
use crate::io_struct::{PredictReqInput, PredictResponse, PredictionOutput, RiskLabel};
use crate::model::{Classifier, load_model};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub max_payload_size: usize,
}

/// Only the first instance is scored, but callers may send large batches.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: PathBuf::from("dengue_risk_model.json"),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Shared, read-only state behind every request. The model is loaded once
/// before the server binds and never changes afterwards.
#[derive(Clone)]
pub struct ServiceState {
    pub model: Option<Arc<dyn Classifier>>,
    pub model_path: PathBuf,
    pub max_payload_size: usize,
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("model", &self.model.as_ref().map(|m| m.kind()))
            .field("model_path", &self.model_path)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}

impl ServiceState {
    pub fn new(model: Option<Arc<dyn Classifier>>, model_path: PathBuf) -> Self {
        ServiceState {
            model,
            model_path,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Load the artifact named in `config`. A failed load is logged and
    /// leaves the service up without a model.
    pub fn load(config: &ServiceConfig) -> Self {
        let model: Option<Arc<dyn Classifier>> = match load_model(&config.model_path) {
            Ok(model) => {
                log::info!(
                    "Model loaded successfully from {} ({}, features: {})",
                    config.model_path.display(),
                    model.kind(),
                    model
                        .feature_names()
                        .map(|names| names.join(", "))
                        .unwrap_or_else(|| "unnamed".to_string())
                );
                Some(Arc::new(model))
            }
            Err(e) => {
                log::error!("Error loading model: {:#}", e);
                None
            }
        };
        ServiceState::new(model, config.model_path.clone())
            .with_max_payload_size(config.max_payload_size)
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn predict(&self, body: &[u8]) -> Result<PredictResponse, PredictError> {
        let model = self.model.as_ref().ok_or(PredictError::ModelUnavailable)?;
        let req = PredictReqInput::from_slice(body)?;
        let instance = req
            .instances
            .into_iter()
            .next()
            .ok_or_else(|| PredictError::MissingField("instances".to_string()))?;
        let row = instance.to_feature_row()?;
        let label = model.predict(&row)?;
        Ok(PredictResponse {
            predictions: vec![PredictionOutput {
                prediction: RiskLabel::from_label(label),
                input_data_received: instance.into_echo(),
            }],
        })
    }
}
