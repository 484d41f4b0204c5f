use crate::error::PredictError;

/// Feature names the risk model was trained on, in training order.
pub const MODEL_FEATURES: [&str; 4] = [
    "rainfall_mm",
    "avg_temp_c",
    "water_logging_complaints",
    "waste_complaints",
];

/// A single labeled row handed to the classifier.
///
/// Values are always stored in `MODEL_FEATURES` order, so a row can only be
/// built from a complete set of schema values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: [f64; MODEL_FEATURES.len()],
}

impl FeatureRow {
    pub fn new(values: [f64; MODEL_FEATURES.len()]) -> Self {
        FeatureRow { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        MODEL_FEATURES
            .iter()
            .position(|feature| *feature == name)
            .map(|idx| self.values[idx])
    }

    /// Arrange the row in the column order an artifact was fitted with.
    ///
    /// `None` means the artifact carries no names and takes the schema order as is.
    pub fn reorder(&self, names: Option<&[String]>) -> Result<Vec<f64>, PredictError> {
        let Some(names) = names else {
            return Ok(self.values.to_vec());
        };
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    PredictError::PredictionFailure(format!(
                        "model expects feature '{}' which is not part of the request schema",
                        name
                    ))
                })
            })
            .collect()
    }
}
