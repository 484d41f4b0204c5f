use crate::error::PredictError;
use crate::features::{FeatureRow, MODEL_FEATURES};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::{RawValue, to_raw_value};
use serde_json::{Map, Value};

/// One caller-supplied record. The echo keeps the caller's exact JSON text
/// so numbers that do not fit an `f64` come back unchanged.
#[derive(Debug, Clone)]
pub struct Instance {
    fields: Map<String, Value>,
    echo: Box<RawValue>,
}

impl Instance {
    pub fn from_value(value: Value) -> Result<Self, PredictError> {
        match value {
            Value::Object(fields) => {
                let echo = to_raw_value(&fields)
                    .map_err(|e| PredictError::PredictionFailure(e.to_string()))?;
                Ok(Instance { fields, echo })
            }
            other => Err(PredictError::PredictionFailure(format!(
                "instance must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Pull the schema features out in `MODEL_FEATURES` order.
    pub fn to_feature_row(&self) -> Result<FeatureRow, PredictError> {
        let mut values = [0.0; MODEL_FEATURES.len()];
        for (slot, name) in values.iter_mut().zip(MODEL_FEATURES) {
            let value = self
                .fields
                .get(name)
                .ok_or_else(|| PredictError::MissingField(name.to_string()))?;
            *slot = value.as_f64().ok_or_else(|| {
                PredictError::PredictionFailure(format!(
                    "feature '{}' must be a number, got {}",
                    name,
                    type_name(value)
                ))
            })?;
        }
        Ok(FeatureRow::new(values))
    }

    pub fn into_echo(self) -> Box<RawValue> {
        self.echo
    }
}

#[derive(Deserialize)]
struct RawInstances<'a> {
    #[serde(borrow)]
    instances: Vec<&'a RawValue>,
}

/// Body of `POST /predict`, validated before any inference runs.
#[derive(Debug, Clone)]
pub struct PredictReqInput {
    pub instances: Vec<Instance>,
}

impl PredictReqInput {
    pub fn from_slice(body: &[u8]) -> Result<Self, PredictError> {
        let json: Value = serde_json::from_slice(body)
            .map_err(|e| PredictError::PredictionFailure(format!("invalid JSON body: {}", e)))?;
        let mut req = Self::from_value(json)?;
        // Swap in the caller's own text for the echo; the parsed map above is
        // only used for feature extraction.
        if let Ok(raw) = serde_json::from_slice::<RawInstances<'_>>(body) {
            if let (Some(instance), Some(&echo)) =
                (req.instances.first_mut(), raw.instances.first())
            {
                instance.echo = echo.to_owned();
            }
        }
        Ok(req)
    }

    pub fn from_value(json: Value) -> Result<Self, PredictError> {
        let mut body = match json {
            Value::Object(body) => body,
            other => {
                return Err(PredictError::PredictionFailure(format!(
                    "request body must be a JSON object, got {}",
                    type_name(&other)
                )));
            }
        };
        let instances = match body.remove("instances") {
            None => return Err(PredictError::MissingField("instances".to_string())),
            Some(Value::Array(instances)) => instances,
            Some(other) => {
                return Err(PredictError::PredictionFailure(format!(
                    "'instances' must be a list, got {}",
                    type_name(&other)
                )));
            }
        };
        // Only the first instance is scored, the rest are never looked at.
        let first = instances
            .into_iter()
            .next()
            .ok_or_else(|| PredictError::MissingField("instances".to_string()))?;
        Ok(PredictReqInput {
            instances: vec![Instance::from_value(first)?],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLabel {
    High,
    Low,
}

impl RiskLabel {
    /// Class 1 is high risk; every other label, expected or not, is low risk.
    pub fn from_label(label: i64) -> Self {
        if label == 1 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::High => "HIGH RISK",
            RiskLabel::Low => "LOW RISK",
        }
    }
}

impl Serialize for RiskLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    pub prediction: RiskLabel,
    pub input_data_received: Box<RawValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionOutput>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_instance() -> Value {
        json!({
            "rainfall_mm": 250,
            "avg_temp_c": 32,
            "water_logging_complaints": 40,
            "waste_complaints": 15
        })
    }

    #[test]
    fn test_parse_keeps_only_first_instance() {
        let req = PredictReqInput::from_value(json!({
            "instances": [full_instance(), {"rainfall_mm": "ignored"}]
        }))
        .unwrap();
        assert_eq!(req.instances.len(), 1);
        let row = req.instances[0].to_feature_row().unwrap();
        assert_eq!(row.reorder(None).unwrap(), vec![250.0, 32.0, 40.0, 15.0]);
    }

    #[test]
    fn test_missing_or_empty_instances() {
        for body in [json!({}), json!({"instances": []})] {
            let err = PredictReqInput::from_value(body).unwrap_err();
            assert_eq!(err.to_string(), "Missing key in request: 'instances'");
        }
    }

    #[test]
    fn test_null_instances_is_prediction_failure() {
        let err = PredictReqInput::from_value(json!({"instances": null})).unwrap_err();
        assert!(matches!(err, PredictError::PredictionFailure(_)));
        assert_eq!(
            err.to_string(),
            "Prediction error: 'instances' must be a list, got null"
        );
    }

    #[test]
    fn test_missing_feature_names_the_key() {
        for name in MODEL_FEATURES {
            let mut instance = full_instance();
            instance.as_object_mut().unwrap().remove(name);
            let req = PredictReqInput::from_value(json!({ "instances": [instance] })).unwrap();
            let err = req.instances[0].to_feature_row().unwrap_err();
            assert!(matches!(&err, PredictError::MissingField(key) if key == name));
        }
    }

    #[test]
    fn test_first_missing_key_in_schema_order() {
        let req = PredictReqInput::from_value(json!({
            "instances": [{"rainfall_mm": 1}]
        }))
        .unwrap();
        let err = req.instances[0].to_feature_row().unwrap_err();
        assert_eq!(err.to_string(), "Missing key in request: 'avg_temp_c'");
    }

    #[test]
    fn test_malformed_shapes_are_prediction_failures() {
        let cases = [
            json!([1, 2, 3]),
            json!({"instances": {"rainfall_mm": 1}}),
            json!({"instances": [42]}),
        ];
        for body in cases {
            let err = PredictReqInput::from_value(body).unwrap_err();
            assert!(matches!(err, PredictError::PredictionFailure(_)));
        }

        let mut instance = full_instance();
        instance["avg_temp_c"] = json!("hot");
        let req = PredictReqInput::from_value(json!({ "instances": [instance] })).unwrap();
        let err = req.instances[0].to_feature_row().unwrap_err();
        assert!(matches!(err, PredictError::PredictionFailure(_)));
        assert!(err.to_string().contains("avg_temp_c"));

        let err = PredictReqInput::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, PredictError::PredictionFailure(_)));
    }

    #[test]
    fn test_echo_preserves_extra_keys_and_order() {
        let body = br#"{"instances":[{"waste_complaints":15,"note":"ward 7","rainfall_mm":250,"avg_temp_c":32,"water_logging_complaints":40}]}"#;
        let req = PredictReqInput::from_slice(body).unwrap();
        let echo = req.instances.into_iter().next().unwrap().into_echo();
        assert_eq!(
            echo.get(),
            r#"{"waste_complaints":15,"note":"ward 7","rainfall_mm":250,"avg_temp_c":32,"water_logging_complaints":40}"#
        );
    }

    #[test]
    fn test_echo_keeps_oversized_integers() {
        let body = br#"{"instances":[{"rainfall_mm":250,"avg_temp_c":32,"water_logging_complaints":40,"waste_complaints":123456789012345678901234}]}"#;
        let req = PredictReqInput::from_slice(body).unwrap();
        let row = req.instances[0].to_feature_row().unwrap();
        assert!(row.get("waste_complaints").is_some_and(|v| v > 1.2e23));
        let echo = req.instances.into_iter().next().unwrap().into_echo();
        assert!(echo.get().contains(r#""waste_complaints":123456789012345678901234"#));
    }

    #[test]
    fn test_label_mapping_is_binary() {
        assert_eq!(RiskLabel::from_label(1), RiskLabel::High);
        assert_eq!(RiskLabel::from_label(0), RiskLabel::Low);
        assert_eq!(RiskLabel::from_label(2), RiskLabel::Low);
        assert_eq!(RiskLabel::from_label(-1), RiskLabel::Low);
    }

    #[test]
    fn test_response_serialization() {
        let resp = PredictResponse {
            predictions: vec![PredictionOutput {
                prediction: RiskLabel::High,
                input_data_received: to_raw_value(&full_instance()).unwrap(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"predictions": [{"prediction": "HIGH RISK", "input_data_received": full_instance()}]})
        );
    }
}
