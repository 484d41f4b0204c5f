use dengue_risk_rs::app_state::{ServiceConfig, ServiceState};
use serde_json::{Value, json};
use std::path::PathBuf;

/// Rainfall above 150mm with more than 20 water logging complaints is class 1.
pub fn tree_artifact() -> Value {
    json!({
        "type": "decision_tree",
        "feature_names": [
            "rainfall_mm",
            "avg_temp_c",
            "water_logging_complaints",
            "waste_complaints"
        ],
        "classes": [0, 1],
        "children_left": [1, -1, 3, -1, -1],
        "children_right": [2, -1, 4, -1, -1],
        "feature": [0, -2, 2, -2, -2],
        "threshold": [150.0, -2.0, 20.0, -2.0, -2.0],
        "value": [[30.0, 20.0], [25.0, 2.0], [5.0, 18.0], [4.0, 1.0], [1.0, 17.0]]
    })
}

pub fn state_from_artifact(artifact: &str) -> ServiceState {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("dengue_risk_model.json");
    std::fs::write(&model_path, artifact).unwrap();
    ServiceState::load(&ServiceConfig {
        model_path,
        ..ServiceConfig::default()
    })
}

pub fn loaded_state() -> ServiceState {
    let state = state_from_artifact(&tree_artifact().to_string());
    assert!(state.is_model_loaded());
    state
}

pub fn unloaded_state() -> ServiceState {
    ServiceState::new(None, PathBuf::from("dengue_risk_model.json"))
}

pub fn high_risk_instance() -> Value {
    json!({
        "rainfall_mm": 250,
        "avg_temp_c": 32,
        "water_logging_complaints": 40,
        "waste_complaints": 15
    })
}
