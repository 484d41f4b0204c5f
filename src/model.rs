use crate::error::PredictError;
use crate::features::{FeatureRow, MODEL_FEATURES};
use anyhow::{Context, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Anything that can turn a labeled feature row into a class label.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Column names the model was fitted with, if the exporter recorded them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Classify a row that is already in the model's column order.
    fn predict_values(&self, x: &[f64]) -> anyhow::Result<i64>;

    fn predict(&self, row: &FeatureRow) -> Result<i64, PredictError> {
        let x = row.reorder(self.feature_names())?;
        self.predict_values(&x).map_err(PredictError::inference)
    }
}

fn default_classes() -> Vec<i64> {
    vec![0, 1]
}

fn default_threshold() -> f64 {
    0.5
}

/// Index of the largest entry; the first one wins on ties.
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn check_width(x: &[f64], n_features: usize) -> anyhow::Result<()> {
    ensure!(
        x.len() == n_features,
        "X has {} features, but the model is expecting {} features as input",
        x.len(),
        n_features
    );
    Ok(())
}

fn check_feature_names(names: Option<&[String]>, n_features: usize) -> anyhow::Result<()> {
    if let Some(names) = names {
        ensure!(
            names.len() == n_features,
            "feature_names has {} entries but the model uses {} features",
            names.len(),
            n_features
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogisticRegression {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
}

impl LogisticRegression {
    pub fn probability(&self, x: &[f64]) -> f64 {
        let z: f64 = self
            .coef
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.coef.is_empty(), "logistic regression has no coefficients");
        ensure!(
            self.classes.len() == 2,
            "logistic regression must have exactly 2 classes, got {}",
            self.classes.len()
        );
        ensure!(
            (0.0..=1.0).contains(&self.threshold),
            "threshold {} is outside [0, 1]",
            self.threshold
        );
        check_feature_names(self.feature_names.as_deref(), self.coef.len())
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_values(&self, x: &[f64]) -> anyhow::Result<i64> {
        check_width(x, self.coef.len())?;
        let p = self.probability(x);
        ensure!(p.is_finite(), "decision function is not finite");
        Ok(if p > self.threshold {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}

/// A fitted tree exported as scikit-learn's parallel node arrays.
/// Node 0 is the root and a node with `children_left == -1` is a leaf.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionTree {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights, one entry per class.
    pub value: Vec<Vec<f64>>,
}

const TREE_LEAF: i64 = -1;

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> anyhow::Result<()> {
        let n_nodes = self.children_left.len();
        ensure!(n_nodes > 0, "tree has no nodes");
        ensure!(
            self.children_right.len() == n_nodes
                && self.feature.len() == n_nodes
                && self.threshold.len() == n_nodes
                && self.value.len() == n_nodes,
            "tree node arrays have mismatched lengths"
        );
        for node in 0..n_nodes {
            ensure!(
                self.value[node].len() == n_classes,
                "node {} has {} class weights, expected {}",
                node,
                self.value[node].len(),
                n_classes
            );
            let left = self.children_left[node];
            if left == TREE_LEAF {
                continue;
            }
            let right = self.children_right[node];
            // Children always come after their parent, which rules out cycles.
            for child in [left, right] {
                ensure!(
                    child > node as i64 && (child as usize) < n_nodes,
                    "node {} has invalid child index {}",
                    node,
                    child
                );
            }
            let feature = self.feature[node];
            ensure!(
                feature >= 0 && (feature as usize) < n_features,
                "node {} splits on feature index {} but the model has {} features",
                node,
                feature,
                n_features
            );
        }
        Ok(())
    }

    fn leaf(&self, x: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != TREE_LEAF {
            // Inputs are compared at f32 precision, the way the tree was fitted.
            let value = x[self.feature[node] as usize] as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Class probabilities at the leaf reached by `x`.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let weights = &self.value[self.leaf(x)];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            weights.clone()
        }
    }

    fn n_features(&self) -> usize {
        self.feature_names
            .as_ref()
            .map_or(MODEL_FEATURES.len(), |names| names.len())
    }
}

impl Classifier for DecisionTree {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_values(&self, x: &[f64]) -> anyhow::Result<i64> {
        check_width(x, self.n_features())?;
        let proba = self.predict_proba(x);
        let idx = argmax(&proba).ok_or_else(|| anyhow!("tree leaf has no classes"))?;
        Ok(self.classes[idx])
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RandomForest {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub estimators: Vec<DecisionTree>,
}

impl RandomForest {
    fn n_features(&self) -> usize {
        self.feature_names
            .as_ref()
            .map_or(MODEL_FEATURES.len(), |names| names.len())
    }

    /// Mean of the per-tree class probabilities.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.estimators {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *acc += p;
            }
        }
        let n = self.estimators.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_values(&self, x: &[f64]) -> anyhow::Result<i64> {
        check_width(x, self.n_features())?;
        let proba = self.predict_proba(x);
        let idx = argmax(&proba).ok_or_else(|| anyhow!("forest has no classes"))?;
        Ok(self.classes[idx])
    }
}

/// On-disk inference artifact, tagged by `"type"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl ModelArtifact {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            ModelArtifact::LogisticRegression(lr) => lr.validate(),
            ModelArtifact::DecisionTree(tree) => {
                ensure!(!tree.classes.is_empty(), "tree has no classes");
                tree.validate(tree.n_features(), tree.classes.len())
            }
            ModelArtifact::RandomForest(forest) => {
                ensure!(!forest.classes.is_empty(), "forest has no classes");
                if forest.estimators.is_empty() {
                    bail!("forest has no estimators");
                }
                for (i, tree) in forest.estimators.iter().enumerate() {
                    tree.validate(forest.n_features(), forest.classes.len())
                        .with_context(|| format!("estimator {}", i))?;
                }
                Ok(())
            }
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ModelArtifact::LogisticRegression(lr) => lr,
            ModelArtifact::DecisionTree(tree) => tree,
            ModelArtifact::RandomForest(forest) => forest,
        }
    }
}

impl Classifier for ModelArtifact {
    fn kind(&self) -> &'static str {
        self.inner().kind()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.inner().feature_names()
    }

    fn predict_values(&self, x: &[f64]) -> anyhow::Result<i64> {
        self.inner().predict_values(x)
    }
}

/// Read and validate the artifact at `path`.
pub fn load_model(path: impl AsRef<Path>) -> anyhow::Result<ModelArtifact> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model artifact {}", path.display()))?;
    let artifact = ModelArtifact::from_json(&json)
        .with_context(|| format!("invalid model artifact {}", path.display()))?;
    if let Some(names) = artifact.feature_names() {
        for name in names {
            if !MODEL_FEATURES.contains(&name.as_str()) {
                log::warn!(
                    "Model feature '{}' is not in the request schema; predictions will fail",
                    name
                );
            }
        }
    }
    Ok(artifact)
}
