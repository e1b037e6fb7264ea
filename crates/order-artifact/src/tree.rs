//! Gradient-boosted decision tree ensemble stored as JSON.
//!
//! Each tree contributes a raw margin to one output. Margins are summed per
//! output on top of `base_score` and turned into a prediction by the
//! objective:
//!
//! - `binary`: one output, sigmoid; `classes[1]` when p >= 0.5
//! - `multiclass`: one output per class (`tree.class`), softmax, argmax
//! - `regression`: one output, identity; the label is the formatted value
//!
//! Splits send a row left when `value <= threshold`. NaN follows
//! `default_left`.

use serde::{Deserialize, Serialize};

use order_model::{FeatureVector, Prediction};

use crate::predictor::{ModelError, Predictor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Binary,
    Multiclass,
    Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_left")]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

fn default_left() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Output this tree adds to; always 0 outside multiclass.
    #[serde(default)]
    pub class: usize,
    pub nodes: Vec<Node>,
}

impl Tree {
    fn evaluate(&self, values: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = values[*feature];
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    // Children always point forward, so evaluation terminates.
    fn validate(&self, tree_idx: usize, feature_count: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(invalid(format!("tree {tree_idx} has no nodes")));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                feature,
                left,
                right,
                threshold,
                ..
            } = node
            else {
                continue;
            };
            if *feature >= feature_count {
                return Err(invalid(format!(
                    "tree {tree_idx} node {idx} splits on feature {feature}, model has {feature_count}"
                )));
            }
            if threshold.is_nan() {
                return Err(invalid(format!("tree {tree_idx} node {idx} has a NaN threshold")));
            }
            for child in [*left, *right] {
                if child <= idx || child >= self.nodes.len() {
                    return Err(invalid(format!(
                        "tree {tree_idx} node {idx} has invalid child {child}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A boosted forest plus the metadata needed to interpret its margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeEnsemble {
    pub objective: Objective,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let ensemble: Self = serde_json::from_str(text)
            .map_err(|error| invalid(format!("failed to parse model JSON: {error}")))?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            return Err(invalid("model lists no feature names"));
        }
        let outputs = self.output_count();
        match self.objective {
            Objective::Binary if self.classes.len() != 2 => {
                return Err(invalid(format!(
                    "binary model needs 2 classes, found {}",
                    self.classes.len()
                )));
            }
            Objective::Multiclass if self.classes.len() < 2 => {
                return Err(invalid(format!(
                    "multiclass model needs at least 2 classes, found {}",
                    self.classes.len()
                )));
            }
            _ => {}
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            if tree.class >= outputs {
                return Err(invalid(format!(
                    "tree {idx} targets output {}, model has {outputs}",
                    tree.class
                )));
            }
            tree.validate(idx, self.feature_names.len())?;
        }
        Ok(())
    }

    fn output_count(&self) -> usize {
        match self.objective {
            Objective::Multiclass => self.classes.len(),
            Objective::Binary | Objective::Regression => 1,
        }
    }

    fn margins(&self, values: &[f64]) -> Vec<f64> {
        let mut margins = vec![self.base_score; self.output_count()];
        for tree in &self.trees {
            margins[tree.class] += tree.evaluate(values);
        }
        margins
    }

    fn interpret(&self, margins: &[f64]) -> Prediction {
        match self.objective {
            Objective::Binary => {
                let p = sigmoid(margins[0]);
                if p >= 0.5 {
                    Prediction::new(self.classes[1].clone(), p)
                } else {
                    Prediction::new(self.classes[0].clone(), 1.0 - p)
                }
            }
            Objective::Multiclass => {
                let probs = softmax(margins);
                let (best, score) = probs
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (idx, p)| {
                        if p > acc.1 { (idx, p) } else { acc }
                    });
                Prediction::new(self.classes[best].clone(), score)
            }
            Objective::Regression => Prediction::new(margins[0].to_string(), margins[0]),
        }
    }
}

impl Predictor for TreeEnsemble {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Prediction>, ModelError> {
        let expected = self.feature_names.len();
        features
            .iter()
            .enumerate()
            .map(|(index, vector)| {
                let values = vector.values();
                if values.len() != expected {
                    return Err(ModelError::FeatureCount {
                        index,
                        expected,
                        actual: values.len(),
                    });
                }
                Ok(self.interpret(&self.margins(&values)))
            })
            .collect()
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn describe(&self) -> String {
        format!(
            "{:?} tree ensemble ({} trees, {} features)",
            self.objective,
            self.trees.len(),
            self.feature_names.len()
        )
    }
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::InvalidModel(message.into())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump_json() -> &'static str {
        r#"{
            "objective": "binary",
            "classes": ["0", "1"],
            "base_score": 0.0,
            "feature_names": ["DelayOrdered", "market"],
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": -0.5, "left": 1, "right": 2, "default_left": false},
                    {"leaf": 2.0},
                    {"leaf": -2.0}
                ]}
            ]
        }"#
    }

    fn vector(delay: f64) -> FeatureVector {
        FeatureVector::new(vec![
            ("DelayOrdered".to_string(), delay),
            ("market".to_string(), 0.0),
        ])
    }

    #[test]
    fn binary_stump_splits_on_threshold() {
        let model = TreeEnsemble::from_json(stump_json()).expect("model");
        let predictions = model
            .predict(&[vector(-2.0), vector(1.0), vector(f64::NAN)])
            .expect("predict");
        assert_eq!(predictions[0].label, "1");
        assert!((predictions[0].score - sigmoid(2.0)).abs() < 1e-12);
        assert_eq!(predictions[1].label, "0");
        assert!((predictions[1].score - (1.0 - sigmoid(-2.0))).abs() < 1e-12);
        // NaN goes right here.
        assert_eq!(predictions[2].label, "0");
    }

    #[test]
    fn multiclass_picks_highest_probability() {
        let model = TreeEnsemble::from_json(
            r#"{
                "objective": "multiclass",
                "classes": ["Advance", "Late", "On time"],
                "feature_names": ["DelayOrdered"],
                "trees": [
                    {"class": 0, "nodes": [{"leaf": 0.1}]},
                    {"class": 1, "nodes": [{"leaf": 1.5}]},
                    {"class": 2, "nodes": [{"leaf": 0.2}]}
                ]
            }"#,
        )
        .expect("model");
        let vector = FeatureVector::new(vec![("DelayOrdered".to_string(), 0.0)]);
        let prediction = model.predict(&[vector]).expect("predict").remove(0);
        assert_eq!(prediction.label, "Late");
        assert!(prediction.score > 1.0 / 3.0 && prediction.score < 1.0);
    }

    #[test]
    fn backward_child_is_rejected() {
        let error = TreeEnsemble::from_json(
            r#"{
                "objective": "regression",
                "feature_names": ["a"],
                "trees": [{"nodes": [
                    {"feature": 0, "threshold": 1.0, "left": 0, "right": 1},
                    {"leaf": 1.0}
                ]}]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(error, ModelError::InvalidModel(ref msg) if msg.contains("invalid child 0")));
    }

    #[test]
    fn wrong_vector_width_is_reported() {
        let model = TreeEnsemble::from_json(stump_json()).expect("model");
        let short = FeatureVector::new(vec![("DelayOrdered".to_string(), 0.0)]);
        let error = model.predict(&[short]).unwrap_err();
        assert_eq!(
            error,
            ModelError::FeatureCount {
                index: 0,
                expected: 2,
                actual: 1
            }
        );
    }
}
