//! Tree-ensemble regressor loaded from a JSON export
//!
//! Each tree uses the flat array layout of fitted CART trees: node `i`
//! is a leaf when `children_left[i] == -1`, otherwise samples with
//! `x[feature[i]] <= threshold[i]` go left. The forest's prediction is
//! the mean of its trees, and every tree is an ensemble member.

use super::{Ensemble, Regressor};
use crate::error::{PricingError, Result};
use crate::models::AlignedFeatureVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker for "no child" in the flat tree layout
pub const LEAF: i64 = -1;

/// One fitted regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] == LEAF
    }

    /// Check array lengths and that every split points forward to a valid child
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        let n = self.value.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_left.len() != n
            || self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
        {
            return Err("node arrays have different lengths".to_string());
        }
        for node in 0..n {
            if self.is_leaf(node) {
                continue;
            }
            for child in [self.children_left[node], self.children_right[node]] {
                // Children always come after their parent in the flat layout,
                // which also rules out cycles.
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {} has invalid child {}", node, child));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {} but the model has {} features",
                    node, feature, n_features
                ));
            }
        }
        Ok(())
    }

    /// Predict one row. The row width is checked by the caller.
    pub fn predict_row(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while !self.is_leaf(node) {
            let feature = self.feature[node] as usize;
            node = if x[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

fn default_version() -> String {
    "forest".to_string()
}

#[derive(Deserialize)]
struct ForestFile {
    #[serde(default = "default_version")]
    version: String,
    n_features: usize,
    trees: Vec<RegressionTree>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
}

/// Random-forest style regressor: mean of independent regression trees
#[derive(Debug, Clone)]
pub struct ForestRegressor {
    version: String,
    n_features: usize,
    trees: Vec<RegressionTree>,
    importances: Option<Vec<f64>>,
}

impl ForestRegressor {
    /// Build a forest. Importances are only reported when the export
    /// stored them.
    pub fn new(
        version: impl Into<String>,
        n_features: usize,
        trees: Vec<RegressionTree>,
        importances: Option<Vec<f64>>,
    ) -> Result<Self> {
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|reason| PricingError::Model(format!("tree {}: {}", i, reason)))?;
        }

        let importances = match importances {
            Some(scores) if scores.len() != n_features => {
                return Err(PricingError::SchemaMismatch(format!(
                    "{} feature importances for {} features",
                    scores.len(),
                    n_features
                )));
            }
            other => other,
        };

        let version = version.into();
        debug!(
            version = %version,
            trees = trees.len(),
            n_features,
            "Loaded tree ensemble"
        );

        Ok(Self {
            version,
            n_features,
            trees,
            importances,
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: ForestFile = serde_json::from_slice(bytes)
            .map_err(|e| PricingError::Model(format!("invalid forest export: {}", e)))?;
        Self::new(
            file.version,
            file.n_features,
            file.trees,
            file.feature_importances,
        )
    }

    fn checked_row<'a>(&self, features: &'a AlignedFeatureVector) -> Result<&'a [f64]> {
        let row = features.values();
        if row.len() != self.n_features {
            return Err(PricingError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(row)
    }
}

impl Regressor for ForestRegressor {
    fn predict(&self, features: &AlignedFeatureVector) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(PricingError::Model("forest has no trees".to_string()));
        }
        let predictions = self.member_predictions(features)?;
        Ok(predictions.iter().sum::<f64>() / predictions.len() as f64)
    }

    fn input_width(&self) -> usize {
        self.n_features
    }

    fn ensemble(&self) -> Option<&dyn Ensemble> {
        Some(self)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    fn model_version(&self) -> &str {
        &self.version
    }
}

impl Ensemble for ForestRegressor {
    fn member_count(&self) -> usize {
        self.trees.len()
    }

    fn member_predictions(&self, features: &AlignedFeatureVector) -> Result<Vec<f64>> {
        let row = self.checked_row(features)?;
        Ok(self.trees.iter().map(|t| t.predict_row(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ColumnSchema;
    use std::sync::Arc;

    /// Splits on feature 0 at 2.5: left leaf 100, right leaf 200
    fn stump(feature: i64, left: f64, right: f64) -> RegressionTree {
        RegressionTree {
            children_left: vec![1, LEAF, LEAF],
            children_right: vec![2, LEAF, LEAF],
            feature: vec![feature, -2, -2],
            threshold: vec![2.5, 0.0, 0.0],
            value: vec![150.0, left, right],
        }
    }

    fn row(values: Vec<f64>) -> AlignedFeatureVector {
        let columns = (0..values.len()).map(|i| format!("f{}", i)).collect();
        let schema = Arc::new(ColumnSchema::new(columns).unwrap());
        AlignedFeatureVector::from_values(schema, values).unwrap()
    }

    #[test]
    fn test_tree_traversal() {
        let tree = stump(0, 100.0, 200.0);
        assert_eq!(tree.predict_row(&[2.5, 0.0]), 100.0);
        assert_eq!(tree.predict_row(&[3.0, 0.0]), 200.0);
    }

    #[test]
    fn test_forest_mean_and_members() {
        let forest = ForestRegressor::new(
            "v1",
            2,
            vec![stump(0, 100.0, 200.0), stump(1, 300.0, 500.0)],
            None,
        )
        .unwrap();
        let x = row(vec![1.0, 9.0]);
        assert_eq!(forest.member_predictions(&x).unwrap(), vec![100.0, 500.0]);
        assert_eq!(forest.predict(&x).unwrap(), 300.0);
        assert_eq!(forest.ensemble().map(|e| e.member_count()), Some(2));
    }

    #[test]
    fn test_importances_only_when_stored() {
        let trees = vec![stump(0, 1.0, 2.0), stump(2, 1.0, 2.0)];
        let forest = ForestRegressor::new("v1", 3, trees.clone(), None).unwrap();
        assert!(forest.feature_importances().is_none());

        let forest = ForestRegressor::new("v1", 3, trees, Some(vec![0.7, 0.0, 0.3])).unwrap();
        assert_eq!(forest.feature_importances(), Some(&[0.7, 0.0, 0.3][..]));
    }

    #[test]
    fn test_json_without_importances() {
        // sklearn node sample counts are accepted and ignored
        let json = r#"{
            "n_features": 1,
            "trees": [{
                "children_left": [-1],
                "children_right": [-1],
                "feature": [-2],
                "threshold": [-2.0],
                "value": [5.0],
                "n_node_samples": [12]
            }]
        }"#;
        let forest = ForestRegressor::from_json(json.as_bytes()).unwrap();
        assert_eq!(forest.model_version(), "forest");
        assert!(forest.feature_importances().is_none());
        assert_eq!(forest.predict(&row(vec![0.0])).unwrap(), 5.0);
    }

    #[test]
    fn test_stored_importances_width_checked() {
        let result = ForestRegressor::new("v1", 2, vec![stump(0, 1.0, 2.0)], Some(vec![1.0]));
        assert!(matches!(result, Err(PricingError::SchemaMismatch(_))));
    }

    #[test]
    fn test_invalid_trees_rejected() {
        // split on a feature the model does not have
        assert!(ForestRegressor::new("v1", 1, vec![stump(3, 1.0, 2.0)], None).is_err());

        // child pointing backwards
        let mut tree = stump(0, 1.0, 2.0);
        tree.children_right[0] = 0;
        assert!(ForestRegressor::new("v1", 1, vec![tree], None).is_err());
    }

    #[test]
    fn test_row_width_checked() {
        let forest = ForestRegressor::new("v1", 2, vec![stump(0, 1.0, 2.0)], None).unwrap();
        assert!(matches!(
            forest.predict(&row(vec![1.0])),
            Err(PricingError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "version": "rf-2025.1",
            "n_features": 1,
            "trees": [{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [0, -2, -2],
                "threshold": [10.0, -2.0, -2.0],
                "value": [15.0, 10.0, 20.0]
            }],
            "feature_importances": [1.0]
        }"#;
        let forest = ForestRegressor::from_json(json.as_bytes()).unwrap();
        assert_eq!(forest.model_version(), "rf-2025.1");
        assert_eq!(forest.predict(&row(vec![11.0])).unwrap(), 20.0);
        assert_eq!(forest.feature_importances(), Some(&[1.0][..]));
    }

    #[test]
    fn test_empty_forest_cannot_predict() {
        let forest = ForestRegressor::new("v1", 1, Vec::new(), None).unwrap();
        assert!(forest.predict(&row(vec![1.0])).is_err());
        assert_eq!(forest.member_count(), 0);
    }
}
