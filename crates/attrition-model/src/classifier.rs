//! [`AttritionClassifier`] backed by an XGBoost model.

use std::path::Path;

use attrition_core::{
    AlignedFeatureVector, AttritionClassifier, AttritionError, Explanation, FeatureAttribution,
    FeatureSchema, Result,
};

use crate::shap::tree_shap;
use crate::xgboost::XgbModel;

/// Gradient-boosted tree classifier bound to a feature schema.
#[derive(Debug, Clone)]
pub struct XgbAttritionClassifier {
    model: XgbModel,
    schema: FeatureSchema,
}

impl XgbAttritionClassifier {
    /// Pair a model with the schema it was trained on.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the model's feature count differs
    /// from the schema, or the model's saved feature names disagree with it.
    pub fn new(model: XgbModel, schema: FeatureSchema) -> Result<Self> {
        if model.num_feature() != schema.len() {
            return Err(AttritionError::Model(format!(
                "model expects {} features but the schema lists {}",
                model.num_feature(),
                schema.len()
            )));
        }
        if let Some(names) = model.feature_names() {
            if let Some((idx, (model_name, schema_name))) = names
                .iter()
                .zip(schema.columns())
                .enumerate()
                .find(|(_, (a, b))| a != b)
            {
                return Err(AttritionError::Model(format!(
                    "feature {idx} is {model_name:?} in the model but {schema_name:?} in the schema"
                )));
            }
        }
        Ok(Self { model, schema })
    }

    /// Load the model file and bind it to `schema`.
    ///
    /// # Errors
    ///
    /// See [`XgbModel::load`] and [`XgbAttritionClassifier::new`].
    pub fn load(model_path: &Path, schema: FeatureSchema) -> Result<Self> {
        Self::new(XgbModel::load(model_path)?, schema)
    }

    fn check_columns(&self, features: &AlignedFeatureVector) -> Result<()> {
        if features.columns() != self.schema.columns() {
            return Err(AttritionError::Model(
                "feature vector is not aligned to the model schema".to_string(),
            ));
        }
        Ok(())
    }
}

impl AttritionClassifier for XgbAttritionClassifier {
    fn predict_proba(&self, features: &AlignedFeatureVector) -> Result<f64> {
        self.check_columns(features)?;
        self.model.predict_proba(features.values())
    }

    fn explain(&self, features: &AlignedFeatureVector) -> Result<Explanation> {
        self.check_columns(features)?;
        let shap = tree_shap(&self.model, features.values())?;
        let attributions = features
            .iter()
            .zip(shap.values)
            .map(|((feature, value), attribution)| FeatureAttribution {
                feature: feature.to_string(),
                value,
                attribution,
            })
            .collect();
        Ok(Explanation {
            expected_value: shap.expected_value,
            margin: shap.margin,
            attributions,
        })
    }

    fn num_features(&self) -> usize {
        self.model.num_feature()
    }

    fn num_trees(&self) -> usize {
        self.model.trees().len()
    }

    fn name(&self) -> &'static str {
        "xgboost"
    }

    fn health_check(&self) -> Result<()> {
        if self.model.trees().is_empty() {
            return Err(AttritionError::Model("model has no trees".to_string()));
        }
        Ok(())
    }
}
