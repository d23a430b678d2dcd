//! Per-submission prediction pipeline.
//!
//! validate → transform → categorize → classify → explain, as one
//! synchronous call over state that is shared read-only between requests.

use std::sync::Arc;

use attrition_core::{
    categorize, transform, AttritionClassifier, AttritionError, EmployeeCategory,
    ExplanationConfig, FeatureAttribution, FeatureSchema, Prediction, PredictionConfig,
    RawEmployeeInput, Result,
};
use serde::Serialize;
use tracing::{debug, info};

/// Additive explanation in bar-chart order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationReport {
    /// Base value of the force plot (log-odds).
    pub expected_value: f64,
    /// Model output for this employee (log-odds).
    pub margin: f64,
    /// Largest absolute attribution first.
    pub features: Vec<FeatureAttribution>,
}

/// Everything the dashboard shows for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub category: EmployeeCategory,
    pub will_leave: bool,
    pub outcome: &'static str,
    pub leave_probability: f64,
    pub leave_probability_percent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<ExplanationReport>,
}

/// The loaded classifier together with the schema it consumes.
pub struct AttritionPipeline {
    schema: FeatureSchema,
    classifier: Arc<dyn AttritionClassifier>,
    prediction: PredictionConfig,
    explanation: ExplanationConfig,
}

impl AttritionPipeline {
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the classifier expects a
    /// different number of columns than `schema` has.
    pub fn new(
        schema: FeatureSchema,
        classifier: Arc<dyn AttritionClassifier>,
        prediction: PredictionConfig,
        explanation: ExplanationConfig,
    ) -> Result<Self> {
        if classifier.num_features() != schema.len() {
            return Err(AttritionError::Model(format!(
                "{} classifier expects {} features but the schema lists {}",
                classifier.name(),
                classifier.num_features(),
                schema.len()
            )));
        }
        Ok(Self {
            schema,
            classifier,
            prediction,
            explanation,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn classifier(&self) -> &dyn AttritionClassifier {
        self.classifier.as_ref()
    }

    /// Score one submission.
    ///
    /// # Errors
    ///
    /// [`AttritionError::InvalidInput`] for out-of-range fields,
    /// [`AttritionError::Schema`] if feature engineering loses a column, and
    /// [`AttritionError::Model`] if the classifier fails.
    pub fn evaluate(&self, raw: &RawEmployeeInput) -> Result<PredictionReport> {
        raw.validate()?;

        let features = transform(raw, self.schema.columns())?;
        let category = categorize(raw.satisfaction_level, raw.average_monthly_hours);
        let probability = self.classifier.predict_proba(&features)?;
        let prediction =
            Prediction::from_probability(probability, self.prediction.decision_threshold);

        let explanation = if self.explanation.enabled {
            let explanation = self.classifier.explain(&features)?;
            debug!(
                expected_value = explanation.expected_value,
                margin = explanation.margin,
                "Computed feature attributions"
            );
            Some(ExplanationReport {
                expected_value: explanation.expected_value,
                margin: explanation.margin,
                features: explanation.ranked(self.explanation.max_features),
            })
        } else {
            None
        };

        info!(
            category = %category,
            will_leave = prediction.will_leave,
            leave_probability = prediction.leave_probability,
            "Employee scored"
        );

        Ok(PredictionReport {
            category,
            will_leave: prediction.will_leave,
            outcome: prediction.outcome(),
            leave_probability: prediction.leave_probability,
            leave_probability_percent: prediction.leave_probability_percent(),
            explanation,
        })
    }
}
