//! Core types, traits, and errors for the attrition dashboard
//!
//! This crate contains the foundational types shared across all dashboard
//! components: the raw form submission, the engineered and schema-aligned
//! feature rows, the rule-based employee category, the classifier interface,
//! and the service configuration.

use serde::{Deserialize, Serialize};

pub mod category;
pub mod transform;

pub use category::{categorize, EmployeeCategory};
pub use transform::{
    align_to_schema, one_hot_encode, transform, CellValue, EngineeredRow, RowFrame,
    CATEGORICAL_COLUMNS, NUMERIC_COLUMNS,
};

// ---------------------------------------------------------------------------
// Form input
// ---------------------------------------------------------------------------

/// A `"Yes"` / `"No"` answer from a select box on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YesNo {
    /// The employee answered yes.
    Yes,
    /// The employee answered no.
    No,
}

impl YesNo {
    /// The 1/0 encoding the model was trained on.
    pub fn as_flag(self) -> i64 {
        match self {
            Self::Yes => 1,
            Self::No => 0,
        }
    }
}

impl std::fmt::Display for YesNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "Yes"),
            Self::No => write!(f, "No"),
        }
    }
}

/// Inclusive bounds of the numeric form fields.
pub mod bounds {
    /// Satisfaction level slider range.
    pub const SATISFACTION_LEVEL: (f64, f64) = (0.0, 1.0);
    /// Last evaluation slider range.
    pub const LAST_EVALUATION: (f64, f64) = (0.0, 1.0);
    /// Slider step for both `[0, 1]` sliders.
    pub const SLIDER_STEP: f64 = 0.05;
    /// Number of projects range.
    pub const NUMBER_PROJECT: (i64, i64) = (0, 10);
    /// Average monthly hours range.
    pub const AVERAGE_MONTHLY_HOURS: (i64, i64) = (0, 500);
    /// Years spent at the company range.
    pub const TIME_SPEND_COMPANY: (i64, i64) = (0, 10);
}

/// One submission of the employee form.
///
/// Field names match the training dataset columns so that the engineered
/// row can be built by name instead of by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEmployeeInput {
    /// Employee satisfaction level in `[0, 1]`.
    pub satisfaction_level: f64,
    /// Score of the last performance evaluation in `[0, 1]`.
    pub last_evaluation: f64,
    /// Number of projects the employee contributes to.
    pub number_project: i64,
    /// Average number of hours worked per month.
    pub average_monthly_hours: i64,
    /// Years spent at the company.
    pub time_spend_company: i64,
    /// Whether the employee had a work accident.
    pub work_accident: YesNo,
    /// Whether the employee was promoted in the last five years.
    pub promotion_last_5years: YesNo,
    /// Department name as it appears in the training dataset.
    pub department: String,
    /// Salary band (`low`, `medium`, `high`) as it appears in the dataset.
    pub salary: String,
}

impl Default for RawEmployeeInput {
    /// The values the form shows before the user touches anything.
    fn default() -> Self {
        Self {
            satisfaction_level: 0.5,
            last_evaluation: 0.5,
            number_project: 5,
            average_monthly_hours: 200,
            time_spend_company: 5,
            work_accident: YesNo::Yes,
            promotion_last_5years: YesNo::Yes,
            department: "sales".to_string(),
            salary: "low".to_string(),
        }
    }
}

impl RawEmployeeInput {
    /// Check the submission against the form's field ranges.
    ///
    /// A satisfaction level of exactly `0.0` is accepted; the engineered
    /// workload ratio then becomes non-finite and is passed on unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_unit_range("satisfaction_level", self.satisfaction_level, bounds::SATISFACTION_LEVEL)?;
        check_unit_range("last_evaluation", self.last_evaluation, bounds::LAST_EVALUATION)?;
        check_int_range("number_project", self.number_project, bounds::NUMBER_PROJECT)?;
        check_int_range(
            "average_monthly_hours",
            self.average_monthly_hours,
            bounds::AVERAGE_MONTHLY_HOURS,
        )?;
        check_int_range("time_spend_company", self.time_spend_company, bounds::TIME_SPEND_COMPANY)?;
        if self.department.trim().is_empty() {
            return Err(AttritionError::InvalidInput("department must not be empty".to_string()));
        }
        if self.salary.trim().is_empty() {
            return Err(AttritionError::InvalidInput("salary must not be empty".to_string()));
        }
        Ok(())
    }
}

fn check_unit_range(field: &str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(AttritionError::InvalidInput(format!(
            "{field} must be within [{min}, {max}], got {value}"
        )));
    }
    Ok(())
}

fn check_int_range(field: &str, value: i64, (min, max): (i64, i64)) -> Result<()> {
    if value < min || value > max {
        return Err(AttritionError::InvalidInput(format!(
            "{field} must be within [{min}, {max}], got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Feature schema & aligned vector
// ---------------------------------------------------------------------------

/// The ordered column list the classifier was trained on.
///
/// This is the contract between training-time and inference-time feature
/// engineering. Names are unique and the list is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    /// Build a schema from an ordered list of column names.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Config`] if the list is empty, contains an
    /// empty name, or repeats a name.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(AttritionError::Config("feature schema is empty".to_string()));
        }
        let mut seen = std::collections::HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.is_empty() {
                return Err(AttritionError::Config(
                    "feature schema contains an empty column name".to_string(),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(AttritionError::Config(format!(
                    "feature schema repeats column {column:?}"
                )));
            }
        }
        Ok(Self(columns))
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.0
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FeatureSchema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let columns = Vec::<String>::deserialize(deserializer)?;
        FeatureSchema::new(columns).map_err(serde::de::Error::custom)
    }
}

/// A single model-ready row, laid out exactly as the feature schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedFeatureVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl AlignedFeatureVector {
    pub(crate) fn from_parts(columns: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Feature values in schema order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when the schema had no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column, if it is part of the schema.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx])
    }

    /// Iterate over `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// Classifier interface
// ---------------------------------------------------------------------------

/// Binary stay/leave prediction for one employee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// `true` when the employee is predicted to leave.
    pub will_leave: bool,
    /// Model-estimated probability of leaving, in `[0, 1]`.
    pub leave_probability: f64,
}

impl Prediction {
    /// Threshold a probability the way `XGBClassifier.predict` does
    /// (strictly greater than `threshold` is class 1).
    pub fn from_probability(leave_probability: f64, threshold: f64) -> Self {
        Self {
            will_leave: leave_probability > threshold,
            leave_probability,
        }
    }

    /// Probability as a whole percentage, rounding halves to even.
    pub fn leave_probability_percent(&self) -> i64 {
        (100.0 * self.leave_probability).round_ties_even() as i64
    }

    /// Sentence shown to the user.
    pub fn outcome(&self) -> &'static str {
        if self.will_leave {
            "Employee is predicted to leave"
        } else {
            "Employee is predicted to stay"
        }
    }
}

/// Contribution of one feature to a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAttribution {
    /// Schema column name.
    pub feature: String,
    /// Value the feature had in the explained row.
    pub value: f64,
    /// SHAP value in log-odds space.
    pub attribution: f64,
}

/// Additive explanation of one prediction.
///
/// `expected_value + sum(attributions) == margin` up to float rounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// Mean model output over the training data (log-odds).
    pub expected_value: f64,
    /// Model output for the explained row (log-odds).
    pub margin: f64,
    /// One attribution per schema column, in schema order.
    pub attributions: Vec<FeatureAttribution>,
}

impl Explanation {
    /// Attributions ordered by absolute value, largest first.
    ///
    /// `limit == 0` keeps all of them.
    pub fn ranked(&self, limit: usize) -> Vec<FeatureAttribution> {
        let mut ranked = self.attributions.clone();
        ranked.sort_by(|a, b| b.attribution.abs().total_cmp(&a.attribution.abs()));
        if limit > 0 {
            ranked.truncate(limit);
        }
        ranked
    }
}

/// A trained binary classifier that scores aligned feature vectors.
pub trait AttritionClassifier: Send + Sync {
    /// Probability that the employee described by `features` leaves.
    fn predict_proba(&self, features: &AlignedFeatureVector) -> Result<f64>;

    /// Per-feature attribution of the prediction for `features`.
    fn explain(&self, features: &AlignedFeatureVector) -> Result<Explanation>;

    /// Number of input columns the classifier expects.
    fn num_features(&self) -> usize;

    /// Number of trees (or equivalent model units) in the classifier.
    fn num_trees(&self) -> usize;

    /// Get the classifier name.
    fn name(&self) -> &'static str;

    /// Check if the classifier is usable.
    fn health_check(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Dashboard service configuration.
///
/// # Example (YAML)
///
/// ```yaml
/// listen_addr: "0.0.0.0:8501"
/// model_path: "models/best_model.json"
/// schema_path: "data/model_cols.json"
/// dataset_path: "data/HR_capstone_dataset.csv"
/// prediction:
///   decision_threshold: 0.5
/// explanation:
///   enabled: true
///   max_features: 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Address and port to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// XGBoost JSON model file.
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// JSON array of the training-time column names.
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
    /// HR dataset used for form options and population charts.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
    /// Prediction settings.
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// SHAP explanation settings.
    #[serde(default)]
    pub explanation: ExplanationConfig,
    /// Population comparison settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Graceful shutdown configuration.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8501".to_string()
}

fn default_model_path() -> String {
    "models/best_model.json".to_string()
}

fn default_schema_path() -> String {
    "data/model_cols.json".to_string()
}

fn default_dataset_path() -> String {
    "data/HR_capstone_dataset.csv".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            model_path: default_model_path(),
            schema_path: default_schema_path(),
            dataset_path: default_dataset_path(),
            prediction: PredictionConfig::default(),
            explanation: ExplanationConfig::default(),
            population: PopulationConfig::default(),
            logging: LoggingConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Largest fixed bin count accepted for population histograms.
pub const MAX_HISTOGRAM_BINS: usize = 1000;

impl DashboardConfig {
    /// Reject settings that cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Config`] describing the bad setting.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.prediction.decision_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AttritionError::Config(format!(
                "prediction.decision_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.population.sample_size == 0 {
            return Err(AttritionError::Config(
                "population.sample_size must be positive".to_string(),
            ));
        }
        let bins = self.population.histogram_bins;
        if bins > MAX_HISTOGRAM_BINS {
            return Err(AttritionError::Config(format!(
                "population.histogram_bins must be at most {MAX_HISTOGRAM_BINS}, got {bins}"
            )));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(AttritionError::Config(format!(
                "logging.format must be \"text\" or \"json\", got {other:?}"
            ))),
        }
    }
}

/// Prediction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Probabilities strictly above this value predict "leave".
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

fn default_decision_threshold() -> f64 {
    0.5
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            decision_threshold: default_decision_threshold(),
        }
    }
}

/// SHAP explanation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationConfig {
    /// Attach per-feature attributions to every prediction.
    #[serde(default = "default_explanation_enabled")]
    pub enabled: bool,
    /// Keep only the N largest attributions (`0` keeps all).
    #[serde(default)]
    pub max_features: usize,
}

fn default_explanation_enabled() -> bool {
    true
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            enabled: default_explanation_enabled(),
            max_features: 0,
        }
    }
}

/// Population comparison settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Rows sampled for the scatter comparison.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Seed for the scatter sample.
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,
    /// Fixed histogram bin count (`0` picks it from the data).
    #[serde(default)]
    pub histogram_bins: usize,
}

fn default_sample_size() -> usize {
    1000
}

fn default_sample_seed() -> u64 {
    42
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            sample_seed: default_sample_seed(),
            histogram_bins: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds to wait for in-flight requests after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout_seconds: u64,
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_shutdown_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum AttritionError {
    /// A column the pipeline relies on is absent from the engineered row.
    #[error("Column {column} not in input row")]
    Schema {
        /// Name of the missing column.
        column: String,
    },

    /// The submitted form values are out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The classifier artifact is malformed or rejected the input.
    #[error("Model error: {0}")]
    Model(String),

    /// The population dataset could not be used.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, AttritionError>`.
pub type Result<T> = std::result::Result<T, AttritionError>;
