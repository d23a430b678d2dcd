//! Employee attrition dashboard service
//!
//! An axum HTTP service that scores a single employee with the trained
//! attrition classifier, explains the score, and compares the employee with
//! the HR population. See [`api::build_router`] for the routes.

pub mod api;
pub mod config;
pub mod dataset;
pub mod metrics;
pub mod pipeline;
pub mod population;
pub mod shutdown;

pub use api::{build_router, AppState};
pub use dataset::{EmployeeRecord, NumericColumn, PopulationDataset};
pub use metrics::Metrics;
pub use pipeline::{AttritionPipeline, ExplanationReport, PredictionReport};
