//! REST API handlers for the dashboard.
//!
//! The form description, prediction, population comparison and overview
//! endpoints return the data each dashboard view renders. Errors use the
//! JSON body `{"error": {"message", "type"}}`.

use std::sync::Arc;
use std::time::Instant;

use attrition_core::{
    bounds, AttritionError, DashboardConfig, EmployeeCategory, RawEmployeeInput, YesNo,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::dataset::PopulationDataset;
use crate::metrics::{metrics_handler, Metrics};
use crate::pipeline::AttritionPipeline;
use crate::population::{self, CohortPoint};

/// Shared application state, built once at startup.
pub struct AppState {
    pub config: DashboardConfig,
    pub pipeline: AttritionPipeline,
    pub dataset: PopulationDataset,
    pub metrics: Metrics,
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/form", get(form_handler))
        .route("/api/v1/predict", post(predict_handler))
        .route("/api/v1/population/compare", post(compare_handler))
        .route("/api/v1/overview", get(overview_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// API error response body.
#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Widget used to enter a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Slider,
    Number,
    Select,
}

/// One field of the employee form.
#[derive(Debug, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub default: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// `GET /api/v1/form` response.
#[derive(Debug, Serialize)]
pub struct FormDescription {
    pub fields: Vec<FormField>,
}

/// `GET /api/v1/overview` response.
#[derive(Debug, Serialize)]
pub struct Overview {
    pub categories: Vec<&'static str>,
    pub dataset_rows: usize,
    /// Employees who left, for the cohort scatter.
    pub employees_left: Vec<CohortPoint>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON error response.
fn api_error(status: StatusCode, message: &str, error_type: &str) -> Response {
    let body = ApiError {
        error: ApiErrorDetail {
            message: message.to_string(),
            error_type: error_type.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

/// Map a pipeline error onto an HTTP status and error type.
fn error_response(state: &AppState, err: &AttritionError) -> Response {
    let (status, kind) = match err {
        AttritionError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        AttritionError::Schema { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "schema_error"),
        AttritionError::Model(_) | AttritionError::Serialization(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "model_error")
        }
        AttritionError::Dataset(_) | AttritionError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };
    state.metrics.record_error(kind);
    if status.is_server_error() {
        warn!(error = %err, "Prediction failed");
    }
    api_error(status, &err.to_string(), kind)
}

/// Unwrap the request body, turning extractor rejections into API errors.
fn parse_submission(
    state: &AppState,
    body: Result<Json<RawEmployeeInput>, JsonRejection>,
) -> Result<RawEmployeeInput, Response> {
    let Json(raw) = body.map_err(|rejection| {
        state.metrics.record_error("invalid_body");
        api_error(StatusCode::BAD_REQUEST, &rejection.body_text(), "invalid_body")
    })?;
    check_options(&state.dataset, &raw).map_err(|e| error_response(state, &e))?;
    Ok(raw)
}

/// Department and salary must be values the dataset actually contains.
fn check_options(dataset: &PopulationDataset, raw: &RawEmployeeInput) -> attrition_core::Result<()> {
    if !dataset.departments().iter().any(|d| d == &raw.department) {
        return Err(AttritionError::InvalidInput(format!(
            "unknown department {:?}",
            raw.department
        )));
    }
    if !dataset.salaries().iter().any(|s| s == &raw.salary) {
        return Err(AttritionError::InvalidInput(format!(
            "unknown salary {:?}",
            raw.salary
        )));
    }
    Ok(())
}

fn form_fields(dataset: &PopulationDataset) -> Vec<FormField> {
    let defaults = RawEmployeeInput::default();
    let yes_no = vec![YesNo::Yes.to_string(), YesNo::No.to_string()];
    let first = |options: &[String]| {
        options
            .first()
            .map(|o| serde_json::Value::from(o.as_str()))
            .unwrap_or(serde_json::Value::Null)
    };
    let slider = |name: &'static str, label: &'static str, (min, max): (f64, f64), default: f64| FormField {
        name,
        label,
        kind: FieldKind::Slider,
        min: Some(min),
        max: Some(max),
        step: Some(bounds::SLIDER_STEP),
        default: default.into(),
        options: Vec::new(),
    };
    let number = |name: &'static str, label: &'static str, (min, max): (i64, i64), default: i64| FormField {
        name,
        label,
        kind: FieldKind::Number,
        min: Some(min as f64),
        max: Some(max as f64),
        step: Some(1.0),
        default: default.into(),
        options: Vec::new(),
    };
    let select = |name: &'static str,
                  label: &'static str,
                  options: Vec<String>,
                  default: serde_json::Value| FormField {
        name,
        label,
        kind: FieldKind::Select,
        min: None,
        max: None,
        step: None,
        default,
        options,
    };

    vec![
        select(
            "department",
            "Department",
            dataset.departments().to_vec(),
            first(dataset.departments()),
        ),
        select(
            "salary",
            "Salary",
            dataset.salaries().to_vec(),
            first(dataset.salaries()),
        ),
        slider(
            "satisfaction_level",
            "Employee Satisfaction Level",
            bounds::SATISFACTION_LEVEL,
            defaults.satisfaction_level,
        ),
        slider(
            "last_evaluation",
            "Employee Last Evaluation",
            bounds::LAST_EVALUATION,
            defaults.last_evaluation,
        ),
        number(
            "number_project",
            "Number of Projects",
            bounds::NUMBER_PROJECT,
            defaults.number_project,
        ),
        number(
            "average_monthly_hours",
            "Average Monthly Hours",
            bounds::AVERAGE_MONTHLY_HOURS,
            defaults.average_monthly_hours,
        ),
        number(
            "time_spend_company",
            "Years Spent at Salifort Motors",
            bounds::TIME_SPEND_COMPANY,
            defaults.time_spend_company,
        ),
        select(
            "promotion_last_5years",
            "Promotion in Last 5 Years",
            yes_no.clone(),
            defaults.promotion_last_5years.to_string().into(),
        ),
        select(
            "work_accident",
            "Work Accident",
            yes_no,
            defaults.work_accident.to_string().into(),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — model, schema and dataset status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let classifier = state.pipeline.classifier();
    let model_ok = classifier.health_check().is_ok();

    let body = serde_json::json!({
        "status": if model_ok { "healthy" } else { "degraded" },
        "model": {
            "name": classifier.name(),
            "healthy": model_ok,
            "trees": classifier.num_trees(),
            "features": classifier.num_features(),
        },
        "schema_columns": state.pipeline.schema().len(),
        "dataset_rows": state.dataset.len(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /api/v1/form` — fields, ranges, defaults and options of the form.
pub async fn form_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(FormDescription {
        fields: form_fields(&state.dataset),
    })
    .into_response()
}

/// `POST /api/v1/predict` — score one employee.
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawEmployeeInput>, JsonRejection>,
) -> Response {
    let raw = match parse_submission(&state, body) {
        Ok(raw) => raw,
        Err(response) => return response,
    };

    let started = Instant::now();
    match state.pipeline.evaluate(&raw) {
        Ok(report) => {
            state.metrics.record_prediction(
                report.will_leave,
                report.category.as_str(),
                started.elapsed().as_secs_f64(),
            );
            Json(report).into_response()
        }
        Err(e) => error_response(&state, &e),
    }
}

/// `POST /api/v1/population/compare` — histograms and scatter for one employee.
pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawEmployeeInput>, JsonRejection>,
) -> Response {
    let raw = match parse_submission(&state, body) {
        Ok(raw) => raw,
        Err(response) => return response,
    };
    if let Err(e) = raw.validate() {
        return error_response(&state, &e);
    }
    let comparison = population::compare(&state.dataset, &raw, &state.config.population);
    Json(comparison).into_response()
}

/// `GET /api/v1/overview` — categories and the cohort of employees who left.
pub async fn overview_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(Overview {
        categories: EmployeeCategory::ALL.iter().map(|c| c.as_str()).collect(),
        dataset_rows: state.dataset.len(),
        employees_left: population::left_cohort(&state.dataset),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::SAMPLE_CSV;
    use attrition_core::{
        AlignedFeatureVector, AttritionClassifier, Explanation, ExplanationConfig,
        FeatureSchema, PredictionConfig,
    };
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    /// Fixed-probability classifier.
    struct ConstantClassifier(f64);

    impl AttritionClassifier for ConstantClassifier {
        fn predict_proba(&self, _features: &AlignedFeatureVector) -> attrition_core::Result<f64> {
            Ok(self.0)
        }

        fn explain(&self, _features: &AlignedFeatureVector) -> attrition_core::Result<Explanation> {
            Err(AttritionError::Model("explanations unavailable".to_string()))
        }

        fn num_features(&self) -> usize {
            2
        }

        fn num_trees(&self) -> usize {
            1
        }

        fn name(&self) -> &'static str {
            "constant"
        }

        fn health_check(&self) -> attrition_core::Result<()> {
            Ok(())
        }
    }

    fn test_state(probability: f64, explain: bool) -> Arc<AppState> {
        let schema =
            FeatureSchema::new(vec!["satisfaction_level".into(), "salary_low".into()]).unwrap();
        let pipeline = AttritionPipeline::new(
            schema,
            Arc::new(ConstantClassifier(probability)),
            PredictionConfig::default(),
            ExplanationConfig {
                enabled: explain,
                max_features: 0,
            },
        )
        .unwrap();
        Arc::new(AppState {
            config: DashboardConfig::default(),
            pipeline,
            dataset: PopulationDataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap(),
            metrics: Metrics::new(),
        })
    }

    /// Helper: parse a JSON response body into a `serde_json::Value`.
    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn submission() -> serde_json::Value {
        serde_json::json!({
            "satisfaction_level": 0.38,
            "last_evaluation": 0.53,
            "number_project": 2,
            "average_monthly_hours": 157,
            "time_spend_company": 3,
            "work_accident": "No",
            "promotion_last_5years": "No",
            "department": "sales",
            "salary": "low"
        })
    }

    #[tokio::test]
    async fn test_health_reports_model_and_dataset() {
        let app = build_router(test_state(0.2, false));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"]["name"], "constant");
        assert_eq!(body["schema_columns"], 2);
        assert_eq!(body["dataset_rows"], 5);
    }

    #[tokio::test]
    async fn test_form_lists_dataset_options() {
        let app = build_router(test_state(0.2, false));
        let resp = app
            .oneshot(Request::get("/api/v1/form").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        let fields = body["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0]["name"], "department");
        assert_eq!(fields[0]["default"], "sales");
        assert_eq!(fields[0]["options"], serde_json::json!(["sales", "accounting", "IT"]));
        assert_eq!(fields[2]["kind"], "slider");
        assert_eq!(fields[2]["step"], 0.05);
        assert_eq!(fields[5]["max"], 500.0);
        assert_eq!(fields[7]["default"], "Yes");
    }

    #[tokio::test]
    async fn test_predict_returns_report() {
        let state = test_state(0.74, false);
        let app = build_router(Arc::clone(&state));
        let resp = app
            .oneshot(post_json("/api/v1/predict", submission()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["will_leave"], true);
        assert_eq!(body["outcome"], "Employee is predicted to leave");
        assert_eq!(body["leave_probability_percent"], 74);
        assert_eq!(body["category"], "Medium Satisfaction/Low Performer");
        assert!(body.get("explanation").is_none());

        let metrics = state.metrics.gather_text().unwrap();
        assert!(metrics.contains("outcome=\"leave\""));
    }

    #[tokio::test]
    async fn test_predict_rejects_unknown_department() {
        let app = build_router(test_state(0.2, false));
        let mut body = submission();
        body["department"] = "marketing".into();
        let resp = app.oneshot(post_json("/api/v1/predict", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["type"], "invalid_input");
    }

    #[tokio::test]
    async fn test_predict_rejects_out_of_range_value() {
        let app = build_router(test_state(0.2, false));
        let mut body = submission();
        body["satisfaction_level"] = 1.5.into();
        let resp = app.oneshot(post_json("/api/v1/predict", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_rejects_malformed_body() {
        let app = build_router(test_state(0.2, false));
        let mut body = submission();
        body["work_accident"] = "maybe".into();
        let resp = app.oneshot(post_json("/api/v1/predict", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["type"], "invalid_body");
    }

    #[tokio::test]
    async fn test_predict_model_failure_is_server_error() {
        let app = build_router(test_state(0.2, true));
        let resp = app
            .oneshot(post_json("/api/v1/predict", submission()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["type"], "model_error");
    }

    #[tokio::test]
    async fn test_compare_returns_histograms_and_scatter() {
        let app = build_router(test_state(0.2, false));
        let resp = app
            .oneshot(post_json("/api/v1/population/compare", submission()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["histograms"].as_array().unwrap().len(), 4);
        assert_eq!(body["histograms"][0]["input_value"], 0.38);
        let scatter = body["scatter"].as_array().unwrap();
        assert_eq!(scatter.last().unwrap()["group"], "Input Employee");
    }

    #[tokio::test]
    async fn test_overview_lists_categories_and_left_cohort() {
        let app = build_router(test_state(0.2, false));
        let resp = app
            .oneshot(Request::get("/api/v1/overview").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["categories"][0], "Low Satisfaction/High Performer");
        assert_eq!(body["dataset_rows"], 5);
        assert_eq!(body["employees_left"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = build_router(test_state(0.2, false));
        let resp = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}
