//! Feature engineering and schema alignment.
//!
//! Turns one [`RawEmployeeInput`] into the [`AlignedFeatureVector`] the
//! classifier was trained on:
//!
//! 1. Yes/No answers become 1/0 flags.
//! 2. Two engineered features are added ([`EngineeredRow`]).
//! 3. The required numeric and categorical columns are checked.
//! 4. Categorical columns are one-hot encoded as `{column}_{value}`.
//! 5. Columns named by the schema but absent from the row are filled with 0.
//! 6. The row is reindexed to the schema order; anything else is dropped.
//!
//! Every step is a pure function of its inputs.

use serde::Serialize;

use crate::{AlignedFeatureVector, AttritionError, RawEmployeeInput, Result};

/// Columns that pass through to the model as plain numbers.
pub const NUMERIC_COLUMNS: [&str; 6] = [
    "satisfaction_level",
    "last_evaluation",
    "number_project",
    "average_monthly_hours",
    "time_spend_company",
    "over_worked_high_performer",
];

/// Columns that are one-hot encoded before alignment.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["salary", "department", "over_4yr_no_promo"];

/// Tenure (years) above which a missing promotion is flagged.
const NO_PROMOTION_TENURE_YEARS: i64 = 4;

// ---------------------------------------------------------------------------
// Engineered row
// ---------------------------------------------------------------------------

/// The raw submission plus the two engineered features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineeredRow {
    pub satisfaction_level: f64,
    pub last_evaluation: f64,
    pub number_project: i64,
    pub average_monthly_hours: i64,
    pub time_spend_company: i64,
    /// 1 when the employee had a work accident.
    pub work_accident: i64,
    /// 1 when the employee was promoted in the last five years.
    pub promotion_last_5years: i64,
    pub department: String,
    pub salary: String,
    /// 1 when there was no promotion and tenure exceeds four years.
    pub over_4yr_no_promo: i64,
    /// `number_project * average_monthly_hours * last_evaluation / satisfaction_level`.
    ///
    /// Infinite (or NaN) when `satisfaction_level` is zero; the value is
    /// passed to the model as is.
    pub over_worked_high_performer: f64,
}

impl EngineeredRow {
    /// Encode the Yes/No answers and derive the engineered features.
    pub fn from_raw(raw: &RawEmployeeInput) -> Self {
        let work_accident = raw.work_accident.as_flag();
        let promotion_last_5years = raw.promotion_last_5years.as_flag();

        let over_4yr_no_promo =
            i64::from(promotion_last_5years == 0 && raw.time_spend_company > NO_PROMOTION_TENURE_YEARS);
        let over_worked_high_performer = raw.number_project as f64
            * raw.average_monthly_hours as f64
            * raw.last_evaluation
            / raw.satisfaction_level;

        Self {
            satisfaction_level: raw.satisfaction_level,
            last_evaluation: raw.last_evaluation,
            number_project: raw.number_project,
            average_monthly_hours: raw.average_monthly_hours,
            time_spend_company: raw.time_spend_company,
            work_accident,
            promotion_last_5years,
            department: raw.department.clone(),
            salary: raw.salary.clone(),
            over_4yr_no_promo,
            over_worked_high_performer,
        }
    }

    /// Lay the row out as named cells, in dataset column order followed by
    /// the engineered columns.
    pub fn to_frame(&self) -> RowFrame {
        let mut frame = RowFrame::new();
        frame.insert("satisfaction_level", CellValue::Float(self.satisfaction_level));
        frame.insert("last_evaluation", CellValue::Float(self.last_evaluation));
        frame.insert("number_project", CellValue::Integer(self.number_project));
        frame.insert("average_monthly_hours", CellValue::Integer(self.average_monthly_hours));
        frame.insert("time_spend_company", CellValue::Integer(self.time_spend_company));
        frame.insert("work_accident", CellValue::Integer(self.work_accident));
        frame.insert("promotion_last_5years", CellValue::Integer(self.promotion_last_5years));
        frame.insert("department", CellValue::Text(self.department.clone()));
        frame.insert("salary", CellValue::Text(self.salary.clone()));
        frame.insert("over_4yr_no_promo", CellValue::Integer(self.over_4yr_no_promo));
        frame.insert(
            "over_worked_high_performer",
            CellValue::Float(self.over_worked_high_performer),
        );
        frame
    }
}

// ---------------------------------------------------------------------------
// Row frame
// ---------------------------------------------------------------------------

/// A single cell of a [`RowFrame`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl CellValue {
    /// Numeric value of the cell, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }

    /// Suffix used for the one-hot column of this value.
    pub fn category_label(&self) -> String {
        match self {
            Self::Float(v) => format!("{v:?}"),
            Self::Integer(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }
}

/// One row of named cells, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowFrame {
    cells: Vec<(String, CellValue)>,
}

impl RowFrame {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell, replacing an existing cell of the same name in place.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Value of the named cell.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// `true` if the row has a cell with this name.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Fail with [`AttritionError::Schema`] on the first absent column.
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|column| !self.contains(column)) {
            Some(column) => Err(AttritionError::Schema {
                column: (*column).to_string(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding & alignment
// ---------------------------------------------------------------------------

/// Replace each of `columns` with a `{column}_{value}` indicator set to 1.
///
/// Untouched cells keep their order; indicators are appended in the order
/// of `columns`.
///
/// # Errors
///
/// Returns [`AttritionError::Schema`] if a column to encode is absent.
pub fn one_hot_encode(frame: &RowFrame, columns: &[&str]) -> Result<RowFrame> {
    frame.require(columns)?;

    let mut encoded = RowFrame::new();
    for (name, value) in &frame.cells {
        if !columns.contains(&name.as_str()) {
            encoded.insert(name.clone(), value.clone());
        }
    }
    for column in columns {
        if let Some(value) = frame.get(column) {
            encoded.insert(
                format!("{column}_{}", value.category_label()),
                CellValue::Integer(1),
            );
        }
    }
    Ok(encoded)
}

/// Reindex `frame` to `expected_columns`.
///
/// Expected columns the row lacks become 0; row cells the schema does not
/// name are dropped. The result has exactly `expected_columns.len()` values
/// in that order.
///
/// # Errors
///
/// Returns [`AttritionError::InvalidInput`] if an expected column holds
/// text, i.e. a categorical column was not encoded.
pub fn align_to_schema(frame: &RowFrame, expected_columns: &[String]) -> Result<AlignedFeatureVector> {
    let values = expected_columns
        .iter()
        .map(|column| match frame.get(column) {
            None => Ok(0.0),
            Some(cell) => cell.as_f64().ok_or_else(|| {
                AttritionError::InvalidInput(format!("column {column} is not numeric"))
            }),
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(AlignedFeatureVector::from_parts(expected_columns.to_vec(), values))
}

/// Build the model-ready row for one submission.
///
/// # Errors
///
/// Returns [`AttritionError::Schema`] if the engineered row is missing a
/// required column. This cannot happen for a well-formed input.
pub fn transform(raw: &RawEmployeeInput, expected_columns: &[String]) -> Result<AlignedFeatureVector> {
    let frame = EngineeredRow::from_raw(raw).to_frame();
    frame.require(&NUMERIC_COLUMNS)?;
    frame.require(&CATEGORICAL_COLUMNS)?;
    let encoded = one_hot_encode(&frame, &CATEGORICAL_COLUMNS)?;
    align_to_schema(&encoded, expected_columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::YesNo;

    fn schema() -> Vec<String> {
        [
            "satisfaction_level",
            "last_evaluation",
            "number_project",
            "average_monthly_hours",
            "time_spend_company",
            "work_accident",
            "promotion_last_5years",
            "over_worked_high_performer",
            "salary_high",
            "salary_low",
            "salary_medium",
            "department_IT",
            "department_RandD",
            "department_accounting",
            "department_hr",
            "department_management",
            "department_marketing",
            "department_product_mng",
            "department_sales",
            "department_support",
            "department_technical",
            "over_4yr_no_promo_0",
            "over_4yr_no_promo_1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn input() -> RawEmployeeInput {
        RawEmployeeInput {
            satisfaction_level: 0.4,
            last_evaluation: 0.5,
            number_project: 2,
            average_monthly_hours: 150,
            time_spend_company: 3,
            work_accident: YesNo::No,
            promotion_last_5years: YesNo::No,
            department: "sales".to_string(),
            salary: "low".to_string(),
        }
    }

    #[test]
    fn test_columns_match_schema_exactly() {
        let expected = schema();
        let vector = transform(&input(), &expected).unwrap();
        assert_eq!(vector.columns(), expected.as_slice());
        assert_eq!(vector.len(), expected.len());
    }

    #[test]
    fn test_values_are_encoded() {
        let vector = transform(&input(), &schema()).unwrap();
        assert_eq!(vector.get("satisfaction_level"), Some(0.4));
        assert_eq!(vector.get("number_project"), Some(2.0));
        assert_eq!(vector.get("work_accident"), Some(0.0));
        assert_eq!(vector.get("salary_low"), Some(1.0));
        assert_eq!(vector.get("salary_high"), Some(0.0));
        assert_eq!(vector.get("department_sales"), Some(1.0));
        assert_eq!(vector.get("department_IT"), Some(0.0));
        assert_eq!(vector.get("over_4yr_no_promo_0"), Some(1.0));
        assert_eq!(vector.get("over_4yr_no_promo_1"), Some(0.0));
        let expected_ratio = 2.0 * 150.0 * 0.5 / 0.4;
        assert!((vector.get("over_worked_high_performer").unwrap() - expected_ratio).abs() < 1e-9);
    }

    #[test]
    fn test_over_4yr_no_promo_rule() {
        let cases = [
            (YesNo::No, 5, 1),
            (YesNo::No, 4, 0),
            (YesNo::No, 0, 0),
            (YesNo::Yes, 5, 0),
            (YesNo::Yes, 10, 0),
            (YesNo::Yes, 4, 0),
        ];
        for (promotion, tenure, expected) in cases {
            let raw = RawEmployeeInput {
                promotion_last_5years: promotion,
                time_spend_company: tenure,
                ..input()
            };
            let row = EngineeredRow::from_raw(&raw);
            assert_eq!(
                row.over_4yr_no_promo, expected,
                "promotion={promotion} tenure={tenure}"
            );
        }
    }

    #[test]
    fn test_transform_is_idempotent() {
        let expected = schema();
        let first = transform(&input(), &expected).unwrap();
        let second = transform(&input(), &expected).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_category_is_dropped() {
        let raw = RawEmployeeInput {
            department: "logistics".to_string(),
            ..input()
        };
        let expected = schema();
        let vector = transform(&raw, &expected).unwrap();
        assert_eq!(vector.len(), expected.len());
        assert!(vector.get("department_logistics").is_none());
        assert!(vector
            .iter()
            .filter(|(name, _)| name.starts_with("department_"))
            .all(|(_, value)| value == 0.0));
    }

    #[test]
    fn test_schema_subset_and_reordering() {
        let expected: Vec<String> = ["salary_low", "unseen_column", "satisfaction_level"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vector = transform(&input(), &expected).unwrap();
        assert_eq!(vector.values(), [1.0, 0.0, 0.4]);
    }

    #[test]
    fn test_zero_satisfaction_propagates_non_finite_ratio() {
        let raw = RawEmployeeInput {
            satisfaction_level: 0.0,
            ..input()
        };
        let vector = transform(&raw, &schema()).unwrap();
        let ratio = vector.get("over_worked_high_performer").unwrap();
        assert!(ratio.is_infinite() && ratio > 0.0);

        let raw = RawEmployeeInput {
            satisfaction_level: 0.0,
            number_project: 0,
            ..input()
        };
        let vector = transform(&raw, &schema()).unwrap();
        assert!(vector.get("over_worked_high_performer").unwrap().is_nan());
    }

    #[test]
    fn test_require_names_missing_column() {
        let mut frame = RowFrame::new();
        frame.insert("salary", CellValue::Text("low".into()));
        let err = frame.require(&CATEGORICAL_COLUMNS).unwrap_err();
        match err {
            AttritionError::Schema { column } => assert_eq!(column, "department"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_one_hot_keeps_order_and_appends_indicators() {
        let frame = EngineeredRow::from_raw(&input()).to_frame();
        let encoded = one_hot_encode(&frame, &CATEGORICAL_COLUMNS).unwrap();
        let columns: Vec<&str> = encoded.columns().collect();
        assert_eq!(
            &columns[columns.len() - 3..],
            ["salary_low", "department_sales", "over_4yr_no_promo_0"]
        );
        assert!(!encoded.contains("salary"));
        assert!(encoded.contains("over_worked_high_performer"));
    }

    #[test]
    fn test_align_rejects_unencoded_text() {
        let frame = EngineeredRow::from_raw(&input()).to_frame();
        let expected = vec!["department".to_string()];
        assert!(align_to_schema(&frame, &expected).is_err());
    }

    #[test]
    fn test_frame_insert_replaces_in_place() {
        let mut frame = RowFrame::new();
        frame.insert("a", CellValue::Integer(1));
        frame.insert("b", CellValue::Integer(2));
        frame.insert("a", CellValue::Integer(3));
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get("a"), Some(&CellValue::Integer(3)));
        assert_eq!(frame.columns().collect::<Vec<_>>(), ["a", "b"]);
    }
}
