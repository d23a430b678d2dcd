//! The HR population dataset.
//!
//! Loaded once at startup and shared read-only. It supplies the department
//! and salary options of the form, and the population that a submitted
//! employee is compared against.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use attrition_core::{AttritionError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One employee row of the HR dataset, after header normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub satisfaction_level: f64,
    pub last_evaluation: f64,
    pub number_project: i64,
    pub average_monthly_hours: i64,
    pub time_spend_company: i64,
    pub work_accident: i64,
    /// `1` if the employee left the company.
    pub left: i64,
    pub promotion_last_5years: i64,
    pub department: String,
    pub salary: String,
}

type RecordKey = (u64, u64, i64, i64, i64, i64, i64, i64, String, String);

impl EmployeeRecord {
    /// `true` if the employee left the company.
    pub fn has_left(&self) -> bool {
        self.left != 0
    }

    /// Value of a numeric column as a float.
    pub fn numeric(&self, column: NumericColumn) -> f64 {
        match column {
            NumericColumn::SatisfactionLevel => self.satisfaction_level,
            NumericColumn::LastEvaluation => self.last_evaluation,
            NumericColumn::NumberProject => self.number_project as f64,
            NumericColumn::AverageMonthlyHours => self.average_monthly_hours as f64,
        }
    }

    fn key(&self) -> RecordKey {
        // `+ 0.0` folds -0.0 into 0.0 so both compare equal.
        (
            (self.satisfaction_level + 0.0).to_bits(),
            (self.last_evaluation + 0.0).to_bits(),
            self.number_project,
            self.average_monthly_hours,
            self.time_spend_company,
            self.work_accident,
            self.left,
            self.promotion_last_5years,
            self.department.clone(),
            self.salary.clone(),
        )
    }
}

/// Numeric columns the dashboard plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    SatisfactionLevel,
    LastEvaluation,
    NumberProject,
    AverageMonthlyHours,
}

/// Deduplicated HR dataset with its categorical options.
#[derive(Debug, Clone)]
pub struct PopulationDataset {
    records: Vec<EmployeeRecord>,
    departments: Vec<String>,
    salaries: Vec<String>,
}

impl PopulationDataset {
    /// Load the dataset from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Dataset`] if the file cannot be opened or
    /// parsed, or holds no rows.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            AttritionError::Dataset(format!("failed to open {}: {e}", path.display()))
        })?;
        let dataset = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            departments = dataset.departments.len(),
            "Loaded population dataset"
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader.
    ///
    /// Headers are lower-cased and the `average_montly_hours` misspelling is
    /// corrected. Exact duplicate rows are dropped, keeping the first.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Dataset`] on malformed CSV, a missing
    /// column, or an empty dataset.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: csv::StringRecord = reader
            .headers()
            .map_err(|e| AttritionError::Dataset(format!("failed to read CSV header: {e}")))?
            .iter()
            .map(normalize_header)
            .collect();
        reader.set_headers(headers);

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<EmployeeRecord>().enumerate() {
            let record = row.map_err(|e| {
                AttritionError::Dataset(format!("invalid CSV row {}: {e}", line + 1))
            })?;
            records.push(record);
        }
        Self::from_records(records)
    }

    /// Build a dataset from already-parsed rows.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Dataset`] if `records` is empty.
    pub fn from_records(records: Vec<EmployeeRecord>) -> Result<Self> {
        let total = records.len();
        let mut seen = HashSet::with_capacity(total);
        let records: Vec<EmployeeRecord> = records
            .into_iter()
            .filter(|record| seen.insert(record.key()))
            .collect();
        if records.is_empty() {
            return Err(AttritionError::Dataset("dataset has no rows".to_string()));
        }
        debug!(rows = total, duplicates = total - records.len(), "Dropped duplicate rows");

        let departments = unique_in_order(records.iter().map(|r| r.department.as_str()));
        let salaries = unique_in_order(records.iter().map(|r| r.salary.as_str()));
        Ok(Self {
            records,
            departments,
            salaries,
        })
    }

    /// All rows, duplicates removed.
    pub fn records(&self) -> &[EmployeeRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; construction rejects empty datasets.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Department names in order of first appearance.
    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    /// Salary bands in order of first appearance.
    pub fn salaries(&self) -> &[String] {
        &self.salaries
    }

    /// Values of one numeric column.
    pub fn column(&self, column: NumericColumn) -> Vec<f64> {
        self.records.iter().map(|r| r.numeric(column)).collect()
    }

    /// Rows of employees who left.
    pub fn left_cohort(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.records.iter().filter(|r| r.has_left())
    }
}

fn normalize_header(header: &str) -> String {
    let lower = header.trim().to_lowercase();
    if lower == "average_montly_hours" {
        "average_monthly_hours".to_string()
    } else {
        lower
    }
}

fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}
