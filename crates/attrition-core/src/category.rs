//! Rule-based employee categories.
//!
//! A static decision table, not a learned component. Bands are checked in
//! order and the first match wins; every bound is strict.

use serde::{Deserialize, Serialize};

/// Cohort an employee falls into by satisfaction and monthly hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmployeeCategory {
    #[serde(rename = "High Satisfaction/Medium Performer")]
    HighSatisfactionMediumPerformer,
    #[serde(rename = "Low Satisfaction/High Performer")]
    LowSatisfactionHighPerformer,
    #[serde(rename = "Medium Satisfaction/Low Performer")]
    MediumSatisfactionLowPerformer,
    #[serde(rename = "General Employee")]
    GeneralEmployee,
}

impl EmployeeCategory {
    /// All categories, in the order the dashboard lists them.
    pub const ALL: [EmployeeCategory; 4] = [
        Self::LowSatisfactionHighPerformer,
        Self::MediumSatisfactionLowPerformer,
        Self::HighSatisfactionMediumPerformer,
        Self::GeneralEmployee,
    ];

    /// Display label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighSatisfactionMediumPerformer => "High Satisfaction/Medium Performer",
            Self::LowSatisfactionHighPerformer => "Low Satisfaction/High Performer",
            Self::MediumSatisfactionLowPerformer => "Medium Satisfaction/Low Performer",
            Self::GeneralEmployee => "General Employee",
        }
    }
}

impl std::fmt::Display for EmployeeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket an employee by satisfaction level and average monthly hours.
pub fn categorize(satisfaction_level: f64, average_monthly_hours: i64) -> EmployeeCategory {
    let s = satisfaction_level;
    let h = average_monthly_hours;
    if s > 0.7 && h > 215 && h < 275 {
        EmployeeCategory::HighSatisfactionMediumPerformer
    } else if s < 0.2 && h > 240 {
        EmployeeCategory::LowSatisfactionHighPerformer
    } else if s > 0.35 && s < 0.45 && h > 125 && h < 165 {
        EmployeeCategory::MediumSatisfactionLowPerformer
    } else {
        EmployeeCategory::GeneralEmployee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_examples() {
        assert_eq!(categorize(0.8, 250), EmployeeCategory::HighSatisfactionMediumPerformer);
        assert_eq!(categorize(0.1, 250), EmployeeCategory::LowSatisfactionHighPerformer);
        assert_eq!(categorize(0.4, 150), EmployeeCategory::MediumSatisfactionLowPerformer);
        assert_eq!(categorize(0.5, 300), EmployeeCategory::GeneralEmployee);
    }

    #[test]
    fn test_high_satisfaction_bounds_are_strict() {
        assert_eq!(categorize(0.7, 250), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.8, 275), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.8, 215), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.8, 216), EmployeeCategory::HighSatisfactionMediumPerformer);
        assert_eq!(categorize(0.8, 274), EmployeeCategory::HighSatisfactionMediumPerformer);
    }

    #[test]
    fn test_low_satisfaction_bounds_are_strict() {
        assert_eq!(categorize(0.2, 300), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.1, 240), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.0, 241), EmployeeCategory::LowSatisfactionHighPerformer);
    }

    #[test]
    fn test_medium_satisfaction_bounds_are_strict() {
        assert_eq!(categorize(0.35, 150), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.45, 150), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.4, 125), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.4, 165), EmployeeCategory::GeneralEmployee);
        assert_eq!(categorize(0.36, 126), EmployeeCategory::MediumSatisfactionLowPerformer);
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&EmployeeCategory::GeneralEmployee).unwrap();
        assert_eq!(json, "\"General Employee\"");
        for category in EmployeeCategory::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, category.as_str());
        }
    }
}
