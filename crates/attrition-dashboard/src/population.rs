//! Population comparison charts.
//!
//! Places one submitted employee against the HR dataset: four histograms
//! with the employee's value marked, and a sampled satisfaction/hours
//! scatter. Binning follows numpy's `"auto"` rule so the charts match what
//! the analysts saw in their notebooks.

use attrition_core::{PopulationConfig, RawEmployeeInput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::dataset::{NumericColumn, PopulationDataset};

/// How many equal-width bins a histogram gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinRule {
    /// The smaller width of Sturges and Freedman-Diaconis, as numpy's `"auto"`.
    Auto,
    /// One bin per distinct value.
    Distinct,
    /// A fixed number of bins.
    Fixed(usize),
}

/// One population histogram with the submitted value marked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: NumericColumn,
    pub title: &'static str,
    /// `counts.len() + 1` ascending edges; the last bin is closed.
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
    /// Where the submitted employee falls.
    pub input_value: f64,
}

impl Histogram {
    /// Bin `values` under `rule`. Non-finite values are ignored.
    pub fn from_values(
        column: NumericColumn,
        title: &'static str,
        values: &[f64],
        rule: BinRule,
        input_value: f64,
    ) -> Self {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(f64::total_cmp);

        let (bin_edges, counts) = match (finite.first(), finite.last()) {
            (Some(&min), Some(&max)) => {
                let (first, last) = if min == max {
                    (min - 0.5, max + 0.5)
                } else {
                    (min, max)
                };
                let bins = match rule {
                    BinRule::Auto => auto_bin_count(&finite, first, last),
                    BinRule::Distinct => distinct_count(&finite),
                    BinRule::Fixed(n) => n.max(1),
                };
                let edges = linspace(first, last, bins);
                let counts = bin_counts(&finite, &edges);
                (edges, counts)
            }
            _ => (Vec::new(), Vec::new()),
        };

        Self {
            column,
            title,
            bin_edges,
            counts,
            input_value,
        }
    }
}

/// Legend group of a scatter point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScatterGroup {
    #[serde(rename = "Employee Left")]
    EmployeeLeft,
    #[serde(rename = "Employee Stayed")]
    EmployeeStayed,
    #[serde(rename = "Input Employee")]
    InputEmployee,
}

/// One point of the satisfaction/hours scatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub average_monthly_hours: f64,
    pub satisfaction_level: f64,
    pub group: ScatterGroup,
}

/// One employee who left, for the overview cohort plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPoint {
    pub average_monthly_hours: f64,
    pub satisfaction_level: f64,
    pub number_project: i64,
}

/// Everything the comparison view draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationComparison {
    pub histograms: Vec<Histogram>,
    /// Sampled population followed by the submitted employee.
    pub scatter: Vec<ScatterPoint>,
}

/// Compare `raw` against the population.
///
/// `config.histogram_bins` overrides the automatic bin count of the
/// continuous columns; projects always get one bin per distinct value.
pub fn compare(
    dataset: &PopulationDataset,
    raw: &RawEmployeeInput,
    config: &PopulationConfig,
) -> PopulationComparison {
    let continuous = match config.histogram_bins {
        0 => BinRule::Auto,
        n => BinRule::Fixed(n),
    };
    let specs = [
        (
            NumericColumn::SatisfactionLevel,
            "Employee Satisfaction Level",
            continuous,
            raw.satisfaction_level,
        ),
        (
            NumericColumn::NumberProject,
            "Number of Projects",
            BinRule::Distinct,
            raw.number_project as f64,
        ),
        (
            NumericColumn::LastEvaluation,
            "Employee Last Evaluation",
            continuous,
            raw.last_evaluation,
        ),
        (
            NumericColumn::AverageMonthlyHours,
            "Average Monthly Hours",
            continuous,
            raw.average_monthly_hours as f64,
        ),
    ];
    let histograms = specs
        .into_iter()
        .map(|(column, title, rule, input)| {
            Histogram::from_values(column, title, &dataset.column(column), rule, input)
        })
        .collect();

    let mut scatter = sample_scatter(dataset, config.sample_size, config.sample_seed);
    scatter.push(ScatterPoint {
        average_monthly_hours: raw.average_monthly_hours as f64,
        satisfaction_level: raw.satisfaction_level,
        group: ScatterGroup::InputEmployee,
    });

    PopulationComparison {
        histograms,
        scatter,
    }
}

/// Up to `size` rows drawn without replacement, reproducible for a seed.
pub fn sample_scatter(dataset: &PopulationDataset, size: usize, seed: u64) -> Vec<ScatterPoint> {
    let records = dataset.records();
    let amount = size.min(records.len());
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, records.len(), amount)
        .into_iter()
        .map(|idx| {
            let record = &records[idx];
            ScatterPoint {
                average_monthly_hours: record.average_monthly_hours as f64,
                satisfaction_level: record.satisfaction_level,
                group: if record.has_left() {
                    ScatterGroup::EmployeeLeft
                } else {
                    ScatterGroup::EmployeeStayed
                },
            }
        })
        .collect()
}

/// Employees who left, as plotted on the overview page.
pub fn left_cohort(dataset: &PopulationDataset) -> Vec<CohortPoint> {
    dataset
        .left_cohort()
        .map(|r| CohortPoint {
            average_monthly_hours: r.average_monthly_hours as f64,
            satisfaction_level: r.satisfaction_level,
            number_project: r.number_project,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Binning
// ---------------------------------------------------------------------------

fn auto_bin_count(sorted: &[f64], first: f64, last: f64) -> usize {
    let n = sorted.len() as f64;
    let ptp = sorted[sorted.len() - 1] - sorted[0];

    let sturges = ptp / (n.log2() + 1.0);
    let iqr = percentile(sorted, 0.75) - percentile(sorted, 0.25);
    let fd = 2.0 * iqr * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };

    if width > 0.0 {
        ((last - first) / width).ceil() as usize
    } else {
        1
    }
}

/// Linear-interpolated percentile of sorted data, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn distinct_count(sorted: &[f64]) -> usize {
    let mut count = 0;
    let mut prev = None;
    for &v in sorted {
        if prev != Some(v) {
            count += 1;
            prev = Some(v);
        }
    }
    count.max(1)
}

fn linspace(first: f64, last: f64, bins: usize) -> Vec<f64> {
    let step = (last - first) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { last } else { first + step * i as f64 })
        .collect()
}

fn bin_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let bins = edges.len() - 1;
    let first = edges[0];
    let last = edges[bins];
    let norm = bins as f64 / (last - first);
    let mut counts = vec![0u64; bins];

    for &v in values {
        let mut idx = (((v - first) * norm) as usize).min(bins - 1);
        // Float error can land a value one bin off its edges.
        if idx > 0 && v < edges[idx] {
            idx -= 1;
        } else if idx + 1 < bins && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::SAMPLE_CSV;

    fn dataset() -> PopulationDataset {
        PopulationDataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_auto_bins_pick_narrower_width() {
        let h = Histogram::from_values(
            NumericColumn::NumberProject,
            "t",
            &[1.0, 2.0, 3.0, 4.0],
            BinRule::Auto,
            2.0,
        );
        assert_eq!(h.bin_edges, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.counts, [1, 1, 2]);
    }

    #[test]
    fn test_constant_column_gets_unit_bin() {
        let h = Histogram::from_values(
            NumericColumn::LastEvaluation,
            "t",
            &[5.0, 5.0, 5.0],
            BinRule::Auto,
            5.0,
        );
        assert_eq!(h.bin_edges, [4.5, 5.5]);
        assert_eq!(h.counts, [3]);
    }

    #[test]
    fn test_distinct_rule_and_counts_sum() {
        let h = Histogram::from_values(
            NumericColumn::NumberProject,
            "t",
            &[2.0, 5.0, 7.0, 5.0, 2.0],
            BinRule::Distinct,
            3.0,
        );
        assert_eq!(h.counts, [2, 2, 1]);
        assert_eq!(h.bin_edges.len(), 4);
        assert_eq!(h.bin_edges[3], 7.0);
    }

    #[test]
    fn test_fixed_rule_ignores_non_finite() {
        let h = Histogram::from_values(
            NumericColumn::SatisfactionLevel,
            "t",
            &[0.0, 0.5, 1.0, f64::NAN],
            BinRule::Fixed(2),
            0.5,
        );
        assert_eq!(h.counts, [1, 2]);
    }

    #[test]
    fn test_compare_marks_input_and_appends_it_to_scatter() {
        let raw = RawEmployeeInput {
            satisfaction_level: 0.42,
            number_project: 3,
            ..RawEmployeeInput::default()
        };
        let comparison = compare(&dataset(), &raw, &PopulationConfig::default());

        let columns: Vec<_> = comparison.histograms.iter().map(|h| h.column).collect();
        assert_eq!(
            columns,
            [
                NumericColumn::SatisfactionLevel,
                NumericColumn::NumberProject,
                NumericColumn::LastEvaluation,
                NumericColumn::AverageMonthlyHours,
            ]
        );
        assert_eq!(comparison.histograms[0].input_value, 0.42);
        assert_eq!(comparison.histograms[1].input_value, 3.0);
        for h in &comparison.histograms {
            assert_eq!(h.counts.iter().sum::<u64>(), 5);
        }

        // Sample size exceeds the five rows, so all of them are plotted.
        assert_eq!(comparison.scatter.len(), 6);
        let input = comparison.scatter.last().unwrap();
        assert_eq!(input.group, ScatterGroup::InputEmployee);
        assert_eq!(input.average_monthly_hours, 200.0);
    }

    #[test]
    fn test_sample_is_reproducible_for_a_seed() {
        let dataset = dataset();
        let a = sample_scatter(&dataset, 3, 42);
        let b = sample_scatter(&dataset, 3, 42);
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.group != ScatterGroup::InputEmployee));
    }

    #[test]
    fn test_left_cohort_points() {
        let points = left_cohort(&dataset());
        assert_eq!(points.len(), 3);
        assert_eq!(points[2].number_project, 7);
    }

    #[test]
    fn test_scatter_group_labels() {
        let json = serde_json::to_value(ScatterGroup::EmployeeStayed).unwrap();
        assert_eq!(json, "Employee Stayed");
    }
}
