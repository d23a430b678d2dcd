//! Exact SHAP values for tree ensembles (path-dependent TreeSHAP).
//!
//! Implements the polynomial-time algorithm from Lundberg, Erion & Lee,
//! "Consistent Individualized Feature Attribution for Tree Ensembles".
//! Node covers stand in for the training distribution, so the result
//! matches `shap.TreeExplainer(model)` with its default
//! `feature_perturbation="tree_path_dependent"`.
//!
//! Values are in margin (log-odds) space and satisfy local accuracy:
//! `expected_value + sum(values) == margin`.

use attrition_core::Result;

use crate::xgboost::{RegressionTree, TreeNode, XgbModel};

/// SHAP values for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapValues {
    /// Model output averaged over the training data.
    pub expected_value: f64,
    /// Model output for the row.
    pub margin: f64,
    /// One value per input column.
    pub values: Vec<f64>,
}

/// One entry of the decision path being tracked.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature split on, `None` for the root placeholder.
    feature: Option<usize>,
    /// Fraction of "zero" paths (feature unknown) flowing through.
    zero_fraction: f64,
    /// Fraction of "one" paths (feature known) flowing through.
    one_fraction: f64,
    /// Permutation weight.
    pweight: f64,
}

/// Explain one row of `model`.
///
/// # Errors
///
/// Returns [`attrition_core::AttritionError::Model`] if the row has the
/// wrong width.
pub fn tree_shap(model: &XgbModel, features: &[f64]) -> Result<ShapValues> {
    model.check_width(features)?;

    let mut values = vec![0.0; model.num_feature()];
    let mut expected_value = model.base_margin();
    let mut margin = model.base_margin();

    for (tree, &weight) in model.trees().iter().zip(model.tree_weights()) {
        let mut phi = vec![0.0; model.num_feature()];
        recurse(tree, features, &mut phi, 0, &[], 1.0, 1.0, None);
        for (total, contribution) in values.iter_mut().zip(&phi) {
            *total += weight * contribution;
        }
        expected_value += weight * tree.expected_value();
        margin += weight * tree.predict(features);
    }

    Ok(ShapValues {
        expected_value,
        margin,
        values,
    })
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &RegressionTree,
    features: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, parent_zero_fraction, parent_one_fraction, parent_feature);

    let nodes = tree.nodes();
    match &nodes[node] {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(feature) = el.feature {
                    phi[feature] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        TreeNode::Split {
            feature,
            left,
            right,
            cover,
            ..
        } => {
            let hot = tree.next_node(node, features).unwrap_or(*left);
            let cold = if hot == *left { *right } else { *left };
            let hot_zero_fraction = nodes[hot].cover() / cover;
            let cold_zero_fraction = nodes[cold].cover() / cover;

            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;

            // A feature split on twice shares one path entry.
            if let Some(k) = path.iter().position(|el| el.feature == Some(*feature)) {
                incoming_zero_fraction = path[k].zero_fraction;
                incoming_one_fraction = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                tree,
                features,
                phi,
                hot,
                &path,
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(*feature),
            );
            recurse(
                tree,
                features,
                phi,
                cold,
                &path,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                Some(*feature),
            );
        }
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((depth - i) as f64 / denom);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - i) as f64 / denom);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xgboost::tests::TWO_STUMP_MODEL;

    fn split(feature: usize, threshold: f32, left: usize, right: usize, cover: f64) -> TreeNode {
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            default_left: true,
            cover,
        }
    }

    fn leaf(value: f64, cover: f64) -> TreeNode {
        TreeNode::Leaf { value, cover }
    }

    /// Depth-2 tree that splits on feature 0 and then on feature 1 or 0 again.
    fn deep_model() -> XgbModel {
        let tree = RegressionTree::new(
            vec![
                split(0, 0.5, 1, 2, 100.0),
                split(1, 10.0, 3, 4, 40.0),
                split(0, 0.8, 5, 6, 60.0),
                leaf(1.0, 10.0),
                leaf(-0.5, 30.0),
                leaf(0.3, 35.0),
                leaf(-1.2, 25.0),
            ],
            3,
        )
        .unwrap();
        let stump = RegressionTree::new(
            vec![split(2, 1.0, 1, 2, 100.0), leaf(0.2, 70.0), leaf(-0.4, 30.0)],
            3,
        )
        .unwrap();
        XgbModel::from_trees(vec![tree, stump], 0.3, 3).unwrap()
    }

    #[test]
    fn test_single_stump_attributes_everything_to_split_feature() {
        let model = XgbModel::from_json_str(TWO_STUMP_MODEL).unwrap();
        let shap = tree_shap(&model, &[0.2, 1.0, 250.0]).unwrap();
        // Tree 0: left leaf 0.8 with expectation 0.4*0.8 + 0.6*-0.6 = -0.04.
        assert!((shap.values[0] - (0.8 - -0.04)).abs() < 1e-12);
        // Tree 1: right leaf 0.4 with expectation 0.5*-0.2 + 0.5*0.4 = 0.1.
        assert!((shap.values[2] - (0.4 - 0.1)).abs() < 1e-12);
        assert_eq!(shap.values[1], 0.0);
    }

    #[test]
    fn test_early_stopped_model_ignores_later_trees() {
        let mut json: serde_json::Value = serde_json::from_str(TWO_STUMP_MODEL).unwrap();
        json["learner"]["attributes"] = serde_json::json!({"best_iteration": "0"});
        let model = XgbModel::from_json_str(&json.to_string()).unwrap();
        let shap = tree_shap(&model, &[0.2, 1.0, 250.0]).unwrap();
        assert!((shap.values[0] - 0.84).abs() < 1e-12);
        assert_eq!(shap.values[2], 0.0);
        assert!((shap.margin - 0.8).abs() < 1e-12);
        assert!((shap.expected_value - -0.04).abs() < 1e-12);
    }

    #[test]
    fn test_local_accuracy_holds() {
        let model = deep_model();
        let rows = [
            [0.1, 5.0, 0.0],
            [0.1, 50.0, 2.0],
            [0.6, 5.0, 0.5],
            [0.9, 0.0, 3.0],
            [f64::NAN, 5.0, f64::INFINITY],
        ];
        for row in rows {
            let shap = tree_shap(&model, &row).unwrap();
            let total: f64 = shap.expected_value + shap.values.iter().sum::<f64>();
            let margin = model.predict_margin(&row).unwrap();
            assert!((shap.margin - margin).abs() < 1e-12);
            assert!(
                (total - margin).abs() < 1e-9,
                "row {row:?}: expected {margin}, got {total}"
            );
        }
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let tree = RegressionTree::new(
            vec![split(0, 0.5, 1, 2, 10.0), leaf(1.0, 5.0), leaf(-1.0, 5.0)],
            2,
        )
        .unwrap();
        let model = XgbModel::from_trees(vec![tree], 0.5, 2).unwrap();
        let shap = tree_shap(&model, &[0.1, 123.0]).unwrap();
        assert_eq!(shap.values[1], 0.0);
        assert!((shap.values[0] - 1.0).abs() < 1e-12);
        assert!(shap.expected_value.abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_features_share_credit() {
        // f(x) = 1 only when both features are "high"; covers are uniform.
        let tree = RegressionTree::new(
            vec![
                split(0, 0.5, 1, 2, 4.0),
                split(1, 0.5, 3, 4, 2.0),
                split(1, 0.5, 5, 6, 2.0),
                leaf(0.0, 1.0),
                leaf(0.0, 1.0),
                leaf(0.0, 1.0),
                leaf(1.0, 1.0),
            ],
            2,
        )
        .unwrap();
        let model = XgbModel::from_trees(vec![tree], 0.5, 2).unwrap();
        let shap = tree_shap(&model, &[1.0, 1.0]).unwrap();
        assert!((shap.values[0] - shap.values[1]).abs() < 1e-12);
        assert!((shap.values[0] - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let model = deep_model();
        assert!(tree_shap(&model, &[0.1]).is_err());
    }
}
