//! XGBoost JSON model loading and inference.
//!
//! Reads the model file written by `XGBClassifier.save_model("*.json")`
//! (XGBoost 1.0 and later) and evaluates it natively. Only single-output
//! binary models are supported.
//!
//! # Routing
//!
//! Inputs and split thresholds are compared in `f32`, as XGBoost does:
//! `x < threshold` goes left. A NaN input follows the node's default
//! branch. `+inf` is an ordinary value and always goes right.
//!
//! # Output
//!
//! `margin = logit(base_score) + sum(weight_t * leaf_t)`, and the
//! probability of the positive class is `sigmoid(margin)`. Every accepted
//! objective stores `base_score` as a probability, `binary:logitraw`
//! included. When the learner carries a `best_iteration` attribute only the
//! trees of rounds `0..=best_iteration` are kept.

use std::path::Path;

use attrition_core::{AttritionError, Result};
use serde::Deserialize;
use tracing::info;

// ---------------------------------------------------------------------------
// On-disk format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawModelFile {
    learner: RawLearner,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct RawLearner {
    #[serde(default)]
    attributes: RawAttributes,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: RawBooster,
    learner_model_param: RawLearnerParam,
    objective: RawObjective,
}

/// Set by early stopping; prediction then uses rounds `0..=best_iteration`.
#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    #[serde(default)]
    best_iteration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLearnerParam {
    base_score: String,
    num_feature: String,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObjective {
    name: String,
}

/// `gbtree` carries `model`; `dart` wraps a `gbtree` and adds `weight_drop`.
#[derive(Debug, Deserialize)]
struct RawBooster {
    name: String,
    #[serde(default)]
    model: Option<RawTreeEnsemble>,
    #[serde(default)]
    gbtree: Option<Box<RawBooster>>,
    #[serde(default)]
    weight_drop: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawTreeEnsemble {
    #[serde(default)]
    gbtree_model_param: Option<RawGbTreeParam>,
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct RawGbTreeParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    default_left: Vec<RawFlag>,
    sum_hessian: Vec<f64>,
    #[serde(default)]
    split_type: Vec<i64>,
}

/// `default_left` is written as 0/1 by some versions and as booleans by others.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
}

impl RawFlag {
    fn is_set(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// A node of a regression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Internal node: `x[feature] < threshold` goes to `left`.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
        /// Sum of training hessians reaching this node.
        cover: f64,
    },
    /// Terminal node.
    Leaf { value: f64, cover: f64 },
}

impl TreeNode {
    /// Sum of training hessians reaching this node.
    pub fn cover(&self) -> f64 {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// One boosted regression tree, root at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Build a tree from validated nodes.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the tree is empty, a child index
    /// is out of range or does not point forward, or a split uses a feature
    /// index `>= num_feature`.
    pub fn new(nodes: Vec<TreeNode>, num_feature: usize) -> Result<Self> {
        if nodes.is_empty() {
            return Err(AttritionError::Model("tree has no nodes".to_string()));
        }
        for (idx, node) in nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                for child in [*left, *right] {
                    if child <= idx || child >= nodes.len() {
                        return Err(AttritionError::Model(format!(
                            "node {idx} has invalid child index {child}"
                        )));
                    }
                }
                if *feature >= num_feature {
                    return Err(AttritionError::Model(format!(
                        "node {idx} splits on feature {feature}, model has {num_feature}"
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Child of split node `idx` that `features` falls into.
    ///
    /// Returns `None` for leaves.
    pub fn next_node(&self, idx: usize, features: &[f64]) -> Option<usize> {
        match &self.nodes[idx] {
            TreeNode::Leaf { .. } => None,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                default_left,
                ..
            } => {
                let value = features[*feature];
                let goes_left = if value.is_nan() {
                    *default_left
                } else {
                    (value as f32) < *threshold
                };
                Some(if goes_left { *left } else { *right })
            }
        }
    }

    /// Leaf value reached by `features`.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        while let Some(next) = self.next_node(idx, features) {
            idx = next;
        }
        match self.nodes[idx] {
            TreeNode::Leaf { value, .. } => value,
            TreeNode::Split { .. } => unreachable!("traversal stops at a leaf"),
        }
    }

    /// Cover-weighted mean leaf value, the tree's output on the training data.
    pub fn expected_value(&self) -> f64 {
        self.node_expectation(0)
    }

    fn node_expectation(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { left, right, cover, .. } => {
                let left_cover = self.nodes[*left].cover();
                let right_cover = self.nodes[*right].cover();
                let total = if *cover > 0.0 {
                    *cover
                } else {
                    left_cover + right_cover
                };
                if total <= 0.0 {
                    return 0.5 * (self.node_expectation(*left) + self.node_expectation(*right));
                }
                (left_cover * self.node_expectation(*left)
                    + right_cover * self.node_expectation(*right))
                    / total
            }
        }
    }

    fn from_raw(raw: RawTree, num_feature: usize, tree_idx: usize) -> Result<Self> {
        let n = raw.left_children.len();
        if raw.right_children.len() != n
            || raw.split_indices.len() != n
            || raw.split_conditions.len() != n
            || raw.default_left.len() != n
            || raw.sum_hessian.len() != n
        {
            return Err(AttritionError::Model(format!(
                "tree {tree_idx}: inconsistent node array lengths"
            )));
        }
        if raw.split_type.iter().any(|&t| t != 0) {
            return Err(AttritionError::Model(format!(
                "tree {tree_idx}: categorical splits are not supported"
            )));
        }

        let nodes = (0..n)
            .map(|i| {
                let (left, right) = (raw.left_children[i], raw.right_children[i]);
                match (left, right) {
                    (-1, -1) => Ok(TreeNode::Leaf {
                        value: raw.split_conditions[i],
                        cover: raw.sum_hessian[i],
                    }),
                    (l, r) if l >= 0 && r >= 0 && raw.split_indices[i] >= 0 => Ok(TreeNode::Split {
                        feature: raw.split_indices[i] as usize,
                        threshold: raw.split_conditions[i] as f32,
                        left: l as usize,
                        right: r as usize,
                        default_left: raw.default_left[i].is_set(),
                        cover: raw.sum_hessian[i],
                    }),
                    _ => Err(AttritionError::Model(format!(
                        "tree {tree_idx}: node {i} has malformed children ({left}, {right})"
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(nodes, num_feature)
            .map_err(|e| AttritionError::Model(format!("tree {tree_idx}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Ensemble
// ---------------------------------------------------------------------------

/// Objectives whose output is a single log-odds margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    BinaryLogistic,
    BinaryLogitRaw,
    RegLogistic,
}

impl Objective {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "binary:logistic" => Ok(Self::BinaryLogistic),
            "binary:logitraw" => Ok(Self::BinaryLogitRaw),
            "reg:logistic" => Ok(Self::RegLogistic),
            other => Err(AttritionError::Model(format!(
                "unsupported objective {other:?}, expected a binary logistic model"
            ))),
        }
    }
}

/// A loaded XGBoost tree ensemble.
#[derive(Debug, Clone)]
pub struct XgbModel {
    trees: Vec<RegressionTree>,
    tree_weights: Vec<f64>,
    base_margin: f64,
    num_feature: usize,
    feature_names: Option<Vec<String>>,
    objective: Objective,
}

impl XgbModel {
    /// Assemble a model from trees built in code.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if `base_score` is not strictly
    /// between 0 and 1.
    pub fn from_trees(trees: Vec<RegressionTree>, base_score: f64, num_feature: usize) -> Result<Self> {
        let tree_weights = vec![1.0; trees.len()];
        Ok(Self {
            trees,
            tree_weights,
            base_margin: logit(base_score)?,
            num_feature,
            feature_names: None,
            objective: Objective::BinaryLogistic,
        })
    }

    /// Parse a model from the XGBoost JSON format.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the JSON is not a supported
    /// XGBoost model or its trees are malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawModelFile = serde_json::from_str(json)
            .map_err(|e| AttritionError::Model(format!("invalid XGBoost model JSON: {e}")))?;
        Self::from_raw(raw)
    }

    /// Load a model file written by `save_model("*.json")`.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AttritionError::Model(format!("failed to read model file {}: {e}", path.display()))
        })?;
        let model = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            trees = model.trees.len(),
            features = model.num_feature,
            objective = ?model.objective,
            "Loaded XGBoost model"
        );
        Ok(model)
    }

    fn from_raw(raw: RawModelFile) -> Result<Self> {
        let learner = raw.learner;
        let objective = Objective::parse(&learner.objective.name)?;

        let params = &learner.learner_model_param;
        let num_feature: usize = params.num_feature.trim().parse().map_err(|_| {
            AttritionError::Model(format!("invalid num_feature {:?}", params.num_feature))
        })?;
        let num_class = parse_optional_count(params.num_class.as_deref(), "num_class")?;
        let num_target = parse_optional_count(params.num_target.as_deref(), "num_target")?;
        if num_class > 1 || num_target > 1 {
            return Err(AttritionError::Model(format!(
                "only single-output binary models are supported (num_class={num_class}, num_target={num_target})"
            )));
        }
        let base_margin = logit(parse_base_score(&params.base_score)?)?;

        let (ensemble, weight_drop) = match learner.gradient_booster.name.as_str() {
            "gbtree" => (learner.gradient_booster.model, None),
            "dart" => {
                let inner = learner.gradient_booster.gbtree.ok_or_else(|| {
                    AttritionError::Model("dart booster without gbtree section".to_string())
                })?;
                (inner.model, learner.gradient_booster.weight_drop)
            }
            other => {
                return Err(AttritionError::Model(format!(
                    "unsupported booster {other:?}, expected gbtree or dart"
                )))
            }
        };
        let ensemble =
            ensemble.ok_or_else(|| AttritionError::Model("booster has no model section".to_string()))?;
        let parallel_trees = ensemble
            .gbtree_model_param
            .as_ref()
            .and_then(|param| param.num_parallel_tree.as_deref());
        let trees_per_round = parse_optional_count(parallel_trees, "num_parallel_tree")?.max(1);

        let mut trees = ensemble
            .trees
            .into_iter()
            .enumerate()
            .map(|(idx, tree)| RegressionTree::from_raw(tree, num_feature, idx))
            .collect::<Result<Vec<_>>>()?;

        let mut tree_weights = match weight_drop {
            Some(weights) if weights.len() == trees.len() => weights,
            Some(weights) => {
                return Err(AttritionError::Model(format!(
                    "dart weight_drop has {} entries for {} trees",
                    weights.len(),
                    trees.len()
                )))
            }
            None => vec![1.0; trees.len()],
        };

        if let Some(raw_best) = learner.attributes.best_iteration.as_deref() {
            let best_iteration: u64 = raw_best.trim().parse().map_err(|_| {
                AttritionError::Model(format!("invalid best_iteration {raw_best:?}"))
            })?;
            let rounds = best_iteration.saturating_add(1).saturating_mul(trees_per_round);
            let kept = usize::try_from(rounds).unwrap_or(usize::MAX).min(trees.len());
            if kept < trees.len() {
                info!(
                    best_iteration,
                    kept,
                    dropped = trees.len() - kept,
                    "Truncating ensemble to early-stopping round"
                );
            }
            trees.truncate(kept);
            tree_weights.truncate(kept);
        }

        let feature_names = if learner.feature_names.is_empty() {
            None
        } else if learner.feature_names.len() != num_feature {
            return Err(AttritionError::Model(format!(
                "model lists {} feature names but num_feature is {num_feature}",
                learner.feature_names.len()
            )));
        } else {
            Some(learner.feature_names)
        };

        tracing::debug!(version = ?raw.version, "Parsed XGBoost model JSON");

        Ok(Self {
            trees,
            tree_weights,
            base_margin,
            num_feature,
            feature_names,
            objective,
        })
    }

    /// Trees in boosting order.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Per-tree output weight (1.0 unless the model is a dart booster).
    pub fn tree_weights(&self) -> &[f64] {
        &self.tree_weights
    }

    /// Log-odds the ensemble starts from.
    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    /// Number of input columns.
    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Column names saved with the model, if any.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Training objective.
    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Raw log-odds output for one row.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the row has the wrong width.
    pub fn predict_margin(&self, features: &[f64]) -> Result<f64> {
        self.check_width(features)?;
        Ok(self
            .trees
            .iter()
            .zip(&self.tree_weights)
            .map(|(tree, weight)| weight * tree.predict(features))
            .sum::<f64>()
            + self.base_margin)
    }

    /// Probability of the positive class for one row.
    ///
    /// # Errors
    ///
    /// Returns [`AttritionError::Model`] if the row has the wrong width.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        self.predict_margin(features).map(sigmoid)
    }

    pub(crate) fn check_width(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.num_feature {
            return Err(AttritionError::Model(format!(
                "model expects {} features, got {}",
                self.num_feature,
                features.len()
            )));
        }
        Ok(())
    }
}

/// Parse `"5E-1"` or the bracketed `"[5E-1]"` form newer versions write.
fn parse_base_score(raw: &str) -> Result<f64> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| AttritionError::Model(format!("invalid base_score {raw:?}")))
}

fn parse_optional_count(raw: Option<&str>, field: &str) -> Result<u64> {
    match raw {
        None => Ok(0),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AttritionError::Model(format!("invalid {field} {value:?}"))),
    }
}

fn logit(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AttritionError::Model(format!(
            "base_score must be strictly between 0 and 1, got {p}"
        )));
    }
    Ok((p / (1.0 - p)).ln())
}

/// Logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
