//! Tree-ensemble inference for the attrition dashboard
//!
//! Loads the XGBoost classifier saved at training time, evaluates it in
//! pure Rust, and explains individual predictions with TreeSHAP. The
//! [`XgbAttritionClassifier`] binds a model to the feature schema it was
//! trained on and implements [`attrition_core::AttritionClassifier`].

pub mod classifier;
pub mod schema;
pub mod shap;
pub mod xgboost;

pub use classifier::XgbAttritionClassifier;
pub use schema::load_schema;
pub use shap::{tree_shap, ShapValues};
pub use xgboost::{Objective, RegressionTree, TreeNode, XgbModel};
