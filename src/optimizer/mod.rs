//! Hyperparameter optimization
//!
//! A [`SearchSpace`] declares the tunable parameters of a model builder
//! factory; the [`PredictiveModelOptimizer`] searches it with greedy
//! coordinate descent, scoring every candidate [`Configuration`] through a
//! cross-validator and caching losses by canonical key.

pub mod config;
pub mod optimizer;
pub mod search_space;

pub use config::OptimizerConfig;
pub use optimizer::{EvaluationRecord, Optimum, PredictiveModelOptimizer, RankedOptimum};
pub use search_space::{Configuration, ParamDomain, ParamValue, Parameter, SearchSpace};
