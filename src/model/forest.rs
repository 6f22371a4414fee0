//! Random forest over attribute-map instances
//!
//! Instances are featurized into a dense matrix (numeric and boolean
//! attributes directly, low-cardinality categoricals one-hot encoded), then
//! a forest of weighted binary classification trees is grown on bootstrap
//! samples. Tree scores are positive-class probabilities; the forest
//! predicts their mean.

use super::{ModelBuilderFactory, PredictiveModel};
use crate::data::{AttributeValue, AttributesMap, Instance, Label};
use crate::error::{Result, TimefoldError};
use crate::optimizer::{Configuration, SearchSpace};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Categorical attributes with more distinct values than this are dropped
/// rather than one-hot encoded.
const MAX_ONE_HOT: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum FeatureColumn {
    /// Numeric or boolean attribute taken as-is; missing values read as 0
    Numeric { attribute: String },
    /// Indicator for one categorical value of an attribute
    OneHot { attribute: String, value: String },
}

/// Deterministic mapping from attribute maps to feature vectors.
///
/// The layout is fixed at fit time from the training instances; unseen
/// attributes and unseen categorical values contribute zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Featurizer {
    columns: Vec<FeatureColumn>,
}

impl Featurizer {
    pub fn fit(instances: &[Instance]) -> Self {
        let mut numeric: BTreeSet<String> = BTreeSet::new();
        let mut categorical: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for instance in instances {
            for (name, value) in instance.attributes() {
                match value {
                    AttributeValue::Numeric(_) | AttributeValue::Boolean(_) => {
                        numeric.insert(name.clone());
                    }
                    AttributeValue::Categorical(text) => {
                        categorical.entry(name.clone()).or_default().insert(text.clone());
                    }
                }
            }
        }

        let mut columns = Vec::new();
        for attribute in &numeric {
            columns.push(FeatureColumn::Numeric {
                attribute: attribute.clone(),
            });
        }
        for (attribute, values) in &categorical {
            // An attribute seen as both numeric and categorical stays numeric
            if numeric.contains(attribute) {
                continue;
            }
            if values.len() > MAX_ONE_HOT {
                debug!(
                    attribute = attribute.as_str(),
                    cardinality = values.len(),
                    "dropping high-cardinality categorical attribute"
                );
                continue;
            }
            for value in values {
                columns.push(FeatureColumn::OneHot {
                    attribute: attribute.clone(),
                    value: value.clone(),
                });
            }
        }

        Self { columns }
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn transform_one(&self, attributes: &AttributesMap) -> Array1<f64> {
        let features: Vec<f64> = self
            .columns
            .iter()
            .map(|column| match column {
                FeatureColumn::Numeric { attribute } => attributes
                    .get(attribute)
                    .and_then(|v| v.as_numeric())
                    .unwrap_or(0.0),
                FeatureColumn::OneHot { attribute, value } => {
                    match attributes.get(attribute).and_then(|v| v.as_categorical()) {
                        Some(text) if text == value => 1.0,
                        _ => 0.0,
                    }
                }
            })
            .collect();
        Array1::from_vec(features)
    }

    pub fn transform(&self, instances: &[Instance]) -> Array2<f64> {
        let mut matrix = Array2::zeros((instances.len(), self.n_features()));
        for (i, instance) in instances.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform_one(instance.attributes()));
        }
        matrix
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_leaf_weight: f64,
    max_features: usize,
}

/// One weighted binary classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttributeTree {
    root: TreeNode,
}

impl AttributeTree {
    fn grow(
        x: &Array2<f64>,
        y: &[f64],
        w: &[f64],
        indices: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        Self {
            root: Self::grow_node(x, y, w, indices, 0, params, rng),
        }
    }

    fn grow_node(
        x: &Array2<f64>,
        y: &[f64],
        w: &[f64],
        indices: &[usize],
        depth: usize,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let (total, positive) = Self::weight_sums(y, w, indices);
        let probability = if total > 0.0 { positive / total } else { 0.5 };

        let pure = probability <= 0.0 || probability >= 1.0;
        if depth >= params.max_depth || total < 2.0 * params.min_leaf_weight || pure {
            return TreeNode::Leaf { probability };
        }

        match Self::best_split(x, y, w, indices, params, rng) {
            None => TreeNode::Leaf { probability },
            Some((feature, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature]] <= threshold);

                let left = Box::new(Self::grow_node(x, y, w, &left_idx, depth + 1, params, rng));
                let right = Box::new(Self::grow_node(x, y, w, &right_idx, depth + 1, params, rng));
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }
            }
        }
    }

    fn weight_sums(y: &[f64], w: &[f64], indices: &[usize]) -> (f64, f64) {
        let mut total = 0.0;
        let mut positive = 0.0;
        for &i in indices {
            total += w[i];
            positive += w[i] * y[i];
        }
        (total, positive)
    }

    /// Weighted Gini impurity of a binary node.
    fn gini(total: f64, positive: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        let p = positive / total;
        2.0 * p * (1.0 - p)
    }

    /// Best (feature, threshold) over a random feature subset, by weighted
    /// Gini gain; prefix sums over the sorted column score every threshold
    /// in one pass.
    fn best_split(
        x: &Array2<f64>,
        y: &[f64],
        w: &[f64],
        indices: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let k = params.max_features.min(n_features).max(1);
        let candidates = sample(rng, n_features, k);

        let (total, positive) = Self::weight_sums(y, w, indices);
        let parent = Self::gini(total, positive);

        let mut best: Option<(f64, usize, f64)> = None;
        for feature in candidates {
            let mut rows: Vec<(f64, f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature]], w[i], w[i] * y[i]))
                .collect();
            rows.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_total = 0.0;
            let mut left_positive = 0.0;
            for pair in 0..rows.len().saturating_sub(1) {
                left_total += rows[pair].1;
                left_positive += rows[pair].2;

                // A threshold only exists between distinct values
                if rows[pair].0 == rows[pair + 1].0 {
                    continue;
                }
                let right_total = total - left_total;
                let right_positive = positive - left_positive;
                if left_total < params.min_leaf_weight || right_total < params.min_leaf_weight {
                    continue;
                }

                let weighted = (left_total * Self::gini(left_total, left_positive)
                    + right_total * Self::gini(right_total, right_positive))
                    / total;
                let gain = parent - weighted;
                let threshold = (rows[pair].0 + rows[pair + 1].0) / 2.0;

                let better = match best {
                    None => gain > 1e-12,
                    Some((best_gain, _, _)) => gain > best_gain,
                };
                if better {
                    best = Some((gain, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    fn predict_row(&self, row: &Array1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { probability } => return *probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// A fitted forest: featurizer plus trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeForest {
    featurizer: Featurizer,
    trees: Vec<AttributeTree>,
}

impl PredictiveModel for AttributeForest {
    fn predict(&self, attributes: &AttributesMap) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(TimefoldError::ModelNotFitted);
        }
        let row = self.featurizer.transform_one(attributes);
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_row(&row)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

/// Builder factory for [`AttributeForest`] models.
pub struct RandomForestFactory {
    positive_label: Label,
    seed: u64,
    space: SearchSpace,
}

impl Default for RandomForestFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForestFactory {
    pub fn new() -> Self {
        Self {
            positive_label: Label::Boolean(true),
            seed: 42,
            space: Self::default_space(),
        }
    }

    fn default_space() -> SearchSpace {
        SearchSpace::new()
            .discrete("n_trees", [16i64.into(), 32i64.into(), 64i64.into()])
            .discrete("max_depth", [4i64.into(), 8i64.into(), 12i64.into()])
            .discrete("min_leaf_weight", [1.0.into(), 4.0.into(), 16.0.into()])
    }

    pub fn with_positive_label(mut self, label: Label) -> Self {
        self.positive_label = label;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the searchable space, e.g. to pin or widen parameters.
    pub fn with_parameter_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }
}

impl ModelBuilderFactory for RandomForestFactory {
    fn name(&self) -> &str {
        "random-forest"
    }

    fn parameter_space(&self) -> SearchSpace {
        self.space.clone()
    }

    fn build(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<Box<dyn PredictiveModel>> {
        if instances.is_empty() {
            return Err(TimefoldError::InsufficientData(
                "cannot fit a forest on an empty training set".to_string(),
            ));
        }

        let n_trees = configuration.get_int("n_trees").unwrap_or(32).max(1) as usize;
        let max_depth = configuration.get_int("max_depth").unwrap_or(8).max(1) as usize;
        let min_leaf_weight = configuration
            .get_float("min_leaf_weight")
            .unwrap_or(1.0)
            .max(f64::MIN_POSITIVE);

        let featurizer = Featurizer::fit(instances);
        if featurizer.n_features() == 0 {
            return Err(TimefoldError::ValidationError(
                "training instances have no usable attributes".to_string(),
            ));
        }

        let x = featurizer.transform(instances);
        let y: Vec<f64> = instances
            .iter()
            .map(|i| i.label().binary_indicator(&self.positive_label))
            .collect();
        let w: Vec<f64> = instances.iter().map(|i| i.weight()).collect();

        let params = TreeParams {
            max_depth,
            min_leaf_weight,
            max_features: (featurizer.n_features() as f64).sqrt().ceil() as usize,
        };

        let n = instances.len();
        let trees: Vec<AttributeTree> = (0..n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                AttributeTree::grow(&x, &y, &w, &bootstrap, params, &mut rng)
            })
            .collect();

        Ok(Box::new(AttributeForest { featurizer, trees }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributesMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn separable_instances(n: usize) -> Vec<Instance> {
        (0..n)
            .map(|i| {
                let x = ((i * 13) % n) as f64 / n as f64;
                let noise = ((i * 7) % n) as f64 / n as f64;
                Instance::new(
                    attrs(&[("x", x.into()), ("noise", noise.into())]),
                    Label::Boolean(x > 0.5),
                )
            })
            .collect()
    }

    fn build_forest(instances: &[Instance], config: Configuration) -> Box<dyn PredictiveModel> {
        RandomForestFactory::new()
            .with_seed(7)
            .build(&config, instances)
            .unwrap()
    }

    #[test]
    fn test_featurizer_layout_is_deterministic() {
        let instances = vec![
            Instance::new(
                attrs(&[("b", 1.0.into()), ("a", "red".into())]),
                Label::Boolean(true),
            ),
            Instance::new(
                attrs(&[("a", "blue".into()), ("b", 2.0.into())]),
                Label::Boolean(false),
            ),
        ];
        let first = Featurizer::fit(&instances);
        let second = Featurizer::fit(&instances);
        assert_eq!(first, second);
        // numeric `b` plus one-hot blue/red for `a`
        assert_eq!(first.n_features(), 3);
    }

    #[test]
    fn test_featurizer_missing_values_are_zero() {
        let instances = vec![Instance::new(
            attrs(&[("x", 3.0.into()), ("color", "red".into())]),
            Label::Boolean(true),
        )];
        let featurizer = Featurizer::fit(&instances);

        let row = featurizer.transform_one(&attrs(&[("color", "green".into())]));
        assert!(row.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_forest_separates_classes() {
        let instances = separable_instances(200);
        let model = build_forest(
            &instances,
            Configuration::new()
                .with("n_trees", 32i64.into())
                .with("max_depth", 8i64.into()),
        );

        let high = model.predict(&attrs(&[("x", 0.9.into())])).unwrap();
        let low = model.predict(&attrs(&[("x", 0.1.into())])).unwrap();
        assert!(high > 0.7, "high = {}", high);
        assert!(low < 0.3, "low = {}", low);
    }

    #[test]
    fn test_overregularized_forest_is_constant() {
        // A minimum leaf weight above the total training weight forces a
        // single root leaf per tree
        let instances = separable_instances(50);
        let model = build_forest(
            &instances,
            Configuration::new().with("min_leaf_weight", 1.0e6.into()),
        );

        let a = model.predict(&attrs(&[("x", 0.9.into())])).unwrap();
        let b = model.predict(&attrs(&[("x", 0.1.into())])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_is_deterministic() {
        let instances = separable_instances(100);
        let config = Configuration::new().with("n_trees", 16i64.into());
        let first = build_forest(&instances, config.clone());
        let second = build_forest(&instances, config);

        let probe = attrs(&[("x", 0.42.into()), ("noise", 0.1.into())]);
        assert_eq!(
            first.predict(&probe).unwrap(),
            second.predict(&probe).unwrap()
        );
    }

    #[test]
    fn test_weights_steer_the_fit() {
        // Zero-weighted contradictory labels must not influence the forest
        let mut instances = separable_instances(100);
        for instance in instances.iter_mut().take(20) {
            let flipped = match instance.label() {
                Label::Boolean(b) => Label::Boolean(!b),
                other => other.clone(),
            };
            *instance = Instance::new(instance.attributes().clone(), flipped).with_weight(0.0);
        }

        let model = build_forest(&instances, Configuration::new());
        let high = model.predict(&attrs(&[("x", 0.95.into())])).unwrap();
        assert!(high > 0.6, "high = {}", high);
    }

    #[test]
    fn test_empty_training_set_error() {
        let err = RandomForestFactory::new().build(&Configuration::new(), &[]);
        assert!(matches!(err, Err(TimefoldError::InsufficientData(_))));
    }

    #[test]
    fn test_categorical_features_are_used() {
        let instances: Vec<Instance> = (0..100)
            .map(|i| {
                let color = if i % 2 == 0 { "red" } else { "blue" };
                Instance::new(attrs(&[("color", color.into())]), Label::Boolean(i % 2 == 0))
            })
            .collect();

        let model = build_forest(&instances, Configuration::new());
        let red = model.predict(&attrs(&[("color", "red".into())])).unwrap();
        let blue = model.predict(&attrs(&[("color", "blue".into())])).unwrap();
        assert!(red > 0.8, "red = {}", red);
        assert!(blue < 0.2, "blue = {}", blue);
    }
}
