//! Hyperparameter search space and candidate configurations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// The domain of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    /// An explicit set of candidate values, tried in order
    Discrete(Vec<ParamValue>),
    /// Integers `low..=high` stepping by `step`
    IntRange { low: i64, high: i64, step: i64 },
    /// `points` evenly spaced floats across `[low, high]`
    FloatGrid { low: f64, high: f64, points: usize },
    /// A single pinned value
    Fixed(ParamValue),
}

impl ParamDomain {
    /// Enumerate the candidate values in canonical order.
    pub fn values(&self) -> Vec<ParamValue> {
        match self {
            ParamDomain::Discrete(values) => values.clone(),
            ParamDomain::IntRange { low, high, step } => {
                if *step <= 0 || low > high {
                    return Vec::new();
                }
                (*low..=*high)
                    .step_by(*step as usize)
                    .map(ParamValue::Int)
                    .collect()
            }
            ParamDomain::FloatGrid { low, high, points } => match points {
                0 => Vec::new(),
                1 => vec![ParamValue::Float(*low)],
                n => (0..*n)
                    .map(|i| {
                        let t = i as f64 / (*n - 1) as f64;
                        ParamValue::Float(low + t * (high - low))
                    })
                    .collect(),
            },
            ParamDomain::Fixed(value) => vec![value.clone()],
        }
    }
}

/// A named parameter with its domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub domain: ParamDomain,
}

/// The searchable configuration space exposed by a builder factory.
///
/// Parameter declaration order is the canonical enumeration order: it fixes
/// the sweep order of the optimizer and its tie-breaking rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a discrete parameter.
    pub fn discrete(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = ParamValue>,
    ) -> Self {
        self.insert(Parameter {
            name: name.into(),
            domain: ParamDomain::Discrete(values.into_iter().collect()),
        });
        self
    }

    /// Add an integer range parameter.
    pub fn int_range(mut self, name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        self.insert(Parameter {
            name: name.into(),
            domain: ParamDomain::IntRange { low, high, step },
        });
        self
    }

    /// Add an evenly spaced float grid parameter.
    pub fn float_grid(mut self, name: impl Into<String>, low: f64, high: f64, points: usize) -> Self {
        self.insert(Parameter {
            name: name.into(),
            domain: ParamDomain::FloatGrid { low, high, points },
        });
        self
    }

    /// Pin a parameter to a single value.
    pub fn fixed(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.insert(Parameter {
            name: name.into(),
            domain: ParamDomain::Fixed(value),
        });
        self
    }

    /// Append another space; a parameter re-declared later replaces the
    /// earlier declaration in place. Used by decorator factories to extend
    /// or override the space of the factory they wrap.
    pub fn merge(mut self, other: SearchSpace) -> Self {
        for parameter in other.parameters {
            self.insert(parameter);
        }
        self
    }

    fn insert(&mut self, parameter: Parameter) {
        if let Some(existing) = self
            .parameters
            .iter_mut()
            .find(|p| p.name == parameter.name)
        {
            existing.domain = parameter.domain;
        } else {
            self.parameters.push(parameter);
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() || self.parameters.iter().all(|p| p.domain.values().is_empty())
    }

    /// Starting configuration: the first value of every parameter, or `None`
    /// for an empty space.
    pub fn default_configuration(&self) -> Option<Configuration> {
        if self.parameters.is_empty() {
            return None;
        }
        let mut configuration = Configuration::new();
        for parameter in &self.parameters {
            let first = parameter.domain.values().into_iter().next()?;
            configuration.set(&parameter.name, first);
        }
        Some(configuration)
    }
}

/// One hyperparameter setting: a stable-ordered map from parameter name to
/// value. Produced by the search, interpreted only by the builder factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    values: BTreeMap<String, ParamValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deterministic text form, usable as a cache key.
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}
