//! Hyperparameter grids
//!
//! A grid maps each hyperparameter name to the list of values to try. Keys
//! are held in a `BTreeMap`, so candidate enumeration order depends only on
//! the key names and the value order in each list.

use crate::error::{PipelineError, Result};
use super::random_forest::{MaxFeatures, RandomForest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single hyperparameter value as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "None"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One point of the grid: one value per hyperparameter
pub type Candidate = BTreeMap<String, ParamValue>;

/// Render a candidate as `name=value, ...` in key order
pub fn describe_candidate(candidate: &Candidate) -> String {
    candidate
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Supported estimator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatorKind {
    RandomForest,
}

impl FromStr for EstimatorKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_forest" | "RandomForestRegressor" => Ok(EstimatorKind::RandomForest),
            other => Err(PipelineError::Config(format!(
                "unsupported estimator '{}' (supported: random_forest)",
                other
            ))),
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorKind::RandomForest => write!(f, "random_forest"),
        }
    }
}

/// Hyperparameter names a random forest grid may use
pub const FOREST_PARAMS: &[&str] = &[
    "n_estimators",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "max_features",
    "bootstrap",
];

/// Named hyperparameter lists
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    /// Build a grid, rejecting hyperparameter names the forest does not know
    pub fn new(params: BTreeMap<String, Vec<ParamValue>>) -> Result<Self> {
        if let Some(unknown) = params.keys().find(|k| !FOREST_PARAMS.contains(&k.as_str())) {
            return Err(PipelineError::Config(format!(
                "unknown hyperparameter '{}' (expected one of: {})",
                unknown,
                FOREST_PARAMS.join(", ")
            )));
        }
        Ok(Self { params })
    }

    /// Check every listed value against its hyperparameter's domain
    pub fn validate(&self) -> Result<()> {
        let mut scratch = ForestParams::default();
        for (name, values) in &self.params {
            for value in values {
                scratch.set(name, value)?;
            }
        }
        Ok(())
    }

    /// Number of candidates; zero if the grid or any of its lists is empty
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of the value lists. The last key varies fastest.
    pub fn candidates(&self) -> Vec<Candidate> {
        let total = self.len();
        if total == 0 {
            return Vec::new();
        }

        let entries: Vec<(&String, &Vec<ParamValue>)> = self.params.iter().collect();
        let mut counters = vec![0usize; entries.len()];
        let mut out = Vec::with_capacity(total);

        for _ in 0..total {
            out.push(
                entries
                    .iter()
                    .zip(&counters)
                    .map(|((name, values), &i)| ((*name).clone(), values[i].clone()))
                    .collect(),
            );

            for pos in (0..entries.len()).rev() {
                counters[pos] += 1;
                if counters[pos] < entries[pos].1.len() {
                    break;
                }
                counters[pos] = 0;
            }
        }

        out
    }
}

/// Fully resolved forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    /// Defaults overridden by every entry of the candidate
    pub fn from_candidate(candidate: &Candidate) -> Result<Self> {
        let mut params = Self::default();
        for (name, value) in candidate {
            params.set(name, value)?;
        }
        Ok(params)
    }

    fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = positive_int(name, value, 1)?,
            "max_depth" => {
                self.max_depth = match value {
                    ParamValue::Null => None,
                    other => Some(positive_int(name, other, 1)?),
                }
            }
            "min_samples_split" => self.min_samples_split = positive_int(name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = positive_int(name, value, 1)?,
            "max_features" => self.max_features = max_features(value)?,
            "bootstrap" => match value {
                ParamValue::Bool(b) => self.bootstrap = *b,
                other => return Err(bad_value(name, other, "a boolean")),
            },
            other => {
                return Err(PipelineError::Config(format!(
                    "unknown hyperparameter '{}'",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Unfitted forest carrying these hyperparameters
    pub fn build(&self, seed: u64) -> RandomForest {
        RandomForest::new(self.n_estimators)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_random_state(seed)
    }
}

fn positive_int(name: &str, value: &ParamValue, min: usize) -> Result<usize> {
    match value {
        ParamValue::Int(i) if *i >= min as i64 => Ok(*i as usize),
        other => Err(bad_value(name, other, &format!("an integer >= {}", min))),
    }
}

fn max_features(value: &ParamValue) -> Result<MaxFeatures> {
    match value {
        ParamValue::Null => Ok(MaxFeatures::All),
        ParamValue::Str(s) => match s.as_str() {
            "all" | "auto" => Ok(MaxFeatures::All),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            _ => Err(bad_value("max_features", value, "null, 'sqrt', 'log2' or 'all'")),
        },
        ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
        ParamValue::Int(i) if *i >= 1 => Ok(MaxFeatures::Fixed(*i as usize)),
        other => Err(bad_value(
            "max_features",
            other,
            "a fraction in (0, 1] or a positive integer",
        )),
    }
}

fn bad_value(name: &str, value: &ParamValue, expected: &str) -> PipelineError {
    PipelineError::Config(format!(
        "hyperparameter '{}' = {} is invalid, expected {}",
        name, value, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
        ParamGrid::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_param_value_from_yaml() {
        let values: Vec<ParamValue> =
            serde_yaml::from_str("[null, true, 3, 0.5, sqrt]").unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Null,
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Str("sqrt".to_string()),
            ]
        );
    }

    #[test]
    fn test_candidates_last_key_fastest() {
        let g = grid(&[
            ("n_estimators", vec![ParamValue::Int(10), ParamValue::Int(20)]),
            ("max_depth", vec![ParamValue::Null, ParamValue::Int(4), ParamValue::Int(8)]),
        ]);
        assert_eq!(g.len(), 6);

        let rendered: Vec<String> = g.candidates().iter().map(describe_candidate).collect();
        assert_eq!(
            rendered,
            vec![
                "max_depth=None, n_estimators=10",
                "max_depth=None, n_estimators=20",
                "max_depth=4, n_estimators=10",
                "max_depth=4, n_estimators=20",
                "max_depth=8, n_estimators=10",
                "max_depth=8, n_estimators=20",
            ]
        );
    }

    #[test]
    fn test_empty_grid_has_no_candidates() {
        let g = grid(&[]);
        assert!(g.is_empty());
        assert!(g.candidates().is_empty());

        let g = grid(&[("n_estimators", vec![])]);
        assert_eq!(g.len(), 0);
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut map = BTreeMap::new();
        map.insert("learning_rate".to_string(), vec![ParamValue::Float(0.1)]);
        let err = ParamGrid::new(map).unwrap_err();
        assert!(err.to_string().contains("learning_rate"));
    }

    #[test]
    fn test_forest_params_from_candidate() {
        let mut c = Candidate::new();
        c.insert("n_estimators".to_string(), ParamValue::Int(50));
        c.insert("max_depth".to_string(), ParamValue::Int(6));
        c.insert("max_features".to_string(), ParamValue::Str("sqrt".to_string()));
        c.insert("bootstrap".to_string(), ParamValue::Bool(false));

        let p = ForestParams::from_candidate(&c).unwrap();
        assert_eq!(p.n_estimators, 50);
        assert_eq!(p.max_depth, Some(6));
        assert_eq!(p.max_features, MaxFeatures::Sqrt);
        assert!(!p.bootstrap);
        assert_eq!(p.min_samples_split, 2);

        let forest = p.build(9);
        assert_eq!(forest.n_estimators, 50);
        assert_eq!(forest.random_state, Some(9));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let g = grid(&[("min_samples_split", vec![ParamValue::Int(1)])]);
        assert!(g.validate().is_err());

        let g = grid(&[("max_features", vec![ParamValue::Float(1.5)])]);
        assert!(g.validate().is_err());

        let g = grid(&[("n_estimators", vec![ParamValue::Str("many".to_string())])]);
        assert!(matches!(g.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_estimator_kind_parse() {
        assert_eq!("random_forest".parse::<EstimatorKind>().unwrap(), EstimatorKind::RandomForest);
        assert_eq!(
            "RandomForestRegressor".parse::<EstimatorKind>().unwrap(),
            EstimatorKind::RandomForest
        );
        assert!("svr".parse::<EstimatorKind>().is_err());
    }
}
