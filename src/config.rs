use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Defines what the config file should contain.
pub struct Config {
    /// IoU thresholds at which segment F1 is reported.
    pub overlaps: Vec<f64>,
    /// Include background segments in segment-level metrics.
    pub eval_background: bool,
    /// Class indices treated as background when `eval_background` is off.
    pub background_classes: Vec<usize>,
    /// Also report the mean per-video Edit score.
    pub eval_edit: bool,
    /// Temporal down-sample rate applied to training labels.
    pub sample_rate: usize,
    /// Fraction of videos assigned to the training split.
    pub train_fraction: f64,
    /// Seed of the train/test split shuffle.
    pub split_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overlaps: vec![0.1, 0.25, 0.5],
            eval_background: true,
            background_classes: vec![0],
            eval_edit: false,
            sample_rate: 1,
            train_fraction: 0.8,
            split_seed: 2025,
        }
    }
}

impl Config {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> EvalResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EvalResult<()> {
        if self.overlaps.is_empty() {
            return Err(invalid("at least one overlap threshold is required"));
        }
        if let Some(bad) = self
            .overlaps
            .iter()
            .find(|&&overlap| !(overlap > 0.0 && overlap <= 1.0))
        {
            return Err(invalid(format!("overlap {bad} is outside (0, 1]")));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(invalid(format!(
                "train_fraction {} is outside [0, 1]",
                self.train_fraction
            )));
        }
        Ok(())
    }

    /// The classes actually excluded from segment metrics.
    pub fn effective_background(&self) -> BTreeSet<usize> {
        if self.eval_background {
            BTreeSet::new()
        } else {
            self.background_classes.iter().copied().collect()
        }
    }
}

fn invalid(reason: impl Into<String>) -> EvalError {
    EvalError::InvalidConfiguration {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_overlap() {
        let config = Config {
            overlaps: vec![0.5, 1.5],
            ..Config::default()
        };
        match config.validate() {
            Err(EvalError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("1.5"));
            }
            other => panic!("Expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_overlap_and_zero_sample_rate() {
        let zero_overlap = Config {
            overlaps: vec![0.0],
            ..Config::default()
        };
        assert!(zero_overlap.validate().is_err());

        let zero_rate = Config {
            sample_rate: 0,
            ..Config::default()
        };
        assert!(zero_rate.validate().is_err());
    }

    #[test]
    fn background_is_empty_when_evaluated() {
        let config = Config::default();
        assert!(config.effective_background().is_empty());

        let config = Config {
            eval_background: false,
            background_classes: vec![0, 3],
            ..Config::default()
        };
        assert_eq!(
            config.effective_background(),
            [0, 3].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn partial_json_takes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eval.json");
        fs::write(&path, r#"{ "overlaps": [0.5], "eval_background": false }"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.overlaps, vec![0.5]);
        assert!(!config.eval_background);
        assert_eq!(config.background_classes, vec![0]);
        assert_eq!(config.sample_rate, 1);
        assert!(!config.eval_edit);
    }
}
