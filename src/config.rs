use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    parser::{ParseOptions, RecordParser},
    trainer::TrainerConfig,
};

/// Names a JSON config file when none is given explicitly.
pub const CONFIG_ENV: &str = "PRICE_PREDICTOR_CONFIG";
/// Overrides `store_dir`.
pub const STORE_ENV: &str = "PRICE_PREDICTOR_STORE";

const DEFAULT_STORE_DIR: &str = ".price-predictor";

/// Everything a pipeline run can be tuned with. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store_dir: PathBuf,
    pub parse: ParseOptions,
    pub trainer: TrainerConfig,
    /// Rebuild the dataset even if one is stored.
    pub rebuild_dataset: bool,
    /// Train even if a model is stored.
    pub retrain: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            parse: ParseOptions::default(),
            trainer: TrainerConfig::default(),
            rebuild_dataset: false,
            retrain: false,
        }
    }
}

impl PipelineConfig {
    /// Reads a config from a JSON file, missing fields take their default.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Loads the config from `path`, or from the file `PRICE_PREDICTOR_CONFIG` names, or the
    /// defaults. `PRICE_PREDICTOR_STORE` then overrides the store directory.
    ///
    /// # Returns
    /// A validated config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| env::var(key).ok())
    }

    fn load_with<F>(path: Option<&Path>, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.map(Path::to_path_buf).or_else(|| var(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(dir) = var(STORE_ENV) {
            config.store_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        RecordParser::new(self.parse).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.trainer
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_hyper_parameters() {
        let config = PipelineConfig::load_with(None, vars(&[])).unwrap();

        assert_eq!(config.trainer.hidden_layers, vec![10]);
        assert_eq!(config.trainer.max_iterations, 5000);
        assert_eq!(config.trainer.error_threshold, 0.005);
        assert_eq!(config.trainer.learning_rate, 0.3);
        assert_eq!(config.trainer.momentum, 0.1);
        assert_eq!(config.trainer.log_period.get(), 10);
        assert!(config.parse.has_headers);
        assert_eq!(config.parse.delimiter, ',');
        assert!(!config.retrain);
    }

    #[test]
    fn file_fields_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "retrain": true, "parse": { "delimiter": ";" }, "trainer": { "hidden_layers": [8, 4], "seed": 42 } }"#,
        )
        .unwrap();

        let config = PipelineConfig::load_with(Some(&path), vars(&[])).unwrap();

        assert!(config.retrain);
        assert_eq!(config.parse.delimiter, ';');
        assert!(config.parse.skip_empty_lines);
        assert_eq!(config.trainer.hidden_layers, vec![8, 4]);
        assert_eq!(config.trainer.seed, Some(42));
        assert_eq!(config.trainer.max_iterations, 5000);
    }

    #[test]
    fn environment_names_the_file_and_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "rebuild_dataset": true }"#).unwrap();

        let path = path.to_string_lossy().into_owned();
        let env = vars(&[(CONFIG_ENV, path.as_str()), (STORE_ENV, "/tmp/models")]);
        let config = PipelineConfig::load_with(None, env).unwrap();

        assert!(config.rebuild_dataset);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/models"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "trainer": { "learning_rate": 0 } }"#).unwrap();
        assert!(matches!(
            PipelineConfig::load_with(Some(&path), vars(&[])),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(
            &path,
            r#"{ "trainer": { "init": { "uniform": { "low": 1, "high": 0 } } } }"#,
        )
        .unwrap();
        assert!(matches!(
            PipelineConfig::load_with(Some(&path), vars(&[])),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, r#"{ "parse": { "delimiter": "é" } }"#).unwrap();
        assert!(matches!(
            PipelineConfig::load_with(Some(&path), vars(&[])),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load_with(Some(&path), vars(&[])),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = PipelineConfig::load_with(Some(Path::new("/nonexistent/config.json")), vars(&[]));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
