use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// Structural failures while reading delimited text, fatal to the whole parse.
#[derive(Debug)]
pub enum ParseError {
    InvalidDelimiter(char),
    UnterminatedQuote { line: usize },
    Encoding { offset: usize },
    Malformed { line: Option<u64>, msg: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDelimiter(c) => write!(f, "delimiter {c:?} is not a single ASCII byte"),
            Self::UnterminatedQuote { line } => {
                write!(f, "quoted field opened at line {line} is never closed")
            }
            Self::Encoding { offset } => write!(f, "input is not valid UTF-8 at byte {offset}"),
            Self::Malformed {
                line: Some(line),
                msg,
            } => write!(f, "malformed input at line {line}: {msg}"),
            Self::Malformed { line: None, msg } => write!(f, "malformed input: {msg}"),
        }
    }
}

impl Error for ParseError {}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line());
        Self::Malformed {
            line,
            msg: e.to_string(),
        }
    }
}

/// A single record that can't be turned into features.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    MissingField(&'static str),
    NotANumber { field: &'static str, value: String },
    InvalidSize(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field '{field}'"),
            Self::NotANumber { field, value } => {
                write!(f, "field '{field}' is not a number: {value:?}")
            }
            Self::InvalidSize(value) => {
                write!(f, "field 'size' doesn't start with a bedroom count: {value:?}")
            }
        }
    }
}

impl Error for EncodeError {}

/// Failures of a training run.
#[derive(Debug)]
pub enum TrainError {
    EmptyDataset,
    Cancelled,
    InvalidConfig(String),
    Network(MlErr),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDataset => write!(f, "no valid examples to train on"),
            Self::Cancelled => write!(f, "training was cancelled"),
            Self::InvalidConfig(msg) => write!(f, "invalid trainer config: {msg}"),
            Self::Network(e) => write!(f, "network error: {e}"),
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainError {
    fn from(e: MlErr) -> Self {
        match e {
            MlErr::EmptyDataset => Self::EmptyDataset,
            MlErr::Interrupted { .. } => Self::Cancelled,
            MlErr::InvalidSpec(msg) => Self::InvalidConfig(msg),
            other => Self::Network(other),
        }
    }
}

/// Persistence failures. A failed write leaves the previous value in place.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serialize(serde_json::Error),
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },
    Corrupt {
        key: String,
        msg: String,
    },
    VerifyFailed {
        key: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Serialize(e) => write!(f, "serialization error: {e}"),
            Self::QuotaExceeded {
                key,
                needed,
                available,
            } => write!(
                f,
                "quota exceeded writing '{key}': needed {needed} bytes, {available} available"
            ),
            Self::Corrupt { key, msg } => write!(f, "stored value '{key}' is corrupt: {msg}"),
            Self::VerifyFailed { key } => {
                write!(f, "stored value '{key}' doesn't match what was written")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Failures of a single prediction request.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictError {
    NoModel,
    EncodeError(EncodeError),
    Network(MlErr),
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoModel => write!(f, "no trained model is available"),
            Self::EncodeError(e) => write!(f, "invalid prediction input: {e}"),
            Self::Network(e) => write!(f, "network error: {e}"),
        }
    }
}

impl Error for PredictError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EncodeError(e) => Some(e),
            Self::Network(e) => Some(e),
            Self::NoModel => None,
        }
    }
}

impl From<EncodeError> for PredictError {
    fn from(e: EncodeError) -> Self {
        Self::EncodeError(e)
    }
}

impl From<MlErr> for PredictError {
    fn from(e: MlErr) -> Self {
        Self::Network(e)
    }
}

/// Configuration that can't be read or doesn't make sense, caught before any work.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "cannot read '{}': {source}", path.display()),
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Failures of a whole pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Parse(ParseError),
    Train(TrainError),
    Store(StoreError),
    Busy,
    Aborted(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Train(e) => write!(f, "train error: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Busy => write!(f, "a pipeline run is already in progress"),
            Self::Aborted(msg) => write!(f, "pipeline task aborted: {msg}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Train(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ParseError> for PipelineError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<TrainError> for PipelineError {
    fn from(e: TrainError) -> Self {
        Self::Train(e)
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_map_to_train_errors() {
        assert!(matches!(
            TrainError::from(MlErr::EmptyDataset),
            TrainError::EmptyDataset
        ));
        assert!(matches!(
            TrainError::from(MlErr::Interrupted { iteration: 3 }),
            TrainError::Cancelled
        ));
        assert!(matches!(
            TrainError::from(MlErr::Diverged { iteration: 3 }),
            TrainError::Network(_)
        ));
    }

    #[test]
    fn messages_name_the_field() {
        let e = EncodeError::NotANumber {
            field: "total_sqft",
            value: "abc".into(),
        };
        assert_eq!(e.to_string(), r#"field 'total_sqft' is not a number: "abc""#);
    }
}
