use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct LoggerConfig {
    pub max_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_level: "INFO".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggerConfig {
    pub fn new(max_level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            max_level: max_level.into(),
            format,
        }
    }
}

/// Output encoding of the stdout layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
