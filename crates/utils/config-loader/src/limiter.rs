use serde::{Deserialize, Serialize};

fn default_limiter_name() -> String {
    "limiter".to_string()
}

/// Settings for a bounded-concurrency task limiter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct LimiterConfig {
    /// Name attached to the limiter's log spans.
    #[serde(default = "default_limiter_name")]
    pub name: String,
    /// Maximum number of tasks running at once.
    ///
    /// Signed on purpose: a negative value in a config file is reported by the
    /// limiter as an invalid capacity instead of failing deserialization.
    pub concurrency: i64,
}

impl LimiterConfig {
    pub fn new(name: impl Into<String>, concurrency: i64) -> Self {
        Self {
            name: name.into(),
            concurrency,
        }
    }
}
