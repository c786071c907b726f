//! Compiler configuration
//!
//! Limits applied while compiling a query document. All fields are optional
//! in the JSON form; missing fields take the defaults below.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::observability::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum nesting of `$and`/`$or`/`$nor`/`$not` (default 16)
    #[serde(default = "default_max_filter_depth")]
    pub max_filter_depth: usize,

    /// Maximum relationship hops in a join path (default 3)
    #[serde(default = "default_max_join_depth")]
    pub max_join_depth: usize,

    /// Upper bound accepted by `limit()` (default: unbounded)
    #[serde(default)]
    pub max_limit: Option<u64>,

    /// Check operand types against field value kinds (default true)
    #[serde(default = "default_strict_operands")]
    pub strict_operands: bool,

    /// Minimum log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_filter_depth() -> usize {
    16
}
fn default_max_join_depth() -> usize {
    3
}
fn default_strict_operands() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_filter_depth: default_max_filter_depth(),
            max_join_depth: default_max_join_depth(),
            max_limit: None,
            strict_operands: default_strict_operands(),
            log_level: default_log_level(),
        }
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_filter_depth == 0 {
            return Err("max_filter_depth must be > 0".into());
        }
        if self.max_join_depth == 0 {
            return Err("max_join_depth must be > 0".into());
        }
        if self.max_limit == Some(0) {
            return Err("max_limit must be > 0 when set".into());
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, String> {
        Severity::from_str(&self.log_level)
    }
}
