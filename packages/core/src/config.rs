//! Form Engine Configuration
//!
//! Runtime knobs shared by the resolver, the async validation coordinator and
//! the options cache. All fields have defaults, so a partial JSON document is
//! a valid configuration:
//!
//! ```json
//! { "asyncDebounceMs": 500, "formula": { "maxFormulaLength": 512,
//!   "maxNestingDepth": 16, "cacheCapacity": 64 } }
//! ```

use formspec_formula::FormulaConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormEngineConfig {
    /// Debounce window for async validators that do not declare their own
    pub async_debounce_ms: u64,

    /// Lifetime of a cached options response
    pub options_cache_ttl_secs: u64,

    /// Upper bound on fixed-point passes of the cascading reset loop
    pub max_cascade_passes: usize,

    /// Formula engine limits
    pub formula: FormulaConfig,
}

impl Default for FormEngineConfig {
    fn default() -> Self {
        Self {
            async_debounce_ms: 300,
            options_cache_ttl_secs: 300,
            max_cascade_passes: 64,
            formula: FormulaConfig::default(),
        }
    }
}

impl FormEngineConfig {
    pub fn async_debounce(&self) -> Duration {
        Duration::from_millis(self.async_debounce_ms)
    }

    pub fn options_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.options_cache_ttl_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cascade_passes == 0 {
            return Err("max_cascade_passes must be greater than 0".to_string());
        }

        self.formula.validate()
    }
}
