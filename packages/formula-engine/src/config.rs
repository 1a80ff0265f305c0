/// Configuration for the formula engine
use serde::{Deserialize, Serialize};

/// Hard ceiling for `max_nesting_depth`; the parser recurses once per level
const MAX_SUPPORTED_NESTING_DEPTH: usize = 256;

/// Limits and cache sizing for formula compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaConfig {
    /// Maximum formula length in characters
    pub max_formula_length: usize,

    /// Maximum nesting depth of parenthesised / unary / ternary expressions
    pub max_nesting_depth: usize,

    /// Number of compiled formulas kept in the LRU cache
    pub cache_capacity: usize,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            max_formula_length: 1024,
            max_nesting_depth: 32,
            cache_capacity: 256,
        }
    }
}

impl FormulaConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_formula_length == 0 {
            return Err("max_formula_length must be greater than 0".to_string());
        }

        if self.max_nesting_depth == 0 {
            return Err("max_nesting_depth must be greater than 0".to_string());
        }

        if self.max_nesting_depth > MAX_SUPPORTED_NESTING_DEPTH {
            return Err(format!(
                "max_nesting_depth cannot exceed {}",
                MAX_SUPPORTED_NESTING_DEPTH
            ));
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}
