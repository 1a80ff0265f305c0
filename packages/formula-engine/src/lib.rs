/// FormSpec Formula Engine - Restricted Expression Evaluation
///
/// This crate evaluates computed-field formulas over a fixed bag of named
/// variables. Formulas are parsed into a small AST; there is no path from a
/// formula to the host environment.
///
/// # Features
///
/// - **Arithmetic and comparison**: `+ - * / %`, `== != < <= > >=`, `&& || !`, ternary
/// - **String concatenation**: `+` concatenates when either operand is text
/// - **Pure functions only**: `min`, `max`, `abs`, `round`, `floor`, `ceil`
/// - **Compiled cache**: LRU cache of parsed formulas keyed by source text
///
/// # Example
///
/// ```
/// use formspec_formula::{FormulaEngine, Value, Variables};
///
/// let engine = FormulaEngine::default();
/// let mut vars = Variables::new();
/// vars.insert("price".to_string(), Value::Number(10.0));
/// vars.insert("quantity".to_string(), Value::Number(5.0));
///
/// let total = engine.evaluate("price * quantity", &vars).unwrap();
/// assert_eq!(total, Value::Number(50.0));
/// ```
pub mod config;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod value;

// Re-export main types
pub use config::FormulaConfig;
pub use engine::{evaluate_expr, FormulaEngine};
pub use error::{FormulaError, Result};
pub use parser::{parse, Expr};
pub use value::{Value, Variables};
