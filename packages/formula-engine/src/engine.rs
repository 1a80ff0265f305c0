//! Formula compilation and evaluation
//!
//! Formulas are parsed once into an [`Expr`] tree and cached by their source
//! text. Evaluation walks the tree against a [`Variables`] bag; a name that is
//! not in the bag is an error, so nothing outside the bag is reachable.

use crate::config::FormulaConfig;
use crate::error::{FormulaError, Result};
use crate::parser::{parse, BinaryOp, Expr, Function, UnaryOp};
use crate::value::{Value, Variables};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Compiles and evaluates formulas with an LRU cache of parsed trees
pub struct FormulaEngine {
    config: FormulaConfig,
    cache: Mutex<LruCache<String, Arc<Expr>>>,
}

impl FormulaEngine {
    pub fn new(config: FormulaConfig) -> Result<Self> {
        config.validate().map_err(FormulaError::InvalidConfig)?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| FormulaError::InvalidConfig("cache_capacity must be > 0".into()))?;
        Ok(Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn config(&self) -> &FormulaConfig {
        &self.config
    }

    /// Parse a formula, reusing a cached tree when the same text was seen before
    pub fn compile(&self, formula: &str) -> Result<Arc<Expr>> {
        let length = formula.chars().count();
        if length > self.config.max_formula_length {
            return Err(FormulaError::FormulaTooLong {
                max: self.config.max_formula_length,
            });
        }

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(expr) = cache.get(formula) {
                return Ok(Arc::clone(expr));
            }
        }

        let expr = Arc::new(parse(formula, self.config.max_nesting_depth)?);
        tracing::trace!(formula, "compiled formula");

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(formula.to_string(), Arc::clone(&expr));
        }
        Ok(expr)
    }

    /// Compile and evaluate in one step
    pub fn evaluate(&self, formula: &str, variables: &Variables) -> Result<Value> {
        let expr = self.compile(formula)?;
        evaluate_expr(&expr, variables)
    }

    /// Number of compiled formulas currently cached
    pub fn cached_formulas(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        let config = FormulaConfig::default();
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

/// Evaluate an already-parsed expression
pub fn evaluate_expr(expr: &Expr, variables: &Variables) -> Result<Value> {
    let value = eval(expr, variables)?;
    if let Value::Number(n) = value {
        if !n.is_finite() {
            return Err(FormulaError::NonFiniteResult);
        }
    }
    Ok(value)
}

fn eval(expr: &Expr, vars: &Variables) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Variable(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::Unary(op, inner) => {
            let v = eval(inner, vars)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-v.as_number()),
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
            })
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let l = eval(lhs, vars)?;
            if !l.is_truthy() {
                return Ok(l);
            }
            eval(rhs, vars)
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let l = eval(lhs, vars)?;
            if l.is_truthy() {
                return Ok(l);
            }
            eval(rhs, vars)
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, vars)?;
            let r = eval(rhs, vars)?;
            binary(*op, l, r)
        }
        Expr::Conditional(cond, then, otherwise) => {
            if eval(cond, vars)?.is_truthy() {
                eval(then, vars)
            } else {
                eval(otherwise, vars)
            }
        }
        Expr::Call(function, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, vars))
                .collect::<Result<Vec<_>>>()?;
            call(*function, &values)
        }
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    let value = match op {
        BinaryOp::Add => {
            if l.is_text() || r.is_text() {
                Value::Text(format!("{}{}", l, r))
            } else {
                Value::Number(l.as_number() + r.as_number())
            }
        }
        BinaryOp::Sub => Value::Number(l.as_number() - r.as_number()),
        BinaryOp::Mul => Value::Number(l.as_number() * r.as_number()),
        BinaryOp::Div => {
            let divisor = r.as_number();
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Value::Number(l.as_number() / divisor)
        }
        BinaryOp::Rem => {
            let divisor = r.as_number();
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Value::Number(l.as_number() % divisor)
        }
        BinaryOp::Eq => Value::Bool(loose_eq(&l, &r)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(&l, &r)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (&l, &r) {
                (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
                _ => l.as_number().partial_cmp(&r.as_number()),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit in eval"),
    };
    Ok(value)
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => l.as_number() == r.as_number(),
    }
}

fn call(function: Function, args: &[Value]) -> Result<Value> {
    let arity = |expected: &str| FormulaError::ArityMismatch {
        name: function.name().to_string(),
        expected: expected.to_string(),
        actual: args.len(),
    };

    let result = match function {
        Function::Min | Function::Max => {
            if args.is_empty() {
                return Err(arity("at least 1"));
            }
            let numbers = args.iter().map(Value::as_number);
            if function == Function::Min {
                numbers.fold(f64::INFINITY, f64::min)
            } else {
                numbers.fold(f64::NEG_INFINITY, f64::max)
            }
        }
        Function::Abs | Function::Floor | Function::Ceil => {
            let [arg] = args else {
                return Err(arity("1"));
            };
            let n = arg.as_number();
            match function {
                Function::Abs => n.abs(),
                Function::Floor => n.floor(),
                _ => n.ceil(),
            }
        }
        Function::Round => match args {
            [arg] => arg.as_number().round(),
            [arg, places] => {
                let factor = 10f64.powi(places.as_number() as i32);
                (arg.as_number() * factor).round() / factor
            }
            _ => return Err(arity("1 or 2")),
        },
    };
    Ok(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_arithmetic_over_variables() {
        let engine = FormulaEngine::default();
        let bag = vars(&[("price", 10.0.into()), ("quantity", 5.0.into())]);
        assert_eq!(
            engine.evaluate("price * quantity", &bag).unwrap(),
            Value::Number(50.0)
        );
        assert_eq!(
            engine.evaluate("(price + 2) * quantity - 1", &bag).unwrap(),
            Value::Number(59.0)
        );
    }

    #[test]
    fn test_string_concatenation() {
        let engine = FormulaEngine::default();
        let bag = vars(&[("first", "Ada".into()), ("last", "Lovelace".into())]);
        assert_eq!(
            engine.evaluate("first + ' ' + last", &bag).unwrap(),
            Value::Text("Ada Lovelace".into())
        );
        assert_eq!(
            engine.evaluate("'Total: ' + 3 * 2", &bag).unwrap(),
            Value::Text("Total: 6".into())
        );
    }

    #[test]
    fn test_comparisons_and_ternary() {
        let engine = FormulaEngine::default();
        let bag = vars(&[("age", 20.0.into())]);
        assert_eq!(
            engine.evaluate("age >= 18 ? 'adult' : 'minor'", &bag).unwrap(),
            Value::Text("adult".into())
        );
        assert_eq!(
            engine.evaluate("age == '20'", &bag).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            engine.evaluate("!(age < 10) && age != 21", &bag).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_functions() {
        let engine = FormulaEngine::default();
        let bag = Variables::new();
        assert_eq!(engine.evaluate("max(1, 7, 3)", &bag).unwrap(), Value::Number(7.0));
        assert_eq!(engine.evaluate("min(4, -2)", &bag).unwrap(), Value::Number(-2.0));
        assert_eq!(engine.evaluate("round(2.346, 2)", &bag).unwrap(), Value::Number(2.35));
        assert_eq!(engine.evaluate("abs(-3) + floor(1.9) + ceil(0.1)", &bag).unwrap(), Value::Number(5.0));
        assert!(matches!(
            engine.evaluate("abs(1, 2)", &bag),
            Err(FormulaError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let engine = FormulaEngine::default();
        let err = engine.evaluate("price * quantity", &vars(&[("price", 1.0.into())]));
        assert_eq!(err.unwrap_err(), FormulaError::UnknownVariable("quantity".into()));
    }

    #[test]
    fn test_division_by_zero() {
        let engine = FormulaEngine::default();
        let bag = vars(&[("a", 1.0.into()), ("b", 0.0.into())]);
        assert_eq!(engine.evaluate("a / b", &bag).unwrap_err(), FormulaError::DivisionByZero);
        assert_eq!(engine.evaluate("a % b", &bag).unwrap_err(), FormulaError::DivisionByZero);
    }

    #[test]
    fn test_formula_length_limit() {
        let engine = FormulaEngine::new(FormulaConfig {
            max_formula_length: 5,
            ..FormulaConfig::default()
        })
        .unwrap();
        assert_eq!(
            engine.evaluate("1 + 2 + 3", &Variables::new()).unwrap_err(),
            FormulaError::FormulaTooLong { max: 5 }
        );
    }

    #[test]
    fn test_compiled_formulas_are_cached() {
        let engine = FormulaEngine::new(FormulaConfig {
            cache_capacity: 2,
            ..FormulaConfig::default()
        })
        .unwrap();
        let bag = vars(&[("a", 1.0.into())]);
        engine.evaluate("a + 1", &bag).unwrap();
        engine.evaluate("a + 1", &bag).unwrap();
        assert_eq!(engine.cached_formulas(), 1);
        engine.evaluate("a + 2", &bag).unwrap();
        engine.evaluate("a + 3", &bag).unwrap();
        assert_eq!(engine.cached_formulas(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = FormulaEngine::new(FormulaConfig {
            cache_capacity: 0,
            ..FormulaConfig::default()
        });
        assert!(matches!(result, Err(FormulaError::InvalidConfig(_))));
    }
}
