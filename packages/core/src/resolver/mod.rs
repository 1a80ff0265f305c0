//! Dependency Graph Resolver
//!
//! Recomputes derived form state after every value change. The resolver is a
//! plain synchronous function of `(schema, values)`: nothing is tracked
//! implicitly, callers invoke [`DependencyResolver::evaluate`] after each
//! mutation and replace their view of visibility and errors wholesale.
//!
//! # Evaluation order
//!
//! 1. **Cascading resets**: dependents of the changed field whose value is no
//!    longer among their options are reset, repeated until nothing changes
//!    (bounded by `max_cascade_passes`).
//! 2. **Computed fields**: formulas run in dependency order and write display
//!    strings back into the values. A computed value that changed cascades to
//!    its own dependents, and the two steps repeat until neither changes
//!    anything.
//! 3. **Visibility**: `visibleWhen` trees are evaluated; unknown field
//!    references make a condition false.
//! 4. **Errors**: synchronous rules run for visible fields only.

mod computed;
mod rules;

pub use computed::{evaluation_order, format_result, MAX_DECIMAL_PLACES};
pub use rules::RuleContext;

use crate::config::FormEngineConfig;
use crate::models::{
    is_empty_value, loose_eq, value_key, Field, FieldErrors, FieldType, FormSchema, FormValues,
    OptionItem, OptionsEndpoint,
};
use crate::services::error::FormServiceError;
use crate::services::options_provider::{endpoint_params, resolve_endpoint, OptionsRequest};
use formspec_formula::FormulaEngine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Option set of a field under the current values
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOptions {
    /// The field has no option source
    NotApplicable,
    /// Options known locally; empty when the parent value has no entry
    Local(Vec<OptionItem>),
    /// Options must be fetched from the options provider
    Remote(OptionsRequest),
    /// A dependency has no value: no options, field disabled
    Unavailable,
}

impl ResolvedOptions {
    pub fn options(&self) -> &[OptionItem] {
        match self {
            ResolvedOptions::Local(options) => options,
            _ => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResolvedOptions::Unavailable)
    }
}

/// Derived state of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub visible_fields: Vec<String>,
    pub errors: FieldErrors,
    /// Fields cleared by cascading resets, in reset order
    pub resets: Vec<String>,
    /// Computed fields whose value changed
    pub recomputed: Vec<String>,
}

/// Runtime view of a schema's field graph
pub struct DependencyResolver {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    /// parent → fields whose options or enablement depend on it
    dependents: HashMap<String, Vec<String>>,
    computed_order: Vec<String>,
    patterns: HashMap<String, Regex>,
    engine: Arc<FormulaEngine>,
    max_cascade_passes: usize,
}

impl DependencyResolver {
    /// Resolver with default configuration
    pub fn new(schema: &FormSchema) -> Self {
        let config = FormEngineConfig::default();
        Self::with_engine(schema, Arc::new(FormulaEngine::default()), &config)
    }

    pub fn with_config(schema: &FormSchema, config: &FormEngineConfig) -> Result<Self, FormServiceError> {
        config.validate().map_err(FormServiceError::invalid_config)?;
        let engine = FormulaEngine::new(config.formula.clone())?;
        Ok(Self::with_engine(schema, Arc::new(engine), config))
    }

    /// Share one formula engine (and its compiled cache) across resolvers
    pub fn with_engine(schema: &FormSchema, engine: Arc<FormulaEngine>, config: &FormEngineConfig) -> Self {
        let fields: Vec<Field> = schema.flattened_fields().into_iter().cloned().collect();

        let mut index = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            index.entry(field.name.clone()).or_insert(i);
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for field in &fields {
            let mut parents: Vec<String> = field
                .depends_on_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            if let Some(endpoint) = &field.options_endpoint {
                parents.extend(endpoint_params(endpoint.url()));
            }
            parents.dedup();
            for parent in parents {
                let children = dependents.entry(parent).or_default();
                if !children.contains(&field.name) {
                    children.push(field.name.clone());
                }
            }
        }

        Self {
            computed_order: computed::evaluation_order(&fields),
            patterns: rules::compile_patterns(&fields),
            fields,
            index,
            dependents,
            engine,
            max_cascade_passes: config.max_cascade_passes.max(1),
        }
    }

    /// Flattened fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|i| &self.fields[*i])
    }

    /// Fields that must be re-checked when `name` changes
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn engine(&self) -> &Arc<FormulaEngine> {
        &self.engine
    }

    fn lookup<'v>(&self, values: &'v FormValues, name: &str) -> Option<&'v Value> {
        static NULL: Value = Value::Null;
        if self.index.contains_key(name) {
            Some(values.get(name).unwrap_or(&NULL))
        } else {
            None
        }
    }

    /// Whether `name` is shown under `values`; unknown names are hidden
    pub fn is_visible(&self, name: &str, values: &FormValues) -> bool {
        match self.field(name) {
            Some(field) => match &field.visible_when {
                Some(condition) => condition.evaluate(&|n: &str| self.lookup(values, n)),
                None => true,
            },
            None => false,
        }
    }

    pub fn visible_fields(&self, values: &FormValues) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.name.is_empty() && self.is_visible(&f.name, values))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Applicable option set of `name` under `values`
    pub fn resolve_options(&self, name: &str, values: &FormValues) -> ResolvedOptions {
        let Some(field) = self.field(name) else {
            return ResolvedOptions::NotApplicable;
        };

        let parents = field.depends_on_names();
        let parent_missing = parents.iter().any(|parent| {
            self.lookup(values, parent)
                .and_then(value_key)
                .is_none()
        });

        if let Some(map) = &field.options_map {
            // keyed by the nearest (last listed) parent
            let Some(parent) = parents.last() else {
                return ResolvedOptions::Unavailable;
            };
            if parent_missing {
                return ResolvedOptions::Unavailable;
            }
            let key = self.lookup(values, parent).and_then(value_key);
            return ResolvedOptions::Local(
                key.and_then(|k| map.get(&k).cloned()).unwrap_or_default(),
            );
        }

        if parent_missing {
            return ResolvedOptions::Unavailable;
        }

        if let Some(endpoint) = &field.options_endpoint {
            let Some((url, mut params)) = resolve_endpoint(endpoint.url(), values) else {
                return ResolvedOptions::Unavailable;
            };
            for parent in &parents {
                if let Some(value) = values.get(*parent) {
                    params.entry(parent.to_string()).or_insert_with(|| value.clone());
                }
            }
            let method = match endpoint {
                OptionsEndpoint::Config(config) => config.method.as_deref(),
                OptionsEndpoint::Url(_) => None,
            };
            return ResolvedOptions::Remote(OptionsRequest {
                endpoint: url,
                params,
                method: method.unwrap_or("GET").to_string(),
            });
        }

        match &field.options {
            Some(options) => ResolvedOptions::Local(options.clone()),
            None => ResolvedOptions::NotApplicable,
        }
    }

    /// Whether `name` accepts input under `values`
    pub fn is_enabled(&self, name: &str, values: &FormValues) -> bool {
        match self.field(name) {
            Some(field) => {
                field.disabled != Some(true)
                    && !self.resolve_options(name, values).is_unavailable()
            }
            None => false,
        }
    }

    /// Drop a value that is not among `options`
    ///
    /// Multiselect values keep their still-valid entries. Returns true when
    /// the stored value changed.
    pub fn retain_valid_value(&self, name: &str, options: &[OptionItem], values: &mut FormValues) -> bool {
        let Some(field) = self.field(name) else {
            return false;
        };
        let Some(current) = values.get(name) else {
            return false;
        };
        if is_empty_value(current) {
            return false;
        }

        let is_option = |v: &Value| options.iter().any(|o| loose_eq(&o.value, v));
        let next = match current {
            Value::Array(items) if field.is_kind(FieldType::Multiselect) => {
                let kept: Vec<Value> = items.iter().filter(|v| is_option(v)).cloned().collect();
                if kept.len() == items.len() {
                    return false;
                }
                Value::Array(kept)
            }
            single => {
                if is_option(single) {
                    return false;
                }
                empty_value(field)
            }
        };

        values.insert(name.to_string(), next);
        true
    }

    /// Reset dependents of `changed` whose value is no longer valid, to a
    /// fixed point
    ///
    /// Remote-option dependents are left alone until their fetch commits.
    pub fn cascade_resets(&self, changed: &str, values: &mut FormValues) -> Vec<String> {
        let mut resets = Vec::new();
        let mut frontier = vec![changed.to_string()];

        for _ in 0..self.max_cascade_passes {
            let mut next = Vec::new();
            for parent in &frontier {
                for child in self.dependents_of(parent) {
                    let reset = match self.resolve_options(child, values) {
                        ResolvedOptions::Local(options) => {
                            self.retain_valid_value(child, &options, values)
                        }
                        ResolvedOptions::Unavailable => self.clear_value(child, values),
                        ResolvedOptions::Remote(_) | ResolvedOptions::NotApplicable => false,
                    };
                    if reset {
                        tracing::debug!(field = %child, parent = %parent, "Cascading reset");
                        resets.push(child.clone());
                        next.push(child.clone());
                    }
                }
            }
            if next.is_empty() {
                return resets;
            }
            frontier = next;
        }

        tracing::warn!(
            field = %changed,
            passes = self.max_cascade_passes,
            "Cascading reset did not settle"
        );
        resets
    }

    fn clear_value(&self, name: &str, values: &mut FormValues) -> bool {
        let Some(field) = self.field(name) else {
            return false;
        };
        match values.get(name) {
            Some(current) if !is_empty_value(current) => {
                values.insert(name.to_string(), empty_value(field));
                true
            }
            _ => false,
        }
    }

    /// Evaluate every computed field, writing display strings into `values`
    pub fn apply_computed(&self, values: &mut FormValues) -> Vec<String> {
        computed::apply_computed(
            &self.engine,
            &self.computed_order,
            &self.index,
            &self.fields,
            values,
        )
    }

    /// Recompute formulas and cascade from every computed value that moved
    ///
    /// Repeats while a cascade resets something a formula reads. Returns the
    /// computed fields whose value changed, in first-change order.
    fn settle_computed(&self, values: &mut FormValues, resets: &mut Vec<String>) -> Vec<String> {
        let mut recomputed: Vec<String> = Vec::new();
        let mut pending = self.apply_computed(values);

        for _ in 0..self.max_cascade_passes {
            if pending.is_empty() {
                return recomputed;
            }
            let mut cascaded = Vec::new();
            for name in &pending {
                if !recomputed.contains(name) {
                    recomputed.push(name.clone());
                }
                cascaded.extend(self.cascade_resets(name, values));
            }
            if cascaded.is_empty() {
                return recomputed;
            }
            resets.extend(cascaded);
            pending = self.apply_computed(values);
        }

        if !pending.is_empty() {
            tracing::warn!(
                passes = self.max_cascade_passes,
                "Computed fields did not settle"
            );
            for name in pending {
                if !recomputed.contains(&name) {
                    recomputed.push(name);
                }
            }
        }
        recomputed
    }

    /// Synchronous error per visible field
    pub fn errors(&self, values: &FormValues) -> FieldErrors {
        let ctx = RuleContext {
            values,
            fields: &self.fields,
            index: &self.index,
            patterns: &self.patterns,
        };
        self.fields
            .iter()
            .filter(|f| !f.name.is_empty() && self.is_visible(&f.name, values))
            .filter_map(|f| rules::field_error(f, &ctx).map(|message| (f.name.clone(), message)))
            .collect()
    }

    /// Full pass after `changed` (or an initial pass when `None`)
    pub fn evaluate(&self, values: &mut FormValues, changed: Option<&str>) -> Evaluation {
        let mut resets = match changed {
            Some(name) => self.cascade_resets(name, values),
            None => Vec::new(),
        };
        let recomputed = self.settle_computed(values, &mut resets);

        Evaluation {
            visible_fields: self.visible_fields(values),
            errors: self.errors(values),
            resets,
            recomputed,
        }
    }
}

/// Value a field holds after being reset
pub fn empty_value(field: &Field) -> Value {
    match field.kind() {
        Some(FieldType::Multiselect) | Some(FieldType::Array) => Value::Array(Vec::new()),
        Some(FieldType::Checkbox) => Value::Bool(false),
        _ => Value::String(String::new()),
    }
}
