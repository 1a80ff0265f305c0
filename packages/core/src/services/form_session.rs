//! Form Session - Rendering Boundary
//!
//! A [`FormSession`] is one live instance of a form. It owns the values and
//! touched flags, accepts `(field, value)` / `(field, touched)` mutations and
//! exposes a read-only [`FormSnapshot`] after each one.
//!
//! # Mutation pipeline
//!
//! `set_value` applies the field's mask, stores the value, forwards it to the
//! async validation coordinator, then runs the resolver (cascading resets,
//! computed fields, visibility, errors) synchronously before returning.
//! Remote options are refreshed for dependents of the changed field, of every
//! reset field and of every computed field whose value moved.
//!
//! # Remote options
//!
//! Dependents with an `optionsEndpoint` are fetched fire-and-forget. Each
//! fetch is stamped with a per-field sequence number and the request it was
//! resolved to (endpoint, method and parent values); a result is committed
//! only when both are still current, so a slow response for an old parent
//! value is discarded. Results travel back
//! over an mpsc channel and are applied by [`FormSession::apply_fetched`] or
//! [`FormSession::settle`].

use crate::config::FormEngineConfig;
use crate::mask;
use crate::models::{FieldErrors, FormSchema, FormValues, OptionItem, Touched};
use crate::resolver::{DependencyResolver, Evaluation, ResolvedOptions};
use crate::services::async_validation::{
    AsyncValidationCoordinator, AsyncValidationEvent, AsyncValidationState,
};
use crate::services::error::FormServiceError;
use crate::services::options_provider::{CachedOptionsProvider, OptionsProvider, OptionsRequest};
use crate::services::remote_validator::RemoteValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything presentation code needs after a mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub visible_fields: Vec<String>,
    pub errors: FieldErrors,
    pub async_validation_state: HashMap<String, AsyncValidationState>,
    pub async_errors: HashMap<String, String>,
    pub resolved_values: FormValues,
    pub touched: Touched,
}

impl FormSnapshot {
    /// A field is valid only when neither error set has an entry for it
    pub fn is_field_valid(&self, name: &str) -> bool {
        !self.errors.contains_key(name) && !self.async_errors.contains_key(name)
    }
}

struct FetchOutcome {
    field: String,
    sequence: u64,
    request: OptionsRequest,
    /// `None` when the provider failed
    options: Option<Vec<OptionItem>>,
}

pub struct FormSession {
    id: Uuid,
    config: FormEngineConfig,
    schema: Arc<FormSchema>,
    resolver: DependencyResolver,
    values: FormValues,
    touched: Touched,
    evaluation: Evaluation,

    /// Committed remote option lists by field
    remote_options: HashMap<String, Vec<OptionItem>>,
    options_provider: Option<Arc<dyn OptionsProvider>>,
    coordinator: Option<AsyncValidationCoordinator>,

    fetch_sequences: HashMap<String, u64>,
    fetch_tasks: HashMap<String, JoinHandle<()>>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl FormSession {
    /// Session with default configuration and no remote collaborators
    pub fn new(schema: FormSchema) -> Self {
        let config = FormEngineConfig::default();
        let resolver = DependencyResolver::new(&schema);
        Self::from_parts(schema, resolver, config)
    }

    pub fn with_config(schema: FormSchema, config: FormEngineConfig) -> Result<Self, FormServiceError> {
        let resolver = DependencyResolver::with_config(&schema, &config)?;
        Ok(Self::from_parts(schema, resolver, config))
    }

    fn from_parts(schema: FormSchema, resolver: DependencyResolver, config: FormEngineConfig) -> Self {
        let mut values = schema.initial_values();
        let evaluation = resolver.evaluate(&mut values, None);
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        let session = Self {
            id: Uuid::new_v4(),
            config,
            touched: schema.initial_touched(),
            schema: Arc::new(schema),
            resolver,
            values,
            evaluation,
            remote_options: HashMap::new(),
            options_provider: None,
            coordinator: None,
            fetch_sequences: HashMap::new(),
            fetch_tasks: HashMap::new(),
            fetch_tx,
            fetch_rx,
        };
        tracing::debug!(session = %session.id, title = %session.schema.title, "Form session created");
        session
    }

    /// Fetch remote options through `provider`, cached for the configured TTL
    pub fn with_options_provider(mut self, provider: Arc<dyn OptionsProvider>) -> Self {
        let cached = CachedOptionsProvider::with_ttl(provider, self.config.options_cache_ttl());
        self.options_provider = Some(Arc::new(cached));
        self
    }

    pub fn with_remote_validator(mut self, validator: Arc<dyn RemoteValidator>) -> Self {
        self.coordinator = Some(AsyncValidationCoordinator::with_config(validator, &self.config));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn touched(&self) -> &Touched {
        &self.touched
    }

    /// Result of the latest evaluation pass
    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    /// Subscribe to async validation transitions, if a validator is attached
    pub fn subscribe_async(&self) -> Option<broadcast::Receiver<AsyncValidationEvent>> {
        self.coordinator.as_ref().map(AsyncValidationCoordinator::subscribe)
    }

    /// Store a new value for `name` and re-evaluate the form
    ///
    /// Must be called within a Tokio runtime when remote collaborators are
    /// attached.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<&Evaluation, FormServiceError> {
        let field = self
            .resolver
            .field(name)
            .ok_or_else(|| FormServiceError::unknown_field(name))?;

        let value = match (&field.mask, value) {
            (Some(spec), Value::String(raw)) => Value::String(mask::apply_mask(&raw, Some(spec))),
            (_, value) => value,
        };
        self.values.insert(name.to_string(), value.clone());

        if let Some(coordinator) = &self.coordinator {
            coordinator.validate_async(field, value);
        }

        self.evaluation = self.resolver.evaluate(&mut self.values, Some(name));

        let mut changed = vec![name.to_string()];
        changed.extend(self.evaluation.resets.iter().cloned());
        changed.extend(self.evaluation.recomputed.iter().cloned());
        self.refresh_dependent_options(&changed);

        Ok(&self.evaluation)
    }

    pub fn set_touched(&mut self, name: &str, touched: bool) -> Result<(), FormServiceError> {
        if self.resolver.field(name).is_none() {
            return Err(FormServiceError::unknown_field(name));
        }
        self.touched.insert(name.to_string(), touched);
        Ok(())
    }

    /// Option list currently applicable to `name`
    ///
    /// Remote fields report their last committed fetch, empty until one lands.
    pub fn options_for(&self, name: &str) -> Vec<OptionItem> {
        match self.resolver.resolve_options(name, &self.values) {
            ResolvedOptions::Local(options) => options,
            ResolvedOptions::Remote(_) => self.remote_options.get(name).cloned().unwrap_or_default(),
            ResolvedOptions::NotApplicable | ResolvedOptions::Unavailable => Vec::new(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.resolver.is_enabled(name, &self.values)
    }

    /// Start fetches for every remote-option field that can resolve now
    pub fn load_remote_options(&mut self) {
        let names: Vec<String> = self
            .resolver
            .fields()
            .iter()
            .filter(|f| f.options_endpoint.is_some())
            .map(|f| f.name.clone())
            .collect();
        self.refresh_options(names);
    }

    fn refresh_dependent_options(&mut self, changed: &[String]) {
        let mut targets: Vec<String> = Vec::new();
        for name in changed {
            for child in self.resolver.dependents_of(name) {
                if !targets.contains(child) {
                    targets.push(child.clone());
                }
            }
        }
        self.refresh_options(targets);
    }

    fn refresh_options(&mut self, names: Vec<String>) {
        for name in names {
            match self.resolver.resolve_options(&name, &self.values) {
                ResolvedOptions::Remote(request) => self.spawn_fetch(name, request),
                _ => {
                    self.cancel_fetch(&name);
                    self.remote_options.remove(&name);
                }
            }
        }
    }

    fn next_sequence(&mut self, name: &str) -> u64 {
        let counter = self.fetch_sequences.entry(name.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn spawn_fetch(&mut self, name: String, request: OptionsRequest) {
        let Some(provider) = self.options_provider.clone() else {
            return;
        };
        let sequence = self.next_sequence(&name);
        if let Some(previous) = self.fetch_tasks.remove(&name) {
            previous.abort();
        }

        let tx = self.fetch_tx.clone();
        let field = name.clone();
        let task = tokio::spawn(async move {
            let options = match provider.fetch_options(&request).await {
                Ok(options) => Some(options),
                Err(e) => {
                    tracing::warn!(
                        field = %field,
                        endpoint = %request.endpoint,
                        "Options fetch failed: {}",
                        e
                    );
                    None
                }
            };
            let _ = tx.send(FetchOutcome {
                field,
                sequence,
                request,
                options,
            });
        });
        self.fetch_tasks.insert(name, task);
    }

    fn cancel_fetch(&mut self, name: &str) {
        if let Some(task) = self.fetch_tasks.remove(name) {
            task.abort();
            self.next_sequence(name);
        }
    }

    /// Whether any options fetch is still outstanding
    pub fn has_pending_fetches(&self) -> bool {
        !self.fetch_tasks.is_empty()
    }

    /// Commit every fetch result that has already arrived
    ///
    /// Returns the number of results committed.
    pub fn apply_fetched(&mut self) -> usize {
        let mut committed = 0;
        while let Ok(outcome) = self.fetch_rx.try_recv() {
            if self.commit_fetch(outcome) {
                committed += 1;
            }
        }
        committed
    }

    /// Wait for every outstanding fetch and commit the current ones
    pub async fn settle(&mut self) -> usize {
        let mut committed = self.apply_fetched();
        while !self.fetch_tasks.is_empty() {
            if self.fetch_tasks.values().all(JoinHandle::is_finished) {
                // finished without reporting back
                committed += self.apply_fetched();
                for (name, _) in self.fetch_tasks.drain() {
                    tracing::warn!(field = %name, "Options fetch ended without a result");
                }
                break;
            }
            match self.fetch_rx.recv().await {
                Some(outcome) => {
                    if self.commit_fetch(outcome) {
                        committed += 1;
                    }
                }
                None => break,
            }
        }
        committed
    }

    fn commit_fetch(&mut self, outcome: FetchOutcome) -> bool {
        let FetchOutcome {
            field,
            sequence,
            request,
            options,
        } = outcome;

        if self.fetch_sequences.get(&field) != Some(&sequence) {
            tracing::debug!(field = %field, sequence, "Discarding stale options fetch");
            return false;
        }
        self.fetch_tasks.remove(&field);

        let still_current = matches!(
            self.resolver.resolve_options(&field, &self.values),
            ResolvedOptions::Remote(ref current) if *current == request
        );
        if !still_current {
            tracing::debug!(field = %field, endpoint = %request.endpoint, "Discarding stale options fetch");
            return false;
        }

        let Some(options) = options else {
            self.remote_options.insert(field, Vec::new());
            return true;
        };

        let reset = self
            .resolver
            .retain_valid_value(&field, &options, &mut self.values);
        self.remote_options.insert(field.clone(), options);

        if reset {
            tracing::debug!(field = %field, "Cascading reset");
            let mut evaluation = self.resolver.evaluate(&mut self.values, Some(&field));
            evaluation.resets.insert(0, field.clone());
            let mut changed = evaluation.resets.clone();
            changed.extend(evaluation.recomputed.iter().cloned());
            self.evaluation = evaluation;
            self.refresh_dependent_options(&changed);
        } else {
            self.evaluation = self.resolver.evaluate(&mut self.values, None);
        }
        true
    }

    /// Read-only view for presentation code
    pub fn snapshot(&self) -> FormSnapshot {
        let (async_validation_state, async_errors) = match &self.coordinator {
            Some(coordinator) => (coordinator.states(), coordinator.errors()),
            None => (HashMap::new(), HashMap::new()),
        };
        FormSnapshot {
            visible_fields: self.evaluation.visible_fields.clone(),
            errors: self.evaluation.errors.clone(),
            async_validation_state,
            async_errors,
            resolved_values: self.values.clone(),
            touched: self.touched.clone(),
        }
    }

    /// No sync errors, no async errors on visible fields, nothing validating
    pub fn is_valid(&self) -> bool {
        if !self.evaluation.errors.is_empty() {
            return false;
        }
        match &self.coordinator {
            Some(coordinator) => {
                !coordinator.is_validating()
                    && self
                        .evaluation
                        .visible_fields
                        .iter()
                        .all(|name| coordinator.error(name).is_none())
            }
            None => true,
        }
    }

    /// Touch every field, re-evaluate and report overall validity
    pub fn submit(&mut self) -> bool {
        for flag in self.touched.values_mut() {
            *flag = true;
        }
        self.evaluation = self.resolver.evaluate(&mut self.values, None);
        let valid = self.is_valid();
        tracing::debug!(session = %self.id, valid, "Form submitted");
        valid
    }

    /// Back to initial values; pending fetches and async checks are dropped
    pub fn reset(&mut self) {
        let pending: Vec<String> = self.fetch_tasks.keys().cloned().collect();
        for name in pending {
            self.cancel_fetch(&name);
        }
        while self.fetch_rx.try_recv().is_ok() {}
        self.remote_options.clear();

        if let Some(coordinator) = &self.coordinator {
            coordinator.reset();
        }

        self.values = self.schema.initial_values();
        self.touched = self.schema.initial_touched();
        self.evaluation = self.resolver.evaluate(&mut self.values, None);
    }
}

impl Drop for FormSession {
    fn drop(&mut self) {
        for (_, task) in self.fetch_tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "form_session_test.rs"]
mod form_session_test;
