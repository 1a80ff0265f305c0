//! Async Validation Coordinator
//!
//! Debounced remote validation with a per-field state machine:
//!
//! ```text
//! idle ──validate_async──▶ validating ──debounce + remote check──▶ valid | invalid
//!                             ▲                                        │
//!                             └──────────── validate_async ◀───────────┘
//! ```
//!
//! # Scheduling
//!
//! - Each call cancels the field's pending timer and bumps the field's
//!   sequence number, then flips the state to `validating` immediately.
//! - The spawned timer sleeps for the debounce window, performs the remote
//!   check, and commits only if its sequence number is still current, so a
//!   superseded request can never settle the field.
//! - Transport failures settle as `invalid` with a fixed message; a field is
//!   never left in `validating` once its latest request completes.
//! - `reset()` and `Drop` abort every pending timer.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Transitions are broadcast as [`AsyncValidationEvent`]s.

use crate::config::FormEngineConfig;
use crate::models::{Field, ValidWhen};
use crate::services::remote_validator::{RemoteValidationRequest, RemoteValidator, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Message stored when the remote check could not be performed
pub const REQUEST_FAILED_MESSAGE: &str = "Validation request failed";

/// Message stored when neither the remote side nor the schema supplies one
pub const DEFAULT_INVALID_MESSAGE: &str = "Validation failed";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Per-field async validation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AsyncValidationState {
    #[default]
    Idle,
    Validating,
    Valid,
    Invalid,
}

/// A state transition of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncValidationEvent {
    pub field: String,
    pub state: AsyncValidationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Default)]
struct CoordinatorState {
    states: HashMap<String, AsyncValidationState>,
    errors: HashMap<String, String>,
    timers: HashMap<String, JoinHandle<()>>,
    sequences: HashMap<String, u64>,
}

fn lock(state: &Mutex<CoordinatorState>) -> MutexGuard<'_, CoordinatorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns every field's async validation state
pub struct AsyncValidationCoordinator {
    validator: Arc<dyn RemoteValidator>,
    default_debounce: Duration,
    state: Arc<Mutex<CoordinatorState>>,
    events: broadcast::Sender<AsyncValidationEvent>,
}

impl AsyncValidationCoordinator {
    /// Coordinator with the default 300ms debounce
    pub fn new(validator: Arc<dyn RemoteValidator>) -> Self {
        Self::with_config(validator, &FormEngineConfig::default())
    }

    pub fn with_config(validator: Arc<dyn RemoteValidator>, config: &FormEngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            validator,
            default_debounce: config.async_debounce(),
            state: Arc::new(Mutex::new(CoordinatorState::default())),
            events,
        }
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<AsyncValidationEvent> {
        self.events.subscribe()
    }

    /// Start (or restart) the debounced remote check for `field`
    ///
    /// No-op for fields without an async validator. Must be called from
    /// within a Tokio runtime.
    pub fn validate_async(&self, field: &Field, value: Value) {
        let Some(config) = field.async_validator() else {
            return;
        };

        let name = field.name.clone();
        let debounce = config
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_debounce);
        let request = RemoteValidationRequest::new(config, name.clone(), value);
        let valid_when = config.valid_when;
        let fallback_message = config.message.clone();

        let mut guard = lock(&self.state);
        let sequence = {
            let counter = guard.sequences.entry(name.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        if let Some(previous) = guard.timers.remove(&name) {
            previous.abort();
        }
        guard.states.insert(name.clone(), AsyncValidationState::Validating);
        guard.errors.remove(&name);

        let task = tokio::spawn(run_check(
            CheckContext {
                validator: self.validator.clone(),
                state: self.state.clone(),
                events: self.events.clone(),
                sequence,
            },
            request,
            debounce,
            valid_when,
            fallback_message,
        ));
        guard.timers.insert(name.clone(), task);
        drop(guard);

        let _ = self.events.send(AsyncValidationEvent {
            field: name,
            state: AsyncValidationState::Validating,
            message: None,
        });
    }

    pub fn state(&self, field: &str) -> AsyncValidationState {
        lock(&self.state)
            .states
            .get(field)
            .copied()
            .unwrap_or_default()
    }

    pub fn error(&self, field: &str) -> Option<String> {
        lock(&self.state).errors.get(field).cloned()
    }

    /// Snapshot of every field's state
    pub fn states(&self) -> HashMap<String, AsyncValidationState> {
        lock(&self.state).states.clone()
    }

    /// Snapshot of every stored async error message
    pub fn errors(&self) -> HashMap<String, String> {
        lock(&self.state).errors.clone()
    }

    pub fn is_validating(&self) -> bool {
        lock(&self.state)
            .states
            .values()
            .any(|s| *s == AsyncValidationState::Validating)
    }

    /// Cancel all pending checks and forget every state and error
    pub fn reset(&self) {
        let mut guard = lock(&self.state);
        for (_, timer) in guard.timers.drain() {
            timer.abort();
        }
        guard.states.clear();
        guard.errors.clear();
        // keep counters so a check racing the abort still sees itself as stale
        for counter in guard.sequences.values_mut() {
            *counter += 1;
        }
    }
}

impl Drop for AsyncValidationCoordinator {
    fn drop(&mut self) {
        let mut guard = lock(&self.state);
        for (_, timer) in guard.timers.drain() {
            timer.abort();
        }
    }
}

struct CheckContext {
    validator: Arc<dyn RemoteValidator>,
    state: Arc<Mutex<CoordinatorState>>,
    events: broadcast::Sender<AsyncValidationEvent>,
    sequence: u64,
}

async fn run_check(
    ctx: CheckContext,
    request: RemoteValidationRequest,
    debounce: Duration,
    valid_when: Option<ValidWhen>,
    fallback_message: Option<String>,
) {
    tokio::time::sleep(debounce).await;

    let (state, message) = match ctx.validator.validate(&request).await {
        Ok(payload) => {
            let verdict = Verdict::from_payload(&payload, valid_when);
            if verdict.valid {
                (AsyncValidationState::Valid, None)
            } else {
                let message = verdict
                    .message
                    .or(fallback_message)
                    .unwrap_or_else(|| DEFAULT_INVALID_MESSAGE.to_string());
                (AsyncValidationState::Invalid, Some(message))
            }
        }
        Err(e) => {
            tracing::warn!(
                field = %request.field_name,
                endpoint = %request.endpoint,
                "Async validation request failed: {}",
                e
            );
            (
                AsyncValidationState::Invalid,
                Some(REQUEST_FAILED_MESSAGE.to_string()),
            )
        }
    };

    let field = request.field_name;
    {
        let mut guard = lock(&ctx.state);
        if guard.sequences.get(&field) != Some(&ctx.sequence) {
            tracing::debug!(
                field = %field,
                sequence = ctx.sequence,
                "Discarding superseded async validation result"
            );
            return;
        }
        guard.timers.remove(&field);
        guard.states.insert(field.clone(), state);
        match &message {
            Some(m) => guard.errors.insert(field.clone(), m.clone()),
            None => guard.errors.remove(&field),
        };
    }

    let _ = ctx.events.send(AsyncValidationEvent {
        field,
        state,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers `{"exists": true}` for "taken", records every value it sees
    struct UsernameService {
        calls: AtomicUsize,
        seen: Mutex<Vec<Value>>,
        fail: bool,
    }

    impl UsernameService {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl RemoteValidator for UsernameService {
        async fn validate(&self, request: &RemoteValidationRequest) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.value.clone());
            if self.fail {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(json!({"exists": request.value == json!("taken")}))
        }
    }

    fn username_field() -> Field {
        serde_json::from_value(json!({
            "name": "username",
            "type": "text",
            "label": "Username",
            "validations": {
                "asyncValidator": {
                    "endpoint": "/api/users/check",
                    "validWhen": "notExists",
                    "message": "Username is already taken"
                }
            }
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_request_never_settles() {
        let service = UsernameService::new(false);
        let coordinator = AsyncValidationCoordinator::new(service.clone());
        let mut events = coordinator.subscribe();
        let field = username_field();

        coordinator.validate_async(&field, json!("taken"));
        assert_eq!(coordinator.state("username"), AsyncValidationState::Validating);

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.validate_async(&field, json!("fresh"));

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*service.seen.lock().unwrap(), vec![json!("fresh")]);
        assert_eq!(coordinator.state("username"), AsyncValidationState::Valid);

        let mut settled = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.state != AsyncValidationState::Validating {
                settled.push(event.state);
            }
        }
        assert_eq!(settled, vec![AsyncValidationState::Valid]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_uses_configured_message() {
        let service = UsernameService::new(false);
        let coordinator = AsyncValidationCoordinator::new(service);

        coordinator.validate_async(&username_field(), json!("taken"));
        tokio::time::sleep(Duration::from_millis(301)).await;

        assert_eq!(coordinator.state("username"), AsyncValidationState::Invalid);
        assert_eq!(
            coordinator.error("username").as_deref(),
            Some("Username is already taken")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_invalid() {
        let service = UsernameService::new(true);
        let coordinator = AsyncValidationCoordinator::new(service);

        coordinator.validate_async(&username_field(), json!("anyone"));
        tokio::time::sleep(Duration::from_millis(301)).await;

        assert_eq!(coordinator.state("username"), AsyncValidationState::Invalid);
        assert_eq!(
            coordinator.error("username").as_deref(),
            Some(REQUEST_FAILED_MESSAGE)
        );
        assert!(!coordinator.is_validating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_timers() {
        let service = UsernameService::new(false);
        let coordinator = AsyncValidationCoordinator::new(service.clone());

        coordinator.validate_async(&username_field(), json!("taken"));
        coordinator.reset();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state("username"), AsyncValidationState::Idle);
        assert!(coordinator.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_debounce_overrides_default() {
        let service = UsernameService::new(false);
        let coordinator = AsyncValidationCoordinator::new(service.clone());
        let mut field = username_field();
        if let Some(v) = field.validations.as_mut() {
            if let Some(a) = v.async_validator.as_mut() {
                a.debounce_ms = Some(1000);
            }
        }

        coordinator.validate_async(&field, json!("fresh"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_field_without_validator_is_noop() {
        let coordinator = AsyncValidationCoordinator::new(UsernameService::new(false));
        coordinator.validate_async(&Field::new("plain", FieldType::Text, "Plain"), json!("x"));
        assert_eq!(coordinator.state("plain"), AsyncValidationState::Idle);
        assert!(coordinator.states().is_empty());
    }
}
