//! Operation invocations.
//!
//! `invoke` validates the supplied arguments against the Operation
//! element's declared variables, stores a `PENDING` invocation record and
//! publishes an event; downstream executors (OPC-UA, Modbus, HTTP
//! connectors) move the record through its state machine via
//! [`InvocationService::update_state`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};
use titan_events::{EventBus, EventEnvelope, EventType};

use crate::store::DocumentStore;

/// Longest accepted invocation timeout (1 hour).
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Execution state machine of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Legal transitions: PENDING -> RUNNING -> {COMPLETED, FAILED,
    /// TIMEOUT, CANCELLED}; PENDING may also cancel or time out directly.
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Running | Self::Cancelled | Self::Timeout | Self::Failed
            ),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::Timeout | Self::Cancelled
            ),
            _ => false,
        }
    }
}

/// One argument of an invocation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperationArgument {
    pub id_short: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

/// Stored invocation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInvocation {
    pub invocation_id: String,
    pub submodel_id: String,
    pub id_short_path: String,
    pub execution_state: ExecutionState,
    pub inputs: Vec<OperationArgument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inoutputs: Option<Vec<OperationArgument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OperationArgument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invocation request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    #[serde(default)]
    pub input_arguments: Vec<OperationArgument>,
    #[serde(default)]
    pub inoutput_arguments: Vec<OperationArgument>,
    pub timeout: Option<u64>,
    pub correlation_id: Option<String>,
}

#[derive(Clone)]
pub struct InvocationService {
    store: Arc<dyn DocumentStore>,
    bus: Arc<dyn EventBus>,
}

impl InvocationService {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    /// Validate arguments against the Operation element and record a
    /// `PENDING` invocation.
    pub async fn invoke(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        id_short_path: &str,
        operation: &Value,
        request: InvokeRequest,
    ) -> TitanResult<OperationInvocation> {
        if operation.get("modelType").and_then(Value::as_str) != Some("Operation") {
            return Err(TitanError::bad_request(format!(
                "element '{id_short_path}' is not an Operation"
            )));
        }
        if let Some(timeout) = request.timeout {
            if timeout > MAX_TIMEOUT_MS {
                return Err(TitanError::bad_request(format!(
                    "timeout exceeds maximum of {MAX_TIMEOUT_MS} ms"
                )));
            }
        }
        validate_arguments(operation, "inputVariables", &request.input_arguments)?;
        validate_arguments(operation, "inoutputVariables", &request.inoutput_arguments)?;

        let now = Utc::now();
        let invocation = OperationInvocation {
            invocation_id: Uuid::new_v4().to_string(),
            submodel_id: submodel_id.to_string(),
            id_short_path: id_short_path.to_string(),
            execution_state: ExecutionState::Pending,
            inputs: request.input_arguments,
            inoutputs: (!request.inoutput_arguments.is_empty())
                .then_some(request.inoutput_arguments),
            outputs: None,
            correlation_id: request.correlation_id,
            timeout_ms: request.timeout,
            requested_by: ctx.subject.clone(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_invocation(ctx, invocation.clone()).await?;

        let event = EventEnvelope::new(
            EntityKind::OperationInvocation,
            EventType::Created,
            invocation.invocation_id.clone(),
        )
        .with_element(id_short_path, None);
        if let Err(error) = self.bus.publish(event).await {
            tracing::warn!(%error, "operation-invoked event publish failed");
        }
        Ok(invocation)
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        invocation_id: &str,
    ) -> TitanResult<OperationInvocation> {
        self.store
            .get_invocation(ctx, invocation_id)
            .await?
            .ok_or_else(|| {
                TitanError::not_found(format!("invocation '{invocation_id}' not found"))
            })
    }

    /// Executor-side state update; enforces the state machine.
    pub async fn update_state(
        &self,
        ctx: &TenantContext,
        invocation_id: &str,
        next: ExecutionState,
        outputs: Option<Vec<OperationArgument>>,
        error_message: Option<String>,
    ) -> TitanResult<OperationInvocation> {
        let mut invocation = self.get(ctx, invocation_id).await?;
        if !invocation.execution_state.can_transition_to(next) {
            return Err(TitanError::conflict(format!(
                "invocation '{invocation_id}' cannot transition {:?} -> {next:?}",
                invocation.execution_state
            )));
        }
        invocation.execution_state = next;
        invocation.outputs = outputs.or(invocation.outputs);
        invocation.error_message = error_message.or(invocation.error_message);
        invocation.updated_at = Utc::now();
        self.store.update_invocation(ctx, invocation.clone()).await?;
        Ok(invocation)
    }
}

/// Supplied argument names must match declared variable names.
fn validate_arguments(
    operation: &Value,
    variables_key: &str,
    supplied: &[OperationArgument],
) -> TitanResult<()> {
    if supplied.is_empty() {
        return Ok(());
    }
    let declared: HashSet<&str> = operation
        .get(variables_key)
        .and_then(Value::as_array)
        .map(|variables| {
            variables
                .iter()
                .filter_map(|variable| {
                    variable
                        .pointer("/value/idShort")
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default();

    for argument in supplied {
        if !declared.contains(argument.id_short.as_str()) {
            return Err(TitanError::bad_request(format!(
                "argument '{}' is not declared in {variables_key}",
                argument.id_short
            )));
        }
    }
    Ok(())
}
