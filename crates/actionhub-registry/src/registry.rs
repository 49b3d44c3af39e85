//! Action registry and dispatcher.
//!
//! The registry is filled once at start-up and then shared read-only. Every
//! dispatch is independent: the only thing that can escape as `Err` is an
//! unknown action name, every other outcome is an envelope.

use crate::{
    context::ExecutionContext,
    error::{RegistryError, RegistryResult},
    handler::ActionHandler,
    validation::validate_inputs,
};
use actionhub_core::{classify, ActionDescriptor, Fault, JsonMap, ResponseEnvelope};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

struct RegisteredAction {
    descriptor: Arc<ActionDescriptor>,
    handler: Arc<dyn ActionHandler>,
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler to the descriptor's name.
    pub fn register<H>(&mut self, descriptor: ActionDescriptor, handler: H) -> RegistryResult<()>
    where
        H: ActionHandler + 'static,
    {
        self.register_arc(descriptor, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        descriptor: ActionDescriptor,
        handler: Arc<dyn ActionHandler>,
    ) -> RegistryResult<()> {
        descriptor.validate().map_err(|err| RegistryError::InvalidDescriptor {
            name: descriptor.name.clone(),
            reason: err.to_string(),
        })?;
        if self.actions.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateAction(descriptor.name));
        }
        tracing::debug!(action = %descriptor.name, "registered action");
        self.actions.insert(
            descriptor.name.clone(),
            RegisteredAction {
                descriptor: Arc::new(descriptor),
                handler,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.get(name).map(|entry| entry.descriptor.as_ref())
    }

    /// Registered names in sorted order.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Dispatches one invocation.
    pub async fn execute_action(
        &self,
        name: &str,
        inputs: JsonMap,
        ctx: &ExecutionContext,
    ) -> RegistryResult<ResponseEnvelope> {
        let entry = self
            .actions
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAction(name.to_string()))?;
        let span = tracing::info_span!(
            "action",
            action = %name,
            execution_id = %ctx.execution_id()
        );

        async move {
            let started = Instant::now();
            let envelope = match run(entry, inputs, ctx).await {
                Ok(envelope) => envelope,
                Err(fault) => {
                    let record = classify(&fault);
                    tracing::warn!(
                        kind = %record.kind,
                        status_code = ?record.status_code,
                        fault = %fault,
                        "action failed"
                    );
                    ResponseEnvelope::failure(record)
                }
            };
            tracing::info!(
                ok = envelope.is_ok(),
                duration_ms = started.elapsed().as_millis() as u64,
                "action finished"
            );
            Ok(envelope)
        }
        .instrument(span)
        .await
    }
}

async fn run(
    entry: &RegisteredAction,
    inputs: JsonMap,
    ctx: &ExecutionContext,
) -> Result<ResponseEnvelope, Fault> {
    if let Some(field) = &entry.descriptor.required_credential {
        ctx.credential(field)?;
    }
    if ctx.is_cancelled() {
        return Err(Fault::Cancelled);
    }
    let inputs = validate_inputs(&entry.descriptor, inputs)?;

    let outcome = AssertUnwindSafe(entry.handler.execute(inputs, ctx)).catch_unwind().await;
    let envelope = match outcome {
        Ok(result) => result?,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "action handler panicked");
            return Err(Fault::unexpected(format!("handler panicked: {}", message)));
        }
    };

    if let Some(data) = envelope.data() {
        let missing: Vec<&str> = entry
            .descriptor
            .outputs
            .iter()
            .map(String::as_str)
            .filter(|field| !data.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, "success envelope lacks declared outputs");
        }
    }
    Ok(envelope)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
