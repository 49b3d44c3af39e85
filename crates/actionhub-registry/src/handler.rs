//! The handler seam: anything that can serve one named action.

use crate::context::ExecutionContext;
use actionhub_core::{Fault, JsonMap, ResponseEnvelope};
use async_trait::async_trait;
use std::future::Future;

/// Serves one action.
///
/// Returning `Err` is always acceptable: the dispatcher classifies the fault
/// into a failure envelope. Handlers that build their own failure envelope
/// may return it as `Ok`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        inputs: JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault>;
}

/// Adapts an async closure into an [`ActionHandler`].
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JsonMap, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResponseEnvelope, Fault>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(JsonMap, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResponseEnvelope, Fault>> + Send + 'static,
{
    async fn execute(
        &self,
        inputs: JsonMap,
        ctx: &ExecutionContext,
    ) -> Result<ResponseEnvelope, Fault> {
        (self.f)(inputs, ctx.clone()).await
    }
}
