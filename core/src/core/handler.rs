// core/src/core/handler.rs

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Boxed async step handler.
///
/// A handler receives a clone of the run's `ContextData<TData>`. Lock guards taken
/// from it must be released before the handler awaits anything; copy what you need
/// out of the guard, await, then take a fresh guard to write results back.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

/// Boxes a plain async closure into a `Handler`, converting its error type.
pub(crate) fn boxed<TData, F, E, Err>(
  handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
) -> Handler<TData, Err>
where
  TData: Send + Sync + 'static,
  F: Future<Output = Result<PipelineControl, E>> + Send + 'static,
  E: Into<Err> + Send + Sync + 'static,
  Err: 'static,
{
  Box::new(move |ctx_data| {
    let fut = handler_fn(ctx_data);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}
