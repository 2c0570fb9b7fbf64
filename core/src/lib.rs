// core/src/lib.rs

//! shopflow: async step pipelines for storefront workflows.
//!
//! A workflow (order checkout, payment settlement, webhook intake) is a
//! `Pipeline<TData, Err>`: an ordered list of named steps, each with `before`,
//! `on` and `after` handlers that share a lockable `ContextData<TData>`.
//!
//!  - Handlers return `PipelineControl::Stop` to end a run early without error.
//!  - Steps can carry a `skip_if` condition evaluated against the context.
//!  - Optional steps are best-effort: a missing or failing handler is logged and
//!    the run moves on to the next step.
//!  - `Registry` stores one pipeline per context type and dispatches runs by type.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Registry;
