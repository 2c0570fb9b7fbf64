// core/src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps in order against one shared context.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::FlowError;
use crate::pipeline::definition::{Phase, Pipeline};
use tracing::{event, info_span, instrument, Instrument, Level};

/// Outcome of one step phase.
enum PhaseOutcome<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes every step against `ctx_data`.
  ///
  /// Per step: the `skip_if` condition is checked first, then the `before`, `on` and
  /// `after` handlers run in that order. A `Stop` from any handler ends the run with
  /// `PipelineResult::Stopped`.
  ///
  /// A required step with no handlers fails with `FlowError::HandlerMissing`. A handler
  /// error in a required step is returned as-is. In an optional step the error is
  /// logged and execution resumes at the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline run starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = info_span!(
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      match self.run_step(step_def, &ctx_data).instrument(step_span).await {
        PhaseOutcome::Continue => {}
        PhaseOutcome::Stop => {
          event!(Level::INFO, step_name = %step_def.name, "Pipeline stopped by a handler.");
          return Ok(PipelineResult::Stopped);
        }
        PhaseOutcome::Failed(err) if step_def.optional => {
          event!(Level::WARN, step_name = %step_def.name, error = %err, "Optional step failed, continuing.");
        }
        PhaseOutcome::Failed(err) => return Err(err),
      }
    }

    event!(Level::DEBUG, "Pipeline run completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> PhaseOutcome<Err> {
    if step_def.should_skip(ctx_data) {
      event!(Level::INFO, "Step skipped by its skip_if condition.");
      return PhaseOutcome::Continue;
    }

    let name = step_def.name.as_str();
    let has_handlers = [Phase::Before, Phase::On, Phase::After]
      .iter()
      .any(|phase| !self.handlers_for(*phase, name).is_empty());

    if !has_handlers {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return PhaseOutcome::Continue;
      }
      event!(Level::ERROR, "Required step has no handlers.");
      return PhaseOutcome::Failed(Err::from(FlowError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for phase in [Phase::Before, Phase::On, Phase::After] {
      match self.run_phase(phase, name, ctx_data).await {
        PhaseOutcome::Continue => {}
        other => return other,
      }
    }
    PhaseOutcome::Continue
  }

  async fn run_phase(&self, phase: Phase, step_name: &str, ctx_data: &ContextData<TData>) -> PhaseOutcome<Err> {
    for (handler_idx, handler_fn) in self.handlers_for(phase, step_name).iter().enumerate() {
      let handler_span = info_span!("step_handler", phase = phase.label(), handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return PhaseOutcome::Stop,
        Err(e) => {
          event!(Level::ERROR, phase = phase.label(), error = %e, "Handler failed.");
          return PhaseOutcome::Failed(e);
        }
      }
    }
    PhaseOutcome::Continue
  }
}
