// core/src/core/control.rs

//! Flow signals returned by handlers and the outcome of a whole run.

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Carry on with the remaining handlers and steps.
  Continue,
  /// End the run here. Nothing after this handler executes and the run
  /// reports `PipelineResult::Stopped`.
  Stop,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step was executed, skipped by its condition, or was optional.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}
