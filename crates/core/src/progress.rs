//! Progress reporting collaborator.
//!
//! Long-running operations accept a [`ProgressMonitor`] and poll
//! `is_canceled` cooperatively between lines or blocks. Every exit path of
//! an operation, including cancellation and errors, reports `done` exactly
//! once.

pub trait ProgressMonitor {
  fn begin_task(&mut self, name: &str, total_work: i32);
  fn worked(&mut self, units: i32);
  fn is_canceled(&self) -> bool;
  fn done(&mut self);
}

/// Monitor that ignores progress and never cancels.
#[derive(Debug, Default)]
pub struct NoopMonitor;

impl ProgressMonitor for NoopMonitor {
  fn begin_task(&mut self, _name: &str, _total_work: i32) {}

  fn worked(&mut self, _units: i32) {}

  fn is_canceled(&self) -> bool {
    false
  }

  fn done(&mut self) {}
}

/// Recording monitor for tests: counts work and can cancel after a set
/// number of `is_canceled` polls.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
  pub task: Option<(String, i32)>,
  pub worked_total: i32,
  pub done_calls: u32,
  pub polls: std::cell::Cell<u32>,
  pub cancel_after_polls: Option<u32>,
}

impl RecordingMonitor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancelling_after(polls: u32) -> Self {
    RecordingMonitor {
      cancel_after_polls: Some(polls),
      ..Self::default()
    }
  }
}

impl ProgressMonitor for RecordingMonitor {
  fn begin_task(&mut self, name: &str, total_work: i32) {
    self.task = Some((name.to_string(), total_work));
  }

  fn worked(&mut self, units: i32) {
    self.worked_total += units;
  }

  fn is_canceled(&self) -> bool {
    self.polls.set(self.polls.get() + 1);
    match self.cancel_after_polls {
      Some(limit) => self.polls.get() > limit,
      None => false,
    }
  }

  fn done(&mut self) {
    self.done_calls += 1;
  }
}
