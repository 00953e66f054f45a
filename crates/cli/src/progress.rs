//! Progress reporting for terminal runs.

use simvex::ProgressMonitor;
use tracing::{debug, info};

/// Logs task progress in coarse steps; never cancels.
#[derive(Debug, Default)]
pub struct ConsoleMonitor {
  task: String,
  total: i32,
  worked: i32,
  last_step: i32,
}

impl ProgressMonitor for ConsoleMonitor {
  fn begin_task(&mut self, name: &str, total_work: i32) {
    self.task = name.to_string();
    self.total = total_work.max(1);
    self.worked = 0;
    self.last_step = 0;
    info!(task = %self.task, "started");
  }

  fn worked(&mut self, units: i32) {
    self.worked += units;
    let step = self.worked * 100 / self.total / 25;
    if step > self.last_step {
      self.last_step = step;
      debug!(task = %self.task, percent = self.worked * 100 / self.total, "progress");
    }
  }

  fn is_canceled(&self) -> bool {
    false
  }

  fn done(&mut self) {
    debug!(task = %self.task, "done");
  }
}
