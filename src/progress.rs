// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{LeidenError, Result};

/// Sink for progress events.
///
/// Reporting is best effort: implementations must not panic and the
/// algorithm never fails because of them.
pub trait ProgressTracker: Send + Sync {
    /// A named unit of work starts.
    fn begin_subtask(&self, name: &str);

    /// The named unit of work finished.
    fn end_subtask(&self, name: &str);

    /// Informational message.
    fn log_message(&self, message: &str);
}

/// Forwards progress events to the `log` facade.
#[derive(Debug)]
pub struct LoggingProgressTracker {
    task: String,
    started: Instant,
}

impl LoggingProgressTracker {
    pub fn new(task: impl Into<String>) -> Self {
        LoggingProgressTracker {
            task: task.into(),
            started: Instant::now(),
        }
    }
}

impl Default for LoggingProgressTracker {
    fn default() -> Self {
        Self::new("Leiden")
    }
}

impl ProgressTracker for LoggingProgressTracker {
    fn begin_subtask(&self, name: &str) {
        log::debug!("{} :: {} :: Start", self.task, name);
    }

    fn end_subtask(&self, name: &str) {
        log::debug!(
            "{} :: {} :: Finished after {:?}",
            self.task,
            name,
            self.started.elapsed()
        );
    }

    fn log_message(&self, message: &str) {
        log::info!("{} :: {}", self.task, message);
    }
}

/// Shared flag polled by every phase; raising it aborts the run with
/// [`LeidenError::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct TerminationFlag {
    terminated: Arc<AtomicBool>,
}

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Running phases stop at their next check.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn running(&self) -> bool {
        !self.terminated.load(Ordering::Acquire)
    }

    /// Errors with [`LeidenError::Cancelled`] once termination was requested.
    #[inline]
    pub fn assert_running(&self) -> Result<()> {
        if self.running() {
            Ok(())
        } else {
            Err(LeidenError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_is_shared_between_clones() {
        let flag = TerminationFlag::new();
        let observer = flag.clone();
        assert!(observer.assert_running().is_ok());
        flag.terminate();
        assert!(!observer.running());
        assert!(observer.assert_running().unwrap_err().is_cancelled());
    }
}
