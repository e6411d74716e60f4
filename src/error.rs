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

//! Error types for community detection runs.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LeidenError>;

/// Errors returned by the Leiden engine.
///
/// A run that stops after `max_levels` without converging is not an error;
/// it returns a populated result with `did_converge == false`.
#[derive(Debug, Error)]
pub enum LeidenError {
    /// A configuration value is out of range. Raised before any computation.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfiguration {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human readable explanation.
        message: String,
    },

    /// The termination flag was raised while a phase was running.
    #[error("the computation was cancelled")]
    Cancelled,

    /// A defensive check failed. Indicates a logic defect, never retried.
    #[error("inconsistent algorithm state: {0}")]
    InconsistentState(String),

    /// A JSON configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl LeidenError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        LeidenError::InvalidConfiguration {
            name,
            message: message.into(),
        }
    }

    /// Returns `true` if the run was aborted through the termination flag.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LeidenError::Cancelled)
    }

    /// Returns `true` for errors caused by the caller supplied configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LeidenError::InvalidConfiguration { .. } | LeidenError::ConfigParse(_)
        )
    }
}
