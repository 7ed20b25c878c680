//! Job executor
//!
//! Runs one algorithm against the shared workspace. Every model the algorithm
//! references is locked before `run` starts and unlocked when it returns,
//! fails, or panics. A panic is contained and reported as a
//! non-explainable error.

use crate::error::ExecutionError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use workbench_core::{Algorithm, Model, Workspace};

/// Runs algorithms with exclusive access to their models
#[derive(Debug, Clone)]
pub struct JobExecutor {
    workspace: Arc<Workspace>,
}

impl JobExecutor {
    /// Create executor over `workspace`
    #[inline]
    #[must_use]
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// The shared workspace
    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Run `algorithm` to completion on the calling thread
    ///
    /// Blocks while another job holds one of the referenced models.
    ///
    /// # Returns
    /// Result models in the order the algorithm produced them
    ///
    /// # Errors
    /// - `ExecutionError::ParametersUnavailable` if parameters are incomplete
    /// - `ExecutionError::Workspace` if a referenced model does not exist
    /// - `ExecutionError::Explainable` if the algorithm returned an error
    /// - `ExecutionError::NonExplainable` if it panicked
    pub fn execute(&self, algorithm: &mut dyn Algorithm) -> Result<Vec<Box<dyn Model>>, ExecutionError> {
        if !algorithm.parameters_valid() {
            return Err(ExecutionError::ParametersUnavailable);
        }

        let models = self.workspace.resolve(&algorithm.model_refs())?;
        tracing::debug!(
            algorithm = algorithm.type_name(),
            locked = models.len(),
            "running algorithm"
        );

        let outcome = {
            let mut locked = models.lock();
            panic::catch_unwind(AssertUnwindSafe(|| algorithm.run(&mut locked)))
        };

        match outcome {
            Ok(Ok(results)) => {
                tracing::debug!(
                    algorithm = algorithm.type_name(),
                    results = results.len(),
                    "algorithm finished"
                );
                Ok(results)
            }
            Ok(Err(e)) => Err(ExecutionError::Explainable(e.message().to_string())),
            Err(payload) => {
                tracing::error!(
                    algorithm = algorithm.type_name(),
                    panic = panic_message(payload.as_ref()),
                    "algorithm panicked"
                );
                Err(ExecutionError::NonExplainable)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
