//! State shared by every connection

use crate::executor::JobExecutor;
use std::sync::Arc;
use workbench_core::{AlgorithmRegistry, ModelRegistry, Workspace};

/// Workspace, type registries and executor, cheap to clone
#[derive(Debug, Clone)]
pub struct ServerContext {
    models: Arc<ModelRegistry>,
    algorithms: Arc<AlgorithmRegistry>,
    executor: JobExecutor,
}

impl ServerContext {
    /// Create context over a shared workspace
    #[must_use]
    pub fn new(workspace: Arc<Workspace>, models: ModelRegistry, algorithms: AlgorithmRegistry) -> Self {
        Self {
            models: Arc::new(models),
            algorithms: Arc::new(algorithms),
            executor: JobExecutor::new(workspace),
        }
    }

    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &Arc<Workspace> {
        self.executor.workspace()
    }

    #[inline]
    #[must_use]
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    #[inline]
    #[must_use]
    pub fn algorithms(&self) -> &AlgorithmRegistry {
        &self.algorithms
    }

    #[inline]
    #[must_use]
    pub fn executor(&self) -> &JobExecutor {
        &self.executor
    }
}
