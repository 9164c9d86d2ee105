//! Run configuration.

use crate::error::{Error, Result};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options recognized by the engine.
///
/// A config is only obtainable through [`PregelConfigBuilder::build`], which
/// validates it. [`crate::Pregel::create`] rebuilds the config it is given,
/// so the same checks run again at the start of every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PregelConfig {
    max_iterations: usize,
    concurrency: usize,
    is_asynchronous: bool,
    use_fork_join: bool,
    check_memory: bool,
}

impl PregelConfig {
    pub fn builder() -> PregelConfigBuilder {
        PregelConfigBuilder::default()
    }

    pub fn to_builder(&self) -> PregelConfigBuilder {
        PregelConfigBuilder {
            max_iterations: self.max_iterations,
            concurrency: self.concurrency,
            is_asynchronous: self.is_asynchronous,
            use_fork_join: self.use_fork_join,
            check_memory: self.check_memory,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Selects the async queue over the sync queue when the computation has
    /// no reducer.
    pub fn is_asynchronous(&self) -> bool {
        self.is_asynchronous
    }

    /// Selects fork/join compute steps over statically partitioned ones.
    pub fn use_fork_join(&self) -> bool {
        self.use_fork_join
    }

    /// Compare the memory estimate against the available memory before a run.
    pub fn check_memory(&self) -> bool {
        self.check_memory
    }
}

#[derive(Debug, Clone)]
pub struct PregelConfigBuilder {
    max_iterations: usize,
    concurrency: usize,
    is_asynchronous: bool,
    use_fork_join: bool,
    check_memory: bool,
}

impl Default for PregelConfigBuilder {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            concurrency: DEFAULT_CONCURRENCY,
            is_asynchronous: false,
            use_fork_join: false,
            check_memory: true,
        }
    }
}

impl PregelConfigBuilder {
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn is_asynchronous(mut self, is_asynchronous: bool) -> Self {
        self.is_asynchronous = is_asynchronous;
        self
    }

    pub fn use_fork_join(mut self, use_fork_join: bool) -> Self {
        self.use_fork_join = use_fork_join;
        self
    }

    pub fn check_memory(mut self, check_memory: bool) -> Self {
        self.check_memory = check_memory;
        self
    }

    pub fn build(self) -> Result<PregelConfig> {
        if self.concurrency < 1 {
            return Err(Error::InvalidConfig(format!(
                "concurrency must be at least 1, got {}",
                self.concurrency
            )));
        }
        if self.max_iterations < 1 {
            return Err(Error::InvalidConfig(format!(
                "max_iterations must be at least 1, got {}",
                self.max_iterations
            )));
        }
        Ok(PregelConfig {
            max_iterations: self.max_iterations,
            concurrency: self.concurrency,
            is_asynchronous: self.is_asynchronous,
            use_fork_join: self.use_fork_join,
            check_memory: self.check_memory,
        })
    }
}
