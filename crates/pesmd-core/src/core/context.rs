use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::debug;

const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Named random streams so that initialisation, shuffling and dropout draw
/// from independent sequences of the same seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStream {
    Initialization = 1,
    Shuffle = 2,
    Dropout = 3,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Thread count must be positive")]
    ZeroThreads,
    #[error("Failed to configure the worker pool: {0}")]
    ThreadPool(String),
}

/// Process-wide execution settings: worker-thread cap and RNG seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub num_threads: Option<usize>,
    pub seed: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            num_threads: None,
            seed: 42,
        }
    }
}

impl ExecutionContext {
    pub fn new(num_threads: Option<usize>, seed: u64) -> Self {
        Self { num_threads, seed }
    }

    /// Installs the global worker pool. Call once at startup; a pool that was
    /// already installed with default settings is reported as an error.
    pub fn initialize(num_threads: Option<usize>, seed: u64) -> Result<Self, ContextError> {
        if num_threads == Some(0) {
            return Err(ContextError::ZeroThreads);
        }
        let ctx = Self::new(num_threads, seed);

        #[cfg(feature = "parallel")]
        if let Some(n) = num_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build_global()
                .map_err(|e| ContextError::ThreadPool(e.to_string()))?;
        }

        debug!(threads = ?num_threads, seed, "Execution context initialized.");
        Ok(ctx)
    }

    pub fn rng(&self, stream: RngStream) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (stream as u64).wrapping_mul(STREAM_MIX))
    }
}
