//! Top-level configuration.

use fieldbook_lock::{DEFAULT_ITERATIONS, MIN_ITERATIONS};
use fieldbook_sharing::SharingConfig;

/// Client-side lock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// PBKDF2 iterations used when creating a new lock.
    pub default_iterations: u32,
    /// Lowest iteration count this client accepts from a team.
    pub min_iterations: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_iterations: DEFAULT_ITERATIONS,
            min_iterations: MIN_ITERATIONS,
        }
    }
}

impl LockConfig {
    pub fn with_default_iterations(mut self, iterations: u32) -> Self {
        self.default_iterations = iterations;
        self
    }

    /// Raise the accepted floor. Values below [`MIN_ITERATIONS`] are clamped.
    pub fn with_min_iterations(mut self, iterations: u32) -> Self {
        self.min_iterations = iterations.max(MIN_ITERATIONS);
        self
    }
}

/// Configuration for the whole Fieldbook stack.
#[derive(Debug, Clone, Default)]
pub struct FieldbookConfig {
    pub sharing: SharingConfig,
    pub lock: LockConfig,
}

impl FieldbookConfig {
    pub fn with_sharing(mut self, sharing: SharingConfig) -> Self {
        self.sharing = sharing;
        self
    }

    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }
}
