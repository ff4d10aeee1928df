use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options steering one resolution batch
///
/// Usually assembled through a [`ConfigProvider`](crate::provider::ConfigProvider),
/// but plain construction works just as well:
///
/// ```rust
/// use graft_config::config::ResolverConfig;
///
/// let config = ResolverConfig {
///     parallel: true,
///     ..ResolverConfig::default()
/// };
/// assert!(config.auto_binding);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Synthesize implicit factories for types without an explicit provider
    pub auto_binding: bool,
    /// Resolve injectors on a worker pool
    pub parallel: bool,
    /// Size of the worker pool, `None` leaves the choice to rayon
    pub worker_threads: Option<usize>,
    /// Abandon unfinished injectors after this many milliseconds
    pub timeout_ms: Option<u64>,
}
impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_binding: true,
            parallel: false,
            worker_threads: None,
            timeout_ms: None,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn apply(&mut self, layer: &PartialResolverConfig) {
        if let Some(auto_binding) = layer.auto_binding {
            self.auto_binding = auto_binding;
        }
        if let Some(parallel) = layer.parallel {
            self.parallel = parallel;
        }
        if layer.worker_threads.is_some() {
            self.worker_threads = layer.worker_threads;
        }
        if layer.timeout_ms.is_some() {
            self.timeout_ms = layer.timeout_ms;
        }
    }
}

/// One layer of a config - absent fields leave the previous layers untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PartialResolverConfig {
    pub auto_binding: Option<bool>,
    pub parallel: Option<bool>,
    pub worker_threads: Option<usize>,
    pub timeout_ms: Option<u64>,
}
