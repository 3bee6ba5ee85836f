//! Batch execution settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Worker pool and scratch space settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrent jobs. Defaults to the number of CPUs.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Root for per-job scratch directories.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Draw live progress bars.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("spotlight")
}

fn default_show_progress() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            temp_dir: default_temp_dir(),
            show_progress: default_show_progress(),
        }
    }
}

impl BatchConfig {
    /// Effective worker count, never below one.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_defaults_to_cpus() {
        let config = BatchConfig::default();
        assert_eq!(config.worker_count(), num_cpus::get().max(1));
    }

    #[test]
    fn test_explicit_workers() {
        let config: BatchConfig = toml::from_str("workers = 3").unwrap();
        assert_eq!(config.worker_count(), 3);
        assert!(config.show_progress);
        assert!(config.temp_dir.ends_with("spotlight"));
    }
}
