use crate::core::{Result, SchedulerError};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of event bodies executing at the same time.
    pub max_workers: usize,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self { max_workers: 8 }
    }

    /// Set the worker pool size
    pub fn max_workers(mut self, max: usize) -> Self {
        self.max_workers = max;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(SchedulerError::Config(
                "max_workers must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_workers, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SchedulerConfig::new().max_workers(2);
        assert_eq!(config.max_workers, 2);
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let config = SchedulerConfig::new().max_workers(0);
        assert!(config.validate().is_err());
    }
}
