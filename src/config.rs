use crate::error::{PregelError, Result};

/// Tunables of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of worker participants.
    pub num_workers: usize,
    /// Vertices the master reads from the reader per partitioning round.
    pub batch_size: usize,
    /// Distinct pending messages a sender buffers for one peer before it
    /// ships them as a single packet.
    pub message_batch_size: usize,
    /// Capacity of the channel between the compute step and the sender.
    pub channel_capacity: usize,
    /// Stop after this many supersteps even if vertices are still active.
    pub max_supersteps: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_workers: 4,
            batch_size: 1000,
            message_batch_size: 1024,
            channel_capacity: 4096,
            max_supersteps: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(PregelError::Config(
                "the number of workers should be positive".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PregelError::Config("batch size should be positive".into()));
        }
        if self.message_batch_size == 0 {
            return Err(PregelError::Config(
                "message batch size should be positive".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(PregelError::Config(
                "channel capacity should be positive".into(),
            ));
        }
        if self.max_supersteps == Some(0) {
            return Err(PregelError::Config(
                "the superstep limit should be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_rejected() {
        let config = Config {
            num_workers: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(PregelError::Config(_))));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(PregelError::Config(_))));
    }

    #[test]
    fn zero_superstep_limit_rejected() {
        let config = Config {
            max_supersteps: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
