//! Projector tunables.

/// Configuration for a projector run loop.
///
/// Fields are private so the setters are the only mutation path; the block
/// size in particular is clamped to at least one event so checkpoint
/// bookkeeping can always divide by it.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    lock_timeout_ms: u64,
    persist_block_size: u64,
    update_lock_threshold_ms: u64,
    idle_sleep_ms: u64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
            persist_block_size: 1000,
            update_lock_threshold_ms: 0,
            idle_sleep_ms: 100,
        }
    }
}

impl ProjectorConfig {
    /// Lease width in milliseconds. Must cover the longest expected handler
    /// batch; operators routinely raise it well above the default.
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }

    /// Events between forced checkpoints during a pass. Clamped to at
    /// least one.
    pub fn with_persist_block_size(mut self, events: u64) -> Self {
        self.persist_block_size = events.max(1);
        self
    }

    /// Minimum milliseconds between idle lease refreshes. `0` refreshes on
    /// every idle poll.
    pub fn with_update_lock_threshold_ms(mut self, ms: u64) -> Self {
        self.update_lock_threshold_ms = ms;
        self
    }

    /// Sleep between passes when a pass saw no events.
    pub fn with_idle_sleep_ms(mut self, ms: u64) -> Self {
        self.idle_sleep_ms = ms;
        self
    }

    pub fn lock_timeout_ms(&self) -> u64 {
        self.lock_timeout_ms
    }

    pub fn persist_block_size(&self) -> u64 {
        self.persist_block_size
    }

    pub fn update_lock_threshold_ms(&self) -> u64 {
        self.update_lock_threshold_ms
    }

    pub fn idle_sleep_ms(&self) -> u64 {
        self.idle_sleep_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_tunables() {
        let config = ProjectorConfig::default();
        assert_eq!(config.lock_timeout_ms(), 1000);
        assert_eq!(config.persist_block_size(), 1000);
        assert_eq!(config.update_lock_threshold_ms(), 0);
        assert_eq!(config.idle_sleep_ms(), 100);
    }

    #[test]
    fn block_size_is_clamped_to_at_least_one() {
        let config = ProjectorConfig::default().with_persist_block_size(0);
        assert_eq!(config.persist_block_size(), 1);
    }

    #[test]
    fn setters_chain() {
        let config = ProjectorConfig::default()
            .with_lock_timeout_ms(5000)
            .with_persist_block_size(10)
            .with_update_lock_threshold_ms(2500)
            .with_idle_sleep_ms(50);
        assert_eq!(config.lock_timeout_ms(), 5000);
        assert_eq!(config.persist_block_size(), 10);
        assert_eq!(config.update_lock_threshold_ms(), 2500);
        assert_eq!(config.idle_sleep_ms(), 50);
    }
}
