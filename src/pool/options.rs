use std::time::Duration;

/// Tuning knobs for [`MySqlPool`][crate::MySqlPool].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub(crate) max_connections: usize,
    pub(crate) max_connection_age: Duration,
    pub(crate) max_session_use: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 1,
            max_connection_age: Duration::from_secs(12 * 60 * 60),
            max_session_use: Duration::from_secs(4 * 60 * 60),
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on concurrently checked-out connections.
    /// Defaults to 1.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// A connection older than this is closed instead of reused.
    /// Defaults to 12 hours.
    #[must_use]
    pub fn max_connection_age(mut self, age: Duration) -> Self {
        self.max_connection_age = age;
        self
    }

    /// A connection that has accumulated this much busy time is
    /// closed instead of reused. Defaults to 4 hours.
    #[must_use]
    pub fn max_session_use(mut self, busy: Duration) -> Self {
        self.max_session_use = busy;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::PoolOptions;

    #[test]
    fn defaults() {
        let options = PoolOptions::new();

        assert_eq!(options.max_connections, 1);
        assert_eq!(options.max_connection_age, Duration::from_secs(43_200));
        assert_eq!(options.max_session_use, Duration::from_secs(14_400));
    }

    #[test]
    fn max_connections_floor_is_one() {
        assert_eq!(PoolOptions::new().max_connections(0).max_connections, 1);
    }
}
