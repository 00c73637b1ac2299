//! Session configuration.

use std::time::Duration;

use mathdrop_countdown::CountdownConfig;

/// Configuration for one match session.
///
/// ```rust
/// use std::time::Duration;
/// use mathdrop_session::SessionConfig;
///
/// let config = SessionConfig {
///     grace_delay: Duration::from_millis(250),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.min_players, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Minimum number of connected, joined players that must all be ready
    /// before the countdown starts.
    pub min_players: usize,

    /// How long a disconnected player stays on the roster before the
    /// record is purged.
    pub grace_delay: Duration,

    /// Clear every remaining player's ready flag when a countdown or a
    /// live match is aborted by a disconnect. Players then have to ready
    /// up again before the next countdown.
    pub reset_ready_on_abort: bool,

    /// Countdown length and cadence.
    pub countdown: CountdownConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            grace_delay: Duration::from_millis(1000),
            reset_ready_on_abort: true,
            countdown: CountdownConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Clamp out-of-range values. `min_players` is at least 1.
    pub fn validated(mut self) -> Self {
        if self.min_players == 0 {
            tracing::warn!("min_players is 0, clamping to 1");
            self.min_players = 1;
        }
        self.countdown = self.countdown.validated();
        self
    }
}
