use std::time::Duration;

use crate::DEFAULT_HEAD_START;

/// Match tunables shared by both clients.
///
/// Both sides resolve every round locally, so they must agree on these.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Taps added to the RPS winner's count in a tap battle.
    ///
    /// Default: 10.
    pub head_start: u32,

    /// How long the tap battle lasts before the count is submitted.
    ///
    /// Default: 3 seconds.
    pub tap_battle_duration: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            head_start: DEFAULT_HEAD_START,
            tap_battle_duration: Duration::from_secs(3),
        }
    }
}
