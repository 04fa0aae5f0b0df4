//! Engine tuning knobs shared by the scheduler, context assembly and the
//! configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest wait between two turns, whatever the rate.
pub const MAX_TURN_DELAY: Duration = Duration::from_secs(3600);

/// Turn pacing and provider budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay between turns at rate 1.0.
    pub base_delay_ms: u64,
    /// Rate multiplier applied when a controller is created.
    pub initial_rate: f64,
    /// How long to idle before re-polling when no agent is Active.
    pub idle_poll_ms: u64,
    pub provider_timeout_secs: u64,
    /// Backoff before the single retry of a failed chat call.
    pub retry_delay_ms: u64,
    /// Number of trailing history messages carried in status snapshots.
    pub snapshot_tail: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            initial_rate: 1.0,
            idle_poll_ms: 500,
            provider_timeout_secs: 60,
            retry_delay_ms: 1000,
            snapshot_tail: 50,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    #[must_use]
    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Inter-turn delay for a rate multiplier. Non-positive rates fall back
    /// to the base delay; tiny rates are capped at [`MAX_TURN_DELAY`].
    #[must_use]
    pub fn delay_for_rate(&self, rate: f64) -> Duration {
        if !rate.is_finite() || rate <= 0.0 {
            return self.base_delay();
        }
        Duration::try_from_secs_f64(self.base_delay().as_secs_f64() / rate)
            .map_or(MAX_TURN_DELAY, |delay| delay.min(MAX_TURN_DELAY))
    }
}

/// History budget for the prompt and the summarization trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of messages kept in history before summarizing.
    pub max_messages: usize,
    /// Maximum characters across history (approximate token limit).
    pub max_chars: usize,
    /// Most recent messages that summarization never touches.
    pub keep_recent: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            max_chars: 8000,
            keep_recent: 5,
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub const fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    #[must_use]
    pub const fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = max;
        self
    }

    #[must_use]
    pub const fn with_keep_recent(mut self, keep: usize) -> Self {
        self.keep_recent = keep;
        self
    }
}

/// Memory retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    /// Maximum number of memories to retrieve per turn
    pub top_k: usize,
    /// How many trailing history messages feed the memory query
    pub query_recent_messages: usize,
    /// Maximum memory section length in characters
    pub context_target_length: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 5,
            query_recent_messages: 3,
            context_target_length: 2000,
        }
    }
}
