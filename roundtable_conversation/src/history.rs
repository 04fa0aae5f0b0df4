//! Conversation history management.
//!
//! [`History`] is the session's append-only log, guarded by its own lock.
//! [`HistoryWindow`] picks which of its messages go into a prompt, and
//! [`summarization_cut`] decides how much of the oldest history to fold into
//! a summary once the budget is exceeded.

use roundtable_core::{HistoryConfig, Message};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Ordered message log of one session.
#[derive(Debug, Default)]
pub struct History {
    messages: Mutex<Vec<Message>>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, message: Message) {
        self.messages.lock().await.push(message);
    }

    /// Append unless `cancel` has fired. The check and the push happen under
    /// the history lock, so a turn is either fully applied or not at all.
    pub async fn append_unless_cancelled(
        &self,
        message: Message,
        cancel: &CancellationToken,
    ) -> bool {
        let mut messages = self.messages.lock().await;
        if cancel.is_cancelled() {
            return false;
        }
        messages.push(message);
        true
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Get the last N messages from history.
    pub async fn tail(&self, n: usize) -> Vec<Message> {
        let messages = self.messages.lock().await;
        let start = messages.len().saturating_sub(n);
        messages[start..].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }

    /// Replace the oldest messages with `summary`, provided they still carry
    /// exactly `prefix_ids` in order. Returns whether the replacement happened.
    pub async fn replace_prefix(&self, prefix_ids: &[Uuid], summary: Message) -> bool {
        let mut messages = self.messages.lock().await;
        if prefix_ids.is_empty() || messages.len() < prefix_ids.len() {
            return false;
        }
        let unchanged = messages
            .iter()
            .zip(prefix_ids)
            .all(|(message, id)| message.id == *id);
        if !unchanged {
            return false;
        }
        messages.splice(..prefix_ids.len(), std::iter::once(summary));
        true
    }
}

/// Number of oldest messages to summarize, or `None` when history is within
/// budget.
///
/// The cut is the larger of half the history and what is needed to get back
/// under `max_messages`, but never reaches into the last `keep_recent`
/// messages. The result is one summary plus everything after the cut.
#[must_use]
pub fn summarization_cut(len: usize, total_chars: usize, config: &HistoryConfig) -> Option<usize> {
    let over_count = len > config.max_messages;
    let over_chars = total_chars > config.max_chars;
    if !over_count && !over_chars {
        return None;
    }

    let needed = if over_count {
        len + 1 - config.max_messages
    } else {
        0
    };
    let cut = (len / 2).max(needed).min(len.saturating_sub(config.keep_recent));

    // Folding a single message into a summary gains nothing
    (cut >= 2).then_some(cut)
}

/// A sliding window over conversation history.
///
/// This manages which messages should be included in the prompt for the
/// next turn. A leading summary message is always kept, as is the newest
/// message.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    config: HistoryConfig,
}

impl HistoryWindow {
    #[must_use]
    pub const fn with_config(config: HistoryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn select_messages(&self, messages: &[Message]) -> Vec<Message> {
        let Some(last) = messages.last() else {
            return Vec::new();
        };

        let (summary, rest) = match messages.split_first() {
            Some((first, rest)) if first.is_summary() => (Some(first), rest),
            _ => (None, messages),
        };

        let budget = self
            .config
            .max_messages
            .saturating_sub(usize::from(summary.is_some()))
            .max(1);
        let start = rest.len().saturating_sub(budget);
        let mut selected: Vec<Message> = rest[start..].to_vec();

        let mut total_chars: usize = summary.map_or(0, |s| s.content.len())
            + selected.iter().map(|m| m.content.len()).sum::<usize>();

        // Truncate from the front (oldest messages), never the newest
        while selected.len() > 1 && total_chars > self.config.max_chars {
            total_chars -= selected.remove(0).content.len();
        }

        if selected.is_empty() {
            selected.push(last.clone());
        }
        if let Some(summary) = summary {
            selected.insert(0, summary.clone());
        }
        selected
    }

    #[must_use]
    pub const fn config(&self) -> &HistoryConfig {
        &self.config
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::with_config(HistoryConfig::default())
    }
}

/// Statistics about conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub summaries: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn from_messages(history: &[Message]) -> Self {
        let total_characters: usize = history.iter().map(|m| m.content.len()).sum();
        Self {
            total_messages: history.len(),
            summaries: history.iter().filter(|m| m.is_summary()).count(),
            total_characters,
            estimated_tokens: roundtable_core::util::estimate_tokens(total_characters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_messages(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                let sender = if i % 2 == 0 { "alice" } else { "bob" };
                Message::from_agent(sender, format!("Message {i}: {}", "x".repeat(100)))
            })
            .collect()
    }

    #[test]
    fn test_cut_none_within_budget() {
        let config = HistoryConfig::default();
        assert_eq!(summarization_cut(20, 100, &config), None);
    }

    #[test]
    fn test_cut_for_count_overflow() {
        let config = HistoryConfig {
            max_messages: 20,
            max_chars: 1_000_000,
            keep_recent: 5,
        };
        let cut = summarization_cut(25, 0, &config);
        assert_eq!(cut, Some(12));
        // one summary plus the remainder stays within the limit
        assert!(25 - 12 + 1 <= 20);
    }

    #[test]
    fn test_cut_respects_keep_recent() {
        let config = HistoryConfig {
            max_messages: 20,
            max_chars: 1_000_000,
            keep_recent: 19,
        };
        // needed = 6, half = 12, bounded by 25 - 19 = 6
        assert_eq!(summarization_cut(25, 0, &config), Some(6));
    }

    #[test]
    fn test_cut_for_char_overflow() {
        let config = HistoryConfig {
            max_messages: 100,
            max_chars: 500,
            keep_recent: 2,
        };
        assert_eq!(summarization_cut(10, 1000, &config), Some(5));
        assert_eq!(summarization_cut(3, 1000, &config), None);
    }

    #[test]
    fn test_history_window_select() {
        let config = HistoryConfig {
            max_messages: 5,
            max_chars: 10000,
            keep_recent: 2,
        };
        let window = HistoryWindow::with_config(config);
        let messages = create_test_messages(20);

        let selected = window.select_messages(&messages);

        assert_eq!(selected.len(), 5);
        assert_eq!(selected[4].id, messages[19].id);
    }

    #[test]
    fn test_history_window_keeps_summary() {
        let config = HistoryConfig {
            max_messages: 3,
            max_chars: 10000,
            keep_recent: 1,
        };
        let window = HistoryWindow::with_config(config);
        let mut messages = vec![Message::summary("earlier")];
        messages.extend(create_test_messages(6));

        let selected = window.select_messages(&messages);

        assert_eq!(selected.len(), 3);
        assert!(selected[0].is_summary());
        assert_eq!(selected[2].id, messages[6].id);
    }

    #[test]
    fn test_history_char_limit() {
        let config = HistoryConfig {
            max_messages: 100,
            max_chars: 500,
            keep_recent: 2,
        };
        let window = HistoryWindow::with_config(config);
        let messages = create_test_messages(20);

        let selected = window.select_messages(&messages);

        let total_chars: usize = selected.iter().map(|m| m.content.len()).sum();
        assert!(total_chars <= 500);
        assert!(!selected.is_empty());
    }

    #[test]
    fn test_history_window_keeps_oversized_newest() {
        let config = HistoryConfig {
            max_messages: 10,
            max_chars: 10,
            keep_recent: 1,
        };
        let window = HistoryWindow::with_config(config);
        let messages = create_test_messages(3);

        let selected = window.select_messages(&messages);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, messages[2].id);
    }

    #[test]
    fn test_history_stats() {
        let mut messages = vec![Message::summary("s")];
        messages.extend(create_test_messages(4));
        let stats = HistoryStats::from_messages(&messages);
        assert_eq!(stats.total_messages, 5);
        assert_eq!(stats.summaries, 1);
        assert!(stats.estimated_tokens > 0);
    }

    #[tokio::test]
    async fn test_replace_prefix_requires_unchanged_prefix() {
        let history = History::new();
        for message in create_test_messages(6) {
            history.append(message).await;
        }
        let snapshot = history.snapshot().await;
        let ids: Vec<Uuid> = snapshot[..3].iter().map(|m| m.id).collect();

        assert!(history.replace_prefix(&ids, Message::summary("first three")).await);
        assert_eq!(history.len().await, 4);

        // Same ids no longer lead the log
        assert!(!history.replace_prefix(&ids, Message::summary("again")).await);
        let after = history.snapshot().await;
        assert!(after[0].is_summary());
        assert_eq!(after[1].id, snapshot[3].id);
    }

    #[tokio::test]
    async fn test_append_unless_cancelled() {
        let history = History::new();
        let cancel = CancellationToken::new();
        assert!(
            history
                .append_unless_cancelled(Message::from_agent("a", "one"), &cancel)
                .await
        );
        cancel.cancel();
        assert!(
            !history
                .append_unless_cancelled(Message::from_agent("a", "two"), &cancel)
                .await
        );
        assert_eq!(history.len().await, 1);
    }
}
