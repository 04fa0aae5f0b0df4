//! Summarizers that condense the oldest part of the history.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use roundtable_core::util::truncate_chars;
use roundtable_core::{ChatMessage, ChatParams, ChatProvider, Message, ProviderError, Summarizer};
use tracing::debug;

const LINE_CHARS: usize = 160;

/// Offline summarizer: one line per message, first line of each truncated.
///
/// Never fails, so it doubles as the fallback when a model-backed
/// summarizer errors out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    #[must_use]
    pub fn condense(messages: &[Message]) -> String {
        let mut out = String::from("Earlier in the conversation:");
        for message in messages {
            let first_line = message.content.lines().next().unwrap_or_default().trim();
            if message.is_summary() {
                let _ = write!(out, "\n- {}", truncate_chars(first_line, LINE_CHARS));
            } else {
                let _ = write!(
                    out,
                    "\n- {}: {}",
                    message.sender,
                    truncate_chars(first_line, LINE_CHARS)
                );
            }
        }
        out
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, ProviderError> {
        Ok(Self::condense(messages))
    }
}

/// Summarizer backed by a chat model.
pub struct ChatSummarizer {
    provider: Arc<dyn ChatProvider>,
    params: ChatParams,
}

impl ChatSummarizer {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>, params: ChatParams) -> Self {
        Self { provider, params }
    }

    fn transcript(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.sender, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let prompt = [
            ChatMessage::system(
                "You condense multi-party conversation transcripts. Write one short paragraph \
                 that keeps every speaker's position, open questions and decisions. \
                 Do not add commentary.",
            ),
            ChatMessage::user(Self::transcript(messages)),
        ];

        let response = self.provider.chat(&prompt, &self.params).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty summary".to_string(),
            ));
        }
        debug!("Summarized {} messages into {} chars", messages.len(), summary.len());
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::{ChatResponse, ProviderKind};

    struct FixedProvider(String);

    #[async_trait]
    impl ChatProvider for FixedProvider {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _params: &ChatParams,
        ) -> Result<ChatResponse, ProviderError> {
            assert!(messages[1].content.contains("alice: hi"));
            Ok(ChatResponse {
                content: self.0.clone(),
                usage: None,
            })
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Custom
        }
    }

    #[test]
    fn test_extractive_lists_each_message() {
        let messages = vec![
            Message::summary("Earlier in the conversation:\n- x: y"),
            Message::from_agent("alice", "hi there\nsecond line"),
            Message::injected("moderator", "focus please"),
        ];
        let summary = ExtractiveSummarizer::condense(&messages);
        assert!(summary.starts_with("Earlier in the conversation:"));
        assert!(summary.contains("- alice: hi there"));
        assert!(!summary.contains("second line"));
        assert!(summary.contains("- moderator: focus please"));
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn test_chat_summarizer_trims_output() {
        let summarizer = ChatSummarizer::new(
            Arc::new(FixedProvider("  they agreed  ".to_string())),
            ChatParams::default(),
        );
        let summary = summarizer
            .summarize(&[Message::from_agent("alice", "hi")])
            .await
            .expect("summary");
        assert_eq!(summary, "they agreed");
    }

    #[tokio::test]
    async fn test_chat_summarizer_rejects_empty_output() {
        let summarizer =
            ChatSummarizer::new(Arc::new(FixedProvider("   ".to_string())), ChatParams::default());
        let result = summarizer
            .summarize(&[Message::from_agent("alice", "hi")])
            .await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
