//! Per-turn prompt assembly.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use roundtable_core::{
    AgentProfile, CancellationRequested, ChatMessage, HistoryConfig, Message, RetrievalConfig,
    Summarizer,
};
use roundtable_memory::{MemoryGateway, ScoredMemory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::history::{History, HistoryWindow, summarization_cut};
use crate::summarizer::ExtractiveSummarizer;

/// Format a timestamp as a human-readable "time ago" string
fn time_ago_since(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);

    if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// What the assembler needs to know about the turn being prepared.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub agent: &'a AgentProfile,
    /// Every agent name on the roster, in roster order.
    pub participants: &'a [String],
    pub session_id: Uuid,
    pub topic: &'a str,
}

/// Prompt for one turn plus bookkeeping for logs and snapshots.
#[derive(Debug, Clone)]
pub struct TurnPrompt {
    pub messages: Vec<ChatMessage>,
    /// Number of memory entries rendered into the prompt.
    pub memories: usize,
    /// Number of history messages folded into a summary while assembling.
    pub summarized: Option<usize>,
}

/// Builds the prompt for a turn from history, memory and the topic.
pub struct ContextAssembler {
    window: HistoryWindow,
    retrieval: RetrievalConfig,
    memory: Option<Arc<MemoryGateway>>,
    summarizer: Arc<dyn Summarizer>,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(
        history: HistoryConfig,
        retrieval: RetrievalConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            window: HistoryWindow::with_config(history),
            retrieval,
            memory: None,
            summarizer,
        }
    }

    #[must_use]
    pub fn with_memory(mut self, memory: Arc<MemoryGateway>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Assemble the prompt for `request`.
    ///
    /// Fails only when `cancel` fires at one of the checkpoints. Memory
    /// failures degrade to an empty memory section.
    pub async fn assemble(
        &self,
        request: &TurnRequest<'_>,
        history: &History,
        cancel: &CancellationToken,
    ) -> Result<TurnPrompt, CancellationRequested> {
        let summarized = self.compact(history, cancel).await?;

        if cancel.is_cancelled() {
            return Err(CancellationRequested);
        }
        let recent = history.snapshot().await;
        let memories = self.retrieve(request, &recent, cancel).await?;
        let memory_section = self.render_memories(&memories);
        let memory_count = memory_section.as_ref().map_or(0, |(_, n)| *n);

        let agent = request.agent;
        let mut messages = Vec::new();
        messages.push(ChatMessage::system(Self::identity(agent, request.participants)));
        if let Some((section, _)) = memory_section {
            messages.push(ChatMessage::system(section));
        }
        messages.push(ChatMessage::system(format!("# Topic\n\n{}", request.topic)));

        for message in self.window.select_messages(&recent) {
            messages.push(Self::render_history(agent, &message));
        }

        messages.push(ChatMessage::system(format!(
            "Reply as {} with your next contribution to the discussion. \
             Stay in character, respond to what was said most recently, keep it to a few \
             sentences and do not prefix the reply with your name.",
            agent.name
        )));

        debug!(
            "Assembled prompt for {}: {} messages, {} memories",
            agent.name,
            messages.len(),
            memory_count
        );

        Ok(TurnPrompt {
            messages,
            memories: memory_count,
            summarized,
        })
    }

    /// Fold the oldest part of `history` into one summary message when the
    /// history is over budget. Returns the number of messages folded.
    pub async fn compact(
        &self,
        history: &History,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>, CancellationRequested> {
        let snapshot = history.snapshot().await;
        let total_chars: usize = snapshot.iter().map(|m| m.content.len()).sum();
        let Some(cut) = summarization_cut(snapshot.len(), total_chars, self.window.config()) else {
            return Ok(None);
        };

        let prefix = &snapshot[..cut];
        let text = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CancellationRequested),
            result = self.summarizer.summarize(prefix) => result.unwrap_or_else(|e| {
                warn!("Summarizer failed, using extractive summary: {e}");
                ExtractiveSummarizer::condense(prefix)
            }),
        };

        let ids: Vec<Uuid> = prefix.iter().map(|m| m.id).collect();
        if history.replace_prefix(&ids, Message::summary(text)).await {
            info!("Summarized {cut} of {} history messages", snapshot.len());
            Ok(Some(cut))
        } else {
            debug!("History changed during summarization, keeping it as is");
            Ok(None)
        }
    }

    async fn retrieve(
        &self,
        request: &TurnRequest<'_>,
        recent: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredMemory>, CancellationRequested> {
        let Some(memory) = self.memory.as_ref().filter(|_| self.retrieval.enabled) else {
            return Ok(Vec::new());
        };

        let query = Self::memory_query(request.topic, recent, self.retrieval.query_recent_messages);
        let agent_id = request.agent.name.as_str();
        let top_k = self.retrieval.top_k;

        let lookup = async {
            match memory
                .query(&query, Some(request.session_id), agent_id, top_k)
                .await
            {
                Ok(scoped) if scoped.is_empty() => {
                    debug!("No session memories for {agent_id}, widening to all sessions");
                    memory.query(&query, None, agent_id, top_k).await
                }
                other => other,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CancellationRequested),
            result = lookup => Ok(result.unwrap_or_else(|e| {
                warn!("Memory retrieval failed for {agent_id}, continuing without memory: {e}");
                Vec::new()
            })),
        }
    }

    fn memory_query(topic: &str, recent: &[Message], count: usize) -> String {
        let start = recent.len().saturating_sub(count);
        std::iter::once(topic)
            .chain(recent[start..].iter().map(|m| m.content.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Memory section, newest entries first, within the character budget.
    fn render_memories(&self, memories: &[ScoredMemory]) -> Option<(String, usize)> {
        if memories.is_empty() {
            return None;
        }

        let mut ordered: Vec<&ScoredMemory> = memories.iter().collect();
        ordered.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));

        let mut lines = String::new();
        let mut rendered = 0;
        for item in ordered {
            let line = format!("- [{}] {}\n", time_ago_since(item.entry.timestamp), item.entry.text);
            if rendered > 0 && lines.len() + line.len() > self.retrieval.context_target_length {
                break;
            }
            lines.push_str(&line);
            rendered += 1;
        }

        let section = format!(
            "# Relevant Memories\n\nThings you said or heard before, most recent first. \
             Prefer the most recent one when they conflict.\n\n{}",
            lines.trim_end()
        );
        Some((section, rendered))
    }

    fn identity(agent: &AgentProfile, participants: &[String]) -> String {
        let mut text = format!("You are {}. {}", agent.name, agent.personality.trim());
        let others: Vec<&str> = participants
            .iter()
            .map(String::as_str)
            .filter(|name| *name != agent.name)
            .collect();
        if !others.is_empty() {
            let _ = write!(
                text,
                "\n\nYou are taking part in a round-table discussion with {}.",
                others.join(", ")
            );
        }
        text
    }

    fn render_history(agent: &AgentProfile, message: &Message) -> ChatMessage {
        if message.is_summary() {
            ChatMessage::system(format!("# Earlier Discussion\n\n{}", message.content))
        } else if message.sender == agent.name {
            ChatMessage::assistant(message.content.clone())
        } else {
            ChatMessage::user(format!("{}: {}", message.sender, message.content))
        }
    }
}
