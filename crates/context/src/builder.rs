use crate::injection;
use crate::report::{ContextReport, MessageReport};
use crate::truncation::{self, Section};
use spaceduck_domain::model::{ConversationMessage, MemoryRecord};
use spaceduck_domain::tool::Message;

/// Deterministic context pack builder for one agent turn (§4.6 step 2).
///
/// Pure function: given the system prompt, the memory records recalled
/// for this turn, and the conversation's message log, assembles the
/// provider-facing message sequence
/// `[systemPrompt, ...memoryHints, ...conversationTail]` plus a
/// machine-readable report of what was truncated to make it fit.
pub struct ContextBuilder {
    /// How many of the most recent conversation messages to include.
    pub max_tail_messages: usize,
    /// Per-message char cap, applied before the total cap.
    pub max_chars_per_message: usize,
    /// Total char cap across the whole tail.
    pub total_max_chars: usize,
}

impl ContextBuilder {
    pub fn new(max_tail_messages: usize, max_chars_per_message: usize, total_max_chars: usize) -> Self {
        Self {
            max_tail_messages,
            max_chars_per_message,
            total_max_chars,
        }
    }

    pub fn build(
        &self,
        system_prompt: &str,
        memory_hints: &[MemoryRecord],
        history: &[ConversationMessage],
    ) -> (Vec<Message>, ContextReport) {
        let mut messages = vec![Message::system(system_prompt)];

        let memory_block = if memory_hints.is_empty() {
            None
        } else {
            Some(injection::format_memory_hints(memory_hints))
        };
        let memory_hint_chars = memory_block.as_ref().map(|b| b.len()).unwrap_or(0);
        if let Some(block) = &memory_block {
            messages.push(Message::system(block.clone()));
        }

        let tail_start = history.len().saturating_sub(self.max_tail_messages);
        let tail = &history[tail_start..];

        let mut sections: Vec<Section> = tail
            .iter()
            .map(|m| {
                let (content, truncated) = truncation::truncate_per_message(&m.text, self.max_chars_per_message);
                Section {
                    label: m.id.clone(),
                    raw_chars: m.text.len(),
                    content,
                    truncated_per_message: truncated,
                    truncated_total_cap: false,
                    included: true,
                }
            })
            .collect();

        truncation::apply_total_cap(&mut sections, self.total_max_chars);

        let mut tail_reports = Vec::with_capacity(sections.len());
        for (section, msg) in sections.iter().zip(tail.iter()) {
            tail_reports.push(MessageReport {
                message_id: msg.id.clone(),
                raw_chars: section.raw_chars,
                injected_chars: if section.included { section.content.len() } else { 0 },
                truncated_per_message: section.truncated_per_message,
                truncated_total_cap: section.truncated_total_cap,
                included: section.included,
            });
            if section.included {
                messages.push(Message {
                    role: msg.role,
                    content: spaceduck_domain::tool::MessageContent::Text(section.content.clone()),
                });
            }
        }

        let total_injected_chars = memory_hint_chars
            + tail_reports
                .iter()
                .map(|r| r.injected_chars)
                .sum::<usize>();

        let report = ContextReport {
            tail: tail_reports,
            memory_hint_count: memory_hints.len(),
            memory_hint_chars,
            total_injected_chars,
        };

        (messages, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaceduck_domain::model::{MemoryKind, MemoryScope, MemorySource};
    use spaceduck_domain::tool::Role;

    fn msg(text: &str) -> ConversationMessage {
        ConversationMessage::new("c1", Role::User, text)
    }

    #[test]
    fn assembles_system_prompt_then_tail_with_no_memory() {
        let builder = ContextBuilder::new(10, 1000, 10_000);
        let history = vec![msg("hi"), msg("how are you")];
        let (messages, report) = builder.build("be helpful", &[], &history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content.text(), Some("be helpful"));
        assert_eq!(report.memory_hint_count, 0);
        assert_eq!(report.tail.len(), 2);
    }

    #[test]
    fn inserts_memory_hints_between_system_prompt_and_tail() {
        let builder = ContextBuilder::new(10, 1000, 10_000);
        let source = MemorySource {
            conversation_id: "c1".into(),
            message_id: "m1".into(),
        };
        let hint = MemoryRecord::new(MemoryKind::Fact, "name", "user is Dana", MemoryScope::Global, source, 0.8);
        let history = vec![msg("hi")];
        let (messages, report) = builder.build("sys", &[hint], &history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.text().unwrap().contains("user is Dana"));
        assert_eq!(report.memory_hint_count, 1);
    }

    #[test]
    fn caps_tail_to_max_tail_messages() {
        let builder = ContextBuilder::new(2, 1000, 10_000);
        let history: Vec<_> = (0..5).map(|i| msg(&format!("msg {i}"))).collect();
        let (messages, report) = builder.build("sys", &[], &history);
        // system + 2 tail messages
        assert_eq!(messages.len(), 3);
        assert_eq!(report.tail.len(), 2);
        assert_eq!(messages[1].content.text(), Some("msg 3"));
        assert_eq!(messages[2].content.text(), Some("msg 4"));
    }

    #[test]
    fn drops_messages_that_overflow_the_total_cap() {
        let builder = ContextBuilder::new(10, 1000, 5);
        let history = vec![msg("aaaaa"), msg("bbbbb")];
        let (_, report) = builder.build("sys", &[], &history);
        assert!(report.tail[0].included);
        assert!(!report.tail[1].included);
    }
}
