use spaceduck_domain::model::MemoryRecord;

/// Render recalled memory records as the single system block inserted
/// between the system prompt and the conversation tail.
pub fn format_memory_hints(hints: &[MemoryRecord]) -> String {
    let mut out = String::from("=== MEMORY ===\n");
    for hint in hints {
        out.push_str(&format!("- [{:?}] {}: {}\n", hint.kind, hint.title, hint.content));
    }
    out.push_str("=== END_MEMORY ===");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaceduck_domain::model::{MemoryKind, MemoryScope, MemorySource};

    #[test]
    fn formats_each_hint_as_a_bullet() {
        let source = MemorySource {
            conversation_id: "c1".into(),
            message_id: "m1".into(),
        };
        let hint = MemoryRecord::new(
            MemoryKind::Fact,
            "timezone",
            "user is in UTC+2",
            MemoryScope::Global,
            source,
            0.9,
        );
        let block = format_memory_hints(&[hint]);
        assert!(block.starts_with("=== MEMORY ==="));
        assert!(block.ends_with("=== END_MEMORY ==="));
        assert!(block.contains("user is in UTC+2"));
    }
}
