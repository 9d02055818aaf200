use crate::connection::SqliteStore;
use rusqlite::params;
use spaceduck_domain::model::{MemoryKind, MemoryRecord, MemoryScope, MemorySource, MemoryStatus};
use spaceduck_domain::Result;

/// Memory record persistence and recall (§4.10). The vector index itself
/// is out of scope (spec §1 names "the underlying SQLite engine and vector
/// extension" as an external collaborator) — recall does a linear cosine
/// scan over active records, which is correct and fine at the scale this
/// gateway runs at.
#[async_trait::async_trait]
pub trait MemoryRepository: Send + Sync + 'static {
    async fn insert_record(&self, record: &MemoryRecord) -> Result<()>;
    /// Atomically mark `old_id` superseded and insert `new_record`
    /// (its `supersedes` field should already point at `old_id`).
    async fn supersede(&self, old_id: &str, new_record: &MemoryRecord) -> Result<()>;
    async fn recall_textual(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>>;
    async fn recall_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<MemoryRecord>>;
}

#[async_trait::async_trait]
impl MemoryRepository for SqliteStore {
    async fn insert_record(&self, record: &MemoryRecord) -> Result<()> {
        let record = record.clone();
        self.run_blocking(move |conn| {
            conn.execute(&insert_sql(), record_params(&record))?;
            Ok(())
        })
        .await
    }

    async fn supersede(&self, old_id: &str, new_record: &MemoryRecord) -> Result<()> {
        let old_id = old_id.to_string();
        let new_record = new_record.clone();
        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE memory_records SET status = 'superseded' WHERE id = ?1",
                params![old_id],
            )?;
            tx.execute(&insert_sql(), record_params(&new_record))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn recall_textual(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let pattern = format!("%{}%", query.replace('%', "").replace('_', ""));
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, title, content, scope_json, source_conversation_id,
                        source_message_id, confidence, status, embedding_json, created_at, supersedes
                 FROM memory_records
                 WHERE status = 'active' AND (title LIKE ?1 OR content LIKE ?1)
                 ORDER BY created_at DESC LIMIT ?2",
            )?;
            stmt.query_map(params![pattern, limit as i64], row_to_record)?
                .collect()
        })
        .await
    }

    async fn recall_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<MemoryRecord>> {
        let embedding = embedding.to_vec();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, title, content, scope_json, source_conversation_id,
                        source_message_id, confidence, status, embedding_json, created_at, supersedes
                 FROM memory_records
                 WHERE status = 'active' AND embedding_json IS NOT NULL",
            )?;
            let mut scored: Vec<(f32, MemoryRecord)> = stmt
                .query_map([], row_to_record)?
                .filter_map(|r| r.ok())
                .filter_map(|record| {
                    let vec = record.embedding.as_ref()?;
                    Some((cosine_similarity(&embedding, vec), record))
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
        })
        .await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn insert_sql() -> String {
    "INSERT INTO memory_records
        (id, kind, title, content, scope_json, source_conversation_id, source_message_id,
         confidence, status, embedding_json, created_at, supersedes)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        .to_string()
}

fn record_params(record: &MemoryRecord) -> Vec<Box<dyn rusqlite::ToSql>> {
    let kind = kind_to_str(record.kind).to_string();
    let status = status_to_str(record.status).to_string();
    let scope_json = serde_json::to_string(&record.scope).unwrap_or_default();
    let embedding_json = record.embedding.as_ref().map(|e| serde_json::to_string(e).unwrap_or_default());
    vec![
        Box::new(record.id.clone()),
        Box::new(kind),
        Box::new(record.title.clone()),
        Box::new(record.content.clone()),
        Box::new(scope_json),
        Box::new(record.source.conversation_id.clone()),
        Box::new(record.source.message_id.clone()),
        Box::new(record.confidence),
        Box::new(status),
        Box::new(embedding_json),
        Box::new(record.created_at),
        Box::new(record.supersedes.clone()),
    ]
}

fn kind_to_str(kind: MemoryKind) -> &'static str {
    match kind {
        MemoryKind::Fact => "fact",
        MemoryKind::Preference => "preference",
        MemoryKind::Task => "task",
        MemoryKind::Other => "other",
    }
}

fn str_to_kind(s: &str) -> MemoryKind {
    match s {
        "fact" => MemoryKind::Fact,
        "preference" => MemoryKind::Preference,
        "task" => MemoryKind::Task,
        _ => MemoryKind::Other,
    }
}

fn status_to_str(status: MemoryStatus) -> &'static str {
    match status {
        MemoryStatus::Active => "active",
        MemoryStatus::Superseded => "superseded",
    }
}

fn str_to_status(s: &str) -> MemoryStatus {
    match s {
        "superseded" => MemoryStatus::Superseded,
        _ => MemoryStatus::Active,
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let kind_str: String = row.get(1)?;
    let scope_json: String = row.get(4)?;
    let status_str: String = row.get(8)?;
    let embedding_json: Option<String> = row.get(9)?;
    let scope: MemoryScope = serde_json::from_str(&scope_json).unwrap_or(MemoryScope::Global);
    let embedding = embedding_json.and_then(|j| serde_json::from_str(&j).ok());
    Ok(MemoryRecord {
        id: row.get(0)?,
        kind: str_to_kind(&kind_str),
        title: row.get(2)?,
        content: row.get(3)?,
        scope,
        source: MemorySource {
            conversation_id: row.get(5)?,
            message_id: row.get(6)?,
        },
        confidence: row.get(7)?,
        status: str_to_status(&status_str),
        embedding,
        created_at: row.get(10)?,
        supersedes: row.get(11)?,
    })
}
