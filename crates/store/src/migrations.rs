use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

pub(crate) fn apply(conn: &mut Connection) -> rusqlite::Result<()> {
    let migrations = Migrations::new(vec![M::up(
        r#"
        CREATE TABLE IF NOT EXISTS gateway_settings (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pairing_sessions (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            used_at TEXT
        );

        CREATE TABLE IF NOT EXISTS tokens (
            id TEXT PRIMARY KEY,
            token_hash BLOB NOT NULL,
            device_name TEXT,
            created_at TEXT NOT NULL,
            last_used_at TEXT,
            revoked_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tokens_hash ON tokens(token_hash);

        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            title TEXT,
            created_at TEXT NOT NULL,
            last_active_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            request_id TEXT,
            attachments_json TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS sessions (
            channel TEXT NOT NULL,
            sender TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (channel, sender),
            FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS attachments (
            id TEXT PRIMARY KEY,
            local_path TEXT NOT NULL,
            filename TEXT NOT NULL,
            mime TEXT NOT NULL,
            size INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memory_records (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            scope_json TEXT NOT NULL,
            source_conversation_id TEXT NOT NULL,
            source_message_id TEXT NOT NULL,
            confidence REAL NOT NULL,
            status TEXT NOT NULL,
            embedding_json TEXT,
            created_at TEXT NOT NULL,
            supersedes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_memory_status ON memory_records(status);

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            definition_json TEXT NOT NULL,
            schedule_json TEXT NOT NULL,
            budget_json TEXT NOT NULL,
            status TEXT NOT NULL,
            next_run_at TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status_next_run ON tasks(status, next_run_at);

        CREATE TABLE IF NOT EXISTS task_runs (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            ok INTEGER NOT NULL DEFAULT 0,
            tokens_used INTEGER NOT NULL DEFAULT 0,
            cost_usd REAL NOT NULL DEFAULT 0,
            tool_calls_used INTEGER NOT NULL DEFAULT 0,
            memory_writes_used INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            FOREIGN KEY(task_id) REFERENCES tasks(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_task_runs_started ON task_runs(started_at);
        "#,
    )]);

    migrations.to_latest(conn).map_err(|e| {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
            Some(format!("migration failed: {e}")),
        )
    })
}
