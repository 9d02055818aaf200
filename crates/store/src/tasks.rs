use crate::connection::SqliteStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use spaceduck_domain::model::{TaskRecord, TaskRun, TaskStatus};
use spaceduck_domain::Result;

/// Task and task-run persistence (§4.12). `cas_status` is the mechanism
/// the scheduler uses to guarantee at most one worker moves a task from
/// `scheduled` to `running` — a plain `UPDATE ... WHERE status = ?`
/// whose affected-row count tells the caller whether it won the race.
#[async_trait::async_trait]
pub trait TaskRepository: Send + Sync + 'static {
    async fn insert_task(&self, task: &TaskRecord) -> Result<()>;
    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>>;
    async fn list_tasks(&self, status_filter: Option<TaskStatus>) -> Result<Vec<TaskRecord>>;
    async fn update_task(&self, task: &TaskRecord) -> Result<()>;
    /// Atomically transition `id` from `expected` to `new`. Returns
    /// `true` if this call performed the transition, `false` if another
    /// caller already moved it (or it wasn't in `expected`).
    async fn cas_status(&self, id: &str, expected: TaskStatus, new: TaskStatus) -> Result<bool>;

    async fn insert_run(&self, run: &TaskRun) -> Result<()>;
    async fn finish_run(&self, run: &TaskRun) -> Result<()>;
    async fn list_runs(&self, task_id: &str) -> Result<Vec<TaskRun>>;
    /// Sum of `cost_usd` across all runs that started at or after `cutoff`,
    /// for the scheduler's daily/monthly spend guard.
    async fn sum_spend_since(&self, cutoff: DateTime<Utc>) -> Result<f64>;
}

#[async_trait::async_trait]
impl TaskRepository for SqliteStore {
    async fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        let task = task.clone();
        self.run_blocking(move |conn| {
            conn.execute(&task_insert_sql(), task_params(&task))?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT id, definition_json, schedule_json, budget_json, status,
                        next_run_at, retry_count, max_attempts, created_at
                 FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()
        })
        .await
    }

    async fn list_tasks(&self, status_filter: Option<TaskStatus>) -> Result<Vec<TaskRecord>> {
        self.run_blocking(move |conn| match status_filter {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, definition_json, schedule_json, budget_json, status,
                            next_run_at, retry_count, max_attempts, created_at
                     FROM tasks WHERE status = ?1 ORDER BY next_run_at ASC",
                )?;
                stmt.query_map(params![status_to_str(status)], row_to_task)?.collect()
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, definition_json, schedule_json, budget_json, status,
                            next_run_at, retry_count, max_attempts, created_at
                     FROM tasks ORDER BY next_run_at ASC",
                )?;
                stmt.query_map([], row_to_task)?.collect()
            }
        })
        .await
    }

    async fn update_task(&self, task: &TaskRecord) -> Result<()> {
        let task = task.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE tasks SET definition_json = ?1, schedule_json = ?2, budget_json = ?3,
                    status = ?4, next_run_at = ?5, retry_count = ?6, max_attempts = ?7
                 WHERE id = ?8",
                params![
                    serde_json::to_string(&task.definition).unwrap_or_default(),
                    serde_json::to_string(&task.schedule).unwrap_or_default(),
                    serde_json::to_string(&task.budget).unwrap_or_default(),
                    status_to_str(task.status),
                    task.next_run_at,
                    task.retry_count,
                    task.max_attempts,
                    task.id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn cas_status(&self, id: &str, expected: TaskStatus, new: TaskStatus) -> Result<bool> {
        let id = id.to_string();
        let affected = self
            .run_blocking(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![status_to_str(new), id, status_to_str(expected)],
                )
            })
            .await?;
        Ok(affected == 1)
    }

    async fn insert_run(&self, run: &TaskRun) -> Result<()> {
        let run = run.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO task_runs
                    (id, task_id, started_at, finished_at, ok, tokens_used, cost_usd,
                     tool_calls_used, memory_writes_used, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                run_params(&run),
            )?;
            Ok(())
        })
        .await
    }

    async fn finish_run(&self, run: &TaskRun) -> Result<()> {
        let run = run.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE task_runs SET finished_at = ?1, ok = ?2, tokens_used = ?3, cost_usd = ?4,
                    tool_calls_used = ?5, memory_writes_used = ?6, error = ?7
                 WHERE id = ?8",
                params![
                    run.finished_at,
                    run.ok,
                    run.tokens_used,
                    run.cost_usd,
                    run.tool_calls_used,
                    run.memory_writes_used,
                    run.error,
                    run.id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_runs(&self, task_id: &str) -> Result<Vec<TaskRun>> {
        let task_id = task_id.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, started_at, finished_at, ok, tokens_used, cost_usd,
                        tool_calls_used, memory_writes_used, error
                 FROM task_runs WHERE task_id = ?1 ORDER BY started_at DESC",
            )?;
            stmt.query_map(params![task_id], row_to_run)?.collect()
        })
        .await
    }

    async fn sum_spend_since(&self, cutoff: DateTime<Utc>) -> Result<f64> {
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(cost_usd), 0.0) FROM task_runs WHERE started_at >= ?1",
                params![cutoff],
                |row| row.get(0),
            )
        })
        .await
    }
}

fn task_insert_sql() -> String {
    "INSERT INTO tasks
        (id, definition_json, schedule_json, budget_json, status, next_run_at,
         retry_count, max_attempts, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        .to_string()
}

fn task_params(task: &TaskRecord) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(task.id.clone()),
        Box::new(serde_json::to_string(&task.definition).unwrap_or_default()),
        Box::new(serde_json::to_string(&task.schedule).unwrap_or_default()),
        Box::new(serde_json::to_string(&task.budget).unwrap_or_default()),
        Box::new(status_to_str(task.status).to_string()),
        Box::new(task.next_run_at),
        Box::new(task.retry_count),
        Box::new(task.max_attempts),
        Box::new(task.created_at),
    ]
}

fn run_params(run: &TaskRun) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(run.id.clone()),
        Box::new(run.task_id.clone()),
        Box::new(run.started_at),
        Box::new(run.finished_at),
        Box::new(run.ok),
        Box::new(run.tokens_used),
        Box::new(run.cost_usd),
        Box::new(run.tool_calls_used),
        Box::new(run.memory_writes_used),
        Box::new(run.error.clone()),
    ]
}

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Scheduled => "scheduled",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::DeadLetter => "dead_letter",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn str_to_status(s: &str) -> TaskStatus {
    match s {
        "scheduled" => TaskStatus::Scheduled,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "dead_letter" => TaskStatus::DeadLetter,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
    let definition_json: String = row.get(1)?;
    let schedule_json: String = row.get(2)?;
    let budget_json: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        definition: serde_json::from_str(&definition_json).unwrap_or(spaceduck_domain::model::TaskDefinition {
            prompt: String::new(),
            tool_allow_list: Vec::new(),
            conversation_id: None,
        }),
        schedule: serde_json::from_str(&schedule_json).unwrap_or(spaceduck_domain::model::TaskSchedule::OneShot),
        budget: serde_json::from_str(&budget_json).unwrap_or(spaceduck_domain::model::TaskBudget {
            max_tokens: None,
            max_cost_usd: None,
            max_wall_clock_ms: None,
            max_tool_calls: None,
            max_memory_writes: None,
        }),
        status: str_to_status(&status_str),
        next_run_at: row.get(5)?,
        retry_count: row.get(6)?,
        max_attempts: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<TaskRun> {
    Ok(TaskRun {
        id: row.get(0)?,
        task_id: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        ok: row.get(4)?,
        tokens_used: row.get(5)?,
        cost_usd: row.get(6)?,
        tool_calls_used: row.get(7)?,
        memory_writes_used: row.get(8)?,
        error: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaceduck_domain::model::{TaskBudget, TaskDefinition, TaskSchedule};

    fn sample_task(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            definition: TaskDefinition {
                prompt: "summarize today's calendar".into(),
                tool_allow_list: vec![],
                conversation_id: None,
            },
            schedule: TaskSchedule::OneShot,
            budget: TaskBudget {
                max_tokens: Some(10_000),
                max_cost_usd: Some(0.50),
                max_wall_clock_ms: None,
                max_tool_calls: None,
                max_memory_writes: None,
            },
            status,
            next_run_at: Some(Utc::now()),
            retry_count: 0,
            max_attempts: 3,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cas_status_succeeds_exactly_once() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let task = sample_task(TaskStatus::Scheduled);
        store.insert_task(&task).await.unwrap();

        let first = store
            .cas_status(&task.id, TaskStatus::Scheduled, TaskStatus::Running)
            .await
            .unwrap();
        let second = store
            .cas_status(&task.id, TaskStatus::Scheduled, TaskStatus::Running)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let reloaded = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn sum_spend_since_counts_only_recent_runs() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let task = sample_task(TaskStatus::Completed);
        store.insert_task(&task).await.unwrap();

        let old_run = TaskRun {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            started_at: Utc::now() - chrono::Duration::days(2),
            finished_at: None,
            ok: true,
            tokens_used: 100,
            cost_usd: 1.0,
            tool_calls_used: 0,
            memory_writes_used: 0,
            error: None,
        };
        let recent_run = TaskRun {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            cost_usd: 0.25,
            ..old_run.clone()
        };
        store.insert_run(&old_run).await.unwrap();
        store.insert_run(&recent_run).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let total = store.sum_spend_since(cutoff).await.unwrap();
        assert!((total - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn list_tasks_filters_by_status() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        store.insert_task(&sample_task(TaskStatus::Scheduled)).await.unwrap();
        store.insert_task(&sample_task(TaskStatus::Completed)).await.unwrap();

        let scheduled = store.list_tasks(Some(TaskStatus::Scheduled)).await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].status, TaskStatus::Scheduled);

        let all = store.list_tasks(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
