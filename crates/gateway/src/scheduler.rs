//! Task Scheduler (C12, §4.12): a background loop that polls for due
//! tasks, runs each through the same [`crate::agent::AgentLoop`] every
//! other caller uses, and tracks spend/attempts per run. Grounded on the
//! teacher's runner tick shape (`runtime/schedules.rs`: poll on a fixed
//! heartbeat, compute the next occurrence, reschedule or dead-letter on
//! failure) with the teacher's in-memory `QuotaTracker` dropped in favor
//! of `TaskRepository::sum_spend_since`, which already gives an exact
//! answer without a process-lifetime cache to keep in sync.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spaceduck_domain::config::{ModelPricing, SchedulerConfig};
use spaceduck_domain::model::{TaskBudget, TaskRecord, TaskRun, TaskSchedule, TaskStatus};
use spaceduck_domain::Result;
use spaceduck_providers::SwappableEmbeddingProvider;
use spaceduck_store::SqliteStore;

use crate::agent::{AgentLoop, TurnEvent};
use crate::cron;
use crate::run_lock::RunLock;
use crate::store_seam::GatewayConversationStore;

/// Spend guard outcome for one tick (§4.12 step 1).
enum BudgetGate {
    Open,
    Paused { reason: String },
}

pub struct TaskScheduler {
    store: Arc<SqliteStore>,
    embedding: Arc<SwappableEmbeddingProvider>,
    agent: Arc<AgentLoop>,
    run_lock: Arc<RunLock>,
    config: SchedulerConfig,
    system_prompt: String,
    /// The model name priced against `pricing` — fixed at boot like the
    /// rest of this struct's config snapshot; a model swapped in later
    /// via `PATCH /api/config` prices at $0 until the next restart, same
    /// as every other `/ai/*` field the scheduler doesn't re-read live.
    model: String,
    pricing: std::collections::HashMap<String, ModelPricing>,
    next_holder: std::sync::atomic::AtomicU64,
}

impl TaskScheduler {
    pub fn new(
        store: Arc<SqliteStore>,
        embedding: Arc<SwappableEmbeddingProvider>,
        agent: Arc<AgentLoop>,
        run_lock: Arc<RunLock>,
        config: SchedulerConfig,
        system_prompt: String,
        model: String,
        pricing: std::collections::HashMap<String, ModelPricing>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            embedding,
            agent,
            run_lock,
            config,
            system_prompt,
            model,
            pricing,
            next_holder: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Runs until the process exits. Spawned once from `bootstrap::build_app_state`.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                tracing::warn!(error = %e, "scheduler tick failed");
            }
        }
    }

    /// One heartbeat: apply the global spend guard, then run every task
    /// that is `scheduled` and due, up to `max_concurrent_tasks` at once.
    async fn tick(self: &Arc<Self>) -> Result<()> {
        if let BudgetGate::Paused { reason } = self.budget_gate().await? {
            tracing::warn!(reason, "scheduler paused: global spend limit reached");
            return Ok(());
        }

        let due: Vec<TaskRecord> = spaceduck_store::TaskRepository::list_tasks(self.store.as_ref(), Some(TaskStatus::Scheduled))
            .await?
            .into_iter()
            .filter(|t| t.next_run_at.map(|at| at <= Utc::now()).unwrap_or(true))
            .take(self.config.max_concurrent_tasks as usize)
            .collect();

        let mut handles = Vec::with_capacity(due.len());
        for task in due {
            let this = self.clone();
            handles.push(tokio::spawn(async move { this.run_one(task).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduled task runner panicked");
            }
        }
        Ok(())
    }

    /// §4.12 step 1: the scheduler is paused as a whole once today's (or
    /// this month's) spend crosses the configured ceiling. Tasks already
    /// `running` are left to finish; no new task is started.
    async fn budget_gate(&self) -> Result<BudgetGate> {
        if let Some(limit) = self.config.budget.daily_limit_usd {
            let since = Utc::now() - chrono::Duration::hours(24);
            let spent = spaceduck_store::TaskRepository::sum_spend_since(self.store.as_ref(), since).await?;
            if spent >= limit {
                return Ok(BudgetGate::Paused { reason: format!("daily spend ${spent:.2} >= limit ${limit:.2}") });
            }
        }
        if let Some(limit) = self.config.budget.monthly_limit_usd {
            let since = Utc::now() - chrono::Duration::days(30);
            let spent = spaceduck_store::TaskRepository::sum_spend_since(self.store.as_ref(), since).await?;
            if spent >= limit {
                return Ok(BudgetGate::Paused { reason: format!("monthly spend ${spent:.2} >= limit ${limit:.2}") });
            }
        }
        Ok(BudgetGate::Open)
    }

    /// §4.12 steps 2-7 for a single task.
    async fn run_one(self: &Arc<Self>, mut task: TaskRecord) {
        let won = spaceduck_store::TaskRepository::cas_status(self.store.as_ref(), &task.id, TaskStatus::Scheduled, TaskStatus::Running)
            .await
            .unwrap_or(false);
        if !won {
            return;
        }
        task.status = TaskStatus::Running;

        let conversation_id = task.definition.conversation_id.clone().unwrap_or_else(|| format!("task:{}", task.id));
        let holder = self.next_holder.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let guard = match self.run_lock.acquire(&conversation_id, holder).await {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "could not acquire run lock for scheduled task");
                let _ = spaceduck_store::TaskRepository::cas_status(self.store.as_ref(), &task.id, TaskStatus::Running, TaskStatus::Scheduled).await;
                return;
            }
        };

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let outcome = self.execute_run(&task, &conversation_id).await;
        guard.release();

        let (ok, tokens_used, cost_usd, tool_calls_used, error) = match &outcome {
            Ok(usage) => (true, usage.tokens, usage.cost_usd, usage.tool_calls, None),
            Err((usage, message)) => (false, usage.tokens, usage.cost_usd, usage.tool_calls, Some(message.clone())),
        };

        let run = TaskRun {
            id: run_id,
            task_id: task.id.clone(),
            started_at,
            finished_at: Some(Utc::now()),
            ok,
            tokens_used,
            cost_usd,
            tool_calls_used,
            memory_writes_used: 0,
            error,
        };
        if let Err(e) = spaceduck_store::TaskRepository::insert_run(self.store.as_ref(), &run).await {
            tracing::warn!(task_id = task.id, error = %e, "failed to record task run");
        }

        self.reschedule(task, ok).await;
    }

    async fn execute_run(&self, task: &TaskRecord, conversation_id: &str) -> std::result::Result<RunUsage, (RunUsage, String)> {
        let store_seam = GatewayConversationStore::new(self.store.clone(), self.embedding.clone());
        let mut usage = RunUsage::default();
        let budget = task.budget.clone();
        let wall_clock = budget.max_wall_clock_ms.map(Duration::from_millis);

        let turn = self.agent.run_turn_scoped(
            &store_seam,
            conversation_id,
            &self.system_prompt,
            &task.definition.prompt,
            None,
            &task.definition.tool_allow_list,
            |event| match event {
                TurnEvent::ToolCallStarted { .. } => usage.tool_calls += 1,
                TurnEvent::Usage(u) => {
                    usage.tokens += u.total_tokens as u64;
                    usage.cost_usd += self.estimate_cost(&u);
                }
                TurnEvent::Delta(_) | TurnEvent::ToolResult { .. } => {}
            },
        );

        let result = match wall_clock {
            Some(limit) => match tokio::time::timeout(limit, turn).await {
                Ok(inner) => inner,
                Err(_) => return Err((usage, format!("exceeded maxWallClockMs ({} ms)", limit.as_millis()))),
            },
            None => turn.await,
        };

        if let Some(max_tokens) = budget.max_tokens {
            if usage.tokens > max_tokens {
                return Err((usage, format!("exceeded maxTokens ({max_tokens})")));
            }
        }
        if let Some(max_cost) = budget.max_cost_usd {
            if usage.cost_usd > max_cost {
                return Err((usage, format!("exceeded maxCostUsd (${max_cost:.2})")));
            }
        }
        if let Some(max_tool_calls) = budget.max_tool_calls {
            if usage.tool_calls > max_tool_calls {
                return Err((usage, format!("exceeded maxToolCalls ({max_tool_calls})")));
            }
        }

        match result {
            Ok(_message) => Ok(usage),
            Err(e) => Err((usage, e.to_string())),
        }
    }

    fn estimate_cost(&self, usage: &spaceduck_domain::stream::Usage) -> f64 {
        self.pricing
            .get(&self.model)
            .map(|p| p.estimate_cost(usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or(0.0)
    }

    /// §4.12 steps 5-6: compute the next state from `schedule`/outcome.
    async fn reschedule(&self, mut task: TaskRecord, ok: bool) {
        if ok {
            task.retry_count = 0;
            match &task.schedule {
                TaskSchedule::OneShot => {
                    task.status = TaskStatus::Completed;
                    task.next_run_at = None;
                }
                TaskSchedule::Interval { every_ms } => {
                    task.status = TaskStatus::Scheduled;
                    task.next_run_at = Some(Utc::now() + chrono::Duration::milliseconds(*every_ms as i64));
                }
                TaskSchedule::Cron { expr } => {
                    task.status = TaskStatus::Scheduled;
                    task.next_run_at = cron::next(expr, &Utc::now());
                    if task.next_run_at.is_none() {
                        tracing::warn!(task_id = task.id, expr, "cron expression has no future occurrence; dead-lettering");
                        task.status = TaskStatus::DeadLetter;
                    }
                }
            }
        } else {
            task.retry_count += 1;
            if task.retry_count >= task.max_attempts {
                task.status = TaskStatus::DeadLetter;
                task.next_run_at = None;
            } else {
                let backoff_ms = (self.config.backoff_base_ms.saturating_mul(1u64 << task.retry_count.min(20)))
                    .min(self.config.backoff_max_ms);
                task.status = TaskStatus::Scheduled;
                task.next_run_at = Some(Utc::now() + chrono::Duration::milliseconds(backoff_ms as i64));
            }
        }

        if let Err(e) = spaceduck_store::TaskRepository::update_task(self.store.as_ref(), &task).await {
            tracing::warn!(task_id = task.id, error = %e, "failed to persist task reschedule");
        }
    }

    /// Validate and register a new task (`POST /api/tasks`), defaulting
    /// its retry ceiling from `SchedulerConfig` when the caller didn't
    /// name one.
    pub async fn create_task(
        &self,
        definition: spaceduck_domain::model::TaskDefinition,
        schedule: TaskSchedule,
        budget: TaskBudget,
        max_attempts: Option<u32>,
    ) -> Result<TaskRecord> {
        if let TaskSchedule::Cron { expr } = &schedule {
            cron::validate(expr).map_err(spaceduck_domain::error::Error::Validation)?;
        }

        let next_run_at = match &schedule {
            TaskSchedule::OneShot => Some(Utc::now()),
            TaskSchedule::Interval { .. } => Some(Utc::now()),
            TaskSchedule::Cron { expr } => cron::next(expr, &Utc::now()),
        };
        let task = TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            definition,
            schedule,
            budget,
            status: TaskStatus::Scheduled,
            next_run_at,
            retry_count: 0,
            max_attempts: max_attempts.unwrap_or(self.config.default_max_attempts),
            created_at: Utc::now(),
        };
        spaceduck_store::TaskRepository::insert_task(self.store.as_ref(), &task).await?;
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        spaceduck_store::TaskRepository::get_task(self.store.as_ref(), id).await
    }

    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<TaskRecord>> {
        spaceduck_store::TaskRepository::list_tasks(self.store.as_ref(), status).await
    }

    pub async fn list_runs(&self, task_id: &str) -> Result<Vec<TaskRun>> {
        spaceduck_store::TaskRepository::list_runs(self.store.as_ref(), task_id).await
    }

    /// Current daily/monthly spend against the configured ceilings, for
    /// `GET /api/tasks/budget`.
    pub async fn budget_status(&self) -> Result<BudgetStatus> {
        let daily = spaceduck_store::TaskRepository::sum_spend_since(self.store.as_ref(), Utc::now() - chrono::Duration::hours(24)).await?;
        let monthly = spaceduck_store::TaskRepository::sum_spend_since(self.store.as_ref(), Utc::now() - chrono::Duration::days(30)).await?;
        Ok(BudgetStatus {
            daily_spend_usd: daily,
            daily_limit_usd: self.config.budget.daily_limit_usd,
            monthly_spend_usd: monthly,
            monthly_limit_usd: self.config.budget.monthly_limit_usd,
        })
    }

    /// `DELETE /api/tasks/:id`: cancel a task that hasn't finished yet.
    /// A `running` task is left alone — cancellation isn't preemptive
    /// until the agent loop carries a cancellation token (tracked as an
    /// open item, not handled here).
    pub async fn cancel_task(&self, id: &str) -> Result<bool> {
        match self.get_task(id).await? {
            Some(mut task) if !matches!(task.status, TaskStatus::Running) => {
                task.status = TaskStatus::Cancelled;
                task.next_run_at = None;
                spaceduck_store::TaskRepository::update_task(self.store.as_ref(), &task).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    /// `POST /api/tasks/:id/retry`: only valid from `failed`/`dead_letter`.
    pub async fn retry_task(&self, id: &str) -> Result<bool> {
        match self.get_task(id).await? {
            Some(mut task) if matches!(task.status, TaskStatus::Failed | TaskStatus::DeadLetter) => {
                task.retry_count = 0;
                task.status = TaskStatus::Scheduled;
                task.next_run_at = Some(Utc::now());
                spaceduck_store::TaskRepository::update_task(self.store.as_ref(), &task).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default, Clone, Copy)]
struct RunUsage {
    tokens: u64,
    cost_usd: f64,
    tool_calls: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    pub daily_spend_usd: f64,
    pub daily_limit_usd: Option<f64>,
    pub monthly_spend_usd: f64,
    pub monthly_limit_usd: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let config = SchedulerConfig::default();
        let base = config.backoff_base_ms;
        let uncapped = base.saturating_mul(1u64 << 1u32.min(20));
        assert_eq!(uncapped, base * 2);
        let capped = base.saturating_mul(1u64 << 30u32.min(20)).min(config.backoff_max_ms);
        assert_eq!(capped, config.backoff_max_ms);
    }
}
