//! Execution Engine
//!
//! Runs the stages the planner lowered a logical plan into. A stage is a
//! set of tasks plus a merge rule; the executor walks stages in reverse
//! topological order (leaves first), runs a stage's tasks concurrently,
//! merges their outputs, and feeds them to the next stage.
//!
//! Cancellation is cooperative: every task polls a shared token at
//! row-batch boundaries. The first task failure cancels the token, so
//! siblings unwind at their next poll, and the failure becomes the plan's
//! error.

pub mod knn;
pub mod scan;
pub mod transform;

use crate::catalog::Database;
use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::record::RecordSet;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rows processed between two cancellation polls.
pub const ROW_BATCH: u64 = 1024;

/// Cooperative cancellation shared by every task of one query.
///
/// Clones share state. A timeout is just cancellation with a deadline:
/// once the deadline passes, `check` reports the timeout kind and flips
/// the flag so siblings stop too.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    start: Instant,
    timeout: Option<Duration>,
}

impl CancellationToken {
    pub fn new(timeout: Option<Duration>) -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            start: Instant::now(),
            timeout,
        }
    }

    /// A token that only cancels explicitly.
    pub fn infinite() -> Self {
        CancellationToken::new(None)
    }

    /// Poll for cancellation or deadline expiry; called at row-batch
    /// boundaries.
    pub fn check(&self) -> QueryResult<()> {
        if let Some(timeout) = self.timeout {
            let elapsed = self.start.elapsed();
            if elapsed > timeout {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(QueryError::Timeout { timeout, elapsed });
            }
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(QueryError::Cancelled);
        }
        Ok(())
    }

    /// Cancel the query from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        CancellationToken::infinite()
    }
}

/// Everything a task needs at run time: the database context and the
/// query's cancellation token.
pub struct TaskContext<'a> {
    pub db: &'a Database,
    pub token: CancellationToken,
}

impl<'a> TaskContext<'a> {
    pub fn new(db: &'a Database, token: CancellationToken) -> Self {
        TaskContext { db, token }
    }

    /// Resolve a `schema.entity` reference.
    pub fn entity(&self, qualified: &str) -> QueryResult<Arc<Entity>> {
        let (schema, entity) = qualified.split_once('.').ok_or_else(|| QueryError::Bind(
            format!("entity reference {qualified} is not schema-qualified"),
        ))?;
        self.db.entity(schema, entity)
    }
}

/// One unit of execution. Tasks hold no state across executions; their
/// whole result is the returned record set.
pub trait Task: Send + Sync {
    /// Stable identity used in logs and error messages.
    fn id(&self) -> String;

    /// Estimated cost, assigned at lowering.
    fn cost(&self) -> f64 {
        0.0
    }

    /// Produce this task's output from its parents' merged outputs.
    fn execute(&self, ctx: &TaskContext<'_>, inputs: &[RecordSet]) -> QueryResult<RecordSet>;
}

/// How a stage's task outputs combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Single upstream, passed through.
    One,
    /// Outputs concatenated in task declaration order, per-task row order
    /// preserved.
    All,
}

/// Parallel tasks plus the rule for merging their outputs.
pub struct ExecutionStage {
    pub tasks: Vec<Box<dyn Task>>,
    pub merge: MergeRule,
}

impl ExecutionStage {
    pub fn single(task: Box<dyn Task>) -> Self {
        ExecutionStage {
            tasks: vec![task],
            merge: MergeRule::One,
        }
    }

    pub fn all(tasks: Vec<Box<dyn Task>>) -> Self {
        ExecutionStage {
            tasks,
            merge: MergeRule::All,
        }
    }
}

/// Stages in execution order (leaves first).
pub struct ExecutionPlan {
    pub stages: Vec<ExecutionStage>,
}

impl ExecutionPlan {
    /// Sum of all task cost estimates.
    pub fn total_cost(&self) -> f64 {
        self.stages
            .iter()
            .flat_map(|s| s.tasks.iter())
            .map(|t| t.cost())
            .sum()
    }

    /// Task ids per stage, for logs and tests.
    pub fn describe(&self) -> Vec<Vec<String>> {
        self.stages
            .iter()
            .map(|s| s.tasks.iter().map(|t| t.id()).collect())
            .collect()
    }
}

/// Drives an execution plan to completion.
pub struct Executor {
    pool: Option<rayon::ThreadPool>,
}

impl Executor {
    /// `num_threads = 0` uses the global rayon pool (all cores).
    pub fn new(num_threads: usize) -> QueryResult<Executor> {
        let pool = if num_threads == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| QueryError::Execution(e.to_string()))?,
            )
        };
        Ok(Executor { pool })
    }

    /// Run all stages, returning the final stage's merged output.
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &TaskContext<'_>,
    ) -> QueryResult<RecordSet> {
        let mut current: Vec<RecordSet> = Vec::new();
        for stage in &plan.stages {
            ctx.token.check()?;
            let outputs = self.run_stage(stage, ctx, &current)?;
            current = match stage.merge {
                MergeRule::One => outputs,
                MergeRule::All => {
                    let mut merged: Option<RecordSet> = None;
                    for rs in outputs {
                        match merged.as_mut() {
                            None => merged = Some(rs),
                            Some(acc) => acc
                                .extend(rs)
                                .map_err(|e| QueryError::Execution(e.to_string()))?,
                        }
                    }
                    merged.into_iter().collect()
                }
            };
        }
        current
            .pop()
            .ok_or_else(|| QueryError::Execution("plan produced no output".into()))
    }

    fn run_stage(
        &self,
        stage: &ExecutionStage,
        ctx: &TaskContext<'_>,
        inputs: &[RecordSet],
    ) -> QueryResult<Vec<RecordSet>> {
        let results: Vec<(String, QueryResult<RecordSet>)> = if stage.tasks.len() == 1 {
            let task = &stage.tasks[0];
            vec![(task.id(), task.execute(ctx, inputs))]
        } else {
            let body = || {
                stage
                    .tasks
                    .par_iter()
                    .map(|task| {
                        let result = task.execute(ctx, inputs);
                        if result.is_err() {
                            // Fail fast: siblings observe the token at
                            // their next batch boundary
                            ctx.token.cancel();
                        }
                        (task.id(), result)
                    })
                    .collect()
            };
            match &self.pool {
                Some(pool) => pool.install(body),
                None => body(),
            }
        };

        let mut outputs = Vec::with_capacity(results.len());
        let mut first_error: Option<QueryError> = None;
        for (id, result) in results {
            match result {
                Ok(rs) => outputs.push(rs),
                Err(err) => {
                    tracing::warn!(task = %id, error = %err, "task failed");
                    // A root-cause failure outranks the cancellations it
                    // triggered in siblings
                    let replace = match &first_error {
                        None => true,
                        Some(QueryError::Cancelled) => !matches!(err, QueryError::Cancelled),
                        Some(_) => false,
                    };
                    if replace {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }
}
