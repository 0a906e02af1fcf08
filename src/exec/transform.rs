//! Transform Tasks
//!
//! Tasks that reshape an upstream record set: re-attaching entity columns
//! by tuple id (fetch), boolean filtering, projection and aggregation,
//! and limit/skip. Each consumes its single upstream output and produces
//! a fresh record set.

use super::{Task, TaskContext, ROW_BATCH};
use crate::error::{QueryError, QueryResult};
use crate::query::{Predicate, ProjectionField, ProjectionKind};
use crate::record::RecordSet;

fn single_input<'a>(inputs: &'a [RecordSet], id: &str) -> QueryResult<&'a RecordSet> {
    inputs
        .first()
        .ok_or_else(|| QueryError::Execution(format!("task {id} has no upstream output")))
}

/// Re-attach entity columns to an intermediate result by tuple id.
///
/// The fetched columns come first in the output schema, followed by the
/// upstream's columns (duplicates dropped); rows keep the upstream order.
pub struct FetchTask {
    pub entity: String,
    pub columns: Vec<String>,
    pub cost: f64,
}

impl Task for FetchTask {
    fn id(&self) -> String {
        format!("fetch:{}[{}]", self.entity, self.columns.join(","))
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, inputs: &[RecordSet]) -> QueryResult<RecordSet> {
        let input = single_input(inputs, &self.id())?;
        let entity = ctx.entity(&self.entity)?;
        let projection: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        entity.scan(&projection, |tx| {
            let mut columns = tx.columns().to_vec();
            let mut kept_input: Vec<usize> = Vec::new();
            for (i, col) in input.columns().iter().enumerate() {
                if !columns.iter().any(|c| c.name == col.name) {
                    columns.push(col.clone());
                    kept_input.push(i);
                }
            }

            let mut out = RecordSet::new(columns);
            let mut seen = 0u64;
            for (tid, row) in input.iter() {
                if seen % ROW_BATCH == 0 {
                    ctx.token.check()?;
                }
                seen += 1;
                let mut values = tx.read(tid)?;
                values.extend(kept_input.iter().map(|i| row[*i].clone()));
                out.append_unchecked(tid, values);
            }
            Ok(out)
        })
    }
}

/// Keep rows satisfying a boolean predicate.
pub struct FilterTask {
    pub predicate: Predicate,
    pub cost: f64,
}

impl Task for FilterTask {
    fn id(&self) -> String {
        "filter".into()
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, inputs: &[RecordSet]) -> QueryResult<RecordSet> {
        let input = single_input(inputs, "filter")?;
        ctx.token.check()?;
        let compiled = self
            .predicate
            .compile(input.columns())
            .map_err(QueryError::Bind)?;
        Ok(input.filter(|row| compiled.matches(row)))
    }
}

/// Final projection: select with optional renames, or one of the
/// aggregates.
pub struct ProjectionTask {
    pub kind: ProjectionKind,
    pub fields: Vec<ProjectionField>,
    pub cost: f64,
}

impl Task for ProjectionTask {
    fn id(&self) -> String {
        format!("project:{:?}", self.kind)
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, inputs: &[RecordSet]) -> QueryResult<RecordSet> {
        let input = single_input(inputs, "project")?;
        ctx.token.check()?;
        let result = match self.kind {
            ProjectionKind::Select => {
                if self.fields.is_empty() {
                    input.clone()
                } else {
                    let fields: Vec<(String, Option<String>)> = self
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), f.alias.clone()))
                        .collect();
                    input
                        .project(&fields)
                        .map_err(|e| QueryError::Bind(e.to_string()))?
                }
            }
            ProjectionKind::Count => input.count(),
            ProjectionKind::Exists => input.exists(),
            agg => {
                let field = self.fields.first().ok_or_else(|| {
                    QueryError::Syntax(format!("{agg:?} projection needs a target column"))
                })?;
                let folded = match agg {
                    ProjectionKind::Min => input.min(&field.name),
                    ProjectionKind::Max => input.max(&field.name),
                    ProjectionKind::Sum => input.sum(&field.name),
                    ProjectionKind::Mean => input.mean(&field.name),
                    _ => unreachable!("select/count/exists handled above"),
                }
                .map_err(|e| QueryError::Bind(e.to_string()))?;
                match &field.alias {
                    None => folded,
                    Some(alias) => {
                        let name = folded.columns()[0].name.clone();
                        folded
                            .project(&[(name, Some(alias.clone()))])
                            .map_err(|e| QueryError::Bind(e.to_string()))?
                    }
                }
            }
        };
        Ok(result)
    }
}

/// Skip then take.
pub struct LimitTask {
    pub n: u64,
    pub skip: u64,
    pub cost: f64,
}

impl Task for LimitTask {
    fn id(&self) -> String {
        format!("limit:{}+{}", self.n, self.skip)
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, inputs: &[RecordSet]) -> QueryResult<RecordSet> {
        let input = single_input(inputs, "limit")?;
        ctx.token.check()?;
        Ok(input.limit(self.n as usize, self.skip as usize))
    }
}
