//! Query Model
//!
//! The structured query a client sends: an entity reference, a projection,
//! an optional boolean predicate tree, an optional kNN clause, and
//! limit/skip. The [`binder`] validates a message against the catalog and
//! produces a logical plan.
//!
//! Predicates here are plain data; [`Predicate::compile`] resolves column
//! names against a schema once, yielding a matcher evaluated per row.

pub mod binder;
pub mod response;

use crate::catalog::Database;
use crate::error::QueryResult;
use crate::exec::{CancellationToken, Executor, TaskContext};
use crate::plan::planner::Planner;
use crate::record::{ColumnDef, RecordSet};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operators a predicate atom may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Like,
    In,
    Between,
    IsNull,
}

impl ComparisonOperator {
    /// Number of literal operands the operator expects; `None` for `In`,
    /// which takes one or more.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ComparisonOperator::IsNull => Some(0),
            ComparisonOperator::Between => Some(2),
            ComparisonOperator::In => None,
            _ => Some(1),
        }
    }

    /// True for the operators that need an ordered column type.
    pub fn needs_order(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::Less
                | ComparisonOperator::LessEqual
                | ComparisonOperator::Greater
                | ComparisonOperator::GreaterEqual
                | ComparisonOperator::Between
        )
    }
}

/// Boolean predicate tree: atoms comparing one column against literals,
/// combined with and/or.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Atom {
        column: String,
        operator: ComparisonOperator,
        values: Vec<Value>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Convenience constructor for an atom.
    pub fn atom(
        column: impl Into<String>,
        operator: ComparisonOperator,
        values: Vec<Value>,
    ) -> Predicate {
        Predicate::Atom {
            column: column.into(),
            operator,
            values,
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// All column names the predicate references, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Atom { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }

    /// Resolve column names against a row schema, producing a matcher.
    /// Unknown columns fail here rather than per row.
    pub fn compile(&self, columns: &[ColumnDef]) -> Result<CompiledPredicate, String> {
        Ok(CompiledPredicate {
            node: self.compile_node(columns)?,
        })
    }

    fn compile_node(&self, columns: &[ColumnDef]) -> Result<CompiledNode, String> {
        match self {
            Predicate::Atom {
                column,
                operator,
                values,
            } => {
                let index = columns
                    .iter()
                    .position(|c| c.name == *column || c.short_name() == column)
                    .ok_or_else(|| format!("no column named {column}"))?;
                let matcher = match operator {
                    ComparisonOperator::Like => {
                        let pattern = match values.first() {
                            Some(Value::String(s)) => s.to_string(),
                            _ => return Err("like needs one string literal".into()),
                        };
                        AtomMatcher::Like(pattern)
                    }
                    other => AtomMatcher::Operator(*other, values.clone()),
                };
                Ok(CompiledNode::Atom { index, matcher })
            }
            Predicate::And(a, b) => Ok(CompiledNode::And(
                Box::new(a.compile_node(columns)?),
                Box::new(b.compile_node(columns)?),
            )),
            Predicate::Or(a, b) => Ok(CompiledNode::Or(
                Box::new(a.compile_node(columns)?),
                Box::new(b.compile_node(columns)?),
            )),
        }
    }
}

/// A predicate with column indices resolved; cheap to evaluate per row.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    node: CompiledNode,
}

#[derive(Debug, Clone)]
enum CompiledNode {
    Atom { index: usize, matcher: AtomMatcher },
    And(Box<CompiledNode>, Box<CompiledNode>),
    Or(Box<CompiledNode>, Box<CompiledNode>),
}

#[derive(Debug, Clone)]
enum AtomMatcher {
    Operator(ComparisonOperator, Vec<Value>),
    Like(String),
}

impl CompiledPredicate {
    /// Evaluate against one row. Comparisons that cannot be ordered (or
    /// touch null) are simply false; they never error at scan time.
    pub fn matches(&self, row: &[Value]) -> bool {
        self.node.matches(row)
    }
}

impl CompiledNode {
    fn matches(&self, row: &[Value]) -> bool {
        match self {
            CompiledNode::Atom { index, matcher } => row
                .get(*index)
                .is_some_and(|value| matcher.matches(value)),
            CompiledNode::And(a, b) => a.matches(row) && b.matches(row),
            CompiledNode::Or(a, b) => a.matches(row) || b.matches(row),
        }
    }
}

impl AtomMatcher {
    fn matches(&self, value: &Value) -> bool {
        match self {
            AtomMatcher::Like(pattern) => match value {
                Value::String(s) => like_match(pattern, s),
                _ => false,
            },
            AtomMatcher::Operator(op, literals) => match op {
                ComparisonOperator::IsNull => value.is_null(),
                _ if value.is_null() => false,
                ComparisonOperator::Equal => literals.first().is_some_and(|l| values_equal(value, l)),
                ComparisonOperator::NotEqual => {
                    literals.first().is_some_and(|l| !values_equal(value, l))
                }
                ComparisonOperator::In => literals.iter().any(|l| values_equal(value, l)),
                ComparisonOperator::Less => compare_is(value, literals, Ordering::is_lt),
                ComparisonOperator::LessEqual => compare_is(value, literals, Ordering::is_le),
                ComparisonOperator::Greater => compare_is(value, literals, Ordering::is_gt),
                ComparisonOperator::GreaterEqual => compare_is(value, literals, Ordering::is_ge),
                ComparisonOperator::Between => {
                    let (Some(lo), Some(hi)) = (literals.first(), literals.get(1)) else {
                        return false;
                    };
                    value.try_compare(lo).is_ok_and(Ordering::is_ge)
                        && value.try_compare(hi).is_ok_and(Ordering::is_le)
                }
                ComparisonOperator::Like => false,
            },
        }
    }
}

/// Equality with numeric widening, falling back to structural equality for
/// types that do not order (complex, vectors).
fn values_equal(a: &Value, b: &Value) -> bool {
    match a.try_compare(b) {
        Ok(ord) => ord == Ordering::Equal,
        Err(_) => a == b,
    }
}

fn compare_is(value: &Value, literals: &[Value], test: fn(Ordering) -> bool) -> bool {
    literals
        .first()
        .is_some_and(|l| value.try_compare(l).is_ok_and(test))
}

/// SQL-style wildcard matching: `%` spans any run, `_` one character.
fn like_match(pattern: &str, input: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    like_rec(&p, &s)
}

fn like_rec(p: &[char], s: &[char]) -> bool {
    match p.first() {
        None => s.is_empty(),
        Some('%') => (0..=s.len()).any(|i| like_rec(&p[1..], &s[i..])),
        Some('_') => !s.is_empty() && like_rec(&p[1..], &s[1..]),
        Some(c) => s.first() == Some(c) && like_rec(&p[1..], &s[1..]),
    }
}

// Query Messages

/// What a query projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    Select,
    Count,
    Exists,
    Min,
    Max,
    Sum,
    Mean,
}

/// One projected field, optionally renamed in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionField {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl ProjectionField {
    pub fn new(name: impl Into<String>) -> Self {
        ProjectionField {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        ProjectionField {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// Projection clause: kind plus its fields. `Select` lists output columns
/// (empty = all); the aggregates name their single target column (`Count`
/// and `Exists` take none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub kind: ProjectionKind,
    #[serde(default)]
    pub fields: Vec<ProjectionField>,
}

impl Projection {
    pub fn select_all() -> Self {
        Projection {
            kind: ProjectionKind::Select,
            fields: Vec::new(),
        }
    }

    pub fn select(fields: &[&str]) -> Self {
        Projection {
            kind: ProjectionKind::Select,
            fields: fields.iter().map(|s| ProjectionField::new(*s)).collect(),
        }
    }

    pub fn count() -> Self {
        Projection {
            kind: ProjectionKind::Count,
            fields: Vec::new(),
        }
    }

    pub fn aggregate(kind: ProjectionKind, field: &str) -> Self {
        Projection {
            kind,
            fields: vec![ProjectionField::new(field)],
        }
    }
}

/// kNN clause of a query: the vector column, the neighbour count, the
/// distance kernel by name, one or more query vectors, and optional
/// per-query weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnClause {
    pub column: String,
    pub k: usize,
    pub distance: String,
    pub queries: Vec<Vec<f64>>,
    #[serde(default)]
    pub weights: Option<Vec<Vec<f64>>>,
}

/// A complete structured query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMessage {
    #[serde(default)]
    pub query_id: Option<String>,
    pub schema: String,
    pub entity: String,
    pub projection: Projection,
    #[serde(default)]
    pub predicate: Option<Predicate>,
    #[serde(default)]
    pub knn: Option<KnnClause>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

/// Bind, lower, and run a query with a fresh token carrying the
/// configured timeout.
pub fn execute(db: &Database, message: &QueryMessage) -> QueryResult<RecordSet> {
    execute_with_token(
        db,
        message,
        CancellationToken::new(db.config().query_timeout()),
    )
}

/// Run a query under an externally owned cancellation token; the caller
/// keeps a clone to cancel mid-flight.
pub fn execute_with_token(
    db: &Database,
    message: &QueryMessage,
    token: CancellationToken,
) -> QueryResult<RecordSet> {
    let plan = binder::Binder::new(db).bind(message)?;
    let stages = Planner::new(db.config().knn.parallelism).plan(&plan)?;
    let executor = Executor::new(db.config().execution.num_threads)?;
    let started = std::time::Instant::now();
    let result = executor.execute(&stages, &TaskContext::new(db, token));
    match &result {
        Ok(rows) => tracing::debug!(
            query_id = message.query_id.as_deref().unwrap_or("-"),
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query finished"
        ),
        Err(err) => tracing::warn!(
            query_id = message.query_id.as_deref().unwrap_or("-"),
            error = %err,
            "query failed"
        ),
    }
    result
}

impl Database {
    /// Convenience wrapper over [`execute`].
    pub fn query(&self, message: &QueryMessage) -> QueryResult<RecordSet> {
        execute(self, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ColumnType;

    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("warren.r.id", ColumnType::Int, false),
            ColumnDef::new("warren.r.name", ColumnType::String, true),
        ]
    }

    fn row(id: i32, name: Option<&str>) -> Vec<Value> {
        vec![
            Value::Int(id),
            name.map_or(Value::Null, Value::string),
        ]
    }

    #[test]
    fn test_comparison_atoms() {
        let cols = schema();
        let p = Predicate::atom("id", ComparisonOperator::Greater, vec![Value::Int(2)])
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(3, None)));
        assert!(!p.matches(&row(2, None)));

        // Numeric widening across literal types
        let p = Predicate::atom("id", ComparisonOperator::LessEqual, vec![Value::Double(2.5)])
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(2, None)));
        assert!(!p.matches(&row(3, None)));
    }

    #[test]
    fn test_between_is_inclusive() {
        let cols = schema();
        let p = Predicate::atom(
            "id",
            ComparisonOperator::Between,
            vec![Value::Int(2), Value::Int(4)],
        )
        .compile(&cols)
        .unwrap();
        assert!(p.matches(&row(2, None)));
        assert!(p.matches(&row(4, None)));
        assert!(!p.matches(&row(5, None)));
    }

    #[test]
    fn test_in_and_not_equal() {
        let cols = schema();
        let p = Predicate::atom(
            "id",
            ComparisonOperator::In,
            vec![Value::Int(1), Value::Int(3)],
        )
        .compile(&cols)
        .unwrap();
        assert!(p.matches(&row(3, None)));
        assert!(!p.matches(&row(2, None)));

        let p = Predicate::atom("id", ComparisonOperator::NotEqual, vec![Value::Int(1)])
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(2, None)));
        assert!(!p.matches(&row(1, None)));
    }

    #[test]
    fn test_is_null_and_null_comparisons() {
        let cols = schema();
        let p = Predicate::atom("name", ComparisonOperator::IsNull, vec![])
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(1, None)));
        assert!(!p.matches(&row(1, Some("thumper"))));

        // Null never satisfies an ordinary comparison
        let p = Predicate::atom(
            "name",
            ComparisonOperator::Equal,
            vec![Value::string("thumper")],
        )
        .compile(&cols)
        .unwrap();
        assert!(!p.matches(&row(1, None)));
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like_match("thu%", "thumper"));
        assert!(like_match("%per", "thumper"));
        assert!(like_match("t_umper", "thumper"));
        assert!(like_match("%ump%", "thumper"));
        assert!(!like_match("thu", "thumper"));
        assert!(!like_match("t_mper", "thumper"));
        assert!(like_match("%", ""));
    }

    #[test]
    fn test_and_or_composition() {
        let cols = schema();
        let p = Predicate::atom("id", ComparisonOperator::Greater, vec![Value::Int(1)])
            .and(Predicate::atom(
                "name",
                ComparisonOperator::Like,
                vec![Value::string("th%")],
            ))
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(2, Some("thumper"))));
        assert!(!p.matches(&row(2, Some("clover"))));
        assert!(!p.matches(&row(1, Some("thumper"))));

        let p = Predicate::atom("id", ComparisonOperator::Equal, vec![Value::Int(1)])
            .or(Predicate::atom(
                "id",
                ComparisonOperator::Equal,
                vec![Value::Int(9)],
            ))
            .compile(&cols)
            .unwrap();
        assert!(p.matches(&row(9, None)));
        assert!(!p.matches(&row(5, None)));
    }

    #[test]
    fn test_compile_rejects_unknown_column() {
        let cols = schema();
        assert!(Predicate::atom("ears", ComparisonOperator::IsNull, vec![])
            .compile(&cols)
            .is_err());
    }

    #[test]
    fn test_predicate_columns_deduplicated() {
        let p = Predicate::atom("a", ComparisonOperator::IsNull, vec![]).and(
            Predicate::atom("b", ComparisonOperator::IsNull, vec![])
                .or(Predicate::atom("a", ComparisonOperator::IsNull, vec![])),
        );
        assert_eq!(p.columns(), vec!["a", "b"]);
    }
}
