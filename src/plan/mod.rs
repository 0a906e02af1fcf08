//! Logical Plan
//!
//! Declarative operator trees the binder emits and the planner lowers into
//! execution stages. Nodes are immutable value types compared
//! structurally; every transformation builds a new tree.
//!
//! Each node publishes an output-row estimate, its output columns, and a
//! cost triple (disk, cpu, materialised bytes) the planner uses to weigh
//! alternatives.

pub mod planner;

use crate::distance::Distance;
use crate::error::{QueryError, QueryResult};
use crate::query::{Predicate, ProjectionField, ProjectionKind};
use crate::record::{ColumnDef, TupleId};
use crate::value::ColumnType;
use std::ops::Add;

/// Cost charged per column value read from disk.
pub const DISK_READ_COST: f64 = 1.0;
/// Cost charged per column value touched in memory.
pub const MEM_READ_COST: f64 = 0.25;

/// Default selectivity assumed for a boolean predicate when no statistics
/// exist.
pub const DEFAULT_SELECTIVITY: f64 = 0.5;

/// Cost triple: disk work, cpu/memory work, bytes materialised.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cost {
    pub disk: f64,
    pub cpu: f64,
    pub bytes: f64,
}

impl Cost {
    pub fn new(disk: f64, cpu: f64, bytes: f64) -> Self {
        Cost { disk, cpu, bytes }
    }

    /// Scalar summary used when two plans must be ranked.
    pub fn weighted_total(&self) -> f64 {
        self.disk + self.cpu + self.bytes / 4096.0
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            disk: self.disk + rhs.disk,
            cpu: self.cpu + rhs.cpu,
            bytes: self.bytes + rhs.bytes,
        }
    }
}

/// A node of the logical plan tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Scan every row of an entity, projected to `columns`.
    FullEntityScan {
        entity: String,
        columns: Vec<ColumnDef>,
        rows: u64,
    },
    /// Scan tuple ids in `[start, end)`.
    RangedEntityScan {
        entity: String,
        columns: Vec<ColumnDef>,
        start: TupleId,
        end: TupleId,
    },
    /// Scan a deterministic pseudo-random sample of `size` rows.
    SampledEntityScan {
        entity: String,
        columns: Vec<ColumnDef>,
        rows: u64,
        size: u64,
        seed: u64,
    },
    /// Re-attach entity columns to an intermediate result by tuple id.
    FetchColumns {
        input: Box<PlanNode>,
        entity: String,
        columns: Vec<ColumnDef>,
    },
    /// Keep rows satisfying a boolean predicate.
    FilterPredicate {
        input: Box<PlanNode>,
        predicate: Predicate,
        selectivity: f64,
    },
    /// k-nearest-neighbour evaluation over a vector column.
    KnnPredicate {
        input: Box<PlanNode>,
        column: ColumnDef,
        k: usize,
        distance: Distance,
        queries: Vec<Vec<f64>>,
        weights: Option<Vec<Vec<f64>>>,
    },
    /// Final projection (select or aggregate).
    Projection {
        input: Box<PlanNode>,
        kind: ProjectionKind,
        fields: Vec<ProjectionField>,
    },
    /// Skip then take.
    Limit {
        input: Box<PlanNode>,
        n: u64,
        skip: u64,
    },
}

impl PlanNode {
    /// Validated ranged scan: `0 < start < end <= max_tuple_id + 1`.
    pub fn ranged_scan(
        entity: impl Into<String>,
        columns: Vec<ColumnDef>,
        start: TupleId,
        end: TupleId,
        max_tuple_id: TupleId,
    ) -> QueryResult<PlanNode> {
        if start == 0 || start >= end || end > max_tuple_id + 1 {
            return Err(QueryError::Bind(format!(
                "invalid scan range [{start}, {end}) over {max_tuple_id} tuples"
            )));
        }
        Ok(PlanNode::RangedEntityScan {
            entity: entity.into(),
            columns,
            start,
            end,
        })
    }

    /// Validated sampled scan: `size > 0`.
    pub fn sampled_scan(
        entity: impl Into<String>,
        columns: Vec<ColumnDef>,
        rows: u64,
        size: u64,
        seed: u64,
    ) -> QueryResult<PlanNode> {
        if size == 0 {
            return Err(QueryError::Bind("sample size must be positive".into()));
        }
        Ok(PlanNode::SampledEntityScan {
            entity: entity.into(),
            columns,
            rows,
            size,
            seed,
        })
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::FullEntityScan { .. }
            | PlanNode::RangedEntityScan { .. }
            | PlanNode::SampledEntityScan { .. } => Vec::new(),
            PlanNode::FetchColumns { input, .. }
            | PlanNode::FilterPredicate { input, .. }
            | PlanNode::KnnPredicate { input, .. }
            | PlanNode::Projection { input, .. }
            | PlanNode::Limit { input, .. } => vec![input],
        }
    }

    /// Estimated output rows.
    pub fn output_rows(&self) -> u64 {
        match self {
            PlanNode::FullEntityScan { rows, .. } => *rows,
            PlanNode::RangedEntityScan { start, end, .. } => end - start,
            PlanNode::SampledEntityScan { rows, size, .. } => (*size).min(*rows),
            PlanNode::FetchColumns { input, .. } => input.output_rows(),
            PlanNode::FilterPredicate {
                input, selectivity, ..
            } => (input.output_rows() as f64 * selectivity).ceil() as u64,
            PlanNode::KnnPredicate {
                input, k, queries, ..
            } => ((*k as u64) * queries.len() as u64).min(input.output_rows()),
            PlanNode::Projection { input, kind, .. } => match kind {
                ProjectionKind::Select => input.output_rows(),
                _ => 1,
            },
            PlanNode::Limit { input, n, skip } => input
                .output_rows()
                .saturating_sub(*skip)
                .min(*n),
        }
    }

    /// Output schema of this node.
    pub fn output_columns(&self) -> Vec<ColumnDef> {
        match self {
            PlanNode::FullEntityScan { columns, .. }
            | PlanNode::RangedEntityScan { columns, .. }
            | PlanNode::SampledEntityScan { columns, .. } => columns.clone(),
            PlanNode::FetchColumns { input, columns, .. } => {
                let mut out = columns.clone();
                for col in input.output_columns() {
                    if !out.iter().any(|c| c.name == col.name) {
                        out.push(col);
                    }
                }
                out
            }
            PlanNode::FilterPredicate { input, .. } | PlanNode::Limit { input, .. } => {
                input.output_columns()
            }
            PlanNode::KnnPredicate { .. } => vec![
                ColumnDef::new("tid", ColumnType::Long, false),
                ColumnDef::new("distance", ColumnType::Double, false),
            ],
            PlanNode::Projection {
                input,
                kind,
                fields,
            } => match kind {
                ProjectionKind::Select => {
                    let inputs = input.output_columns();
                    if fields.is_empty() {
                        return inputs;
                    }
                    fields
                        .iter()
                        .filter_map(|f| {
                            inputs
                                .iter()
                                .find(|c| c.name == f.name || c.short_name() == f.name)
                                .map(|c| {
                                    let mut def = c.clone();
                                    if let Some(alias) = &f.alias {
                                        def.name = alias.clone();
                                    }
                                    def
                                })
                        })
                        .collect()
                }
                ProjectionKind::Count => {
                    vec![ColumnDef::new("count", ColumnType::Long, false)]
                }
                ProjectionKind::Exists => {
                    vec![ColumnDef::new("exists", ColumnType::Boolean, false)]
                }
                agg => {
                    let name = fields.first().map_or("?", |f| f.name.as_str());
                    vec![ColumnDef::new(
                        format!("{}({name})", aggregate_name(*agg)),
                        ColumnType::Double,
                        false,
                    )]
                }
            },
        }
    }

    /// Cost of this operator alone.
    pub fn own_cost(&self) -> Cost {
        let rows = self.output_rows() as f64;
        let out_bytes = rows
            * self
                .output_columns()
                .iter()
                .map(|c| c.physical_size() as f64)
                .sum::<f64>();
        match self {
            PlanNode::FullEntityScan { columns, .. }
            | PlanNode::RangedEntityScan { columns, .. }
            | PlanNode::SampledEntityScan { columns, .. } => {
                Cost::new(rows * columns.len() as f64 * DISK_READ_COST, 0.0, out_bytes)
            }
            PlanNode::FetchColumns { input, columns, .. } => Cost::new(
                input.output_rows() as f64 * columns.len() as f64 * DISK_READ_COST,
                0.0,
                out_bytes,
            ),
            PlanNode::FilterPredicate { input, .. } => Cost::new(
                0.0,
                input.output_rows() as f64 * MEM_READ_COST,
                out_bytes,
            ),
            PlanNode::KnnPredicate { input, distance, .. } => Cost::new(
                0.0,
                input.output_rows() as f64 * distance.cost(),
                out_bytes,
            ),
            PlanNode::Projection { input, fields, .. } => Cost::new(
                0.0,
                input.output_rows() as f64 * fields.len().max(1) as f64 * MEM_READ_COST,
                out_bytes,
            ),
            PlanNode::Limit { .. } => Cost::new(0.0, 0.0, out_bytes),
        }
    }

    /// Cost of the whole subtree.
    pub fn cost(&self) -> Cost {
        self.children()
            .into_iter()
            .fold(self.own_cost(), |acc, c| acc + c.cost())
    }
}

fn aggregate_name(kind: ProjectionKind) -> &'static str {
    match kind {
        ProjectionKind::Min => "min",
        ProjectionKind::Max => "max",
        ProjectionKind::Sum => "sum",
        ProjectionKind::Mean => "mean",
        ProjectionKind::Select | ProjectionKind::Count | ProjectionKind::Exists => "",
    }
}
