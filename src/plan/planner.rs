//! Planner: Lowering Logical Plans to Execution Stages
//!
//! Pure rules turning a [`PlanNode`] tree into the stage list the
//! executor runs. The rules the plan shape depends on:
//!
//! - a kNN predicate directly above an entity scan becomes one combined
//!   scan-kNN task; with a companion (non-selective) filter in between,
//!   the filter folds into the same task rather than materialising the
//!   unfiltered scan
//! - a ranged scan splits into `parallelism` contiguous sub-scans merged
//!   with the `All` rule, per-range order preserved
//! - everything else lowers one node to one single-task stage

use super::PlanNode;
use crate::error::{QueryError, QueryResult};
use crate::exec::knn::{partition_ranges, KnnTask};
use crate::exec::scan::{FullScanTask, RangedScanTask, SampledScanTask};
use crate::exec::transform::{FetchTask, FilterTask, LimitTask, ProjectionTask};
use crate::exec::{ExecutionPlan, ExecutionStage, Task};
use crate::record::ColumnDef;

/// Lowers plan trees with a configured parallel degree.
pub struct Planner {
    parallelism: usize,
}

impl Planner {
    /// `parallelism` bounds both ranged-scan splitting and the sub-scans
    /// inside one kNN task.
    pub fn new(parallelism: usize) -> Self {
        Planner {
            parallelism: parallelism.max(1),
        }
    }

    /// Lower a plan tree into stages in execution order.
    pub fn plan(&self, root: &PlanNode) -> QueryResult<ExecutionPlan> {
        Ok(ExecutionPlan {
            stages: self.lower(root)?,
        })
    }

    fn lower(&self, node: &PlanNode) -> QueryResult<Vec<ExecutionStage>> {
        let cost = node.own_cost().weighted_total();
        match node {
            PlanNode::FullEntityScan {
                entity, columns, ..
            } => Ok(vec![ExecutionStage::single(Box::new(FullScanTask {
                entity: entity.clone(),
                columns: short_names(columns),
                cost,
            }))]),

            PlanNode::RangedEntityScan {
                entity,
                columns,
                start,
                end,
            } => {
                let ranges = partition_ranges(*start, *end, self.parallelism);
                let tasks: Vec<Box<dyn Task>> = ranges
                    .iter()
                    .map(|(lo, hi)| {
                        Box::new(RangedScanTask {
                            entity: entity.clone(),
                            columns: short_names(columns),
                            start: *lo,
                            end: *hi,
                            cost: cost / ranges.len() as f64,
                        }) as Box<dyn Task>
                    })
                    .collect();
                Ok(vec![ExecutionStage::all(tasks)])
            }

            PlanNode::SampledEntityScan {
                entity,
                columns,
                size,
                seed,
                ..
            } => Ok(vec![ExecutionStage::single(Box::new(SampledScanTask {
                entity: entity.clone(),
                columns: short_names(columns),
                size: *size,
                seed: *seed,
                cost,
            }))]),

            PlanNode::KnnPredicate {
                input,
                column,
                k,
                distance,
                queries,
                weights,
            } => {
                // The scan (and a companion filter) fold into one task.
                let (entity, predicate) = match &**input {
                    PlanNode::FullEntityScan { entity, .. } => (entity.clone(), None),
                    PlanNode::FilterPredicate {
                        input: inner,
                        predicate,
                        ..
                    } => match &**inner {
                        PlanNode::FullEntityScan { entity, .. } => {
                            (entity.clone(), Some(predicate.clone()))
                        }
                        other => return Err(non_scan_knn_input(other)),
                    },
                    other => return Err(non_scan_knn_input(other)),
                };
                Ok(vec![ExecutionStage::single(Box::new(KnnTask {
                    entity,
                    column: column.short_name().to_string(),
                    k: *k,
                    distance: *distance,
                    queries: queries.clone(),
                    weights: weights.clone(),
                    predicate,
                    parallelism: self.parallelism,
                    cost: cost + input.own_cost().weighted_total(),
                }))])
            }

            PlanNode::FetchColumns {
                input,
                entity,
                columns,
            } => {
                let mut stages = self.lower(input)?;
                stages.push(ExecutionStage::single(Box::new(FetchTask {
                    entity: entity.clone(),
                    columns: short_names(columns),
                    cost,
                })));
                Ok(stages)
            }

            PlanNode::FilterPredicate {
                input, predicate, ..
            } => {
                let mut stages = self.lower(input)?;
                stages.push(ExecutionStage::single(Box::new(FilterTask {
                    predicate: predicate.clone(),
                    cost,
                })));
                Ok(stages)
            }

            PlanNode::Projection {
                input,
                kind,
                fields,
            } => {
                let mut stages = self.lower(input)?;
                stages.push(ExecutionStage::single(Box::new(ProjectionTask {
                    kind: *kind,
                    fields: fields.clone(),
                    cost,
                })));
                Ok(stages)
            }

            PlanNode::Limit { input, n, skip } => {
                let mut stages = self.lower(input)?;
                stages.push(ExecutionStage::single(Box::new(LimitTask {
                    n: *n,
                    skip: *skip,
                    cost,
                })));
                Ok(stages)
            }
        }
    }
}

fn short_names(columns: &[ColumnDef]) -> Vec<String> {
    columns.iter().map(|c| c.short_name().to_string()).collect()
}

fn non_scan_knn_input(node: &PlanNode) -> QueryError {
    QueryError::Bind(format!(
        "knn evaluation requires an entity scan input, found {node:?}"
    ))
}
