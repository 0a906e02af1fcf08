//! Query Binder
//!
//! Validates an incoming [`QueryMessage`](super::QueryMessage) against the
//! catalog and produces a bound logical plan. Everything that can fail
//! fails here, with the offending name in the error: unknown catalog
//! objects, operator arity, literal/column type compatibility, query
//! vector dimensions, unknown distance kernels.
//!
//! Bound plan shapes:
//!
//! ```text
//! boolean:  Scan -> [Filter] -> Projection -> [Limit]
//! knn:      Scan -> [Filter] -> Knn -> [Fetch] -> Projection -> [Limit]
//! ```

use super::{
    ComparisonOperator, KnnClause, Predicate, Projection, ProjectionKind, QueryMessage,
};
use crate::catalog::Database;
use crate::distance::Distance;
use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::plan::{PlanNode, DEFAULT_SELECTIVITY};
use crate::record::ColumnDef;
use crate::value::{ColumnType, Value};
use std::sync::Arc;

/// Binds query messages over a database's catalog.
pub struct Binder<'a> {
    db: &'a Database,
}

impl<'a> Binder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Binder { db }
    }

    /// Validate `message` and produce its logical plan.
    pub fn bind(&self, message: &QueryMessage) -> QueryResult<PlanNode> {
        if message.schema.is_empty() || message.entity.is_empty() {
            return Err(QueryError::Syntax(
                "query needs a schema-qualified entity".into(),
            ));
        }
        let entity = self.db.entity(&message.schema, &message.entity)?;

        if let Some(predicate) = &message.predicate {
            validate_predicate(&entity, predicate)?;
        }

        let root = match &message.knn {
            Some(knn) => self.bind_knn(&entity, message, knn)?,
            None => self.bind_boolean(&entity, message)?,
        };

        let root = match (message.limit, message.skip) {
            (None, None) => root,
            (limit, skip) => PlanNode::Limit {
                input: Box::new(root),
                n: limit.unwrap_or(u64::MAX),
                skip: skip.unwrap_or(0),
            },
        };

        tracing::debug!(
            query_id = message.query_id.as_deref().unwrap_or("-"),
            entity = %entity.qualified_name(),
            rows = root.output_rows(),
            "bound query"
        );
        Ok(root)
    }

    /// Boolean-only query: scan the needed columns, filter, project.
    fn bind_boolean(&self, entity: &Arc<Entity>, message: &QueryMessage) -> QueryResult<PlanNode> {
        let projection_columns = validate_projection(entity, &message.projection, false)?;

        // The scan covers the projected columns plus everything the
        // predicate touches.
        let mut scan_columns = projection_columns;
        if scan_columns.is_empty() {
            scan_columns = entity.columns().to_vec();
        }
        if let Some(predicate) = &message.predicate {
            for name in predicate.columns() {
                let def = resolve_column(entity, name)?;
                if !scan_columns.iter().any(|c| c.name == def.name) {
                    scan_columns.push(def);
                }
            }
        }

        let mut node = PlanNode::FullEntityScan {
            entity: entity.qualified_name(),
            columns: scan_columns,
            rows: entity.row_count(),
        };
        if let Some(predicate) = &message.predicate {
            node = PlanNode::FilterPredicate {
                input: Box::new(node),
                predicate: predicate.clone(),
                selectivity: DEFAULT_SELECTIVITY,
            };
        }
        Ok(PlanNode::Projection {
            input: Box::new(node),
            kind: message.projection.kind,
            fields: message.projection.fields.clone(),
        })
    }

    /// kNN query: combined scan(-filter)-kNN, then fetch whatever the
    /// projection needs beyond `tid`/`distance`.
    fn bind_knn(
        &self,
        entity: &Arc<Entity>,
        message: &QueryMessage,
        knn: &KnnClause,
    ) -> QueryResult<PlanNode> {
        let column = resolve_column(entity, &knn.column)?;
        if !column.column_type.is_real_vector() {
            return Err(QueryError::Type(format!(
                "knn requires a real vector column, {} is {}",
                column.name, column.column_type
            )));
        }
        if knn.k == 0 {
            return Err(QueryError::Syntax("knn needs k > 0".into()));
        }
        if knn.queries.is_empty() {
            return Err(QueryError::Syntax("knn needs at least one query vector".into()));
        }
        let dim = column.logical_size();
        for query in &knn.queries {
            if query.len() != dim {
                return Err(QueryError::Size {
                    expected: dim,
                    got: query.len(),
                });
            }
        }
        let distance = Distance::from_name(&knn.distance).ok_or_else(|| {
            QueryError::Bind(format!("unknown distance kernel: {}", knn.distance))
        })?;
        if let Some(weights) = &knn.weights {
            if !distance.supports_weights() {
                return Err(QueryError::Bind(format!(
                    "distance kernel {} has no weighted form",
                    distance.name()
                )));
            }
            if weights.len() != knn.queries.len() {
                return Err(QueryError::Syntax(format!(
                    "{} weight vectors for {} query vectors",
                    weights.len(),
                    knn.queries.len()
                )));
            }
            for weight in weights {
                if weight.len() != dim {
                    return Err(QueryError::Size {
                        expected: dim,
                        got: weight.len(),
                    });
                }
            }
        }

        // Scan columns: the vector column plus predicate columns.
        let mut scan_columns = vec![column.clone()];
        if let Some(predicate) = &message.predicate {
            for name in predicate.columns() {
                let def = resolve_column(entity, name)?;
                if !scan_columns.iter().any(|c| c.name == def.name) {
                    scan_columns.push(def);
                }
            }
        }
        let mut node = PlanNode::FullEntityScan {
            entity: entity.qualified_name(),
            columns: scan_columns,
            rows: entity.row_count(),
        };
        if let Some(predicate) = &message.predicate {
            node = PlanNode::FilterPredicate {
                input: Box::new(node),
                predicate: predicate.clone(),
                selectivity: DEFAULT_SELECTIVITY,
            };
        }
        node = PlanNode::KnnPredicate {
            input: Box::new(node),
            column,
            k: knn.k,
            distance,
            queries: knn.queries.clone(),
            weights: knn.weights.clone(),
        };

        // Projected entity columns are re-attached to the kNN result.
        let fetch_columns = validate_projection(entity, &message.projection, true)?;
        if !fetch_columns.is_empty() {
            node = PlanNode::FetchColumns {
                input: Box::new(node),
                entity: entity.qualified_name(),
                columns: fetch_columns,
            };
        }
        Ok(PlanNode::Projection {
            input: Box::new(node),
            kind: message.projection.kind,
            fields: message.projection.fields.clone(),
        })
    }
}

/// Columns of the kNN result record set that exist without fetching.
const KNN_RESULT_COLUMNS: [&str; 2] = ["tid", "distance"];

/// Validate the projection clause and return the entity columns it needs
/// from a scan (or, for kNN queries, a fetch).
fn validate_projection(
    entity: &Arc<Entity>,
    projection: &Projection,
    over_knn: bool,
) -> QueryResult<Vec<ColumnDef>> {
    let mut needed = Vec::new();
    match projection.kind {
        ProjectionKind::Select => {
            for field in &projection.fields {
                if over_knn && KNN_RESULT_COLUMNS.contains(&field.name.as_str()) {
                    continue;
                }
                let def = resolve_column(entity, &field.name)?;
                if !needed.iter().any(|c: &ColumnDef| c.name == def.name) {
                    needed.push(def);
                }
            }
            if over_knn && projection.fields.is_empty() {
                needed = entity.columns().to_vec();
            }
        }
        ProjectionKind::Count | ProjectionKind::Exists => {
            if !projection.fields.is_empty() {
                return Err(QueryError::Syntax(format!(
                    "{:?} projection takes no fields",
                    projection.kind
                )));
            }
        }
        _ => {
            let [field] = projection.fields.as_slice() else {
                return Err(QueryError::Syntax(format!(
                    "{:?} projection needs exactly one column",
                    projection.kind
                )));
            };
            if over_knn && KNN_RESULT_COLUMNS.contains(&field.name.as_str()) {
                return Ok(needed);
            }
            let def = resolve_column(entity, &field.name)?;
            if !def.column_type.is_numeric() {
                return Err(QueryError::Bind(format!(
                    "{:?} projection over non-numeric column {} of type {}",
                    projection.kind, def.name, def.column_type
                )));
            }
            needed.push(def);
        }
    }
    Ok(needed)
}

fn resolve_column(entity: &Arc<Entity>, name: &str) -> QueryResult<ColumnDef> {
    entity
        .column(name)
        .cloned()
        .ok_or_else(|| QueryError::NotFound {
            kind: "column",
            name: format!("{}.{name}", entity.qualified_name()),
        })
}

/// Walk a predicate tree validating every atom against the schema.
fn validate_predicate(entity: &Arc<Entity>, predicate: &Predicate) -> QueryResult<()> {
    match predicate {
        Predicate::And(a, b) | Predicate::Or(a, b) => {
            validate_predicate(entity, a)?;
            validate_predicate(entity, b)
        }
        Predicate::Atom {
            column,
            operator,
            values,
        } => {
            let def = resolve_column(entity, column)?;
            match operator.arity() {
                Some(expected) if values.len() != expected => {
                    return Err(QueryError::Syntax(format!(
                        "{operator:?} on {column} takes {expected} literals, got {}",
                        values.len()
                    )));
                }
                None if values.is_empty() => {
                    return Err(QueryError::Syntax(format!(
                        "in predicate on {column} needs at least one literal"
                    )));
                }
                _ => {}
            }
            if *operator == ComparisonOperator::Like && def.column_type != ColumnType::String {
                return Err(QueryError::Type(format!(
                    "like predicate on non-string column {} of type {}",
                    def.name, def.column_type
                )));
            }
            if operator.needs_order()
                && (def.column_type.is_vector()
                    || matches!(
                        def.column_type,
                        ColumnType::Complex32 | ColumnType::Complex64
                    ))
            {
                return Err(QueryError::Type(format!(
                    "ordered comparison on unordered column {} of type {}",
                    def.name, def.column_type
                )));
            }
            for value in values {
                if !literal_compatible(&def.column_type, value) {
                    return Err(QueryError::Type(format!(
                        "literal of type {} is incompatible with column {} of type {}",
                        value.type_name(),
                        def.name,
                        def.column_type
                    )));
                }
            }
            Ok(())
        }
    }
}

/// A literal fits a column if it matches the type exactly or both sides
/// are numeric scalars (widening covers the rest).
fn literal_compatible(column_type: &ColumnType, literal: &Value) -> bool {
    if literal.is_null() {
        return false;
    }
    if column_type.matches(literal) {
        return true;
    }
    column_type.is_numeric()
        && literal
            .data_type()
            .is_some_and(|t| t.is_numeric())
}
