//! Records and Record Sets
//!
//! The in-memory intermediate result flowing between tasks: an ordered
//! sequence of rows sharing a fixed column schema, each row addressed by
//! its source tuple id. Every structural operator (filter, projection,
//! distinct, limit, aggregation) produces a new record set; inputs are
//! never mutated.

use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Stable 64-bit row identifier within an entity. Assigned monotonically
/// starting at 1; never reused.
pub type TupleId = u64;

/// Violations of a column definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("null value for non-nullable column {column}")]
    NullViolation { column: String },

    #[error("value of type {got} does not match column {column} of type {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        got: &'static str,
    },

    #[error("vector of {got} elements does not fit column {column} of logical size {expected}")]
    SizeMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("row of {got} values does not match schema of {expected} columns")]
    ArityMismatch { expected: usize, got: usize },

    #[error("no column named {0}")]
    UnknownColumn(String),

    #[error("column {column} of type {column_type} is not numeric")]
    NotNumeric {
        column: String,
        column_type: String,
    },
}

/// Definition of one column: fully-qualified name, logical type, nullable
/// flag. The logical size of vector columns is pinned by the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        ColumnDef {
            name: name.into(),
            column_type,
            nullable,
        }
    }

    /// Last segment of the fully-qualified name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn logical_size(&self) -> usize {
        self.column_type.logical_size()
    }

    pub fn physical_size(&self) -> usize {
        self.column_type.physical_size()
    }

    /// The value an unset field takes: zero/empty when non-nullable,
    /// null otherwise.
    pub fn default_value(&self) -> Value {
        if self.nullable {
            Value::Null
        } else {
            self.column_type.default_value()
        }
    }

    /// A value is valid iff its type is compatible and, for vectors, the
    /// element counts match. Null is valid iff the column is nullable.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(ValidationError::NullViolation {
                    column: self.name.clone(),
                })
            };
        }
        if self.column_type.matches(value) {
            return Ok(());
        }
        // Same family but wrong element count is a size violation, not a
        // type violation.
        match (value.data_type(), &self.column_type) {
            (Some(got), expected) if expected.is_vector() && got.name() == expected.name() => {
                Err(ValidationError::SizeMismatch {
                    column: self.name.clone(),
                    expected: expected.logical_size(),
                    got: got.logical_size(),
                })
            }
            _ => Err(ValidationError::TypeMismatch {
                column: self.name.clone(),
                expected: self.column_type.to_string(),
                got: value.type_name(),
            }),
        }
    }
}

/// One row: its tuple id and the values for a fixed column set.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub tuple_id: TupleId,
    columns: Arc<Vec<ColumnDef>>,
    values: Vec<Value>,
}

impl Record {
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the named column, matching fully-qualified or short names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = column_index(&self.columns, column)?;
        self.values.get(idx)
    }
}

fn column_index(columns: &[ColumnDef], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.name == name)
        .or_else(|| columns.iter().position(|c| c.short_name() == name))
}

/// Ordered sequence of rows sharing one column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    columns: Arc<Vec<ColumnDef>>,
    rows: Vec<Vec<Value>>,
    tuple_ids: Vec<TupleId>,
}

impl RecordSet {
    /// An empty record set over the given schema.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        RecordSet {
            columns: Arc::new(columns),
            rows: Vec::new(),
            tuple_ids: Vec::new(),
        }
    }

    /// Append a row after validating it against the schema.
    pub fn append(&mut self, tuple_id: TupleId, values: Vec<Value>) -> Result<(), ValidationError> {
        if values.len() != self.columns.len() {
            return Err(ValidationError::ArityMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        for (def, value) in self.columns.iter().zip(values.iter()) {
            def.validate(value)?;
        }
        self.rows.push(values);
        self.tuple_ids.push(tuple_id);
        Ok(())
    }

    /// Append without validation; callers that already validated (scans
    /// reading typed stores) use this on the hot path.
    pub fn append_unchecked(&mut self, tuple_id: TupleId, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(values);
        self.tuple_ids.push(tuple_id);
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by fully-qualified or short name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        column_index(&self.columns, name)
    }

    /// Row view at `index`.
    pub fn row(&self, index: usize) -> Option<Record> {
        Some(Record {
            tuple_id: *self.tuple_ids.get(index)?,
            columns: Arc::clone(&self.columns),
            values: self.rows.get(index)?.clone(),
        })
    }

    /// Iterate `(tuple_id, values)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (TupleId, &[Value])> {
        self.tuple_ids
            .iter()
            .copied()
            .zip(self.rows.iter().map(|r| r.as_slice()))
    }

    /// Concatenate another record set of the same schema, preserving its
    /// row order after this one's.
    pub fn extend(&mut self, other: RecordSet) -> Result<(), ValidationError> {
        if other.columns.len() != self.columns.len() {
            return Err(ValidationError::ArityMismatch {
                expected: self.columns.len(),
                got: other.columns.len(),
            });
        }
        self.rows.extend(other.rows);
        self.tuple_ids.extend(other.tuple_ids);
        Ok(())
    }

    // Structural Operators

    /// Rows where `pred` is true, in input order, tuple ids preserved.
    pub fn filter(&self, pred: impl Fn(&[Value]) -> bool) -> RecordSet {
        let mut out = RecordSet {
            columns: Arc::clone(&self.columns),
            rows: Vec::new(),
            tuple_ids: Vec::new(),
        };
        for (tid, row) in self.iter() {
            if pred(row) {
                out.rows.push(row.to_vec());
                out.tuple_ids.push(tid);
            }
        }
        out
    }

    /// Keep only the named columns, optionally renaming, preserving row
    /// order and tuple ids.
    pub fn project(
        &self,
        fields: &[(String, Option<String>)],
    ) -> Result<RecordSet, ValidationError> {
        let mut indices = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for (name, alias) in fields {
            let idx = self
                .column_index(name)
                .ok_or_else(|| ValidationError::UnknownColumn(name.clone()))?;
            let mut def = self.columns[idx].clone();
            if let Some(alias) = alias {
                def.name = alias.clone();
            }
            indices.push(idx);
            columns.push(def);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|i| row[*i].clone()).collect())
            .collect();
        Ok(RecordSet {
            columns: Arc::new(columns),
            rows,
            tuple_ids: self.tuple_ids.clone(),
        })
    }

    /// Remove duplicate rows by structural equality; the first occurrence
    /// and its tuple id win.
    pub fn distinct(&self) -> RecordSet {
        let mut seen: HashSet<&[Value]> = HashSet::with_capacity(self.rows.len());
        let mut out = RecordSet {
            columns: Arc::clone(&self.columns),
            rows: Vec::new(),
            tuple_ids: Vec::new(),
        };
        for (i, row) in self.rows.iter().enumerate() {
            if seen.insert(row.as_slice()) {
                out.rows.push(row.clone());
                out.tuple_ids.push(self.tuple_ids[i]);
            }
        }
        out
    }

    /// Skip `skip` rows, keep the next up-to-`n`, preserving order.
    pub fn limit(&self, n: usize, skip: usize) -> RecordSet {
        let lo = skip.min(self.rows.len());
        let hi = lo.saturating_add(n).min(self.rows.len());
        RecordSet {
            columns: Arc::clone(&self.columns),
            rows: self.rows[lo..hi].to_vec(),
            tuple_ids: self.tuple_ids[lo..hi].to_vec(),
        }
    }

    // Aggregations (each a 1x1 record set)

    /// Row count as a `Long`.
    pub fn count(&self) -> RecordSet {
        singleton("count", ColumnType::Long, Value::Long(self.rows.len() as i64))
    }

    /// Whether any row exists, as a `Boolean`.
    pub fn exists(&self) -> RecordSet {
        singleton(
            "exists",
            ColumnType::Boolean,
            Value::Boolean(!self.rows.is_empty()),
        )
    }

    /// Minimum of a numeric column as a `Double`; +inf for empty input.
    pub fn min(&self, column: &str) -> Result<RecordSet, ValidationError> {
        self.fold_numeric(column, "min", f64::INFINITY, f64::min)
    }

    /// Maximum of a numeric column as a `Double`; -inf for empty input.
    pub fn max(&self, column: &str) -> Result<RecordSet, ValidationError> {
        self.fold_numeric(column, "max", f64::NEG_INFINITY, f64::max)
    }

    /// Sum of a numeric column as a `Double`; 0 for empty input.
    pub fn sum(&self, column: &str) -> Result<RecordSet, ValidationError> {
        self.fold_numeric(column, "sum", 0.0, |acc, v| acc + v)
    }

    /// Mean of a numeric column as a `Double`; NaN for empty input.
    pub fn mean(&self, column: &str) -> Result<RecordSet, ValidationError> {
        let idx = self.numeric_column(column)?;
        let mut sum = 0.0;
        let mut n = 0u64;
        for row in &self.rows {
            if let Ok(v) = row[idx].as_f64() {
                sum += v;
                n += 1;
            }
        }
        let name = format!("mean({})", self.columns[idx].short_name());
        Ok(singleton(
            &name,
            ColumnType::Double,
            Value::Double(sum / n as f64),
        ))
    }

    fn fold_numeric(
        &self,
        column: &str,
        op: &str,
        init: f64,
        fold: fn(f64, f64) -> f64,
    ) -> Result<RecordSet, ValidationError> {
        let idx = self.numeric_column(column)?;
        let mut acc = init;
        for row in &self.rows {
            // Nulls are skipped, never an error
            if let Ok(v) = row[idx].as_f64() {
                acc = fold(acc, v);
            }
        }
        let name = format!("{op}({})", self.columns[idx].short_name());
        Ok(singleton(&name, ColumnType::Double, Value::Double(acc)))
    }

    fn numeric_column(&self, column: &str) -> Result<usize, ValidationError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| ValidationError::UnknownColumn(column.to_string()))?;
        let def = &self.columns[idx];
        if def.column_type.is_numeric() {
            Ok(idx)
        } else {
            Err(ValidationError::NotNumeric {
                column: def.name.clone(),
                column_type: def.column_type.to_string(),
            })
        }
    }

    /// Rows sorted ascending by tuple id; used by serialising stages that
    /// need a deterministic order after a parallel merge.
    pub fn sorted_by_tuple_id(&self) -> RecordSet {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by_key(|i| self.tuple_ids[*i]);
        RecordSet {
            columns: Arc::clone(&self.columns),
            rows: order.iter().map(|i| self.rows[*i].clone()).collect(),
            tuple_ids: order.iter().map(|i| self.tuple_ids[*i]).collect(),
        }
    }
}

fn singleton(name: &str, column_type: ColumnType, value: Value) -> RecordSet {
    RecordSet {
        columns: Arc::new(vec![ColumnDef::new(name, column_type, false)]),
        rows: vec![vec![value]],
        tuple_ids: vec![0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_column_set() -> RecordSet {
        let mut rs = RecordSet::new(vec![
            ColumnDef::new("warren.rabbits.id", ColumnType::Int, false),
            ColumnDef::new("warren.rabbits.weight", ColumnType::Double, false),
        ]);
        for (tid, id, w) in [(1, 1, 2.5), (2, 2, 1.0), (3, 3, 2.5), (4, 2, 1.0)] {
            rs.append(tid, vec![Value::Int(id), Value::Double(w)]).unwrap();
        }
        rs
    }

    #[test]
    fn test_append_validates_types_and_arity() {
        let mut rs = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Int, false)]);
        assert!(rs.append(1, vec![Value::Int(1)]).is_ok());
        assert!(matches!(
            rs.append(2, vec![Value::Double(1.0)]),
            Err(ValidationError::TypeMismatch { .. })
        ));
        assert!(matches!(
            rs.append(3, vec![]),
            Err(ValidationError::ArityMismatch { .. })
        ));
        assert!(matches!(
            rs.append(4, vec![Value::Null]),
            Err(ValidationError::NullViolation { .. })
        ));
    }

    #[test]
    fn test_vector_size_violation_is_distinct_from_type() {
        let def = ColumnDef::new("v", ColumnType::DoubleVector { dim: 3 }, false);
        assert!(matches!(
            def.validate(&Value::double_vector(vec![1.0, 2.0])),
            Err(ValidationError::SizeMismatch {
                expected: 3,
                got: 2,
                ..
            })
        ));
        assert!(matches!(
            def.validate(&Value::Int(1)),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_filter_preserves_order_and_tuple_ids() {
        let rs = two_column_set();
        let filtered = rs.filter(|row| matches!(row[1], Value::Double(w) if w > 2.0));
        assert_eq!(filtered.len(), 2);
        let tids: Vec<TupleId> = filtered.iter().map(|(t, _)| t).collect();
        assert_eq!(tids, vec![1, 3]);
    }

    #[test]
    fn test_project_with_rename() {
        let rs = two_column_set();
        let projected = rs
            .project(&[("weight".to_string(), Some("kg".to_string()))])
            .unwrap();
        assert_eq!(projected.columns().len(), 1);
        assert_eq!(projected.columns()[0].name, "kg");
        assert_eq!(projected.len(), 4);
        assert_eq!(projected.row(0).unwrap().tuple_id, 1);
    }

    #[test]
    fn test_project_composes() {
        let rs = two_column_set();
        let once = rs
            .project(&[("id".to_string(), None), ("weight".to_string(), None)])
            .unwrap()
            .project(&[("weight".to_string(), None)])
            .unwrap();
        let direct = rs.project(&[("weight".to_string(), None)]).unwrap();
        assert_eq!(once, direct);
    }

    #[test]
    fn test_project_unknown_column() {
        let rs = two_column_set();
        assert!(matches!(
            rs.project(&[("ears".to_string(), None)]),
            Err(ValidationError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_distinct_first_occurrence_wins() {
        let rs = two_column_set();
        let d = rs.distinct();
        assert_eq!(d.len(), 3);
        // The duplicate row (2, 1.0) keeps the tuple id of its first
        // occurrence
        let tids: Vec<TupleId> = d.iter().map(|(t, _)| t).collect();
        assert_eq!(tids, vec![1, 2, 3]);
        // Idempotent
        assert_eq!(d.distinct(), d);
    }

    #[test]
    fn test_limit_and_skip() {
        let rs = two_column_set();
        let l = rs.limit(2, 1);
        assert_eq!(l.len(), 2);
        let tids: Vec<TupleId> = l.iter().map(|(t, _)| t).collect();
        assert_eq!(tids, vec![2, 3]);

        assert_eq!(rs.limit(10, 0).len(), 4);
        assert_eq!(rs.limit(10, 4).len(), 0);
        assert_eq!(rs.limit(0, 0).len(), 0);
        assert_eq!(rs.limit(usize::MAX, 2).len(), 2);
    }

    #[test]
    fn test_count_and_exists() {
        let rs = two_column_set();
        assert_eq!(rs.count().row(0).unwrap().values()[0], Value::Long(4));
        assert_eq!(
            rs.exists().row(0).unwrap().values()[0],
            Value::Boolean(true)
        );
        let empty = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Int, false)]);
        assert_eq!(empty.count().row(0).unwrap().values()[0], Value::Long(0));
        assert_eq!(
            empty.exists().row(0).unwrap().values()[0],
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_aggregates_widen_to_double() {
        let mut rs = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Int, false)]);
        for (tid, x) in [(1, 3), (2, 7), (3, 2)] {
            rs.append(tid, vec![Value::Int(x)]).unwrap();
        }
        assert_eq!(rs.max("x").unwrap().row(0).unwrap().values()[0], Value::Double(7.0));
        assert_eq!(rs.min("x").unwrap().row(0).unwrap().values()[0], Value::Double(2.0));
        assert_eq!(rs.sum("x").unwrap().row(0).unwrap().values()[0], Value::Double(12.0));
        assert_eq!(rs.mean("x").unwrap().row(0).unwrap().values()[0], Value::Double(4.0));
    }

    #[test]
    fn test_aggregates_on_empty_input() {
        let rs = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Double, false)]);
        let min = rs.min("x").unwrap();
        let max = rs.max("x").unwrap();
        let sum = rs.sum("x").unwrap();
        let mean = rs.mean("x").unwrap();
        assert_eq!(min.row(0).unwrap().values()[0], Value::Double(f64::INFINITY));
        assert_eq!(
            max.row(0).unwrap().values()[0],
            Value::Double(f64::NEG_INFINITY)
        );
        assert_eq!(sum.row(0).unwrap().values()[0], Value::Double(0.0));
        match mean.row(0).unwrap().values()[0] {
            Value::Double(d) => assert!(d.is_nan()),
            ref other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_rejects_non_numeric() {
        let rs = RecordSet::new(vec![ColumnDef::new("s", ColumnType::String, false)]);
        assert!(matches!(
            rs.sum("s"),
            Err(ValidationError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_sorted_by_tuple_id() {
        let mut rs = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Int, false)]);
        for (tid, x) in [(5, 50), (1, 10), (3, 30)] {
            rs.append(tid, vec![Value::Int(x)]).unwrap();
        }
        let sorted = rs.sorted_by_tuple_id();
        let tids: Vec<TupleId> = sorted.iter().map(|(t, _)| t).collect();
        assert_eq!(tids, vec![1, 3, 5]);
    }
}
