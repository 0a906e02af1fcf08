//! Entities and Scan Transactions
//!
//! An entity is one physical table: a set of typed column stores sharing a
//! tuple-id space. Reads go through a scoped transaction obtained from
//! [`Entity::scan`]; the transaction is released on every exit path of the
//! caller's closure. Any number of read transactions may run concurrently;
//! a write transaction (insert) excludes readers and other writers.

use crate::error::{QueryError, QueryResult};
use crate::record::{ColumnDef, TupleId};
use crate::storage::ColumnStore;
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column description used when creating an entity and persisted in the
/// catalog metadata. Names here are short; the entity qualifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: crate::value::ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: crate::value::ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// One physical table.
pub struct Entity {
    schema: String,
    name: String,
    columns: Vec<ColumnDef>,
    stores: Vec<ColumnStore>,
    flush_on_write: bool,
    /// Readers share; inserts take it exclusively.
    latch: RwLock<()>,
}

impl Entity {
    /// Create the entity's column files under `dir`.
    pub fn create(
        dir: &Path,
        schema: &str,
        name: &str,
        specs: &[ColumnSpec],
        flush_on_write: bool,
    ) -> QueryResult<Entity> {
        if specs.is_empty() {
            return Err(QueryError::Bind(format!(
                "entity {schema}.{name} needs at least one column"
            )));
        }
        std::fs::create_dir_all(dir).map_err(crate::storage::StorageError::from)?;
        let mut columns = Vec::with_capacity(specs.len());
        let mut stores = Vec::with_capacity(specs.len());
        for spec in specs {
            let path = dir.join(format!("{}.col", spec.name));
            stores.push(ColumnStore::create(
                &path,
                spec.column_type.clone(),
                spec.nullable,
            )?);
            columns.push(ColumnDef::new(
                format!("{schema}.{name}.{}", spec.name),
                spec.column_type.clone(),
                spec.nullable,
            ));
        }
        tracing::info!(entity = %format!("{schema}.{name}"), columns = specs.len(), "created entity");
        Ok(Entity {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            stores,
            flush_on_write,
            latch: RwLock::new(()),
        })
    }

    /// Open existing column files under `dir`.
    pub fn open(
        dir: &Path,
        schema: &str,
        name: &str,
        specs: &[ColumnSpec],
        flush_on_write: bool,
    ) -> QueryResult<Entity> {
        let mut columns = Vec::with_capacity(specs.len());
        let mut stores = Vec::with_capacity(specs.len());
        for spec in specs {
            let path = dir.join(format!("{}.col", spec.name));
            let store = ColumnStore::open(&path)?;
            columns.push(ColumnDef::new(
                format!("{schema}.{name}.{}", spec.name),
                store.column_type().clone(),
                store.nullable(),
            ));
            stores.push(store);
        }
        Ok(Entity {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            stores,
            flush_on_write,
            latch: RwLock::new(()),
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified `schema.entity` name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column definition by fully-qualified or short name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name == name || c.short_name() == name)
    }

    pub fn row_count(&self) -> u64 {
        self.stores.first().map_or(0, ColumnStore::row_count)
    }

    /// Largest assigned tuple id; scans iterate `1..=max_tuple_id()`.
    pub fn max_tuple_id(&self) -> TupleId {
        self.stores.first().map_or(0, ColumnStore::max_tuple_id)
    }

    /// Insert one row under a write transaction. Values arrive in column
    /// order; nulls for non-nullable columns take the column default.
    pub fn insert(&self, values: &[Value]) -> QueryResult<TupleId> {
        let _write = self.latch.write();
        if values.len() != self.columns.len() {
            return Err(QueryError::Type(format!(
                "row of {} values does not match entity {} with {} columns",
                values.len(),
                self.qualified_name(),
                self.columns.len()
            )));
        }
        let mut resolved = Vec::with_capacity(values.len());
        for (def, value) in self.columns.iter().zip(values.iter()) {
            let value = if value.is_null() && !def.nullable {
                def.column_type.default_value()
            } else {
                value.clone()
            };
            def.validate(&value)?;
            resolved.push(value);
        }

        let mut assigned: Option<TupleId> = None;
        for (store, value) in self.stores.iter().zip(resolved.iter()) {
            let tid = store.append(value)?;
            match assigned {
                None => assigned = Some(tid),
                Some(prev) => debug_assert_eq!(prev, tid, "column stores out of step"),
            }
        }
        if self.flush_on_write {
            self.flush()?;
        }
        Ok(assigned.unwrap_or(0))
    }

    /// Insert many rows, each through the same validation as
    /// [`Entity::insert`].
    pub fn insert_many(&self, rows: &[Vec<Value>]) -> QueryResult<Vec<TupleId>> {
        let mut tids = Vec::with_capacity(rows.len());
        for row in rows {
            tids.push(self.insert(row)?);
        }
        Ok(tids)
    }

    /// Persist all column stores.
    pub fn flush(&self) -> QueryResult<()> {
        for store in &self.stores {
            store.flush()?;
        }
        Ok(())
    }

    /// Run `f` inside a read transaction projected to `projection`
    /// (fully-qualified or short column names). The transaction is
    /// released when `f` returns, on success and error alike.
    pub fn scan<R>(
        &self,
        projection: &[&str],
        f: impl FnOnce(&ScanTransaction<'_>) -> QueryResult<R>,
    ) -> QueryResult<R> {
        let _read = self.latch.read();
        let mut columns = Vec::with_capacity(projection.len());
        let mut stores = Vec::with_capacity(projection.len());
        for name in projection {
            let idx = self
                .columns
                .iter()
                .position(|c| c.name == *name || c.short_name() == *name)
                .ok_or_else(|| QueryError::NotFound {
                    kind: "column",
                    name: format!("{}.{name}", self.qualified_name()),
                })?;
            columns.push(self.columns[idx].clone());
            stores.push(&self.stores[idx]);
        }
        let tx = ScanTransaction {
            columns,
            stores,
            max_tuple_id: self.max_tuple_id(),
        };
        f(&tx)
    }
}

/// Read-only cursor state over an entity's rows, scoped to one
/// [`Entity::scan`] call.
pub struct ScanTransaction<'a> {
    columns: Vec<ColumnDef>,
    stores: Vec<&'a ColumnStore>,
    max_tuple_id: TupleId,
}

impl ScanTransaction<'_> {
    /// The projected column definitions, in projection order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn max_tuple_id(&self) -> TupleId {
        self.max_tuple_id
    }

    /// Read the projected values of one row.
    pub fn read(&self, tuple_id: TupleId) -> QueryResult<Vec<Value>> {
        let mut values = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            values.push(store.read(tuple_id)?);
        }
        Ok(values)
    }

    /// Iterate every row in ascending tuple-id order. The action's error
    /// aborts the scan and propagates, which is also the cancellation
    /// path: tasks return `QueryError::Cancelled` from the action.
    pub fn for_each(
        &self,
        action: impl FnMut(TupleId, Vec<Value>) -> QueryResult<()>,
    ) -> QueryResult<()> {
        self.for_each_range(1, self.max_tuple_id + 1, action)
    }

    /// Iterate tuple ids in `[lo, hi)`, ascending.
    pub fn for_each_range(
        &self,
        lo: TupleId,
        hi: TupleId,
        mut action: impl FnMut(TupleId, Vec<Value>) -> QueryResult<()>,
    ) -> QueryResult<()> {
        let lo = lo.max(1);
        let hi = hi.min(self.max_tuple_id + 1);
        for tid in lo..hi {
            action(tid, self.read(tid)?)?;
        }
        Ok(())
    }

    /// Iterate every row where `pred` holds over the projected values.
    pub fn for_each_filtered(
        &self,
        pred: impl Fn(&[Value]) -> bool,
        action: impl FnMut(TupleId, Vec<Value>) -> QueryResult<()>,
    ) -> QueryResult<()> {
        self.for_each_range_filtered(1, self.max_tuple_id + 1, pred, action)
    }

    /// Ranged variant of [`ScanTransaction::for_each_filtered`].
    pub fn for_each_range_filtered(
        &self,
        lo: TupleId,
        hi: TupleId,
        pred: impl Fn(&[Value]) -> bool,
        mut action: impl FnMut(TupleId, Vec<Value>) -> QueryResult<()>,
    ) -> QueryResult<()> {
        self.for_each_range(lo, hi, |tid, values| {
            if pred(&values) {
                action(tid, values)
            } else {
                Ok(())
            }
        })
    }
}
