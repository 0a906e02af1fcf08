//! kNN Tasks
//!
//! Combined scan-kNN evaluation: one pass over an entity's vector column
//! (optionally restricted by a boolean predicate) feeding one bounded
//! top-k heap per query vector. With `parallelism > 1` the tuple-id space
//! splits into equal contiguous ranges scanned concurrently; the heaps
//! are shared under a mutex taken only for the O(log k) admission.
//!
//! Null values are skipped locally and never produce an error. The result
//! carries `m * k` rows (fewer if fewer candidates exist): heap-ascending
//! within each query's group, groups in query order, with the source
//! tuple id both as row metadata and as an explicit `tid` column.

use super::{Task, TaskContext, ROW_BATCH};
use crate::distance::Distance;
use crate::entity::ScanTransaction;
use crate::error::{QueryError, QueryResult};
use crate::knn::BoundedKnnHeap;
use crate::query::{CompiledPredicate, Predicate};
use crate::record::{ColumnDef, RecordSet, TupleId};
use crate::value::{ColumnType, Value};
use parking_lot::Mutex;

/// Scan-kNN task, with an optional companion filter folded in.
pub struct KnnTask {
    pub entity: String,
    pub column: String,
    pub k: usize,
    pub distance: Distance,
    pub queries: Vec<Vec<f64>>,
    pub weights: Option<Vec<Vec<f64>>>,
    pub predicate: Option<Predicate>,
    pub parallelism: usize,
    pub cost: f64,
}

impl Task for KnnTask {
    fn id(&self) -> String {
        format!(
            "knn:{}.{}:k={}x{}:{}",
            self.entity,
            self.column,
            self.k,
            self.queries.len(),
            self.distance.name()
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, _inputs: &[RecordSet]) -> QueryResult<RecordSet> {
        let entity = ctx.entity(&self.entity)?;

        // The vector column scans first; predicate columns follow.
        let mut projection: Vec<&str> = vec![self.column.as_str()];
        if let Some(predicate) = &self.predicate {
            for col in predicate.columns() {
                if !projection.contains(&col) {
                    projection.push(col);
                }
            }
        }

        entity.scan(&projection, |tx| {
            let compiled = match &self.predicate {
                Some(p) => Some(p.compile(tx.columns()).map_err(QueryError::Bind)?),
                None => None,
            };

            let heaps: Vec<Mutex<BoundedKnnHeap>> = self
                .queries
                .iter()
                .map(|_| Mutex::new(BoundedKnnHeap::new(self.k)))
                .collect();

            let max = tx.max_tuple_id();
            let ranges = partition_ranges(1, max + 1, self.parallelism);
            if ranges.len() <= 1 {
                self.scan_range(ctx, tx, 1, max + 1, compiled.as_ref(), &heaps)?;
            } else {
                let failure: Mutex<Option<QueryError>> = Mutex::new(None);
                rayon::scope(|scope| {
                    for (lo, hi) in ranges {
                        let heaps = &heaps;
                        let compiled = compiled.as_ref();
                        let failure = &failure;
                        scope.spawn(move |_| {
                            if let Err(err) = self.scan_range(ctx, tx, lo, hi, compiled, heaps) {
                                ctx.token.cancel();
                                let mut slot = failure.lock();
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                            }
                        });
                    }
                });
                if let Some(err) = failure.into_inner() {
                    return Err(err);
                }
            }

            let mut out = RecordSet::new(knn_output_columns());
            for heap in heaps {
                for m in heap.into_inner().into_sorted() {
                    out.append_unchecked(
                        m.tuple_id,
                        vec![Value::Long(m.tuple_id as i64), Value::Double(m.distance)],
                    );
                }
            }
            Ok(out)
        })
    }
}

impl KnnTask {
    /// One sub-scan over `[lo, hi)` admitting every candidate into all
    /// query heaps.
    fn scan_range(
        &self,
        ctx: &TaskContext<'_>,
        tx: &ScanTransaction<'_>,
        lo: TupleId,
        hi: TupleId,
        predicate: Option<&CompiledPredicate>,
        heaps: &[Mutex<BoundedKnnHeap>],
    ) -> QueryResult<()> {
        let mut seen = 0u64;
        tx.for_each_range(lo, hi, |tid, values| {
            if seen % ROW_BATCH == 0 {
                ctx.token.check()?;
            }
            seen += 1;

            if let Some(predicate) = predicate {
                if !predicate.matches(&values) {
                    return Ok(());
                }
            }
            let candidate = &values[0];
            if candidate.is_null() {
                return Ok(());
            }
            let Ok(elements) = candidate.real_elements() else {
                return Ok(());
            };

            for (i, query) in self.queries.iter().enumerate() {
                let distance = match self.weights.as_ref().and_then(|w| w.get(i)) {
                    Some(weight) => self.distance.weighted_distance(query, &elements, weight),
                    None => self.distance.distance(query, &elements),
                };
                heaps[i].lock().insert(tid, distance);
            }
            Ok(())
        })
    }
}

/// Output schema of every kNN task.
pub fn knn_output_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("tid", ColumnType::Long, false),
        ColumnDef::new("distance", ColumnType::Double, false),
    ]
}

/// Split `[lo, hi)` into up to `parts` equal contiguous ranges.
pub(crate) fn partition_ranges(lo: TupleId, hi: TupleId, parts: usize) -> Vec<(TupleId, TupleId)> {
    if hi <= lo {
        return Vec::new();
    }
    let total = hi - lo;
    let parts = (parts.max(1) as u64).min(total);
    let chunk = total / parts;
    let remainder = total % parts;
    let mut ranges = Vec::with_capacity(parts as usize);
    let mut cursor = lo;
    for i in 0..parts {
        let len = chunk + u64::from(i < remainder);
        ranges.push((cursor, cursor + len));
        cursor += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Database;
    use crate::config::Config;
    use crate::entity::ColumnSpec;
    use crate::exec::CancellationToken;
    use crate::query::ComparisonOperator;
    use tempfile::TempDir;

    fn knn_db(vectors: &[Vec<f64>]) -> (Database, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(Config::default().with_data_dir(tmp.path())).unwrap();
        db.create_schema("warren").unwrap();
        let entity = db
            .create_entity(
                "warren",
                "rabbits",
                &[
                    ColumnSpec::new("pos", ColumnType::DoubleVector { dim: 3 }).nullable(),
                    ColumnSpec::new("kind", ColumnType::Int),
                ],
            )
            .unwrap();
        for (i, v) in vectors.iter().enumerate() {
            entity
                .insert(&[
                    Value::double_vector(v.clone()),
                    Value::Int(i as i32 % 2),
                ])
                .unwrap();
        }
        (db, tmp)
    }

    fn task(k: usize, queries: Vec<Vec<f64>>) -> KnnTask {
        KnnTask {
            entity: "warren.rabbits".into(),
            column: "pos".into(),
            k,
            distance: Distance::L2,
            queries,
            weights: None,
            predicate: None,
            parallelism: 1,
            cost: 0.0,
        }
    }

    fn rows(rs: &RecordSet) -> Vec<(i64, f64)> {
        rs.iter()
            .map(|(_, row)| match (&row[0], &row[1]) {
                (Value::Long(t), Value::Double(d)) => (*t, *d),
                other => panic!("unexpected row {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_knn_top2_literal_scenario() {
        let (db, _tmp) = knn_db(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 1.0, 1.0],
        ]);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let rs = task(2, vec![vec![1.0, 0.0, 0.0]]).execute(&ctx, &[]).unwrap();
        assert_eq!(rows(&rs), vec![(1, 0.0), (4, 1.0)]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let vectors: Vec<Vec<f64>> = (0..500)
            .map(|i| vec![f64::from(i % 37), f64::from(i % 11), f64::from(i % 5)])
            .collect();
        let (db, _tmp) = knn_db(&vectors);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());

        let sequential = task(7, vec![vec![3.0, 4.0, 1.0]])
            .execute(&ctx, &[])
            .unwrap();
        let mut parallel_task = task(7, vec![vec![3.0, 4.0, 1.0]]);
        parallel_task.parallelism = 4;
        let parallel = parallel_task.execute(&ctx, &[]).unwrap();

        // Distances must agree; tuple ids may differ among exact ties
        let d_seq: Vec<f64> = rows(&sequential).iter().map(|(_, d)| *d).collect();
        let d_par: Vec<f64> = rows(&parallel).iter().map(|(_, d)| *d).collect();
        assert_eq!(d_seq, d_par);
    }

    #[test]
    fn test_multiple_queries_group_in_order() {
        let (db, _tmp) = knn_db(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let rs = task(1, vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]])
            .execute(&ctx, &[])
            .unwrap();
        assert_eq!(rows(&rs), vec![(1, 0.0), (3, 0.0)]);
    }

    #[test]
    fn test_weighted_tie_break_prefers_earlier_row() {
        let (db, _tmp) = knn_db(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 1.0]]);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let mut t = task(1, vec![vec![0.0, 0.0, 0.0]]);
        t.weights = Some(vec![vec![2.0, 1.0, 1.0]]);
        let rs = t.execute(&ctx, &[]).unwrap();
        let got = rows(&rs);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, 1);
        assert!((got[0].1 - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_combined_filter_restricts_candidates() {
        let (db, _tmp) = knn_db(&[
            vec![1.0, 0.0, 0.0], // kind 0
            vec![0.9, 0.0, 0.0], // kind 1
            vec![0.8, 0.0, 0.0], // kind 0
        ]);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let mut t = task(2, vec![vec![1.0, 0.0, 0.0]]);
        t.predicate = Some(Predicate::atom(
            "kind",
            ComparisonOperator::Equal,
            vec![Value::Int(1)],
        ));
        let rs = t.execute(&ctx, &[]).unwrap();
        let got = rows(&rs);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, 2);
    }

    #[test]
    fn test_null_candidates_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(Config::default().with_data_dir(tmp.path())).unwrap();
        db.create_schema("warren").unwrap();
        let entity = db
            .create_entity(
                "warren",
                "rabbits",
                &[
                    ColumnSpec::new("pos", ColumnType::DoubleVector { dim: 3 }).nullable(),
                    ColumnSpec::new("kind", ColumnType::Int),
                ],
            )
            .unwrap();
        entity
            .insert(&[Value::double_vector(vec![1.0, 0.0, 0.0]), Value::Int(0)])
            .unwrap();
        entity.insert(&[Value::Null, Value::Int(0)]).unwrap();

        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let rs = task(5, vec![vec![0.0; 3]]).execute(&ctx, &[]).unwrap();
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn test_fewer_candidates_than_k() {
        let (db, _tmp) = knn_db(&[vec![1.0, 0.0, 0.0]]);
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        let rs = task(10, vec![vec![0.0; 3]]).execute(&ctx, &[]).unwrap();
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn test_partition_ranges_cover_exactly() {
        assert_eq!(partition_ranges(1, 11, 3), vec![(1, 5), (5, 8), (8, 11)]);
        assert_eq!(partition_ranges(1, 3, 8), vec![(1, 2), (2, 3)]);
        assert!(partition_ranges(5, 5, 2).is_empty());
    }
}
