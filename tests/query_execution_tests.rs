//! End-to-End Query Execution Tests
//!
//! Tests for:
//! - kNN queries (plain, weighted, multi-query, filtered)
//! - Boolean predicate queries
//! - Aggregate projections
//! - Limit/skip
//! - Error mapping to wire status codes
//! - Timeout and cancellation

use burrowdb::entity::ColumnSpec;
use burrowdb::exec::{CancellationToken, Executor, TaskContext};
use burrowdb::plan::planner::Planner;
use burrowdb::plan::PlanNode;
use burrowdb::query::{
    execute_with_token, ComparisonOperator, KnnClause, Predicate, Projection, ProjectionField,
    ProjectionKind, QueryMessage,
};
use burrowdb::value::ColumnType;
use burrowdb::{Config, Database, QueryError, StatusCode, Value};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn vector_db() -> (Database, TempDir) {
    let tmp = TempDir::new().unwrap();
    let db = Database::open(Config::default().with_data_dir(tmp.path())).unwrap();
    db.create_schema("warren").unwrap();
    let entity = db
        .create_entity(
            "warren",
            "rabbits",
            &[
                ColumnSpec::new("v", ColumnType::DoubleVector { dim: 3 }),
                ColumnSpec::new("x", ColumnType::Int),
                ColumnSpec::new("name", ColumnType::String),
            ],
        )
        .unwrap();
    // Tuple ids 1..=5
    let rows = [
        ([1.0, 0.0, 0.0], 3, "a"),
        ([0.0, 1.0, 0.0], 7, "b"),
        ([0.0, 0.0, 1.0], 2, "c"),
        ([1.0, 1.0, 0.0], 7, "d"),
        ([1.0, 1.0, 1.0], 5, "e"),
    ];
    for (v, x, name) in rows {
        entity
            .insert(&[
                Value::double_vector(v.to_vec()),
                Value::Int(x),
                Value::string(name),
            ])
            .unwrap();
    }
    (db, tmp)
}

fn base_query() -> QueryMessage {
    QueryMessage {
        query_id: Some("test".into()),
        schema: "warren".into(),
        entity: "rabbits".into(),
        projection: Projection::select_all(),
        predicate: None,
        knn: None,
        limit: None,
        skip: None,
    }
}

fn knn(k: usize, query: Vec<f64>) -> KnnClause {
    KnnClause {
        column: "v".into(),
        k,
        distance: "l2".into(),
        queries: vec![query],
        weights: None,
    }
}

fn distances(results: &burrowdb::RecordSet) -> Vec<(u64, f64)> {
    results
        .iter()
        .map(|(tid, row)| {
            let d = results
                .column_index("distance")
                .map(|i| match row[i] {
                    Value::Double(d) => d,
                    ref other => panic!("distance was {other:?}"),
                })
                .unwrap();
            (tid, d)
        })
        .collect()
}

// ============================================================================
// kNN Scenarios
// ============================================================================

#[test]
fn test_knn_top2_returns_expected_neighbours() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.knn = Some(knn(2, vec![1.0, 0.0, 0.0]));

    let results = db.query(&msg).unwrap();
    assert_eq!(distances(&results), vec![(1, 0.0), (4, 1.0)]);
}

#[test]
fn test_weighted_knn_breaks_ties_by_earlier_row() {
    let tmp = TempDir::new().unwrap();
    let db = Database::open(Config::default().with_data_dir(tmp.path())).unwrap();
    db.create_schema("warren").unwrap();
    let entity = db
        .create_entity(
            "warren",
            "pairs",
            &[ColumnSpec::new("v", ColumnType::DoubleVector { dim: 3 })],
        )
        .unwrap();
    entity
        .insert(&[Value::double_vector(vec![1.0, 0.0, 0.0])])
        .unwrap();
    entity
        .insert(&[Value::double_vector(vec![0.0, 1.0, 1.0])])
        .unwrap();

    let mut msg = base_query();
    msg.entity = "pairs".into();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.knn = Some(KnnClause {
        column: "v".into(),
        k: 1,
        distance: "l2".into(),
        queries: vec![vec![0.0, 0.0, 0.0]],
        weights: Some(vec![vec![2.0, 1.0, 1.0]]),
    });

    let results = db.query(&msg).unwrap();
    let got = distances(&results);
    assert_eq!(got.len(), 1);
    // Both rows land at sqrt(2); the earlier-admitted row wins
    assert_eq!(got[0].0, 1);
    assert!((got[0].1 - 2.0f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_knn_with_projected_entity_columns() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["name", "distance"]);
    msg.knn = Some(knn(2, vec![1.0, 0.0, 0.0]));

    let results = db.query(&msg).unwrap();
    assert_eq!(results.len(), 2);
    let names: Vec<Value> = results
        .iter()
        .map(|(_, row)| row[results.column_index("name").unwrap()].clone())
        .collect();
    assert_eq!(names, vec![Value::string("a"), Value::string("d")]);
}

#[test]
fn test_knn_with_boolean_companion_filter() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.predicate = Some(Predicate::atom(
        "x",
        ComparisonOperator::Equal,
        vec![Value::Int(7)],
    ));
    msg.knn = Some(knn(2, vec![1.0, 0.0, 0.0]));

    // Only rows 2 and 4 pass the filter; row 4 is nearer
    let results = db.query(&msg).unwrap();
    let got = distances(&results);
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].0, 4);
    assert_eq!(got[1].0, 2);
}

#[test]
fn test_knn_multiple_query_vectors_group_in_order() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.knn = Some(KnnClause {
        column: "v".into(),
        k: 1,
        distance: "l2".into(),
        queries: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]],
        weights: None,
    });

    let results = db.query(&msg).unwrap();
    assert_eq!(distances(&results), vec![(1, 0.0), (3, 0.0)]);
}

#[test]
fn test_knn_respects_limit() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.knn = Some(knn(5, vec![1.0, 0.0, 0.0]));
    msg.limit = Some(3);

    let results = db.query(&msg).unwrap();
    assert_eq!(results.len(), 3);
}

// ============================================================================
// Boolean and Aggregate Queries
// ============================================================================

#[test]
fn test_count_projection() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::count();

    let results = db.query(&msg).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.row(0).unwrap().values()[0], Value::Long(5));
}

#[test]
fn test_max_widens_to_double() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::aggregate(ProjectionKind::Max, "x");

    let results = db.query(&msg).unwrap();
    assert_eq!(results.row(0).unwrap().values()[0], Value::Double(7.0));
}

#[test]
fn test_limit_two_skip_one() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection::select(&["name"]);
    msg.limit = Some(2);
    msg.skip = Some(1);

    let results = db.query(&msg).unwrap();
    let names: Vec<Value> = results.iter().map(|(_, r)| r[0].clone()).collect();
    assert_eq!(names, vec![Value::string("b"), Value::string("c")]);
}

#[test]
fn test_boolean_predicate_queries() {
    let (db, _tmp) = vector_db();

    let mut msg = base_query();
    msg.projection = Projection::select(&["name"]);
    msg.predicate = Some(
        Predicate::atom(
            "x",
            ComparisonOperator::Between,
            vec![Value::Int(3), Value::Int(7)],
        )
        .and(Predicate::atom(
            "name",
            ComparisonOperator::Like,
            vec![Value::string("%")],
        )),
    );
    let results = db.query(&msg).unwrap();
    assert_eq!(results.len(), 4);

    let mut msg = base_query();
    msg.projection = Projection::count();
    msg.predicate = Some(Predicate::atom(
        "x",
        ComparisonOperator::In,
        vec![Value::Int(2), Value::Int(3)],
    ));
    let results = db.query(&msg).unwrap();
    assert_eq!(results.row(0).unwrap().values()[0], Value::Long(2));
}

#[test]
fn test_exists_projection() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection {
        kind: ProjectionKind::Exists,
        fields: vec![],
    };
    msg.predicate = Some(Predicate::atom(
        "x",
        ComparisonOperator::Greater,
        vec![Value::Int(100)],
    ));
    let results = db.query(&msg).unwrap();
    assert_eq!(results.row(0).unwrap().values()[0], Value::Boolean(false));
}

#[test]
fn test_projection_rename() {
    let (db, _tmp) = vector_db();
    let mut msg = base_query();
    msg.projection = Projection {
        kind: ProjectionKind::Select,
        fields: vec![ProjectionField::aliased("name", "label")],
    };
    let results = db.query(&msg).unwrap();
    assert_eq!(results.columns()[0].name, "label");
}

// ============================================================================
// Sampled Scan Determinism
// ============================================================================

#[test]
fn test_sampled_plan_replays_identically() {
    let (db, _tmp) = vector_db();
    let entity = db.entity("warren", "rabbits").unwrap();
    let node = PlanNode::sampled_scan(
        entity.qualified_name(),
        entity.columns().to_vec(),
        entity.row_count(),
        3,
        1234,
    )
    .unwrap();

    let run = || {
        let stages = Planner::new(2).plan(&node).unwrap();
        let ctx = TaskContext::new(&db, CancellationToken::infinite());
        Executor::new(0).unwrap().execute(&stages, &ctx).unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

// ============================================================================
// Error Mapping and Cancellation
// ============================================================================

#[test]
fn test_error_status_codes() {
    let (db, _tmp) = vector_db();

    let mut msg = base_query();
    msg.entity = "foxes".into();
    assert_eq!(db.query(&msg).unwrap_err().status(), StatusCode::NotFound);

    let mut msg = base_query();
    msg.knn = Some(KnnClause {
        column: "v".into(),
        k: 2,
        distance: "l2".into(),
        queries: vec![vec![1.0, 0.0]], // wrong dimension
        weights: None,
    });
    assert_eq!(
        db.query(&msg).unwrap_err().status(),
        StatusCode::FailedPrecondition
    );

    let mut msg = base_query();
    msg.knn = Some(KnnClause {
        column: "v".into(),
        k: 0,
        distance: "l2".into(),
        queries: vec![vec![0.0; 3]],
        weights: None,
    });
    assert_eq!(
        db.query(&msg).unwrap_err().status(),
        StatusCode::InvalidArgument
    );
}

#[test]
fn test_pre_cancelled_query_reports_cancelled() {
    let (db, _tmp) = vector_db();
    let token = CancellationToken::infinite();
    token.cancel();
    let err = execute_with_token(&db, &base_query(), token).unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
    assert_eq!(err.status(), StatusCode::Cancelled);
}

#[test]
fn test_results_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = Config::default().with_data_dir(tmp.path());
    {
        let db = Database::open(config.clone()).unwrap();
        db.create_schema("warren").unwrap();
        let entity = db
            .create_entity(
                "warren",
                "rabbits",
                &[ColumnSpec::new("v", ColumnType::DoubleVector { dim: 2 })],
            )
            .unwrap();
        entity
            .insert(&[Value::double_vector(vec![0.0, 0.0])])
            .unwrap();
        entity
            .insert(&[Value::double_vector(vec![3.0, 4.0])])
            .unwrap();
        db.close().unwrap();
    }

    let db = Database::open(config).unwrap();
    let mut msg = base_query();
    msg.projection = Projection::select(&["tid", "distance"]);
    msg.knn = Some(KnnClause {
        column: "v".into(),
        k: 1,
        distance: "l2".into(),
        queries: vec![vec![3.0, 4.0]],
        weights: None,
    });
    let results = db.query(&msg).unwrap();
    assert_eq!(distances(&results), vec![(2, 0.0)]);
}
