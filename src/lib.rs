//! # Burrow DB
//!
//! A column-oriented database engine for mixed boolean-and-similarity
//! queries over scalar and high-dimensional vector data.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! QueryMessage
//!     ↓
//! [Binder]        → validated logical plan over the catalog
//!     ↓
//! [Planner]       → execution stages (scan / knn / transform tasks)
//!     ↓
//! [Executor]      → tasks in dependency order, parallel within a stage
//!     ↓
//! RecordSet       → streamed back in paged batches
//! ```
//!
//! ## Storage Architecture
//!
//! ```text
//! Database (explicit context, open/close lifecycle)
//!     ├── Schemas → Entities (catalog persisted as JSON)
//!     ├── Entity → one paged ColumnStore per column
//!     └── ColumnStore → BufferPool → fixed-size Pages (little-endian)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use burrowdb::{Config, Database};
//! use burrowdb::entity::ColumnSpec;
//! use burrowdb::query::{KnnClause, Projection, QueryMessage};
//! use burrowdb::value::{ColumnType, Value};
//!
//! let db = Database::open(Config::default())?;
//! db.create_schema("warren")?;
//! let rabbits = db.create_entity("warren", "rabbits", &[
//!     ColumnSpec::new("pos", ColumnType::DoubleVector { dim: 3 }),
//! ])?;
//! rabbits.insert(&[Value::double_vector(vec![1.0, 0.0, 0.0])])?;
//!
//! let results = db.query(&QueryMessage {
//!     query_id: None,
//!     schema: "warren".into(),
//!     entity: "rabbits".into(),
//!     projection: Projection::select(&["distance"]),
//!     predicate: None,
//!     knn: Some(KnnClause {
//!         column: "pos".into(),
//!         k: 2,
//!         distance: "l2".into(),
//!         queries: vec![vec![1.0, 0.0, 0.0]],
//!         weights: None,
//!     }),
//!     limit: None,
//!     skip: None,
//! })?;
//! # Ok::<(), burrowdb::QueryError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod distance;
pub mod entity;
pub mod error;
pub mod exec;
pub mod knn;
pub mod plan;
pub mod query;
pub mod record;
pub mod storage;
pub mod value;

pub use catalog::Database;
pub use config::Config;
pub use distance::Distance;
pub use error::{QueryError, QueryResult, StatusCode};
pub use knn::BoundedKnnHeap;
pub use record::{ColumnDef, Record, RecordSet, TupleId};
pub use value::{ColumnType, Value};
