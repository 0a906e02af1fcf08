//! Catalog: Database Context and Schema Management
//!
//! The [`Database`] is an explicit context object with an open/close
//! lifecycle; nothing in the crate touches process-wide state. It owns a
//! set of schemas, each schema a set of entities with lock-free concurrent
//! access, and persists the catalog (schemas, entities, column specs) as
//! JSON beside the column files so a reopened database sees the same
//! layout.

use crate::config::Config;
use crate::entity::{ColumnSpec, Entity};
use crate::error::{QueryError, QueryResult};
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const CATALOG_FILE: &str = "catalog.json";

/// Persisted catalog layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogMeta {
    schemas: Vec<SchemaMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaMeta {
    name: String,
    created_at: DateTime<Utc>,
    entities: Vec<EntityMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntityMeta {
    name: String,
    created_at: DateTime<Utc>,
    columns: Vec<ColumnSpec>,
}

/// A named group of entities.
pub struct Schema {
    name: String,
    created_at: DateTime<Utc>,
    entities: DashMap<String, Arc<Entity>>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity by name.
    pub fn entity(&self, name: &str) -> QueryResult<Arc<Entity>> {
        self.entities
            .get(name)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| QueryError::NotFound {
                kind: "entity",
                name: format!("{}.{name}", self.name),
            })
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.key().clone()).collect()
    }
}

/// The database context: configuration, schemas, and the storage beneath
/// them.
pub struct Database {
    config: Config,
    schemas: DashMap<String, Arc<Schema>>,
}

impl Database {
    /// Open the database at the configured data directory, loading any
    /// persisted catalog.
    pub fn open(config: Config) -> QueryResult<Database> {
        fs::create_dir_all(&config.storage.data_dir).map_err(StorageError::from)?;
        let db = Database {
            schemas: DashMap::new(),
            config,
        };

        let meta_path = db.catalog_path();
        if meta_path.exists() {
            let raw = fs::read_to_string(&meta_path).map_err(StorageError::from)?;
            let meta: CatalogMeta = serde_json::from_str(&raw).map_err(StorageError::from)?;
            for schema_meta in meta.schemas {
                let schema = Arc::new(Schema {
                    name: schema_meta.name.clone(),
                    created_at: schema_meta.created_at,
                    entities: DashMap::new(),
                });
                for entity_meta in schema_meta.entities {
                    let dir = db.entity_dir(&schema_meta.name, &entity_meta.name);
                    let entity = Entity::open(
                        &dir,
                        &schema_meta.name,
                        &entity_meta.name,
                        &entity_meta.columns,
                        db.config.storage.flush_on_write,
                    )?;
                    schema
                        .entities
                        .insert(entity_meta.name.clone(), Arc::new(entity));
                }
                db.schemas.insert(schema_meta.name.clone(), schema);
            }
        }

        tracing::info!(
            data_dir = %db.config.storage.data_dir.display(),
            schemas = db.schemas.len(),
            "database opened"
        );
        Ok(db)
    }

    /// Flush every entity and persist the catalog.
    pub fn close(&self) -> QueryResult<()> {
        for schema in self.schemas.iter() {
            for entity in schema.entities.iter() {
                entity.flush()?;
            }
        }
        self.save_catalog()?;
        tracing::info!("database closed");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a new, empty schema.
    pub fn create_schema(&self, name: &str) -> QueryResult<()> {
        if self.schemas.contains_key(name) {
            return Err(QueryError::Bind(format!("schema {name} already exists")));
        }
        self.schemas.insert(
            name.to_string(),
            Arc::new(Schema {
                name: name.to_string(),
                created_at: Utc::now(),
                entities: DashMap::new(),
            }),
        );
        self.save_catalog()?;
        tracing::info!(schema = name, "created schema");
        Ok(())
    }

    /// Drop a schema and all its entities' files.
    pub fn drop_schema(&self, name: &str) -> QueryResult<()> {
        let (_, _schema) = self
            .schemas
            .remove(name)
            .ok_or_else(|| QueryError::NotFound {
                kind: "schema",
                name: name.to_string(),
            })?;
        let dir = self.config.storage.data_dir.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(StorageError::from)?;
        }
        self.save_catalog()?;
        tracing::info!(schema = name, "dropped schema");
        Ok(())
    }

    /// Create an entity with the given columns inside a schema.
    pub fn create_entity(
        &self,
        schema_name: &str,
        entity_name: &str,
        columns: &[ColumnSpec],
    ) -> QueryResult<Arc<Entity>> {
        let schema = self.schema(schema_name)?;
        if schema.entities.contains_key(entity_name) {
            return Err(QueryError::Bind(format!(
                "entity {schema_name}.{entity_name} already exists"
            )));
        }
        let dir = self.entity_dir(schema_name, entity_name);
        let entity = Arc::new(Entity::create(
            &dir,
            schema_name,
            entity_name,
            columns,
            self.config.storage.flush_on_write,
        )?);
        schema
            .entities
            .insert(entity_name.to_string(), Arc::clone(&entity));
        self.save_catalog()?;
        Ok(entity)
    }

    /// Drop an entity and its files.
    pub fn drop_entity(&self, schema_name: &str, entity_name: &str) -> QueryResult<()> {
        let schema = self.schema(schema_name)?;
        schema
            .entities
            .remove(entity_name)
            .ok_or_else(|| QueryError::NotFound {
                kind: "entity",
                name: format!("{schema_name}.{entity_name}"),
            })?;
        let dir = self.entity_dir(schema_name, entity_name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(StorageError::from)?;
        }
        self.save_catalog()?;
        tracing::info!(entity = %format!("{schema_name}.{entity_name}"), "dropped entity");
        Ok(())
    }

    /// Schema by name.
    pub fn schema(&self, name: &str) -> QueryResult<Arc<Schema>> {
        self.schemas
            .get(name)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| QueryError::NotFound {
                kind: "schema",
                name: name.to_string(),
            })
    }

    /// Entity by schema and name.
    pub fn entity(&self, schema_name: &str, entity_name: &str) -> QueryResult<Arc<Entity>> {
        self.schema(schema_name)?.entity(entity_name)
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.iter().map(|s| s.key().clone()).collect()
    }

    fn catalog_path(&self) -> PathBuf {
        self.config.storage.data_dir.join(CATALOG_FILE)
    }

    fn entity_dir(&self, schema: &str, entity: &str) -> PathBuf {
        self.config.storage.data_dir.join(schema).join(entity)
    }

    fn save_catalog(&self) -> QueryResult<()> {
        let mut meta = CatalogMeta::default();
        for schema in self.schemas.iter() {
            let mut entities = Vec::new();
            for entity in schema.entities.iter() {
                entities.push(EntityMeta {
                    name: entity.name().to_string(),
                    created_at: Utc::now(),
                    columns: entity
                        .columns()
                        .iter()
                        .map(|c| ColumnSpec {
                            name: c.short_name().to_string(),
                            column_type: c.column_type.clone(),
                            nullable: c.nullable,
                        })
                        .collect(),
                });
            }
            entities.sort_by(|a, b| a.name.cmp(&b.name));
            meta.schemas.push(SchemaMeta {
                name: schema.name.clone(),
                created_at: schema.created_at,
                entities,
            });
        }
        meta.schemas.sort_by(|a, b| a.name.cmp(&b.name));
        let raw = serde_json::to_string_pretty(&meta).map_err(StorageError::from)?;
        fs::write(self.catalog_path(), raw).map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ColumnType, Value};
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = Config::default().with_data_dir(tmp.path());
        (Database::open(config).unwrap(), tmp)
    }

    #[test]
    fn test_create_and_lookup() {
        let (db, _tmp) = test_db();
        db.create_schema("warren").unwrap();
        db.create_entity(
            "warren",
            "rabbits",
            &[ColumnSpec::new("id", ColumnType::Int)],
        )
        .unwrap();

        assert!(db.entity("warren", "rabbits").is_ok());
        assert!(matches!(
            db.entity("warren", "foxes"),
            Err(QueryError::NotFound { kind: "entity", .. })
        ));
        assert!(matches!(
            db.entity("forest", "rabbits"),
            Err(QueryError::NotFound { kind: "schema", .. })
        ));
    }

    #[test]
    fn test_duplicate_creation_fails() {
        let (db, _tmp) = test_db();
        db.create_schema("warren").unwrap();
        assert!(matches!(
            db.create_schema("warren"),
            Err(QueryError::Bind(_))
        ));
        db.create_entity("warren", "r", &[ColumnSpec::new("id", ColumnType::Int)])
            .unwrap();
        assert!(matches!(
            db.create_entity("warren", "r", &[ColumnSpec::new("id", ColumnType::Int)]),
            Err(QueryError::Bind(_))
        ));
    }

    #[test]
    fn test_catalog_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = Config::default().with_data_dir(tmp.path());
        {
            let db = Database::open(config.clone()).unwrap();
            db.create_schema("warren").unwrap();
            let entity = db
                .create_entity(
                    "warren",
                    "rabbits",
                    &[
                        ColumnSpec::new("id", ColumnType::Int),
                        ColumnSpec::new("pos", ColumnType::DoubleVector { dim: 2 }).nullable(),
                    ],
                )
                .unwrap();
            entity
                .insert(&[Value::Int(1), Value::double_vector(vec![1.0, 2.0])])
                .unwrap();
            db.close().unwrap();
        }

        let db = Database::open(config).unwrap();
        let entity = db.entity("warren", "rabbits").unwrap();
        assert_eq!(entity.row_count(), 1);
        let def = entity.column("pos").unwrap();
        assert_eq!(def.column_type, ColumnType::DoubleVector { dim: 2 });
        assert!(def.nullable);
    }

    #[test]
    fn test_drop_entity_removes_files() {
        let (db, tmp) = test_db();
        db.create_schema("warren").unwrap();
        db.create_entity("warren", "r", &[ColumnSpec::new("id", ColumnType::Int)])
            .unwrap();
        let dir = tmp.path().join("warren").join("r");
        assert!(dir.exists());
        db.drop_entity("warren", "r").unwrap();
        assert!(!dir.exists());
        assert!(db.entity("warren", "r").is_err());
    }
}
