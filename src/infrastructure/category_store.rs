//! Generic per-category persistence
//!
//! One `CategoryStore` per product category, all driven by the category's
//! [`SchemaDescriptor`]. Table layout:
//!
//! ```text
//! id        INTEGER PRIMARY KEY   -- ProductId::from_name(name)
//! name      TEXT NOT NULL UNIQUE
//! ...       descriptor fields in order
//! synced_at INTEGER               -- UTC microseconds of the last upsert
//! ```
//!
//! Writes go through the database's single writer connection, reads through
//! the read-only pool.

#![allow(clippy::uninlined_format_args)]

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, Row};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::domain::{FieldKind, FieldRow, FieldValue, PriceRange, ProductCategory, ProductId, ProductRecord, SchemaDescriptor};
use crate::infrastructure::catalog_error::CatalogResult;
use crate::infrastructure::database_connection::CatalogDatabase;

pub const SYNCED_AT_COLUMN: &str = "synced_at";
const SYNCED_AT_DEFINITION: &str = "INTEGER NOT NULL DEFAULT 0";

#[derive(Debug, Clone)]
pub struct CategoryStore {
    db: CatalogDatabase,
    schema: &'static SchemaDescriptor,
    select_columns: String,
    update_sql: String,
    insert_sql: String,
}

impl CategoryStore {
    pub fn new(db: CatalogDatabase, category: ProductCategory) -> Self {
        let schema = category.schema();
        let table = schema.table;
        let columns: Vec<&str> = schema.fields.iter().map(|field| field.column).collect();

        let assignments: Vec<String> = columns.iter().map(|column| format!("{column} = ?")).collect();
        let update_sql = format!(
            "UPDATE {table} SET {}, {SYNCED_AT_COLUMN} = ? WHERE id = ?",
            assignments.join(", ")
        );

        let placeholders = vec!["?"; columns.len() + 2].join(", ");
        let insert_sql = format!(
            "INSERT INTO {table} (id, {}, {SYNCED_AT_COLUMN}) VALUES ({placeholders})",
            columns.join(", ")
        );

        Self {
            db,
            schema,
            select_columns: columns.join(", "),
            update_sql,
            insert_sql,
        }
    }

    pub fn category(&self) -> ProductCategory {
        self.schema.category
    }

    pub fn table(&self) -> &'static str {
        self.schema.table
    }

    /// Create the table if absent and add any descriptor columns an older
    /// table lacks. Columns are never dropped or renamed.
    pub async fn ensure_schema(&self) -> CatalogResult<()> {
        let table = self.schema.table;
        let mut tx = self.db.writer().begin().await?;

        let column_defs: Vec<String> = self
            .schema
            .fields
            .iter()
            .map(|field| {
                if field.column == self.schema.identity_column {
                    format!("{} TEXT NOT NULL UNIQUE", field.column)
                } else {
                    format!("{} {}", field.column, field.kind.sql_definition())
                }
            })
            .collect();

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY NOT NULL, {}, {SYNCED_AT_COLUMN} {SYNCED_AT_DEFINITION})",
            column_defs.join(", ")
        ))
        .execute(&mut *tx)
        .await?;

        let existing: HashSet<String> = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;

        let mut added = Vec::new();
        for field in self.schema.fields {
            if !existing.contains(field.column) {
                sqlx::query(&format!(
                    "ALTER TABLE {table} ADD COLUMN {} {}",
                    field.column,
                    field.kind.sql_definition()
                ))
                .execute(&mut *tx)
                .await?;
                added.push(field.column);
            }
        }
        if !existing.contains(SYNCED_AT_COLUMN) {
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN {SYNCED_AT_COLUMN} {SYNCED_AT_DEFINITION}"
            ))
            .execute(&mut *tx)
            .await?;
            added.push(SYNCED_AT_COLUMN);
        }

        sqlx::query(&format!("CREATE INDEX IF NOT EXISTS idx_{table}_price ON {table}(price)"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if added.is_empty() {
            debug!(table, "Schema up to date");
        } else {
            info!(table, columns = ?added, "🔧 Added missing columns");
        }
        Ok(())
    }

    /// Update by identity, inserting when no row matched. Both statements run
    /// in one transaction.
    pub async fn upsert(&self, record: &ProductRecord, synced_at: DateTime<Utc>) -> CatalogResult<()> {
        let row = record.to_field_row();
        let id = record.id();
        let stamp = synced_at.timestamp_micros();

        let mut tx = self.db.writer().begin().await?;

        let mut update_args = SqliteArguments::default();
        bind_values(&mut update_args, &row)?;
        update_args.add(stamp).map_err(sqlx::Error::Encode)?;
        update_args.add(id.0).map_err(sqlx::Error::Encode)?;

        let updated = sqlx::query_with(&self.update_sql, update_args)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            let mut insert_args = SqliteArguments::default();
            insert_args.add(id.0).map_err(sqlx::Error::Encode)?;
            bind_values(&mut insert_args, &row)?;
            insert_args.add(stamp).map_err(sqlx::Error::Encode)?;

            sqlx::query_with(&self.insert_sql, insert_args)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Records priced within `range`, ordered by name ascending.
    pub async fn query(&self, range: PriceRange) -> CatalogResult<Vec<ProductRecord>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE price BETWEEN ? AND ? ORDER BY name ASC",
            self.select_columns, self.schema.table
        ))
        .bind(range.min())
        .bind(range.max())
        .fetch_all(self.db.reader())
        .await?;

        rows.iter().map(|row| self.decode(row)).collect()
    }

    pub async fn get(&self, id: ProductId) -> CatalogResult<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = ?",
            self.select_columns, self.schema.table
        ))
        .bind(id.0)
        .fetch_optional(self.db.reader())
        .await?;

        row.as_ref().map(|row| self.decode(row)).transpose()
    }

    pub async fn count(&self) -> CatalogResult<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.schema.table))
            .fetch_one(self.db.reader())
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Delete rows last synced before `cutoff`. Returns the number removed.
    pub async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> CatalogResult<u64> {
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE {SYNCED_AT_COLUMN} < ?",
            self.schema.table
        ))
        .bind(cutoff.timestamp_micros())
        .execute(self.db.writer())
        .await?
        .rows_affected();

        if deleted > 0 {
            info!(table = self.schema.table, deleted, "🧹 Swept stale rows");
        }
        Ok(deleted)
    }

    fn decode(&self, row: &SqliteRow) -> CatalogResult<ProductRecord> {
        let mut fields = FieldRow::new(self.schema);
        for field in self.schema.fields {
            let value = match field.kind {
                FieldKind::Text => FieldValue::Text(row.try_get(field.column)?),
                FieldKind::OptionalText => FieldValue::OptionalText(row.try_get(field.column)?),
                FieldKind::Integer => FieldValue::Integer(row.try_get(field.column)?),
                FieldKind::Flag => FieldValue::Flag(row.try_get(field.column)?),
            };
            fields.set(field.column, value);
        }
        Ok(ProductRecord::from_field_row(&fields))
    }
}

fn bind_values(args: &mut SqliteArguments<'_>, row: &FieldRow) -> CatalogResult<()> {
    for value in row.values() {
        let added = match value.clone() {
            FieldValue::Text(text) => args.add(text),
            FieldValue::OptionalText(text) => args.add(text),
            FieldValue::Integer(number) => args.add(number),
            FieldValue::Flag(flag) => args.add(flag),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Headphone, Speaker};
    use chrono::Duration;
    use tempfile::{TempDir, tempdir};

    async fn open_store(category: ProductCategory) -> (TempDir, CategoryStore) {
        let dir = tempdir().expect("temp dir");
        let db = CatalogDatabase::open(dir.path().join("store.sqlite3"), 2)
            .await
            .expect("open db");
        let store = CategoryStore::new(db, category);
        store.ensure_schema().await.expect("schema");
        (dir, store)
    }

    fn speaker(name: &str, price: i64) -> ProductRecord {
        ProductRecord::Speaker(Speaker {
            name: name.into(),
            price,
            url: None,
            image_url: Some(format!("https://img/{name}")),
            self_powered: price > 500,
        })
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let (_dir, store) = open_store(ProductCategory::Headphones).await;
        store.ensure_schema().await.expect("second call");
        store.ensure_schema().await.expect("third call");
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn ensure_schema_adds_missing_columns() {
        let dir = tempdir().expect("temp dir");
        let db = CatalogDatabase::open(dir.path().join("legacy.sqlite3"), 2)
            .await
            .expect("open db");
        sqlx::query("CREATE TABLE speakers (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL UNIQUE, price INTEGER NOT NULL DEFAULT 0)")
            .execute(db.writer())
            .await
            .expect("legacy table");

        let store = CategoryStore::new(db.clone(), ProductCategory::Speakers);
        store.ensure_schema().await.expect("migrate");

        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('speakers')")
            .fetch_all(db.reader())
            .await
            .expect("columns");
        for expected in ["url", "image_url", "self_powered", SYNCED_AT_COLUMN] {
            assert!(columns.iter().any(|c| c == expected), "missing {expected}");
        }

        store.upsert(&speaker("LS50", 1000), Utc::now()).await.expect("upsert after migration");
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn upsert_twice_updates_instead_of_duplicating() {
        let (_dir, store) = open_store(ProductCategory::Speakers).await;

        store.upsert(&speaker("LS50", 1000), Utc::now()).await.expect("insert");
        store.upsert(&speaker("LS50", 1100), Utc::now()).await.expect("update");

        assert_eq!(store.count().await.expect("count"), 1);
        let stored = store
            .get(ProductId::from_name("LS50"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored, speaker("LS50", 1100));
    }

    #[tokio::test]
    async fn query_filters_inclusive_range_and_sorts_by_name() {
        let (_dir, store) = open_store(ProductCategory::Speakers).await;
        for (name, price) in [("Delta", 2000), ("Alpha", 999), ("Charlie", 10), ("Bravo", 500)] {
            store.upsert(&speaker(name, price), Utc::now()).await.expect("upsert");
        }

        let records = store.query(PriceRange::new(0, 1000)).await.expect("query");
        let names: Vec<_> = records.iter().map(ProductRecord::name).collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);

        let edge = store.query(PriceRange::new(2000, 2000)).await.expect("query");
        assert_eq!(edge.len(), 1);
    }

    #[tokio::test]
    async fn optional_fields_round_trip_through_storage() {
        let (_dir, store) = open_store(ProductCategory::Headphones).await;
        let record = ProductRecord::Headphone(Headphone {
            name: "HD600".into(),
            price: 300,
            url: None,
            review_url: Some("r1".into()),
            image_url: None,
            amp_required: true,
            back_type: "open".into(),
            frequency_response_type: "neutral".into(),
        });

        store.upsert(&record, Utc::now()).await.expect("upsert");

        let records = store.query(PriceRange::FULL).await.expect("query");
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn concurrent_upserts_serialize_on_the_single_writer() {
        let (_dir, store) = open_store(ProductCategory::Speakers).await;
        let synced_at = Utc::now();
        // 50 writes over 20 names, so most names are written more than once.
        let records: Vec<_> = (0..50).map(|i| speaker(&format!("Model {:02}", i % 20), i)).collect();

        let results = futures::future::join_all(records.iter().map(|record| store.upsert(record, synced_at))).await;

        let errors: Vec<String> = results
            .iter()
            .filter_map(|result| result.as_ref().err().map(ToString::to_string))
            .collect();
        assert!(errors.is_empty(), "concurrent upserts failed: {errors:?}");
        assert!(!errors.iter().any(|e| e.contains("database is locked") || e.contains("busy")));
        assert_eq!(store.count().await.expect("count"), 20);
    }

    #[tokio::test]
    async fn sweep_removes_only_rows_older_than_cutoff() {
        let (_dir, store) = open_store(ProductCategory::Speakers).await;
        let previous_run = Utc::now() - Duration::minutes(5);
        let current_run = Utc::now();

        store.upsert(&speaker("Old", 100), previous_run).await.expect("upsert");
        store.upsert(&speaker("Kept", 200), current_run).await.expect("upsert");

        let deleted = store.sweep_older_than(current_run).await.expect("sweep");

        assert_eq!(deleted, 1);
        let names: Vec<_> = store
            .query(PriceRange::FULL)
            .await
            .expect("query")
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["Kept".to_string()]);
    }
}
