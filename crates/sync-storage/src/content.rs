//! SQLite content source.
//!
//! Reads a WordPress-shaped schema:
//! - `{prefix}posts(ID, post_title, post_content, post_excerpt, post_name,
//!   post_status, post_type, post_date)`
//! - `{prefix}postmeta(meta_id, post_id, meta_key, meta_value)`
//!
//! The connection is behind a mutex so the source can be shared across
//! the scheduler's tasks.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use sync_types::{ContentItem, ContentSource, ItemId, SyncError};

use crate::error::StorageError;

/// Columns copied into [`ContentItem::attributes`], in select order.
const POST_COLUMNS: &[&str] = &[
    "ID",
    "post_title",
    "post_content",
    "post_excerpt",
    "post_name",
    "post_status",
    "post_type",
    "post_date",
];

/// Content source backed by a SQLite database
pub struct SqliteContentSource {
    conn: Mutex<Connection>,
    posts_table: String,
    meta_table: String,
}

impl SqliteContentSource {
    /// Open an existing content database.
    pub fn open(path: &Path, table_prefix: &str) -> Result<Self, StorageError> {
        info!("Opening content database at {:?}", path);
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table_prefix)
    }

    /// In-memory database with the schema created. Used by tests.
    pub fn in_memory(table_prefix: &str) -> Result<Self, StorageError> {
        let source = Self::with_connection(Connection::open_in_memory()?, table_prefix)?;
        source.create_schema()?;
        Ok(source)
    }

    fn with_connection(conn: Connection, table_prefix: &str) -> Result<Self, StorageError> {
        // The prefix is spliced into SQL text.
        if !table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StorageError::Key(format!(
                "Invalid table prefix: {}",
                table_prefix
            )));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            posts_table: format!("{}posts", table_prefix),
            meta_table: format!("{}postmeta", table_prefix),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Poisoned(e.to_string()))
    }

    /// Create the content tables if they do not exist.
    pub fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {posts} (
                ID INTEGER PRIMARY KEY,
                post_title TEXT NOT NULL DEFAULT '',
                post_content TEXT NOT NULL DEFAULT '',
                post_excerpt TEXT NOT NULL DEFAULT '',
                post_name TEXT NOT NULL DEFAULT '',
                post_status TEXT NOT NULL DEFAULT 'publish',
                post_type TEXT NOT NULL DEFAULT 'post',
                post_date TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_{posts}_type_status ON {posts}(post_type, post_status);

            CREATE TABLE IF NOT EXISTS {meta} (
                meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                meta_key TEXT NOT NULL,
                meta_value TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_{meta}_post_key ON {meta}(post_id, meta_key);
            "#,
            posts = self.posts_table,
            meta = self.meta_table,
        ))?;
        Ok(())
    }

    /// Insert or replace a row in the posts table.
    pub fn insert_item(&self, item: &ContentItem) -> Result<(), StorageError> {
        let text = |name: &str| {
            item.attribute(name)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        };
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (ID, post_title, post_content, post_excerpt, post_name, post_status, post_type, post_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                self.posts_table
            ),
            params![
                item.id as i64,
                item.title,
                text("post_content"),
                text("post_excerpt"),
                text("post_name"),
                item.status,
                item.item_type,
                text("post_date"),
            ],
        )?;
        Ok(())
    }

    /// Append a meta row.
    pub fn put_meta(&self, item_id: ItemId, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
                self.meta_table
            ),
            params![item_id as i64, key, value],
        )?;
        Ok(())
    }

    /// Delete a post row and its meta rows.
    pub fn delete_item(&self, item_id: ItemId) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE post_id = ?1", self.meta_table),
            params![item_id as i64],
        )?;
        conn.execute(
            &format!("DELETE FROM {} WHERE ID = ?1", self.posts_table),
            params![item_id as i64],
        )?;
        Ok(())
    }

    fn list_items(
        &self,
        types: &[String],
        statuses: &[String],
    ) -> Result<Vec<ContentItem>, StorageError> {
        if types.is_empty() || statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = |n: usize| vec!["?"; n].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE post_type IN ({}) AND post_status IN ({}) ORDER BY ID",
            POST_COLUMNS.join(", "),
            self.posts_table,
            placeholders(types.len()),
            placeholders(statuses.len()),
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(types.iter().chain(statuses.iter())), |row| {
            let id: i64 = row.get(0)?;
            let mut attributes = Map::new();
            attributes.insert(POST_COLUMNS[0].to_string(), Value::from(id));
            for (idx, column) in POST_COLUMNS.iter().enumerate().skip(1) {
                let value: Option<String> = row.get(idx)?;
                attributes.insert(
                    column.to_string(),
                    value.map(Value::String).unwrap_or(Value::Null),
                );
            }
            Ok((id, attributes))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, attributes) = row?;
            let text = |name: &str| {
                attributes
                    .get(name)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            items.push(ContentItem {
                id: id as ItemId,
                item_type: text("post_type"),
                title: text("post_title"),
                status: text("post_status"),
                attributes,
            });
        }
        debug!(count = items.len(), "Listed content items");
        Ok(items)
    }

    fn meta_value(&self, item_id: ItemId, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.lock()?;
        let value: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT meta_value FROM {} WHERE post_id = ?1 AND meta_key = ?2 ORDER BY meta_id LIMIT 1",
                    self.meta_table
                ),
                params![item_id as i64, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| v.map(Value::String).unwrap_or(Value::Null)))
    }

    fn type_of(&self, item_id: ItemId) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let item_type = conn
            .query_row(
                &format!("SELECT post_type FROM {} WHERE ID = ?1", self.posts_table),
                params![item_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(item_type)
    }
}

impl ContentSource for SqliteContentSource {
    fn list_content_items(
        &self,
        types: &[String],
        statuses: &[String],
    ) -> Result<Vec<ContentItem>, SyncError> {
        Ok(self.list_items(types, statuses)?)
    }

    fn get_meta(&self, item_id: ItemId, key: &str) -> Result<Option<Value>, SyncError> {
        Ok(self.meta_value(item_id, key)?)
    }

    fn item_type(&self, item_id: ItemId) -> Result<Option<String>, SyncError> {
        Ok(self.type_of(item_id)?)
    }
}
