use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::{
    Document, DocumentStore, Fields, OrderBy, auto_id, resolve_server_timestamps, sort_documents,
};

/// Local document store: one row per document, fields kept as JSON.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable sqlite wal")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite store lock poisoned")
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields_json TEXT NOT NULL,
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn decode_fields(raw: &str) -> Result<Fields> {
    serde_json::from_str(raw).context("decode document fields")
}

fn encode_fields(fields: &Fields) -> Result<String> {
    serde_json::to_string(fields).context("encode document fields")
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                "SELECT fields_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("query document")?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        Ok(Some(Document {
            id: id.to_string(),
            fields: decode_fields(&raw)?,
        }))
    }

    fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let now = Utc::now();
        let fields = resolve_server_timestamps(fields, now);
        let json = encode_fields(&fields)?;
        let stamp = now.to_rfc3339();
        let id = auto_id();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO documents(collection, id, fields_json, create_time, update_time)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![collection, id, json, stamp],
        )
        .context("insert document")?;
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let now = Utc::now();
        let json = encode_fields(&resolve_server_timestamps(fields, now))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO documents(collection, id, fields_json, create_time, update_time)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE
             SET fields_json = excluded.fields_json, update_time = excluded.update_time",
            params![collection, id, json, now.to_rfc3339()],
        )
        .context("upsert document")?;
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let now = Utc::now();
        let mut conn = self.lock();
        let tx = conn.transaction().context("begin update transaction")?;
        let raw = tx
            .query_row(
                "SELECT fields_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("query document for update")?;
        let Some(raw) = raw else {
            return Err(anyhow!("no document to update: {collection}/{id}"));
        };
        let mut merged = decode_fields(&raw)?;
        merged.extend(resolve_server_timestamps(fields, now));
        tx.execute(
            "UPDATE documents SET fields_json = ?1, update_time = ?2
             WHERE collection = ?3 AND id = ?4",
            params![encode_fields(&merged)?, now.to_rfc3339(), collection, id],
        )
        .context("update document")?;
        tx.commit().context("commit update transaction")?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )
        .context("delete document")?;
        Ok(())
    }

    fn list_ordered(&self, collection: &str, order: &[OrderBy]) -> Result<Vec<Document>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, fields_json FROM documents WHERE collection = ?1")
            .context("prepare list documents query")?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("query list documents")?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, raw) = row.context("decode document row")?;
            docs.push(Document {
                id,
                fields: decode_fields(&raw)?,
            });
        }
        Ok(sort_documents(docs, order))
    }
}
