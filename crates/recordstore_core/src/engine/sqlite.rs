//! SQLite reference engine.
//!
//! # Responsibility
//! - Persist records of any entity as JSON field maps in one table.
//! - Keep unsaved changes in per-scope change sets and overlay them on reads.
//! - Bind each store file to one model name and entity layout.
//!
//! # Invariants
//! - Root scope saves validate every write and commit in one transaction.
//! - A failed save leaves the scope's pending changes untouched.
//! - Lock order is child pending, parent pending, then connection.

use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::StoreConfig;
use crate::db::open_store;
use crate::engine::eval::evaluate;
use crate::engine::pending::{PendingChanges, RecordKey};
use crate::engine::validation::validate_record;
use crate::engine::{AsyncFetch, EngineError, EngineResult, Scope, StorageEngine};
use crate::model::record::RecordId;
use crate::model::schema::Schema;
use crate::model::value::FieldMap;
use crate::query::request::FetchRequest;
use crate::query::result::ResultRow;

const META_MODEL_NAME: &str = "model_name";
const META_LAYOUT: &str = "layout_signature";

struct StoreFile {
    conn: Mutex<Connection>,
    schema: Arc<Schema>,
}

impl StoreFile {
    fn lock_conn(&self, operation: &'static str) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::LockPoisoned(operation))
    }

    fn commit(&self, changes: &PendingChanges) -> EngineResult<()> {
        for (key, fields) in changes.writes() {
            validate_record(&self.schema, &key.entity, fields)?;
        }

        let mut conn = self.lock_conn("save")?;
        let tx = conn.transaction()?;
        for key in changes.deletes() {
            tx.execute(
                "DELETE FROM records WHERE entity = ?1 AND id = ?2;",
                params![key.entity, key.id.to_string()],
            )?;
        }
        for (key, fields) in changes.writes() {
            tx.execute(
                "INSERT INTO records (entity, id, fields)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity, id) DO UPDATE SET
                    fields = excluded.fields,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![key.entity, key.id.to_string(), serde_json::to_string(fields)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_rows(&self, entity: &str) -> EngineResult<BTreeMap<RecordId, FieldMap>> {
        let conn = self.lock_conn("fetch")?;
        let mut stmt = conn.prepare("SELECT id, fields FROM records WHERE entity = ?1;")?;
        let raw = stmt
            .query_map(params![entity], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, fields)| {
                let id = RecordId::parse_str(&id).map_err(|err| {
                    EngineError::InvalidData(format!("bad record id `{id}`: {err}"))
                })?;
                let fields: FieldMap = serde_json::from_str(&fields)?;
                Ok((id, fields))
            })
            .collect()
    }

    /// Runs `request` over stored rows with `overlays` applied root first.
    fn run(&self, request: &FetchRequest, overlays: &[PendingChanges]) -> EngineResult<Vec<ResultRow>> {
        if self.schema.entity(&request.entity).is_none() {
            return Err(EngineError::UnknownEntity(request.entity.clone()));
        }
        let mut rows = self.load_rows(&request.entity)?;
        for overlay in overlays {
            overlay.overlay(&request.entity, &mut rows);
        }
        evaluate(request, rows)
    }
}

fn read_metadata(conn: &Connection, key: &str) -> EngineResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM store_metadata WHERE key = ?1;",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

/// Binds a fresh store file to `schema`, or checks an existing binding.
fn bind_model(conn: &Connection, schema: &Schema) -> EngineResult<()> {
    let layout = schema.layout_signature()?;
    let stored_name = read_metadata(conn, META_MODEL_NAME)?;
    let stored_layout = read_metadata(conn, META_LAYOUT)?;

    match (stored_name, stored_layout) {
        (None, None) => {
            conn.execute(
                "INSERT INTO store_metadata (key, value) VALUES (?1, ?2), (?3, ?4);",
                params![META_MODEL_NAME, schema.name, META_LAYOUT, layout],
            )?;
            Ok(())
        }
        (Some(name), Some(stored)) if name == schema.name && stored == layout => Ok(()),
        (Some(name), Some(_)) if name == schema.name => Err(EngineError::ModelMismatch {
            stored: name,
            requested: format!("{} with a changed entity layout", schema.name),
        }),
        (name, _) => Err(EngineError::ModelMismatch {
            stored: name.unwrap_or_else(|| "<unknown>".to_string()),
            requested: schema.name.clone(),
        }),
    }
}

/// Engine storing all records of one model in a SQLite file.
pub struct SqliteEngine {
    file: Arc<StoreFile>,
    view: Arc<SqliteScope>,
}

impl StorageEngine for SqliteEngine {
    type Scope = SqliteScope;

    fn open(schema: Arc<Schema>, config: &StoreConfig) -> EngineResult<Self> {
        schema.validate()?;
        let conn = open_store(config)?;
        bind_model(&conn, &schema)?;

        let file = Arc::new(StoreFile {
            conn: Mutex::new(conn),
            schema,
        });
        let view = Arc::new(SqliteScope::new(Arc::clone(&file), None));
        Ok(Self { file, view })
    }

    fn view_scope(&self) -> Arc<SqliteScope> {
        Arc::clone(&self.view)
    }

    fn new_scope(&self, parent: Option<&Arc<SqliteScope>>) -> Arc<SqliteScope> {
        Arc::new(SqliteScope::new(Arc::clone(&self.file), parent.cloned()))
    }
}

/// Change scope of a [`SqliteEngine`].
pub struct SqliteScope {
    file: Arc<StoreFile>,
    parent: Option<Arc<SqliteScope>>,
    pending: Mutex<PendingChanges>,
}

impl SqliteScope {
    fn new(file: Arc<StoreFile>, parent: Option<Arc<SqliteScope>>) -> Self {
        Self {
            file,
            parent,
            pending: Mutex::new(PendingChanges::default()),
        }
    }

    fn lock_pending(&self, operation: &'static str) -> EngineResult<MutexGuard<'_, PendingChanges>> {
        self.pending
            .lock()
            .map_err(|_| EngineError::LockPoisoned(operation))
    }

    fn ensure_entity(&self, entity: &str) -> EngineResult<()> {
        match self.file.schema.entity(entity) {
            Some(_) => Ok(()),
            None => Err(EngineError::UnknownEntity(entity.to_string())),
        }
    }

    fn record_write(&self, entity: &str, id: RecordId, fields: FieldMap) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        self.lock_pending("write")?
            .write(RecordKey::new(entity, id), fields);
        Ok(())
    }

    /// Snapshots the pending changes visible from this scope, root first.
    fn overlays(&self) -> EngineResult<Vec<PendingChanges>> {
        let mut overlays = vec![self.lock_pending("fetch")?.clone()];
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            overlays.push(scope.lock_pending("fetch")?.clone());
            current = scope.parent.clone();
        }
        overlays.reverse();
        Ok(overlays)
    }
}

impl Scope for SqliteScope {
    fn parent(&self) -> Option<Arc<Self>> {
        self.parent.clone()
    }

    fn has_pending_changes(&self) -> EngineResult<bool> {
        Ok(!self.lock_pending("has_pending_changes")?.is_empty())
    }

    fn save(&self) -> EngineResult<()> {
        let mut pending = self.lock_pending("save")?;
        if pending.is_empty() {
            return Ok(());
        }

        if let Some(parent) = &self.parent {
            let mut parent_pending = parent.lock_pending("save")?;
            parent_pending.absorb(std::mem::take(&mut *pending));
            return Ok(());
        }

        let started_at = Instant::now();
        let writes = pending.writes().count();
        let deletes = pending.deletes().count();
        match self.file.commit(&pending) {
            Ok(()) => {
                *pending = PendingChanges::default();
                info!(
                    "event=scope_commit module=engine status=ok writes={writes} deletes={deletes} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=scope_commit module=engine status=error writes={writes} deletes={deletes} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn insert(&self, entity: &str, id: RecordId, fields: FieldMap) -> EngineResult<()> {
        self.record_write(entity, id, fields)
    }

    fn update(&self, entity: &str, id: RecordId, fields: FieldMap) -> EngineResult<()> {
        self.record_write(entity, id, fields)
    }

    fn delete(&self, entity: &str, id: RecordId) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        self.lock_pending("delete")?.delete(RecordKey::new(entity, id));
        Ok(())
    }

    fn fetch(&self, request: &FetchRequest) -> EngineResult<Vec<ResultRow>> {
        let overlays = self.overlays()?;
        self.file.run(request, &overlays)
    }

    fn fetch_async(&self, request: &FetchRequest) -> EngineResult<AsyncFetch> {
        let overlays = self.overlays()?;
        let file = Arc::clone(&self.file);
        let request = request.clone();
        Ok(AsyncFetch::spawn(move || file.run(&request, &overlays)))
    }
}
