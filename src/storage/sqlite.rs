//! SQLite storage backend
//!
//! One database file holds every project: a `projects` row per project
//! plus its `objects` and `representations`. Persisting replaces a
//! project's rows inside a single transaction, so a reader never observes a
//! half-written editing context.

use super::traits::{
    EditingContextManager, ProjectSummary, StorageError, StorageResult, UNTITLED_PROJECT,
};
use crate::model::{
    EditingContext, ObjectId, ProjectId, RepresentationId, RepresentationKind,
    RepresentationMetadata, SemanticObject,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// SQLite-backed editing context storage
///
/// Thread-safe via internal mutex on the connection. Statements are small
/// and run inline on the calling project worker.
pub struct SqliteEditingContextManager {
    conn: Mutex<Connection>,
}

impl SqliteEditingContextManager {
    /// Open or create a database file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database (useful for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                metadata_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS objects (
                id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                label TEXT NOT NULL,
                parent_id TEXT,
                properties_json TEXT NOT NULL,
                references_json TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                PRIMARY KEY (project_id, id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_objects_parent
                ON objects(project_id, parent_id);

            CREATE TABLE IF NOT EXISTS representations (
                id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                label TEXT NOT NULL,
                description_id TEXT NOT NULL,
                target_object_id TEXT,
                layout_json TEXT NOT NULL,
                PRIMARY KEY (project_id, id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            PRAGMA foreign_keys = ON;

            -- readers (CLI `show`) do not block a running writer
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn write_context(tx: &Transaction<'_>, editing_context: &EditingContext) -> StorageResult<()> {
        let project_id = editing_context.project_id.to_string();

        tx.execute(
            r#"
            INSERT INTO projects (id, name, metadata_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                metadata_json = excluded.metadata_json
            "#,
            params![
                project_id,
                editing_context.project_name,
                serde_json::to_string(&editing_context.metadata)?,
            ],
        )?;

        tx.execute("DELETE FROM objects WHERE project_id = ?1", params![project_id])?;
        for object in editing_context.objects.values() {
            tx.execute(
                r#"
                INSERT INTO objects (id, project_id, kind, label, parent_id,
                                     properties_json, references_json, metadata_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    object.id.as_str(),
                    project_id,
                    object.kind,
                    object.label,
                    object.parent.as_ref().map(ObjectId::as_str),
                    serde_json::to_string(&object.properties)?,
                    serde_json::to_string(&object.references)?,
                    serde_json::to_string(&object.metadata)?,
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM representations WHERE project_id = ?1",
            params![project_id],
        )?;
        for representation in editing_context.representations.values() {
            tx.execute(
                r#"
                INSERT INTO representations (id, project_id, kind, label, description_id,
                                             target_object_id, layout_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    representation.id.to_string(),
                    project_id,
                    representation.kind.to_string(),
                    representation.label,
                    representation.description_id,
                    representation.target_object_id.as_ref().map(ObjectId::as_str),
                    serde_json::to_string(&representation.layout)?,
                ],
            )?;
        }

        Ok(())
    }

    /// Store the full state of an editing context
    pub fn save(&self, editing_context: &EditingContext) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::write_context(&tx, editing_context)?;
        tx.commit()?;
        debug!(
            project_id = %editing_context.project_id,
            objects = editing_context.objects.len(),
            representations = editing_context.representations.len(),
            "editing context saved"
        );
        Ok(())
    }

    /// Load a stored editing context
    pub fn load(&self, project_id: &ProjectId) -> StorageResult<Option<EditingContext>> {
        let conn = self.conn.lock();
        let id = project_id.to_string();

        let project_row: Option<(String, String)> = conn
            .query_row(
                "SELECT name, metadata_json FROM projects WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((name, metadata_json)) = project_row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, kind, label, parent_id, properties_json, references_json, metadata_json
             FROM objects WHERE project_id = ?1",
        )?;
        let object_rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut objects = BTreeMap::new();
        for row in object_rows {
            let (object_id, kind, label, parent, properties, references, metadata) = row?;
            let object = SemanticObject {
                id: ObjectId::from(object_id),
                kind,
                label,
                parent: parent.map(ObjectId::from),
                properties: serde_json::from_str(&properties)?,
                references: serde_json::from_str(&references)?,
                metadata: serde_json::from_str(&metadata)?,
            };
            objects.insert(object.id.clone(), object);
        }

        let mut stmt = conn.prepare(
            "SELECT id, kind, label, description_id, target_object_id, layout_json
             FROM representations WHERE project_id = ?1",
        )?;
        let representation_rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut representations = BTreeMap::new();
        for row in representation_rows {
            let (representation_id, kind, label, description_id, target, layout) = row?;
            let metadata = RepresentationMetadata {
                id: RepresentationId::from_str(&representation_id)
                    .map_err(|e| StorageError::InvalidData(format!("representation id: {}", e)))?,
                kind: parse_kind(&kind)?,
                label,
                description_id,
                target_object_id: target.map(ObjectId::from),
                layout: serde_json::from_str(&layout)?,
            };
            representations.insert(metadata.id, metadata);
        }

        Ok(Some(EditingContext {
            project_id: *project_id,
            project_name: name,
            objects,
            representations,
            metadata: serde_json::from_str(&metadata_json)?,
        }))
    }

    /// Delete a project and everything it contains
    pub fn delete_project(&self, project_id: &ProjectId) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM projects WHERE id = ?1",
            params![project_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn list_projects(&self) -> StorageResult<Vec<ProjectSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT p.id, p.name,
                   (SELECT COUNT(*) FROM objects o WHERE o.project_id = p.id),
                   (SELECT COUNT(*) FROM representations r WHERE r.project_id = p.id)
            FROM projects p
            ORDER BY p.name, p.id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut projects = Vec::new();
        for row in rows {
            let (id, name, object_count, representation_count) = row?;
            projects.push(ProjectSummary {
                id: ProjectId::from_str(&id)
                    .map_err(|e| StorageError::InvalidData(format!("project id: {}", e)))?,
                name,
                object_count: object_count as usize,
                representation_count: representation_count as usize,
            });
        }
        Ok(projects)
    }
}

fn parse_kind(kind: &str) -> StorageResult<RepresentationKind> {
    Ok(serde_json::from_value(serde_json::Value::String(
        kind.to_string(),
    ))?)
}

#[async_trait]
impl EditingContextManager for SqliteEditingContextManager {
    async fn create_editing_context(&self, project_id: ProjectId) -> StorageResult<EditingContext> {
        Ok(self
            .load(&project_id)?
            .unwrap_or_else(|| EditingContext::new(project_id, UNTITLED_PROJECT)))
    }

    async fn persist(&self, project_id: ProjectId, editing_context: &EditingContext) -> StorageResult<()> {
        if editing_context.project_id != project_id {
            return Err(StorageError::InvalidData(format!(
                "editing context of {} persisted as {}",
                editing_context.project_id, project_id
            )));
        }
        self.save(editing_context)
    }
}
