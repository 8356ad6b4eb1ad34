//! SQLite persistence for sessions, gear sets, bug reports, and the API
//! access audit log.

use crate::error::{Result, WayfarerError};
use crate::models::{AccessLogEntry, ApiStats, AuditEntry, BugReport, GearSetRecord, Session};
use chrono::{DateTime, Duration, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(WayfarerError::Pool)?;

        let db = Self { pool };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(WayfarerError::Pool)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.connection()?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        let tx = conn.transaction()?;

        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                uuid TEXT PRIMARY KEY,
                character_config TEXT NOT NULL DEFAULT '{}',
                ui_config TEXT NOT NULL DEFAULT '{}',
                last_updated TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS gear_sets (
                id TEXT PRIMARY KEY,
                session_uuid TEXT NOT NULL,
                name TEXT NOT NULL,
                slots_json TEXT NOT NULL DEFAULT '{}',
                export_string TEXT,
                is_optimized INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (session_uuid) REFERENCES sessions(uuid) ON DELETE CASCADE,
                UNIQUE(session_uuid, name)
            );

            CREATE TABLE IF NOT EXISTS bug_reports (
                id TEXT PRIMARY KEY,
                original_session_uuid TEXT NOT NULL,
                snapshot_session_uuid TEXT NOT NULL,
                description TEXT NOT NULL,
                app_version TEXT,
                browser_info TEXT,
                timestamp TIMESTAMP NOT NULL,
                screenshots_json TEXT NOT NULL DEFAULT '[]',
                reviewed BOOLEAN NOT NULL DEFAULT 0,
                reviewed_at TIMESTAMP,
                reviewed_by TEXT,
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS api_access_audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_uuid TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                timestamp TIMESTAMP NOT NULL,
                user_agent TEXT,
                ip_address TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_gear_sets_session ON gear_sets(session_uuid);
            CREATE INDEX IF NOT EXISTS idx_audit_session ON api_access_audit(session_uuid);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON api_access_audit(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_endpoint ON api_access_audit(endpoint);
            "#,
        )?;

        tx.commit()?;
        Ok(())
    }

    // Sessions

    pub fn get_session(&self, uuid: &str) -> Result<Option<Session>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT uuid, character_config, ui_config, last_updated FROM sessions WHERE uuid = ?",
            params![uuid],
            session_from_row,
        )
        .optional()
        .map_err(WayfarerError::Database)
    }

    /// Fetch a session, creating an empty one on first access.
    pub fn get_or_create_session(&self, uuid: &str) -> Result<Session> {
        if let Some(session) = self.get_session(uuid)? {
            return Ok(session);
        }
        let now = Utc::now();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (uuid, character_config, ui_config, last_updated)
             VALUES (?, '{}', '{}', ?)",
            params![uuid, now.to_rfc3339()],
        )?;
        tracing::debug!("Created session {}", uuid);
        Ok(Session {
            uuid: uuid.to_string(),
            character_config: Value::Object(Default::default()),
            ui_config: Value::Object(Default::default()),
            last_updated: now,
        })
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (uuid, character_config, ui_config, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(uuid) DO UPDATE SET
                 character_config = ?2, ui_config = ?3, last_updated = ?4",
            params![
                session.uuid,
                serde_json::to_string(&session.character_config)?,
                serde_json::to_string(&session.ui_config)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Replace a session's character config wholesale.
    pub fn set_character_config(&self, uuid: &str, config: &Value) -> Result<()> {
        let mut session = self.get_or_create_session(uuid)?;
        session.character_config = config.clone();
        self.save_session(&session)
    }

    /// Apply one dot-path update to a session's stored config.
    ///
    /// UI preference paths are routed to `ui_config`: anything starting
    /// with "ui." (prefix stripped), item hide flags, quality overrides,
    /// and custom stats. Everything else lands in `character_config`.
    /// Missing intermediate objects are created along the way.
    pub fn update_config_path(&self, uuid: &str, path: &str, value: Value) -> Result<Session> {
        let mut session = self.get_or_create_session(uuid)?;

        let segments: Vec<&str> = path.split('.').collect();
        let (target, effective): (&mut Value, Vec<&str>) = if segments[0] == "ui" {
            (&mut session.ui_config, segments[1..].to_vec())
        } else if is_ui_path(&segments) {
            (&mut session.ui_config, segments.clone())
        } else {
            (&mut session.character_config, segments.clone())
        };
        if effective.is_empty() {
            return Err(WayfarerError::Validation(format!(
                "empty config path '{}'",
                path
            )));
        }
        set_json_path(target, &effective, value)?;

        self.save_session(&session)?;
        // Reread so last_updated reflects what was stored.
        self.get_session(uuid)?
            .ok_or_else(|| WayfarerError::NotFound(format!("session '{}'", uuid)))
    }

    // Gear sets

    pub fn list_gear_sets(&self, session_uuid: &str) -> Result<Vec<GearSetRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_uuid, name, slots_json, export_string, is_optimized,
                    created_at, updated_at
             FROM gear_sets WHERE session_uuid = ? ORDER BY updated_at DESC",
        )?;
        let records = stmt
            .query_map(params![session_uuid], gear_set_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn get_gear_set(&self, id: &str) -> Result<Option<GearSetRecord>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT id, session_uuid, name, slots_json, export_string, is_optimized,
                    created_at, updated_at
             FROM gear_sets WHERE id = ?",
            params![id],
            gear_set_from_row,
        )
        .optional()
        .map_err(WayfarerError::Database)
    }

    /// Create a gear set. Names are unique per session.
    pub fn create_gear_set(
        &self,
        session_uuid: &str,
        name: &str,
        slots: &Value,
        export_string: Option<&str>,
        is_optimized: bool,
    ) -> Result<GearSetRecord> {
        self.get_or_create_session(session_uuid)?;
        if self.gear_set_by_name(session_uuid, name)?.is_some() {
            return Err(WayfarerError::DuplicateEntry(format!(
                "gear set '{}'",
                name
            )));
        }

        let record = GearSetRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_uuid: session_uuid.to_string(),
            name: name.to_string(),
            slots: slots.clone(),
            export_string: export_string.map(String::from),
            is_optimized,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO gear_sets
                 (id, session_uuid, name, slots_json, export_string, is_optimized,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.session_uuid,
                record.name,
                serde_json::to_string(&record.slots)?,
                record.export_string,
                record.is_optimized,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    /// Update an existing gear set. Renames are rejected when the new
    /// name is already taken in the session.
    pub fn update_gear_set(
        &self,
        id: &str,
        name: Option<&str>,
        slots: Option<&Value>,
        export_string: Option<&str>,
    ) -> Result<GearSetRecord> {
        let mut record = self
            .get_gear_set(id)?
            .ok_or_else(|| WayfarerError::NotFound(format!("gear set '{}'", id)))?;

        if let Some(new_name) = name {
            if new_name != record.name {
                if let Some(existing) = self.gear_set_by_name(&record.session_uuid, new_name)? {
                    if existing.id != record.id {
                        return Err(WayfarerError::DuplicateEntry(format!(
                            "gear set '{}'",
                            new_name
                        )));
                    }
                }
                record.name = new_name.to_string();
            }
        }
        if let Some(slots) = slots {
            record.slots = slots.clone();
        }
        if let Some(export) = export_string {
            record.export_string = Some(export.to_string());
        }
        record.updated_at = Utc::now();

        let conn = self.connection()?;
        conn.execute(
            "UPDATE gear_sets SET name = ?, slots_json = ?, export_string = ?, updated_at = ?
             WHERE id = ?",
            params![
                record.name,
                serde_json::to_string(&record.slots)?,
                record.export_string,
                record.updated_at.to_rfc3339(),
                record.id,
            ],
        )?;
        Ok(record)
    }

    /// Upsert a gear set: by id when it exists, falling back to the
    /// session-unique name, creating otherwise.
    pub fn save_gear_set(
        &self,
        session_uuid: &str,
        id: Option<&str>,
        name: &str,
        slots: &Value,
        export_string: Option<&str>,
        is_optimized: bool,
    ) -> Result<GearSetRecord> {
        if let Some(id) = id {
            if self.get_gear_set(id)?.is_some() {
                return self.update_gear_set(id, Some(name), Some(slots), export_string);
            }
        }
        if let Some(existing) = self.gear_set_by_name(session_uuid, name)? {
            return self.update_gear_set(&existing.id, None, Some(slots), export_string);
        }
        self.create_gear_set(session_uuid, name, slots, export_string, is_optimized)
    }

    pub fn delete_gear_set(&self, id: &str) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn.execute("DELETE FROM gear_sets WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    fn gear_set_by_name(&self, session_uuid: &str, name: &str) -> Result<Option<GearSetRecord>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT id, session_uuid, name, slots_json, export_string, is_optimized,
                    created_at, updated_at
             FROM gear_sets WHERE session_uuid = ? AND name = ?",
            params![session_uuid, name],
            gear_set_from_row,
        )
        .optional()
        .map_err(WayfarerError::Database)
    }

    // Bug reports

    /// File a bug report, snapshotting the reporter's session (and its
    /// gear sets) under a fresh uuid so later edits cannot change what
    /// the reviewer sees.
    pub fn create_bug_report(
        &self,
        session_uuid: &str,
        description: &str,
        app_version: Option<&str>,
        browser_info: Option<&str>,
        screenshots: &[String],
    ) -> Result<BugReport> {
        let session = self.get_or_create_session(session_uuid)?;
        let snapshot_uuid = uuid::Uuid::new_v4().to_string();
        let snapshot = Session {
            uuid: snapshot_uuid.clone(),
            ..session
        };
        self.save_session(&snapshot)?;
        for gear_set in self.list_gear_sets(session_uuid)? {
            self.create_gear_set(
                &snapshot_uuid,
                &gear_set.name,
                &gear_set.slots,
                gear_set.export_string.as_deref(),
                gear_set.is_optimized,
            )?;
        }

        let report = BugReport {
            id: uuid::Uuid::new_v4().to_string(),
            original_session_uuid: session_uuid.to_string(),
            snapshot_session_uuid: snapshot_uuid,
            description: description.to_string(),
            app_version: app_version.map(String::from),
            browser_info: browser_info.map(String::from),
            timestamp: Utc::now(),
            screenshots: screenshots.to_vec(),
            reviewed: false,
            reviewed_at: None,
            reviewed_by: None,
            notes: None,
        };
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO bug_reports
                 (id, original_session_uuid, snapshot_session_uuid, description,
                  app_version, browser_info, timestamp, screenshots_json, reviewed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)",
            params![
                report.id,
                report.original_session_uuid,
                report.snapshot_session_uuid,
                report.description,
                report.app_version,
                report.browser_info,
                report.timestamp.to_rfc3339(),
                serde_json::to_string(&report.screenshots)?,
            ],
        )?;
        tracing::info!("Bug report {} filed for session {}", report.id, session_uuid);
        Ok(report)
    }

    /// List bug reports, newest first, optionally filtered by review
    /// status.
    pub fn get_bug_reports(&self, reviewed: Option<bool>) -> Result<Vec<BugReport>> {
        let conn = self.connection()?;
        let base = "SELECT id, original_session_uuid, snapshot_session_uuid, description,
                           app_version, browser_info, timestamp, screenshots_json,
                           reviewed, reviewed_at, reviewed_by, notes
                    FROM bug_reports";
        let reports = match reviewed {
            Some(flag) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE reviewed = ? ORDER BY timestamp DESC",
                    base
                ))?;
                stmt.query_map(params![flag], bug_report_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY timestamp DESC", base))?;
                stmt.query_map([], bug_report_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(reports)
    }

    pub fn mark_report_reviewed(
        &self,
        id: &str,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE bug_reports SET reviewed = 1, reviewed_at = ?, reviewed_by = ?, notes = ?
             WHERE id = ?",
            params![Utc::now().to_rfc3339(), reviewed_by, notes, id],
        )?;
        if updated == 0 {
            return Err(WayfarerError::NotFound(format!("bug report '{}'", id)));
        }
        Ok(())
    }

    // Audit log

    pub fn record_access(&self, entry: &AuditEntry) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO api_access_audit
                 (session_uuid, endpoint, method, timestamp, user_agent, ip_address)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.session_uuid,
                entry.endpoint,
                entry.method,
                Utc::now().to_rfc3339(),
                entry.user_agent,
                entry.ip_address,
            ],
        )?;
        Ok(())
    }

    /// Usage stats over the last `days` days.
    pub fn api_stats(&self, days: i64) -> Result<ApiStats> {
        let conn = self.connection()?;
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();

        let total_requests: u64 = conn.query_row(
            "SELECT COUNT(*) FROM api_access_audit WHERE timestamp >= ?",
            params![cutoff],
            |row| row.get(0),
        )?;
        let unique_sessions: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT session_uuid) FROM api_access_audit WHERE timestamp >= ?",
            params![cutoff],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT endpoint, COUNT(*) AS n FROM api_access_audit
             WHERE timestamp >= ? GROUP BY endpoint ORDER BY n DESC",
        )?;
        let requests_by_endpoint = stmt
            .query_map(params![cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, u64)>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM api_access_audit
             WHERE timestamp >= ? GROUP BY day ORDER BY day ASC",
        )?;
        let requests_by_day = stmt
            .query_map(params![cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, u64)>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT session_uuid, COUNT(*) AS n FROM api_access_audit
             WHERE timestamp >= ? GROUP BY session_uuid ORDER BY n DESC LIMIT 10",
        )?;
        let top_sessions = stmt
            .query_map(params![cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, u64)>, _>>()?;

        Ok(ApiStats {
            total_requests,
            unique_sessions,
            requests_by_endpoint,
            requests_by_day,
            top_sessions,
        })
    }

    /// Most recent audit rows for one session, newest first.
    pub fn session_access_history(
        &self,
        session_uuid: &str,
        limit: u32,
    ) -> Result<Vec<AccessLogEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT endpoint, method, timestamp, user_agent, ip_address
             FROM api_access_audit
             WHERE session_uuid = ?
             ORDER BY timestamp DESC
             LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![session_uuid, limit], |row| {
                Ok(AccessLogEntry {
                    endpoint: row.get(0)?,
                    method: row.get(1)?,
                    timestamp: parse_timestamp(row.get(2)?),
                    user_agent: row.get(3)?,
                    ip_address: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Whether a dot path addresses UI state rather than character data.
fn is_ui_path(segments: &[&str]) -> bool {
    match segments.first() {
        Some(&"quality_overrides") | Some(&"custom_stats") => true,
        Some(&"items") => segments.last() == Some(&"hide"),
        _ => false,
    }
}

/// Set a value at a dot path inside a JSON object, creating intermediate
/// objects as needed. Fails when an intermediate segment addresses into
/// a non-object value.
fn set_json_path(root: &mut Value, segments: &[&str], value: Value) -> Result<()> {
    if !root.is_object() {
        *root = Value::Object(Default::default());
    }
    let mut cursor = root;
    for segment in &segments[..segments.len() - 1] {
        let map = cursor
            .as_object_mut()
            .ok_or_else(|| WayfarerError::Validation(format!("'{}' is not an object", segment)))?;
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !cursor.is_object() {
            return Err(WayfarerError::Validation(format!(
                "'{}' is not an object",
                segment
            )));
        }
    }
    let map = cursor.as_object_mut().ok_or_else(|| {
        WayfarerError::Validation("config root is not an object".to_string())
    })?;
    map.insert(segments[segments.len() - 1].to_string(), value);
    Ok(())
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let character_config: String = row.get(1)?;
    let ui_config: String = row.get(2)?;
    let last_updated: String = row.get(3)?;
    Ok(Session {
        uuid: row.get(0)?,
        character_config: serde_json::from_str(&character_config).unwrap_or(Value::Null),
        ui_config: serde_json::from_str(&ui_config).unwrap_or(Value::Null),
        last_updated: parse_timestamp(last_updated),
    })
}

fn gear_set_from_row(row: &Row) -> rusqlite::Result<GearSetRecord> {
    let slots_json: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(GearSetRecord {
        id: row.get(0)?,
        session_uuid: row.get(1)?,
        name: row.get(2)?,
        slots: serde_json::from_str(&slots_json).unwrap_or(Value::Null),
        export_string: row.get(4)?,
        is_optimized: row.get(5)?,
        created_at: parse_timestamp(created_at),
        updated_at: parse_timestamp(updated_at),
    })
}

fn bug_report_from_row(row: &Row) -> rusqlite::Result<BugReport> {
    let timestamp: String = row.get(6)?;
    let screenshots_json: String = row.get(7)?;
    let reviewed_at: Option<String> = row.get(9)?;
    Ok(BugReport {
        id: row.get(0)?,
        original_session_uuid: row.get(1)?,
        snapshot_session_uuid: row.get(2)?,
        description: row.get(3)?,
        app_version: row.get(4)?,
        browser_info: row.get(5)?,
        timestamp: parse_timestamp(timestamp),
        screenshots: serde_json::from_str(&screenshots_json).unwrap_or_default(),
        reviewed: row.get(8)?,
        reviewed_at: reviewed_at.map(parse_timestamp),
        reviewed_by: row.get(10)?,
        notes: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_get_or_create_session() {
        let (_dir, db) = test_db();
        assert!(db.get_session("s1").unwrap().is_none());

        let session = db.get_or_create_session("s1").unwrap();
        assert_eq!(session.uuid, "s1");
        assert!(db.get_session("s1").unwrap().is_some());
    }

    #[test]
    fn test_update_config_path_routing() {
        let (_dir, db) = test_db();

        db.update_config_path("s1", "skills.mining", json!(1234)).unwrap();
        db.update_config_path("s1", "ui.theme", json!("dark")).unwrap();
        db.update_config_path("s1", "items.abc.hide", json!(true)).unwrap();
        db.update_config_path("s1", "quality_overrides.def", json!("Perfect"))
            .unwrap();

        let session = db.get_session("s1").unwrap().unwrap();
        assert_eq!(session.character_config["skills"]["mining"], json!(1234));
        assert_eq!(session.ui_config["theme"], json!("dark"));
        assert_eq!(session.ui_config["items"]["abc"]["hide"], json!(true));
        assert_eq!(session.ui_config["quality_overrides"]["def"], json!("Perfect"));
        assert!(session.character_config.get("theme").is_none());
    }

    #[test]
    fn test_update_config_path_rejects_scalar_intermediate() {
        let (_dir, db) = test_db();
        db.update_config_path("s1", "name", json!("Ada")).unwrap();
        let result = db.update_config_path("s1", "name.first", json!("A"));
        assert!(result.is_err());
    }

    #[test]
    fn test_gear_set_crud() {
        let (_dir, db) = test_db();
        let slots = json!({"head": {"uuid": "u1", "quality": "Normal"}});

        let created = db
            .create_gear_set("s1", "Mining", &slots, Some("export"), false)
            .unwrap();
        assert!(!created.is_optimized);

        // Duplicate names in one session are rejected.
        assert!(matches!(
            db.create_gear_set("s1", "Mining", &slots, None, false),
            Err(WayfarerError::DuplicateEntry(_))
        ));
        // Another session may reuse the name.
        db.create_gear_set("s2", "Mining", &slots, None, false).unwrap();

        let updated = db
            .update_gear_set(&created.id, Some("Mining v2"), None, None)
            .unwrap();
        assert_eq!(updated.name, "Mining v2");

        let listed = db.list_gear_sets("s1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Mining v2");

        assert!(db.delete_gear_set(&created.id).unwrap());
        assert!(!db.delete_gear_set(&created.id).unwrap());
    }

    #[test]
    fn test_rename_conflict_rejected() {
        let (_dir, db) = test_db();
        let slots = json!({});
        db.create_gear_set("s1", "A", &slots, None, false).unwrap();
        let b = db.create_gear_set("s1", "B", &slots, None, false).unwrap();

        assert!(matches!(
            db.update_gear_set(&b.id, Some("A"), None, None),
            Err(WayfarerError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_save_gear_set_upserts() {
        let (_dir, db) = test_db();
        let slots = json!({"head": null});

        let first = db
            .save_gear_set("s1", None, "Woodcutting", &slots, None, true)
            .unwrap();
        // Same name without an id updates instead of duplicating.
        let second = db
            .save_gear_set("s1", None, "Woodcutting", &json!({"head": 1}), None, true)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_gear_sets("s1").unwrap().len(), 1);

        // Known id updates through the id path.
        let third = db
            .save_gear_set("s1", Some(&first.id), "Woodcutting v2", &slots, None, true)
            .unwrap();
        assert_eq!(third.id, first.id);
        assert_eq!(third.name, "Woodcutting v2");
    }

    #[test]
    fn test_bug_report_snapshots_session() {
        let (_dir, db) = test_db();
        db.update_config_path("s1", "skills.mining", json!(99)).unwrap();
        db.create_gear_set("s1", "Mining", &json!({}), None, false).unwrap();

        let report = db
            .create_bug_report("s1", "optimizer hangs", Some("1.2.3"), None, &[])
            .unwrap();
        assert_ne!(report.snapshot_session_uuid, "s1");

        // Later edits to the original must not leak into the snapshot.
        db.update_config_path("s1", "skills.mining", json!(1)).unwrap();
        let snapshot = db.get_session(&report.snapshot_session_uuid).unwrap().unwrap();
        assert_eq!(snapshot.character_config["skills"]["mining"], json!(99));
        assert_eq!(
            db.list_gear_sets(&report.snapshot_session_uuid).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_bug_report_review_flow() {
        let (_dir, db) = test_db();
        let report = db.create_bug_report("s1", "broken", None, None, &[]).unwrap();

        assert_eq!(db.get_bug_reports(Some(false)).unwrap().len(), 1);
        assert!(db.get_bug_reports(Some(true)).unwrap().is_empty());

        db.mark_report_reviewed(&report.id, "reviewer", Some("fixed"))
            .unwrap();
        let reviewed = db.get_bug_reports(Some(true)).unwrap();
        assert_eq!(reviewed.len(), 1);
        assert_eq!(reviewed[0].reviewed_by.as_deref(), Some("reviewer"));
        assert!(reviewed[0].reviewed_at.is_some());

        assert!(db.mark_report_reviewed("missing", "reviewer", None).is_err());
    }

    #[test]
    fn test_api_stats() {
        let (_dir, db) = test_db();
        for (session, endpoint) in [
            ("s1", "/api/session/s1"),
            ("s1", "/api/session/s1"),
            ("s2", "/api/session/s2/gear-sets"),
        ] {
            db.record_access(&AuditEntry {
                session_uuid: session.to_string(),
                endpoint: endpoint.to_string(),
                method: "GET".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .unwrap();
        }

        let stats = db.api_stats(7).unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.unique_sessions, 2);
        assert_eq!(stats.requests_by_endpoint[0].1, 2);
        assert_eq!(stats.top_sessions[0], ("s1".to_string(), 2));
        assert_eq!(stats.requests_by_day.len(), 1);

        let history = db.session_access_history("s1", 50).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].endpoint, "/api/session/s1");
        assert!(db.session_access_history("s3", 50).unwrap().is_empty());
        assert_eq!(db.session_access_history("s1", 1).unwrap().len(), 1);
    }
}
