//! SQLite-backed store.
//!
//! A single connection is shared behind a mutex. Every counter operation is one SQL statement,
//! so two callers can never observe the same counter value. Reports are stored as JSON bodies
//! next to the handful of columns that need indexing or uniqueness:
//!
//! - `(report_year, report_id)` is unique
//! - `receipt_no` is unique among non-imported reports (partial index), and a non-imported
//!   report is never written onto a receipt that any other row already carries

use super::{
    AuthorityStore, CounterStore, MasterData, NamedLookup, ReportFilter, ReportRow, ReportStore,
    SearchType,
};
use crate::error::{DuplicateField, StoreError, StoreResult};
use crate::masters::{
    AuthorityDocument, CategoryHead, NamedMaster, NamedMasterKind, ServiceEntry, TestCategory,
    TestDefinition, TestParameterDef,
};
use crate::model::CanonicalReport;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use lab_uuid::RecordId;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (id TEXT PRIMARY KEY, name TEXT NOT NULL, code TEXT);
CREATE TABLE IF NOT EXISTS departments (id TEXT PRIMARY KEY, name TEXT NOT NULL, code TEXT);
CREATE TABLE IF NOT EXISTS doctors (id TEXT PRIMARY KEY, name TEXT NOT NULL, code TEXT);
CREATE TABLE IF NOT EXISTS rooms (id TEXT PRIMARY KEY, name TEXT NOT NULL, code TEXT);

CREATE TABLE IF NOT EXISTS room_doctor_links (
    room_id TEXT NOT NULL,
    doctor_id TEXT NOT NULL,
    PRIMARY KEY (room_id, doctor_id)
);

CREATE TABLE IF NOT EXISTS test_categories (id TEXT PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS category_heads (id TEXT PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS units (id TEXT PRIMARY KEY, name TEXT NOT NULL);

CREATE TABLE IF NOT EXISTS test_definitions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    short_name TEXT,
    category_id TEXT,
    parameters TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS service_entries (
    id TEXT PRIMARY KEY,
    alias_name TEXT NOT NULL,
    category_head_id TEXT,
    price REAL
);

CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    receipt_no TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_invoices_receipt ON invoices(receipt_no);

CREATE TABLE IF NOT EXISTS registrations (
    id TEXT PRIMARY KEY,
    receipt_no TEXT NOT NULL,
    registration_no TEXT,
    registered_at TEXT,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_registrations_receipt ON registrations(receipt_no);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    report_id TEXT NOT NULL,
    report_year INTEGER NOT NULL,
    sequence INTEGER NOT NULL,
    receipt_no TEXT,
    registration_no TEXT,
    lab_yearly_no TEXT,
    patient_name TEXT NOT NULL,
    patient_phone TEXT,
    patient_type TEXT NOT NULL,
    imported INTEGER NOT NULL DEFAULT 0,
    needs_repair INTEGER NOT NULL DEFAULT 0,
    repair_checked_at TEXT,
    created_at TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_report_id ON reports(report_year, report_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_receipt_no
    ON reports(receipt_no) WHERE receipt_no IS NOT NULL AND imported = 0;
CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at);
";

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the parent directory cannot be created, the database cannot be
    /// opened, or the schema bootstrap fails.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::bootstrap(conn)
    }

    /// Opens a private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Self::migrate(&conn)?;
        tracing::debug!("report store schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Brings databases created by earlier versions up to the current schema.
    fn migrate(conn: &Connection) -> StoreResult<()> {
        let has_repair_checked: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('reports') WHERE name = 'repair_checked_at'",
            [],
            |row| row.get(0),
        )?;
        if has_repair_checked == 0 {
            conn.execute_batch("ALTER TABLE reports ADD COLUMN repair_checked_at TEXT;")?;
            tracing::info!("added reports.repair_checked_at column");
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn parse_id(raw: &str) -> StoreResult<RecordId> {
    RecordId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_optional_id(raw: Option<String>) -> StoreResult<Option<RecordId>> {
    raw.as_deref().map(parse_id).transpose()
}

/// Escapes `%`, `_` and `\` so `input` is matched literally by `LIKE ... ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn named_master_from_row(row: &Row<'_>) -> StoreResult<NamedMaster> {
    let id: String = row.get(0)?;
    Ok(NamedMaster {
        id: parse_id(&id)?,
        name: row.get(1)?,
        code: row.get(2)?,
    })
}

const TEST_DEFINITION_COLUMNS: &str = "id, name, short_name, category_id, parameters";

fn test_definition_from_row(row: &Row<'_>) -> StoreResult<TestDefinition> {
    let id: String = row.get(0)?;
    let parameters: String = row.get(4)?;
    let parameters: Vec<TestParameterDef> = serde_json::from_str(&parameters)?;

    Ok(TestDefinition {
        id: parse_id(&id)?,
        name: row.get(1)?,
        short_name: row.get(2)?,
        category_id: parse_optional_id(row.get(3)?)?,
        parameters,
    })
}

fn service_entry_from_row(row: &Row<'_>) -> StoreResult<ServiceEntry> {
    let id: String = row.get(0)?;
    Ok(ServiceEntry {
        id: parse_id(&id)?,
        alias_name: row.get(1)?,
        category_head_id: parse_optional_id(row.get(2)?)?,
        price: row.get(3)?,
    })
}

fn report_from_body(body: &str) -> StoreResult<CanonicalReport> {
    Ok(serde_json::from_str(body)?)
}

/// Maps unique-index violations on `reports` to [`StoreError::Duplicate`].
fn classify_report_write_error(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if message.contains("reports.receipt_no") {
                return StoreError::Duplicate(DuplicateField::ReceiptNo);
            }
            if message.contains("reports.report_id") {
                return StoreError::Duplicate(DuplicateField::ReportId);
            }
        }
    }
    StoreError::Sqlite(err)
}

fn query_optional<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: impl FnOnce(&Row<'_>) -> StoreResult<T>,
) -> StoreResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map(row)?)),
        None => Ok(None),
    }
}

// ============================================================================
// COUNTERS
// ============================================================================

impl CounterStore for SqliteStore {
    fn increment_counter(&self, name: &str) -> StoreResult<u32> {
        let conn = self.conn()?;
        let value: u32 = conn.query_row(
            "INSERT INTO counters (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            params![name],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    fn advance_counter(&self, name: &str, floor: u32) -> StoreResult<u32> {
        let conn = self.conn()?;
        let value: u32 = conn.query_row(
            "INSERT INTO counters (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = MAX(value + 1, excluded.value)
             RETURNING value",
            params![name, floor],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    fn decrement_counter_if(&self, name: &str, expected: u32) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE counters SET value = value - 1 WHERE name = ?1 AND value = ?2 AND value > 0",
            params![name, expected],
        )?;
        Ok(changed == 1)
    }

    fn counter_value(&self, name: &str) -> StoreResult<Option<u32>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

// ============================================================================
// MASTERS
// ============================================================================

impl MasterData for SqliteStore {
    fn find_named(
        &self,
        kind: NamedMasterKind,
        lookup: NamedLookup<'_>,
    ) -> StoreResult<Option<NamedMaster>> {
        let conn = self.conn()?;
        let table = kind.table();
        let (column, value) = match lookup {
            NamedLookup::Id(id) => ("id", id.to_string()),
            NamedLookup::Name(name) => ("name", name.to_string()),
            NamedLookup::Code(code) => ("code", code.to_string()),
        };
        let collate = if column == "id" { "" } else { " COLLATE NOCASE" };
        let sql = format!(
            "SELECT id, name, code FROM {table} WHERE {column} = ?1{collate} ORDER BY rowid LIMIT 1"
        );
        query_optional(&conn, &sql, params![value], named_master_from_row)
    }

    fn doctor_for_room(&self, room_id: RecordId) -> StoreResult<Option<NamedMaster>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT d.id, d.name, d.code
             FROM room_doctor_links l
             JOIN doctors d ON d.id = l.doctor_id
             WHERE l.room_id = ?1
             ORDER BY l.rowid
             LIMIT 1",
            params![room_id.to_string()],
            named_master_from_row,
        )
    }

    fn test_definition_by_id(&self, id: RecordId) -> StoreResult<Option<TestDefinition>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {TEST_DEFINITION_COLUMNS} FROM test_definitions WHERE id = ?1");
        query_optional(&conn, &sql, params![id.to_string()], test_definition_from_row)
    }

    fn test_definition_by_name(&self, name: &str) -> StoreResult<Option<TestDefinition>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {TEST_DEFINITION_COLUMNS} FROM test_definitions
             WHERE name = ?1 COLLATE NOCASE OR short_name = ?1 COLLATE NOCASE
             ORDER BY rowid LIMIT 1"
        );
        query_optional(&conn, &sql, params![name], test_definition_from_row)
    }

    fn test_definition_matching(&self, pattern: &Regex) -> StoreResult<Option<TestDefinition>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {TEST_DEFINITION_COLUMNS} FROM test_definitions ORDER BY rowid");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let definition = test_definition_from_row(row)?;
            let short_matches = definition
                .short_name
                .as_deref()
                .is_some_and(|s| pattern.is_match(s));
            if pattern.is_match(&definition.name) || short_matches {
                return Ok(Some(definition));
            }
        }

        Ok(None)
    }

    fn test_definitions_with_prefix(
        &self,
        prefix: &str,
        limit: u32,
    ) -> StoreResult<Vec<TestDefinition>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {TEST_DEFINITION_COLUMNS} FROM test_definitions
             WHERE name LIKE ?1 ESCAPE '\\'
             ORDER BY rowid LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![format!("{}%", escape_like(prefix)), limit])?;

        let mut definitions = Vec::new();
        while let Some(row) = rows.next()? {
            definitions.push(test_definition_from_row(row)?);
        }
        Ok(definitions)
    }

    fn service_entry_by_id(&self, id: RecordId) -> StoreResult<Option<ServiceEntry>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, alias_name, category_head_id, price FROM service_entries WHERE id = ?1",
            params![id.to_string()],
            service_entry_from_row,
        )
    }

    fn service_entry_matching(&self, pattern: &Regex) -> StoreResult<Option<ServiceEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, alias_name, category_head_id, price FROM service_entries ORDER BY rowid",
        )?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let entry = service_entry_from_row(row)?;
            if pattern.is_match(&entry.alias_name) {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    fn category_head_by_id(&self, id: RecordId) -> StoreResult<Option<CategoryHead>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, name FROM category_heads WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let id: String = row.get(0)?;
                Ok(CategoryHead {
                    id: parse_id(&id)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    fn category_by_id(&self, id: RecordId) -> StoreResult<Option<TestCategory>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, name FROM test_categories WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let id: String = row.get(0)?;
                Ok(TestCategory {
                    id: parse_id(&id)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    fn category_by_name(&self, name: &str) -> StoreResult<Option<TestCategory>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, name FROM test_categories WHERE name = ?1 COLLATE NOCASE
             ORDER BY rowid LIMIT 1",
            params![name.trim()],
            |row| {
                let id: String = row.get(0)?;
                Ok(TestCategory {
                    id: parse_id(&id)?,
                    name: row.get(1)?,
                })
            },
        )
    }
}

// ============================================================================
// AUTHORITY DOCUMENTS
// ============================================================================

fn authority_from_row(row: &Row<'_>) -> StoreResult<AuthorityDocument> {
    let id: String = row.get(0)?;
    let body: String = row.get(4)?;
    let registered_at: Option<String> = row.get(3)?;

    Ok(AuthorityDocument {
        id: parse_id(&id)?,
        receipt_no: row.get(1)?,
        registration_no: row.get(2)?,
        registered_at: registered_at.as_deref().map(parse_timestamp).transpose()?,
        body: serde_json::from_str(&body)?,
    })
}

impl AuthorityStore for SqliteStore {
    fn invoice_by_receipt(&self, receipt_no: &str) -> StoreResult<Option<AuthorityDocument>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, receipt_no, NULL, NULL, body FROM invoices
             WHERE receipt_no = ?1 ORDER BY rowid DESC LIMIT 1",
            params![receipt_no],
            authority_from_row,
        )
    }

    fn registration_by_receipt(
        &self,
        receipt_no: &str,
    ) -> StoreResult<Option<AuthorityDocument>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT id, receipt_no, registration_no, registered_at, body FROM registrations
             WHERE receipt_no = ?1 ORDER BY rowid DESC LIMIT 1",
            params![receipt_no],
            authority_from_row,
        )
    }
}

// ============================================================================
// REPORTS
// ============================================================================

impl ReportStore for SqliteStore {
    fn insert_report(&self, report: &CanonicalReport) -> StoreResult<()> {
        let body = serde_json::to_string(report)?;
        let conn = self.conn()?;
        // Imported rows may share a receipt; any other row needs the receipt to be unused.
        let inserted = conn
            .execute(
                "INSERT INTO reports (id, report_id, report_year, sequence, receipt_no,
                 registration_no, lab_yearly_no, patient_name, patient_phone, patient_type,
                 imported, needs_repair, created_at, body)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14
                 WHERE ?11 = 1 OR ?5 IS NULL
                    OR NOT EXISTS (SELECT 1 FROM reports WHERE receipt_no = ?5)",
                params![
                    report.id.to_string(),
                    report.report_id,
                    report.report_year,
                    report.sequence,
                    report.receipt_no,
                    report.registration_no,
                    report.lab_yearly_no,
                    report.patient.name,
                    report.patient.phone,
                    report.patient_type.as_str(),
                    report.imported,
                    report.needs_repair(),
                    format_timestamp(&report.created_at),
                    body,
                ],
            )
            .map_err(classify_report_write_error)?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(DuplicateField::ReceiptNo));
        }
        Ok(())
    }

    fn update_report(&self, report: &CanonicalReport) -> StoreResult<bool> {
        let body = serde_json::to_string(report)?;
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE reports SET receipt_no = ?2, registration_no = ?3, lab_yearly_no = ?4,
                 patient_name = ?5, patient_phone = ?6, patient_type = ?7, needs_repair = ?8,
                 body = ?9
                 WHERE id = ?1
                   AND (imported = 1 OR ?2 IS NULL
                        OR NOT EXISTS (SELECT 1 FROM reports WHERE receipt_no = ?2 AND id <> ?1))",
                params![
                    report.id.to_string(),
                    report.receipt_no,
                    report.registration_no,
                    report.lab_yearly_no,
                    report.patient.name,
                    report.patient.phone,
                    report.patient_type.as_str(),
                    report.needs_repair(),
                    body,
                ],
            )
            .map_err(classify_report_write_error)?;

        if changed > 0 {
            return Ok(true);
        }

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE id = ?1",
            params![report.id.to_string()],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(StoreError::Duplicate(DuplicateField::ReceiptNo));
        }
        Ok(false)
    }

    fn mark_repair_checked(&self, id: RecordId, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE reports SET repair_checked_at = ?2 WHERE id = ?1",
            params![id.to_string(), format_timestamp(&at)],
        )?;
        Ok(())
    }

    fn delete_report(&self, id: RecordId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    fn report_by_id(&self, id: RecordId) -> StoreResult<Option<CanonicalReport>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT body FROM reports WHERE id = ?1",
            params![id.to_string()],
            |row| report_from_body(&row.get::<_, String>(0)?),
        )
    }

    fn report_by_report_id(&self, report_id: &str) -> StoreResult<Option<CanonicalReport>> {
        let conn = self.conn()?;
        query_optional(
            &conn,
            "SELECT body FROM reports WHERE report_id = ?1
             ORDER BY report_year DESC, rowid DESC LIMIT 1",
            params![report_id],
            |row| report_from_body(&row.get::<_, String>(0)?),
        )
    }

    fn reports_by_receipt(&self, receipt_no: &str) -> StoreResult<Vec<CanonicalReport>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM reports WHERE receipt_no = ?1 ORDER BY created_at, rowid",
        )?;
        let mut rows = stmt.query(params![receipt_no])?;

        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(report_from_body(&row.get::<_, String>(0)?)?);
        }
        Ok(reports)
    }

    fn query_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<ReportRow>> {
        const COLLECTED: &str = "substr(COALESCE(reg.registered_at, r.created_at), 1, 10)";

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(from) = filter.date_from {
            clauses.push(format!("{COLLECTED} >= ?"));
            values.push(Value::Text(from.to_string()));
        }
        if let Some(to) = filter.date_to {
            clauses.push(format!("{COLLECTED} <= ?"));
            values.push(Value::Text(to.to_string()));
        }
        if let Some(receipt) = &filter.receipt_no {
            clauses.push("r.receipt_no = ?".into());
            values.push(Value::Text(receipt.clone()));
        }
        if let Some(prefix) = &filter.lab_yearly_prefix {
            clauses.push("r.lab_yearly_no LIKE ? ESCAPE '\\'".into());
            values.push(Value::Text(format!("{}%", escape_like(prefix))));
        }
        if let Some((search_type, term)) = &filter.search {
            let (column, pattern) = match search_type {
                SearchType::Name => ("r.patient_name", format!("%{}%", escape_like(term))),
                SearchType::Phone => ("r.patient_phone", format!("%{}%", escape_like(term))),
                SearchType::Receipt => ("r.receipt_no", format!("{}%", escape_like(term))),
                SearchType::ReportId => ("r.report_id", format!("{}%", escape_like(term))),
            };
            clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
            values.push(Value::Text(pattern));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT r.body, reg.registered_at
             FROM reports r
             LEFT JOIN (
                 SELECT receipt_no, MAX(registered_at) AS registered_at
                 FROM registrations
                 GROUP BY receipt_no
             ) reg ON reg.receipt_no = r.receipt_no
             {where_clause}
             ORDER BY r.created_at, r.rowid"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            let registered_at: Option<String> = row.get(1)?;
            out.push(ReportRow {
                report: report_from_body(&body)?,
                registered_at: registered_at.as_deref().map(parse_timestamp).transpose()?,
            });
        }
        Ok(out)
    }

    fn max_sequence(&self, year: i32) -> StoreResult<Option<u32>> {
        let conn = self.conn()?;
        let max: Option<u32> = conn.query_row(
            "SELECT MAX(sequence) FROM reports WHERE report_year = ?1",
            params![year],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn find_receipt(
        &self,
        receipt_no: &str,
        year: Option<i32>,
        date: Option<NaiveDate>,
    ) -> StoreResult<Option<String>> {
        let mut sql = String::from("SELECT report_id FROM reports WHERE receipt_no = ?");
        let mut values = vec![Value::Text(receipt_no.to_string())];

        if let Some(year) = year {
            sql.push_str(" AND report_year = ?");
            values.push(Value::Integer(i64::from(year)));
        }
        if let Some(date) = date {
            sql.push_str(" AND substr(created_at, 1, 10) = ?");
            values.push(Value::Text(date.to_string()));
        }
        sql.push_str(" ORDER BY rowid LIMIT 1");

        let conn = self.conn()?;
        query_optional(&conn, &sql, params_from_iter(values.iter()), |row| {
            Ok(row.get::<_, String>(0)?)
        })
    }

    fn count_reports(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn count_reports_created_on(&self, date: NaiveDate) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE substr(created_at, 1, 10) = ?1",
            params![date.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn reports_needing_repair(&self, limit: u32) -> StoreResult<Vec<CanonicalReport>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM reports WHERE needs_repair = 1
             ORDER BY COALESCE(repair_checked_at, ''), created_at, rowid
             LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;

        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(report_from_body(&row.get::<_, String>(0)?)?);
        }
        Ok(reports)
    }
}
