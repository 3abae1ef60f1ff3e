use crate::db;
use crate::model::{is_constraint_violation, CoreError, Status};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const DATE_FMT: &str = "%Y-%m-%d";

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// Create-or-update for one (student, subject, date) triple. A re-mark
/// overwrites status and updated_at; created_at keeps the first write.
pub fn upsert(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
    date: NaiveDate,
    status: Status,
) -> Result<(), CoreError> {
    let now = db::now_utc();
    conn.execute(
        "INSERT INTO attendance(id, student_id, subject_id, date, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, date) DO UPDATE SET
           status = excluded.status,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            student_id,
            subject_id,
            date_key(date),
            status.code(),
            &now,
            &now,
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::UpsertConflict
        } else {
            CoreError::Db(e)
        }
    })?;
    Ok(())
}

/// Raw insert: fails with `upsert_conflict` when the triple already exists.
/// The marking engine never uses this; it exists for direct record creation.
pub fn insert_strict(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
    date: NaiveDate,
    status: Status,
) -> Result<String, CoreError> {
    let record_id = Uuid::new_v4().to_string();
    let now = db::now_utc();
    conn.execute(
        "INSERT INTO attendance(id, student_id, subject_id, date, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            student_id,
            subject_id,
            date_key(date),
            status.code(),
            &now,
            &now,
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::UpsertConflict
        } else {
            CoreError::Db(e)
        }
    })?;
    Ok(record_id)
}

/// Persisted statuses for one (subject, date), keyed by student id. Used to
/// pre-populate the edit form when a date is re-opened.
pub fn marks_for_date(
    conn: &Connection,
    subject_id: &str,
    date: NaiveDate,
) -> Result<HashMap<String, Status>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance WHERE subject_id = ? AND date = ?",
    )?;
    let rows = stmt
        .query_map((subject_id, date_key(date)), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_student = HashMap::new();
    for (student_id, raw) in rows {
        let status = Status::from_code(&raw).ok_or_else(|| {
            CoreError::BadInput(format!("ledger holds unknown status code {raw}"))
        })?;
        by_student.insert(student_id, status);
    }
    Ok(by_student)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub record_id: String,
    pub student_id: String,
    pub roll_number: String,
    pub student_name: String,
    pub subject_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub date: String,
    pub status: String,
    pub marked_at: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTallies {
    pub total_count: i64,
    pub present_count: i64,
    pub absent_count: i64,
}

#[derive(Default)]
pub struct LedgerFilter {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

fn filter_clauses(filter: &LedgerFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(student_id) = &filter.student_id {
        clauses.push("a.student_id = ?");
        params.push(Value::Text(student_id.clone()));
    }
    if let Some(subject_id) = &filter.subject_id {
        clauses.push("a.subject_id = ?");
        params.push(Value::Text(subject_id.clone()));
    }
    if let Some(from) = filter.date_from {
        clauses.push("a.date >= ?");
        params.push(Value::Text(date_key(from)));
    }
    if let Some(to) = filter.date_to {
        clauses.push("a.date <= ?");
        params.push(Value::Text(date_key(to)));
    }
    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Filtered ledger view, newest date first then roll number, with
/// present/absent tallies over the whole filtered set (not just the page).
pub fn list(
    conn: &Connection,
    filter: &LedgerFilter,
) -> Result<(Vec<LedgerRow>, LedgerTallies), CoreError> {
    let (where_sql, params) = filter_clauses(filter);

    let tallies = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(a.status = 'P'), 0)
             FROM attendance a{where_sql}"
        ),
        params_from_iter(params.clone()),
        |r| {
            let total: i64 = r.get(0)?;
            let present: i64 = r.get(1)?;
            Ok(LedgerTallies {
                total_count: total,
                present_count: present,
                absent_count: total - present,
            })
        },
    )?;

    let limit_sql = match filter.limit {
        Some(n) if n >= 0 => format!(" LIMIT {n}"),
        _ => String::new(),
    };
    let sql = format!(
        "SELECT a.id, a.student_id, s.roll_number, s.name, a.subject_id, j.subject_code, j.name,
                a.date, a.status, a.updated_at
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         JOIN subjects j ON j.id = a.subject_id
         {where_sql}
         ORDER BY a.date DESC, s.roll_number{limit_sql}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |r| {
            Ok(LedgerRow {
                record_id: r.get(0)?,
                student_id: r.get(1)?,
                roll_number: r.get(2)?,
                student_name: r.get(3)?,
                subject_id: r.get(4)?,
                subject_code: r.get(5)?,
                subject_name: r.get(6)?,
                date: r.get(7)?,
                status: r.get(8)?,
                marked_at: r.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, tallies))
}
