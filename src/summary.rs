use crate::model::{CoreError, Department, Year};
use crate::roster::{self, RosterQuery};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

/// Two-decimal attendance percentage, rounded half-up:
/// `floor(10000 * present / total + 0.5) / 100`. Returns 0 when total is 0.
/// Every report goes through this one function.
pub fn percentage(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((10_000.0 * present as f64 / total as f64) + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub percentage: f64,
}

fn counts_for(
    conn: &Connection,
    student_id: &str,
    subject_id: Option<&str>,
) -> Result<AttendanceCounts, CoreError> {
    let (total, present): (i64, i64) = match subject_id {
        Some(sid) => conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(status = 'P'), 0)
             FROM attendance WHERE student_id = ? AND subject_id = ?",
            (student_id, sid),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(status = 'P'), 0)
             FROM attendance WHERE student_id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?,
    };
    Ok(AttendanceCounts {
        total,
        present,
        absent: total - present,
        percentage: percentage(present, total),
    })
}

/// Overall counts for one student, optionally restricted to one subject.
/// `absent` is always derived as total - present.
pub fn student_summary(
    conn: &Connection,
    student_id: &str,
    subject_id: Option<&str>,
) -> Result<AttendanceCounts, CoreError> {
    roster::get_student(conn, student_id)?;
    if let Some(sid) = subject_id {
        roster::get_subject(conn, sid)?;
    }
    counts_for(conn, student_id, subject_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBreakdownRow {
    pub subject_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub percentage: f64,
}

/// One row per subject in the student's department+year, subject code
/// ascending. Subjects with no recorded classes appear with zero counts.
pub fn per_subject_breakdown(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<SubjectBreakdownRow>, CoreError> {
    let student = roster::get_student(conn, student_id)?;
    let subjects = roster::list_subjects(
        conn,
        &RosterQuery {
            department: Some(student.department),
            year: Some(student.year),
            search: None,
        },
    )?;

    let mut rows = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let counts = counts_for(conn, student_id, Some(&subject.id))?;
        rows.push(SubjectBreakdownRow {
            subject_id: subject.id,
            subject_code: subject.subject_code,
            subject_name: subject.name,
            total: counts.total,
            present: counts.present,
            absent: counts.absent,
            percentage: counts.percentage,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRow {
    pub student_id: String,
    pub roll_number: String,
    pub name: String,
    pub department: String,
    pub year: i64,
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub percentage: f64,
}

/// Per-student summaries over the cohort matching the optional
/// department/year filter, roll number ascending.
pub fn cohort_summary(
    conn: &Connection,
    department: Option<Department>,
    year: Option<Year>,
) -> Result<Vec<CohortRow>, CoreError> {
    let students = roster::list_students(
        conn,
        &RosterQuery {
            department,
            year,
            search: None,
        },
    )?;

    let mut rows = Vec::with_capacity(students.len());
    for student in students {
        let counts = counts_for(conn, &student.id, None)?;
        rows.push(CohortRow {
            student_id: student.id,
            roll_number: student.roll_number,
            name: student.name,
            department: student.department.as_str().to_string(),
            year: student.year.as_i64(),
            total: counts.total,
            present: counts.present,
            absent: counts.absent,
            percentage: counts.percentage,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub student_count: i64,
    pub subject_count: i64,
    pub present_today: i64,
    pub absent_today: i64,
}

/// Admin landing-page counters for one calendar date.
pub fn dashboard(conn: &Connection, today: NaiveDate) -> Result<Dashboard, CoreError> {
    let student_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?;
    let subject_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))?;
    let (present_today, absent_today): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(status = 'P'), 0), COALESCE(SUM(status = 'A'), 0)
         FROM attendance WHERE date = ?",
        [today.format(crate::ledger::DATE_FMT).to_string()],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(Dashboard {
        student_count,
        subject_count,
        present_today,
        absent_today,
    })
}
