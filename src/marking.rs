use crate::ledger;
use crate::model::{is_eligible, CoreError, Status, Student};
use crate::roster::{self, RosterQuery};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOutcome {
    pub success_count: u32,
    pub failure_count: u32,
}

/// All students sharing the subject's department and year, roll number
/// ascending. Empty is a valid outcome, not an error.
pub fn compute_eligible_roster(
    conn: &Connection,
    subject_id: &str,
) -> Result<Vec<Student>, CoreError> {
    let subject = roster::get_subject(conn, subject_id)?;
    roster::list_students(
        conn,
        &RosterQuery {
            department: Some(subject.department),
            year: Some(subject.year),
            search: None,
        },
    )
}

/// Upsert one ledger record per eligible student for (subject, date).
/// Students missing from the presence map are marked Absent, not skipped.
/// Each per-student upsert stands alone: a conflict loser counts toward
/// failureCount and the rest of the batch proceeds.
pub fn mark_attendance(
    conn: &Connection,
    subject_id: &str,
    date: NaiveDate,
    present_by_student: &HashMap<String, bool>,
) -> Result<MarkOutcome, CoreError> {
    let subject = roster::get_subject(conn, subject_id)?;
    let eligible = roster::list_students(
        conn,
        &RosterQuery {
            department: Some(subject.department),
            year: Some(subject.year),
            search: None,
        },
    )?;

    let mut outcome = MarkOutcome {
        success_count: 0,
        failure_count: 0,
    };
    for student in &eligible {
        // The roster query already filtered on department/year; refuse to
        // persist anything if that ever stops holding.
        if !is_eligible(student, &subject) {
            return Err(CoreError::RosterMismatch(format!(
                "student {} does not match subject {} department/year",
                student.roll_number, subject.subject_code
            )));
        }
        let present = present_by_student
            .get(&student.id)
            .copied()
            .unwrap_or(false);
        let status = if present {
            Status::Present
        } else {
            Status::Absent
        };
        match ledger::upsert(conn, &student.id, &subject.id, date, status) {
            Ok(()) => outcome.success_count += 1,
            Err(_) => outcome.failure_count += 1,
        }
    }
    Ok(outcome)
}

/// Statuses already persisted for (subject, date), keyed by student id.
pub fn existing_marks(
    conn: &Connection,
    subject_id: &str,
    date: NaiveDate,
) -> Result<HashMap<String, Status>, CoreError> {
    roster::get_subject(conn, subject_id)?;
    ledger::marks_for_date(conn, subject_id, date)
}

/// Direct single-record creation, bypassing the roster filter. The
/// eligibility gate still applies, and an existing triple is a hard
/// `upsert_conflict` (no overwrite on this path).
pub fn create_record(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
    date: NaiveDate,
    status: Status,
) -> Result<String, CoreError> {
    let student = roster::get_student(conn, student_id)?;
    let subject = roster::get_subject(conn, subject_id)?;
    if !is_eligible(&student, &subject) {
        return Err(CoreError::RosterMismatch(format!(
            "student {} ({} year {}) does not match subject {} ({} year {})",
            student.roll_number,
            student.department.as_str(),
            student.year.as_i64(),
            subject.subject_code,
            subject.department.as_str(),
            subject.year.as_i64()
        )));
    }
    ledger::insert_strict(conn, student_id, subject_id, date, status)
}
