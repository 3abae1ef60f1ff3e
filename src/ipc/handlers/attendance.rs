use crate::ipc::handlers::students::student_json;
use crate::ipc::handlers::{
    dispatch, optional_date, optional_str, required_date, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, LedgerFilter};
use crate::marking;
use crate::model::Status;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

fn attendance_roster(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_str(params, "subjectId")?;
    let students = marking::compute_eligible_roster(conn, &subject_id)?;
    let rows: Vec<serde_json::Value> = students.iter().map(student_json).collect();
    Ok(json!({ "students": rows }))
}

fn attendance_mark(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_str(params, "subjectId")?;
    let date = required_date(params, "date")?;
    let Some(raw_map) = params.get("presentByStudent").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing presentByStudent"));
    };

    let mut present_by_student: HashMap<String, bool> = HashMap::new();
    for (student_id, value) in raw_map {
        let present = value.as_bool().ok_or_else(|| {
            HandlerErr::bad_params("presentByStudent values must be booleans")
        })?;
        present_by_student.insert(student_id.clone(), present);
    }

    let outcome = marking::mark_attendance(conn, &subject_id, date, &present_by_student)?;
    Ok(json!({
        "successCount": outcome.success_count,
        "failureCount": outcome.failure_count
    }))
}

fn attendance_existing(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_str(params, "subjectId")?;
    let date = required_date(params, "date")?;
    let marks = marking::existing_marks(conn, &subject_id, date)?;

    let mut map = serde_json::Map::new();
    for (student_id, status) in marks {
        map.insert(student_id, json!(status.code()));
    }
    Ok(json!({ "marks": map }))
}

fn attendance_record(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let subject_id = required_str(params, "subjectId")?;
    let date = required_date(params, "date")?;
    let status_raw = required_str(params, "status")?;
    let status = Status::from_code(&status_raw)
        .ok_or_else(|| HandlerErr::bad_params("status must be P or A"))?;

    let record_id = marking::create_record(conn, &student_id, &subject_id, date, status)?;
    Ok(json!({ "recordId": record_id }))
}

fn attendance_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let filter = LedgerFilter {
        student_id: optional_str(params, "studentId"),
        subject_id: optional_str(params, "subjectId"),
        date_from: optional_date(params, "dateFrom")?,
        date_to: optional_date(params, "dateTo")?,
        limit: params.get("limit").and_then(|v| v.as_i64()),
    };
    let (records, tallies) = ledger::list(conn, &filter)?;
    Ok(json!({
        "records": records,
        "totalCount": tallies.total_count,
        "presentCount": tallies.present_count,
        "absentCount": tallies.absent_count
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.roster" => Some(dispatch(state, req, attendance_roster)),
        "attendance.mark" => Some(dispatch(state, req, attendance_mark)),
        "attendance.existing" => Some(dispatch(state, req, attendance_existing)),
        "attendance.record" => Some(dispatch(state, req, attendance_record)),
        "attendance.list" => Some(dispatch(state, req, attendance_list)),
        _ => None,
    }
}
