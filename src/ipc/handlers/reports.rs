use crate::ipc::handlers::{
    dispatch, optional_department, optional_str, optional_year, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::summary;
use rusqlite::Connection;
use serde_json::json;

fn student_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let subject_id = optional_str(params, "subjectId");
    let counts = summary::student_summary(conn, &student_id, subject_id.as_deref())?;
    Ok(json!({
        "total": counts.total,
        "present": counts.present,
        "absent": counts.absent,
        "percentage": counts.percentage
    }))
}

fn subject_breakdown(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let rows = summary::per_subject_breakdown(conn, &student_id)?;
    Ok(json!({ "subjects": rows }))
}

fn cohort_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let department = optional_department(params, "department")?;
    let year = optional_year(params, "year")?;
    let rows = summary::cohort_summary(conn, department, year)?;
    Ok(json!({ "students": rows }))
}

fn dashboard(
    conn: &Connection,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let today = chrono::Utc::now().date_naive();
    let board = summary::dashboard(conn, today)?;
    Ok(json!({
        "studentCount": board.student_count,
        "subjectCount": board.subject_count,
        "presentToday": board.present_today,
        "absentToday": board.absent_today
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentSummary" => Some(dispatch(state, req, student_summary)),
        "reports.subjectBreakdown" => Some(dispatch(state, req, subject_breakdown)),
        "reports.cohortSummary" => Some(dispatch(state, req, cohort_summary)),
        "reports.dashboard" => Some(dispatch(state, req, dashboard)),
        _ => None,
    }
}
