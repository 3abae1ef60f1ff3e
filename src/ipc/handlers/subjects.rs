use crate::ipc::handlers::{
    dispatch, optional_department, optional_str, optional_year, required_department,
    required_str, required_year, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Subject;
use crate::roster::{self, NewSubject, RosterQuery, SubjectPatch};
use rusqlite::Connection;
use serde_json::json;

pub(super) fn subject_json(s: &Subject) -> serde_json::Value {
    json!({
        "id": s.id,
        "subjectCode": s.subject_code,
        "name": s.name,
        "department": s.department.as_str(),
        "year": s.year.as_i64(),
        "createdAt": s.created_at,
        "updatedAt": s.updated_at
    })
}

fn subjects_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let query = RosterQuery {
        search: optional_str(params, "search"),
        department: optional_department(params, "department")?,
        year: optional_year(params, "year")?,
    };
    let subjects = roster::list_subjects(conn, &query)?;
    let rows: Vec<serde_json::Value> = subjects.iter().map(subject_json).collect();
    Ok(json!({ "subjects": rows }))
}

fn subjects_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let new = NewSubject {
        subject_code: required_str(params, "subjectCode")?,
        name: required_str(params, "name")?,
        department: required_department(params, "department")?,
        year: required_year(params, "year")?,
    };
    let subject = roster::create_subject(conn, &new)?;
    Ok(json!({ "subject": subject_json(&subject) }))
}

fn subjects_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_str(params, "subjectId")?;
    let patch_params = params
        .get("patch")
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;

    let patch = SubjectPatch {
        subject_code: optional_str(patch_params, "subjectCode"),
        name: optional_str(patch_params, "name"),
        department: optional_department(patch_params, "department")?,
        year: optional_year(patch_params, "year")?,
    };
    let subject = roster::update_subject(conn, &subject_id, &patch)?;
    Ok(json!({ "subject": subject_json(&subject) }))
}

fn subjects_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_str(params, "subjectId")?;
    roster::delete_subject(conn, &subject_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(dispatch(state, req, subjects_list)),
        "subjects.create" => Some(dispatch(state, req, subjects_create)),
        "subjects.update" => Some(dispatch(state, req, subjects_update)),
        "subjects.delete" => Some(dispatch(state, req, subjects_delete)),
        _ => None,
    }
}
