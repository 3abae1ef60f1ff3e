use crate::ipc::handlers::{
    dispatch, optional_department, optional_str, optional_year, required_department,
    required_str, required_year, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::roster::{self, Login, NewStudent, RosterQuery, StudentPatch};
use rusqlite::Connection;
use serde_json::json;

pub(super) fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "rollNumber": s.roll_number,
        "name": s.name,
        "department": s.department.as_str(),
        "year": s.year.as_i64(),
        "hasLogin": s.credential_id.is_some(),
        "createdAt": s.created_at,
        "updatedAt": s.updated_at
    })
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let query = RosterQuery {
        search: optional_str(params, "search"),
        department: optional_department(params, "department")?,
        year: optional_year(params, "year")?,
    };
    let students = roster::list_students(conn, &query)?;
    let rows: Vec<serde_json::Value> = students.iter().map(student_json).collect();
    Ok(json!({ "students": rows }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let username = optional_str(params, "username");
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let login = match username {
        Some(username) => Some(Login {
            username,
            password: password.unwrap_or_default(),
        }),
        None => None,
    };

    let new = NewStudent {
        roll_number: required_str(params, "rollNumber")?,
        name: required_str(params, "name")?,
        department: required_department(params, "department")?,
        year: required_year(params, "year")?,
        login,
    };
    let student = roster::create_student(conn, &new)?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let patch_params = params
        .get("patch")
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;

    let patch = StudentPatch {
        roll_number: optional_str(patch_params, "rollNumber"),
        name: optional_str(patch_params, "name"),
        department: optional_department(patch_params, "department")?,
        year: optional_year(patch_params, "year")?,
        username: optional_str(patch_params, "username"),
        password: patch_params
            .get("password")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    };
    let student = roster::update_student(conn, &student_id, &patch)?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    roster::delete_student(conn, &student_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(dispatch(state, req, students_list)),
        "students.create" => Some(dispatch(state, req, students_create)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.delete" => Some(dispatch(state, req, students_delete)),
        _ => None,
    }
}
