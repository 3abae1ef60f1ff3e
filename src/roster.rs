use crate::db;
use crate::model::{is_constraint_violation, CoreError, Department, Student, Subject, Year};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const STUDENT_COLS: &str =
    "id, roll_number, name, department, year, credential_id, created_at, updated_at";
const SUBJECT_COLS: &str = "id, subject_code, name, department, year, created_at, updated_at";

/// Optional login attached to a student. At most one credential per student
/// and one student per credential; username is unique across credentials.
pub struct Login {
    pub username: String,
    pub password: String,
}

pub struct NewStudent {
    pub roll_number: String,
    pub name: String,
    pub department: Department,
    pub year: Year,
    pub login: Option<Login>,
}

#[derive(Default)]
pub struct StudentPatch {
    pub roll_number: Option<String>,
    pub name: Option<String>,
    pub department: Option<Department>,
    pub year: Option<Year>,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct NewSubject {
    pub subject_code: String,
    pub name: String,
    pub department: Department,
    pub year: Year,
}

#[derive(Default)]
pub struct SubjectPatch {
    pub subject_code: Option<String>,
    pub name: Option<String>,
    pub department: Option<Department>,
    pub year: Option<Year>,
}

/// Free-text search plus exact department/year narrowing, shared by the
/// student and subject listings.
#[derive(Default)]
pub struct RosterQuery {
    pub search: Option<String>,
    pub department: Option<Department>,
    pub year: Option<Year>,
}

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

pub fn student_from_row(r: &Row) -> rusqlite::Result<Student> {
    let dept_raw: String = r.get(3)?;
    let year_raw: i64 = r.get(4)?;
    Ok(Student {
        id: r.get(0)?,
        roll_number: r.get(1)?,
        name: r.get(2)?,
        department: Department::parse(&dept_raw)
            .ok_or_else(|| bad_column(3, format!("unknown department {dept_raw}")))?,
        year: Year::from_i64(year_raw)
            .ok_or_else(|| bad_column(4, format!("year out of range: {year_raw}")))?,
        credential_id: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

pub fn subject_from_row(r: &Row) -> rusqlite::Result<Subject> {
    let dept_raw: String = r.get(3)?;
    let year_raw: i64 = r.get(4)?;
    Ok(Subject {
        id: r.get(0)?,
        subject_code: r.get(1)?,
        name: r.get(2)?,
        department: Department::parse(&dept_raw)
            .ok_or_else(|| bad_column(3, format!("unknown department {dept_raw}")))?,
        year: Year::from_i64(year_raw)
            .ok_or_else(|| bad_column(4, format!("year out of range: {year_raw}")))?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Student, CoreError> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
        [student_id],
        student_from_row,
    )
    .optional()?
    .ok_or(CoreError::NotFound("student"))
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> Result<Subject, CoreError> {
    conn.query_row(
        &format!("SELECT {SUBJECT_COLS} FROM subjects WHERE id = ?"),
        [subject_id],
        subject_from_row,
    )
    .optional()?
    .ok_or(CoreError::NotFound("subject"))
}

fn roll_number_taken(
    conn: &Connection,
    roll_number: &str,
    exclude_id: Option<&str>,
) -> Result<bool, CoreError> {
    let taken: Option<i64> = match exclude_id {
        Some(id) => conn
            .query_row(
                "SELECT 1 FROM students WHERE roll_number = ? AND id <> ?",
                (roll_number, id),
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT 1 FROM students WHERE roll_number = ?",
                [roll_number],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(taken.is_some())
}

fn subject_code_taken(
    conn: &Connection,
    subject_code: &str,
    exclude_id: Option<&str>,
) -> Result<bool, CoreError> {
    let taken: Option<i64> = match exclude_id {
        Some(id) => conn
            .query_row(
                "SELECT 1 FROM subjects WHERE subject_code = ? AND id <> ?",
                (subject_code, id),
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT 1 FROM subjects WHERE subject_code = ?",
                [subject_code],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(taken.is_some())
}

fn username_taken(
    conn: &Connection,
    username: &str,
    exclude_credential: Option<&str>,
) -> Result<bool, CoreError> {
    let taken: Option<i64> = match exclude_credential {
        Some(cid) => conn
            .query_row(
                "SELECT 1 FROM credentials WHERE username = ? AND id <> ?",
                (username, cid),
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT 1 FROM credentials WHERE username = ?",
                [username],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(taken.is_some())
}

fn hash_password(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

fn create_credential(conn: &Connection, login: &Login) -> Result<String, CoreError> {
    let username = login.username.trim();
    if username.is_empty() {
        return Err(CoreError::BadInput("username must not be empty".to_string()));
    }
    if login.password.is_empty() {
        return Err(CoreError::BadInput(
            "password is required when creating a login".to_string(),
        ));
    }
    if username_taken(conn, username, None)? {
        return Err(CoreError::DuplicateIdentifier {
            field: "username",
            value: username.to_string(),
        });
    }
    let credential_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO credentials(id, username, password_sha256) VALUES(?, ?, ?)",
        (&credential_id, username, hash_password(&login.password)),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::DuplicateIdentifier {
                field: "username",
                value: username.to_string(),
            }
        } else {
            CoreError::Db(e)
        }
    })?;
    Ok(credential_id)
}

pub fn create_student(conn: &Connection, new: &NewStudent) -> Result<Student, CoreError> {
    let roll_number = new.roll_number.trim();
    if roll_number.is_empty() {
        return Err(CoreError::BadInput("rollNumber must not be empty".to_string()));
    }
    let name = new.name.trim();
    if name.is_empty() {
        return Err(CoreError::BadInput("name must not be empty".to_string()));
    }
    if roll_number_taken(conn, roll_number, None)? {
        return Err(CoreError::DuplicateIdentifier {
            field: "rollNumber",
            value: roll_number.to_string(),
        });
    }

    let credential_id = match &new.login {
        Some(login) => Some(create_credential(conn, login)?),
        None => None,
    };

    let student_id = Uuid::new_v4().to_string();
    let now = db::now_utc();
    conn.execute(
        "INSERT INTO students(id, roll_number, name, department, year, credential_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            roll_number,
            name,
            new.department.as_str(),
            new.year.as_i64(),
            &credential_id,
            &now,
            &now,
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::DuplicateIdentifier {
                field: "rollNumber",
                value: roll_number.to_string(),
            }
        } else {
            CoreError::Db(e)
        }
    })?;

    get_student(conn, &student_id)
}

pub fn update_student(
    conn: &Connection,
    student_id: &str,
    patch: &StudentPatch,
) -> Result<Student, CoreError> {
    let existing = get_student(conn, student_id)?;

    let roll_number = match &patch.roll_number {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Err(CoreError::BadInput("rollNumber must not be empty".to_string()));
            }
            if v != existing.roll_number && roll_number_taken(conn, v, Some(student_id))? {
                return Err(CoreError::DuplicateIdentifier {
                    field: "rollNumber",
                    value: v.to_string(),
                });
            }
            v.to_string()
        }
        None => existing.roll_number.clone(),
    };
    let name = match &patch.name {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        Some(_) => return Err(CoreError::BadInput("name must not be empty".to_string())),
        None => existing.name.clone(),
    };
    let department = patch.department.unwrap_or(existing.department);
    let year = patch.year.unwrap_or(existing.year);

    let mut credential_id = existing.credential_id.clone();
    if let Some(username) = &patch.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::BadInput("username must not be empty".to_string()));
        }
        match &credential_id {
            Some(cid) => {
                if username_taken(conn, username, Some(cid))? {
                    return Err(CoreError::DuplicateIdentifier {
                        field: "username",
                        value: username.to_string(),
                    });
                }
                conn.execute(
                    "UPDATE credentials SET username = ? WHERE id = ?",
                    (username, cid),
                )?;
                if let Some(password) = &patch.password {
                    conn.execute(
                        "UPDATE credentials SET password_sha256 = ? WHERE id = ?",
                        (hash_password(password), cid),
                    )?;
                }
            }
            None => {
                let password = patch.password.clone().ok_or_else(|| {
                    CoreError::BadInput(
                        "password is required when creating a login".to_string(),
                    )
                })?;
                credential_id = Some(create_credential(
                    conn,
                    &Login {
                        username: username.to_string(),
                        password,
                    },
                )?);
            }
        }
    } else if let Some(password) = &patch.password {
        match &credential_id {
            Some(cid) => {
                conn.execute(
                    "UPDATE credentials SET password_sha256 = ? WHERE id = ?",
                    (hash_password(password), cid),
                )?;
            }
            None => {
                return Err(CoreError::BadInput(
                    "student has no login; provide a username".to_string(),
                ))
            }
        }
    }

    conn.execute(
        "UPDATE students
         SET roll_number = ?, name = ?, department = ?, year = ?, credential_id = ?, updated_at = ?
         WHERE id = ?",
        (
            &roll_number,
            &name,
            department.as_str(),
            year.as_i64(),
            &credential_id,
            db::now_utc(),
            student_id,
        ),
    )?;

    get_student(conn, student_id)
}

pub fn delete_student(conn: &Connection, student_id: &str) -> Result<(), CoreError> {
    let existing = get_student(conn, student_id)?;
    let tx = conn.unchecked_transaction()?;
    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if let Some(cid) = &existing.credential_id {
        tx.execute("DELETE FROM credentials WHERE id = ?", [cid])?;
    }
    tx.commit()?;
    Ok(())
}

pub fn list_students(conn: &Connection, query: &RosterQuery) -> Result<Vec<Student>, CoreError> {
    let (where_sql, params) = roster_filter(query);
    let sql = format!(
        "SELECT {STUDENT_COLS} FROM students{where_sql} ORDER BY roll_number"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_subject(conn: &Connection, new: &NewSubject) -> Result<Subject, CoreError> {
    let subject_code = new.subject_code.trim();
    if subject_code.is_empty() {
        return Err(CoreError::BadInput("subjectCode must not be empty".to_string()));
    }
    let name = new.name.trim();
    if name.is_empty() {
        return Err(CoreError::BadInput("name must not be empty".to_string()));
    }
    if subject_code_taken(conn, subject_code, None)? {
        return Err(CoreError::DuplicateIdentifier {
            field: "subjectCode",
            value: subject_code.to_string(),
        });
    }

    let subject_id = Uuid::new_v4().to_string();
    let now = db::now_utc();
    conn.execute(
        "INSERT INTO subjects(id, subject_code, name, department, year, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &subject_id,
            subject_code,
            name,
            new.department.as_str(),
            new.year.as_i64(),
            &now,
            &now,
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::DuplicateIdentifier {
                field: "subjectCode",
                value: subject_code.to_string(),
            }
        } else {
            CoreError::Db(e)
        }
    })?;

    get_subject(conn, &subject_id)
}

pub fn update_subject(
    conn: &Connection,
    subject_id: &str,
    patch: &SubjectPatch,
) -> Result<Subject, CoreError> {
    let existing = get_subject(conn, subject_id)?;

    let subject_code = match &patch.subject_code {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Err(CoreError::BadInput("subjectCode must not be empty".to_string()));
            }
            if v != existing.subject_code && subject_code_taken(conn, v, Some(subject_id))? {
                return Err(CoreError::DuplicateIdentifier {
                    field: "subjectCode",
                    value: v.to_string(),
                });
            }
            v.to_string()
        }
        None => existing.subject_code.clone(),
    };
    let name = match &patch.name {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        Some(_) => return Err(CoreError::BadInput("name must not be empty".to_string())),
        None => existing.name.clone(),
    };
    let department = patch.department.unwrap_or(existing.department);
    let year = patch.year.unwrap_or(existing.year);

    conn.execute(
        "UPDATE subjects
         SET subject_code = ?, name = ?, department = ?, year = ?, updated_at = ?
         WHERE id = ?",
        (
            &subject_code,
            &name,
            department.as_str(),
            year.as_i64(),
            db::now_utc(),
            subject_id,
        ),
    )?;

    get_subject(conn, subject_id)
}

pub fn delete_subject(conn: &Connection, subject_id: &str) -> Result<(), CoreError> {
    get_subject(conn, subject_id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM attendance WHERE subject_id = ?", [subject_id])?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    tx.commit()?;
    Ok(())
}

pub fn list_subjects(conn: &Connection, query: &RosterQuery) -> Result<Vec<Subject>, CoreError> {
    let (where_sql, params) = subject_filter(query);
    let sql = format!(
        "SELECT {SUBJECT_COLS} FROM subjects{where_sql} ORDER BY subject_code"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn roster_filter(query: &RosterQuery) -> (String, Vec<Value>) {
    filter_clauses(query, "roll_number")
}

fn subject_filter(query: &RosterQuery) -> (String, Vec<Value>) {
    filter_clauses(query, "subject_code")
}

fn filter_clauses(query: &RosterQuery, identifier_col: &str) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(dep) = query.department {
        clauses.push("department = ?".to_string());
        params.push(Value::Text(dep.as_str().to_string()));
    }
    if let Some(year) = query.year {
        clauses.push("year = ?".to_string());
        params.push(Value::Integer(year.as_i64()));
    }
    if let Some(q) = query.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        clauses.push(format!(
            "({identifier_col} LIKE ? OR name LIKE ? OR department LIKE ?)"
        ));
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern));
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}
