use serde::{Deserialize, Serialize};

/// Closed set of departments the institution runs. Stored in SQLite as the
/// short code text ("CSE", "ECE", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Cse,
    Ece,
    Mech,
    Civil,
    Ba,
    It,
}

impl Department {
    pub fn as_str(self) -> &'static str {
        match self {
            Department::Cse => "CSE",
            Department::Ece => "ECE",
            Department::Mech => "MECH",
            Department::Civil => "CIVIL",
            Department::Ba => "BA",
            Department::It => "IT",
        }
    }

    pub fn parse(raw: &str) -> Option<Department> {
        match raw.trim() {
            "CSE" => Some(Department::Cse),
            "ECE" => Some(Department::Ece),
            "MECH" => Some(Department::Mech),
            "CIVIL" => Some(Department::Civil),
            "BA" => Some(Department::Ba),
            "IT" => Some(Department::It),
            _ => None,
        }
    }
}

/// Academic year 1..=4. Stored as the integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Year {
    First,
    Second,
    Third,
    Fourth,
}

impl Year {
    pub fn as_i64(self) -> i64 {
        match self {
            Year::First => 1,
            Year::Second => 2,
            Year::Third => 3,
            Year::Fourth => 4,
        }
    }

    pub fn from_i64(raw: i64) -> Option<Year> {
        match raw {
            1 => Some(Year::First),
            2 => Some(Year::Second),
            3 => Some(Year::Third),
            4 => Some(Year::Fourth),
            _ => None,
        }
    }
}

/// Attendance status, stored with the single-letter codes the ledger uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn code(self) -> &'static str {
        match self {
            Status::Present => "P",
            Status::Absent => "A",
        }
    }

    pub fn from_code(raw: &str) -> Option<Status> {
        match raw.trim() {
            "P" => Some(Status::Present),
            "A" => Some(Status::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub roll_number: String,
    pub name: String,
    pub department: Department,
    pub year: Year,
    pub credential_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct Subject {
    pub id: String,
    pub subject_code: String,
    pub name: String,
    pub department: Department,
    pub year: Year,
    pub created_at: String,
    pub updated_at: String,
}

/// A student may reference a subject's ledger only when both sit in the same
/// department and academic year. Used as the roster pre-filter and as the
/// validation gate before any record is persisted.
pub fn is_eligible(student: &Student, subject: &Subject) -> bool {
    student.department == subject.department && student.year == subject.year
}

/// Typed outcome for every core operation. `code()` is the stable string the
/// IPC envelope carries; the presentation layer owns user-facing wording.
#[derive(Debug)]
pub enum CoreError {
    DuplicateIdentifier { field: &'static str, value: String },
    RosterMismatch(String),
    NotFound(&'static str),
    UpsertConflict,
    BadInput(String),
    Db(rusqlite::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::DuplicateIdentifier { .. } => "duplicate_identifier",
            CoreError::RosterMismatch(_) => "roster_mismatch",
            CoreError::NotFound(_) => "not_found",
            CoreError::UpsertConflict => "upsert_conflict",
            CoreError::BadInput(_) => "bad_params",
            CoreError::Db(_) => "db_query_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            CoreError::DuplicateIdentifier { field, value } => {
                format!("{} \"{}\" is already taken", field, value)
            }
            CoreError::RosterMismatch(detail) => detail.clone(),
            CoreError::NotFound(what) => format!("{} not found", what),
            CoreError::UpsertConflict => {
                "attendance already recorded for this student, subject and date".to_string()
            }
            CoreError::BadInput(detail) => detail.clone(),
            CoreError::Db(e) => e.to_string(),
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::DuplicateIdentifier { field, .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Db(e)
    }
}

/// True when the driver reports a UNIQUE/constraint failure. The schema's
/// uniqueness constraints are the sole arbiter of write races.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
