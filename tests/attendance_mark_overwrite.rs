use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn raw_request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = raw_request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = raw_request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

#[test]
fn marking_scenario_with_overwrite_and_mismatch() {
    let workspace = temp_dir("attendanced-marking");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let cse = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "rollNumber": "21CSE001",
            "name": "Asha Rao",
            "department": "CSE",
            "year": 1
        }),
    );
    let cse_id = cse
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let ece = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "rollNumber": "21ECE001",
            "name": "Binod Kumar",
            "department": "ECE",
            "year": 1
        }),
    );
    let ece_id = ece
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({
            "subjectCode": "CS101",
            "name": "Data Structures",
            "department": "CSE",
            "year": 1
        }),
    );
    let cs101 = subject
        .get("subject")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("subject id")
        .to_string();

    // Roster filtering keeps the ECE student out entirely.
    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.roster",
        json!({ "subjectId": cs101 }),
    );
    let students = roster
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(students.len(), 1);
    assert_eq!(
        students[0].get("rollNumber").and_then(|v| v.as_str()),
        Some("21CSE001")
    );

    let mut present = serde_json::Map::new();
    present.insert(cse_id.clone(), json!(true));
    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({
            "subjectId": cs101,
            "date": "2024-01-10",
            "presentByStudent": present
        }),
    );
    assert_eq!(outcome.get("successCount").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(outcome.get("failureCount").and_then(|v| v.as_i64()), Some(0));

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "reports.studentSummary",
        json!({ "studentId": cse_id }),
    );
    assert_eq!(summary.get("total").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(summary.get("present").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(summary.get("absent").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        summary.get("percentage").and_then(|v| v.as_f64()),
        Some(100.0)
    );

    // Re-mark the same date with the student absent: overwrite, not merge.
    let mut absent = serde_json::Map::new();
    absent.insert(cse_id.clone(), json!(false));
    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.mark",
        json!({
            "subjectId": cs101,
            "date": "2024-01-10",
            "presentByStudent": absent
        }),
    );
    assert_eq!(outcome.get("successCount").and_then(|v| v.as_i64()), Some(1));

    let existing = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.existing",
        json!({ "subjectId": cs101, "date": "2024-01-10" }),
    );
    assert_eq!(
        existing
            .get("marks")
            .and_then(|m| m.get(&cse_id))
            .and_then(|v| v.as_str()),
        Some("A")
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "reports.studentSummary",
        json!({ "studentId": cse_id }),
    );
    assert_eq!(summary.get("total").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(summary.get("present").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(summary.get("absent").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(summary.get("percentage").and_then(|v| v.as_f64()), Some(0.0));

    // Direct record creation across department lines is refused.
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.record",
        json!({
            "studentId": ece_id,
            "subjectId": cs101,
            "date": "2024-01-10",
            "status": "P"
        }),
    );
    assert_eq!(code, "roster_mismatch");

    // A raw insert on an existing triple is a conflict, not an overwrite.
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.record",
        json!({
            "studentId": cse_id,
            "subjectId": cs101,
            "date": "2024-01-10",
            "status": "P"
        }),
    );
    assert_eq!(code, "upsert_conflict");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn empty_roster_marking_is_a_counted_no_op() {
    let workspace = temp_dir("attendanced-empty-roster");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.create",
        json!({
            "subjectCode": "BA301",
            "name": "Organisational Behaviour",
            "department": "BA",
            "year": 3
        }),
    );
    let subject_id = subject
        .get("subject")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("subject id")
        .to_string();

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.roster",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(
        roster
            .get("students")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(0)
    );

    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "subjectId": subject_id,
            "date": "2024-01-10",
            "presentByStudent": {}
        }),
    );
    assert_eq!(outcome.get("successCount").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(outcome.get("failureCount").and_then(|v| v.as_i64()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
