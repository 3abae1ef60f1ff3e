use serde_json::{json, Value};

/// Success envelope: `{"id", "ok": true, "result"}`.
pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

/// Failure envelope: `{"id", "ok": false, "error": {code, message, details?}}`.
/// `details` is omitted entirely when there is nothing structured to attach.
pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = serde_json::Map::new();
    error.insert("code".to_string(), json!(code));
    error.insert("message".to_string(), json!(message.into()));
    if let Some(d) = details {
        error.insert("details".to_string(), d);
    }
    json!({
        "id": id,
        "ok": false,
        "error": Value::Object(error),
    })
}
