mod db;
mod ipc;
mod ledger;
mod marking;
mod model;
mod roster;
mod summary;

use std::io::{self, BufRead, Write};

fn emit(stdout: &mut io::Stdout, resp: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}

fn main() {
    let mut state = ipc::AppState::disconnected();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Unparseable line has no id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                emit(&mut stdout, &resp);
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        emit(&mut stdout, &resp);
    }
}
