use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

// Resolve the parleyc exe via Cargo's env var, with a target-dir fallback
fn exe_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("CARGO_BIN_EXE_parleyc") {
        return Some(PathBuf::from(p));
    }
    let md = env::var("CARGO_MANIFEST_DIR").ok()?;
    let mut p = PathBuf::from(md);
    p.pop(); // up to workspace root
    p.push("target");
    p.push("debug");
    if cfg!(windows) { p.push("parleyc.exe"); } else { p.push("parleyc"); }
    Some(p)
}

fn temp_script(name: &str, contents: &str) -> PathBuf {
    let mut p = env::temp_dir();
    p.push(format!(
        "{}_{}.parley",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    fs::write(&p, contents).expect("write temp parley file");
    p
}

#[test]
fn run_executes_the_main_handler() {
    let Some(exe) = exe_path() else { return };
    if !exe.exists() {
        eprintln!("parleyc binary not found at {:?}; skipping test", exe);
        return;
    }
    let src_path = temp_script(
        "run_basic",
        "-- smoke test\non main\noutput \"Hello from Parley\"\nrepeat with i from 1 to 3\noutput \"tick\" && i\nend repeat\nend main\n",
    );
    let output = Command::new(&exe)
        .arg("run")
        .arg(&src_path)
        .output()
        .expect("run parleyc");
    assert!(output.status.success(), "parleyc run failed: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "Hello from Parley\ntick 1\ntick 2\ntick 3\n");
    let _ = fs::remove_file(&src_path);
}

#[test]
fn run_accepts_a_handler_name() {
    let Some(exe) = exe_path() else { return };
    if !exe.exists() { return; }
    let src_path = temp_script(
        "run_handler",
        "on main\noutput \"not this one\"\nend main\non greet\noutput \"hello\"\nend greet\n",
    );
    let output = Command::new(&exe)
        .arg("run")
        .arg(&src_path)
        .arg("greet")
        .output()
        .expect("run parleyc");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    let _ = fs::remove_file(&src_path);
}

#[test]
fn parse_errors_exit_nonzero() {
    let Some(exe) = exe_path() else { return };
    if !exe.exists() { return; }
    let src_path = temp_script("run_bad", "on main\nend wrong\n");
    let output = Command::new(&exe)
        .arg("run")
        .arg(&src_path)
        .output()
        .expect("run parleyc");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parse error"), "stderr was: {}", stderr);
    let _ = fs::remove_file(&src_path);
}

#[test]
fn lex_dumps_tokens() {
    let Some(exe) = exe_path() else { return };
    if !exe.exists() { return; }
    let src_path = temp_script("lex_dump", "put 1 into x\n");
    let output = Command::new(&exe)
        .arg("lex")
        .arg(&src_path)
        .output()
        .expect("run parleyc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("UnquotedString(\"put\")"), "stdout was: {}", stdout);
    assert!(stdout.contains("Integer(1)"), "stdout was: {}", stdout);
    let _ = fs::remove_file(&src_path);
}

#[test]
fn analyze_reports_handlers_as_json() {
    let Some(exe) = exe_path() else { return };
    if !exe.exists() { return; }
    let src_path = temp_script(
        "analyze",
        "on main\nput 1 into x\nend main\nfunction quoted str\nreturn str\nend quoted\n",
    );
    let output = Command::new(&exe)
        .arg("analyze")
        .arg(&src_path)
        .arg("--json")
        .output()
        .expect("run parleyc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    let symbols = parsed["symbols"].as_array().expect("symbols array");
    assert_eq!(symbols.len(), 2);
    assert!(parsed["errors"].as_array().expect("errors array").is_empty());
    let _ = fs::remove_file(&src_path);
}
