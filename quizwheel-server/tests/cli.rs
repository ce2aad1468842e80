use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "quizwheel-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_help_lists_flags() {
    let exe = env!("CARGO_BIN_EXE_quizwheel-server");
    let output = Command::new(exe).arg("--help").output().expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--bind", "--database", "--config", "--rate-limit", "--cors-origin"] {
        assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
    }
}

#[test]
fn cli_refuses_invalid_config() {
    let exe = env!("CARGO_BIN_EXE_quizwheel-server");
    let config_path = temp_path("config.json");
    std::fs::write(&config_path, r#"{"win_odds": 0}"#).expect("write config");
    let output = Command::new(exe)
        .args(["--bind", "127.0.0.1:0", "--config"])
        .arg(&config_path)
        .output()
        .expect("run cli");
    let _ = std::fs::remove_file(&config_path);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("win_odds"), "stderr was:\n{stderr}");
}

#[test]
fn cli_refuses_missing_config_file() {
    let exe = env!("CARGO_BIN_EXE_quizwheel-server");
    let output = Command::new(exe)
        .args(["--config"])
        .arg(temp_path("absent.json"))
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loading config"), "stderr was:\n{stderr}");
}

#[test]
fn cli_refuses_unusable_cors_origin() {
    let exe = env!("CARGO_BIN_EXE_quizwheel-server");
    let output = Command::new(exe)
        .args(["--bind", "127.0.0.1:0", "--cors-origin", "bad\u{1}origin"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--cors-origin"), "stderr was:\n{stderr}");
}
