use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const HANDBOOK: &str = "Student Handbook

Welcome to the university. This guide explains the services available to you.

FEES AND PAYMENTS

Tuition is due on the first of May. Late fees apply after ten days.

Library Services

The library opens at nine. It closes at midnight during exam weeks.
";

const RESULTS: &str = r#"[
  {"id": "fees", "text": "Tuition is due on the first of May.", "score": 0.82},
  {"id": "library", "text": "The library closes at midnight.", "score": 0.61},
  {"id": "parking", "text": "Parking permits are sold online.", "score": 0.31}
]"#;

const TRANSCRIPT: &str = r#"[
  {"role": "user", "content": "When is tuition due?"},
  {"role": "assistant", "content": "Tuition is due on the first of May."}
]"#;

fn tutor_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tutor");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(files_dir.join("handbook.md"), HANDBOOK).unwrap();
    fs::write(
        files_dir.join("prose.txt"),
        "Tuition is due on the first of May. Late fees apply after ten days.\n",
    )
    .unwrap();
    fs::write(files_dir.join("empty.txt"), "   \n\n").unwrap();
    fs::write(files_dir.join("results.json"), RESULTS).unwrap();
    fs::write(files_dir.join("transcript.json"), TRANSCRIPT).unwrap();

    let config_content = r#"[chunking]
strategy = "sentence"
chunk_size = 120
chunk_overlap = 20

[memory]
max_conversation_history = 10
conversation_ttl_hours = 24

[assembly]
max_context_chars = 4000
min_confidence_score = 0.7

[guardrail]
min_response_length = 10
max_response_length = 1000

[logging]
level = "warn"
"#;
    let config_path = config_dir.join("tutor.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn file(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn run_tutor(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tutor_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tutor binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_sections_lists_headings() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) =
        run_tutor(&config, &["sections", &file(&config, "handbook.md")]);
    assert!(success, "sections failed: {}", stderr);
    assert!(stdout.contains("Student Handbook"));
    assert!(stdout.contains("FEES AND PAYMENTS"));
    assert!(stdout.contains("Library Services"));
}

#[test]
fn test_sections_without_headings() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_tutor(&config, &["sections", &file(&config, "prose.txt")]);
    assert!(success);
    assert!(stdout.contains("No headings detected."));
}

#[test]
fn test_chunk_section_strategy_json() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_tutor(
        &config,
        &[
            "chunk",
            &file(&config, "handbook.md"),
            "--strategy",
            "section",
            "--json",
        ],
    );
    assert!(success, "chunk failed: {}", stderr);

    let chunks: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert!(chunks.len() >= 3);
    let titles: Vec<&str> = chunks
        .iter()
        .filter_map(|c| c["section_title"].as_str())
        .collect();
    assert!(titles.contains(&"FEES AND PAYMENTS"));
    assert!(titles.contains(&"Library Services"));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["sequence_index"].as_u64(), Some(i as u64));
        assert_eq!(chunk["strategy"], "section");
    }
}

#[test]
fn test_chunk_unknown_strategy_falls_back_to_sentence() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_tutor(
        &config,
        &["chunk", &file(&config, "prose.txt"), "--strategy", "paragraph"],
    );
    assert!(success, "chunk failed: {}", stderr);
    assert!(stdout.contains("  strategy: sentence"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_chunk_empty_document_has_no_chunks() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_tutor(&config, &["chunk", &file(&config, "empty.txt")]);
    assert!(success);
    assert!(stdout.contains("  chunks: 0"));
}

#[test]
fn test_chunk_rejects_overlap_not_below_size() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_tutor(
        &config,
        &[
            "chunk",
            &file(&config, "prose.txt"),
            "--chunk-size",
            "50",
            "--overlap",
            "50",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("must be smaller than chunk_size"));
}

#[test]
fn test_chunk_missing_file_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_tutor(&config, &["chunk", "/no/such/handbook.md"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read document"));
}

#[test]
fn test_assemble_reports_confidence() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_tutor(
        &config,
        &[
            "assemble",
            "--results",
            &file(&config, "results.json"),
            "--question",
            "When is tuition due?",
        ],
    );
    assert!(success, "assemble failed: {}", stderr);
    assert!(stdout.contains("  included: 3"));
    assert!(stdout.contains("  confidence: 0.870 (threshold 0.70, ok)"));
    assert!(stdout.contains("[fees]\nTuition is due on the first of May."));
    assert!(stdout.contains("  history: none"));
    assert!(stdout.contains("  language: "));
}

#[test]
fn test_assemble_with_transcript_includes_history() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_tutor(
        &config,
        &[
            "assemble",
            "--results",
            &file(&config, "results.json"),
            "--transcript",
            &file(&config, "transcript.json"),
            "--question",
            "And are there late fees?",
            "--json",
        ],
    );
    assert!(success, "assemble failed: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rendered = report["rendered"].as_str().unwrap();
    assert!(rendered.starts_with("Previous conversation:\nUser: When is tuition due?"));
    assert!(!rendered.contains("late fees?"));
    assert_eq!(report["meets_threshold"], true);
    assert!(report["language"].is_string());
    assert_eq!(report["context"]["blocks"][0]["id"], "fees");
}

#[test]
fn test_assemble_small_budget_omits_passages() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_tutor(
        &config,
        &[
            "assemble",
            "--results",
            &file(&config, "results.json"),
            "--max-chars",
            "60",
        ],
    );
    assert!(success, "assemble failed: {}", stderr);
    assert!(stdout.contains("  included: 1"));
    assert!(stdout.contains("  omitted: 2"));
    assert!(stdout.contains("  confidence: 0.820"));
}

#[test]
fn test_assemble_without_results_is_low_confidence() {
    let (tmp, config) = setup_test_env();
    let empty = tmp.path().join("files").join("none.json");
    fs::write(&empty, "[]").unwrap();
    let (stdout, _, success) = run_tutor(
        &config,
        &["assemble", "--results", empty.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("  confidence: 0.000 (threshold 0.70, low)"));
}

#[test]
fn test_validate_truncates_long_answer() {
    let (tmp, config) = setup_test_env();
    let answer = "Tuition is due on the first of May. ".repeat(60);
    let path = tmp.path().join("answer.txt");
    fs::write(&path, &answer).unwrap();

    let (stdout, stderr, success) = run_tutor(
        &config,
        &["validate", path.to_str().unwrap(), "--max", "500", "--json"],
    );
    assert!(success, "validate failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let text = outcome["text"].as_str().unwrap();
    assert!(text.chars().count() <= 500);
    assert!(text.ends_with("May."));
    assert_eq!(outcome["verdict"], "truncated");
}

#[test]
fn test_validate_max_alone_below_configured_min() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("answer.txt");
    fs::write(&path, "Yes.").unwrap();

    let (stdout, stderr, success) = run_tutor(
        &config,
        &["validate", path.to_str().unwrap(), "--max", "5", "--json"],
    );
    assert!(success, "validate failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["text"], "Yes.");
}

#[test]
fn test_validate_empty_answer_from_stdin() {
    let (_tmp, config) = setup_test_env();
    let mut child = Command::new(tutor_binary())
        .arg("--config")
        .arg(config.to_str().unwrap())
        .args(["validate", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"   \n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("I don't have enough information to answer that question."));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("absent.toml");
    let doc = tmp.path().join("doc.txt");
    fs::write(&doc, "Short note. Another one.").unwrap();

    let (stdout, stderr, success) = run_tutor(&config, &["chunk", doc.to_str().unwrap()]);
    assert!(success, "chunk failed: {}", stderr);
    assert!(stdout.contains("  chunk_size: 500"));
    assert!(stdout.contains("  overlap: 50"));
    assert!(stdout.contains("  chunks: 1"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("tutor.toml");
    fs::write(&config, "[embedding]\nprovider = \"carrier-pigeon\"\n").unwrap();
    let doc = tmp.path().join("doc.txt");
    fs::write(&doc, "Short note.").unwrap();

    let (_, stderr, success) = run_tutor(&config, &["chunk", doc.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}
