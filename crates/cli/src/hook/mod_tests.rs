// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn channel_name_for_truncates_session_id() {
    let name = channel_name_for("myproj", "11111111-2222-3333-4444-555555555555");
    assert_eq!(name, "myproj-11111111");
}

#[test]
fn truncate_chars_passes_through_short_text() {
    assert_eq!(truncate_chars("hi", 10), "hi");
}

#[test]
fn truncate_chars_cuts_at_limit() {
    let s = "x".repeat(20);
    assert_eq!(truncate_chars(&s, 5).len(), 5);
}

#[test]
fn last_assistant_text_reads_final_block_after_last_user_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let lines = [
        r#"{"type":"user","message":{"content":[{"type":"text","text":"hi"}]}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"first reply"}]}}"#,
        r#"{"type":"user","message":{"content":[{"type":"text","text":"again"}]}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"},{"type":"text","text":"final reply"}]}}"#,
    ];
    std::fs::write(&path, lines.join("\n")).unwrap();

    let text = last_assistant_text(path.to_str().unwrap()).unwrap();
    assert_eq!(text, "final reply");
}

#[test]
fn last_assistant_text_missing_file_returns_none() {
    assert!(last_assistant_text("/nonexistent/path.jsonl").is_none());
}

#[test]
fn waiting_for_input_converts_markdown_before_truncating() {
    let text = "**please confirm** before I continue";
    let converted = markdown_to_mrkdwn(text);
    let truncated = truncate_chars(&converted, PROGRESS_TRUNCATE);
    assert_eq!(truncated, "*please confirm* before I continue");
}
