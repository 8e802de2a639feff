use std::fs;

use harvest_core::{Author, Message, Snowflake};
use harvest_engine::{
    ensure_output_dir, render_text, AtomicFileWriter, ExportFormat, Exporter, FileExporter,
    EMPTY_MESSAGE_PLACEHOLDER,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn message(id: &str, content: &str, discriminator: &str) -> Message {
    Message {
        id: Snowflake::parse(id).unwrap(),
        timestamp: "2024-03-01T12:00:00.000000+00:00".to_string(),
        author: Author {
            id: "42".to_string(),
            username: "ann".to_string(),
            discriminator: discriminator.to_string(),
            global_name: Some("Ann".to_string()),
        },
        content: content.to_string(),
        attachments: Vec::new(),
        embeds: Vec::new(),
    }
}

#[test]
fn text_export_renders_blocks_with_placeholder() {
    let messages = vec![
        message("1151456287954198578", "hello", "1234"),
        message("1151456287954198579", "", "0"),
    ];

    let text = render_text(&messages);
    assert_eq!(
        text,
        format!(
            "2024-03-01 12:00:00 UTC | ann#1234 (42)\nhello\n[Message ID: 1151456287954198578]\n\n\
             2024-03-01 12:00:00 UTC | ann (42)\n{EMPTY_MESSAGE_PLACEHOLDER}\n[Message ID: 1151456287954198579]"
        )
    );
}

#[test]
fn file_exporter_writes_text_file() {
    let temp = TempDir::new().unwrap();
    let exporter = FileExporter::new(temp.path(), "messages_1_2_3_4");
    let messages = vec![message("3", "a", "0"), message("4", "b", "0")];

    let summary = exporter.export(&messages, ExportFormat::Text).unwrap();

    assert_eq!(summary.message_count, 2);
    assert_eq!(summary.output_path, temp.path().join("messages_1_2_3_4.txt"));
    let written = fs::read_to_string(&summary.output_path).unwrap();
    assert_eq!(written, render_text(&messages));
    assert_eq!(summary.bytes_written, written.len() as u64);
}

#[test]
fn structured_export_keeps_full_messages() {
    let temp = TempDir::new().unwrap();
    let exporter = FileExporter::new(temp.path().join("nested"), "range");
    let mut with_embed = message("5", "see link", "0");
    with_embed.embeds.push(json!({"type": "link", "url": "https://example.com"}));

    let summary = exporter
        .export(&[message("4", "", "0"), with_embed], ExportFormat::Structured)
        .unwrap();

    assert!(summary.output_path.ends_with("nested/range.json"));
    let parsed: Value = serde_json::from_str(&fs::read_to_string(summary.output_path).unwrap()).unwrap();
    assert_eq!(parsed["message_count"], 2);
    assert_eq!(parsed["messages"][0]["id"], "4");
    assert_eq!(parsed["messages"][1]["embeds"][0]["type"], "link");
    assert_eq!(parsed["messages"][1]["author"]["global_name"], "Ann");
}

#[test]
fn empty_slice_exports_empty_text() {
    let temp = TempDir::new().unwrap();
    let summary = FileExporter::new(temp.path(), "empty")
        .export(&[], ExportFormat::Text)
        .unwrap();
    assert_eq!(summary.message_count, 0);
    assert!(fs::read_to_string(summary.output_path).unwrap().is_empty());
}

#[test]
fn output_dir_is_created_when_missing() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_previous_export() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path());

    let first = writer.write("range.txt", b"first run").unwrap();
    let second = writer.write("range.txt", b"second run").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "second run");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn file_in_place_of_directory_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = AtomicFileWriter::new(file_path.clone()).write("range.txt", b"data");
    assert!(result.is_err());
    assert!(!temp.path().join("range.txt").exists());
}
