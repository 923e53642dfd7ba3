//! Integration tests for the PDF toolbox

mod common;

use common::{blank_pdf, pdf_with_rotations, tagged_pdf};
use pdf_toolbox_mcp::ops::{OpSettings, Operation};
use pdf_toolbox_mcp::pdf::{page_texts, parse_page_selection, QpdfWrapper, Rotation};
use pdf_toolbox_mcp::task::{CancelFlag, Progress, TaskContext};
use pdf_toolbox_mcp::{Error, FileSource, SelectedFile, ServerConfig, ToolKind, ToolboxServer};
use rstest::rstest;
use std::path::Path;
use std::time::Duration;

fn run(op: Operation, inputs: Vec<SelectedFile>) -> pdf_toolbox_mcp::Result<Vec<Vec<u8>>> {
    let mut ctx = TaskContext::detached();
    op.run(&inputs, &OpSettings::default(), &mut ctx)
        .map(|output| output.parts)
}

fn pdf(name: &str, data: Vec<u8>) -> SelectedFile {
    SelectedFile::new(name, data)
}

fn pages(data: &[u8]) -> u32 {
    QpdfWrapper::get_page_count(data, None).expect("readable PDF")
}

fn rotations(data: &[u8]) -> Vec<i64> {
    QpdfWrapper::page_rotations(data, None).expect("readable PDF")
}

// ============================================================================
// Merge and split
// ============================================================================

/// Test that merge page counts add up and source order is kept
#[test]
fn test_merge_sums_pages_in_order() {
    let first = pdf_with_rotations(&[Some(90), Some(90)], None);
    let second = pdf_with_rotations(&[Some(180)], None);
    let third = pdf_with_rotations(&[Some(270), None, Some(270)], None);

    let parts = run(
        Operation::Merge,
        vec![pdf("a.pdf", first), pdf("b.pdf", second), pdf("c.pdf", third)],
    )
    .unwrap();

    assert_eq!(parts.len(), 1);
    assert_eq!(pages(&parts[0]), 6);
    assert_eq!(rotations(&parts[0]), vec![90, 90, 180, 270, 0, 270]);
}

/// Test that split yields one single-page document per page, in order
#[test]
fn test_split_then_merge_restores_order() {
    let source = tagged_pdf(4);

    let parts = run(Operation::Split, vec![pdf("in.pdf", source.clone())]).unwrap();
    assert_eq!(parts.len(), 4);
    assert!(parts.iter().all(|p| pages(p) == 1));

    let inputs = parts
        .into_iter()
        .enumerate()
        .map(|(i, data)| pdf(&format!("{}.pdf", i), data))
        .collect();
    let merged = run(Operation::Merge, inputs).unwrap();

    assert_eq!(rotations(&merged[0]), rotations(&source));
}

// ============================================================================
// Rotation
// ============================================================================

/// Test that rotation is added to each page's existing angle
#[test]
fn test_rotation_is_relative() {
    let source = pdf_with_rotations(&[None, Some(90), Some(270)], None);
    let rotation = Rotation::new(180).unwrap();

    let parts = run(Operation::Rotate { rotation }, vec![pdf("in.pdf", source)]).unwrap();

    assert_eq!(rotations(&parts[0]), vec![180, 270, 90]);
}

/// Test that four quarter turns come back to the start
#[test]
fn test_four_quarter_turns_are_identity() {
    let mut data = tagged_pdf(3);
    let original = rotations(&data);
    let rotation = Rotation::new(90).unwrap();

    for _ in 0..4 {
        data = run(Operation::Rotate { rotation }, vec![pdf("in.pdf", data)])
            .unwrap()
            .remove(0);
    }

    assert_eq!(rotations(&data), original);
}

#[rstest]
#[case(0)]
#[case(45)]
#[case(-90)]
#[case(360)]
fn test_rotation_rejects_other_angles(#[case] degrees: i32) {
    assert!(matches!(
        Rotation::new(degrees),
        Err(Error::InvalidRotation { .. })
    ));
}

// ============================================================================
// Page deletion and organizing
// ============================================================================

/// Test the documented deletion example on a ten page document
#[test]
fn test_delete_pages_example() {
    let source = pdf_with_rotations(
        &[
            Some(0),
            Some(90),
            Some(180),
            Some(270),
            Some(0),
            Some(90),
            Some(180),
            Some(270),
            Some(0),
            Some(90),
        ],
        None,
    );

    let parts = run(
        Operation::DeletePages {
            range: "1, 3, 5-8".to_string(),
        },
        vec![pdf("in.pdf", source)],
    )
    .unwrap();

    // Pages 2, 4, 9 and 10 remain
    assert_eq!(rotations(&parts[0]), vec![90, 270, 0, 90]);
}

#[rstest]
#[case("8-5", "5-8")]
#[case("3, 3, 3", "3")]
#[case("2, 99", "2")]
#[case("1, x, 2", "1, 2")]
fn test_delete_pages_equivalent_selections(#[case] given: &str, #[case] expected: &str) {
    let source = tagged_pdf(10);
    let delete = |range: &str| {
        run(
            Operation::DeletePages {
                range: range.to_string(),
            },
            vec![pdf("in.pdf", source.clone())],
        )
        .unwrap()
        .remove(0)
    };

    assert_eq!(rotations(&delete(given)), rotations(&delete(expected)));
}

/// Test that a selection covering every page is refused
#[test]
fn test_delete_every_page_is_refused() {
    let result = run(
        Operation::DeletePages {
            range: "1-3".to_string(),
        },
        vec![pdf("in.pdf", blank_pdf(3))],
    );
    assert!(matches!(result, Err(Error::InvalidPageRange { .. })));
}

/// Test that organize follows the given order, duplicates included
#[test]
fn test_organize_pages() {
    let parts = run(
        Operation::Organize {
            order: "4, 1-2, 4".to_string(),
        },
        vec![pdf("in.pdf", tagged_pdf(4))],
    )
    .unwrap();

    assert_eq!(rotations(&parts[0]), vec![270, 0, 90, 270]);
}

#[test]
fn test_selection_ignored_tokens_are_reported() {
    let selection = parse_page_selection("1, abc, 2-", 5);
    assert_eq!(selection.ordered, vec![0]);
    assert_eq!(selection.ignored, vec!["abc", "2-"]);
}

// ============================================================================
// Encryption and compression
// ============================================================================

/// Test that encrypted output cannot be opened without the password
#[test]
fn test_encrypt_requires_password() {
    let parts = run(
        Operation::Encrypt {
            password: "s3cret".to_string(),
        },
        vec![pdf("in.pdf", blank_pdf(2))],
    )
    .unwrap();

    assert!(matches!(
        QpdfWrapper::get_page_count(&parts[0], None),
        Err(Error::PasswordRequired) | Err(Error::IncorrectPassword)
    ));
    assert_eq!(QpdfWrapper::get_page_count(&parts[0], Some("s3cret")).unwrap(), 2);

    let decrypted = run(
        Operation::Decrypt {
            password: "s3cret".to_string(),
        },
        vec![pdf("locked.pdf", parts[0].clone())],
    )
    .unwrap();
    assert_eq!(pages(&decrypted[0]), 2);
}

#[test]
fn test_compress_keeps_pages() {
    let parts = run(Operation::Compress, vec![pdf("in.pdf", tagged_pdf(5))]).unwrap();
    assert_eq!(rotations(&parts[0]), rotations(&tagged_pdf(5)));
}

// ============================================================================
// Watermark (needs the PDFium library)
// ============================================================================

/// Test that the watermark text lands on every page
#[test]
#[ignore = "needs the PDFium shared library"]
fn test_watermark_on_every_page() {
    let parts = run(
        Operation::Watermark {
            text: "CONFIDENTIAL".to_string(),
        },
        vec![pdf("in.pdf", blank_pdf(3))],
    )
    .unwrap();

    let texts = page_texts(&parts[0], None).unwrap();
    assert_eq!(texts.len(), 3);
    assert!(texts.iter().all(|t| t.contains("CONFIDENTIAL")));
}

/// Test that an empty watermark does nothing
#[test]
fn test_empty_watermark_is_noop() {
    let op = Operation::Watermark {
        text: String::new(),
    };
    assert_eq!(
        op.skip_reason(&[pdf("in.pdf", blank_pdf(1))]),
        Some("no watermark text")
    );
}

// ============================================================================
// Progress and cancellation
// ============================================================================

/// Test that progress never goes backwards and ends at 100
#[test]
fn test_progress_is_monotonic() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut ctx = TaskContext::new(Progress::new(tx), CancelFlag::new());

    Operation::Split
        .run(&[pdf("in.pdf", blank_pdf(4))], &OpSettings::default(), &mut ctx)
        .unwrap();
    drop(ctx);

    let mut percents = Vec::new();
    while let Ok(event) = rx.try_recv() {
        percents.push(event.percent);
    }

    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last().copied(), Some(100.0));
}

#[test]
fn test_cancelled_run_stops() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut ctx = TaskContext::new(Progress::silent(), cancel);

    let result = Operation::Split.run(&[pdf("in.pdf", blank_pdf(3))], &OpSettings::default(), &mut ctx);

    assert!(matches!(result, Err(Error::Cancelled { .. })));
}

// ============================================================================
// Server end to end
// ============================================================================

fn server_in(dir: &Path) -> ToolboxServer {
    ToolboxServer::with_config(ServerConfig {
        output_dir: dir.join("out"),
        pacing: Duration::ZERO,
        ..ServerConfig::default()
    })
}

fn path_source(dir: &Path, name: &str, data: &[u8]) -> FileSource {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    FileSource::Path {
        path: path.to_string_lossy().to_string(),
    }
}

/// Test merging three files through the server into one named output
#[tokio::test]
async fn test_server_merge_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    let sources = vec![
        path_source(dir.path(), "a.pdf", &blank_pdf(1)),
        path_source(dir.path(), "b.pdf", &blank_pdf(2)),
        path_source(dir.path(), "c.pdf", &blank_pdf(3)),
    ];

    let result = server.run_operation(Operation::Merge, &sources, None).await;

    assert_eq!(result.status, "completed");
    let written: Vec<_> = std::fs::read_dir(dir.path().join("out"))
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("v0pdftools_Merged_"));
    assert!(written[0].ends_with(".pdf"));

    let data = std::fs::read(dir.path().join("out").join(&written[0])).unwrap();
    assert_eq!(pages(&data), 6);
    assert_eq!(result.outputs[0].page_count, Some(6));
}

/// Test that a single-file tool given several sources uses the first
#[tokio::test]
async fn test_server_single_file_tool_uses_first_source() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    let sources = vec![
        path_source(dir.path(), "a.pdf", &blank_pdf(2)),
        path_source(dir.path(), "b.pdf", &blank_pdf(5)),
    ];

    let result = server.run_operation(Operation::Split, &sources, None).await;

    assert_eq!(result.status, "completed");
    assert_eq!(result.outputs.len(), 2);
    assert!(result.outputs[1].file_name.ends_with("_Page_2.pdf"));
}

/// Test that a wrong extension fails with the generic message
#[tokio::test]
async fn test_server_rejects_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    let sources = vec![path_source(dir.path(), "a.txt", &blank_pdf(1))];

    let result = server.run_operation(Operation::Compress, &sources, None).await;

    assert_eq!(result.status, "failed");
    assert_eq!(
        result.error.as_deref(),
        Some("Intelligence failure during compress operation")
    );
    assert!(!dir.path().join("out").exists());
}

/// Test that the session is idle again after a run
#[tokio::test]
async fn test_server_session_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    server
        .workbench()
        .update(|s| s.set_current_tool(ToolKind::Split));

    let sources = vec![path_source(dir.path(), "a.pdf", &blank_pdf(2))];
    let result = server.run_operation(Operation::Split, &sources, None).await;
    assert_eq!(result.status, "completed");

    let state = server.workbench().snapshot();
    assert_eq!(state.current_tool(), ToolKind::Split);
    assert!(!state.is_processing());
    assert_eq!(state.progress(), 0.0);
}
