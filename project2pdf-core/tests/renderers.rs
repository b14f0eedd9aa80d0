use std::fs::{self, File};
use std::io::Write;

use project2pdf_core::contract::{RenderError, Renderer};
use project2pdf_core::render::InProcessRenderer;
use tempfile::tempdir;

fn assert_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "Output PDF is too small and may not exist");
    assert_eq!(&bytes[0..4], b"%PDF", "PDF file missing magic header");
}

#[tokio::test]
async fn in_process_renderer_turns_source_into_pdf() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("test_code.rs");
    let mut input_file = File::create(&input_path).unwrap();
    writeln!(input_file, "fn main() {{ println!(\"hi world\"); }}").unwrap();
    for i in 0..200 {
        writeln!(
            input_file,
            "\tlet value_{i} = {i}; // a line long enough to need wrapping on an A4 page at eight points"
        )
        .unwrap();
    }

    let bytes = InProcessRenderer::default()
        .render_generic(&input_path)
        .await
        .expect("PDF conversion failed");
    assert_pdf(&bytes);
}

#[tokio::test]
async fn in_process_renderer_turns_markdown_into_pdf() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("README.md");
    fs::write(
        &input_path,
        "# Test\nHello world!\n\n- one\n- two\n\n```rust\nfn main() {}\n```\n",
    )
    .unwrap();

    let bytes = InProcessRenderer::default()
        .render_markdown(&input_path)
        .await
        .expect("PDF conversion failed");
    assert_pdf(&bytes);
}

#[tokio::test]
async fn empty_files_still_produce_a_page() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("__init__.py");
    File::create(&input_path).unwrap();

    let bytes = InProcessRenderer::default()
        .render_generic(&input_path)
        .await
        .unwrap();
    assert_pdf(&bytes);
}

#[tokio::test]
async fn binary_files_are_reported_not_rendered() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("blob.bin");
    fs::write(&input_path, [0xff, 0xfe, 0x00, 0x9f, 0x92]).unwrap();

    let err = InProcessRenderer::default()
        .render_generic(&input_path)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::NotText { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreadable_files_are_reported() {
    let dir = tempdir().unwrap();
    let err = InProcessRenderer::default()
        .render_markdown(&dir.path().join("missing.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Read { .. }), "got {err:?}");
}

#[cfg(unix)]
mod command {
    use super::*;
    use project2pdf_core::render::{CommandRenderer, CommandSpec};

    #[tokio::test]
    async fn command_output_file_is_returned() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("a.py");
        fs::write(&input_path, "%PDF pretend this is a pdf\n").unwrap();

        // `cp <src> <dst>` stands in for an external converter.
        let renderer = CommandRenderer::new(CommandSpec::new("cp", vec![]));
        let bytes = renderer.render_generic(&input_path).await.unwrap();
        assert_eq!(bytes, b"%PDF pretend this is a pdf\n");
    }

    #[tokio::test]
    async fn markdown_falls_back_to_the_generic_command() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("README.md");
        fs::write(&input_path, "# hi\n").unwrap();

        let renderer = CommandRenderer::new(CommandSpec::new("cp", vec![]));
        let bytes = renderer.render_markdown(&input_path).await.unwrap();
        assert_eq!(bytes, b"# hi\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_render_error() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("a.py");
        fs::write(&input_path, "x\n").unwrap();

        let renderer = CommandRenderer::new(CommandSpec::new("false", vec![]));
        let err = renderer.render_generic(&input_path).await.unwrap_err();
        assert!(matches!(err, RenderError::CommandFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_program_is_a_render_error() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("a.py");
        fs::write(&input_path, "x\n").unwrap();

        let renderer =
            CommandRenderer::new(CommandSpec::new("project2pdf-no-such-converter", vec![]));
        let err = renderer.render_generic(&input_path).await.unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }), "got {err:?}");
    }
}
