use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use project2pdf_core::config::RunConfig;
use project2pdf_core::contract::{MockRenderer, RenderError};
use project2pdf_core::engine::{run, RunError};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).unwrap();
    }
    let mut f = File::create(path).unwrap();
    write!(f, "{content}").unwrap();
}

/// proj/{a.py, README.md, .gitignore, sub/.git/config}
fn scenario_tree(root: &Path) -> PathBuf {
    let proj = root.join("proj");
    write_file(&proj.join("a.py"), "print('hi')\n");
    write_file(&proj.join("README.md"), "# Readme\n");
    write_file(&proj.join(".gitignore"), "target\n");
    write_file(&proj.join("sub/.git/config"), "[core]\n");
    proj
}

fn accepting_renderer() -> MockRenderer {
    let mut renderer = MockRenderer::new();
    renderer
        .expect_render_generic()
        .returning(|_| Ok(FAKE_PDF.to_vec()));
    renderer
        .expect_render_markdown()
        .returning(|_| Ok(FAKE_PDF.to_vec()));
    renderer
}

fn config_for(source: &Path) -> RunConfig {
    let mut config = RunConfig::new(source);
    config.concurrency = 2;
    config
}

/// Relative paths of everything under `root`, sorted.
fn tree_listing(root: &Path) -> Vec<String> {
    fn visit(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            out.push(path.strip_prefix(root).unwrap().display().to_string());
            if path.is_dir() {
                visit(&path, root, out);
            }
        }
    }
    let mut out = Vec::new();
    visit(root, root, &mut out);
    out.sort();
    out
}

#[tokio::test]
async fn scenario_tree_is_mirrored_with_hidden_entries_pruned() {
    let tmp = tempdir().unwrap();
    let proj = scenario_tree(tmp.path());

    let stats = run(
        &config_for(&proj),
        Arc::new(accepting_renderer()),
        CancellationToken::new(),
    )
    .await
    .expect("run should succeed");

    let out = tmp.path().join("proj_pdf");
    assert!(out.join("a.py.pdf").is_file());
    assert!(out.join("README.md.pdf").is_file());
    assert!(!out.join(".gitignore.pdf").exists());
    assert!(out.join("sub").is_dir());
    assert!(!out.join("sub/.git").exists());
    assert_eq!(fs::read(out.join("a.py.pdf")).unwrap(), FAKE_PDF);

    assert_eq!(stats.directories_visited, 2);
    assert_eq!(stats.directories_skipped, 1);
    assert_eq!(stats.files_converted, 2);
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.files_failed, 0);
    assert!(!stats.cancelled);
}

#[tokio::test]
async fn markdown_and_generic_files_use_their_own_pipeline() {
    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("proj");
    write_file(&proj.join("notes.md"), "# Notes\n");
    write_file(&proj.join("docs/guide.md"), "# Guide\n");
    write_file(&proj.join("main.rs"), "fn main() {}\n");
    write_file(&proj.join("Makefile"), "all:\n");

    let mut renderer = MockRenderer::new();
    renderer
        .expect_render_markdown()
        .withf(|p: &Path| p.extension().is_some_and(|e| e == "md"))
        .times(2)
        .returning(|_| Ok(FAKE_PDF.to_vec()));
    renderer
        .expect_render_generic()
        .withf(|p: &Path| p.extension().map_or(true, |e| e != "md"))
        .times(2)
        .returning(|_| Ok(FAKE_PDF.to_vec()));

    let stats = run(&config_for(&proj), Arc::new(renderer), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.files_converted, 4);
}

#[tokio::test]
async fn a_failing_file_does_not_stop_its_siblings_or_other_directories() {
    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("proj");
    write_file(&proj.join("bad.py"), "x\n");
    write_file(&proj.join("good.py"), "y\n");
    write_file(&proj.join("lib/also_good.py"), "z\n");
    write_file(&proj.join("lib/bad.py"), "x\n");

    let mut renderer = MockRenderer::new();
    renderer.expect_render_generic().returning(|p: &Path| {
        if p.ends_with("bad.py") {
            Err(RenderError::Other("lexer exploded".into()))
        } else {
            Ok(FAKE_PDF.to_vec())
        }
    });

    let stats = run(&config_for(&proj), Arc::new(renderer), CancellationToken::new())
        .await
        .expect("file failures are not fatal");

    let out = tmp.path().join("proj_pdf");
    assert!(out.join("good.py.pdf").is_file());
    assert!(out.join("lib/also_good.py.pdf").is_file());
    assert!(!out.join("bad.py.pdf").exists());
    assert!(!out.join("lib/bad.py.pdf").exists());
    assert_eq!(stats.files_converted, 2);
    assert_eq!(stats.files_failed, 2);
    assert_eq!(stats.directories_visited, 2);
}

#[tokio::test]
async fn second_run_replaces_stale_output() {
    let tmp = tempdir().unwrap();
    let proj = scenario_tree(tmp.path());
    let out = tmp.path().join("proj_pdf");

    let first = run(
        &config_for(&proj),
        Arc::new(accepting_renderer()),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let first_listing = tree_listing(&out);

    write_file(&out.join("stale/old.pdf"), "stale");
    write_file(&out.join("sub/leftover.txt.pdf"), "stale");

    let second = run(
        &config_for(&proj),
        Arc::new(accepting_renderer()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(tree_listing(&out), first_listing);
    assert_eq!(first.files_converted, second.files_converted);
    assert_eq!(first.directories_visited, second.directories_visited);
}

#[tokio::test]
async fn configured_blacklist_prunes_subtrees_and_files() {
    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("proj");
    write_file(&proj.join("src/lib.rs"), "pub fn f() {}\n");
    write_file(&proj.join("target/debug/build.rs"), "fn main() {}\n");
    write_file(&proj.join("src/target/inner.rs"), "fn main() {}\n");
    write_file(&proj.join("logo.png"), "not really a png");
    write_file(&proj.join("Cargo.lock"), "# lock\n");

    let mut config = config_for(&proj);
    config.blacklist.directories.insert("target".into());
    config.blacklist.files.insert("Cargo.lock".into());
    config.blacklist.extensions.insert("png".into());

    let stats = run(&config, Arc::new(accepting_renderer()), CancellationToken::new())
        .await
        .unwrap();

    let out = tmp.path().join("proj_pdf");
    assert_eq!(
        tree_listing(&out),
        vec!["src".to_string(), "src/lib.rs.pdf".to_string()]
    );
    assert_eq!(stats.files_converted, 1);
    assert_eq!(stats.directories_skipped, 2);
}

#[tokio::test]
async fn empty_source_yields_empty_destination() {
    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("empty");
    create_dir_all(&proj).unwrap();

    let mut renderer = MockRenderer::new();
    renderer.expect_render_generic().times(0);
    renderer.expect_render_markdown().times(0);

    let stats = run(&config_for(&proj), Arc::new(renderer), CancellationToken::new())
        .await
        .unwrap();

    let out = tmp.path().join("empty_pdf");
    assert!(out.is_dir());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    assert_eq!(stats.directories_visited, 1);
    assert_eq!(stats.files_converted, 0);
}

#[tokio::test]
async fn missing_source_is_fatal_and_touches_nothing() {
    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("does-not-exist");

    let mut renderer = MockRenderer::new();
    renderer.expect_render_generic().times(0);

    let err = run(&config_for(&proj), Arc::new(renderer), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::SourceNotFound(_)));
    assert!(!tmp.path().join("does-not-exist_pdf").exists());
}

#[tokio::test]
async fn output_inside_the_source_is_rejected() {
    let tmp = tempdir().unwrap();
    let proj = scenario_tree(tmp.path());

    let mut config = config_for(&proj);
    config.destination_root = Some(proj.join("out"));
    let err = run(&config, Arc::new(MockRenderer::new()), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::DestinationInsideSource { .. }));

    config.destination_root = Some(tmp.path().to_path_buf());
    let err = run(&config, Arc::new(MockRenderer::new()), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::DestinationContainsSource { .. }));
    assert!(proj.join("a.py").is_file());
}

#[tokio::test]
async fn explicit_output_root_is_used() {
    let tmp = tempdir().unwrap();
    let proj = scenario_tree(tmp.path());
    let out = tmp.path().join("elsewhere/pdfs");
    create_dir_all(out.parent().unwrap()).unwrap();

    let mut config = config_for(&proj);
    config.destination_root = Some(out.clone());
    run(&config, Arc::new(accepting_renderer()), CancellationToken::new())
        .await
        .unwrap();

    assert!(out.join("a.py.pdf").is_file());
    assert!(!tmp.path().join("proj_pdf").exists());
}

#[tokio::test]
async fn cancelled_run_stops_before_converting() {
    let tmp = tempdir().unwrap();
    let proj = scenario_tree(tmp.path());

    let mut renderer = MockRenderer::new();
    renderer.expect_render_generic().times(0);
    renderer.expect_render_markdown().times(0);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let stats = run(&config_for(&proj), Arc::new(renderer), cancel)
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.files_converted, 0);
    assert_eq!(stats.directories_visited, 0);
    assert!(tmp.path().join("proj_pdf").is_dir());
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_file_names_are_converted_under_their_own_name() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempdir().unwrap();
    let proj = tmp.path().join("proj");
    create_dir_all(&proj).unwrap();
    let name = OsStr::from_bytes(b"caf\xe9.py");
    fs::write(proj.join(name), "print('hi')\n").unwrap();

    // Reads its input, so a re-encoded path would fail the conversion.
    let mut renderer = MockRenderer::new();
    renderer
        .expect_render_generic()
        .times(1)
        .returning(|path| {
            fs::read(path)
                .map(|_| FAKE_PDF.to_vec())
                .map_err(RenderError::from)
        });

    let stats = run(&config_for(&proj), Arc::new(renderer), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.files_converted, 1);
    assert_eq!(stats.files_failed, 0);
    let produced = tmp
        .path()
        .join("proj_pdf")
        .join(OsStr::from_bytes(b"caf\xe9.py.pdf"));
    assert_eq!(fs::read(produced).unwrap(), FAKE_PDF);
}
