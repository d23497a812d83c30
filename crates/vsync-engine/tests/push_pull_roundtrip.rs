//! Integration test: push → remote enumeration → pull round-trip against the
//! in-memory transport double, plus the invariants that don't fit neatly
//! into a single unit (dedup idempotence, conflict retry, orphan cleanup).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vsync_engine::tests_support::FakeTransport;
use vsync_engine::{FileOutcome, LocalIndex, PullEngine, PullOptions, PushEngine, PushOptions, Reconciler, RemoteIndex};

fn write(dir: &std::path::Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn roundtrip_push_then_pull() {
    let vault = tempfile::tempdir().unwrap();
    write(vault.path(), "notes/a.md", "hello from the vault");

    let transport: Arc<dyn vsync_transport::Transport> = Arc::new(FakeTransport::new());
    let locals = LocalIndex::scan(vault.path(), &[PathBuf::from("notes")], &[]).unwrap();

    let push = PushEngine::new(transport.clone());
    let outcomes = push
        .push_all(&locals, &HashMap::new(), &PushOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], FileOutcome::Pushed { .. }));

    let other_vault = tempfile::tempdir().unwrap();
    let remote_files = RemoteIndex::scan(transport.as_ref()).await.unwrap();
    assert!(remote_files.contains_key("notes/a.md"));

    let pull = PullEngine::new(transport.clone());
    let pulled = pull
        .pull_all(
            other_vault.path(),
            &remote_files,
            &HashMap::new(),
            &PullOptions::default(),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(pulled.len(), 1);
    assert!(matches!(pulled[0], FileOutcome::Pulled { .. }));

    let content = std::fs::read_to_string(other_vault.path().join("notes/a.md")).unwrap();
    assert_eq!(content, "hello from the vault");
}

#[tokio::test]
async fn pushing_identical_content_twice_does_not_duplicate_chunks() {
    let vault = tempfile::tempdir().unwrap();
    write(vault.path(), "a.md", "the quick brown fox jumps over the lazy dog, repeatedly, to pad this out a little");
    write(vault.path(), "b.md", "the quick brown fox jumps over the lazy dog, repeatedly, to pad this out a little");

    let transport = Arc::new(FakeTransport::new());
    let locals = LocalIndex::scan(vault.path(), &[PathBuf::from(".")], &[]).unwrap();

    let push = PushEngine::new(transport.clone() as Arc<dyn vsync_transport::Transport>);
    let outcomes = push
        .push_all(&locals, &HashMap::new(), &PushOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcomes.iter().filter(|o| matches!(o, FileOutcome::Pushed { .. })).count(), 2);

    // Identical content chunks to identical content-addressed ids; the two
    // file-metadata documents should reference the exact same chunk set.
    let remote_files = RemoteIndex::scan(transport.as_ref()).await.unwrap();
    let a_children = remote_files["a.md"].children.clone().unwrap();
    let b_children = remote_files["b.md"].children.clone().unwrap();
    assert_eq!(a_children, b_children);

    // Total documents = shared chunk set + two file-metadata documents, not
    // double the chunk set.
    let chunk_count = a_children.len();
    assert_eq!(transport.doc_count(), chunk_count + 2);
}

#[tokio::test]
async fn conflicting_metadata_write_retries_once() {
    let vault = tempfile::tempdir().unwrap();
    write(vault.path(), "a.md", "original content");

    let transport = Arc::new(FakeTransport::new());
    let locals = LocalIndex::scan(vault.path(), &[PathBuf::from(".")], &[]).unwrap();
    let local = locals.get("a.md").unwrap();

    let push = PushEngine::new(transport.clone() as Arc<dyn vsync_transport::Transport>);

    // First push creates the document.
    let first = push.push_file(local, None, 4, &CancellationToken::new()).await;
    assert!(matches!(first, FileOutcome::Pushed { .. }));

    // Simulate a racing writer bumping the remote rev between our read and
    // our write by pushing again with a stale (None) rev.
    let retried = push.push_file(local, None, 4, &CancellationToken::new()).await;
    assert!(
        matches!(retried, FileOutcome::Pushed { .. }),
        "push should recover from a single conflict via retry, got {retried:?}"
    );
}

#[tokio::test]
async fn delete_orphans_removes_local_files_absent_remotely() {
    let vault = tempfile::tempdir().unwrap();
    write(vault.path(), "keep.md", "kept");
    write(vault.path(), "stale/orphan.md", "orphaned");

    let locals = LocalIndex::scan(vault.path(), &[PathBuf::from(".")], &[]).unwrap();
    let local_paths: std::collections::HashSet<String> = locals.keys().cloned().collect();
    let remote_paths: std::collections::HashSet<String> = ["keep.md".to_string()].into_iter().collect();

    let orphans = Reconciler::find_orphans(&local_paths, &remote_paths);
    assert_eq!(orphans, vec!["stale/orphan.md".to_string()]);

    let outcomes = Reconciler::delete_orphans(vault.path(), &orphans);
    assert_eq!(outcomes.len(), 1);
    assert!(!vault.path().join("stale/orphan.md").exists());
    assert!(!vault.path().join("stale").exists());
    assert!(vault.path().join("keep.md").exists());
}
