//! Reconciliation properties against in-memory inventory and sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coldsync::core::{Digest, FileRecord};
use coldsync::sink::{MemorySink, PutReceipt, PutRequest, StorageSink};
use coldsync::store::{Inventory, MemoryInventory};
use coldsync::{EngineError, FailurePolicy, FileError, Reconciler, ReconcilerConfig, RunReport};
use coldsync_testkit::{CountingInventory, TreeFixture, TreeSpec};
use proptest::prelude::*;

type Counted = CountingInventory<MemoryInventory>;

fn reconciler_with(
    tree: &TreeFixture,
    config: ReconcilerConfig,
) -> Reconciler<Counted, MemorySink> {
    Reconciler::new(
        Arc::new(CountingInventory::new(MemoryInventory::new())),
        Arc::new(MemorySink::new()),
        tree.root(),
        config,
    )
}

fn reconciler(tree: &TreeFixture) -> Reconciler<Counted, MemorySink> {
    reconciler_with(tree, ReconcilerConfig::default())
}

async fn run_ok(reconciler: &Reconciler<Counted, MemorySink>) -> RunReport {
    let report = reconciler.run().await.unwrap();
    assert!(report.is_success(), "run failed: {:?}", report.failed);
    report
}

async fn record(reconciler: &Reconciler<Counted, MemorySink>, key: &str) -> Option<FileRecord> {
    reconciler.inventory().inner().get(key).await.unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Idempotence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_over_unchanged_tree_makes_no_sink_calls() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "alpha");
    tree.write("docs/b.txt", "beta");
    tree.write("docs/deep/c.txt", "gamma");
    let reconciler = reconciler(&tree);

    let first = run_ok(&reconciler).await;
    assert_eq!(first.uploaded, 3);

    reconciler.sink().reset_attempts();
    reconciler.inventory().reset();

    let second = run_ok(&reconciler).await;
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(reconciler.sink().put_attempts(), 0);
    assert!(reconciler.inventory().writes().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Change triggers
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_size_change_alone_triggers_upload() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let reconciler = reconciler(&tree);
    run_ok(&reconciler).await;
    reconciler.sink().reset_attempts();

    tree.rewrite_preserving_mtime("a.txt", "hi there");

    let report = run_ok(&reconciler).await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(reconciler.sink().attempted_keys(), vec!["a.txt"]);

    let stored = record(&reconciler, &tree.inventory_key("a.txt")).await.unwrap();
    assert_eq!(stored.size, 8);
    assert_eq!(stored.hash, Digest::of(b"hi there"));
}

#[tokio::test]
async fn test_mtime_advance_alone_triggers_upload() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let reconciler = reconciler(&tree);
    run_ok(&reconciler).await;
    let before = record(&reconciler, &tree.inventory_key("a.txt")).await.unwrap();
    reconciler.sink().reset_attempts();

    tree.touch_forward("a.txt", Duration::from_secs(60));

    let report = run_ok(&reconciler).await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(reconciler.sink().put_attempts(), 1);

    let after = record(&reconciler, &tree.inventory_key("a.txt")).await.unwrap();
    assert_eq!(after.hash, before.hash);
    assert_eq!(after.modified_ms, before.modified_ms + 60_000);
}

#[tokio::test]
async fn test_older_mtime_with_same_content_is_unchanged() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let reconciler = reconciler(&tree);
    run_ok(&reconciler).await;
    reconciler.sink().reset_attempts();

    let earlier = tree.mtime("a.txt") - Duration::from_secs(3600);
    tree.set_mtime("a.txt", earlier);

    let report = run_ok(&reconciler).await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(reconciler.sink().put_attempts(), 0);
}

#[tokio::test]
async fn test_content_change_with_same_size_and_mtime_triggers_upload() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "abc");
    let reconciler = reconciler(&tree);
    run_ok(&reconciler).await;
    reconciler.sink().reset_attempts();

    tree.rewrite_preserving_mtime("a.txt", "xyz");

    let report = run_ok(&reconciler).await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        &reconciler.sink().object("a.txt").unwrap().bytes[..],
        b"xyz"
    );

    let stored = record(&reconciler, &tree.inventory_key("a.txt")).await.unwrap();
    assert_eq!(stored.hash, Digest::of(b"xyz"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_first_upload_leaves_no_record() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let reconciler = reconciler(&tree);
    reconciler.sink().fail_on("a.txt");

    let err = reconciler.run().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Aborted {
            source: FileError::Sink(_),
            ..
        }
    ));
    assert_eq!(record(&reconciler, &tree.inventory_key("a.txt")).await, None);
}

#[tokio::test]
async fn test_failed_reupload_keeps_previous_record() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let reconciler = reconciler(&tree);
    run_ok(&reconciler).await;
    let before = record(&reconciler, &tree.inventory_key("a.txt")).await;

    tree.write("a.txt", "hello");
    reconciler.sink().fail_all("backend unavailable");

    assert!(reconciler.run().await.is_err());
    assert_eq!(record(&reconciler, &tree.inventory_key("a.txt")).await, before);
    assert_eq!(
        &reconciler.sink().object("a.txt").unwrap().bytes[..],
        b"hi"
    );
}

#[tokio::test]
async fn test_fail_stop_skips_everything_after_the_failed_file() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "a");
    tree.write("b.txt", "b");
    tree.write("c.txt", "c");
    let reconciler = reconciler(&tree);
    reconciler.sink().fail_on("b.txt");

    let err = reconciler.run().await.unwrap_err();
    let EngineError::Aborted { path, report, .. } = err else {
        panic!("expected an aborted run");
    };

    assert_eq!(path, tree.inventory_key("b.txt"));
    assert_eq!(report.files_seen, 2);
    assert_eq!(report.uploaded, 1);

    // A uploaded and recorded; C never looked up.
    assert_eq!(
        reconciler.inventory().gets(),
        vec![tree.inventory_key("a.txt"), tree.inventory_key("b.txt")]
    );
    assert_eq!(reconciler.inventory().writes(), vec![tree.inventory_key("a.txt")]);
    assert_eq!(reconciler.sink().attempted_keys(), vec!["a.txt", "b.txt"]);
    assert!(record(&reconciler, &tree.inventory_key("a.txt"))
        .await
        .unwrap()
        .uploaded);
    assert_eq!(record(&reconciler, &tree.inventory_key("c.txt")).await, None);
}

#[tokio::test]
async fn test_fail_stop_halts_sibling_directories() {
    let tree = TreeFixture::new();
    tree.write("a/1.txt", "1");
    tree.write("a/2.txt", "2");
    tree.write("b/3.txt", "3");
    tree.write("z.txt", "z");
    let reconciler = reconciler(&tree);
    reconciler.sink().fail_on("a/2.txt");

    assert!(reconciler.run().await.is_err());
    assert_eq!(reconciler.sink().attempted_keys(), vec!["a/1.txt", "a/2.txt"]);
    assert_eq!(reconciler.inventory().gets().len(), 2);
}

#[tokio::test]
async fn test_continue_policy_records_failures_and_finishes() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "a");
    tree.write("b.txt", "b");
    tree.write("c.txt", "c");
    let reconciler = reconciler_with(
        &tree,
        ReconcilerConfig {
            failure_policy: FailurePolicy::Continue,
            ..ReconcilerConfig::default()
        },
    );
    reconciler.sink().fail_on("b.txt");

    let report = reconciler.run().await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, tree.inventory_key("b.txt"));
    assert_eq!(record(&reconciler, &tree.inventory_key("b.txt")).await, None);

    // The failed file is retried on the next run.
    reconciler.sink().clear_failures();
    reconciler.sink().reset_attempts();
    let report = run_ok(&reconciler).await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(reconciler.sink().attempted_keys(), vec!["b.txt"]);
}

/// Sink that never finishes in time.
struct StalledSink;

#[async_trait]
impl StorageSink for StalledSink {
    async fn put(&self, _request: PutRequest) -> coldsync::sink::Result<PutReceipt> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(coldsync::sink::SinkError::Rejected("unreachable".into()))
    }
}

#[tokio::test]
async fn test_upload_timeout_is_a_file_failure() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "hi");
    let inventory = Arc::new(MemoryInventory::new());
    let reconciler = Reconciler::new(
        inventory.clone(),
        Arc::new(StalledSink),
        tree.root(),
        ReconcilerConfig {
            upload_timeout: Some(Duration::from_millis(50)),
            ..ReconcilerConfig::default()
        },
    );

    let err = reconciler.run().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Aborted {
            source: FileError::Timeout(_),
            ..
        }
    ));
    assert_eq!(inventory.count().await.unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Walk edges
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_tree_and_empty_files() {
    let tree = TreeFixture::new();
    tree.mkdir("nothing/here");
    let reconciler = reconciler(&tree);

    let report = run_ok(&reconciler).await;
    assert_eq!(report.files_seen, 0);

    tree.write("empty.txt", "");
    let report = run_ok(&reconciler).await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.bytes_uploaded, 0);
    let stored = record(&reconciler, &tree.inventory_key("empty.txt")).await.unwrap();
    assert_eq!(stored.hash, Digest::of(b""));
}

#[cfg(unix)]
#[tokio::test]
async fn test_backslash_in_file_name_is_backed_up() {
    let tree = TreeFixture::new();
    tree.write("a\\b.txt", "x");
    let reconciler = reconciler(&tree);

    let report = run_ok(&reconciler).await;
    assert_eq!(report.files_seen, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(reconciler.sink().attempted_keys(), vec!["a\\b.txt"]);
}

#[cfg(target_os = "linux")]
fn write_non_utf8(tree: &TreeFixture) -> String {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let path = tree.root().join(OsStr::from_bytes(b"bad\xff.txt"));
    std::fs::write(&path, "x").unwrap();
    path.to_string_lossy().into_owned()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unnameable_file_fails_the_run() {
    let tree = TreeFixture::new();
    let bad = write_non_utf8(&tree);
    tree.write("good.txt", "y");
    let reconciler = reconciler(&tree);

    let err = reconciler.run().await.unwrap_err();
    let EngineError::Aborted {
        path,
        source,
        report,
    } = err
    else {
        panic!("expected an aborted run");
    };
    assert_eq!(path, bad);
    assert!(matches!(source, FileError::Unsupported(_)));
    assert_eq!(report.files_seen, 1);
    assert_eq!(reconciler.sink().put_attempts(), 0);
    assert!(reconciler.inventory().gets().is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unnameable_file_is_reported_under_continue() {
    let tree = TreeFixture::new();
    let bad = write_non_utf8(&tree);
    tree.write("good.txt", "y");
    let reconciler = reconciler_with(
        &tree,
        ReconcilerConfig {
            failure_policy: FailurePolicy::Continue,
            ..ReconcilerConfig::default()
        },
    );

    let report = reconciler.run().await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.files_seen, 2);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, bad);
}

#[tokio::test]
async fn test_stale_records_are_reported_not_removed() {
    let tree = TreeFixture::new();
    tree.write("a.txt", "a");
    tree.write("b.txt", "b");
    let reconciler = reconciler_with(
        &tree,
        ReconcilerConfig {
            detect_stale: true,
            ..ReconcilerConfig::default()
        },
    );
    run_ok(&reconciler).await;

    tree.remove("b.txt");
    let report = run_ok(&reconciler).await;
    assert_eq!(report.stale, vec![tree.inventory_key("b.txt")]);
    assert_eq!(reconciler.inventory().count().await.unwrap(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties over random trees
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_reconcile_is_idempotent(spec: TreeSpec) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let tree = TreeFixture::new();
            spec.materialize(&tree);
            let reconciler = reconciler(&tree);

            let first = reconciler.run().await.unwrap();
            prop_assert_eq!(first.uploaded, spec.len() as u64);
            prop_assert_eq!(first.bytes_uploaded, spec.total_bytes());
            prop_assert_eq!(reconciler.sink().len(), spec.len());

            for (rel, body) in &spec.files {
                let stored = reconciler.inventory().inner().get(&tree.inventory_key(rel)).await.unwrap();
                let stored = stored.unwrap();
                prop_assert!(stored.uploaded);
                prop_assert_eq!(stored.hash, Digest::of(body));
            }

            reconciler.sink().reset_attempts();
            let second = reconciler.run().await.unwrap();
            prop_assert_eq!(second.uploaded, 0);
            prop_assert_eq!(reconciler.sink().put_attempts(), 0);
            Ok(())
        })?;
    }
}
