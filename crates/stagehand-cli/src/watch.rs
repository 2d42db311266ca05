use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watch `src_dir` recursively and forward changed paths to `changes`.
///
/// Paths under `ignore` (the output directory) are dropped. The returned
/// watcher stops when dropped.
pub fn watch(
    src_dir: &Path,
    ignore: &Path,
    changes: mpsc::UnboundedSender<PathBuf>,
) -> notify::Result<RecommendedWatcher> {
    let ignore = ignore.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "file watcher error");
                return;
            }
        };
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        for path in event.paths {
            if path.starts_with(&ignore) {
                continue;
            }
            if changes.send(path).is_err() {
                // rebuild loop has stopped
                return;
            }
        }
    })?;
    watcher.watch(src_dir, RecursiveMode::Recursive)?;
    Ok(watcher)
}

/// Turn a stream of changed paths into serialized rebuilds.
///
/// A change starts a batch; the batch closes once `quiet` passes with no
/// further change. `rebuild` runs to completion before the next batch is
/// collected, so changes arriving during a rebuild produce exactly one
/// follow-up rebuild. Returns when the sender side is closed.
pub async fn rebuild_loop<F, Fut>(
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    quiet: Duration,
    mut rebuild: F,
) where
    F: FnMut(Vec<PathBuf>) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(first) = changes.recv().await {
        let mut batch = vec![first];
        loop {
            tokio::select! {
                next = changes.recv() => match next {
                    Some(path) => batch.push(path),
                    None => break,
                },
                () = tokio::time::sleep(quiet) => break,
            }
        }
        batch.sort();
        batch.dedup();
        tracing::debug!(changes = batch.len(), "change batch closed");
        rebuild(batch).await;
    }
}
