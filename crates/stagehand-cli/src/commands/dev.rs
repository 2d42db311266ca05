use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stagehand_build::Pipeline;
use stagehand_core::{BuildMode, StagehandConfig};
use tokio::sync::{broadcast, mpsc};

use super::build::{print_report, run_build};
use crate::serve::{self, ServeState};
use crate::watch;

/// Build once, then serve the output directory and rebuild on source changes.
///
/// A failing initial build aborts; failing rebuilds are logged and the last
/// good output keeps being served.
pub async fn dev(
    project_dir: &Path,
    config: &StagehandConfig,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::new(project_dir, &config.site, config.build.clone()));
    let layout = pipeline.layout().clone();

    let report = run_build(Arc::clone(&pipeline), BuildMode::Development).await?;
    print_report(&report, &layout.out_dir);

    let (reload, _) = broadcast::channel(16);
    let (changes_tx, changes_rx) = mpsc::unbounded_channel::<PathBuf>();

    let _watcher = watch::watch(&layout.src_dir, &layout.out_dir, changes_tx)
        .with_context(|| format!("failed to watch {}", layout.src_dir.display()))?;

    let rebuild_reload = reload.clone();
    let rebuilds = tokio::spawn(watch::rebuild_loop(
        changes_rx,
        Duration::from_millis(config.serve.debounce_ms),
        move |changed| {
            let pipeline = Arc::clone(&pipeline);
            let reload = rebuild_reload.clone();
            async move { rebuild(pipeline, changed, reload).await }
        },
    ));

    let page = layout
        .template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("template path has no file name")?;
    let router = serve::router(ServeState {
        out_dir: layout.out_dir.clone(),
        page,
        reload,
    });

    let addr = format!("{}:{}", config.serve.host, port.unwrap_or(config.serve.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("Serving {} at http://{addr}", layout.out_dir.display());
    println!("Watching {} for changes (Ctrl-C to stop)", layout.src_dir.display());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("dev server failed")?;

    rebuilds.abort();
    Ok(())
}

async fn rebuild(pipeline: Arc<Pipeline>, changed: Vec<PathBuf>, reload: broadcast::Sender<()>) {
    tracing::info!(changes = changed.len(), "sources changed, rebuilding");
    for path in &changed {
        tracing::debug!(path = %path.display(), "changed");
    }

    match tokio::task::spawn_blocking(move || pipeline.dev()).await {
        Ok(Ok(report)) => {
            println!("Rebuilt {} files", report.files.len());
            if reload.send(()).is_err() {
                tracing::debug!("no browser connected, reload skipped");
            }
        }
        Ok(Err(e)) => {
            let stage = e.stage();
            tracing::error!(%stage, error = %format!("{:#}", anyhow::Error::from(e)), "rebuild failed");
        }
        Err(e) => tracing::error!(error = %e, "rebuild task panicked"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    println!("Shutting down");
}
