use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use stagehand_build::{BuildReport, Pipeline};
use stagehand_core::{BuildMode, StagehandConfig};

/// Run one build sequence and print what it wrote.
pub async fn build(
    project_dir: &Path,
    config: &StagehandConfig,
    mode: BuildMode,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::new(project_dir, &config.site, config.build.clone()));
    let out_dir = pipeline.layout().out_dir.clone();
    let report = run_build(pipeline, mode).await?;
    print_report(&report, &out_dir);
    Ok(())
}

/// Run the pipeline on the blocking pool. Stage failures surface as
/// `"<stage> stage failed"` with the cause chained.
pub(crate) async fn run_build(pipeline: Arc<Pipeline>, mode: BuildMode) -> anyhow::Result<BuildReport> {
    println!("Building ({mode})...");
    let report = tokio::task::spawn_blocking(move || pipeline.run(mode))
        .await
        .context("build task panicked")??;
    Ok(report)
}

pub(crate) fn print_report(report: &BuildReport, out_dir: &Path) {
    println!("Built {} files into {}", report.files.len(), out_dir.display());
    for entry in report.files.iter() {
        println!("  {:<9} {}", entry.stage.to_string(), entry.path.display());
    }
    for (original, fingerprinted) in report.references.iter() {
        println!("  {original} -> {fingerprinted}");
    }
}
