use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stagehand_build::Pipeline;
use stagehand_cloud::{
    AwsClient, InvalidationStatus, PublishOptions, PublishReport, PublishSettings, Publisher,
};
use stagehand_core::{BuildMode, DeployTarget, StagehandConfig};

use super::build::{print_report, run_build};

/// Production build, then upload to the bucket and invalidate the CDN.
pub async fn publish(
    project_dir: &Path,
    config: &StagehandConfig,
    target: DeployTarget,
    force: bool,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::new(project_dir, &config.site, config.build.clone()));
    let out_dir = pipeline.layout().out_dir.clone();

    let report = run_build(pipeline, BuildMode::Production).await?;
    print_report(&report, &out_dir);

    let client = AwsClient::new(target)
        .with_timeout(Duration::from_secs(config.deploy.timeout_secs));

    // Pre-flight checks
    println!("Running pre-flight checks...");
    let preflight = client.check_prerequisites().await?;
    println!(
        "  aws-cli {}, authenticated as {}",
        preflight.aws_version.as_deref().unwrap_or("unknown"),
        preflight.identity.as_deref().unwrap_or("unknown"),
    );

    let bucket = client.target().bucket.clone();
    let settings = PublishSettings::from_config(&config.deploy, project_dir);
    let publisher = Publisher::new(client, &out_dir, settings);

    if force {
        println!("Uploading every file to s3://{bucket} (forced)...");
    } else {
        println!("Uploading changed files to s3://{bucket}...");
    }
    let report = publisher.publish(PublishOptions { force }).await?;
    print_publish_report(&report);

    if !report.is_complete() {
        anyhow::bail!(
            "{} file(s) failed to upload; rerun `stagehand publish` to retry them",
            report.failed.len()
        );
    }

    Ok(())
}

fn print_publish_report(report: &PublishReport) {
    println!(
        "Uploaded {}, unchanged {}, failed {}",
        report.uploaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for key in &report.uploaded {
        println!("  + {key}");
    }
    for failure in &report.failed {
        let cause = std::error::Error::source(&failure.error)
            .map(|e| format!(": {e}"))
            .unwrap_or_default();
        println!("  ! {} ({}{cause})", failure.key, failure.error);
    }

    match &report.invalidation {
        InvalidationStatus::NotNeeded => println!("Nothing changed; CDN invalidation skipped"),
        InvalidationStatus::Submitted { id, paths } => {
            println!("CDN invalidation {id} submitted for {} path(s)", paths.len());
        }
        InvalidationStatus::Failed { paths, error } => {
            let cause = std::error::Error::source(error)
                .map(|e| format!(": {e}"))
                .unwrap_or_default();
            eprintln!(
                "Warning: {error}{cause}\n  \
                 {} path(s) may be served stale until their cache entries expire",
                paths.len()
            );
        }
    }
}
