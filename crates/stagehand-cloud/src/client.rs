use std::path::Path;
use std::time::Duration;

use stagehand_core::DeployTarget;

use crate::aws::AwsError;
use crate::executor::{AwsExecutor, RealExecutor};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// AWS operations client, parameterized over the executor for testability.
///
/// Every call is scoped to one [`DeployTarget`] and bounded by the client
/// timeout.
pub struct AwsClient<E: AwsExecutor = RealExecutor> {
    executor: E,
    target: DeployTarget,
    timeout: Duration,
}

impl AwsClient<RealExecutor> {
    pub fn new(target: DeployTarget) -> Self {
        Self::with_executor(RealExecutor, target)
    }
}

impl<E: AwsExecutor> AwsClient<E> {
    pub fn with_executor(executor: E, target: DeployTarget) -> Self {
        Self {
            executor,
            target,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &DeployTarget {
        &self.target
    }

    // ── Preflight ──

    pub async fn check_prerequisites(&self) -> Result<PreflightReport, PreflightError> {
        let mut report = PreflightReport::default();

        // 1. aws CLI available ("aws-cli/2.15.30 Python/3.11.8 ...")
        match self.run(args(["--version"])).await {
            Ok(version) => {
                let version = version
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.strip_prefix("aws-cli/"))
                    .unwrap_or(version.trim());
                report.aws_version = Some(version.to_owned());
            }
            Err(e) => {
                tracing::debug!(error = %e, "aws --version failed");
                return Err(PreflightError::AwsNotInstalled);
            }
        }

        // 2. Profile resolves to an identity
        match self
            .run(args([
                "sts",
                "get-caller-identity",
                "--profile",
                &self.target.profile,
                "--query",
                "Arn",
                "--output",
                "text",
            ]))
            .await
        {
            Ok(arn) => report.identity = Some(arn.trim().to_owned()),
            Err(e) => {
                tracing::debug!(error = %e, "sts get-caller-identity failed");
                return Err(PreflightError::NotAuthenticated(self.target.profile.clone()));
            }
        }

        Ok(report)
    }

    // ── Object store ──

    /// Upload one file to `s3://<bucket>/<key>`.
    pub async fn put_object(
        &self,
        key: &str,
        body: &Path,
        cache_control: &str,
        content_type: &str,
    ) -> Result<(), AwsError> {
        let body = body.display().to_string();
        self.run(args([
            "s3api",
            "put-object",
            "--bucket",
            &self.target.bucket,
            "--key",
            key,
            "--body",
            &body,
            "--cache-control",
            cache_control,
            "--content-type",
            content_type,
            "--profile",
            &self.target.profile,
            "--region",
            &self.target.region,
            "--output",
            "json",
        ]))
        .await
        .map(|_| ())
    }

    // ── CDN ──

    /// Request invalidation of `paths` and return the invalidation ID.
    pub async fn create_invalidation(&self, paths: &[String]) -> Result<String, AwsError> {
        let mut command = args([
            "cloudfront",
            "create-invalidation",
            "--distribution-id",
            &self.target.distribution,
            "--profile",
            &self.target.profile,
            "--query",
            "Invalidation.Id",
            "--output",
            "text",
            "--paths",
        ]);
        command.extend(paths.iter().cloned());

        let id = self.run(command).await?;
        Ok(id.trim().to_owned())
    }

    async fn run(&self, args: Vec<String>) -> Result<String, AwsError> {
        tracing::debug!(?args, "aws");
        match tokio::time::timeout(self.timeout, self.executor.exec(&args)).await {
            Ok(result) => result,
            Err(_) => Err(AwsError::Timeout {
                args,
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Error types ──

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub aws_version: Option<String>,
    /// ARN the profile authenticates as
    pub identity: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("aws CLI not installed; see https://aws.amazon.com/cli/")]
    AwsNotInstalled,

    #[error("AWS profile '{0}' is not authenticated; run: aws configure --profile {0}")]
    NotAuthenticated(String),
}
