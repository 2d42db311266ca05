use crate::aws::AwsError;

/// Abstraction over aws CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait AwsExecutor: Send + Sync {
    /// Execute an aws command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, AwsError>;
}

/// Real aws CLI executor.
pub struct RealExecutor;

impl AwsExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, AwsError> {
        use std::process::Stdio;

        // A caller-side timeout drops this future; the child must not outlive it.
        let output = tokio::process::Command::new("aws")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AwsError::NotFound { source: e })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| AwsError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(AwsError::CommandFailed {
                args: args.to_vec(),
                stderr,
            })
        }
    }
}
