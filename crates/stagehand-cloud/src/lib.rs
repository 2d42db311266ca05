//! S3 publishing and CloudFront invalidation for stagehand.
//!
//! All cloud calls go through the `aws` CLI behind the [`AwsExecutor`]
//! trait, so the client and publisher are tested against mocks.
//!
//! ```text
//! stagehand publish
//!   1. Build      ── prod pipeline (stagehand-build)
//!   2. Preflight  ── aws --version, aws sts get-caller-identity
//!   3. Diff       ── sha256 of each dist/ file vs. publish cache
//!   4. Upload     ── aws s3api put-object (bounded concurrency, retries)
//!   5. Cache      ── publish cache rewritten with successful uploads
//!   6. Invalidate ── aws cloudfront create-invalidation (uploaded paths only)
//! ```

pub mod aws;
pub mod cache;
pub mod client;
pub mod executor;
pub mod publisher;

pub use aws::AwsError;
pub use cache::{CacheError, PublishCache};
pub use client::{AwsClient, PreflightError, PreflightReport};
pub use executor::{AwsExecutor, RealExecutor};
pub use publisher::{
    InvalidationError, InvalidationStatus, PublishError, PublishOptions, PublishReport,
    PublishSettings, Publisher, UploadError, UploadFailure,
};
