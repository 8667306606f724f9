//! The fixed per-bucket probe sequence.
//!
//! Steps run strictly in order: existence, access grants, write, list. Only
//! the existence step can end the sequence early. Every other step records
//! its own outcome and the next one runs regardless.

mod grants;

pub use self::grants::{AccessGrants, GranteeClass};
use crate::result::{Existence, GrantProbe, ListProbe, ProbeResult, ProbeStatus};
use s3scan_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind, Result as StorageResult};
use s3scan_storage::{BucketName, ProbeClient};
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_MARKER_KEY: &str = "s3scan-write-probe.txt";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Key of the empty object uploaded by the write probe.
    pub marker_key: String,
    /// Delete the marker object again once the write probe succeeds.
    pub cleanup_marker: bool,
    /// Upper bound for each individual probe call. Downloads are exempt.
    pub timeout: Option<Duration>,
}
impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            marker_key: DEFAULT_MARKER_KEY.to_string(),
            cleanup_marker: false,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Probe a single bucket.
///
/// Never fails: a degraded step is recorded in the returned
/// [`ProbeResult`] rather than returned as an error.
#[instrument(skip_all, fields(bucket = %bucket))]
pub async fn probe(
    client: &mut dyn ProbeClient,
    reference: String,
    bucket: BucketName,
    options: &ProbeOptions,
) -> ProbeResult {
    if bucket.is_empty() {
        tracing::warn!(reference = %reference, "Reference does not contain a bucket name");
        return ProbeResult::skipped(reference, bucket, Existence::Invalid);
    }

    let region = match bounded(options.timeout, client.resolve_region(&bucket)).await {
        Ok(region) => region,
        Err(err) if err.is_not_found() => {
            tracing::debug!("Bucket does not exist");
            return ProbeResult::skipped(reference, bucket, Existence::NotFound);
        },
        Err(err) => {
            tracing::warn!(error = %reason(&err), "Could not determine whether bucket exists");
            return ProbeResult::skipped(reference, bucket, Existence::Unresolved(reason(&err)));
        },
    };
    tracing::debug!(region = %region, "Bucket found");
    let mut result = ProbeResult::skipped(reference, bucket, Existence::Found { region: region.clone() });
    let bucket = &result.bucket;

    let grants = match bounded(options.timeout, client.get_access_grants(bucket, &region)).await {
        Ok(grants) => GrantProbe::Available(AccessGrants::from_grants(&grants)),
        Err(err) => {
            tracing::debug!(error = %reason(&err), "Access grants unavailable");
            GrantProbe::Unavailable(reason(&err))
        },
    };

    let write = status(bounded(options.timeout, client.put_marker_object(bucket, &region, &options.marker_key)).await);
    let cleanup = match (&write, options.cleanup_marker) {
        (ProbeStatus::Success, true) => {
            let deleted =
                status(bounded(options.timeout, client.delete_marker_object(bucket, &region, &options.marker_key)).await);
            if let ProbeStatus::Failed(error) = &deleted {
                tracing::warn!(key = %options.marker_key, error = %error, "Marker object left behind");
            }
            deleted
        },
        _ => ProbeStatus::Skipped,
    };

    let list = match bounded(options.timeout, client.list_objects(bucket, &region)).await {
        Ok(objects) => ListProbe::Success(objects),
        Err(err) => ListProbe::Failed(reason(&err)),
    };

    result.grants = grants;
    result.write = write;
    result.cleanup = cleanup;
    result.list = list;
    result
}

/// Run a probe call under the optional timeout; running out of time counts
/// as any other service failure.
async fn bounded<T>(limit: Option<Duration>, call: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
    let Some(limit) = limit else {
        return call.await;
    };
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(StorageError::from(StorageErrorKind::Timeout(limit))),
    }
}

fn status(result: StorageResult<()>) -> ProbeStatus {
    match result {
        Ok(()) => ProbeStatus::Success,
        Err(err) => ProbeStatus::Failed(reason(&err)),
    }
}

pub(crate) fn reason(err: &StorageError) -> String {
    (**err).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3scan_storage::Grant;
    use s3scan_storage::client::{MockBucket, MockClient};

    const ALL_USERS: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

    async fn run(client: &mut MockClient, reference: &str, options: &ProbeOptions) -> ProbeResult {
        probe(client, reference.to_string(), BucketName::normalize(reference), options).await
    }

    #[tokio::test]
    async fn test_open_bucket() {
        let mut client = MockClient::default().with_bucket(
            "bucket-a",
            MockBucket::new("us-east-1")
                .with_grants([Grant::group(ALL_USERS, "READ")])
                .with_object("index.html", b"<html>".to_vec()),
        );
        let result = run(&mut client, "bucket-a", &ProbeOptions::default()).await;

        assert_eq!(result.region(), "us-east-1");
        let GrantProbe::Available(grants) = &result.grants else {
            panic!("expected grants, got {:?}", result.grants);
        };
        assert_eq!(grants.get(GranteeClass::Everyone), ["READ".to_string()]);
        assert_eq!(result.write, ProbeStatus::Success);
        assert_eq!(result.cleanup, ProbeStatus::Skipped);
        assert_eq!(result.objects().len(), 1);
        assert!(result.mirror.is_none());
        // Without cleanup the marker stays.
        assert_eq!(client.markers(), vec![("bucket-a".to_string(), DEFAULT_MARKER_KEY.to_string())]);
    }

    #[tokio::test]
    async fn test_not_found_skips_everything() {
        let mut client = MockClient::default();
        let result = run(&mut client, "https://missing.s3.amazonaws.com/", &ProbeOptions::default()).await;

        assert_eq!(result.existence, Existence::NotFound);
        assert_eq!(result.bucket.as_str(), "missing");
        assert_eq!(result.grants, GrantProbe::Skipped);
        assert_eq!(result.write, ProbeStatus::Skipped);
        assert_eq!(result.list, ListProbe::Skipped);
        assert_eq!(client.calls(), vec!["resolve:missing"]);
    }

    #[tokio::test]
    async fn test_unresolved_is_distinct_from_not_found() {
        let mut client = MockClient::default().with_unresolvable("flaky");
        let result = run(&mut client, "flaky", &ProbeOptions::default()).await;
        assert!(matches!(result.existence, Existence::Unresolved(_)));
        assert_eq!(result.write, ProbeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_empty_reference_is_invalid() {
        let mut client = MockClient::default();
        let result = run(&mut client, "s3://", &ProbeOptions::default()).await;
        assert_eq!(result.existence, Existence::Invalid);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_steps_fail_independently() {
        let mut client = MockClient::default().with_bucket(
            "locked",
            MockBucket::new("eu-west-1").with_acl_error("AccessDenied").read_only().with_object("a.txt", b"a".to_vec()),
        );
        let result = run(&mut client, "locked", &ProbeOptions::default()).await;

        assert!(matches!(result.grants, GrantProbe::Unavailable(_)));
        assert!(matches!(result.write, ProbeStatus::Failed(_)));
        // Listing still ran and succeeded.
        assert_eq!(result.objects().len(), 1);
        assert_eq!(client.calls(), vec!["resolve:locked", "acl:locked", "put:locked", "list:locked"]);
    }

    #[tokio::test]
    async fn test_empty_acl_is_available() {
        let mut client = MockClient::default().with_bucket("private", MockBucket::new("us-east-1").with_list_error("denied"));
        let result = run(&mut client, "private", &ProbeOptions::default()).await;
        assert_eq!(result.grants, GrantProbe::Available(AccessGrants::default()));
        assert!(matches!(result.list, ListProbe::Failed(_)));
    }

    #[tokio::test]
    async fn test_marker_cleanup() {
        let mut client = MockClient::default().with_bucket("open", MockBucket::new("us-east-1"));
        let options = ProbeOptions {
            marker_key: "probe.txt".to_string(),
            cleanup_marker: true,
            ..Default::default()
        };
        let result = run(&mut client, "open", &options).await;
        assert_eq!(result.write, ProbeStatus::Success);
        assert_eq!(result.cleanup, ProbeStatus::Success);
        assert!(client.markers().is_empty());
    }

    #[tokio::test]
    async fn test_no_cleanup_after_failed_write() {
        let mut client = MockClient::default().with_bucket("locked", MockBucket::new("us-east-1").read_only());
        let options = ProbeOptions {
            cleanup_marker: true,
            ..Default::default()
        };
        let result = run(&mut client, "locked", &options).await;
        assert_eq!(result.cleanup, ProbeStatus::Skipped);
        assert!(!client.calls().iter().any(|call| call.starts_with("delete:")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mut client = MockClient::default()
            .with_bucket("slow", MockBucket::new("us-east-1"))
            .with_latency(Duration::from_secs(5));
        let options = ProbeOptions {
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let result = run(&mut client, "slow", &options).await;
        let Existence::Unresolved(reason) = &result.existence else {
            panic!("expected timeout, got {:?}", result.existence);
        };
        assert!(reason.contains("timed out"), "{reason}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disabled() {
        let mut client = MockClient::default()
            .with_bucket("slow", MockBucket::new("us-east-1"))
            .with_latency(Duration::from_secs(60));
        let options = ProbeOptions {
            timeout: None,
            ..Default::default()
        };
        let result = run(&mut client, "slow", &options).await;
        assert!(result.is_found());
        assert_eq!(result.write, ProbeStatus::Success);
    }
}
