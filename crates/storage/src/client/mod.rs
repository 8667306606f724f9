//! Probe client trait and implementations.
//!
//! This module defines the [`ProbeClient`] trait: the handful of operations
//! the scanner needs from a storage service, and nothing more. Implementations
//! translate SDK responses into the crate's own [`models`](crate::Grant) so
//! the scanner never sees SDK types.
//!

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::{MockBucket, MockClient};
#[cfg(feature = "s3")]
pub use self::s3::{S3ClientFactory, S3ProbeClient, S3Settings};
use crate::error::Result;
use crate::{BucketName, ClientHandle, Grant, ObjectDescriptor};
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Destination handed to [`ProbeClient::download_object`].
pub type ObjectWriter<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Narrow interface to a storage service.
///
/// Every method takes `&mut self`: a client is owned by exactly one scan
/// worker, so implementations are free to cache per-region connections
/// without any locking.
///
/// # Errors
/// [`resolve_region`](Self::resolve_region) returns
/// [`BucketNotFound`](crate::error::ErrorKind::BucketNotFound) when, and only
/// when, the service confirms the bucket doesn't exist. Any other error means
/// the answer is unknown.
///
/// # Examples
///
/// ```no_run
/// use s3scan_storage::{BucketName, ProbeClient, error::Result};
///
/// async fn is_listable(client: &mut dyn ProbeClient, reference: &str) -> Result<bool> {
///     let bucket = BucketName::normalize(reference);
///     let region = client.resolve_region(&bucket).await?;
///     Ok(client.list_objects(&bucket, &region).await.is_ok())
/// }
/// ```
#[async_trait]
pub trait ProbeClient: Send {
    /// Confirm the bucket exists and return the region it lives in.
    async fn resolve_region(&mut self, bucket: &BucketName) -> Result<String>;

    /// Read the bucket's access-control list.
    async fn get_access_grants(&mut self, bucket: &BucketName, region: &str) -> Result<Vec<Grant>>;

    /// Create an empty object named `key` in the bucket.
    async fn put_marker_object(&mut self, bucket: &BucketName, region: &str, key: &str) -> Result<()>;

    /// Remove an object previously created by
    /// [`put_marker_object`](Self::put_marker_object).
    async fn delete_marker_object(&mut self, bucket: &BucketName, region: &str, key: &str) -> Result<()>;

    /// List the first page of objects in the bucket.
    ///
    /// Page size is whatever the service defaults to; there is no
    /// pagination.
    async fn list_objects(&mut self, bucket: &BucketName, region: &str) -> Result<Vec<ObjectDescriptor>>;

    /// Stream an object's content into `writer`, returning the number of
    /// bytes written.
    ///
    /// The writer is not flushed; that's the caller's responsibility.
    async fn download_object(
        &mut self,
        bucket: &BucketName,
        region: &str,
        key: &str,
        writer: ObjectWriter<'_>,
    ) -> Result<u64>;
}

/// Builds independent [`ProbeClient`]s, one per scan worker.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> Result<ClientHandle>;
}
