//! In-memory probe client for testing.

use crate::client::ObjectWriter;
use crate::error::{Error, ErrorKind, Result};
use crate::{BucketName, ClientFactory, ClientHandle, Grant, ObjectDescriptor, ProbeClient};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Scripted state of one bucket in a [`MockClient`].
///
/// Every probe succeeds by default; use the builder methods to make
/// individual operations fail.
#[derive(Debug, Clone)]
pub struct MockBucket {
    region: String,
    grants: std::result::Result<Vec<Grant>, String>,
    writable: bool,
    listing: std::result::Result<Vec<(ObjectDescriptor, Option<Vec<u8>>)>, String>,
}
impl MockBucket {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            grants: Ok(Vec::new()),
            writable: true,
            listing: Ok(Vec::new()),
        }
    }

    pub fn with_grants(mut self, grants: impl IntoIterator<Item = Grant>) -> Self {
        self.grants = Ok(grants.into_iter().collect());
        self
    }

    pub fn with_acl_error(mut self, reason: impl Into<String>) -> Self {
        self.grants = Err(reason.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Add an object whose download succeeds with `data`.
    pub fn with_object(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let descriptor = ObjectDescriptor::new(key, data.len() as u64, None);
        if let Ok(listing) = &mut self.listing {
            listing.push((descriptor, Some(data)));
        }
        self
    }

    /// Add an object that shows up in listings but fails to download.
    pub fn with_broken_object(mut self, key: impl Into<String>) -> Self {
        if let Ok(listing) = &mut self.listing {
            listing.push((ObjectDescriptor::new(key, 0, None), None));
        }
        self
    }

    pub fn with_list_error(mut self, reason: impl Into<String>) -> Self {
        self.listing = Err(reason.into());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Buckets by name; `None` scripts a transient resolution failure.
    buckets: HashMap<String, Option<MockBucket>>,
    calls: Vec<String>,
    markers: Vec<(String, String)>,
}

/// In-memory probe client for testing.
///
/// Buckets are scripted up front with [`with_bucket`](Self::with_bucket);
/// anything else resolves as not found. Clones share state, so a single
/// `MockClient` doubles as the [`ClientFactory`] for a scan and the test can
/// inspect every call made by every worker afterwards.
///
/// # Examples
///
/// ```
/// use s3scan_storage::client::{MockBucket, MockClient};
/// use s3scan_storage::{BucketName, ProbeClient};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut client = MockClient::default().with_bucket("assets", MockBucket::new("eu-west-2"));
/// let region = client.resolve_region(&BucketName::normalize("s3://assets")).await.unwrap();
/// assert_eq!(region, "eu-west-2");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
    latency: Option<Duration>,
}

impl MockClient {
    pub fn with_bucket(self, name: impl Into<String>, bucket: MockBucket) -> Self {
        self.lock().buckets.insert(name.into(), Some(bucket));
        self
    }

    /// Make region resolution fail with something other than "not found".
    pub fn with_unresolvable(self, name: impl Into<String>) -> Self {
        self.lock().buckets.insert(name.into(), None);
        self
    }

    /// Delay every call, to simulate a slow network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call made so far, formatted as `operation:bucket`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Marker objects currently present, as `(bucket, key)`.
    pub fn markers(&self) -> Vec<(String, String)> {
        self.lock().markers.clone()
    }

    // Only used from tests; a poisoned lock means another test thread
    // already panicked.
    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    async fn enter(&self, operation: &str, bucket: &BucketName) -> Result<MockBucket> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        state.calls.push(format!("{operation}:{bucket}"));
        match state.buckets.get(bucket.as_str()) {
            Some(Some(scripted)) => Ok(scripted.clone()),
            Some(None) => Err(Error::from(ErrorKind::Network(format!("connection reset resolving {bucket}")))),
            None => Err(Error::from(ErrorKind::BucketNotFound(bucket.to_string()))),
        }
    }
}

impl ClientFactory for MockClient {
    fn create(&self) -> Result<ClientHandle> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ProbeClient for MockClient {
    async fn resolve_region(&mut self, bucket: &BucketName) -> Result<String> {
        Ok(self.enter("resolve", bucket).await?.region)
    }

    async fn get_access_grants(&mut self, bucket: &BucketName, _region: &str) -> Result<Vec<Grant>> {
        self.enter("acl", bucket).await?.grants.map_err(|reason| Error::from(ErrorKind::AccessDenied(reason)))
    }

    async fn put_marker_object(&mut self, bucket: &BucketName, _region: &str, key: &str) -> Result<()> {
        if !self.enter("put", bucket).await?.writable {
            exn::bail!(ErrorKind::AccessDenied(bucket.to_string()));
        }
        self.lock().markers.push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete_marker_object(&mut self, bucket: &BucketName, _region: &str, key: &str) -> Result<()> {
        self.enter("delete", bucket).await?;
        let mut state = self.lock();
        let before = state.markers.len();
        state.markers.retain(|(b, k)| !(b == bucket.as_str() && k == key));
        match state.markers.len() < before {
            true => Ok(()),
            false => exn::bail!(ErrorKind::Service(format!("no such key: {key}"))),
        }
    }

    async fn list_objects(&mut self, bucket: &BucketName, _region: &str) -> Result<Vec<ObjectDescriptor>> {
        let listing = self.enter("list", bucket).await?.listing;
        let listing = listing.map_err(|reason| Error::from(ErrorKind::AccessDenied(reason)))?;
        Ok(listing.into_iter().map(|(descriptor, _)| descriptor).collect())
    }

    async fn download_object(
        &mut self,
        bucket: &BucketName,
        _region: &str,
        key: &str,
        writer: ObjectWriter<'_>,
    ) -> Result<u64> {
        let scripted = self.enter(&format!("get[{key}]"), bucket).await?;
        let data = scripted
            .listing
            .ok()
            .and_then(|listing| listing.into_iter().find(|(descriptor, _)| descriptor.key == key))
            .and_then(|(_, data)| data)
            .ok_or_else(|| Error::from(ErrorKind::Service(format!("download of {key} failed"))))?;
        writer.write_all(&data).await.or_raise(|| ErrorKind::Network(format!("download of {key} interrupted")))?;
        Ok(data.len() as u64)
    }
}
